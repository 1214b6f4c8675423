pub mod args;
pub mod logging;
pub mod op;
pub mod ops;

pub use ops::{Deploy, Init, Mirror, Version};
