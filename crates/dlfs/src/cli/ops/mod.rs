pub mod deploy;
pub mod init;
pub mod mirror;
pub mod version;

pub use deploy::Deploy;
pub use init::Init;
pub use mirror::Mirror;
pub use version::Version;
