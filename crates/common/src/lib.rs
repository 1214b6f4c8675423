/**
 * Hex encoding of keys and values, with the
 *  `0x` prefix handling the node expects.
 */
pub mod codec;
/**
 * Resolved configuration for a single operation.
 */
pub mod settings;
/**
 * Bounded, depth-first walk of a deploy directory.
 */
pub mod walker;
/**
 * Changelist operations and size-bounded packing
 *  of them into RPC payloads.
 */
pub mod changelist;
/**
 * File to store-entry conversion, including the
 *  multipart layout for files larger than one payload.
 */
pub mod chunker;
/**
 * Detection of remote keys with no local file.
 */
pub mod orphans;
/**
 * Traits for the DataLayer node and wallet the
 *  pipelines talk to.
 */
pub mod remote;
/**
 * Operation handles: event subscription and
 *  completion for each deploy or mirror call.
 */
pub mod operation;
pub mod deploy;
pub mod mirror;
/**
 * In-memory node and wallet for driving the
 *  pipelines in tests.
 */
pub mod testkit;

pub use deploy::deploy;
pub use mirror::mirror;

pub mod prelude {
    pub use crate::deploy::{DeployError, DeployMode, DeployRequest};
    pub use crate::mirror::MirrorError;
    pub use crate::operation::{EventKind, OperationEvent, OperationHandle, OperationStatus};
    pub use crate::remote::{Connector, DataStore, RemoteError, Wallet};
    pub use crate::settings::{Options, Settings};
}
