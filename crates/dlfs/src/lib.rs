//! Deploy directories to Chia DataLayer stores and register mirrors for them.
//!
//! The pipelines live in the `common` crate and run against any
//! [`Connector`](common::remote::Connector); this crate binds them to the
//! node and wallet RPC services.

pub mod rpc;
pub mod state;
pub mod version;

use std::path::PathBuf;

use common::deploy::DeployMode;
use common::operation::OperationHandle;
use common::settings::Options;

pub use rpc::RpcConnector;
pub use state::{AppConfig, AppState, StateError};

/// Deploy `deploy_dir` into `store_id` through the configured node.
///
/// Must be called from within a Tokio runtime; progress and failures are
/// reported on the returned handle.
pub fn deploy(
    store_id: impl Into<String>,
    deploy_dir: impl Into<PathBuf>,
    mode: DeployMode,
    options: &Options,
) -> OperationHandle {
    common::deploy(RpcConnector, store_id, deploy_dir, mode, options)
}

/// Register a mirror for `store_id` through the configured node.
pub fn mirror(store_id: impl Into<String>, options: &Options) -> OperationHandle {
    common::mirror(RpcConnector, store_id, options)
}
