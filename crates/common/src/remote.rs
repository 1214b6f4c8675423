//! Interfaces to the external services an operation talks to
//!
//! The DataLayer node and the wallet are reached over RPC in production
//! (see the `dlfs` crate) and through in-memory fakes in tests
//! (see [`crate::testkit`]).

use async_trait::async_trait;

use crate::changelist::ChangeOperation;
use crate::settings::Settings;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The request never produced a usable response (connection, TLS, timeout)
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered and refused the request
    #[error("{endpoint} failed: {message}")]
    Rejected { endpoint: String, message: String },
    /// The service answered with something we could not interpret
    #[error("malformed response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },
    /// A client could not be built from the settings
    #[error("client setup failed: {0}")]
    Setup(String),
}

/// Outcome of a mirror registration.
///
/// A `success: false` is a business outcome reported by the node, not a
/// transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MirrorRegistration {
    pub success: bool,
    pub error: Option<String>,
}

#[async_trait]
pub trait DataStore: Send + Sync + std::fmt::Debug + 'static {
    /// All keys currently in the store, hex-encoded (the node may prefix them with `0x`)
    async fn get_keys(&self, store_id: &str) -> Result<Vec<String>, RemoteError>;

    /// Apply one changelist to the store
    async fn update_data_store(
        &self,
        store_id: &str,
        changelist: &[ChangeOperation],
    ) -> Result<(), RemoteError>;

    /// Register explicit mirror urls for the store
    async fn add_mirror(
        &self,
        store_id: &str,
        urls: &[String],
        amount: u64,
        fee: u64,
    ) -> Result<MirrorRegistration, RemoteError>;

    /// Register a mirror pointing at the host this process runs on
    async fn add_mirror_for_current_host(
        &self,
        store_id: &str,
        force_ip4: bool,
    ) -> Result<MirrorRegistration, RemoteError>;
}

#[async_trait]
pub trait Wallet: Send + Sync + std::fmt::Debug + 'static {
    async fn wallet_is_synced(&self) -> Result<bool, RemoteError>;

    /// Suspend until the wallet has no unconfirmed transactions
    async fn wait_for_all_transactions_to_confirm(&self) -> Result<(), RemoteError>;
}

/// Builds a fresh pair of service clients for one operation.
pub trait Connector: Send + Sync + 'static {
    type Store: DataStore;
    type Wallet: Wallet;

    fn connect(&self, settings: &Settings) -> Result<(Self::Store, Self::Wallet), RemoteError>;
}
