//! Registering a mirror for a store
//!
//! ```text
//! INIT -> WAIT_SYNC -> REGISTER -> WAIT_CONFIRM -> DONE
//! ```
//!
//! A registration the node refuses (`success: false`) is reported as an
//! error event and ends the operation without waiting for confirmations.

use std::fmt;

use tracing::Instrument;

use crate::operation::{self, OperationHandle, OperationKind, OperationStatus, Reporter};
use crate::remote::{Connector, DataStore, MirrorRegistration, RemoteError, Wallet};
use crate::settings::{Options, Settings, SettingsError};

pub const MIRROR_FAILED_MESSAGE: &str = "Failed to add mirror";
pub const MIRROR_ADDED_MESSAGE: &str = "Mirror added successfully";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorStage {
    Init,
    WaitSync,
    Register,
    WaitConfirm,
    Done,
}

impl fmt::Display for MirrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MirrorStage::Init => "init",
            MirrorStage::WaitSync => "wait_sync",
            MirrorStage::Register => "register",
            MirrorStage::WaitConfirm => "wait_confirm",
            MirrorStage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    Registered,
    /// The node refused the registration
    Rejected { error: Option<String> },
}

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("Cannot operate on a null store id.")]
    MissingStoreId,
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub struct MirrorPipeline<'a, S: ?Sized, W: ?Sized> {
    store: &'a S,
    wallet: &'a W,
    settings: &'a Settings,
    reporter: &'a Reporter,
    stage: MirrorStage,
}

impl<'a, S, W> MirrorPipeline<'a, S, W>
where
    S: DataStore + ?Sized,
    W: Wallet + ?Sized,
{
    pub fn new(store: &'a S, wallet: &'a W, settings: &'a Settings, reporter: &'a Reporter) -> Self {
        Self {
            store,
            wallet,
            settings,
            reporter,
            stage: MirrorStage::Init,
        }
    }

    pub fn stage(&self) -> MirrorStage {
        self.stage
    }

    fn enter(&mut self, stage: MirrorStage) {
        tracing::debug!(from = %self.stage, to = %stage, "mirror stage");
        self.stage = stage;
    }

    pub async fn run(&mut self, store_id: &str) -> Result<MirrorOutcome, MirrorError> {
        if store_id.trim().is_empty() {
            return Err(MirrorError::MissingStoreId);
        }

        self.enter(MirrorStage::WaitSync);
        self.wallet.wait_for_all_transactions_to_confirm().await?;

        self.enter(MirrorStage::Register);
        let registration = self.register(store_id).await?;
        if !registration.success {
            match &registration.error {
                Some(error) => self
                    .reporter
                    .error(format!("{}: {}", MIRROR_FAILED_MESSAGE, error)),
                None => self.reporter.error(MIRROR_FAILED_MESSAGE),
            }
            return Ok(MirrorOutcome::Rejected {
                error: registration.error,
            });
        }

        self.enter(MirrorStage::WaitConfirm);
        self.wallet.wait_for_all_transactions_to_confirm().await?;

        self.enter(MirrorStage::Done);
        self.reporter.info(MIRROR_ADDED_MESSAGE);
        Ok(MirrorOutcome::Registered)
    }

    async fn register(&self, store_id: &str) -> Result<MirrorRegistration, RemoteError> {
        match &self.settings.mirror_url_override {
            Some(url) => {
                tracing::info!(store_id, url = %url, "registering mirror");
                self.store
                    .add_mirror(
                        store_id,
                        std::slice::from_ref(url),
                        self.settings.default_mirror_coin_amount,
                        self.settings.default_fee,
                    )
                    .await
            }
            None => {
                tracing::info!(store_id, force_ip4 = self.settings.force_ip4_mirror, "registering mirror for this host");
                self.store
                    .add_mirror_for_current_host(store_id, self.settings.force_ip4_mirror)
                    .await
            }
        }
    }
}

/// Start registering a mirror for `store_id`.
///
/// Must be called from within a Tokio runtime.
pub fn mirror<C: Connector>(connector: C, store_id: impl Into<String>, options: &Options) -> OperationHandle {
    let (reporter, handle) = operation::start(OperationKind::Mirror);
    let store_id = store_id.into();

    let settings = if store_id.trim().is_empty() {
        Err(MirrorError::MissingStoreId)
    } else {
        Settings::from_options(options).map_err(MirrorError::from)
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            reporter.error(e.to_string());
            reporter.finish(OperationStatus::Failed);
            return handle;
        }
    };

    let span = tracing::info_span!("mirror", operation_id = %handle.id(), store_id = %store_id);

    tokio::spawn(
        async move {
            let result: Result<MirrorOutcome, MirrorError> = async {
                let (store, wallet) = connector.connect(&settings)?;
                let mut pipeline = MirrorPipeline::new(&store, &wallet, &settings, &reporter);
                let result = pipeline.run(&store_id).await;
                if result.is_err() {
                    tracing::debug!(stage = %pipeline.stage(), "mirror stopped");
                }
                result
            }
            .await;

            match result {
                Ok(MirrorOutcome::Registered) => reporter.finish(OperationStatus::Succeeded),
                Ok(MirrorOutcome::Rejected { .. }) => reporter.finish(OperationStatus::Failed),
                Err(e) => {
                    tracing::error!("mirror failed: {:?}", e);
                    reporter.error(e.to_string());
                    reporter.finish(OperationStatus::Failed);
                }
            }
        }
        .instrument(span),
    );

    handle
}
