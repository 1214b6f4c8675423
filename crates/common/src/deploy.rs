//! Deploying a directory into a store
//!
//! ```text
//! INIT -> CHECK_SYNC -> (CLEANUP)? -> WALK_AND_BUILD <-> SUBMIT -> DONE
//! ```
//!
//! Any stage can fail into an error, which ends the operation where it
//! stands. Nothing is rolled back: batches already applied stay applied.
//! Every batch is submitted on its own and awaited before the next one is
//! built, so deletes always land before inserts and parts before manifests.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::Instrument;

use crate::changelist::{ChangeBatch, ChangeListBuilder, ChangeListError};
use crate::chunker::{ChunkError, FileChunker};
use crate::codec;
use crate::operation::{self, OperationHandle, OperationKind, OperationStatus, Reporter};
use crate::orphans::{resolve_orphans, scan_local_keys, OrphanError};
use crate::remote::{Connector, DataStore, RemoteError, Wallet};
use crate::settings::{Options, Settings, SettingsError};
use crate::walker::{DirectoryWalker, WalkError};

pub const DEPLOY_COMPLETED_MESSAGE: &str = "Deploy operation completed successfully.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeployMode {
    /// Keep remote keys unless orphan cleanup is enabled
    #[default]
    Merge,
    /// Always remove remote keys with no local counterpart
    Replace,
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployMode::Merge => write!(f, "merge"),
            DeployMode::Replace => write!(f, "replace"),
        }
    }
}

impl FromStr for DeployMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "merge" => Ok(DeployMode::Merge),
            "replace" => Ok(DeployMode::Replace),
            other => Err(format!("unknown deploy mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    Init,
    CheckSync,
    Cleanup,
    WalkAndBuild,
    Submit,
    Done,
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployStage::Init => "init",
            DeployStage::CheckSync => "check_sync",
            DeployStage::Cleanup => "cleanup",
            DeployStage::WalkAndBuild => "walk_and_build",
            DeployStage::Submit => "submit",
            DeployStage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub store_id: String,
    pub deploy_dir: PathBuf,
    pub mode: DeployMode,
}

impl DeployRequest {
    pub fn new(store_id: impl Into<String>, deploy_dir: impl Into<PathBuf>, mode: DeployMode) -> Self {
        Self {
            store_id: store_id.into(),
            deploy_dir: deploy_dir.into(),
            mode,
        }
    }

    /// Checks that need no remote call.
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.store_id.trim().is_empty() {
            return Err(DeployError::MissingStoreId);
        }
        if !self.deploy_dir.is_dir() {
            return Err(DeployError::DirectoryNotFound(self.deploy_dir.clone()));
        }
        Ok(())
    }

    /// Whether orphaned keys are removed before deploying.
    pub fn cleans_up(&self, settings: &Settings) -> bool {
        match self.mode {
            DeployMode::Replace => true,
            DeployMode::Merge => !settings.ignore_orphans,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Cannot operate on a null store id.")]
    MissingStoreId,
    #[error("The directory \"{}\" does not exist. Please specify a valid directory.", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("The wallet is not synced. Please wait for it to sync and try again.")]
    WalletNotSynced,
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Walk(#[from] WalkError),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    ChangeList(#[from] ChangeListError),
    #[error(transparent)]
    Orphans(#[from] OrphanError),
}

impl DeployError {
    /// Message for the operation's error event.
    pub fn report(&self) -> String {
        match self {
            DeployError::MissingStoreId
            | DeployError::DirectoryNotFound(_)
            | DeployError::WalletNotSynced => self.to_string(),
            _ => format!("Deployment error: {}", self),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploySummary {
    pub orphans_deleted: usize,
    pub cleanup_batches: usize,
    pub files: usize,
    pub insert_batches: usize,
}

pub struct DeployPipeline<'a, S: ?Sized, W: ?Sized> {
    store: &'a S,
    wallet: &'a W,
    settings: &'a Settings,
    reporter: &'a Reporter,
    stage: DeployStage,
}

impl<'a, S, W> DeployPipeline<'a, S, W>
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
            stage: DeployStage::Init,
        }
    }

    pub fn stage(&self) -> DeployStage {
        self.stage
    }

    fn enter(&mut self, stage: DeployStage) {
        tracing::debug!(from = %self.stage, to = %stage, "deploy stage");
        self.stage = stage;
    }

    pub async fn run(&mut self, request: &DeployRequest) -> Result<DeploySummary, DeployError> {
        request.validate()?;
        let chunker = FileChunker::new(self.settings)?;
        let builder = ChangeListBuilder::new(self.settings.maximum_rpc_payload_size);
        let store_id = request.store_id.as_str();
        let mut summary = DeploySummary::default();

        self.enter(DeployStage::CheckSync);
        if !self.wallet.wallet_is_synced().await? {
            return Err(DeployError::WalletNotSynced);
        }

        // every key this deploy writes, checked for collisions before the store is touched
        let local_keys = scan_local_keys(&request.deploy_dir, self.settings).await?;

        let existing = if request.cleans_up(self.settings) {
            self.enter(DeployStage::Cleanup);
            self.cleanup(request, &local_keys, &mut summary).await?
        } else {
            let keys = self.store.get_keys(store_id).await?;
            keys.iter().map(|key| codec::normalize_key(key)).collect()
        };

        self.enter(DeployStage::WalkAndBuild);
        let mut walker = DirectoryWalker::new(&request.deploy_dir, self.settings.num_files_processed_per_batch)?;

        loop {
            let (next, batch) = walker.next_batch_blocking().await?;
            walker = next;
            let Some(entries) = batch else {
                break;
            };
            let mut pending = Vec::with_capacity(entries.len());

            for entry in &entries {
                if self.settings.verbose {
                    self.reporter.info(format!("Processing {}", entry.relative_path));
                }
                let kv = chunker
                    .process(entry, self.store, store_id, &existing, self.reporter)
                    .await?;
                pending.push(kv);
            }
            summary.files += entries.len();

            let changelist = builder.build_upserts(pending, &existing, true)?;

            self.enter(DeployStage::Submit);
            let total = changelist.len();
            for (index, chunk) in changelist.iter().enumerate() {
                self.reporter.info(format!(
                    "Sending chunk #{} of {} to datalayer. Size {}",
                    index + 1,
                    total,
                    chunk.serialized_size()
                ));
                self.submit(store_id, chunk).await?;
            }
            summary.insert_batches += total;
            self.enter(DeployStage::WalkAndBuild);
        }

        self.enter(DeployStage::Done);
        self.reporter.info(DEPLOY_COMPLETED_MESSAGE);
        Ok(summary)
    }

    /// Delete orphaned keys. Returns the remote keys that are left.
    async fn cleanup(
        &mut self,
        request: &DeployRequest,
        local_keys: &HashSet<String>,
        summary: &mut DeploySummary,
    ) -> Result<HashSet<String>, DeployError> {
        let report = resolve_orphans(
            self.store,
            &request.store_id,
            local_keys,
            self.settings,
        )
        .await?;

        self.reporter.info("Cleaning up orphaned files.");
        let total = report.deletes.len();
        for (index, chunk) in report.deletes.iter().enumerate() {
            self.reporter.info(format!(
                "Sending cleanup chunk #{} of {} to datalayer.",
                index + 1,
                total
            ));
            self.submit(&request.store_id, chunk).await?;
        }

        summary.orphans_deleted = report.orphan_count;
        summary.cleanup_batches = total;
        Ok(report.remaining)
    }

    async fn submit(&self, store_id: &str, batch: &ChangeBatch) -> Result<(), DeployError> {
        self.store
            .update_data_store(store_id, batch.operations())
            .await
            .map_err(DeployError::from)
    }
}

/// Start deploying `deploy_dir` into `store_id`.
///
/// Validation happens before this returns; the rest runs on a spawned task.
/// Must be called from within a Tokio runtime.
pub fn deploy<C: Connector>(
    connector: C,
    store_id: impl Into<String>,
    deploy_dir: impl Into<PathBuf>,
    mode: DeployMode,
    options: &Options,
) -> OperationHandle {
    let (reporter, handle) = operation::start(OperationKind::Deploy);
    let request = DeployRequest::new(store_id, deploy_dir, mode);

    let settings = match request.validate().and_then(|_| {
        let settings = Settings::from_options(options)?;
        settings.chunk_size()?;
        Ok(settings)
    }) {
        Ok(settings) => settings,
        Err(e) => {
            reporter.error(e.report());
            reporter.finish(OperationStatus::Failed);
            return handle;
        }
    };

    let span = tracing::info_span!(
        "deploy",
        operation_id = %handle.id(),
        store_id = %request.store_id,
        mode = %request.mode,
    );

    tokio::spawn(
        async move {
            let result: Result<DeploySummary, DeployError> = async {
                let (store, wallet) = connector.connect(&settings)?;
                let mut pipeline = DeployPipeline::new(&store, &wallet, &settings, &reporter);
                let result = pipeline.run(&request).await;
                if result.is_err() {
                    tracing::debug!(stage = %pipeline.stage(), "deploy stopped");
                }
                result
            }
            .await;

            match result {
                Ok(summary) => {
                    tracing::debug!(?summary, "deploy finished");
                    reporter.finish(OperationStatus::Succeeded);
                }
                Err(e) => {
                    tracing::error!("deploy failed: {:?}", e);
                    reporter.error(e.report());
                    reporter.finish(OperationStatus::Failed);
                }
            }
        }
        .instrument(span),
    );

    handle
}
