use std::path::PathBuf;

use clap::Args;
use common::deploy::DeployMode;
use common::settings::Options;

use crate::cli::op::follow_operation;

#[derive(Args, Debug, Clone)]
pub struct Deploy {
    /// Id of the DataLayer store to write to
    #[arg(long)]
    pub store_id: String,

    /// Directory whose files are deployed
    #[arg(long)]
    pub dir: PathBuf,

    /// merge keeps remote-only keys when orphans are ignored, replace always removes them
    #[arg(long, default_value = "merge")]
    pub mode: DeployMode,

    /// Keep remote keys that have no local file (merge mode only)
    #[arg(long)]
    pub ignore_orphans: bool,

    /// Report every file and part as it is processed
    #[arg(long)]
    pub verbose: bool,

    /// Largest RPC body to send, in bytes
    #[arg(long)]
    pub max_payload: Option<u64>,

    /// Files read per batch
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl Deploy {
    fn options(&self) -> Options {
        Options {
            ignore_orphans: self.ignore_orphans.then_some(true),
            verbose: self.verbose.then_some(true),
            maximum_rpc_payload_size: self.max_payload,
            num_files_processed_per_batch: self.batch_size,
            ..Options::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeployOpError {
    #[error("{0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Deploy {
    type Error = DeployOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let options = ctx.config.chia.clone().overlay(self.options());
        let handle = dlfs::deploy(&self.store_id, &self.dir, self.mode, &options);

        follow_operation(&handle)
            .await
            .map_err(DeployOpError::Failed)?;

        Ok(format!(
            "Deployed {} to store {} ({} mode)",
            self.dir.display(),
            self.store_id,
            self.mode
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        deploy: Deploy,
    }

    #[test]
    fn test_flags_only_override_when_given() {
        let parsed = Wrapper::parse_from(["dlfs", "--store-id", "abc", "--dir", "site"]);
        assert_eq!(parsed.deploy.mode, DeployMode::Merge);
        assert_eq!(parsed.deploy.options(), Options::default());

        let parsed = Wrapper::parse_from([
            "dlfs",
            "--store-id",
            "abc",
            "--dir",
            "site",
            "--mode",
            "replace",
            "--ignore-orphans",
            "--batch-size",
            "10",
        ]);
        assert_eq!(parsed.deploy.mode, DeployMode::Replace);
        let options = parsed.deploy.options();
        assert_eq!(options.ignore_orphans, Some(true));
        assert_eq!(options.num_files_processed_per_batch, Some(10));
        assert_eq!(options.verbose, None);
    }
}
