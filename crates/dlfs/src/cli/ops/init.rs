use std::path::PathBuf;

use clap::Args;

use dlfs::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// DataLayer RPC host (default: https://localhost:8562)
    #[arg(long)]
    pub datalayer_host: Option<String>,

    /// Wallet RPC host (default: https://localhost:9256)
    #[arg(long)]
    pub wallet_host: Option<String>,

    /// Folder holding the node's ssl certificates (default: ~/.chia/mainnet/config/ssl)
    #[arg(long)]
    pub certificate_folder_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] dlfs::state::StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig::default();
        if let Some(host) = &self.datalayer_host {
            config.chia.datalayer_host = Some(host.clone());
        }
        if let Some(host) = &self.wallet_host {
            config.chia.wallet_host = Some(host.clone());
        }
        if let Some(path) = &self.certificate_folder_path {
            config.chia.certificate_folder_path = Some(path.clone());
        }

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let output = format!(
            "Initialized dlfs directory at: {}\n\
             - Config: {}\n\
             - DataLayer host: {}\n\
             - Wallet host: {}",
            state.dlfs_dir.display(),
            state.config_path.display(),
            state.config.chia.datalayer_host.as_deref().unwrap_or_default(),
            state.config.chia.wallet_host.as_deref().unwrap_or_default(),
        );

        Ok(output)
    }
}
