use clap::Args;
use common::settings::Options;

use crate::cli::op::follow_operation;

#[derive(Args, Debug, Clone)]
pub struct Mirror {
    /// Id of the DataLayer store to mirror
    #[arg(long)]
    pub store_id: String,

    /// Mirror url to register instead of this host's address
    #[arg(long)]
    pub url: Option<String>,

    /// Detect this host's address over IPv4 only
    #[arg(long)]
    pub force_ip4: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum MirrorOpError {
    #[error("{0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Mirror {
    type Error = MirrorOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let flags = Options {
            mirror_url_override: self.url.clone(),
            force_ip4_mirror: self.force_ip4.then_some(true),
            ..Options::default()
        };
        let options = ctx.config.chia.clone().overlay(flags);
        let handle = dlfs::mirror(&self.store_id, &options);

        follow_operation(&handle)
            .await
            .map_err(MirrorOpError::Failed)?;

        Ok(format!("Mirror registered for store {}", self.store_id))
    }
}
