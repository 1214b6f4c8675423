use std::error::Error;
use std::path::PathBuf;

use common::operation::{EventKind, OperationHandle, OperationStatus};
use dlfs::state::{AppConfig, AppState, StateError};

#[derive(Debug, Clone)]
pub struct OpContext {
    /// Optional custom config path (defaults to ~/.dlfs)
    pub config_path: Option<PathBuf>,
    /// Loaded configuration, or the built-in defaults when there is none
    pub config: AppConfig,
}

impl OpContext {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, StateError> {
        let config = AppState::load_or_default(config_path.clone())?;
        Ok(Self {
            config_path,
            config,
        })
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

/// Print an operation's info events as they arrive and wait for it to end.
///
/// On failure the error events are returned, one per line.
pub async fn follow_operation(handle: &OperationHandle) -> Result<(), String> {
    let events = handle.subscribe();
    let mut errors = Vec::new();

    while let Ok(event) = events.recv_async().await {
        match event.kind {
            EventKind::Info => println!("{}", event.message),
            EventKind::Error => errors.push(event.message),
        }
    }

    match handle.wait().await {
        OperationStatus::Succeeded => Ok(()),
        _ if errors.is_empty() => Err(format!("{} operation failed", handle.kind())),
        _ => Err(errors.join("\n")),
    }
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
