use std::sync::Arc;

use orderbot_channel::{ChannelRunner, ConsoleTransport, ReconnectPolicy};
use orderbot_core::config::{AppConfig, LoadOptions};
use orderbot_server::bootstrap_with_config;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::commands::{current_thread_runtime, CommandResult};

pub const DEFAULT_CONVERSATION: &str = "console";

/// Interactive conversation on stdin/stdout against the configured backends.
pub fn run(conversation_id: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(run_with(config, tokio::io::stdin(), tokio::io::stdout(), conversation_id))
}

pub async fn run_with<R, W>(
    config: AppConfig,
    reader: R,
    writer: W,
    conversation_id: &str,
) -> CommandResult
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let app = match bootstrap_with_config(config).await {
        Ok(app) => app,
        Err(error) => return CommandResult::failure("chat", "bootstrap", error.to_string(), 4),
    };

    let transport = Arc::new(ConsoleTransport::new(reader, writer, conversation_id));
    let runner = ChannelRunner::new(
        transport,
        Arc::new(app.service.clone()),
        ReconnectPolicy { max_retries: 0, ..ReconnectPolicy::default() },
    );
    let outcome = runner.start().await;

    let sessions = app.service.session_count().await;
    if let Some(pool) = app.db_pool {
        pool.close().await;
    }

    match outcome {
        Ok(()) => CommandResult::success(
            "chat",
            format!("conversation `{conversation_id}` closed ({sessions} session(s) still open)"),
        ),
        Err(error) => CommandResult::failure("chat", "channel", error.to_string(), 5),
    }
}
