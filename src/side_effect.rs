//! Out-of-band side effects returned by handlers and run outside the turn.

use async_trait::async_trait;
use tracing::{info, warn};

/// A fire-and-forget effect a handler asks for instead of performing inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Open a URL in a browser on the bot host.
    OpenUrl(String),
}

impl std::fmt::Display for SideEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenUrl(url) => write!(f, "open {url}"),
        }
    }
}

/// Executes side effects. Failures are logged, never surfaced to the conversation.
#[async_trait]
pub trait SideEffectRunner: Send + Sync {
    async fn run(&self, effect: &SideEffect);
}

/// Only logs the effect. For headless deployments.
pub struct LoggingRunner;

#[async_trait]
impl SideEffectRunner for LoggingRunner {
    async fn run(&self, effect: &SideEffect) {
        info!(effect = %effect, "Side effect skipped (opening URLs disabled)");
    }
}

/// Opens URLs with the platform's default handler.
pub struct BrowserOpener;

impl BrowserOpener {
    fn command(url: &str) -> tokio::process::Command {
        if cfg!(target_os = "macos") {
            let mut cmd = tokio::process::Command::new("open");
            cmd.arg(url);
            cmd
        } else if cfg!(target_os = "windows") {
            let mut cmd = tokio::process::Command::new("cmd");
            cmd.args(["/C", "start", "", url]);
            cmd
        } else {
            let mut cmd = tokio::process::Command::new("xdg-open");
            cmd.arg(url);
            cmd
        }
    }
}

#[async_trait]
impl SideEffectRunner for BrowserOpener {
    async fn run(&self, effect: &SideEffect) {
        match effect {
            SideEffect::OpenUrl(url) => match Self::command(url).status().await {
                Ok(status) if status.success() => info!(url = %url, "Opened URL"),
                Ok(status) => warn!(url = %url, status = %status, "URL opener exited with failure"),
                Err(e) => warn!(url = %url, error = %e, "Failed to launch URL opener"),
            },
        }
    }
}
