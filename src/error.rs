//! Error types for the card bot.

use std::time::Duration;

/// Top-level error type for a dispatched turn.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Extension command id the bot has no handler for.
    #[error("NotImplemented: extension command {command_id}")]
    NotImplemented { command_id: String },

    #[error("Invalid activity: {0}")]
    InvalidActivity(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load template {path}: {reason}")]
    TemplateLoad { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Card template errors. Fatal to the render call only.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Template {template} requires binding {slot}")]
    MissingBinding { template: String, slot: String },

    #[error("Template data must be a JSON object, got {0}")]
    InvalidData(String),
}

/// Errors from the package search collaborator.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Search endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Search timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid search response: {0}")]
    InvalidResponse(String),
}

/// Outbound conversation errors (send / update).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send activity to conversation {conversation_id}: {reason}")]
    SendFailed {
        conversation_id: String,
        reason: String,
    },

    #[error("Failed to update activity {activity_id}: {reason}")]
    UpdateFailed { activity_id: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
