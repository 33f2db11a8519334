//! Card Bot: activity dispatch and card-state protocol for a chat platform bot.

pub mod activity;
pub mod cards;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extension;
pub mod invoke;
pub mod outbound;
pub mod router;
pub mod search;
pub mod server;
pub mod side_effect;
pub mod state;
