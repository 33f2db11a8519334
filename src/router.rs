//! Command router: maps normalized message text to what the bot does.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::cards::template::ids;
use crate::cards::{RenderedCard, TemplateRegistry};
use crate::error::TemplateError;
use crate::side_effect::SideEffect;
use crate::state::LikeStore;

/// Text commands the bot recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Welcome,
    Learn,
    Google,
}

impl Command {
    /// Parse normalized text. Unrecognized text is `None`, never an error.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "welcome" => Some(Self::Welcome),
            "learn" => Some(Self::Learn),
            "google" => Some(Self::Google),
            _ => None,
        }
    }
}

/// What to do in response to a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Send the card as a new message.
    Send(RenderedCard),
    /// Run a side effect; nothing is posted to the conversation.
    SideEffect(SideEffect),
    /// Ignore the message.
    NoOp,
}

pub struct CommandRouter {
    templates: Arc<TemplateRegistry>,
    likes: Arc<LikeStore>,
    google_url: String,
}

impl CommandRouter {
    pub fn new(templates: Arc<TemplateRegistry>, likes: Arc<LikeStore>, google_url: String) -> Self {
        Self {
            templates,
            likes,
            google_url,
        }
    }

    /// Route normalized `text` from `conversation_id`.
    ///
    /// Only a broken template set can make this fail; any text is accepted.
    pub async fn route(&self, text: &str, conversation_id: &str) -> Result<Route, TemplateError> {
        let Some(command) = Command::parse(text) else {
            debug!(text = text, "No command matched");
            return Ok(Route::NoOp);
        };
        debug!(command = ?command, "Command matched");

        match command {
            Command::Welcome => Ok(Route::Send(self.templates.render(ids::WELCOME, None)?)),
            Command::Learn => {
                let like_count = self.likes.reset(conversation_id).await;
                let data = json!({ "likeCount": like_count });
                Ok(Route::Send(self.templates.render(ids::LEARN, Some(&data))?))
            }
            Command::Google => Ok(Route::SideEffect(SideEffect::OpenUrl(
                self.google_url.clone(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LikeScope;

    fn router() -> (CommandRouter, Arc<LikeStore>) {
        let likes = Arc::new(LikeStore::new(LikeScope::Conversation));
        let router = CommandRouter::new(
            Arc::new(TemplateRegistry::builtin()),
            Arc::clone(&likes),
            "https://google.com/".into(),
        );
        (router, likes)
    }

    #[tokio::test]
    async fn welcome_renders_welcome_card() {
        let (router, _) = router();
        match router.route("welcome", "c").await.unwrap() {
            Route::Send(card) => assert_eq!(card.template_id, ids::WELCOME),
            other => panic!("Expected Send, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn learn_resets_counter_and_renders_zero() {
        let (router, likes) = router();
        likes.increment("c").await;
        likes.increment("c").await;

        match router.route("learn", "c").await.unwrap() {
            Route::Send(card) => {
                assert_eq!(card.template_id, ids::LEARN);
                assert_eq!(card.content["actions"][0]["data"]["likeCount"], 0);
            }
            other => panic!("Expected Send, got {other:?}"),
        }
        assert_eq!(likes.get("c").await, 0);
    }

    #[tokio::test]
    async fn google_is_a_side_effect_only() {
        let (router, _) = router();
        assert_eq!(
            router.route("google", "c").await.unwrap(),
            Route::SideEffect(SideEffect::OpenUrl("https://google.com/".into()))
        );
    }

    #[tokio::test]
    async fn anything_else_is_a_no_op() {
        let (router, likes) = router();
        likes.increment("c").await;
        for text in ["", "hello", "welcome please", "learning", "googl", "WELCOME", "😀"] {
            assert_eq!(router.route(text, "c").await.unwrap(), Route::NoOp, "text: {text:?}");
        }
        // No-op never touches the counter.
        assert_eq!(likes.get("c").await, 1);
    }

    #[test]
    fn command_parse_is_exact() {
        assert_eq!(Command::parse("learn"), Some(Command::Learn));
        assert_eq!(Command::parse(" learn"), None);
    }
}
