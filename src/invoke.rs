//! Card-action invoke handler: the `userlike` button on the learn card.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::activity::{CardInvokeAction, ConversationRef};
use crate::cards::TemplateRegistry;
use crate::cards::template::ids;
use crate::error::{Error, Result};
use crate::outbound::{ConversationSink, OutboundActivity};
use crate::state::LikeStore;

/// Verb sent by the learn card's Like button.
pub const USERLIKE_VERB: &str = "userlike";

/// How an invoke was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeOutcome {
    /// The message the card came from was replaced with a re-rendered card.
    Updated { activity_id: String, like_count: u64 },
    /// Accepted, but the verb has no handler; nothing changed.
    Unhandled { verb: String },
}

impl InvokeOutcome {
    /// Status code returned to the platform for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Updated { .. } => 200,
            Self::Unhandled { .. } => 202,
        }
    }
}

pub struct InvokeHandler {
    templates: Arc<TemplateRegistry>,
    likes: Arc<LikeStore>,
}

impl InvokeHandler {
    pub fn new(templates: Arc<TemplateRegistry>, likes: Arc<LikeStore>) -> Self {
        Self { templates, likes }
    }

    /// Handle an adaptive card action. `reply_to_id` is the message the
    /// card was sent in; it is the one that gets updated.
    pub async fn handle(
        &self,
        action: &CardInvokeAction,
        reply_to_id: Option<&str>,
        conversation: &ConversationRef,
        sink: &dyn ConversationSink,
    ) -> Result<InvokeOutcome> {
        if action.verb != USERLIKE_VERB {
            debug!(verb = %action.verb, "Card action verb not handled");
            return Ok(InvokeOutcome::Unhandled {
                verb: action.verb.clone(),
            });
        }

        let activity_id = reply_to_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidActivity("userlike invoke without replyToId".into()))?
            .to_string();

        let like_count = self.likes.increment(&conversation.conversation_id).await;
        let card = self
            .templates
            .render(ids::LEARN, Some(&json!({ "likeCount": like_count })))?;

        sink.update(
            conversation,
            OutboundActivity::update(&activity_id, vec![card.into_attachment()]),
        )
        .await?;

        info!(activity_id = %activity_id, like_count, "Learn card updated");
        Ok(InvokeOutcome::Updated {
            activity_id,
            like_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::outbound::testing::RecordingSink;
    use crate::state::LikeScope;

    fn handler() -> (InvokeHandler, Arc<LikeStore>) {
        let likes = Arc::new(LikeStore::new(LikeScope::Conversation));
        let handler = InvokeHandler::new(Arc::new(TemplateRegistry::builtin()), Arc::clone(&likes));
        (handler, likes)
    }

    fn action(verb: &str) -> CardInvokeAction {
        CardInvokeAction {
            verb: verb.into(),
            data: Value::Null,
        }
    }

    fn conversation() -> ConversationRef {
        ConversationRef {
            service_url: "https://smba.example.net".into(),
            conversation_id: "conv-1".into(),
        }
    }

    #[tokio::test]
    async fn repeated_likes_update_the_same_message_with_increasing_counts() {
        let (handler, likes) = handler();
        let sink = RecordingSink::default();

        for expected in 1..=5u64 {
            let outcome = handler
                .handle(&action("userlike"), Some("msg-7"), &conversation(), &sink)
                .await
                .unwrap();
            assert_eq!(
                outcome,
                InvokeOutcome::Updated {
                    activity_id: "msg-7".into(),
                    like_count: expected
                }
            );
        }

        assert_eq!(likes.get("conv-1").await, 5);
        let updates = sink.updated().await;
        assert_eq!(updates.len(), 5);
        assert!(sink.sent().await.is_empty());

        let counts: Vec<u64> = updates
            .iter()
            .map(|u| {
                assert_eq!(u.id.as_deref(), Some("msg-7"));
                u.attachments[0].content["actions"][0]["data"]["likeCount"]
                    .as_u64()
                    .unwrap()
            })
            .collect();
        assert!(counts.windows(2).all(|w| w[1] > w[0]));
    }

    #[tokio::test]
    async fn other_verbs_are_accepted_without_change() {
        let (handler, likes) = handler();
        let sink = RecordingSink::default();

        let outcome = handler
            .handle(&action("userdislike"), Some("msg-7"), &conversation(), &sink)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            InvokeOutcome::Unhandled {
                verb: "userdislike".into()
            }
        );
        assert_eq!(outcome.status_code(), 202);
        assert_eq!(likes.get("conv-1").await, 0);
        assert!(sink.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_reply_to_id_is_rejected_before_counting() {
        let (handler, likes) = handler();
        let sink = RecordingSink::default();

        let err = handler
            .handle(&action("userlike"), None, &conversation(), &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidActivity(_)));
        assert_eq!(likes.get("conv-1").await, 0);
    }

    #[tokio::test]
    async fn update_failures_propagate() {
        let (handler, _) = handler();
        let sink = RecordingSink::failing_updates();

        let err = handler
            .handle(&action("userlike"), Some("msg-7"), &conversation(), &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Channel(_)));
    }
}
