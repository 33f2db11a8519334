//! Activity dispatcher: classifies each inbound activity and hands it to the
//! router, the invoke handler, or the extension engine.

use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::activity::{Activity, ActivityKind, ChannelAccount, ConversationRef};
use crate::cards::template::ids;
use crate::cards::{ExtensionResponse, TemplateRegistry};
use crate::error::Result;
use crate::extension::{ExtensionEngine, SubmitOutcome};
use crate::invoke::{InvokeHandler, InvokeOutcome};
use crate::outbound::{ConversationSink, OutboundActivity};
use crate::router::{CommandRouter, Route};
use crate::search::SearchClient;
use crate::side_effect::SideEffect;
use crate::state::LikeStore;

/// What a dispatched turn produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Message or membership turn; `sent` new messages were posted.
    Completed { sent: usize },
    /// Adaptive card action.
    CardInvoke(InvokeOutcome),
    /// Compose-extension submit action.
    Submitted(SubmitOutcome),
    /// Compose-extension result list (query, selection, link unfurl).
    ExtensionResult(ExtensionResponse),
    /// Activity kind the bot does not handle.
    Ignored,
}

/// Outcome plus the side effects the host should run after the turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResponse {
    pub outcome: TurnOutcome,
    pub side_effects: Vec<SideEffect>,
}

impl TurnResponse {
    fn new(outcome: TurnOutcome) -> Self {
        Self {
            outcome,
            side_effects: Vec::new(),
        }
    }

    fn with_side_effect(mut self, effect: SideEffect) -> Self {
        self.side_effects.push(effect);
        self
    }
}

/// Everything the dispatcher needs, injected at construction.
pub struct DispatcherDeps {
    pub templates: Arc<TemplateRegistry>,
    pub likes: Arc<LikeStore>,
    pub search: Arc<dyn SearchClient>,
    pub sink: Arc<dyn ConversationSink>,
    pub google_url: String,
    pub web_url: String,
}

pub struct ActivityDispatcher {
    templates: Arc<TemplateRegistry>,
    likes: Arc<LikeStore>,
    router: CommandRouter,
    invoke: InvokeHandler,
    extension: ExtensionEngine,
    sink: Arc<dyn ConversationSink>,
}

impl ActivityDispatcher {
    pub fn new(deps: DispatcherDeps) -> Self {
        Self {
            router: CommandRouter::new(
                Arc::clone(&deps.templates),
                Arc::clone(&deps.likes),
                deps.google_url,
            ),
            invoke: InvokeHandler::new(Arc::clone(&deps.templates), Arc::clone(&deps.likes)),
            extension: ExtensionEngine::new(deps.search, deps.web_url),
            templates: deps.templates,
            likes: deps.likes,
            sink: deps.sink,
        }
    }

    /// Like counters, for inspection.
    pub fn likes(&self) -> &Arc<LikeStore> {
        &self.likes
    }

    /// Handle one inbound activity.
    pub async fn dispatch(&self, activity: &Activity) -> Result<TurnResponse> {
        let span = info_span!(
            "turn",
            turn_id = %Uuid::new_v4(),
            activity_type = %activity.activity_type,
            conversation_id = %activity.conversation.id,
        );
        self.dispatch_inner(activity).instrument(span).await
    }

    async fn dispatch_inner(&self, activity: &Activity) -> Result<TurnResponse> {
        let conversation = activity.conversation_ref();
        let kind = activity.classify()?;

        match kind {
            ActivityKind::Message { text } => self.on_message(&text, &conversation).await,
            ActivityKind::MembersAdded { members } => {
                self.on_members_added(&members, &conversation).await
            }
            ActivityKind::CardInvoke(action) => {
                let outcome = self
                    .invoke
                    .handle(
                        &action,
                        activity.reply_to_id.as_deref(),
                        &conversation,
                        self.sink.as_ref(),
                    )
                    .await?;
                Ok(TurnResponse::new(TurnOutcome::CardInvoke(outcome)))
            }
            ActivityKind::ExtensionSubmit(action) => {
                let outcome = self
                    .extension
                    .handle_submit_action(&action, &conversation, self.sink.as_ref())
                    .await?;
                let response = TurnResponse::new(TurnOutcome::Submitted(outcome.clone()));
                Ok(match outcome {
                    SubmitOutcome::SideEffect(effect) => response.with_side_effect(effect),
                    SubmitOutcome::CardUpdate(_) => response,
                })
            }
            ActivityKind::ExtensionQuery(query) => {
                let result = self.extension.handle_query(&query).await?;
                Ok(TurnResponse::new(TurnOutcome::ExtensionResult(result)))
            }
            ActivityKind::ExtensionSelect(item) => Ok(TurnResponse::new(
                TurnOutcome::ExtensionResult(self.extension.handle_select_item(&item)),
            )),
            ActivityKind::LinkQuery { url } => Ok(TurnResponse::new(
                TurnOutcome::ExtensionResult(self.extension.handle_link_query(&url)),
            )),
            ActivityKind::Unhandled {
                activity_type,
                name,
            } => {
                debug!(activity_type = %activity_type, name = ?name, "Activity ignored");
                Ok(TurnResponse::new(TurnOutcome::Ignored))
            }
        }
    }

    async fn on_message(&self, text: &str, conversation: &ConversationRef) -> Result<TurnResponse> {
        info!(text = text, "Running with message activity");
        match self.router.route(text, &conversation.conversation_id).await? {
            Route::Send(card) => {
                self.sink
                    .send(conversation, OutboundActivity::message(vec![card.into_attachment()]))
                    .await?;
                Ok(TurnResponse::new(TurnOutcome::Completed { sent: 1 }))
            }
            Route::SideEffect(effect) => {
                Ok(TurnResponse::new(TurnOutcome::Completed { sent: 0 }).with_side_effect(effect))
            }
            Route::NoOp => Ok(TurnResponse::new(TurnOutcome::Completed { sent: 0 })),
        }
    }

    /// Greet once per batch: the first member with an id gets the welcome card.
    async fn on_members_added(
        &self,
        members: &[ChannelAccount],
        conversation: &ConversationRef,
    ) -> Result<TurnResponse> {
        let Some(member) = members.iter().find(|m| !m.id.is_empty()) else {
            return Ok(TurnResponse::new(TurnOutcome::Completed { sent: 0 }));
        };

        let card = self.templates.render(ids::WELCOME, None)?;
        self.sink
            .send(conversation, OutboundActivity::message(vec![card.into_attachment()]))
            .await?;
        info!(member_id = %member.id, batch = members.len(), "Welcome card sent");
        Ok(TurnResponse::new(TurnOutcome::Completed { sent: 1 }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::activity::{Entity, invoke_names};
    use crate::error::Error;
    use crate::extension::UpdateOutcome;
    use crate::outbound::testing::RecordingSink;
    use crate::search::testing::StubSearch;
    use crate::state::LikeScope;

    struct Harness {
        dispatcher: ActivityDispatcher,
        sink: Arc<RecordingSink>,
    }

    fn harness_with(sink: RecordingSink, scope: LikeScope) -> Harness {
        let sink = Arc::new(sink);
        let dispatcher = ActivityDispatcher::new(DispatcherDeps {
            templates: Arc::new(TemplateRegistry::builtin()),
            likes: Arc::new(LikeStore::new(scope)),
            search: Arc::new(StubSearch::with_items(10)),
            sink: Arc::clone(&sink) as Arc<dyn ConversationSink>,
            google_url: "https://google.com/".into(),
            web_url: "https://google.pt?query=test".into(),
        });
        Harness { dispatcher, sink }
    }

    fn harness() -> Harness {
        harness_with(RecordingSink::default(), LikeScope::Conversation)
    }

    fn bot() -> ChannelAccount {
        ChannelAccount {
            id: "28:bot".into(),
            name: Some("CardBot".into()),
        }
    }

    fn message(text: &str, conversation_id: &str) -> Activity {
        Activity::message(text)
            .with_conversation(conversation_id)
            .with_recipient(bot())
            .with_entity(Entity {
                kind: "mention".into(),
                mentioned: Some(bot()),
                text: Some("<at>CardBot</at>".into()),
            })
    }

    fn like(conversation_id: &str, reply_to: &str) -> Activity {
        Activity::invoke(
            invoke_names::ADAPTIVE_CARD_ACTION,
            json!({"action": {"type": "Action.Execute", "verb": "userlike"}}),
        )
        .with_conversation(conversation_id)
        .with_reply_to(reply_to)
    }

    fn like_count_of(activity: &OutboundActivity) -> u64 {
        activity.attachments[0].content["actions"][0]["data"]["likeCount"]
            .as_u64()
            .unwrap()
    }

    #[tokio::test]
    async fn mentioned_welcome_sends_welcome_card() {
        let h = harness();
        let response = h
            .dispatcher
            .dispatch(&message("<at>CardBot</at> Welcome\r\n", "c1"))
            .await
            .unwrap();
        assert_eq!(response.outcome, TurnOutcome::Completed { sent: 1 });
        let sent = h.sink.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].attachments[0].content["body"][0]["text"], "Your Hello World Bot is Running");
    }

    #[tokio::test]
    async fn unrecognized_text_does_nothing() {
        let h = harness();
        for text in ["hello", "help", "learn more", ""] {
            let response = h.dispatcher.dispatch(&message(text, "c1")).await.unwrap();
            assert_eq!(response.outcome, TurnOutcome::Completed { sent: 0 });
            assert!(response.side_effects.is_empty());
        }
        assert!(h.sink.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn google_returns_side_effect_without_reply() {
        let h = harness();
        let response = h.dispatcher.dispatch(&message("GOOGLE", "c1")).await.unwrap();
        assert_eq!(
            response.side_effects,
            vec![SideEffect::OpenUrl("https://google.com/".into())]
        );
        assert!(h.sink.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn learn_after_likes_starts_from_zero() {
        let h = harness();
        h.dispatcher.dispatch(&like("c1", "m1")).await.unwrap();
        h.dispatcher.dispatch(&like("c1", "m1")).await.unwrap();
        assert_eq!(h.dispatcher.likes().get("c1").await, 2);

        h.dispatcher.dispatch(&message("welcome", "c1")).await.unwrap();
        h.dispatcher.dispatch(&message("learn", "c1")).await.unwrap();

        let sent = h.sink.sent().await;
        assert_eq!(like_count_of(sent.last().unwrap()), 0);
        assert_eq!(h.dispatcher.likes().get("c1").await, 0);
    }

    #[tokio::test]
    async fn n_likes_yield_n_updates_to_the_same_message() {
        let h = harness();
        h.dispatcher.dispatch(&message("learn", "c1")).await.unwrap();
        for _ in 0..4 {
            let response = h.dispatcher.dispatch(&like("c1", "m1")).await.unwrap();
            assert!(matches!(
                response.outcome,
                TurnOutcome::CardInvoke(InvokeOutcome::Updated { .. })
            ));
        }
        let updates = h.sink.updated().await;
        assert_eq!(updates.len(), 4);
        assert!(updates.iter().all(|u| u.id.as_deref() == Some("m1")));
        let counts: Vec<u64> = updates.iter().map(like_count_of).collect();
        assert_eq!(counts, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn likes_are_scoped_per_conversation_by_default() {
        let h = harness();
        h.dispatcher.dispatch(&like("c1", "m1")).await.unwrap();
        h.dispatcher.dispatch(&like("c2", "m2")).await.unwrap();
        assert_eq!(h.dispatcher.likes().get("c1").await, 1);
        assert_eq!(h.dispatcher.likes().get("c2").await, 1);
    }

    #[tokio::test]
    async fn global_scope_shares_likes_across_conversations() {
        let h = harness_with(RecordingSink::default(), LikeScope::Global);
        h.dispatcher.dispatch(&like("c1", "m1")).await.unwrap();
        h.dispatcher.dispatch(&like("c2", "m2")).await.unwrap();
        let updates = h.sink.updated().await;
        assert_eq!(like_count_of(&updates[1]), 2);
    }

    #[tokio::test]
    async fn members_added_greets_first_member_with_id_only() {
        let h = harness();
        let activity = Activity::members_added(vec![
            ChannelAccount::default(),
            ChannelAccount {
                id: "29:alice".into(),
                name: None,
            },
            ChannelAccount {
                id: "29:bob".into(),
                name: None,
            },
        ])
        .with_conversation("c1");

        let response = h.dispatcher.dispatch(&activity).await.unwrap();
        assert_eq!(response.outcome, TurnOutcome::Completed { sent: 1 });
        assert_eq!(h.sink.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn members_added_without_ids_sends_nothing() {
        let h = harness();
        let activity = Activity::members_added(vec![ChannelAccount::default()]);
        let response = h.dispatcher.dispatch(&activity).await.unwrap();
        assert_eq!(response.outcome, TurnOutcome::Completed { sent: 0 });
        assert!(h.sink.sent().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_submit_command_is_rejected_without_output() {
        let h = harness();
        let activity = Activity::invoke(invoke_names::SUBMIT_ACTION, json!({"commandId": "unknownCmd"}));
        let err = h.dispatcher.dispatch(&activity).await.unwrap_err();
        assert!(matches!(err, Error::NotImplemented { .. }));
        assert!(h.sink.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn open_web_url_submit_returns_side_effect() {
        let h = harness();
        let activity = Activity::invoke(invoke_names::SUBMIT_ACTION, json!({"commandId": "openWebUrl"}));
        let response = h.dispatcher.dispatch(&activity).await.unwrap();
        assert_eq!(
            response.side_effects,
            vec![SideEffect::OpenUrl("https://google.pt?query=test".into())]
        );
    }

    #[tokio::test]
    async fn post_comment_update_failure_is_suppressed_not_raised() {
        let h = harness_with(RecordingSink::failing_updates(), LikeScope::Conversation);
        let activity = Activity::invoke(
            invoke_names::SUBMIT_ACTION,
            json!({
                "commandId": "postComment",
                "messagePayload": {"attachments": [{"id": "att-1", "contentType": "x", "content": "{}"}]}
            }),
        );
        let response = h.dispatcher.dispatch(&activity).await.unwrap();
        assert!(matches!(
            response.outcome,
            TurnOutcome::Submitted(SubmitOutcome::CardUpdate(UpdateOutcome::Suppressed { count: 1, .. }))
        ));
    }

    #[tokio::test]
    async fn query_select_and_link_return_extension_results() {
        let h = harness();

        let query = Activity::invoke(
            invoke_names::QUERY,
            json!({"parameters": [{"name": "searchQuery", "value": "react"}]}),
        );
        match h.dispatcher.dispatch(&query).await.unwrap().outcome {
            TurnOutcome::ExtensionResult(r) => assert_eq!(r.compose_extension.attachments.len(), 8),
            other => panic!("Expected ExtensionResult, got {other:?}"),
        }

        let select = Activity::invoke(
            invoke_names::SELECT_ITEM,
            json!({"name": "lodash", "description": "utils"}),
        );
        match h.dispatcher.dispatch(&select).await.unwrap().outcome {
            TurnOutcome::ExtensionResult(r) => {
                assert_eq!(r.compose_extension.attachments[0].content["title"], "lodash")
            }
            other => panic!("Expected ExtensionResult, got {other:?}"),
        }

        let link = Activity::invoke(invoke_names::QUERY_LINK, json!({"url": "https://example.com"}));
        match h.dispatcher.dispatch(&link).await.unwrap().outcome {
            TurnOutcome::ExtensionResult(r) => assert_eq!(r.compose_extension.attachments.len(), 1),
            other => panic!("Expected ExtensionResult, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_activity_types_are_ignored() {
        let h = harness();
        let response = h.dispatcher.dispatch(&Activity::new("typing")).await.unwrap();
        assert_eq!(response.outcome, TurnOutcome::Ignored);
    }
}
