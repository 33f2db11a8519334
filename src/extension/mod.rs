//! Compose-extension command engine: submit actions, search queries, result
//! selection, and link unfurling.

pub mod update_card;

use std::sync::Arc;

use tracing::{debug, info};

use crate::activity::{ConversationRef, ExtensionQuery, SelectedItem, SubmitAction};
use crate::cards::{CardAction, ExtensionResponse, ExtensionResult, HeroCard};
use crate::error::{Error, Result};
use crate::outbound::ConversationSink;
use crate::search::SearchClient;
use crate::side_effect::SideEffect;

pub use update_card::{CardCounter, UpdateOutcome, send_update_card};

/// Maximum number of search results returned for a query.
pub const SEARCH_RESULT_SIZE: usize = 8;

/// Title of link unfurl cards.
pub const LINK_CARD_TITLE: &str = "Thumbnail Card";

/// Extension command ids.
pub mod commands {
    pub const POST_COMMENT: &str = "postComment";
    pub const OPEN_WEB_URL: &str = "openWebUrl";
}

/// What a submit action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// `postComment`: the card update protocol ran.
    CardUpdate(UpdateOutcome),
    /// `openWebUrl`: navigation only, no card.
    SideEffect(SideEffect),
}

pub struct ExtensionEngine {
    search: Arc<dyn SearchClient>,
    web_url: String,
}

impl ExtensionEngine {
    pub fn new(search: Arc<dyn SearchClient>, web_url: String) -> Self {
        Self { search, web_url }
    }

    /// Dispatch a submit action on its command id.
    pub async fn handle_submit_action(
        &self,
        action: &SubmitAction,
        conversation: &ConversationRef,
        sink: &dyn ConversationSink,
    ) -> Result<SubmitOutcome> {
        match action.command_id.as_str() {
            commands::POST_COMMENT => {
                let outcome =
                    send_update_card(&action.value, comment_actions(), conversation, sink).await?;
                Ok(SubmitOutcome::CardUpdate(outcome))
            }
            commands::OPEN_WEB_URL => Ok(SubmitOutcome::SideEffect(SideEffect::OpenUrl(
                self.web_url.clone(),
            ))),
            other => Err(Error::NotImplemented {
                command_id: other.to_string(),
            }),
        }
    }

    /// Search with the first query parameter and return hero cards whose
    /// previews invoke a selection carrying `{ name, description }`.
    pub async fn handle_query(&self, query: &ExtensionQuery) -> Result<ExtensionResponse> {
        let term = query
            .first_term()
            .ok_or_else(|| Error::InvalidActivity("query without parameters".into()))?;

        let items = self.search.search(&term, SEARCH_RESULT_SIZE).await?;
        info!(term = %term, hits = items.len(), "Extension query");

        let attachments = items
            .into_iter()
            .take(SEARCH_RESULT_SIZE)
            .map(|item| {
                let tap = CardAction::invoke(serde_json::json!({
                    "name": item.name,
                    "description": item.description,
                }));
                let preview = HeroCard::new(&item.name).with_tap(tap).into_attachment();
                HeroCard::new(item.name).into_attachment().with_preview(preview)
            })
            .collect();

        Ok(ExtensionResult::list(attachments).into())
    }

    /// Turn a tapped preview's carried value into a single hero card result.
    pub fn handle_select_item(&self, item: &SelectedItem) -> ExtensionResponse {
        debug!(name = %item.name, "Extension item selected");
        let card = HeroCard::new(&item.name)
            .with_text(&item.description)
            .into_attachment();
        ExtensionResult::list(vec![card]).into()
    }

    /// Unfurl a link into a thumbnail card without fetching it.
    pub fn handle_link_query(&self, url: &str) -> ExtensionResponse {
        debug!(url = url, "Unfurling link");
        let card = HeroCard::new(LINK_CARD_TITLE)
            .with_text(url)
            .with_images([url])
            .into_thumbnail_attachment();
        ExtensionResult::list(vec![card]).into()
    }
}

/// Buttons on the card produced by `postComment`.
fn comment_actions() -> Vec<CardAction> {
    vec![
        CardAction::message_back("Message all members", "MessageAllMembers"),
        CardAction::message_back("Who am I?", "whoami"),
        CardAction::message_back("Delete card", "Delete"),
    ]
}
