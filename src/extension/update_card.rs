//! Card update protocol for compose-extension actions.
//!
//! The counter shown on an updated card lives in the card's own action
//! value. Clicking "Update Card" sends that value back, so each card instance
//! counts its own clicks and the server keeps nothing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::activity::ConversationRef;
use crate::cards::{Attachment, CardAction, HeroCard};
use crate::error::{Error, Result};
use crate::outbound::{ConversationSink, OutboundActivity};

/// Version written next to the counter in the carried value.
pub const COUNTER_VERSION: u32 = 1;

/// Client-held counter state, embedded in the action value and echoed back
/// verbatim by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCounter {
    #[serde(default)]
    pub count: u64,
    #[serde(default = "default_version")]
    pub count_version: u32,
}

fn default_version() -> u32 {
    COUNTER_VERSION
}

impl CardCounter {
    /// Read the counter from an invoke value. A value that never carried a
    /// counter starts at 0.
    pub fn read(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| Error::InvalidActivity(format!("card counter: {e}")))
    }

    pub fn next(self) -> Self {
        Self {
            count: self.count.saturating_add(1),
            count_version: COUNTER_VERSION,
        }
    }

    /// Copy of `value` carrying this counter.
    pub fn write_into(&self, value: &Value) -> Value {
        let mut updated = match value {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        updated.insert("count".into(), Value::from(self.count));
        updated.insert("countVersion".into(), Value::from(self.count_version));
        Value::Object(updated)
    }
}

/// Result of pushing an updated card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The message now shows `count`.
    Updated { activity_id: String, count: u64 },
    /// The update call failed; the failure was logged and not propagated.
    Suppressed {
        activity_id: String,
        count: u64,
        reason: String,
    },
}

/// The card the user last saw, as embedded in the invoke value.
fn embedded_attachment(value: &Value) -> Result<Attachment> {
    let raw = value
        .pointer("/messagePayload/attachments/0")
        .ok_or_else(|| Error::InvalidActivity("submit action without messagePayload attachment".into()))?;
    let attachment: Attachment = serde_json::from_value(raw.clone())
        .map_err(|e| Error::InvalidActivity(format!("embedded attachment: {e}")))?;
    attachment
        .content_json()
        .map_err(|e| Error::InvalidActivity(format!("embedded attachment content: {e}")))?;
    Ok(attachment)
}

/// Increment the counter carried in `value`, render the updated card with
/// `buttons` plus an "Update Card" action carrying the new value, and replace
/// the embedded attachment's message.
pub async fn send_update_card(
    value: &Value,
    mut buttons: Vec<CardAction>,
    conversation: &ConversationRef,
    sink: &dyn ConversationSink,
) -> Result<UpdateOutcome> {
    let attachment = embedded_attachment(value)?;
    let activity_id = attachment
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::InvalidActivity("embedded attachment without id".into()))?;

    let counter = CardCounter::read(value)?.next();
    buttons.push(
        CardAction::message_back("Update Card", "UpdateCardAction")
            .with_value(counter.write_into(value)),
    );

    let card = HeroCard::new("Updated card")
        .with_text(format!("Update count: {}", counter.count))
        .with_buttons(buttons)
        .into_attachment()
        .with_id(&activity_id);

    match sink
        .update(conversation, OutboundActivity::update(&activity_id, vec![card]))
        .await
    {
        Ok(()) => {
            info!(activity_id = %activity_id, count = counter.count, "Card updated");
            Ok(UpdateOutcome::Updated {
                activity_id,
                count: counter.count,
            })
        }
        Err(e) => {
            warn!(activity_id = %activity_id, error = %e, "Card update failed; suppressed");
            Ok(UpdateOutcome::Suppressed {
                activity_id,
                count: counter.count,
                reason: e.to_string(),
            })
        }
    }
}
