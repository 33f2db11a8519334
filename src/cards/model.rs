//! Card data model: attachments, hero/thumbnail cards, card actions, and
//! compose-extension result envelopes, in the platform's wire shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content type of an adaptive card attachment.
pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";
/// Content type of a hero card attachment.
pub const HERO_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.hero";
/// Content type of a thumbnail card attachment.
pub const THUMBNAIL_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.thumbnail";

/// What a clickable card affordance does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    /// Posts `text` back to the conversation and carries `value` to the bot.
    MessageBack,
    /// Sends `value` to the bot as an invoke without posting anything.
    Invoke,
    /// Opens a URL client-side.
    OpenUrl,
}

/// A clickable affordance attached to an outbound card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAction {
    #[serde(rename = "type")]
    pub kind: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CardAction {
    /// A message-back action with no carried value.
    pub fn message_back(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: ActionType::MessageBack,
            title: Some(title.into()),
            value: Value::Null,
            text: Some(text.into()),
        }
    }

    /// An invoke action carrying `value`.
    pub fn invoke(value: Value) -> Self {
        Self {
            kind: ActionType::Invoke,
            title: None,
            value,
            text: None,
        }
    }

    /// Attach a carried value.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }
}

/// Image reference on a hero or thumbnail card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardImage {
    pub url: String,
}

/// Hero card body. Also used for thumbnail cards, which share the shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeroCard {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<CardImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<CardAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap: Option<CardAction>,
}

impl HeroCard {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_images<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images = urls.into_iter().map(|url| CardImage { url: url.into() }).collect();
        self
    }

    pub fn with_buttons(mut self, buttons: Vec<CardAction>) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_tap(mut self, tap: CardAction) -> Self {
        self.tap = Some(tap);
        self
    }

    /// Wrap as a hero card attachment.
    pub fn into_attachment(self) -> Attachment {
        Attachment::new(HERO_CARD_CONTENT_TYPE, self.to_content())
    }

    /// Wrap as a thumbnail card attachment.
    pub fn into_thumbnail_attachment(self) -> Attachment {
        Attachment::new(THUMBNAIL_CARD_CONTENT_TYPE, self.to_content())
    }

    fn to_content(&self) -> Value {
        // A struct of strings and JSON values always serializes.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A platform attachment: a card (or any content) plus an optional preview
/// shown in compose-extension result lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content_type: String,
    /// Card body. Some clients send it as a JSON-encoded string.
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<Box<Attachment>>,
}

impl Attachment {
    pub fn new(content_type: impl Into<String>, content: Value) -> Self {
        Self {
            id: None,
            content_type: content_type.into(),
            content,
            preview: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_preview(mut self, preview: Attachment) -> Self {
        self.preview = Some(Box::new(preview));
        self
    }

    /// Card body as structured JSON, decoding string-encoded content.
    pub fn content_json(&self) -> Result<Value, serde_json::Error> {
        match &self.content {
            Value::String(raw) => serde_json::from_str(raw),
            other => Ok(other.clone()),
        }
    }
}

/// Result list returned for compose-extension queries, selections, and link
/// unfurls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionResult {
    #[serde(rename = "type")]
    pub result_type: String,
    pub attachment_layout: String,
    pub attachments: Vec<Attachment>,
}

impl ExtensionResult {
    /// A `result`-typed list layout.
    pub fn list(attachments: Vec<Attachment>) -> Self {
        Self {
            result_type: "result".to_string(),
            attachment_layout: "list".to_string(),
            attachments,
        }
    }
}

/// `{ "composeExtension": ... }` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionResponse {
    pub compose_extension: ExtensionResult,
}

impl From<ExtensionResult> for ExtensionResponse {
    fn from(compose_extension: ExtensionResult) -> Self {
        Self { compose_extension }
    }
}
