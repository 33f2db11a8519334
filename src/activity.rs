//! Inbound activity wire model and its classification into a closed set of
//! kinds the dispatcher handles.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Invoke names used by the platform.
pub mod invoke_names {
    pub const ADAPTIVE_CARD_ACTION: &str = "adaptiveCard/action";
    pub const SUBMIT_ACTION: &str = "composeExtension/submitAction";
    pub const QUERY: &str = "composeExtension/query";
    pub const SELECT_ITEM: &str = "composeExtension/selectItem";
    pub const QUERY_LINK: &str = "composeExtension/queryLink";
}

/// A participant (user or bot).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The conversation an activity belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationAccount {
    #[serde(default)]
    pub id: String,
}

/// Entity attached to an activity; only mentions are interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentioned: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// An inbound activity as delivered by the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default)]
    pub service_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
}

impl Activity {
    pub fn new(activity_type: impl Into<String>) -> Self {
        Self {
            activity_type: activity_type.into(),
            ..Default::default()
        }
    }

    /// A plain message activity.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new("message")
        }
    }

    /// An invoke activity with the given name and value.
    pub fn invoke(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: Some(name.into()),
            value,
            ..Self::new("invoke")
        }
    }

    /// A conversation update announcing added members.
    pub fn members_added(members: Vec<ChannelAccount>) -> Self {
        Self {
            members_added: members,
            ..Self::new("conversationUpdate")
        }
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation.id = conversation_id.into();
        self
    }

    pub fn with_service_url(mut self, service_url: impl Into<String>) -> Self {
        self.service_url = service_url.into();
        self
    }

    pub fn with_reply_to(mut self, reply_to_id: impl Into<String>) -> Self {
        self.reply_to_id = Some(reply_to_id.into());
        self
    }

    pub fn with_recipient(mut self, recipient: ChannelAccount) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Where outbound activities for this turn go.
    pub fn conversation_ref(&self) -> ConversationRef {
        ConversationRef {
            service_url: self.service_url.clone(),
            conversation_id: self.conversation.id.clone(),
        }
    }

    /// Message text with the bot's own @mention removed.
    pub fn text_without_recipient_mention(&self) -> String {
        let mut text = self.text.clone().unwrap_or_default();
        let Some(recipient) = &self.recipient else {
            return text;
        };
        for entity in &self.entities {
            if entity.kind != "mention" {
                continue;
            }
            let targets_bot = entity
                .mentioned
                .as_ref()
                .is_some_and(|m| m.id == recipient.id);
            if let (true, Some(mention)) = (targets_bot, entity.text.as_deref()) {
                text = remove_case_insensitive(&text, mention);
            }
        }
        text
    }

    /// Classify into exactly one [`ActivityKind`].
    pub fn classify(&self) -> Result<ActivityKind, Error> {
        match self.activity_type.as_str() {
            "message" => Ok(ActivityKind::Message {
                text: normalize_text(&self.text_without_recipient_mention()),
            }),
            "conversationUpdate" if !self.members_added.is_empty() => {
                Ok(ActivityKind::MembersAdded {
                    members: self.members_added.clone(),
                })
            }
            "invoke" => self.classify_invoke(),
            other => Ok(ActivityKind::Unhandled {
                activity_type: other.to_string(),
                name: self.name.clone(),
            }),
        }
    }

    fn classify_invoke(&self) -> Result<ActivityKind, Error> {
        let name = self.name.as_deref().unwrap_or_default();
        match name {
            invoke_names::ADAPTIVE_CARD_ACTION => {
                let value: AdaptiveCardInvokeValue = decode_value(name, &self.value)?;
                Ok(ActivityKind::CardInvoke(value.action))
            }
            invoke_names::SUBMIT_ACTION => {
                let command_id = self
                    .value
                    .get("commandId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::InvalidActivity(format!("{name} without commandId"))
                    })?;
                Ok(ActivityKind::ExtensionSubmit(SubmitAction {
                    command_id: command_id.to_string(),
                    value: self.value.clone(),
                }))
            }
            invoke_names::QUERY => Ok(ActivityKind::ExtensionQuery(decode_value(
                name,
                &self.value,
            )?)),
            invoke_names::SELECT_ITEM => Ok(ActivityKind::ExtensionSelect(decode_value(
                name,
                &self.value,
            )?)),
            invoke_names::QUERY_LINK => {
                let value: LinkQueryValue = decode_value(name, &self.value)?;
                Ok(ActivityKind::LinkQuery { url: value.url })
            }
            _ => Ok(ActivityKind::Unhandled {
                activity_type: self.activity_type.clone(),
                name: self.name.clone(),
            }),
        }
    }
}

/// Address of a conversation for outbound calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationRef {
    pub service_url: String,
    pub conversation_id: String,
}

/// The closed set of activity kinds the bot handles.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityKind {
    /// A chat message, text already normalized.
    Message { text: String },
    /// Participants joined the conversation.
    MembersAdded { members: Vec<ChannelAccount> },
    /// Action fired from an adaptive card the bot sent.
    CardInvoke(CardInvokeAction),
    /// Compose-extension action submission.
    ExtensionSubmit(SubmitAction),
    /// Compose-extension search query.
    ExtensionQuery(ExtensionQuery),
    /// A search result preview was picked.
    ExtensionSelect(SelectedItem),
    /// A link was pasted into the compose box.
    LinkQuery { url: String },
    /// Anything else; accepted without action.
    Unhandled {
        activity_type: String,
        name: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct AdaptiveCardInvokeValue {
    action: CardInvokeAction,
}

/// `Action.Execute` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardInvokeAction {
    #[serde(default)]
    pub verb: String,
    #[serde(default)]
    pub data: Value,
}

/// Compose-extension submit action. `value` is the whole invoke value; the
/// card update protocol reads its state out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitAction {
    pub command_id: String,
    pub value: Value,
}

/// One named parameter of a compose-extension query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

/// Compose-extension query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionQuery {
    #[serde(default)]
    pub command_id: Option<String>,
    #[serde(default)]
    pub parameters: Vec<QueryParameter>,
}

impl ExtensionQuery {
    pub fn with_term(term: impl Into<String>) -> Self {
        Self {
            command_id: None,
            parameters: vec![QueryParameter {
                name: "searchQuery".to_string(),
                value: Value::String(term.into()),
            }],
        }
    }

    /// Value of the first parameter, as text.
    pub fn first_term(&self) -> Option<String> {
        self.parameters.first().map(|p| match &p.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Value carried by a search result preview's tap action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct LinkQueryValue {
    url: String,
}

fn decode_value<T: serde::de::DeserializeOwned>(name: &str, value: &Value) -> Result<T, Error> {
    serde_json::from_value(value.clone())
        .map_err(|e| Error::InvalidActivity(format!("{name}: {e}")))
}

/// Lowercase, drop CR/LF, trim.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect::<String>()
        .trim()
        .to_string()
}

fn remove_case_insensitive(haystack: &str, needle: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    match regex::RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => re.replace_all(haystack, "").into_owned(),
        Err(_) => haystack.replace(needle, ""),
    }
}
