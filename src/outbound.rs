//! Outbound side of a turn: sending new messages and updating sent ones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};

use crate::activity::ConversationRef;
use crate::cards::Attachment;
use crate::error::ChannelError;

/// A message the bot sends or an update replacing one it sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundActivity {
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Id of the message being replaced; set only for updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
}

impl OutboundActivity {
    /// A new message carrying `attachments`.
    pub fn message(attachments: Vec<Attachment>) -> Self {
        Self {
            activity_type: "message".to_string(),
            id: None,
            attachments,
            timestamp: Utc::now(),
        }
    }

    /// A replacement for message `id`.
    pub fn update(id: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::message(attachments)
        }
    }
}

/// Delivers outbound activities to a conversation.
#[async_trait]
pub trait ConversationSink: Send + Sync {
    /// Post a new message.
    async fn send(
        &self,
        conversation: &ConversationRef,
        activity: OutboundActivity,
    ) -> Result<(), ChannelError>;

    /// Replace the message identified by `activity.id`.
    async fn update(
        &self,
        conversation: &ConversationRef,
        activity: OutboundActivity,
    ) -> Result<(), ChannelError>;
}

/// Connector REST client: posts and replaces activities at the conversation's
/// service URL.
pub struct ConnectorClient {
    client: reqwest::Client,
    token: Option<SecretString>,
}

impl ConnectorClient {
    pub fn new(token: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
        }
    }

    fn activities_url(conversation: &ConversationRef) -> String {
        format!(
            "{}/v3/conversations/{}/activities",
            conversation.service_url.trim_end_matches('/'),
            conversation.conversation_id
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

#[async_trait]
impl ConversationSink for ConnectorClient {
    async fn send(
        &self,
        conversation: &ConversationRef,
        activity: OutboundActivity,
    ) -> Result<(), ChannelError> {
        let url = Self::activities_url(conversation);
        let send_failed = |reason: String| ChannelError::SendFailed {
            conversation_id: conversation.conversation_id.clone(),
            reason,
        };

        let resp = self
            .authorize(self.client.post(&url))
            .json(&activity)
            .send()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(send_failed(format!("{status}: {body}")));
        }

        info!(
            conversation_id = %conversation.conversation_id,
            attachments = activity.attachments.len(),
            "Activity sent"
        );
        Ok(())
    }

    async fn update(
        &self,
        conversation: &ConversationRef,
        activity: OutboundActivity,
    ) -> Result<(), ChannelError> {
        let activity_id = activity.id.clone().ok_or_else(|| ChannelError::UpdateFailed {
            activity_id: String::new(),
            reason: "update without an activity id".into(),
        })?;
        let url = format!("{}/{}", Self::activities_url(conversation), activity_id);
        let update_failed = |reason: String| ChannelError::UpdateFailed {
            activity_id: activity_id.clone(),
            reason,
        };

        let resp = self
            .authorize(self.client.put(&url))
            .json(&activity)
            .send()
            .await
            .map_err(|e| update_failed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(update_failed(format!("{status}: {body}")));
        }

        debug!(activity_id = %activity_id, "Activity updated");
        Ok(())
    }
}
