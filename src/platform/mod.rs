//! # Chat Platform Boundary
//!
//! Everything the bot needs from a chat platform, and nothing more. The battle
//! core never talks to a gateway directly; it goes through the [`ChatPlatform`]
//! trait, which covers sending thread messages, replying to a message,
//! responding to an interaction, and creating/populating threads.
//!
//! ## Transports
//!
//! - [`console::ConsolePlatform`] - JSON lines in, JSON lines out. Used by the
//!   binary so the bot can sit behind any bridge process that speaks the
//!   [`PlatformEvent`] wire format.
//! - [`recording::RecordingPlatform`] - in-memory transport that records every
//!   outbound action; used by the integration tests.
//!
//! ## Wire format
//!
//! Inbound events are tagged JSON objects:
//!
//! ```text
//! {"type":"component","interaction_id":"i1","kind":"button","custom_id":"battle:attack",
//!  "user":{"id":"42","username":"alice"},"channel_id":"t-1"}
//! {"type":"message","message_id":"m1","author":{"id":"7","username":"admin"},
//!  "channel_id":"t-1","content":"setup attacker: 3,1,0,0 ; defender: 2,2,0,0"}
//! {"type":"command","interaction_id":"i2","name":"battlethread","channel_id":"general",
//!  "user":{"id":"7","username":"admin"},
//!  "options":{"attacker":{"type":"user","id":"42","username":"alice"},
//!             "defender":{"type":"user","id":"43","username":"bob"}}}
//! ```

pub mod console;
pub mod recording;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A chat user as seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            bot: false,
        }
    }

    /// Platform mention markup for this user.
    pub fn mention(&self) -> String {
        mention(&self.id)
    }
}

pub fn mention(user_id: &str) -> String {
    format!("<@{}>", user_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Button,
    SelectMenu,
}

/// A single slash-command option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandOption {
    User { id: String, username: String },
    Channel { id: String },
    String { value: String },
}

/// Inbound event delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// A message component (button or select menu) was used.
    Component {
        interaction_id: String,
        kind: ComponentKind,
        custom_id: String,
        user: User,
        channel_id: Option<String>,
    },
    /// A slash command was invoked.
    Command {
        interaction_id: String,
        name: String,
        #[serde(default)]
        options: HashMap<String, CommandOption>,
        user: User,
        channel_id: String,
    },
    /// A plain text message was posted.
    Message {
        message_id: String,
        author: User,
        channel_id: String,
        content: String,
    },
}

impl PlatformEvent {
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            PlatformEvent::Component { channel_id, .. } => channel_id.as_deref(),
            PlatformEvent::Command { channel_id, .. } => Some(channel_id),
            PlatformEvent::Message { channel_id, .. } => Some(channel_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            custom_id: custom_id.into(),
            label: label.into(),
            style,
        }
    }
}

/// A message posted to a channel or thread, with optional buttons.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Button>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            components: Vec::new(),
        }
    }

    pub fn with_components(mut self, components: Vec<Button>) -> Self {
        self.components = components;
        self
    }
}

/// How the bot answers an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionResponse {
    /// Immediate reply, optionally only visible to the invoking user.
    Reply { content: String, ephemeral: bool },
    /// Acknowledge a component press without changing the message.
    DeferUpdate,
    /// Acknowledge a command; the reply is filled in later by `EditReply`.
    Defer { ephemeral: bool },
    /// Replace the deferred reply.
    EditReply { content: String },
}

impl InteractionResponse {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        InteractionResponse::Reply {
            content: content.into(),
            ephemeral: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSpec {
    pub parent_id: String,
    pub name: String,
    pub private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_archive_minutes: Option<u32>,
}

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The channel could not be fetched (deleted, never existed, no access).
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// The platform refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("transport closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outbound side of a chat platform.
///
/// Implementations must be cheap to share (`Arc<dyn ChatPlatform>`); every
/// method is independent and may be called concurrently from different
/// sessions.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Post a message to a channel or thread.
    async fn send_message(&self, channel_id: &str, message: OutgoingMessage)
        -> Result<(), PlatformError>;

    /// Reply to a specific message.
    async fn reply_to(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), PlatformError>;

    /// Respond to an interaction (button press or slash command).
    async fn respond(
        &self,
        interaction_id: &str,
        response: InteractionResponse,
    ) -> Result<(), PlatformError>;

    /// Create a thread and return its id.
    async fn create_thread(&self, spec: ThreadSpec) -> Result<String, PlatformError>;

    /// Add a member to a thread.
    async fn add_thread_member(&self, thread_id: &str, user_id: &str) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_event_parses_from_json() {
        let raw = r#"{"type":"component","interaction_id":"i1","kind":"button","custom_id":"battle:attack","user":{"id":"42","username":"alice"},"channel_id":"t-1"}"#;
        let ev: PlatformEvent = serde_json::from_str(raw).expect("parse");
        match ev {
            PlatformEvent::Component {
                kind,
                custom_id,
                user,
                channel_id,
                ..
            } => {
                assert_eq!(kind, ComponentKind::Button);
                assert_eq!(custom_id, "battle:attack");
                assert_eq!(user.id, "42");
                assert!(!user.bot);
                assert_eq!(channel_id.as_deref(), Some("t-1"));
            }
            other => panic!("expected component, got {:?}", other),
        }
    }

    #[test]
    fn command_options_are_tagged() {
        let raw = r#"{"type":"command","interaction_id":"i2","name":"battlethread","channel_id":"general","user":{"id":"7","username":"admin"},"options":{"attacker":{"type":"user","id":"42","username":"alice"},"name":{"type":"string","value":"x"}}}"#;
        let ev: PlatformEvent = serde_json::from_str(raw).expect("parse");
        let PlatformEvent::Command { options, .. } = ev else {
            panic!("expected command");
        };
        assert_eq!(
            options.get("attacker"),
            Some(&CommandOption::User {
                id: "42".into(),
                username: "alice".into()
            })
        );
        assert_eq!(
            options.get("name"),
            Some(&CommandOption::String { value: "x".into() })
        );
    }

    #[test]
    fn message_without_components_omits_field() {
        let json = serde_json::to_string(&OutgoingMessage::text("hi")).unwrap();
        assert_eq!(json, r#"{"content":"hi"}"#);
    }
}
