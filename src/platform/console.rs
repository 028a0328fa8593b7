//! JSON-lines transport.
//!
//! Inbound [`PlatformEvent`]s are read one per line from any async reader and
//! forwarded over an unbounded channel to the server loop. Every outbound
//! action is serialized as one [`ConsoleAction`] line and handed to a writer
//! task, so a gateway bridge on the other end of the pipe can replay it against
//! the real chat API.
use super::{
    ChatPlatform, InteractionResponse, OutgoingMessage, PlatformError, PlatformEvent, ThreadSpec,
};
use crate::logutil::escape_log;
use async_trait::async_trait;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Outbound action as written to the console stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ConsoleAction {
    Send {
        channel_id: String,
        #[serde(flatten)]
        message: OutgoingMessage,
    },
    Reply {
        channel_id: String,
        message_id: String,
        content: String,
    },
    Respond {
        interaction_id: String,
        response: InteractionResponse,
    },
    CreateThread {
        thread_id: String,
        #[serde(flatten)]
        spec: ThreadSpec,
    },
    AddMember {
        thread_id: String,
        user_id: String,
    },
}

pub struct ConsolePlatform {
    out_tx: mpsc::UnboundedSender<String>,
    known_channels: Mutex<HashSet<String>>,
}

impl ConsolePlatform {
    /// Create the platform and spawn a writer task draining actions into `writer`.
    pub fn spawn<W>(writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            let mut writer = writer;
            while let Some(line) = out_rx.recv().await {
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    warn!("console writer failed: {}", e);
                    break;
                }
                if writer.write_all(b"\n").await.is_err() || writer.flush().await.is_err() {
                    warn!("console writer closed");
                    break;
                }
            }
            debug!("console writer loop terminated");
        });
        Self {
            out_tx,
            known_channels: Mutex::new(HashSet::new()),
        }
    }

    /// Mark a channel as existing so sends to it are accepted.
    pub fn remember_channel(&self, channel_id: &str) {
        if let Ok(mut g) = self.known_channels.lock() {
            g.insert(channel_id.to_string());
        }
    }

    fn knows(&self, channel_id: &str) -> bool {
        self.known_channels
            .lock()
            .map(|g| g.contains(channel_id))
            .unwrap_or(false)
    }

    fn emit(&self, action: ConsoleAction) -> Result<(), PlatformError> {
        let line = serde_json::to_string(&action)?;
        trace!("console out: {}", escape_log(&line));
        self.out_tx.send(line).map_err(|_| PlatformError::Closed)
    }
}

#[async_trait]
impl ChatPlatform for ConsolePlatform {
    async fn send_message(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> Result<(), PlatformError> {
        if !self.knows(channel_id) {
            return Err(PlatformError::UnknownChannel(channel_id.to_string()));
        }
        self.emit(ConsoleAction::Send {
            channel_id: channel_id.to_string(),
            message,
        })
    }

    async fn reply_to(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), PlatformError> {
        if !self.knows(channel_id) {
            return Err(PlatformError::UnknownChannel(channel_id.to_string()));
        }
        self.emit(ConsoleAction::Reply {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            content: content.to_string(),
        })
    }

    async fn respond(
        &self,
        interaction_id: &str,
        response: InteractionResponse,
    ) -> Result<(), PlatformError> {
        self.emit(ConsoleAction::Respond {
            interaction_id: interaction_id.to_string(),
            response,
        })
    }

    async fn create_thread(&self, spec: ThreadSpec) -> Result<String, PlatformError> {
        let thread_id = uuid::Uuid::new_v4().to_string();
        self.emit(ConsoleAction::CreateThread {
            thread_id: thread_id.clone(),
            spec,
        })?;
        self.remember_channel(&thread_id);
        Ok(thread_id)
    }

    async fn add_thread_member(&self, thread_id: &str, user_id: &str) -> Result<(), PlatformError> {
        if !self.knows(thread_id) {
            return Err(PlatformError::UnknownChannel(thread_id.to_string()));
        }
        self.emit(ConsoleAction::AddMember {
            thread_id: thread_id.to_string(),
            user_id: user_id.to_string(),
        })
    }
}

/// Read events line by line until EOF, forwarding each parsed event.
///
/// Malformed lines are logged and skipped. Channels seen on inbound events are
/// remembered on `platform` so replies to them are accepted.
pub async fn pump_events<R>(
    reader: R,
    platform: std::sync::Arc<ConsolePlatform>,
    tx: mpsc::UnboundedSender<PlatformEvent>,
) -> Result<(), PlatformError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<PlatformEvent>(trimmed) {
            Ok(event) => {
                if let Some(ch) = event.channel_id() {
                    platform.remember_channel(ch);
                }
                if tx.send(event).is_err() {
                    return Err(PlatformError::Closed);
                }
            }
            Err(e) => warn!("skipping malformed event '{}': {}", escape_log(trimmed), e),
        }
    }
    debug!("console reader reached EOF");
    Ok(())
}
