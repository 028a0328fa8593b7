//! In-memory [`ChatPlatform`] that records every outbound action.
//!
//! Integration tests drive the bot through this transport and inspect
//! [`RecordingPlatform::sent`]. Sends can be held open with
//! [`RecordingPlatform::hold_sends`] to simulate a slow gateway while a second
//! event arrives.
use super::{ChatPlatform, InteractionResponse, OutgoingMessage, PlatformError, ThreadSpec};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// One recorded outbound action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message {
        channel_id: String,
        message: OutgoingMessage,
    },
    Reply {
        channel_id: String,
        message_id: String,
        content: String,
    },
    Response {
        interaction_id: String,
        response: InteractionResponse,
    },
    ThreadCreated {
        thread_id: String,
        spec: ThreadSpec,
    },
    MemberAdded {
        thread_id: String,
        user_id: String,
    },
}

#[derive(Default)]
pub struct RecordingPlatform {
    sent: Mutex<Vec<Sent>>,
    unavailable: Mutex<HashSet<String>>,
    unjoinable: Mutex<HashSet<String>>,
    next_thread: AtomicU64,
    hold: AtomicBool,
    blocked: Notify,
    release: Notify,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Contents of messages posted to `channel_id`, in order.
    pub fn messages_in(&self, channel_id: &str) -> Vec<OutgoingMessage> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Message {
                    channel_id: c,
                    message,
                } if c == channel_id => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Responses given to `interaction_id`, in order.
    pub fn responses_to(&self, interaction_id: &str) -> Vec<InteractionResponse> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Response {
                    interaction_id: i,
                    response,
                } if i == interaction_id => Some(response),
                _ => None,
            })
            .collect()
    }

    /// Message replies (not interaction responses), as `(message_id, content)`.
    pub fn replies(&self) -> Vec<(String, String)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Reply {
                    message_id,
                    content,
                    ..
                } => Some((message_id, content)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut g) = self.sent.lock() {
            g.clear();
        }
    }

    /// Make `send_message` to `channel_id` fail as if the channel could not be fetched.
    pub fn make_unavailable(&self, channel_id: &str) {
        if let Ok(mut g) = self.unavailable.lock() {
            g.insert(channel_id.to_string());
        }
    }

    /// Make `add_thread_member` reject `user_id`.
    pub fn make_unjoinable(&self, user_id: &str) {
        if let Ok(mut g) = self.unjoinable.lock() {
            g.insert(user_id.to_string());
        }
    }

    /// Park every subsequent `send_message` after recording it, until [`Self::release_sends`].
    pub fn hold_sends(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_sends(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
        self.release.notify_one();
    }

    /// Resolves once a held send is parked.
    pub async fn wait_until_blocked(&self) {
        self.blocked.notified().await;
    }

    fn record(&self, entry: Sent) {
        if let Ok(mut g) = self.sent.lock() {
            g.push(entry);
        }
    }

    fn is_unavailable(&self, channel_id: &str) -> bool {
        self.unavailable
            .lock()
            .map(|g| g.contains(channel_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn send_message(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> Result<(), PlatformError> {
        if self.is_unavailable(channel_id) {
            return Err(PlatformError::UnknownChannel(channel_id.to_string()));
        }
        self.record(Sent::Message {
            channel_id: channel_id.to_string(),
            message,
        });
        if self.hold.load(Ordering::SeqCst) {
            self.blocked.notify_one();
            self.release.notified().await;
        }
        Ok(())
    }

    async fn reply_to(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), PlatformError> {
        if self.is_unavailable(channel_id) {
            return Err(PlatformError::UnknownChannel(channel_id.to_string()));
        }
        self.record(Sent::Reply {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn respond(
        &self,
        interaction_id: &str,
        response: InteractionResponse,
    ) -> Result<(), PlatformError> {
        self.record(Sent::Response {
            interaction_id: interaction_id.to_string(),
            response,
        });
        Ok(())
    }

    async fn create_thread(&self, spec: ThreadSpec) -> Result<String, PlatformError> {
        if self.is_unavailable(&spec.parent_id) {
            return Err(PlatformError::UnknownChannel(spec.parent_id));
        }
        let n = self.next_thread.fetch_add(1, Ordering::SeqCst) + 1;
        let thread_id = format!("thread-{}", n);
        self.record(Sent::ThreadCreated {
            thread_id: thread_id.clone(),
            spec,
        });
        Ok(thread_id)
    }

    async fn add_thread_member(&self, thread_id: &str, user_id: &str) -> Result<(), PlatformError> {
        let refused = self
            .unjoinable
            .lock()
            .map(|g| g.contains(user_id))
            .unwrap_or(false);
        if refused {
            return Err(PlatformError::Rejected(format!(
                "user {} cannot join {}",
                user_id, thread_id
            )));
        }
        self.record(Sent::MemberAdded {
            thread_id: thread_id.to_string(),
            user_id: user_id.to_string(),
        });
        Ok(())
    }
}
