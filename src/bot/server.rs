use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::commands::{self, CommandContext, CommandError, Invocation, SlashCommand};
use super::registry::SessionRegistry;
use crate::config::Config;
use crate::logutil::{escape_log, user_label};
use crate::metrics;
use crate::platform::{ChatPlatform, InteractionResponse, PlatformEvent};

const GENERIC_COMMAND_ERROR: &str = "There was an error while executing this command!";

/// # Bot Server
///
/// Routes inbound [`PlatformEvent`]s:
///
/// - component presses in a registered battle thread → [`BattleSession::handle_interaction`]
/// - text messages (from humans) in a registered battle thread → [`BattleSession::handle_message`]
/// - slash commands → [`commands::execute`]
///
/// Everything else is ignored. Each event is handled on its own task so a
/// slow platform call in one thread never stalls another; per-session
/// ordering is enforced by the session's own lock.
///
/// ## Usage
///
/// ```rust,no_run
/// use battlebot::bot::BotServer;
/// use battlebot::config::Config;
/// use battlebot::platform::recording::RecordingPlatform;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = Config::load("config.toml").await?;
///     let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
///     let server = BotServer::new(config, Arc::new(RecordingPlatform::new()));
///     server.run(rx).await
/// }
/// ```
///
/// [`BattleSession::handle_interaction`]: crate::battle::BattleSession::handle_interaction
/// [`BattleSession::handle_message`]: crate::battle::BattleSession::handle_message
#[derive(Clone)]
pub struct BotServer {
    config: Arc<Config>,
    platform: Arc<dyn ChatPlatform>,
    registry: Arc<SessionRegistry>,
}

impl BotServer {
    pub fn new(config: Config, platform: Arc<dyn ChatPlatform>) -> Self {
        Self::with_registry(config, platform, Arc::new(SessionRegistry::new()))
    }

    pub fn with_registry(
        config: Config,
        platform: Arc<dyn ChatPlatform>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            platform,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume events until the stream closes or Ctrl-C, then wait for
    /// in-flight handlers.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<PlatformEvent>) -> Result<()> {
        info!("{} ready", self.config.bot.name);
        let mut inflight: JoinSet<()> = JoinSet::new();
        let mut housekeeping = tokio::time::interval(Duration::from_secs(1));
        housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                ev = events.recv() => {
                    let Some(ev) = ev else {
                        info!("Event stream closed");
                        break;
                    };
                    let server = self.clone();
                    inflight.spawn(async move {
                        if let Err(e) = server.route_event(ev).await {
                            warn!("route_event error: {e:?}");
                        }
                    });
                }
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    if let Err(e) = joined {
                        error!("event handler task failed: {}", e);
                    }
                }
                _ = housekeeping.tick() => {
                    self.housekeeping();
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        while let Some(joined) = inflight.join_next().await {
            if let Err(e) = joined {
                error!("event handler task failed: {}", e);
            }
        }
        self.shutdown();
        Ok(())
    }

    /// Route one inbound event.
    pub async fn route_event(&self, ev: PlatformEvent) -> Result<()> {
        match &ev {
            PlatformEvent::Component {
                channel_id: Some(channel_id),
                ..
            } => {
                let Some(session) = self.registry.get(channel_id) else {
                    debug!("component in {} has no session", escape_log(channel_id));
                    return Ok(());
                };
                session.handle_interaction(&ev).await;
                self.after_session_event(channel_id);
            }
            PlatformEvent::Component { channel_id: None, .. } => {}
            PlatformEvent::Message {
                author, channel_id, ..
            } => {
                if author.bot {
                    return Ok(());
                }
                let Some(session) = self.registry.get(channel_id) else {
                    return Ok(());
                };
                let result = session.handle_message(&ev).await;
                self.after_session_event(channel_id);
                result?;
            }
            PlatformEvent::Command {
                interaction_id,
                name,
                options,
                user,
                channel_id,
            } => {
                let invocation = Invocation {
                    interaction_id,
                    user,
                    channel_id,
                };
                self.handle_command(&invocation, name, options).await;
            }
        }
        Ok(())
    }

    async fn handle_command(
        &self,
        inv: &Invocation<'_>,
        name: &str,
        options: &std::collections::HashMap<String, crate::platform::CommandOption>,
    ) {
        let command = match SlashCommand::parse(name, options) {
            Ok(command) => command,
            Err(CommandError::Unknown(n)) => {
                error!("No command matching {} was found.", escape_log(&n));
                return;
            }
            Err(e) => {
                debug!(
                    "rejected /{} from {}: {}",
                    escape_log(name),
                    user_label(&inv.user.username, &inv.user.id),
                    e
                );
                self.respond_quietly(inv.interaction_id, InteractionResponse::ephemeral(e.to_string()))
                    .await;
                return;
            }
        };

        let deferred = command.defers();
        let ctx = CommandContext {
            platform: &self.platform,
            registry: &self.registry,
            config: &self.config,
        };
        if let Err(e) = commands::execute(&ctx, inv, command).await {
            error!("command /{} failed: {}", escape_log(name), e);
            let response = if deferred {
                InteractionResponse::EditReply {
                    content: GENERIC_COMMAND_ERROR.to_string(),
                }
            } else {
                InteractionResponse::ephemeral(GENERIC_COMMAND_ERROR)
            };
            self.respond_quietly(inv.interaction_id, response).await;
        }
    }

    async fn respond_quietly(&self, interaction_id: &str, response: InteractionResponse) {
        if let Err(e) = self.platform.respond(interaction_id, response).await {
            warn!("failed to respond to interaction {}: {}", escape_log(interaction_id), e);
        }
    }

    fn after_session_event(&self, thread_id: &str) {
        if !self.config.battle.remove_finished {
            return;
        }
        let ended = self
            .registry
            .get(thread_id)
            .map(|s| s.is_ended())
            .unwrap_or(false);
        if ended && self.registry.remove(thread_id).is_some() {
            info!(
                target: "battlebot::battles",
                "battle.closed thread={} remaining={}",
                escape_log(thread_id),
                self.registry.len()
            );
        }
    }

    /// Evict idle sessions and, when configured, finished ones.
    pub fn housekeeping(&self) {
        let idle = self
            .registry
            .prune_idle(self.config.battle.idle_timeout_minutes);
        if !idle.is_empty() {
            debug!("evicted {} idle session(s)", idle.len());
        }
        if self.config.battle.remove_finished {
            self.registry.prune_finished();
        }
    }

    pub fn show_status(&self) {
        let m = metrics::snapshot();
        println!("Bot: {}", self.config.bot.name);
        println!(
            "Token: {}",
            if self.config.bot.token.is_some() {
                "configured"
            } else {
                "not configured"
            }
        );
        println!(
            "Idle timeout: {} min, remove finished: {}",
            self.config.battle.idle_timeout_minutes, self.config.battle.remove_finished
        );
        println!("Active sessions: {}", self.registry.len());
        println!(
            "Battles started: {}, finished: {}, actions: {}",
            m.battles_started, m.battles_finished, m.actions_resolved
        );
    }

    fn shutdown(&self) {
        let m = metrics::snapshot();
        info!(
            "shutdown: sessions={} started={} finished={} in_progress={} actions={} dropped_busy={} sends_failed={}",
            self.registry.len(),
            m.battles_started,
            m.battles_finished,
            m.battles_in_progress(),
            m.actions_resolved,
            m.actions_dropped_busy,
            m.sends_failed
        );
    }
}
