//! Slash commands.
//!
//! - `/battlethread attacker:<user> defender:<user>` - open a private battle
//!   thread, invite both fighters and the invoker, and start a
//!   [`BattleSession`] with the invoker as admin.
//! - `/thread channel:<channel> name:<text> [message:<text>]` - open a plain
//!   public thread, optionally seeded with a message.
//!
//! [`SlashCommand::parse`] validates options; [`execute`] performs the
//! platform calls. Platform failures inside a handler are reported back to
//! the invoker and logged; only unexpected failures surface as `Err`.
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::registry::SessionRegistry;
use crate::battle::BattleSession;
use crate::config::Config;
use crate::logutil::{escape_log, user_label};
use crate::platform::{
    ChatPlatform, CommandOption, InteractionResponse, OutgoingMessage, PlatformError, ThreadSpec,
    User,
};

/// Longest thread name accepted by `/thread`.
pub const MAX_THREAD_NAME: usize = 100;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No command matching {0} was found.")]
    Unknown(String),

    #[error("Missing required option '{0}'.")]
    MissingOption(&'static str),

    #[error("Option '{0}' has the wrong type.")]
    WrongOptionType(&'static str),

    #[error("Thread name is too long ({0} > 100 characters).")]
    NameTooLong(usize),

    #[error("Attacker and defender must be different users.")]
    SameParticipant,

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    BattleThread {
        attacker: User,
        defender: User,
    },
    Thread {
        channel_id: String,
        name: String,
        message: Option<String>,
    },
}

fn user_option(
    options: &HashMap<String, CommandOption>,
    key: &'static str,
) -> Result<User, CommandError> {
    match options.get(key) {
        Some(CommandOption::User { id, username }) => Ok(User::new(id.clone(), username.clone())),
        Some(_) => Err(CommandError::WrongOptionType(key)),
        None => Err(CommandError::MissingOption(key)),
    }
}

fn string_option(
    options: &HashMap<String, CommandOption>,
    key: &'static str,
) -> Result<Option<String>, CommandError> {
    match options.get(key) {
        Some(CommandOption::String { value }) => Ok(Some(value.clone())),
        Some(_) => Err(CommandError::WrongOptionType(key)),
        None => Ok(None),
    }
}

impl SlashCommand {
    pub fn parse(name: &str, options: &HashMap<String, CommandOption>) -> Result<Self, CommandError> {
        match name {
            "battlethread" => {
                let attacker = user_option(options, "attacker")?;
                let defender = user_option(options, "defender")?;
                if attacker.id == defender.id {
                    return Err(CommandError::SameParticipant);
                }
                Ok(SlashCommand::BattleThread { attacker, defender })
            }
            "thread" => {
                let channel_id = match options.get("channel") {
                    Some(CommandOption::Channel { id }) => id.clone(),
                    Some(_) => return Err(CommandError::WrongOptionType("channel")),
                    None => return Err(CommandError::MissingOption("channel")),
                };
                let name = string_option(options, "name")?
                    .filter(|n| !n.trim().is_empty())
                    .ok_or(CommandError::MissingOption("name"))?;
                let len = name.chars().count();
                if len > MAX_THREAD_NAME {
                    return Err(CommandError::NameTooLong(len));
                }
                let message = string_option(options, "message")?.filter(|m| !m.is_empty());
                Ok(SlashCommand::Thread {
                    channel_id,
                    name,
                    message,
                })
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SlashCommand::BattleThread { .. } => "battlethread",
            SlashCommand::Thread { .. } => "thread",
        }
    }

    /// Whether the handler acknowledges with a deferred reply before doing work.
    pub fn defers(&self) -> bool {
        matches!(self, SlashCommand::BattleThread { .. })
    }
}

/// Everything a command handler needs from the running bot.
pub struct CommandContext<'a> {
    pub platform: &'a Arc<dyn ChatPlatform>,
    pub registry: &'a SessionRegistry,
    pub config: &'a Config,
}

/// Identity and location of one slash-command invocation.
pub struct Invocation<'a> {
    pub interaction_id: &'a str,
    pub user: &'a User,
    pub channel_id: &'a str,
}

pub async fn execute(
    ctx: &CommandContext<'_>,
    inv: &Invocation<'_>,
    command: SlashCommand,
) -> Result<(), CommandError> {
    info!(
        "command /{} by {} in {}",
        command.name(),
        user_label(&inv.user.username, &inv.user.id),
        escape_log(inv.channel_id)
    );
    match command {
        SlashCommand::BattleThread { attacker, defender } => {
            battle_thread(ctx, inv, attacker, defender).await
        }
        SlashCommand::Thread {
            channel_id,
            name,
            message,
        } => plain_thread(ctx, inv, &channel_id, &name, message.as_deref()).await,
    }
}

async fn battle_thread(
    ctx: &CommandContext<'_>,
    inv: &Invocation<'_>,
    attacker: User,
    defender: User,
) -> Result<(), CommandError> {
    ctx.platform
        .respond(inv.interaction_id, InteractionResponse::Defer { ephemeral: true })
        .await?;

    let thread_name = format!("Battle: {} vs {}", attacker.username, defender.username);
    let reply = match open_battle_thread(ctx, inv, &thread_name, attacker, defender).await {
        Ok(()) => format!("Thread \"{}\" created and members invited.", thread_name),
        Err(e) => {
            error!(
                "Error creating private battle thread '{}': {}",
                escape_log(&thread_name),
                e
            );
            "There was an error creating the private battle thread.".to_string()
        }
    };
    ctx.platform
        .respond(inv.interaction_id, InteractionResponse::EditReply { content: reply })
        .await?;
    Ok(())
}

async fn open_battle_thread(
    ctx: &CommandContext<'_>,
    inv: &Invocation<'_>,
    thread_name: &str,
    attacker: User,
    defender: User,
) -> Result<(), PlatformError> {
    let thread_id = ctx
        .platform
        .create_thread(ThreadSpec {
            parent_id: inv.channel_id.to_string(),
            name: thread_name.to_string(),
            private: true,
            auto_archive_minutes: None,
        })
        .await?;

    let mut member_ids: Vec<&str> = Vec::with_capacity(3);
    for id in [attacker.id.as_str(), defender.id.as_str(), inv.user.id.as_str()] {
        if !member_ids.contains(&id) {
            member_ids.push(id);
        }
    }
    for id in member_ids {
        if let Err(e) = ctx.platform.add_thread_member(&thread_id, id).await {
            warn!(
                "Could not add member {} to thread {}: {}",
                escape_log(id),
                escape_log(&thread_id),
                e
            );
        }
    }

    ctx.platform
        .send_message(
            &thread_id,
            OutgoingMessage::text(format!("Private battle thread created: {}", thread_name)),
        )
        .await?;

    let session = BattleSession::new(
        thread_id.clone(),
        [attacker, defender],
        Some(inv.user.id.clone()),
        ctx.platform.clone(),
    );
    let session = ctx.registry.insert(session);
    info!(
        target: "battlebot::battles",
        "battle.create thread={} admin={} active={}",
        escape_log(&thread_id),
        user_label(&inv.user.username, &inv.user.id),
        ctx.registry.len()
    );
    session.start().await;
    Ok(())
}

async fn plain_thread(
    ctx: &CommandContext<'_>,
    inv: &Invocation<'_>,
    channel_id: &str,
    name: &str,
    message: Option<&str>,
) -> Result<(), CommandError> {
    let created = async {
        let thread_id = ctx
            .platform
            .create_thread(ThreadSpec {
                parent_id: channel_id.to_string(),
                name: name.to_string(),
                private: false,
                auto_archive_minutes: Some(ctx.config.battle.thread_auto_archive_minutes),
            })
            .await?;
        if let Some(text) = message {
            ctx.platform
                .send_message(&thread_id, OutgoingMessage::text(text))
                .await?;
        }
        Ok::<_, PlatformError>(thread_id)
    }
    .await;

    let response = match created {
        Ok(_) => InteractionResponse::Reply {
            content: format!(
                "Thread \"{}\" created successfully in <#{}>!",
                name, channel_id
            ),
            ephemeral: false,
        },
        Err(e) => {
            error!("Error creating thread '{}': {}", escape_log(name), e);
            InteractionResponse::ephemeral("There was an error creating the thread.")
        }
    };
    ctx.platform.respond(inv.interaction_id, response).await?;
    Ok(())
}
