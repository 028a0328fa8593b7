//! Test utilities: event builders and a server wired to a recording platform.
#![allow(dead_code)]

use battlebot::bot::BotServer;
use battlebot::config::Config;
use battlebot::platform::recording::RecordingPlatform;
use battlebot::platform::{CommandOption, ComponentKind, PlatformEvent, User};
use std::collections::HashMap;
use std::sync::Arc;

pub const SETUP: &str = "setup attacker: 3,1,0,0 ; defender: 2,2,0,0";

pub fn alice() -> User {
    User::new("100", "alice")
}

pub fn bob() -> User {
    User::new("200", "bob")
}

pub fn carol() -> User {
    User::new("300", "carol")
}

pub fn admin() -> User {
    User::new("900", "admin")
}

pub fn server() -> (BotServer, Arc<RecordingPlatform>) {
    server_with(Config::default())
}

pub fn server_with(config: Config) -> (BotServer, Arc<RecordingPlatform>) {
    let platform = Arc::new(RecordingPlatform::new());
    let server = BotServer::new(config, platform.clone());
    (server, platform)
}

pub fn button(interaction_id: &str, user: &User, channel_id: &str, custom_id: &str) -> PlatformEvent {
    PlatformEvent::Component {
        interaction_id: interaction_id.to_string(),
        kind: ComponentKind::Button,
        custom_id: custom_id.to_string(),
        user: user.clone(),
        channel_id: Some(channel_id.to_string()),
    }
}

pub fn message(message_id: &str, author: &User, channel_id: &str, content: &str) -> PlatformEvent {
    PlatformEvent::Message {
        message_id: message_id.to_string(),
        author: author.clone(),
        channel_id: channel_id.to_string(),
        content: content.to_string(),
    }
}

pub fn command(
    interaction_id: &str,
    name: &str,
    invoker: &User,
    channel_id: &str,
    options: Vec<(&str, CommandOption)>,
) -> PlatformEvent {
    PlatformEvent::Command {
        interaction_id: interaction_id.to_string(),
        name: name.to_string(),
        options: options
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<HashMap<_, _>>(),
        user: invoker.clone(),
        channel_id: channel_id.to_string(),
    }
}

pub fn user_opt(user: &User) -> CommandOption {
    CommandOption::User {
        id: user.id.clone(),
        username: user.username.clone(),
    }
}

pub fn battlethread(interaction_id: &str, invoker: &User, attacker: &User, defender: &User) -> PlatformEvent {
    command(
        interaction_id,
        "battlethread",
        invoker,
        "general",
        vec![("attacker", user_opt(attacker)), ("defender", user_opt(defender))],
    )
}

/// Open an alice-vs-bob battle administered by `admin()`; returns the thread id.
pub async fn open_battle(server: &BotServer) -> String {
    server
        .route_event(battlethread("cmd-open", &admin(), &alice(), &bob()))
        .await
        .expect("battlethread");
    let ids = server.registry().thread_ids();
    assert_eq!(ids.len(), 1, "expected exactly one session, got {:?}", ids);
    ids[0].clone()
}

/// Open a battle and configure armies; clears recorded traffic afterwards.
pub async fn open_configured_battle(server: &BotServer, platform: &RecordingPlatform) -> String {
    let thread = open_battle(server).await;
    server
        .route_event(message("m-setup", &admin(), &thread, SETUP))
        .await
        .expect("setup");
    platform.clear();
    thread
}
