mod common;

use battlebot::battle::{Armies, BattleSession, Phase, session::{DAMAGE_RANGE, HEAL_RANGE, MAX_HP}};
use battlebot::bot::BotServer;
use battlebot::platform::{InteractionResponse, PlatformEvent, User};
use common::*;

fn ephemeral(content: &str) -> Vec<InteractionResponse> {
    vec![InteractionResponse::Reply {
        content: content.to_string(),
        ephemeral: true,
    }]
}

#[tokio::test]
async fn battlethread_opens_thread_and_prompts_admin() {
    let (server, platform) = server();
    let thread = open_battle(&server).await;

    assert_eq!(
        platform.responses_to("cmd-open"),
        vec![
            InteractionResponse::Defer { ephemeral: true },
            InteractionResponse::EditReply {
                content: "Thread \"Battle: alice vs bob\" created and members invited.".into()
            }
        ]
    );
    let msgs = platform.messages_in(&thread);
    assert_eq!(msgs.len(), 2, "got {:?}", msgs);
    assert_eq!(msgs[0].content, "Private battle thread created: Battle: alice vs bob");
    assert!(msgs[1].content.starts_with("<@900>, please set up the armies"));
    assert!(msgs[1].content.contains("Example: setup attacker: 3,1,0,0 ; defender: 2,2,0,0"));
    assert!(msgs[1].components.is_empty(), "setup prompt must not offer actions");

    let session = server.registry().get(&thread).expect("session");
    assert_eq!(session.admin_id(), Some("900"));
    assert_eq!(session.phase().await, Phase::AwaitingSetup);
}

#[tokio::test]
async fn setup_from_non_admin_is_refused() {
    let (server, platform) = server();
    let thread = open_battle(&server).await;
    server
        .route_event(message("m1", &alice(), &thread, SETUP))
        .await
        .unwrap();

    assert_eq!(
        platform.replies(),
        vec![(
            "m1".to_string(),
            "Only the battle admin can configure the armies setup.".to_string()
        )]
    );
    let snap = server.registry().get(&thread).unwrap().snapshot().await;
    assert!(snap.armies.is_none());
}

#[tokio::test]
async fn malformed_setup_leaves_armies_unset() {
    let (server, platform) = server();
    let thread = open_battle(&server).await;
    let bad = [
        "setup attacker 3,1,0,0 ; defender: 2,2,0,0",
        "setup attacker: 3,1,0 ; defender: 2,2,0,0",
        "setup attacker: 3,1,0,0 ; defender: 2,-2,0,0",
        "setup attacker: 3,x,0,0 ; defender: 2,2,0,0",
        "setup attacker: 3,1,0,0",
    ];
    for (i, content) in bad.iter().enumerate() {
        server
            .route_event(message(&format!("bad-{}", i), &admin(), &thread, content))
            .await
            .unwrap();
    }
    let replies = platform.replies();
    assert_eq!(replies.len(), bad.len());
    for (_, reply) in &replies {
        assert!(reply.starts_with("Failed to parse setup"), "reply: {}", reply);
        assert!(reply.ends_with("Use format: setup attacker: 3,1,0,0 ; defender: 2,2,0,0"));
    }
    let session = server.registry().get(&thread).unwrap();
    assert!(session.snapshot().await.armies.is_none());
}

#[tokio::test]
async fn valid_setup_announces_battle_with_two_actions() {
    let (server, platform) = server();
    let thread = open_battle(&server).await;
    platform.clear();
    server
        .route_event(message("m1", &admin(), &thread, "SETUP attacker: 3,1,0,0 ; defender: 2,2,0,0"))
        .await
        .unwrap();

    let msgs = platform.messages_in(&thread);
    assert_eq!(msgs.len(), 2, "got {:?}", msgs);
    assert_eq!(
        msgs[0].content,
        "Armies configured. Attacker: 3, 1, 0, 0; Defender: 2, 2, 0, 0"
    );
    assert_eq!(
        msgs[1].content,
        "Battle started between alice and bob. It's alice's turn."
    );
    let labels: Vec<&str> = msgs[1].components.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["Attack", "Retreat"]);

    let snap = server.registry().get(&thread).unwrap().snapshot().await;
    assert_eq!(snap.armies, Some(Armies::new([3, 1, 0, 0], [2, 2, 0, 0])));
    assert_eq!(snap.phase, Phase::AwaitingTurn(0));

    // A second setup does not reconfigure.
    server
        .route_event(message("m2", &admin(), &thread, "setup attacker: 9,9,9,9 ; defender: 9,9,9,9"))
        .await
        .unwrap();
    assert_eq!(
        platform.replies(),
        vec![("m2".to_string(), "The armies are already configured.".to_string())]
    );
    let snap = server.registry().get(&thread).unwrap().snapshot().await;
    assert_eq!(snap.armies, Some(Armies::new([3, 1, 0, 0], [2, 2, 0, 0])));
}

#[tokio::test]
async fn out_of_turn_and_outsider_presses_change_nothing() {
    let (server, platform) = server();
    let thread = open_configured_battle(&server, &platform).await;
    let session = server.registry().get(&thread).unwrap();
    let before = session.snapshot().await;

    server
        .route_event(button("i-bob", &bob(), &thread, "battle:attack"))
        .await
        .unwrap();
    server
        .route_event(button("i-carol", &carol(), &thread, "battle:retreat"))
        .await
        .unwrap();

    assert_eq!(
        platform.responses_to("i-bob"),
        ephemeral("It's not your turn. It's alice's turn.")
    );
    assert_eq!(
        platform.responses_to("i-carol"),
        ephemeral("You are not a participant in this battle.")
    );
    assert!(platform.messages_in(&thread).is_empty());
    assert_eq!(session.snapshot().await, before);
}

#[tokio::test]
async fn attack_then_retreat_alternates_turns() {
    let (server, platform) = server();
    let thread = open_configured_battle(&server, &platform).await;
    let session = server.registry().get(&thread).unwrap();

    server
        .route_event(button("i1", &alice(), &thread, "battle:attack"))
        .await
        .unwrap();
    assert_eq!(platform.responses_to("i1"), vec![InteractionResponse::DeferUpdate]);
    let snap = session.snapshot().await;
    assert_eq!(snap.turn, 1);
    let damage = MAX_HP - snap.participants[1].hp;
    assert!(DAMAGE_RANGE.contains(&damage));
    assert_eq!(snap.participants[0].hp, MAX_HP);
    assert_eq!(snap.log, vec![format!("alice attacked bob for {} damage.", damage)]);
    let contents: Vec<String> = platform
        .messages_in(&thread)
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(
        contents,
        vec![
            format!("alice attacks bob for {} damage.", damage),
            "It's now bob's turn.".to_string()
        ]
    );

    platform.clear();
    server
        .route_event(button("i2", &bob(), &thread, "battle:retreat"))
        .await
        .unwrap();
    let snap = session.snapshot().await;
    assert_eq!(snap.turn, 0);
    let healed = snap.participants[1].hp - (MAX_HP - damage);
    assert!(healed <= *HEAL_RANGE.end());
    assert!(snap.participants[1].hp <= MAX_HP);
    assert_eq!(snap.log.len(), 2);
    assert!(snap.log[1].starts_with("bob defended and recovered "));
    let contents: Vec<String> = platform
        .messages_in(&thread)
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents.len(), 2);
    assert!(contents[0].starts_with("bob defends and recovers "));
    assert_eq!(contents[1], "It's now alice's turn.");
}

/// Whoever holds the turn attacks until one side falls; returns the press count.
async fn fight_to_the_end(server: &BotServer, session: &BattleSession, thread: &str) -> usize {
    for press in 0..100 {
        let fighter = match session.phase().await {
            Phase::AwaitingTurn(0) => alice(),
            Phase::AwaitingTurn(_) => bob(),
            _ => return press,
        };
        server
            .route_event(button(&format!("p{}", press), &fighter, thread, "battle:attack"))
            .await
            .unwrap();
    }
    panic!("battle did not end after 100 attacks");
}

#[tokio::test]
async fn defeat_ends_battle_and_closes_session() {
    let (server, platform) = server();
    let thread = open_configured_battle(&server, &platform).await;
    let session = server.registry().get(&thread).unwrap();

    let presses = fight_to_the_end(&server, &session, &thread).await;
    let snap = session.snapshot().await;
    let Phase::Ended { winner } = snap.phase else {
        panic!("expected an ended battle, got {:?}", snap.phase);
    };
    let loser = 1 - winner;
    let (winner_name, loser_name) = (
        snap.participants[winner].username.clone(),
        snap.participants[loser].username.clone(),
    );

    let contents: Vec<String> = platform
        .messages_in(&thread)
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents.len(), presses * 2, "got {:?}", contents);
    let last = &contents[contents.len() - 2..];
    assert!(last[0].starts_with(&format!("{} attacks {} for ", winner_name, loser_name)));
    assert_eq!(last[1], format!("{} has been defeated! {} wins!", loser_name, winner_name));
    let turn_changes = contents.iter().filter(|c| c.starts_with("It's now")).count();
    assert_eq!(turn_changes, presses - 1);

    assert_eq!(snap.participants[loser].hp, 0);
    assert!(snap.participants[winner].hp > 0);
    assert_eq!(snap.turn, winner, "the deciding attack does not pass the turn");
    assert_eq!(snap.log.len(), presses);
    assert!(!server.registry().contains(&thread));

    // Presses arriving after close are no longer routed.
    platform.clear();
    server
        .route_event(button("late", &alice(), &thread, "battle:attack"))
        .await
        .unwrap();
    server
        .route_event(button("late-2", &bob(), &thread, "battle:attack"))
        .await
        .unwrap();
    assert!(platform.sent().is_empty());
}

#[tokio::test]
async fn ended_session_refuses_actions_when_kept() {
    let mut config = battlebot::config::Config::default();
    config.battle.remove_finished = false;
    let (server, platform) = server_with(config);
    let thread = open_configured_battle(&server, &platform).await;
    let session = server.registry().get(&thread).unwrap();
    fight_to_the_end(&server, &session, &thread).await;
    assert!(server.registry().contains(&thread));
    let before = session.snapshot().await;

    for (id, fighter) in [("after-a", alice()), ("after-b", bob())] {
        server
            .route_event(button(id, &fighter, &thread, "battle:attack"))
            .await
            .unwrap();
        assert_eq!(platform.responses_to(id), ephemeral("This battle is already over."));
    }
    assert_eq!(session.snapshot().await, before);
}

#[tokio::test]
async fn foreign_components_and_bot_messages_are_ignored() {
    let (server, platform) = server();
    let thread = open_configured_battle(&server, &platform).await;
    let session = server.registry().get(&thread).unwrap();
    let before = session.snapshot().await;

    let select = PlatformEvent::Component {
        interaction_id: "sel".into(),
        kind: battlebot::platform::ComponentKind::SelectMenu,
        custom_id: "battle:attack".into(),
        user: alice(),
        channel_id: Some(thread.clone()),
    };
    server.route_event(select).await.unwrap();
    server
        .route_event(button("other", &alice(), &thread, "poll:attack"))
        .await
        .unwrap();
    let mut robot = User::new("999", "robot");
    robot.bot = true;
    server
        .route_event(message("m-bot", &robot, &thread, SETUP))
        .await
        .unwrap();
    server
        .route_event(message("m-chat", &alice(), &thread, "good luck!"))
        .await
        .unwrap();

    assert!(platform.sent().is_empty(), "got {:?}", platform.sent());
    assert_eq!(session.snapshot().await, before);
}

#[tokio::test]
async fn unknown_battle_action_is_acknowledged_only() {
    let (server, platform) = server();
    let thread = open_configured_battle(&server, &platform).await;
    let session = server.registry().get(&thread).unwrap();
    let before = session.snapshot().await;

    server
        .route_event(button("i1", &alice(), &thread, "battle:dance"))
        .await
        .unwrap();
    assert_eq!(platform.responses_to("i1"), vec![InteractionResponse::DeferUpdate]);
    assert!(platform.messages_in(&thread).is_empty());
    assert_eq!(session.snapshot().await, before);
}

#[tokio::test]
async fn press_before_setup_is_refused() {
    let (server, platform) = server();
    let thread = open_battle(&server).await;
    server
        .route_event(button("i1", &alice(), &thread, "battle:attack"))
        .await
        .unwrap();
    assert_eq!(
        platform.responses_to("i1"),
        ephemeral("The armies have not been set up yet.")
    );
}
