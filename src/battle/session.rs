use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Mutex as AsyncMutex;

use super::armies::{Armies, SETUP_EXAMPLE};
use super::errors::BattleError;
use crate::logutil::{escape_log, user_label};
use crate::metrics;
use crate::platform::{
    mention, Button, ButtonStyle, ChatPlatform, ComponentKind, InteractionResponse,
    OutgoingMessage, PlatformError, PlatformEvent, User,
};

/// Namespace prefix of battle button ids (`battle:<action>`).
pub const ACTION_NAMESPACE: &str = "battle";
/// Health every participant starts with; also the heal ceiling.
pub const MAX_HP: u32 = 100;
/// Attack damage, inclusive on both ends.
pub const DAMAGE_RANGE: RangeInclusive<u32> = 5..=19;
/// Retreat heal, inclusive on both ends.
pub const HEAL_RANGE: RangeInclusive<u32> = 3..=10;

/// Player action carried by a battle button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Attack,
    Retreat,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Attack => "attack",
            Action::Retreat => "retreat",
        }
    }

    pub fn custom_id(&self) -> String {
        format!("{}:{}", ACTION_NAMESPACE, self.as_str())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "attack" => Some(Action::Attack),
            "retreat" => Some(Action::Retreat),
            _ => None,
        }
    }
}

/// Split a component id into `(namespace, action)`.
fn split_custom_id(custom_id: &str) -> (&str, &str) {
    let mut parts = custom_id.split(':');
    let ns = parts.next().unwrap_or("");
    let action = parts.next().unwrap_or("");
    (ns, action)
}

/// The two buttons shown once a battle is active.
pub fn action_buttons() -> Vec<Button> {
    vec![
        Button::new(Action::Attack.custom_id(), "Attack", ButtonStyle::Danger),
        Button::new(Action::Retreat.custom_id(), "Retreat", ButtonStyle::Secondary),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub username: String,
    pub hp: u32,
}

impl Participant {
    fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            hp: MAX_HP,
        }
    }

    pub fn is_defeated(&self) -> bool {
        self.hp == 0
    }
}

/// Where a session sits in its lifecycle. `Resolving` is not listed: it is
/// the period during which a resolution holds the in-flight guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingSetup,
    AwaitingTurn(usize),
    Ended { winner: usize },
}

/// Result of one resolved action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Attacked {
        actor: usize,
        target: usize,
        damage: u32,
        defeated: bool,
    },
    Retreated {
        actor: usize,
        heal: u32,
    },
}

/// Point-in-time copy of session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleSnapshot {
    pub participants: [Participant; 2],
    pub turn: usize,
    pub log: Vec<String>,
    pub armies: Option<Armies>,
    pub phase: Phase,
}

#[derive(Clone)]
struct BattleState {
    participants: [Participant; 2],
    turn: usize,
    log: Vec<String>,
    armies: Option<Armies>,
    winner: Option<usize>,
    rng: StdRng,
}

impl BattleState {
    fn phase(&self) -> Phase {
        if let Some(winner) = self.winner {
            Phase::Ended { winner }
        } else if self.armies.is_none() {
            Phase::AwaitingSetup
        } else {
            Phase::AwaitingTurn(self.turn)
        }
    }

    fn index_of(&self, user_id: &str) -> Option<usize> {
        self.participants.iter().position(|p| p.id == user_id)
    }

    fn current_name(&self) -> &str {
        &self.participants[self.turn].username
    }

    fn name(&self, index: usize) -> &str {
        &self.participants[index].username
    }

    fn attack(&mut self, actor: usize) -> Resolution {
        let target = opponent(actor);
        let damage = self.rng.gen_range(DAMAGE_RANGE);
        let hp = self.participants[target].hp.saturating_sub(damage);
        self.participants[target].hp = hp;
        let entry = format!(
            "{} attacked {} for {} damage.",
            self.name(actor),
            self.name(target),
            damage
        );
        self.log.push(entry);

        let defeated = self.participants[target].is_defeated();
        if defeated {
            self.winner = Some(actor);
        } else {
            self.turn = target;
        }
        Resolution::Attacked {
            actor,
            target,
            damage,
            defeated,
        }
    }

    fn retreat(&mut self, actor: usize) -> Resolution {
        let heal = self.rng.gen_range(HEAL_RANGE);
        let hp = (self.participants[actor].hp + heal).min(MAX_HP);
        self.participants[actor].hp = hp;
        let entry = format!("{} defended and recovered {} HP.", self.name(actor), heal);
        self.log.push(entry);
        self.turn = opponent(actor);
        Resolution::Retreated { actor, heal }
    }

    /// Thread updates describing `resolution`, in posting order.
    fn announcements(&self, resolution: &Resolution) -> Vec<OutgoingMessage> {
        match *resolution {
            Resolution::Attacked {
                actor,
                target,
                damage,
                defeated,
            } => {
                let (actor, target) = (self.name(actor), self.name(target));
                let closing = if defeated {
                    format!("{} has been defeated! {} wins!", target, actor)
                } else {
                    format!("It's now {}'s turn.", target)
                };
                vec![
                    OutgoingMessage::text(format!(
                        "{} attacks {} for {} damage.",
                        actor, target, damage
                    )),
                    OutgoingMessage::text(closing),
                ]
            }
            Resolution::Retreated { actor, heal } => vec![
                OutgoingMessage::text(format!(
                    "{} defends and recovers {} HP.",
                    self.name(actor),
                    heal
                )),
                OutgoingMessage::text(format!("It's now {}'s turn.", self.current_name())),
            ],
        }
    }
}

fn opponent(index: usize) -> usize {
    (index + 1) % 2
}

/// # Battle Session
///
/// One two-player battle bound to a chat thread. The session owns both
/// participants, whose turn it is, the battle log and the armies
/// configuration, and it pushes status messages into its thread through the
/// injected [`ChatPlatform`].
///
/// ## Lifecycle
///
/// 1. **AwaitingSetup** - created without armies; [`start`](Self::start)
///    asks the admin for a `setup` command.
/// 2. **AwaitingTurn(i)** - armies set; only participant `i` may act.
/// 3. **Resolving** - an attack/retreat holds the in-flight guard while its
///    updates are sent. A second action arriving meanwhile is dropped.
/// 4. **Ended** - one side reached 0 HP; further actions are refused.
///
/// ## Concurrency
///
/// Battle state sits behind a plain mutex that is never held across an
/// `.await`, so participant and turn checks always run, even mid-resolution.
/// A separate async guard marks a resolution or setup in flight: setup waits
/// for it, button actions only `try_lock` it. A resolution is applied to a
/// staged copy of the state and committed once its updates are posted, so
/// presses checked meanwhile see the turn the resolution started from.
pub struct BattleSession {
    thread_id: String,
    admin_id: Option<String>,
    platform: Arc<dyn ChatPlatform>,
    state: Mutex<BattleState>,
    in_flight: AsyncMutex<()>,
    ended: AtomicBool,
    last_activity: Mutex<DateTime<Utc>>,
}

impl BattleSession {
    pub fn new(
        thread_id: impl Into<String>,
        players: [User; 2],
        admin_id: Option<String>,
        platform: Arc<dyn ChatPlatform>,
    ) -> Self {
        let participants = [
            Participant::from_user(&players[0]),
            Participant::from_user(&players[1]),
        ];
        Self {
            thread_id: thread_id.into(),
            admin_id,
            platform,
            state: Mutex::new(BattleState {
                participants,
                turn: 0,
                log: Vec::new(),
                armies: None,
                winner: None,
                rng: StdRng::from_entropy(),
            }),
            in_flight: AsyncMutex::new(()),
            ended: AtomicBool::new(false),
            last_activity: Mutex::new(Utc::now()),
        }
    }

    /// Start with armies already configured.
    pub fn with_armies(mut self, armies: Armies) -> Self {
        self.state_mut().armies = Some(armies);
        self
    }

    /// Replace the random source (tests seed it).
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.state_mut().rng = rng;
        self
    }

    fn state(&self) -> MutexGuard<'_, BattleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut BattleState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn admin_id(&self) -> Option<&str> {
        self.admin_id.as_deref()
    }

    /// True once a side has been defeated.
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// True while a resolution or setup is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
            .lock()
            .map(|g| *g)
            .unwrap_or_else(|_| Utc::now())
    }

    /// Check if the session has seen no events for `timeout_minutes`.
    pub fn is_inactive(&self, timeout_minutes: i64) -> bool {
        Utc::now() - self.last_activity() > chrono::Duration::minutes(timeout_minutes)
    }

    fn touch(&self) {
        if let Ok(mut g) = self.last_activity.lock() {
            *g = Utc::now();
        }
    }

    pub async fn snapshot(&self) -> BattleSnapshot {
        let state = self.state();
        BattleSnapshot {
            participants: state.participants.clone(),
            turn: state.turn,
            log: state.log.clone(),
            armies: state.armies,
            phase: state.phase(),
        }
    }

    pub async fn phase(&self) -> Phase {
        self.state().phase()
    }

    #[cfg(test)]
    pub(crate) fn set_hp(&self, index: usize, hp: u32) {
        self.state().participants[index % 2].hp = hp.min(MAX_HP);
    }

    /// Post the setup prompt, or the battle announcement with action buttons
    /// once armies are configured.
    pub async fn start(&self) {
        let _guard = self.in_flight.lock().await;
        self.announce().await;
    }

    async fn announce(&self) {
        let message = self.opening_message();
        self.send_update(message).await;
    }

    fn opening_message(&self) -> OutgoingMessage {
        let state = self.state();
        if state.armies.is_none() {
            let addressee = match &self.admin_id {
                Some(id) => format!("{}, please", mention(id)),
                None => "Please".to_string(),
            };
            return OutgoingMessage::text(format!(
                "{} set up the armies by replying in this thread with the following format:\n\
                 setup attacker: t1,t2,t3,t4 ; defender: t1,t2,t3,t4\n\
                 Example: {}",
                addressee, SETUP_EXAMPLE
            ));
        }

        let names = state
            .participants
            .iter()
            .map(|p| p.username.as_str())
            .collect::<Vec<_>>()
            .join(" and ");
        metrics::inc_battles_started();
        info!(
            target: "battlebot::battles",
            "battle.start thread={} players={}",
            escape_log(&self.thread_id),
            escape_log(&names)
        );
        OutgoingMessage::text(format!(
            "Battle started between {}. It's {}'s turn.",
            names,
            state.current_name()
        ))
        .with_components(action_buttons())
    }

    /// Handle a component interaction routed to this thread.
    ///
    /// Only `battle:*` buttons are considered. Failures are logged and
    /// swallowed; the session keeps accepting events.
    pub async fn handle_interaction(&self, event: &PlatformEvent) {
        if let Err(e) = self.try_handle_interaction(event).await {
            error!(
                "BattleSession {} handle_interaction error: {}",
                escape_log(&self.thread_id),
                e
            );
        }
    }

    async fn try_handle_interaction(&self, event: &PlatformEvent) -> Result<(), BattleError> {
        let PlatformEvent::Component {
            interaction_id,
            kind: ComponentKind::Button,
            custom_id,
            user,
            ..
        } = event
        else {
            return Ok(());
        };
        let (ns, action_name) = split_custom_id(custom_id);
        if ns != ACTION_NAMESPACE {
            return Ok(());
        }
        self.touch();

        let checked = Self::check_actor(&self.state(), &user.id);
        if let Err(e) = checked {
            return self.refuse(interaction_id, e).await;
        }

        let Ok(_guard) = self.in_flight.try_lock() else {
            metrics::inc_actions_dropped_busy();
            debug!(
                "BattleSession {}: dropping {} from {} while a resolution is in flight",
                escape_log(&self.thread_id),
                escape_log(custom_id),
                user_label(&user.username, &user.id)
            );
            self.platform
                .respond(interaction_id, InteractionResponse::DeferUpdate)
                .await?;
            return Ok(());
        };

        // The previous holder may have moved the turn on.
        let checked = Self::check_actor(&self.state(), &user.id);
        let actor = match checked {
            Ok(actor) => actor,
            Err(e) => return self.refuse(interaction_id, e).await,
        };

        self.platform
            .respond(interaction_id, InteractionResponse::DeferUpdate)
            .await?;

        match Action::from_name(action_name) {
            Some(action) => {
                self.resolve(actor, action).await;
            }
            None => debug!(
                "BattleSession {}: ignoring unknown action '{}'",
                escape_log(&self.thread_id),
                escape_log(action_name)
            ),
        }
        Ok(())
    }

    /// Answer a refused press with an ephemeral reason.
    async fn refuse(&self, interaction_id: &str, error: BattleError) -> Result<(), BattleError> {
        let content = match &error {
            BattleError::NotParticipant(_) => "You are not a participant in this battle.".to_string(),
            BattleError::Ended => "This battle is already over.".to_string(),
            BattleError::NotConfigured => "The armies have not been set up yet.".to_string(),
            BattleError::NotYourTurn { expected, .. } => {
                format!("It's not your turn. It's {}'s turn.", expected)
            }
            _ => return Err(error),
        };
        self.platform
            .respond(interaction_id, InteractionResponse::ephemeral(content))
            .await?;
        Ok(())
    }

    /// Validate that `user_id` may act right now; returns their index.
    fn check_actor(state: &BattleState, user_id: &str) -> Result<usize, BattleError> {
        let actor = state
            .index_of(user_id)
            .ok_or_else(|| BattleError::NotParticipant(user_id.to_string()))?;
        match state.phase() {
            Phase::Ended { .. } => Err(BattleError::Ended),
            Phase::AwaitingSetup => Err(BattleError::NotConfigured),
            Phase::AwaitingTurn(turn) if turn != actor => Err(BattleError::NotYourTurn {
                actor: state.participants[actor].username.clone(),
                expected: state.current_name().to_string(),
            }),
            Phase::AwaitingTurn(_) => Ok(actor),
        }
    }

    /// Resolve `action` for the participant `user_id`, outside of any interaction.
    ///
    /// Participant and turn are checked first. Returns [`BattleError::Busy`]
    /// without touching state when another resolution is in flight.
    pub async fn act(&self, user_id: &str, action: Action) -> Result<Resolution, BattleError> {
        Self::check_actor(&self.state(), user_id)?;
        let Ok(_guard) = self.in_flight.try_lock() else {
            metrics::inc_actions_dropped_busy();
            return Err(BattleError::Busy);
        };
        let actor = Self::check_actor(&self.state(), user_id)?;
        self.touch();
        Ok(self.resolve(actor, action).await)
    }

    /// Apply `action` to a staged copy, post the updates, then commit.
    /// Callers hold the in-flight guard.
    async fn resolve(&self, actor: usize, action: Action) -> Resolution {
        metrics::inc_actions_resolved();
        let (resolution, staged, updates) = {
            let mut staged = self.state().clone();
            let resolution = match action {
                Action::Attack => staged.attack(actor),
                Action::Retreat => staged.retreat(actor),
            };
            let updates = staged.announcements(&resolution);
            (resolution, staged, updates)
        };

        for update in updates {
            self.send_update(update).await;
        }

        if let Resolution::Attacked {
            target,
            defeated: true,
            ..
        } = resolution
        {
            self.ended.store(true, Ordering::SeqCst);
            metrics::inc_battles_finished();
            let (winner, loser) = (&staged.participants[actor], &staged.participants[target]);
            info!(
                target: "battlebot::battles",
                "battle.end thread={} winner={} loser={} turns={}",
                escape_log(&self.thread_id),
                user_label(&winner.username, &winner.id),
                user_label(&loser.username, &loser.id),
                staged.log.len()
            );
        }
        *self.state() = staged;
        resolution
    }

    /// Handle a plain text message posted in this thread.
    ///
    /// Only `setup ...` is recognised; anything else is ignored.
    pub async fn handle_message(&self, event: &PlatformEvent) -> Result<(), BattleError> {
        let PlatformEvent::Message {
            message_id,
            author,
            channel_id,
            content,
        } = event
        else {
            return Ok(());
        };
        let Some(parsed) = Armies::parse_command(content) else {
            return Ok(());
        };
        self.touch();

        if let Some(admin) = &self.admin_id {
            if &author.id != admin {
                self.platform
                    .reply_to(
                        channel_id,
                        message_id,
                        "Only the battle admin can configure the armies setup.",
                    )
                    .await?;
                return Ok(());
            }
        }

        let _guard = self.in_flight.lock().await;
        let configured = self.state().armies.is_some();
        if configured {
            self.platform
                .reply_to(channel_id, message_id, "The armies are already configured.")
                .await?;
            return Ok(());
        }

        let armies = match parsed {
            Ok(armies) => armies,
            Err(e) => {
                debug!(
                    "BattleSession {}: rejected setup '{}': {}",
                    escape_log(&self.thread_id),
                    escape_log(content),
                    e
                );
                self.platform
                    .reply_to(
                        channel_id,
                        message_id,
                        &format!(
                            "Failed to parse setup ({}). Use format: {}",
                            e, SETUP_EXAMPLE
                        ),
                    )
                    .await?;
                return Ok(());
            }
        };

        self.state().armies = Some(armies);
        info!(
            target: "battlebot::battles",
            "battle.setup thread={} by={} {}",
            escape_log(&self.thread_id),
            user_label(&author.username, &author.id),
            armies
        );
        self.send_update(OutgoingMessage::text(format!("Armies configured. {}", armies)))
            .await;
        self.announce().await;
        Ok(())
    }

    /// Post to the session thread. Failures are logged and the update is lost.
    async fn send_update(&self, message: OutgoingMessage) {
        match self.platform.send_message(&self.thread_id, message).await {
            Ok(()) => {}
            Err(PlatformError::UnknownChannel(ch)) => {
                metrics::inc_sends_failed();
                debug!("BattleSession: channel {} unavailable, dropping update", escape_log(&ch));
            }
            Err(e) => {
                metrics::inc_sends_failed();
                warn!(
                    "BattleSession {}: failed to send update: {}",
                    escape_log(&self.thread_id),
                    e
                );
            }
        }
    }
}
