//! Thread id → battle session lookup shared by the dispatcher and the
//! command handlers.
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::battle::BattleSession;
use crate::logutil::escape_log;

/// Registry of live battle sessions keyed by thread id.
///
/// Constructed once at startup and handed to the server by `Arc`. The lock is
/// only held for map operations, never across an await.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<BattleSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` under its thread id, replacing any previous session there.
    pub fn insert(&self, session: BattleSession) -> Arc<BattleSession> {
        let session = Arc::new(session);
        if let Ok(mut map) = self.sessions.write() {
            map.insert(session.thread_id().to_string(), session.clone());
        }
        session
    }

    pub fn get(&self, thread_id: &str) -> Option<Arc<BattleSession>> {
        self.sessions
            .read()
            .ok()
            .and_then(|map| map.get(thread_id).cloned())
    }

    pub fn remove(&self, thread_id: &str) -> Option<Arc<BattleSession>> {
        self.sessions
            .write()
            .ok()
            .and_then(|mut map| map.remove(thread_id))
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.sessions
            .read()
            .map(|map| map.contains_key(thread_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn thread_ids(&self) -> Vec<String> {
        self.sessions
            .read()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn remove_where<F>(&self, reason: &str, pred: F) -> Vec<String>
    where
        F: Fn(&BattleSession) -> bool,
    {
        let Ok(mut map) = self.sessions.write() else {
            return Vec::new();
        };
        let doomed: Vec<String> = map
            .iter()
            .filter(|&(_, s)| !s.is_busy() && pred(s.as_ref()))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &doomed {
            map.remove(id);
            info!(
                target: "battlebot::battles",
                "battle.evict thread={} reason={} remaining={}",
                escape_log(id),
                reason,
                map.len()
            );
        }
        doomed
    }

    /// Remove sessions idle for longer than `timeout_minutes`. Busy sessions are kept.
    pub fn prune_idle(&self, timeout_minutes: u32) -> Vec<String> {
        if timeout_minutes == 0 {
            return Vec::new();
        }
        self.remove_where("idle", |s| s.is_inactive(timeout_minutes as i64))
    }

    /// Remove sessions whose battle has ended.
    pub fn prune_finished(&self) -> Vec<String> {
        self.remove_where("finished", |s| s.is_ended())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{Action, Armies};
    use crate::platform::recording::RecordingPlatform;
    use crate::platform::User;

    fn session(thread: &str) -> BattleSession {
        BattleSession::new(
            thread,
            [User::new("a", "alice"), User::new("b", "bob")],
            None,
            Arc::new(RecordingPlatform::new()),
        )
    }

    #[test]
    fn insert_get_remove() {
        let reg = SessionRegistry::new();
        assert!(reg.is_empty());
        reg.insert(session("t1"));
        reg.insert(session("t2"));
        assert_eq!(reg.len(), 2);
        assert!(reg.get("t1").is_some());
        assert!(reg.get("missing").is_none());
        assert!(reg.remove("t1").is_some());
        assert!(!reg.contains("t1"));
        assert_eq!(reg.thread_ids(), vec!["t2".to_string()]);
    }

    #[test]
    fn same_thread_replaces() {
        let reg = SessionRegistry::new();
        let first = reg.insert(session("t1"));
        let second = reg.insert(session("t1"));
        assert_eq!(reg.len(), 1);
        assert!(!Arc::ptr_eq(&first, &reg.get("t1").unwrap()));
        assert!(Arc::ptr_eq(&second, &reg.get("t1").unwrap()));
    }

    #[test]
    fn zero_timeout_never_prunes() {
        let reg = SessionRegistry::new();
        reg.insert(session("t1"));
        assert!(reg.prune_idle(0).is_empty());
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn prune_finished_only_removes_ended() {
        let reg = SessionRegistry::new();
        let done = reg.insert(session("done").with_armies(Armies::new([1, 0, 0, 0], [1, 0, 0, 0])));
        reg.insert(session("live"));
        done.set_hp(1, 1);
        done.act("a", Action::Attack).await.expect("attack");
        assert!(done.is_ended());

        assert_eq!(reg.prune_finished(), vec!["done".to_string()]);
        assert!(reg.contains("live"));
        assert!(!reg.contains("done"));
    }
}
