//! The session-storage collaborator that makes BOSH `restore` meaningful:
//! persists the `{jid, sid, rid}` tuple a `keepalive` connection needs to
//! reattach after e.g. a page reload, and reads it back.

use std::sync::Mutex;

/// The `{jid, sid, rid}` tuple persisted for BOSH session resumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSession {
    pub jid: String,
    pub sid: String,
    pub rid: u64,
}

/// A place to persist [`SavedSession`] across reconnects. Implementations
/// are free to back this with a file, a browser's local storage, a
/// database row, or (as here) nothing durable at all.
pub trait SessionStore: Send + Sync {
    fn save(&self, session: SavedSession);
    fn load(&self) -> Option<SavedSession>;
    fn clear(&self);
}

/// A [`SessionStore`] that keeps the session in memory only, for tests and
/// for callers that don't need `restore` to survive a process restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<SavedSession>>,
}

impl MemorySessionStore {
    pub fn new() -> MemorySessionStore {
        MemorySessionStore::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: SavedSession) {
        *self.slot.lock().unwrap() = Some(session);
    }

    fn load(&self) -> Option<SavedSession> {
        self.slot.lock().unwrap().clone()
    }

    fn clear(&self) {
        *self.slot.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_saved_session() {
        let store = MemorySessionStore::new();
        assert!(store.load().is_none());
        store.save(SavedSession {
            jid: "user@example.org".to_string(),
            sid: "sid-1".to_string(),
            rid: 42,
        });
        assert_eq!(
            store.load(),
            Some(SavedSession {
                jid: "user@example.org".to_string(),
                sid: "sid-1".to_string(),
                rid: 42,
            })
        );
        store.clear();
        assert!(store.load().is_none());
    }
}
