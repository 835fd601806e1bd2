//! The session state machine and its persisted record.
//!
//! The persisted record is two keys in the app's [`KvStore`]: the bearer
//! token and the cached [`User`] record. The two are written together at
//! login and removed together at logout; a record with only one of them is
//! treated as corrupt. All load failures resolve to `LoggedOut` rather than
//! surfacing an error state to the UI.

use anyhow::Context;
use bahi_api::models::{AuthToken, User};
use tokio::sync::watch;
use tracing::warn;

use crate::kv::KvStore;

const TOKEN_KEY: &str = "auth_token";
const USER_KEY: &str = "user.json";

/// The current session, as observed by the UI.
#[derive(Clone, Debug)]
pub enum SessionState {
    /// [`SessionStore::init`] hasn't resolved yet; show a splash screen.
    Loading,
    LoggedOut,
    LoggedIn { token: AuthToken, user: User },
}

impl SessionState {
    #[inline]
    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn { .. })
    }
}

/// Owns the in-memory session state and its persisted record.
///
/// Mutations (`login`, `logout`) persist first and only then update the
/// in-memory state, so a crash mid-mutation can never leave memory ahead of
/// disk. Concurrent mutations are not guarded here; the UI disables the
/// login/logout buttons while a call is in flight.
pub struct SessionStore<K> {
    kv: K,
    state_tx: watch::Sender<SessionState>,
}

impl<K: KvStore> SessionStore<K> {
    /// Create a store in the `Loading` state. Call [`SessionStore::init`] to
    /// resolve it.
    pub fn new(kv: K) -> Self {
        let (state_tx, _state_rx) = watch::channel(SessionState::Loading);
        Self { kv, state_tx }
    }

    /// Load the persisted session record and resolve `Loading` into
    /// `LoggedIn` or `LoggedOut`.
    ///
    /// Fails closed: a missing, partial, or undecodable record lands on
    /// `LoggedOut` (forcing a fresh login) instead of erroring.
    pub fn init(&self) -> SessionState {
        let state = match self.load_persisted() {
            Ok(Some((token, user))) => SessionState::LoggedIn { token, user },
            Ok(None) => SessionState::LoggedOut,
            Err(err) => {
                warn!("session: failed to load persisted record: {err:#}");
                // Clear any leftovers so the next init loads cleanly.
                self.delete_ignore_missing(TOKEN_KEY);
                self.delete_ignore_missing(USER_KEY);
                SessionState::LoggedOut
            }
        };
        self.state_tx.send_replace(state.clone());
        state
    }

    fn load_persisted(&self) -> anyhow::Result<Option<(AuthToken, User)>> {
        let token = match self.kv.read(TOKEN_KEY) {
            Ok(buf) => {
                let token = String::from_utf8(buf)
                    .context("Persisted auth token isn't utf8")?;
                Some(AuthToken(token))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) =>
                return Err(err).context("Failed to read persisted auth token"),
        };

        let user = match self.kv.read(USER_KEY) {
            Ok(buf) => {
                let user = serde_json::from_slice::<User>(&buf)
                    .context("Failed to deserialize persisted user record")?;
                Some(user)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) =>
                return Err(err)
                    .context("Failed to read persisted user record"),
        };

        match (token, user) {
            (Some(token), Some(user)) => Ok(Some((token, user))),
            (None, None) => Ok(None),
            (token, user) => anyhow::bail!(
                "Partial session record (token: {}, user: {})",
                token.is_some(),
                user.is_some(),
            ),
        }
    }

    /// Persist the session record, then flip the in-memory state to
    /// `LoggedIn`.
    ///
    /// If any write fails, the previous state (memory and disk) is left
    /// intact; a token without a user record is rolled back so we never
    /// persist half a session.
    pub fn login(&self, token: AuthToken, user: User) -> anyhow::Result<()> {
        let user_json = serde_json::to_vec(&user)
            .context("Failed to serialize user record")?;

        self.kv
            .write(TOKEN_KEY, token.as_str().as_bytes())
            .context("Failed to persist auth token")?;
        if let Err(err) = self.kv.write(USER_KEY, &user_json) {
            self.delete_ignore_missing(TOKEN_KEY);
            return Err(err).context("Failed to persist user record");
        }

        self.state_tx
            .send_replace(SessionState::LoggedIn { token, user });
        Ok(())
    }

    /// Remove the persisted record, then flip the in-memory state to
    /// `LoggedOut`. Missing keys are not an error, so logout is idempotent.
    ///
    /// If a removal fails the in-memory state is left untouched, so the
    /// caller can retry; flipping memory while the token is still on disk
    /// would resurrect the session on the next launch.
    pub fn logout(&self) -> anyhow::Result<()> {
        let res_token = self.delete_result_ignore_missing(TOKEN_KEY);
        let res_user = self.delete_result_ignore_missing(USER_KEY);
        res_token.context("Failed to remove persisted auth token")?;
        res_user.context("Failed to remove persisted user record")?;

        self.state_tx.send_replace(SessionState::LoggedOut);
        Ok(())
    }

    /// Set the in-memory state to `LoggedIn` without touching the persisted
    /// record.
    ///
    /// Used when signup completes but the device store is unavailable: the
    /// user stays signed in for this process and will just have to log in
    /// again next launch.
    pub fn adopt(&self, token: AuthToken, user: User) {
        self.state_tx
            .send_replace(SessionState::LoggedIn { token, user });
    }

    /// Persist a refreshed user record (e.g. after a profile update) and
    /// update the in-memory state. Errors if not currently logged in.
    pub fn update_user(&self, user: User) -> anyhow::Result<()> {
        let token = match &*self.state_tx.borrow() {
            SessionState::LoggedIn { token, .. } => token.clone(),
            state => anyhow::bail!(
                "Can't update user record while {state:?}"
            ),
        };

        let user_json = serde_json::to_vec(&user)
            .context("Failed to serialize user record")?;
        self.kv
            .write(USER_KEY, &user_json)
            .context("Failed to persist user record")?;

        self.state_tx
            .send_replace(SessionState::LoggedIn { token, user });
        Ok(())
    }

    /// The current session state.
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// The current bearer token, if logged in.
    pub fn token(&self) -> Option<AuthToken> {
        match &*self.state_tx.borrow() {
            SessionState::LoggedIn { token, .. } => Some(token.clone()),
            _ => None,
        }
    }

    /// Subscribe to session state transitions. The UI router listens on this
    /// to switch between the login and home screens.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    fn delete_ignore_missing(&self, key: &str) {
        if let Err(err) = self.delete_result_ignore_missing(key) {
            warn!("session: failed to clean up '{key}': {err:#}");
        }
    }

    fn delete_result_ignore_missing(&self, key: &str) -> std::io::Result<()> {
        match self.kv.delete(key) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kv::test::MemKvStore;

    fn test_user() -> User {
        User {
            id: bahi_api::models::UserId(1),
            name: "Asha".to_owned(),
            phone_number: "9876543210".to_owned(),
            business_name: Some("Asha General Store".to_owned()),
            profile_photo_url: None,
            location: None,
        }
    }

    fn test_token() -> AuthToken {
        AuthToken("tok_test_123".to_owned())
    }

    #[test]
    fn starts_loading_then_init_resolves_logged_out() {
        let store = SessionStore::new(MemKvStore::new());
        assert!(matches!(store.state(), SessionState::Loading));

        let state = store.init();
        assert!(matches!(state, SessionState::LoggedOut));
        assert!(matches!(store.state(), SessionState::LoggedOut));
    }

    #[test]
    fn login_then_reload_roundtrips() {
        let kv = MemKvStore::new();
        {
            let store = SessionStore::new(&kv);
            store.init();
            store.login(test_token(), test_user()).unwrap();
            assert!(store.state().is_logged_in());
        }

        // "restart the app": a fresh store over the same kv
        let store = SessionStore::new(&kv);
        match store.init() {
            SessionState::LoggedIn { token, user } => {
                assert_eq!(token, test_token());
                assert_eq!(user, test_user());
            }
            state => panic!("expected LoggedIn, got {state:?}"),
        }
    }

    #[test]
    fn partial_record_resolves_logged_out_and_cleans_up() {
        let kv = MemKvStore::new();
        kv.insert("auth_token", b"tok_orphan".to_vec());

        let store = SessionStore::new(&kv);
        assert!(matches!(store.init(), SessionState::LoggedOut));

        // the orphaned token must be gone so the next init loads cleanly
        assert!(!kv.contains_key("auth_token"));
    }

    #[test]
    fn corrupt_user_record_resolves_logged_out() {
        let kv = MemKvStore::new();
        kv.insert("auth_token", b"tok_123".to_vec());
        kv.insert("user.json", b"{ not json ".to_vec());

        let store = SessionStore::new(&kv);
        assert!(matches!(store.init(), SessionState::LoggedOut));
        assert!(!kv.contains_key("auth_token"));
        assert!(!kv.contains_key("user.json"));
    }

    #[test]
    fn failed_token_persist_leaves_state_untouched() {
        let kv = MemKvStore::new();
        kv.set_fail_writes(true);

        let store = SessionStore::new(&kv);
        store.init();
        store.login(test_token(), test_user()).unwrap_err();

        assert!(matches!(store.state(), SessionState::LoggedOut));
        assert!(!kv.contains_key("auth_token"));
        assert!(!kv.contains_key("user.json"));
    }

    #[test]
    fn failed_user_persist_rolls_back_token() {
        let kv = MemKvStore::new();
        kv.set_fail_writes_for("user.json");

        let store = SessionStore::new(&kv);
        store.init();
        store.login(test_token(), test_user()).unwrap_err();

        assert!(matches!(store.state(), SessionState::LoggedOut));
        // both keys or neither; the token write must have been rolled back
        assert!(!kv.contains_key("auth_token"));
        assert!(!kv.contains_key("user.json"));
    }

    #[test]
    fn logout_clears_record_and_is_idempotent() {
        let kv = MemKvStore::new();
        let store = SessionStore::new(&kv);
        store.init();
        store.login(test_token(), test_user()).unwrap();

        store.logout().unwrap();
        assert!(matches!(store.state(), SessionState::LoggedOut));
        assert!(!kv.contains_key("auth_token"));
        assert!(!kv.contains_key("user.json"));

        // logging out while already logged out is fine
        store.logout().unwrap();
    }

    #[test]
    fn logout_delete_failure_leaves_state_for_retry() {
        let kv = MemKvStore::new();
        let store = SessionStore::new(&kv);
        store.init();
        store.login(test_token(), test_user()).unwrap();

        kv.set_fail_deletes(true);
        store.logout().unwrap_err();
        // still logged in: the persisted record is still on disk, so
        // pretending to be logged out would just resurrect next launch
        assert!(store.state().is_logged_in());

        // the retry can succeed
        kv.set_fail_deletes(false);
        store.logout().unwrap();
        assert!(matches!(store.state(), SessionState::LoggedOut));
    }

    #[test]
    fn subscribers_observe_transitions() {
        let kv = MemKvStore::new();
        let store = SessionStore::new(&kv);
        let mut rx = store.subscribe();

        assert!(matches!(*rx.borrow_and_update(), SessionState::Loading));

        store.init();
        assert!(rx.has_changed().unwrap());
        assert!(matches!(*rx.borrow_and_update(), SessionState::LoggedOut));

        store.login(test_token(), test_user()).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_logged_in());

        store.logout().unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(matches!(*rx.borrow_and_update(), SessionState::LoggedOut));
    }

    #[test]
    fn adopt_signs_in_memory_only() {
        let kv = MemKvStore::new();
        let store = SessionStore::new(&kv);
        store.init();

        store.adopt(test_token(), test_user());
        assert!(store.state().is_logged_in());
        assert!(!kv.contains_key("auth_token"));
        assert!(!kv.contains_key("user.json"));
    }

    #[test]
    fn update_user_persists_refreshed_record() {
        let kv = MemKvStore::new();
        let store = SessionStore::new(&kv);
        store.init();
        store.login(test_token(), test_user()).unwrap();

        let mut user = test_user();
        user.business_name = Some("Asha Kirana".to_owned());
        store.update_user(user.clone()).unwrap();

        // reload sees the refreshed record
        let store2 = SessionStore::new(&kv);
        match store2.init() {
            SessionState::LoggedIn { user: user2, .. } =>
                assert_eq!(user2, user),
            state => panic!("expected LoggedIn, got {state:?}"),
        }
    }

    #[test]
    fn update_user_while_logged_out_errors() {
        let store = SessionStore::new(MemKvStore::new());
        store.init();
        store.update_user(test_user()).unwrap_err();
    }
}
