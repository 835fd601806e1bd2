//! Top-level app state and wiring.

use std::path::PathBuf;

use anyhow::Context;
use bahi_api::{
    def::AppBackendApi,
    models::{LoginRequest, User},
};
use tracing::info;

use crate::{
    client::LedgerClient,
    kv::FileKvStore,
    session::{SessionState, SessionStore},
    settings::SettingsDb,
};

/// Everything the UI layer must provide to boot the app core.
pub struct AppConfig {
    pub backend_url: String,
    /// The app's sandboxed data directory. Session record and settings
    /// live here.
    pub data_dir: PathBuf,
    /// `RUST_LOG`-style log filter.
    pub rust_log: String,
}

/// The app core. One instance per process, owned by the UI layer.
pub struct App {
    client: LedgerClient,
    session: SessionStore<FileKvStore>,
    settings: SettingsDb<FileKvStore>,
}

impl App {
    /// Wire up the app core and resolve the persisted session. The returned
    /// app's session is already `LoggedIn` or `LoggedOut`, never `Loading`.
    pub fn init(config: AppConfig) -> anyhow::Result<Self> {
        crate::logger::init(&config.rust_log);

        let kv = FileKvStore::create_dir_all(config.data_dir)
            .context("Failed to open app data directory")?;

        let client = LedgerClient::new(config.backend_url)
            .context("Failed to build backend client")?;

        let session = SessionStore::new(kv.clone());
        let state = session.init();
        info!(logged_in = state.is_logged_in(), "app: session resolved");

        let settings = SettingsDb::load(kv);

        Ok(Self {
            client,
            session,
            settings,
        })
    }

    #[inline]
    pub fn client(&self) -> &LedgerClient {
        &self.client
    }

    #[inline]
    pub fn session(&self) -> &SessionStore<FileKvStore> {
        &self.session
    }

    #[inline]
    pub fn settings(&self) -> &SettingsDb<FileKvStore> {
        &self.settings
    }

    /// Log in and persist the session.
    ///
    /// Fails if the server rejects the credentials or if the session record
    /// can't be persisted; either way the session stays logged out.
    pub async fn login(
        &self,
        phone_number: String,
        password: String,
    ) -> anyhow::Result<User> {
        let req = LoginRequest {
            phone_number,
            password,
        };
        let resp = self.client.login(&req).await.context("Login failed")?;

        self.session
            .login(resp.token, resp.user.clone())
            .context("Failed to persist session")?;

        Ok(resp.user)
    }

    /// Log out: flip to `LoggedOut` and clear the persisted record.
    pub fn logout(&self) -> anyhow::Result<()> {
        self.session.logout()
    }

    /// Refresh the cached user record from the backend, if logged in.
    pub async fn refresh_profile(&self) -> anyhow::Result<Option<User>> {
        let token = match self.session.state() {
            SessionState::LoggedIn { token, .. } => token,
            _ => return Ok(None),
        };

        let user = self
            .client
            .get_profile(&token)
            .await
            .context("Failed to fetch profile")?;
        self.session.update_user(user.clone())?;
        Ok(Some(user))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn init_fresh_data_dir_resolves_logged_out() {
        let tmpdir = tempfile::TempDir::new().unwrap();
        let app = App::init(AppConfig {
            backend_url: "https://backend.test.invalid".to_owned(),
            data_dir: tmpdir.path().join("data"),
            rust_log: String::new(),
        })
        .unwrap();

        assert!(matches!(app.session().state(), SessionState::LoggedOut));
    }
}
