//! App settings db, serialization, and persistence.
//!
//! Settings are tiny and change rarely, so updates persist write-through:
//! an update that can't be written to disk fails loudly instead of silently
//! diverging from the persisted copy.

use std::{io, sync::Mutex};

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::kv::KvStore;

const SETTINGS_JSON: &str = "settings.json";

/// The app settings DB. Responsible for managing access to the settings.
pub struct SettingsDb<K> {
    kv: K,
    /// The current in-memory settings.
    settings: Mutex<Settings>,
}

/// In-memory app settings state.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
#[cfg_attr(test, derive(Debug))]
pub struct Settings {
    /// Settings schema version.
    pub schema: SchemaVersion,
    /// Preferred locale (e.g. "hi", "en-IN").
    pub locale: Option<String>,
    /// Whether to send the customer an SMS receipt after each transaction.
    pub sms_receipts: Option<bool>,
}

/// Settings schema version. Used to determine whether to run migrations.
#[derive(Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[cfg_attr(test, derive(Debug))]
#[serde(transparent)]
pub struct SchemaVersion(pub u32);

// --- impl SettingsDb --- //

impl<K: KvStore> SettingsDb<K> {
    pub fn load(kv: K) -> Self {
        let settings = Mutex::new(Settings::load(&kv));
        Self { kv, settings }
    }

    /// A copy of the current settings.
    pub fn read(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    /// Merge `update` into the current settings and persist the result.
    pub fn update(&self, update: Settings) -> anyhow::Result<()> {
        let mut settings = self.settings.lock().unwrap();
        let mut updated = settings.clone();
        updated.update(update)?;

        let json_bytes = updated.serialize_json()?;
        self.kv
            .write(SETTINGS_JSON, &json_bytes)
            .context("Failed to write settings.json file")?;

        *settings = updated;
        Ok(())
    }
}

// --- impl Settings --- //

impl Settings {
    /// Load settings from settings.json file. Resets to default settings if
    /// something goes wrong.
    fn load<K: KvStore>(kv: &K) -> Self {
        match Self::load_from_file(kv) {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(err) => {
                error!("settings: failed to load: {err:#}");
                Settings::default()
            }
        }
        // TODO(bahi): run migrations if settings.schema != CURRENT
    }

    /// Try to load settings from settings.json file.
    fn load_from_file<K: KvStore>(kv: &K) -> anyhow::Result<Option<Self>> {
        let buf = match kv.read(SETTINGS_JSON) {
            Ok(buf) => buf,
            Err(err) if err.kind() == io::ErrorKind::NotFound =>
                return Ok(None),
            Err(err) =>
                return Err(err).context("Failed to read settings.json"),
        };
        let settings = Self::deserialize_json(&buf)?;
        Ok(Some(settings))
    }

    /// Merge updated settings from `update` into `self`.
    fn update(&mut self, update: Self) -> anyhow::Result<()> {
        ensure!(
            self.schema == update.schema,
            "Trying to update settings of a different schema version \
             (persisted={}, update={}). Somehow migrations didn't run?",
            self.schema.0,
            update.schema.0,
        );

        self.locale.update(update.locale);
        self.sms_receipts.update(update.sms_receipts);

        Ok(())
    }

    fn serialize_json(&self) -> anyhow::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .context("Failed to serialize settings.json")
    }

    fn deserialize_json(s: &[u8]) -> anyhow::Result<Self> {
        serde_json::from_slice(s)
            .context("Failed to deserialize settings.json")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema: SchemaVersion::CURRENT,
            locale: None,
            sms_receipts: None,
        }
    }
}

// --- impl SchemaVersion --- //

impl SchemaVersion {
    /// The current settings schema version.
    pub const CURRENT: Self = Self(1);
}

// --- Option<T>::update --- //

trait OptionExt {
    fn update(&mut self, update: Self);
}

impl<T> OptionExt for Option<T> {
    fn update(&mut self, update: Self) {
        if let Some(x) = update {
            *self = Some(x);
        }
    }
}
