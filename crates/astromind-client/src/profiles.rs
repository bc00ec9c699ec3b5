//! Per-name snapshots of the last submitted birth form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::request::{BirthForm, PartnerData, TransitData};

/// Delay between the last keystroke in the name field and the profile load
pub const PROFILE_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("profile storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("profile file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Verbatim copy of the form fields, not of any computed chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub lon: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub selected_city: String,
    #[serde(default)]
    pub transit_data: Option<TransitData>,
    #[serde(default)]
    pub enable_transit: bool,
    #[serde(default)]
    pub partner_data: Option<PartnerData>,
    #[serde(default)]
    pub selected_partner_city: String,
    #[serde(default)]
    pub enable_partner: bool,
}

impl ProfileSnapshot {
    pub fn from_form(form: &BirthForm, selected_city: &str, selected_partner_city: &str) -> Self {
        Self {
            date: form.date.clone(),
            time: form.time.clone(),
            lat: form.lat.clone(),
            lon: form.lon.clone(),
            question: form.question.clone(),
            selected_city: selected_city.to_string(),
            transit_data: Some(form.transit.clone()),
            enable_transit: form.enable_transit,
            partner_data: Some(form.partner.clone()),
            selected_partner_city: selected_partner_city.to_string(),
            enable_partner: form.enable_partner,
        }
    }

    /// Copy the snapshot into a form. Transit and partner sections are only
    /// touched when the snapshot carries them.
    pub fn apply_to(&self, form: &mut BirthForm) {
        form.date = self.date.clone();
        form.time = self.time.clone();
        form.lat = self.lat.clone();
        form.lon = self.lon.clone();
        form.question = self.question.clone();
        if let Some(transit) = &self.transit_data {
            form.transit = transit.clone();
            form.enable_transit = self.enable_transit;
        }
        if let Some(partner) = &self.partner_data {
            form.partner = partner.clone();
            form.enable_partner = self.enable_partner;
        }
    }
}

pub fn profile_key(name: &str) -> String {
    format!("astro_profile_{}", name)
}

/// JSON file mapping `astro_profile_{name}` to a snapshot
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub const FILE_NAME: &'static str = "profiles.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    fn io_error(&self, source: std::io::Error) -> ProfileError {
        ProfileError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, serde_json::Value>, ProfileError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Snapshot saved under `name`, if any. A blank name never matches.
    pub fn load(&self, name: &str) -> Result<Option<ProfileSnapshot>, ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let mut all = self.read_all()?;
        match all.remove(&profile_key(name)) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store a snapshot under `name`. A blank name is ignored.
    pub fn save(&self, name: &str, snapshot: &ProfileSnapshot) -> Result<(), ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        let mut all = self.read_all()?;
        all.insert(profile_key(name), serde_json::to_value(snapshot)?);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(&all)?;
        fs::write(&self.path, json).map_err(|e| self.io_error(e))?;
        log::info!("ProfileStore: saved profile {}", name);
        Ok(())
    }
}

/// Resolves the name to load once typing pauses
pub struct ProfileDebouncer {
    delay: Duration,
    generation: AtomicU64,
}

impl Default for ProfileDebouncer {
    fn default() -> Self {
        Self::new(PROFILE_DEBOUNCE)
    }
}

impl ProfileDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: AtomicU64::new(0),
        }
    }

    fn touch(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn wait(&self, ticket: u64, name: &str) -> Option<String> {
        tokio::time::sleep(self.delay).await;
        if self.generation.load(Ordering::SeqCst) != ticket {
            return None;
        }
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    /// Called on every change of the name. Returns the name only if no
    /// newer change arrived during the delay.
    pub async fn settle(&self, name: &str) -> Option<String> {
        let ticket = self.touch();
        self.wait(ticket, name).await
    }

    /// Debounce, then load the settled name's snapshot. Load errors are logged.
    pub async fn load(&self, store: &ProfileStore, name: &str) -> Option<ProfileSnapshot> {
        let name = self.settle(name).await?;
        read_logged(store, &name)
    }

    /// Background variant of [`load`](Self::load). The change is registered
    /// before this returns, so call order decides which name wins.
    pub fn spawn_load(
        self: &Arc<Self>,
        store: Arc<ProfileStore>,
        name: String,
    ) -> JoinHandle<Option<(String, ProfileSnapshot)>> {
        let ticket = self.touch();
        let debouncer = Arc::clone(self);
        tokio::spawn(async move {
            let name = debouncer.wait(ticket, &name).await?;
            let snapshot = read_logged(&store, &name)?;
            Some((name, snapshot))
        })
    }
}

fn read_logged(store: &ProfileStore, name: &str) -> Option<ProfileSnapshot> {
    match store.load(name) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::error!("could not load profile {}: {}", name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ProfileSnapshot {
        ProfileSnapshot {
            date: "1990-05-17".to_string(),
            time: "14:30".to_string(),
            lat: "42.6977".to_string(),
            lon: "23.3219".to_string(),
            selected_city: "София".to_string(),
            enable_transit: true,
            transit_data: Some(TransitData {
                target_date: "2025-01-01".to_string(),
                target_time: "12:00".to_string(),
            }),
            ..ProfileSnapshot::default()
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::in_dir(dir.path());
        assert_eq!(store.load("Иван").unwrap(), None);

        store.save("Иван", &snapshot()).unwrap();
        store.save("Мария", &ProfileSnapshot::default()).unwrap();
        assert_eq!(store.load(" Иван ").unwrap(), Some(snapshot()));
        assert_eq!(store.load("").unwrap(), None);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("profiles.json")).unwrap())
                .unwrap();
        assert_eq!(raw["astro_profile_Иван"]["selectedCity"], "София");
        assert_eq!(raw["astro_profile_Иван"]["transitData"]["target_date"], "2025-01-01");
    }

    #[test]
    fn test_apply_keeps_sections_missing_from_snapshot() {
        let mut form = BirthForm {
            enable_partner: true,
            partner: PartnerData {
                partner_name: "Мария".to_string(),
                ..PartnerData::default()
            },
            ..BirthForm::default()
        };
        snapshot().apply_to(&mut form);
        assert_eq!(form.date, "1990-05-17");
        assert!(form.enable_transit);
        assert!(form.enable_partner);
        assert_eq!(form.partner.partner_name, "Мария");
    }

    #[test]
    fn test_old_snapshots_without_new_fields_load() {
        let snapshot: ProfileSnapshot = serde_json::from_str(r#"{"date": "2000-01-01"}"#).unwrap();
        assert_eq!(snapshot.date, "2000-01-01");
        assert!(!snapshot.enable_partner);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_keeps_last_name() {
        let debouncer = ProfileDebouncer::default();
        let (first, second) = tokio::join!(debouncer.settle("Ив"), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            debouncer.settle("Иван").await
        });
        assert_eq!(first, None);
        assert_eq!(second, Some("Иван".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loads_follow_call_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ProfileStore::in_dir(dir.path()));
        store.save("Ив", &ProfileSnapshot::default()).unwrap();
        store.save("Иван", &snapshot()).unwrap();

        let debouncer = Arc::new(ProfileDebouncer::default());
        let first = debouncer.spawn_load(store.clone(), "Ив".to_string());
        let second = debouncer.spawn_load(store, "Иван".to_string());

        assert_eq!(first.await.unwrap(), None);
        assert_eq!(second.await.unwrap(), Some(("Иван".to_string(), snapshot())));
    }
}
