use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::FeedMode;

/// Local preferences (persisted to JSON file)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub feed_mode: FeedMode,
}

pub struct PreferencesStorage {
    path: PathBuf,
    pub prefs: Preferences,
}

impl PreferencesStorage {
    pub fn new(data_dir: &Path) -> Self {
        let path = data_dir.join("preferences.json");
        let prefs = Self::load_from_file(&path).unwrap_or_default();
        Self { path, prefs }
    }

    fn load_from_file(path: &Path) -> Option<Preferences> {
        let contents = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(prefs) => Some(prefs),
            Err(e) => {
                tracing::warn!("preferences: ignoring unreadable {}: {}", path.display(), e);
                None
            }
        }
    }

    fn save_to_file(&self) {
        let json = match serde_json::to_string_pretty(&self.prefs) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("preferences: failed to encode: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, json) {
            tracing::warn!("preferences: failed to write {}: {}", self.path.display(), e);
        }
    }

    pub fn feed_mode(&self) -> FeedMode {
        self.prefs.feed_mode
    }

    pub fn set_feed_mode(&mut self, mode: FeedMode) {
        if self.prefs.feed_mode == mode {
            return;
        }
        self.prefs.feed_mode = mode;
        self.save_to_file();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_feed_mode_is_for_you() {
        let dir = tempdir().unwrap();
        let storage = PreferencesStorage::new(dir.path());
        assert_eq!(storage.feed_mode(), FeedMode::ForYou);
    }

    #[test]
    fn test_feed_mode_survives_reload() {
        let dir = tempdir().unwrap();
        let mut storage = PreferencesStorage::new(dir.path());
        storage.set_feed_mode(FeedMode::Latest);

        let reloaded = PreferencesStorage::new(dir.path());
        assert_eq!(reloaded.feed_mode(), FeedMode::Latest);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("preferences.json"), "{not json").unwrap();

        let storage = PreferencesStorage::new(dir.path());
        assert_eq!(storage.feed_mode(), FeedMode::ForYou);
    }
}
