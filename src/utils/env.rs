//! Environment layer: process env, with `.env` in the working directory loaded first.

use log::{debug, warn};
use std::path::Path;

use crate::types::{RunMode, Settings};

pub const MONGODB_URI: &str = "MONGODB_URI";
pub const MONGODB_DB: &str = "MONGODB_DB";
pub const MONGODB_COLLECTION: &str = "MONGODB_COLLECTION";
pub const PYTHON_BIN: &str = "PYTHON_BIN";
pub const LECTERN_MODE: &str = "LECTERN_MODE";

/// Load `dir/.env` into the process environment. Variables already set are kept.
pub fn load_dotenv(dir: &Path) {
    let env_path = dir.join(".env");
    if env_path.is_file() {
        match dotenvy::from_path(&env_path) {
            Ok(()) => debug!("Loaded {}", env_path.display()),
            Err(e) => warn!("{}: {}", env_path.display(), e),
        }
    }
}

/// Apply the process environment over `settings`.
pub fn apply_env(settings: &mut Settings) {
    apply_env_with(settings, |key| std::env::var(key).ok());
}

/// Apply values from `lookup` over `settings`. Blank values count as unset.
pub fn apply_env_with<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    if let Some(uri) = get(MONGODB_URI) {
        settings.mongo_uri = Some(uri);
    }
    if let Some(db) = get(MONGODB_DB) {
        settings.mongo_db = db;
    }
    if let Some(coll) = get(MONGODB_COLLECTION) {
        settings.mongo_collection = coll;
    }
    if let Some(bin) = get(PYTHON_BIN) {
        settings.python_bin = Some(bin);
    }
    if let Some(mode) = get(LECTERN_MODE) {
        match mode.parse::<RunMode>() {
            Ok(m) => settings.mode = m,
            Err(e) => warn!("{}: {}", LECTERN_MODE, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn blank_values_are_ignored() {
        let vars: HashMap<&str, &str> =
            HashMap::from([(MONGODB_URI, "  "), (MONGODB_DB, "Lectures"), (LECTERN_MODE, "detached")]);
        let mut settings = Settings::default();
        apply_env_with(&mut settings, |k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(settings.mongo_uri, None);
        assert_eq!(settings.mongo_db, "Lectures");
        assert_eq!(settings.mode, RunMode::Detached);
    }

    #[test]
    fn bad_mode_keeps_previous() {
        let mut settings = Settings::default();
        apply_env_with(&mut settings, |k| (k == LECTERN_MODE).then(|| "soon".to_string()));
        assert_eq!(settings.mode, RunMode::Streaming);
    }
}
