//! Settings-file persistence for the replicated configuration.
//!
//! The `config` subtree is saved and loaded through the same serializer
//! schema it replicates with, so a settings file written by one release
//! stays readable by anything that can apply its change records. Loading
//! never fails the caller: unreadable or missing files fall back to
//! defaults, and a fresh API key is minted (and persisted) on first run.

use std::path::Path;

use stagelink_types::WireValue;

use crate::error::PersistError;
use crate::models::{StoreModel, StudioConfig};

/// Load the configuration from `path` through the config schema.
///
/// # Errors
///
/// Returns [`PersistError::Io`] if the file cannot be read,
/// [`PersistError::Json`] if it is not JSON, or [`PersistError::Codec`]
/// if the JSON does not decode as a config.
pub fn load(path: &Path) -> Result<StudioConfig, PersistError> {
    let contents = std::fs::read_to_string(path)?;
    let wire: WireValue = serde_json::from_str(&contents)?;
    let config = StudioConfig::from_wire(&wire)?;
    tracing::debug!(path = %path.display(), "settings loaded");
    Ok(config)
}

/// Persist the configuration to `path` through the config schema.
///
/// # Errors
///
/// Returns [`PersistError::Codec`] if the config cannot be encoded or
/// [`PersistError::Io`] if the file cannot be written.
pub fn save(path: &Path, config: &StudioConfig) -> Result<(), PersistError> {
    let wire = config.to_wire()?;
    let contents = serde_json::to_string_pretty(&wire)?;
    std::fs::write(path, contents)?;
    tracing::debug!(path = %path.display(), "settings saved");
    Ok(())
}

/// Persist the configuration, demoting failures to warnings. Settings
/// writes ride on user edits and must never take the session down.
pub fn save_or_warn(path: &Path, config: &StudioConfig) {
    if let Err(err) = save(path, config) {
        tracing::warn!(path = %path.display(), error = %err, "settings write failed");
    }
}

/// Load the configuration for startup, falling back to defaults when the
/// file is absent or unreadable. On first run a fresh API key is minted
/// and written straight back so the key survives restarts.
pub fn load_or_default(path: &Path) -> StudioConfig {
    let mut config = load(path).unwrap_or_else(|err| {
        if is_missing_file(&err) {
            tracing::info!(path = %path.display(), "no settings file yet, starting from defaults");
        } else {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "settings file unreadable, starting from defaults"
            );
        }
        StudioConfig::default()
    });
    if config.ensure_defaults() {
        tracing::info!(path = %path.display(), "minted a fresh api key on first run");
        save_or_warn(path, &config);
    }
    config
}

fn is_missing_file(err: &PersistError) -> bool {
    matches!(err, PersistError::Io(io) if io.kind() == std::io::ErrorKind::NotFound)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stagelink_types::Theme;

    use super::*;

    #[test]
    fn round_trips_through_the_config_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let config = StudioConfig {
            theme: Theme::Dark,
            history_limit: 10,
            ..StudioConfig::default()
        };
        save(&path, &config).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn first_run_mints_and_persists_a_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let config = load_or_default(&path);
        assert!(!config.api_key.is_nil());

        let reloaded = load_or_default(&path);
        assert_eq!(reloaded.api_key, config.api_key);
    }

    #[test]
    fn corrupt_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let config = load_or_default(&path);
        assert_eq!(config.theme, Theme::Light);
        assert!(!config.api_key.is_nil());
    }

    #[test]
    fn stored_wire_form_uses_schema_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        save(&path, &StudioConfig::default()).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("apiKey"));
        assert!(object.contains_key("historyLimit"));
        assert!(object.contains_key("mixSettings"));
        assert!(!object.contains_key("history_limit"));
    }
}
