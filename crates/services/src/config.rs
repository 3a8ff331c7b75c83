//! Scheduler settings as JSON documents.
//!
//! Every field is optional; missing fields take their defaults and the result
//! is validated before it is returned. Unknown fields are rejected so a typo
//! does not silently fall back to a default.
//!
//! ```
//! let settings = services::config::settings_from_json(r#"{ "learning_interval_2": 4 }"#)?;
//! assert_eq!(settings.learning_interval_2(), 4);
//! assert_eq!(settings.learning_interval_1(), 1);
//! # Ok::<(), services::ConfigError>(())
//! ```

use std::path::Path;

use srs_core::model::{SchedulerSettings, SchedulerSettingsDraft};
use tracing::info;

use crate::error::ConfigError;

/// Parse and validate a settings document.
///
/// # Errors
///
/// Returns `ConfigError::Json` for malformed JSON or unknown fields, and
/// `ConfigError::Settings` when a value is out of bounds.
pub fn settings_from_json(json: &str) -> Result<SchedulerSettings, ConfigError> {
    let draft: SchedulerSettingsDraft = serde_json::from_str(json)?;
    Ok(draft.validate()?)
}

/// Render settings as a complete, pretty-printed document.
///
/// # Errors
///
/// Returns `ConfigError::Json` if serialization fails.
pub fn settings_to_json(settings: &SchedulerSettings) -> Result<String, ConfigError> {
    Ok(serde_json::to_string_pretty(&settings.to_draft())?)
}

/// Read settings from a JSON file.
///
/// # Errors
///
/// Returns `ConfigError::Io` if the file cannot be read, otherwise the same
/// errors as [`settings_from_json`].
pub fn load_settings_file(path: &Path) -> Result<SchedulerSettings, ConfigError> {
    let json = std::fs::read_to_string(path)?;
    let settings = settings_from_json(&json)?;
    info!(path = %path.display(), "loaded scheduler settings");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use srs_core::model::{MasteryCriterion, SettingsError};

    #[test]
    fn empty_document_is_defaults() {
        let settings = settings_from_json("{}").unwrap();
        assert_eq!(settings, SchedulerSettings::default());
    }

    #[test]
    fn partial_document_overrides_named_fields() {
        let settings = settings_from_json(
            r#"{
                "max_streak": 10,
                "enable_ease_factor_adjustment": false,
                "mastery": { "min_repetitions": 3, "min_interval_days": 14, "criterion": "interval" }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.max_streak(), 10);
        assert!(!settings.enable_ease_factor_adjustment());
        assert_eq!(settings.mastery().criterion, MasteryCriterion::Interval);
        assert_eq!(settings.mastery().min_interval_days, 14);
        assert_eq!(settings.learning_interval_2(), 6);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = settings_from_json(r#"{ "learning_interval_3": 9 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn out_of_bounds_values_are_rejected() {
        let err = settings_from_json(r#"{ "new_card_interval": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Settings(SettingsError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn rendered_document_parses_back() {
        let settings = settings_from_json(r#"{ "ease_factor_decrease": 0.15 }"#).unwrap();
        let json = settings_to_json(&settings).unwrap();
        assert_eq!(settings_from_json(&json).unwrap(), settings);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_settings_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
