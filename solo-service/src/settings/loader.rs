// Settings Loader
// Reads .travis.yml and applies the JSON --overwrite object on top of it

use crate::error::{ConfigError, ConfigResult};
use crate::settings::models::Settings;

use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::debug;

/// Settings file looked up in the working directory
pub const SETTINGS_FILE: &str = ".travis.yml";

/// Loader for build settings
pub struct SettingsLoader;

impl SettingsLoader {
    /// Parse settings from YAML, then shallow-merge the optional JSON object.
    ///
    /// Top-level keys of the overwrite object replace the loaded ones wholesale;
    /// nested mappings are not merged.
    pub fn parse(content: &str, overwrite: Option<&str>) -> ConfigResult<Settings> {
        let document: Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::from_yaml_error(&e))?;

        let mut mapping = match document {
            Value::Mapping(mapping) => mapping,
            Value::Null => Mapping::new(),
            _ => {
                return Err(ConfigError::Schema(
                    "top level of the settings file must be a mapping".to_string(),
                ))
            }
        };

        if let Some(overwrite) = overwrite {
            Self::apply_overwrite(&mut mapping, overwrite)?;
        }

        serde_yaml::from_value(Value::Mapping(mapping))
            .map_err(|e| ConfigError::Schema(e.to_string()))
    }

    /// Load settings from a file
    pub fn load_file<P: AsRef<Path>>(path: P, overwrite: Option<&str>) -> ConfigResult<Settings> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "loaded settings file");
        Self::parse(&content, overwrite)
    }

    fn apply_overwrite(mapping: &mut Mapping, overwrite: &str) -> ConfigResult<()> {
        let decoded: serde_json::Value =
            serde_json::from_str(overwrite).map_err(|e| ConfigError::Overwrite(e.to_string()))?;

        let serde_json::Value::Object(object) = decoded else {
            return Err(ConfigError::Overwrite(
                "expected a JSON object, e.g. '{\"python\": \"2.7\"}'".to_string(),
            ));
        };

        for (key, value) in object {
            let value =
                serde_yaml::to_value(value).map_err(|e| ConfigError::Overwrite(e.to_string()))?;
            debug!(key = %key, "overwriting setting");
            mapping.insert(Value::String(key), value);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRAVIS_YML: &str = r#"
language: python
python:
  - "2.7"
  - "3.3"
env:
  - A=a
  - A=b
install: pip install .
script: nosetests
"#;

    #[test]
    fn test_parse_without_overwrite() {
        let settings = SettingsLoader::parse(TRAVIS_YML, None).unwrap();
        assert_eq!(settings.versions(), vec!["2.7", "3.3"]);
        assert_eq!(settings.env_sets().unwrap().len(), 2);
    }

    #[test]
    fn test_overwrite_replaces_top_level_keys() {
        let settings = SettingsLoader::parse(
            TRAVIS_YML,
            Some(r#"{"python": "3.3", "env": ["A=c", "A=d", "A=e"]}"#),
        )
        .unwrap();

        assert_eq!(settings.versions(), vec!["3.3"]);
        assert_eq!(settings.env_sets().unwrap().len(), 3);
        assert_eq!(settings.commands("install"), ["pip install ."]);
    }

    #[test]
    fn test_overwrite_can_add_keys() {
        let settings =
            SettingsLoader::parse(TRAVIS_YML, Some(r#"{"after_script": ["coverage report"]}"#))
                .unwrap();
        assert_eq!(settings.commands("after_script"), ["coverage report"]);
    }

    #[test]
    fn test_overwrite_must_be_object() {
        let err = SettingsLoader::parse(TRAVIS_YML, Some(r#"["python"]"#)).unwrap_err();
        assert!(matches!(err, ConfigError::Overwrite(_)));

        let err = SettingsLoader::parse(TRAVIS_YML, Some("{not json")).unwrap_err();
        assert!(matches!(err, ConfigError::Overwrite(_)));
    }

    #[test]
    fn test_empty_document() {
        let settings = SettingsLoader::parse("", None).unwrap();
        assert!(settings.language.is_none());
    }

    #[test]
    fn test_non_mapping_document() {
        let err = SettingsLoader::parse("- a\n- b\n", None).unwrap_err();
        assert!(matches!(err, ConfigError::Schema(_)));
    }

    #[test]
    fn test_yaml_syntax_error() {
        let err = SettingsLoader::parse("language: [python\n", None).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn test_load_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(SETTINGS_FILE);
        std::fs::write(&path, TRAVIS_YML).unwrap();

        let settings = SettingsLoader::load_file(&path, None).unwrap();
        assert!(settings.ensure_supported_language().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let err = SettingsLoader::load_file(temp.path().join(SETTINGS_FILE), None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }
}
