// Build Settings Models
// Typed view of a .travis.yml file, tolerant of scalar-or-list fields

use crate::error::{ConfigError, ConfigResult};
use crate::matrix::env_set::EnvironmentSet;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// The only language the runner knows how to provision
pub const SUPPORTED_LANGUAGE: &str = "python";

/// Interpreter version used when settings do not name one
pub const DEFAULT_VERSION: &str = "2.7";

/// Root of the build settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub language: Option<Scalar>,

    /// Interpreter versions (the first matrix axis)
    #[serde(default)]
    pub python: Option<StringList>,

    /// Environment sets (the second matrix axis)
    #[serde(default)]
    pub env: Option<StringList>,

    #[serde(default)]
    pub matrix: Option<MatrixSettings>,

    #[serde(default)]
    pub before_install: Option<StringList>,

    #[serde(default)]
    pub install: Option<StringList>,

    #[serde(default)]
    pub before_script: Option<StringList>,

    #[serde(default)]
    pub script: Option<StringList>,

    #[serde(default)]
    pub after_script: Option<StringList>,
}

/// `matrix:` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatrixSettings {
    #[serde(default)]
    pub include: Vec<RuleSettings>,

    #[serde(default)]
    pub exclude: Vec<RuleSettings>,

    #[serde(default)]
    pub allow_failures: Vec<RuleSettings>,
}

/// One `{python, env}` entry of an include/exclude/allow_failures list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleSettings {
    #[serde(default)]
    pub python: Option<Scalar>,

    #[serde(default)]
    pub env: Option<Scalar>,
}

impl Settings {
    /// Fail unless the settings describe a Python project
    pub fn ensure_supported_language(&self) -> ConfigResult<()> {
        match self.language.as_ref().map(Scalar::as_str) {
            Some(SUPPORTED_LANGUAGE) => Ok(()),
            Some(other) => Err(ConfigError::UnsupportedLanguage(other.to_string())),
            None => Err(ConfigError::UnsupportedLanguage(String::new())),
        }
    }

    /// Interpreter versions, defaulting to a single 2.7 entry
    pub fn versions(&self) -> Vec<String> {
        match &self.python {
            Some(list) if !list.is_empty() => list.to_vec(),
            _ => vec![DEFAULT_VERSION.to_string()],
        }
    }

    /// Parsed environment sets, defaulting to a single empty set
    pub fn env_sets(&self) -> ConfigResult<Vec<EnvironmentSet>> {
        match &self.env {
            Some(list) if !list.is_empty() => list
                .iter()
                .map(|text| EnvironmentSet::parse(text).map_err(ConfigError::from))
                .collect(),
            _ => Ok(vec![EnvironmentSet::new()]),
        }
    }

    /// Commands configured for a lifecycle key such as `install`
    pub fn commands(&self, key: &str) -> &[String] {
        let list = match key {
            "before_install" => self.before_install.as_ref(),
            "install" => self.install.as_ref(),
            "before_script" => self.before_script.as_ref(),
            "script" => self.script.as_ref(),
            "after_script" => self.after_script.as_ref(),
            _ => None,
        };
        list.map(StringList::as_slice).unwrap_or(&[])
    }

    pub fn matrix(&self) -> MatrixSettings {
        self.matrix.clone().unwrap_or_default()
    }
}

/// A YAML scalar read as a string; numbers and booleans keep their YAML spelling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar(String);

impl Scalar {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_yaml(value: serde_yaml::Value) -> Result<Self, String> {
        match value {
            serde_yaml::Value::String(s) => Ok(Scalar(s)),
            serde_yaml::Value::Number(n) => Ok(Scalar(n.to_string())),
            serde_yaml::Value::Bool(b) => Ok(Scalar(b.to_string())),
            serde_yaml::Value::Tagged(tagged) => Scalar::from_yaml(tagged.value),
            other => Err(format!("expected a string, found {}", describe(&other))),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        Scalar::from_yaml(value).map_err(D::Error::custom)
    }
}

/// A field that may be written either as a single string or a list of strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringList(Vec<String>);

impl StringList {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Into<String>> FromIterator<T> for StringList {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        StringList(iter.into_iter().map(Into::into).collect())
    }
}

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_yaml::Value::deserialize(deserializer)? {
            serde_yaml::Value::Null => Ok(StringList::default()),
            serde_yaml::Value::Sequence(items) => items
                .into_iter()
                .map(|item| Scalar::from_yaml(item).map(|s| s.0))
                .collect::<Result<Vec<_>, _>>()
                .map(StringList)
                .map_err(D::Error::custom),
            scalar => Scalar::from_yaml(scalar)
                .map(|s| StringList(vec![s.0]))
                .map_err(D::Error::custom),
        }
    }
}

fn describe(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a list",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(yaml: &str) -> Settings {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_scalar_or_list_fields() {
        let s = settings(
            r#"
language: python
python: ["2.7", "3.3"]
install: pip install .
script:
  - nosetests
  - flake8
"#,
        );

        assert_eq!(s.versions(), vec!["2.7", "3.3"]);
        assert_eq!(s.commands("install"), ["pip install ."]);
        assert_eq!(s.commands("script"), ["nosetests", "flake8"]);
        assert!(s.commands("after_script").is_empty());
        assert!(s.commands("unknown").is_empty());
    }

    #[test]
    fn test_numeric_versions_are_strings() {
        let s = settings("language: python\npython:\n  - 2.7\n  - 3.3\n  - pypy\n");
        assert_eq!(s.versions(), vec!["2.7", "3.3", "pypy"]);

        let single = settings("language: python\npython: 3.3\n");
        assert_eq!(single.versions(), vec!["3.3"]);
    }

    #[test]
    fn test_defaults() {
        let s = settings("language: python\n");
        assert_eq!(s.versions(), vec![DEFAULT_VERSION]);
        assert_eq!(s.env_sets().unwrap(), vec![EnvironmentSet::new()]);
        assert!(s.matrix().include.is_empty());
    }

    #[test]
    fn test_null_lifecycle_is_empty() {
        let s = settings("language: python\ninstall:\n");
        assert!(s.commands("install").is_empty());
    }

    #[test]
    fn test_env_sets_are_parsed() {
        let s = settings("language: python\nenv:\n  - A=a B=\"x y\"\n  - A=b\n");
        let sets = s.env_sets().unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0], EnvironmentSet::new().with("A", "a").with("B", "x y"));
    }

    #[test]
    fn test_malformed_env_set_is_config_error() {
        let s = settings("language: python\nenv: NOEQUALS\n");
        assert!(matches!(s.env_sets(), Err(ConfigError::EnvSet(_))));
    }

    #[test]
    fn test_language_check() {
        assert!(settings("language: python").ensure_supported_language().is_ok());

        let err = settings("language: ruby")
            .ensure_supported_language()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedLanguage(ref l) if l == "ruby"));

        assert!(settings("python: 2.7").ensure_supported_language().is_err());
    }

    #[test]
    fn test_matrix_rules() {
        let s = settings(
            r#"
language: python
matrix:
  include:
    - python: 2.7
      env: A=c
  exclude:
    - python: "3.3"
  allow_failures:
    - python: "2.7"
      env: A=b
"#,
        );
        let matrix = s.matrix();
        assert_eq!(matrix.include[0].python, Some(Scalar::new("2.7")));
        assert_eq!(matrix.include[0].env, Some(Scalar::new("A=c")));
        assert_eq!(matrix.exclude[0].env, None);
        assert_eq!(matrix.allow_failures.len(), 1);
    }

    #[test]
    fn test_rejects_mapping_where_string_expected() {
        let result = serde_yaml::from_str::<Settings>("language: python\nscript:\n  run: x\n");
        assert!(result.is_err());
    }
}
