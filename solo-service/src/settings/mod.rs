// Settings Module
// Loading and typed access to the build settings file

pub mod loader;
pub mod models;

pub use loader::{SettingsLoader, SETTINGS_FILE};
pub use models::{MatrixSettings, RuleSettings, Scalar, Settings, StringList};
