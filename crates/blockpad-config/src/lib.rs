use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the scratch buffer lives on disk.
    pub scratch_path: PathBuf,
    /// Language used when a block carries no tag.
    pub default_language: String,
    pub autosave_delay_ms: u64,
    pub detection_delay_ms: u64,
    /// "default" or "emacs".
    pub keymap: String,
    pub show_line_numbers: bool,
    pub show_fold_gutter: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scratch_path: PathBuf::from("~/.config/blockpad/scratch.txt"),
            default_language: "text".to_string(),
            autosave_delay_ms: 2000,
            detection_delay_ms: 2000,
            keymap: "default".to_string(),
            show_line_numbers: true,
            show_fold_gutter: true,
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the loaded scratch path
        config.scratch_path = Self::expand_path(&config.scratch_path).unwrap_or(config.scratch_path);

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// The effective config: the file if present, defaults otherwise,
    /// with the scratch path expanded either way.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let mut config = Self::load()?.unwrap_or_default();
        config.scratch_path = Self::expand_path(&config.scratch_path).unwrap_or(config.scratch_path);
        Ok(config)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/blockpad");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        // Should not contain tilde anymore
        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/blockpad/config.toml"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_language, "text");
        assert_eq!(config.autosave_delay_ms, 2000);
        assert_eq!(config.detection_delay_ms, 2000);
        assert_eq!(config.keymap, "default");
        assert!(config.show_line_numbers);
        assert!(config.show_fold_gutter);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let original = Config {
            scratch_path: PathBuf::from("/tmp/scratch.txt"),
            default_language: "markdown".to_string(),
            autosave_delay_ms: 500,
            detection_delay_ms: 1000,
            keymap: "emacs".to_string(),
            show_line_numbers: false,
            show_fold_gutter: true,
        };

        let toml_str = toml::to_string(&original).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(deserialized.scratch_path, original.scratch_path);
        assert_eq!(deserialized.default_language, original.default_language);
        assert_eq!(deserialized.autosave_delay_ms, original.autosave_delay_ms);
        assert_eq!(deserialized.keymap, original.keymap);
        assert_eq!(deserialized.show_line_numbers, original.show_line_numbers);
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config: Config = toml::from_str("keymap = \"emacs\"\n").unwrap();
        assert_eq!(config.keymap, "emacs");
        assert_eq!(config.default_language, "text");
        assert_eq!(config.autosave_delay_ms, 2000);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test/path");
        let expanded = Config::expand_path(&path);

        assert!(expanded.is_some());
        let expanded = expanded.unwrap();
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_with_env_var() {
        unsafe {
            env::set_var("BLOCKPAD_TEST_VAR", "/test/env/path");
        }

        let path = PathBuf::from("$BLOCKPAD_TEST_VAR/subdir");
        let expanded = Config::expand_path(&path);

        assert_eq!(expanded, Some(PathBuf::from("/test/env/path/subdir")));

        unsafe {
            env::remove_var("BLOCKPAD_TEST_VAR");
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        let test_config = Config {
            scratch_path: PathBuf::from("/tmp/scratch.txt"),
            keymap: "emacs".to_string(),
            ..Config::default()
        };

        test_config.save_to_path(&config_file).unwrap();

        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();
        assert_eq!(loaded_config.scratch_path, test_config.scratch_path);
        assert_eq!(loaded_config.keymap, "emacs");
    }

    #[test]
    fn test_config_with_tilde_in_toml() {
        let config_content = r#"
scratch_path = "~/notes/scratch.txt"
"#;

        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, config_content).unwrap();

        let config = Config::load_from_path(&config_file).unwrap().unwrap();
        let expanded_path = config.scratch_path.to_string_lossy();
        assert!(!expanded_path.starts_with('~'));
        assert!(expanded_path.contains("notes/scratch.txt"));
    }
}
