use std::path::{Path, PathBuf};

/// Default listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Default root for uploads and saved settings
pub const DEFAULT_DATA_DIR: &str = "user_data";

/// Environment variable overriding the listen address
pub const ADDR_ENV: &str = "PLOTDESK_ADDR";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "PLOTDESK_DATA_DIR";

/// Server configuration
///
/// Resolved from defaults, then environment variables, then positional
/// command line arguments `[addr] [data_dir]`.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub addr: String,
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            addr: DEFAULT_ADDR.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl AppConfig {
    /// Build a config from an environment lookup and the program arguments
    ///
    /// `args` excludes the program name.
    pub fn from_sources(env: impl Fn(&str) -> Option<String>, args: &[String]) -> Self {
        let mut config = AppConfig::default();

        if let Some(addr) = env(ADDR_ENV).filter(|v| !v.is_empty()) {
            config.addr = addr;
        }
        if let Some(dir) = env(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(addr) = args.first() {
            config.addr = addr.clone();
        }
        if let Some(dir) = args.get(1) {
            config.data_dir = PathBuf::from(dir);
        }

        config
    }

    /// Config for the running process
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        AppConfig::from_sources(|key| std::env::var(key).ok(), &args)
    }

    /// A config rooted at `data_dir` with the default address
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        AppConfig {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..AppConfig::default()
        }
    }

    /// Where uploaded CSV files are stored, one subdirectory per session
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Where model configurations are saved
    pub fn settings_dir(&self) -> PathBuf {
        self.data_dir.join("settings").join("json")
    }

    /// Make the data directory absolute and create the directories under it
    ///
    /// Upload paths recorded in sessions are derived from the data directory,
    /// so it is made absolute before any are handed out.
    pub fn prepare(mut self) -> std::io::Result<Self> {
        self.data_dir = std::path::absolute(&self.data_dir)?;
        std::fs::create_dir_all(self.uploads_dir())?;
        std::fs::create_dir_all(self.settings_dir())?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_env_then_args() {
        let none = |_: &str| None::<String>;
        assert_eq!(AppConfig::from_sources(none, &[]), AppConfig::default());

        let env: HashMap<&str, &str> = [(ADDR_ENV, "0.0.0.0:8080"), (DATA_DIR_ENV, "/srv/data")].into();
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());
        let config = AppConfig::from_sources(lookup, &[]);
        assert_eq!(config.addr, "0.0.0.0:8080");
        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));

        let args = vec!["127.0.0.1:9000".to_string()];
        let config = AppConfig::from_sources(lookup, &args);
        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));
    }

    #[test]
    fn prepare_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::with_data_dir(dir.path().join("data")).prepare().unwrap();

        assert!(config.data_dir.is_absolute());
        assert!(config.uploads_dir().is_dir());
        assert!(config.settings_dir().is_dir());
    }
}
