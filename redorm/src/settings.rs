use crate::error::AppError;
use crate::logger::{self, LogLevel};
use crate::manager::RecordManager;
use crate::schema::ModelSchema;
use crate::storage::RedbStore;
use crate::{debug, info};
use config::{Config, Environment, File};
use dotenv::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Once;

pub const DEFAULT_ENV_PREFIX: &str = "REDORM";
pub const DEFAULT_ROOT_DIR: &str = "redorm";
pub const DEFAULT_EXTENSION: &str = "redb";

static DOTENV_ONCE: Once = Once::new();

fn ensure_dotenv_loaded() {
    DOTENV_ONCE.call_once(|| match dotenv() {
        Ok(_) => info!("Settings loaded including .env file."),
        Err(_) => debug!("Settings loaded without .env file."),
    });
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub storage: StorageSettings,
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Where table files live: `<root_dir>/<table_name>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageSettings {
    pub root_dir: PathBuf,
    pub extension: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings { root_dir: PathBuf::from(DEFAULT_ROOT_DIR), extension: DEFAULT_EXTENSION.to_string() }
    }
}

impl Settings {
    /// Defaults, then the optional file, then `<prefix>__SECTION__KEY` environment variables.
    pub fn load(path: Option<&str>, prefix: &str) -> Result<Settings, AppError> {
        ensure_dotenv_loaded();

        let mut builder = Config::builder()
            .set_default("storage.root_dir", DEFAULT_ROOT_DIR)?
            .set_default("storage.extension", DEFAULT_EXTENSION)?
            .set_default("log_level", "info")?;
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }
        builder = builder.add_source(Environment::with_prefix(prefix).prefix_separator("__").try_parsing(true).separator("__"));

        let settings = builder.build()?.try_deserialize::<Settings>()?;
        logger::set_level(settings.log_level);
        debug!("{:#?}", settings);
        Ok(settings)
    }

    /// `REDORM__SECTION__KEY` variables over the defaults.
    pub fn from_env() -> Result<Settings, AppError> {
        Settings::load(None, DEFAULT_ENV_PREFIX)
    }
}

impl StorageSettings {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        StorageSettings { root_dir: root_dir.into(), ..StorageSettings::default() }
    }

    /// A fresh directory under the system temp dir, for tests and throwaway stores.
    pub fn temp(name: &str) -> Self {
        StorageSettings::new(env::temp_dir().join("redorm").join(format!("{}_{}", name, rand::random::<u64>())))
    }

    pub fn db_path(&self, table_name: &str) -> PathBuf {
        self.root_dir.join(format!("{}.{}", table_name, self.extension))
    }

    pub fn store_for(&self, table_name: &str) -> Result<RedbStore, AppError> {
        fs::create_dir_all(&self.root_dir)?;
        Ok(RedbStore::new(self.db_path(table_name)))
    }

    pub fn bind(&self, schema: ModelSchema) -> Result<RecordManager, AppError> {
        let store = self.store_for(schema.table_name())?;
        RecordManager::bind(schema, store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_sources() {
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.storage, StorageSettings::default());
        assert_eq!(settings.log_level, LogLevel::Info);
        assert_eq!(settings.storage.db_path("users"), PathBuf::from("redorm/users.redb"));
    }

    #[test]
    fn file_then_environment_override_defaults() {
        let dir = env::temp_dir().join("redorm").join(format!("settings_{}", rand::random::<u64>()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "log_level = \"info\"\n[storage]\nroot_dir = \"/tmp/from_file\"\nextension = \"db\"").unwrap();

        let settings = Settings::load(path.to_str(), "REDORM_FILE_TEST").unwrap();
        assert_eq!(settings.storage.root_dir, PathBuf::from("/tmp/from_file"));
        assert_eq!(settings.storage.extension, "db");

        env::set_var("REDORM_ENV_TEST__STORAGE__EXTENSION", "kv");
        let settings = Settings::load(path.to_str(), "REDORM_ENV_TEST").unwrap();
        assert_eq!(settings.storage.extension, "kv");
        assert_eq!(settings.storage.root_dir, PathBuf::from("/tmp/from_file"));
        env::remove_var("REDORM_ENV_TEST__STORAGE__EXTENSION");
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = Settings::load(Some("/nonexistent/redorm_settings.toml"), "REDORM_MISSING_TEST").unwrap_err();
        assert!(matches!(err, AppError::Config(_)), "{err}");
    }

    #[test]
    fn db_path_joins_table_and_extension() {
        let storage = StorageSettings::new("/data");
        assert_eq!(storage.db_path("accounts"), PathBuf::from("/data/accounts.redb"));
    }
}
