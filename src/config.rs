use std::path::PathBuf;
use std::{env, fs, io};

use anyhow::{Context, Result};
use log::warn;
use serde::de::DeserializeOwned;

use crate::dirs::{config_dir, data_dir, ensure_dir_exists};

/// Directories the server reads configuration from and writes data into.
pub struct PathSet {
    pub config_path: PathBuf,
    pub data_path: PathBuf,
    pub pki_path: PathBuf,
}

impl PathSet {
    pub fn new(config_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => match env::var("MEMBERD_CONFIG") {
                Ok(path) => PathBuf::from(path),
                Err(_) => config_dir()?,
            },
        };

        let data_path = match data_path {
            Some(path) => path,
            None => match env::var("MEMBERD_DATA") {
                Ok(path) => PathBuf::from(path),
                Err(_) => data_dir()?,
            },
        };

        // PKI path is always under config path
        let pki_path = config_path.join("pki");

        ensure_dir_exists(&config_path)
            .with_context(|| format!("ensure config directory: {}", config_path.display()))?;
        ensure_dir_exists(&data_path)
            .with_context(|| format!("ensure data directory: {}", data_path.display()))?;
        ensure_dir_exists(&pki_path)
            .with_context(|| format!("ensure pki directory: {}", pki_path.display()))?;

        Ok(Self {
            config_path,
            data_path,
            pki_path,
        })
    }

    /// Reads `{config_path}/{name}.toml`, falling back to `default_func` when the
    /// file does not exist, then completes and validates the result.
    pub fn load_config<T, F>(&self, name: &str, default_func: F) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let path = self.config_path.join(format!("{name}.toml"));
        let mut cfg: T = match fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s).context("parse config toml")?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Config file for {name} not found, using defaults");
                default_func()
            }
            Err(err) => {
                return Err(err).context(format!("read config file: {}", path.display()));
            }
        };

        cfg.complete(self).context("validate config")?;
        Ok(cfg)
    }
}

pub trait CommonConfig {
    fn default() -> Self;
    fn complete(&mut self, ps: &PathSet) -> Result<()>;
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expandenv() {
        env::set_var("MEMBERD_TEST_EXPAND", "/srv/memberd");
        let value = expandenv("path", "${MEMBERD_TEST_EXPAND}/server.db").unwrap();
        assert_eq!(value, "/srv/memberd/server.db");

        assert!(expandenv("path", "${MEMBERD_TEST_EXPAND_MISSING}").is_err());
    }
}
