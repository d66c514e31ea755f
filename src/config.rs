use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE_NAME: &str = ".gatorconfig.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not resolve the home directory (HOME is not set)")]
    HomeDir,
    #[error("failed to read config file '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{}'", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write config file '{}'", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub db_url: String,
    /// Empty when nobody is logged in
    #[serde(default)]
    pub current_user_name: String,
}

impl Config {
    /// `~/.gatorconfig.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::HomeDir)?;
        Ok(PathBuf::from(home).join(CONFIG_FILE_NAME))
    }

    pub fn read() -> Result<Self, ConfigError> {
        Self::read_from(Self::default_path()?)
    }

    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse::<Self>().map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn current_user(&self) -> Option<&str> {
        Some(self.current_user_name.as_str()).filter(|name| !name.is_empty())
    }

    pub fn set_user<P: AsRef<Path>>(&mut self, name: &str, path: P) -> Result<(), ConfigError> {
        self.current_user_name = name.to_string();
        self.write_to(path)
    }

    /// Writes to a sibling temp file and renames it over `path`, so readers
    /// never observe a half-written config.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let temp_path = path.with_extension("json.tmp");
        let result = (|| {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
            drop(file);
            std::fs::rename(&temp_path, path)
        })();

        if let Err(e) = result {
            let _ = std::fs::remove_file(&temp_path);
            return Err(write_err(e));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = serde_json::Error;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(content)
    }
}
