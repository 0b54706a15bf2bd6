use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use dirs::home_dir;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::error::PpErr;
use crate::error::Result;
use crate::flags::PP_API_KEY;
use crate::flags::PP_DEFAULT_MODEL;

pub const CONFIG_FILENAME: &str = "config.json";

/// User configuration stored as JSON in `~/.config/pp/config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub api_key: String,
    /// Root of the Obsidian vault notes are written to.
    pub vault_path: PathBuf,
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl Config {
    /// The API key to use, letting `PP_API_KEY` win over the stored one.
    pub fn effective_api_key(&self) -> &str {
        (*PP_API_KEY).unwrap_or(&self.api_key)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(PpErr::InvalidConfig("API key is required".to_string()));
        }
        if self.vault_path.as_os_str().is_empty() {
            return Err(PpErr::InvalidConfig("vault path is required".to_string()));
        }
        Ok(())
    }
}

pub fn default_model() -> String {
    PP_DEFAULT_MODEL.to_string()
}

/// Returns `~/.config/pp`. Does not verify that the directory exists.
pub fn pp_config_dir() -> std::io::Result<PathBuf> {
    let mut p = home_dir().ok_or_else(|| {
        std::io::Error::new(ErrorKind::NotFound, "Could not find home directory")
    })?;
    p.push(".config");
    p.push("pp");
    Ok(p)
}

/// Reads and writes the configuration file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Use `config_dir` when given, `~/.config/pp` otherwise.
    pub fn new(config_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => pp_config_dir()?,
        };
        Ok(Self { config_dir })
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILENAME)
    }

    /// `Ok(None)` when no configuration has been written yet.
    pub fn read_config(&self) -> Result<Option<Config>> {
        let path = self.config_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let config: Config = serde_json::from_str(&contents)?;
        Ok(Some(config))
    }

    /// Like [`ConfigManager::read_config`] but a missing file is an error.
    pub fn load(&self) -> Result<Config> {
        self.read_config()?
            .ok_or_else(|| PpErr::MissingConfig(self.config_path()))
    }

    pub fn write_config(&self, config: &Config) -> Result<()> {
        config.validate()?;
        std::fs::create_dir_all(&self.config_dir)?;
        let serialized = serde_json::to_string_pretty(config)?;
        write_private(&self.config_path(), serialized.as_bytes())?;
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
