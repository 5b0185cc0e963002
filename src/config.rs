use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

use crate::error::{Error, PlaygroundResult};

/// Settings of the playground client
/// Supported sources(in order of precedence):
/// - CLI arguments(by clap)
/// - Environment variables(by clap)
/// - Dot-env file(by clap and dotenv)
/// - Settings file
///   - Support Store and Load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the evaluation service
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Upper bound for one evaluation round trip
    #[serde(default = "default_request_timeout", with = "duration_ms")]
    pub request_timeout: Duration,

    /// Forwarded verbatim with every evaluation
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Page that share links point to when no page URL is known
    #[serde(default = "default_share_base_url")]
    pub share_base_url: String,

    // for internal use
    #[serde(skip)]
    settings_dir: Option<String>,
}

fn default_api_url() -> String {
    "https://feel.upgradingdave.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_millis(10_000)
}

fn default_share_base_url() -> String {
    "https://camunda.github.io/feel-scala/docs/playground/".to_string()
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout: default_request_timeout(),
            metadata: Map::new(),
            share_base_url: default_share_base_url(),
            settings_dir: None,
        }
    }
}

impl Settings {
    pub fn new(settings_dir: String) -> Self {
        Self {
            settings_dir: Some(settings_dir),
            ..Default::default()
        }
    }

    /// Platform config directory, when a home directory is known.
    pub fn default_dir() -> Option<String> {
        ProjectDirs::from("org", "feel", "feel-playground")
            .and_then(|dirs| dirs.config_dir().to_str().map(str::to_string))
    }

    /// Layers explicit overrides on top of the stored settings.
    pub fn initialize(
        settings_dir: Option<String>,
        url: Option<String>,
        timeout_ms: Option<u64>,
    ) -> Self {
        let mut settings = match settings_dir {
            Some(dir) => {
                let mut settings = Settings::new(dir);
                if let Err(e) = settings.load() {
                    debug!("No stored settings used: {}", e);
                }
                settings
            }
            None => Settings::default(),
        };

        if let Some(url) = url {
            if !url.is_empty() {
                settings.api_url = url;
            }
        }

        if let Some(timeout_ms) = timeout_ms {
            if timeout_ms > 0 {
                settings.request_timeout = Duration::from_millis(timeout_ms);
            }
        }
        settings
    }

    /// Get the settings file path in the user's config directory
    pub fn file_path(&self) -> PlaygroundResult<PathBuf> {
        let dir = match self.settings_dir.clone() {
            Some(dir) => dir,
            None => Self::default_dir()
                .ok_or_else(|| Error::Config("No home directory found".to_string()))?,
        };
        Ok(Path::new(&dir).join("settings.json"))
    }

    pub fn load(&mut self) -> PlaygroundResult<Settings> {
        let file_path = self.file_path()?;
        if file_path.exists() {
            let mut file = File::open(&file_path)?;
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            let stored: Self = serde_json::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse settings file: {}", e)))?;
            debug!("Settings loaded from {:?}", file_path);
            self.api_url = stored.api_url;
            self.request_timeout = stored.request_timeout;
            self.metadata = stored.metadata;
            self.share_base_url = stored.share_base_url;
        }

        Ok(self.clone())
    }

    pub fn save(&self) -> PlaygroundResult<PathBuf> {
        let file_path = self.file_path()?;
        if let Some(parent) = file_path.parent() {
            // Create the settings directory if it doesn't exist
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("Failed to create settings directory: {}", e))
                })?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;

        let mut file = File::create(&file_path)?;
        file.write_all(json.as_bytes())?;

        Ok(file_path)
    }
}
