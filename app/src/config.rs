use std::path::PathBuf;

use api_client::{DEFAULT_INTERFACE, DEFAULT_PACKAGE};
use serde::{Deserialize, Serialize};

const DEFAULT_REMOTE_HOST: &str = "http://localhost:8080";
/// Used when the timeout is unset or 0.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub log_level: String,
    pub remote_host: String,
    pub package_name: String,
    pub interface: String,
    pub request_timeout_secs: u64,
    pub data_path: PathBuf,
    pub use_keyring: bool,
}

#[derive(Default)]
pub struct AppConfigOverrides {
    pub log_level: Option<String>,
    pub remote_host: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub data_path: Option<PathBuf>,
    pub use_keyring: bool,
}

fn abelana_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".abelana")
}

pub fn default_config_path() -> PathBuf {
    abelana_dir().join("config.toml")
}

impl AppConfig {
    pub fn load_from(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(default_config_path);
        let cfg = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .build()
            .unwrap_or_default();

        let log_level = cfg
            .get_string("log_level")
            .unwrap_or_else(|_| "info".to_string());
        let remote_host = cfg
            .get_string("remote_host")
            .unwrap_or_else(|_| DEFAULT_REMOTE_HOST.to_string());
        let package_name = cfg
            .get_string("package_name")
            .unwrap_or_else(|_| DEFAULT_PACKAGE.to_string());
        let interface = cfg
            .get_string("interface")
            .unwrap_or_else(|_| DEFAULT_INTERFACE.to_string());
        let request_timeout_secs = cfg
            .get_int("request_timeout_secs")
            .ok()
            .and_then(|t| u64::try_from(t).ok())
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        let data_path = cfg
            .get_string("data_path")
            .map(PathBuf::from)
            .unwrap_or_else(|_| abelana_dir());
        let use_keyring = cfg.get_bool("use_keyring").unwrap_or(false);

        Self {
            log_level,
            remote_host,
            package_name,
            interface,
            request_timeout_secs,
            data_path,
            use_keyring,
        }
    }

    pub fn apply_overrides(mut self, ov: &AppConfigOverrides) -> Self {
        if let Some(l) = &ov.log_level {
            self.log_level = l.clone();
        }
        if let Some(h) = &ov.remote_host {
            self.remote_host = h.clone();
        }
        if let Some(t) = ov.request_timeout_secs.filter(|t| *t > 0) {
            self.request_timeout_secs = t;
        }
        if let Some(p) = &ov.data_path {
            self.data_path = p.clone();
        }
        if ov.use_keyring {
            self.use_keyring = true;
        }
        self
    }

    pub fn save_to(&self, path: Option<PathBuf>) -> std::io::Result<PathBuf> {
        let path = path.unwrap_or_else(default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(&path, data)?;
        Ok(path)
    }
}
