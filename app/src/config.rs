use std::path::{Path, PathBuf};

use api_client::ApiConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secrets_path: Option<PathBuf>,
    pub oauth_redirect_port: u16,
    pub media_items_page_size: u32,
    pub albums_page_size: u32,
    pub data_dir: PathBuf,
}

#[derive(Debug, Default)]
pub struct AppConfigOverrides {
    pub log_level: Option<String>,
    pub client_secrets_path: Option<PathBuf>,
    pub oauth_redirect_port: Option<u16>,
}

/// `<os data dir>/gphotos-viewer`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(auth::APP_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    default_data_dir().join(CONFIG_FILE_NAME)
}

impl Default for AppConfig {
    fn default() -> Self {
        let api = ApiConfig::default();
        Self {
            log_level: "info".to_string(),
            client_secrets_path: None,
            oauth_redirect_port: 0,
            media_items_page_size: api.media_items_page_size,
            albums_page_size: api.albums_page_size,
            data_dir: default_data_dir(),
        }
    }
}

impl AppConfig {
    /// Read the config file. Missing or malformed keys fall back to defaults.
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

        let defaults = Self::default();
        let log_level = cfg.get_string("log_level").unwrap_or(defaults.log_level);
        let client_secrets_path = cfg.get_string("client_secrets_path").ok().map(PathBuf::from);
        let oauth_redirect_port = cfg
            .get_int("oauth_redirect_port")
            .ok()
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(defaults.oauth_redirect_port);
        let media_items_page_size = cfg
            .get_int("media_items_page_size")
            .ok()
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(defaults.media_items_page_size);
        let albums_page_size = cfg
            .get_int("albums_page_size")
            .ok()
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(defaults.albums_page_size);
        let data_dir = cfg
            .get_string("data_dir")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        Self {
            log_level,
            client_secrets_path,
            oauth_redirect_port,
            media_items_page_size,
            albums_page_size,
            data_dir,
        }
    }

    pub fn apply_overrides(mut self, ov: &AppConfigOverrides) -> Self {
        if let Some(l) = &ov.log_level {
            self.log_level = l.clone();
        }
        if let Some(p) = &ov.client_secrets_path {
            self.client_secrets_path = Some(p.clone());
        }
        if let Some(p) = ov.oauth_redirect_port {
            self.oauth_redirect_port = p;
        }
        self
    }

    pub fn save_to(&self, path: Option<PathBuf>) -> std::io::Result<()> {
        let path = path.unwrap_or_else(default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, data)
    }

    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join(auth::TOKEN_FILE_NAME)
    }

    pub fn log_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Page sizes are clamped to the API maxima by the client.
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            media_items_page_size: self.media_items_page_size,
            albums_page_size: self.albums_page_size,
            shared_albums_page_size: self.albums_page_size,
            ..ApiConfig::default()
        }
    }
}
