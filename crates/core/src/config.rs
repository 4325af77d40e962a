use reqwest::Url;
use thiserror::Error;

pub const BACKEND_URL_ENV: &str = "TUBETALK_BACKEND_URL";
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid backend URL {url:?}: {reason}")]
    InvalidBackendUrl { url: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: Url,
}

impl Config {
    /// Build from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let raw = std::env::var(BACKEND_URL_ENV).unwrap_or_else(|_| DEFAULT_BACKEND_URL.into());
        Self::with_backend_url(&raw)
    }

    /// An explicit backend URL wins over the environment.
    pub fn resolve(backend_url: Option<&str>) -> crate::Result<Self> {
        let config = match backend_url {
            Some(url) => Self::with_backend_url(url)?,
            None => Self::from_env()?,
        };
        Ok(config)
    }

    pub fn with_backend_url(raw: &str) -> Result<Self, ConfigError> {
        let mut backend_url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidBackendUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if backend_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidBackendUrl {
                url: raw.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        // Endpoints are joined relative to the base, which needs a trailing slash.
        if !backend_url.path().ends_with('/') {
            let path = format!("{}/", backend_url.path());
            backend_url.set_path(&path);
        }

        Ok(Self { backend_url })
    }

    pub fn endpoint(&self, name: &str) -> Url {
        let mut url = self.backend_url.clone();
        let path = format!("{}{}", url.path(), name);
        url.set_path(&path);
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TubetalkError;

    #[test]
    fn default_points_at_local_backend() {
        let config = Config::with_backend_url(DEFAULT_BACKEND_URL).unwrap();
        assert_eq!(
            config.endpoint("load_video").as_str(),
            "http://127.0.0.1:8000/load_video"
        );
    }

    #[test]
    fn endpoints_join_under_base_path() {
        let config = Config::with_backend_url("https://api.example.com/assistant").unwrap();
        assert_eq!(
            config.endpoint("chat").as_str(),
            "https://api.example.com/assistant/chat"
        );

        let config = Config::with_backend_url("https://api.example.com/assistant/").unwrap();
        assert_eq!(
            config.endpoint("chat").as_str(),
            "https://api.example.com/assistant/chat"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Config::with_backend_url("not a url"),
            Err(ConfigError::InvalidBackendUrl { .. })
        ));
        assert!(Config::with_backend_url("mailto:someone@example.com").is_err());
    }

    #[test]
    fn resolve_prefers_explicit_url() {
        let config = Config::resolve(Some("http://10.0.0.2:9000")).unwrap();
        assert_eq!(
            config.endpoint("chat").as_str(),
            "http://10.0.0.2:9000/chat"
        );

        let err = Config::resolve(Some("not a url")).unwrap_err();
        assert!(matches!(
            err,
            TubetalkError::Config(ConfigError::InvalidBackendUrl { .. })
        ));
    }
}
