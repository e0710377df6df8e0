use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;
const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize, Default)]
struct ClientConfigFile {
    api: Option<ApiConfigFile>,
    timeouts: Option<TimeoutConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TimeoutConfigFile {
    connect_secs: Option<u64>,
    read_secs: Option<u64>,
    write_secs: Option<u64>,
}

/// Fixed configuration of one [`crate::DetectionClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    /// Bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Bound on each socket read while waiting for and receiving the response.
    pub read_timeout: Duration,
    /// Bound on each socket write while sending the request body.
    pub write_timeout: Duration,
}

impl ClientConfig {
    /// Loads `DETECT_CONFIG` (JSON) if set, then applies `DETECT_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DETECT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Default timeouts against the service at `base_url`.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let mut cfg = Self::from_file(ClientConfigFile::default())?;
        cfg.set_base_url(base_url)?;
        Ok(cfg)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn set_base_url(&mut self, base_url: &str) -> Result<()> {
        self.base_url = parse_base_url(base_url)?;
        Ok(())
    }

    /// Absolute URL of `path` (which starts with `/`) under the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn from_file(file: ClientConfigFile) -> Result<Self> {
        let base_url = parse_base_url(
            file.api
                .and_then(|api| api.url)
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL),
        )?;
        let timeouts = file.timeouts.unwrap_or_default();
        Ok(Self {
            base_url,
            connect_timeout: Duration::from_secs(
                timeouts.connect_secs.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            read_timeout: Duration::from_secs(
                timeouts.read_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
            ),
            write_timeout: Duration::from_secs(
                timeouts.write_secs.unwrap_or(DEFAULT_WRITE_TIMEOUT_SECS),
            ),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("DETECT_API_URL") {
            if !url.trim().is_empty() {
                self.set_base_url(url.trim())?;
            }
        }
        if let Some(timeout) = env_secs("DETECT_CONNECT_TIMEOUT_SECS")? {
            self.connect_timeout = timeout;
        }
        if let Some(timeout) = env_secs("DETECT_READ_TIMEOUT_SECS")? {
            self.read_timeout = timeout;
        }
        if let Some(timeout) = env_secs("DETECT_WRITE_TIMEOUT_SECS")? {
            self.write_timeout = timeout;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (name, timeout) in [
            ("connect", self.connect_timeout),
            ("read", self.read_timeout),
            ("write", self.write_timeout),
        ] {
            if timeout.is_zero() {
                return Err(anyhow!("{} timeout must be greater than zero", name));
            }
        }
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| anyhow!("invalid service url '{}': {}", raw, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!(
            "service url '{}' must use http or https, not '{}'",
            raw,
            url.scheme()
        ));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(anyhow!(
            "service url '{}' must not carry a query or fragment",
            raw
        ));
    }
    Ok(url)
}

fn env_secs(key: &str) -> Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            let seconds: u64 = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("{} must be an integer number of seconds", key))?;
            Ok(Some(Duration::from_secs(seconds)))
        }
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<ClientConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
