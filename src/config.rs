use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub page_size: u32,
    pub collection_ttl_secs: i64,
    pub request_timeout_secs: u64,
    pub session_file: PathBuf,
    pub otel_exporter_endpoint: Option<String>,
    pub service_name: String,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("TEAMFLOW_API_URL")
            .unwrap_or_else(|| "http://localhost:8080/api".to_string());
        let api_base_url = api_base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&api_base_url)
            .map_err(|_| ConfigError::InvalidApiUrl(api_base_url.clone()))?;

        let page_size: u32 = lookup("TEAMFLOW_PAGE_SIZE")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPageSize)?;
        if page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }

        let collection_ttl_secs: i64 = lookup("TEAMFLOW_COLLECTION_TTL_SECS")
            .unwrap_or_else(|| "300".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidTtl)?;
        if collection_ttl_secs < 0 {
            return Err(ConfigError::InvalidTtl);
        }

        let request_timeout_secs = lookup("TEAMFLOW_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .unwrap_or(30);

        let session_file = lookup("TEAMFLOW_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".teamflow/session.json"));

        let otel_exporter_endpoint = lookup("OTEL_EXPORTER_OTLP_ENDPOINT");

        let service_name = lookup("SERVICE_NAME").unwrap_or_else(|| "teamflow".to_string());

        let metrics_port = match lookup("METRICS_PORT") {
            Some(port) => Some(port.parse().map_err(|_| ConfigError::InvalidMetricsPort)?),
            None => None,
        };

        Ok(Config {
            api_base_url,
            page_size,
            collection_ttl_secs,
            request_timeout_secs,
            session_file,
            otel_exporter_endpoint,
            service_name,
            metrics_port,
        })
    }

    pub fn collection_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.collection_ttl_secs)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TEAMFLOW_API_URL is not a valid URL: {0}")]
    InvalidApiUrl(String),

    #[error("TEAMFLOW_PAGE_SIZE must be a positive integer")]
    InvalidPageSize,

    #[error("TEAMFLOW_COLLECTION_TTL_SECS must be a non-negative integer")]
    InvalidTtl,

    #[error("Invalid metrics port")]
    InvalidMetricsPort,
}
