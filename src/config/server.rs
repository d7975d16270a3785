use std::net::SocketAddr;
use std::path::PathBuf;

/// Cache behavior for an HTTP endpoint, applied as a `Cache-Control` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Disabled,
    Ttl(u64),
}

impl CachePolicy {
    #[must_use]
    pub fn header_value(&self) -> String {
        match self {
            Self::Disabled => "no-store".to_string(),
            Self::Ttl(secs) => format!("public, max-age={secs}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Site/tenant label stamped on repository rows.
    pub site: String,
    /// Public base URL for external access (e.g., "https://podium.example.com").
    /// Registered webhooks point here. If not set, derived from host and port.
    pub public_base_url: Option<String>,
    /// Renderer executable invoked as `renderer <source-file> <output-dir>`.
    pub renderer: PathBuf,
    /// GitHub REST API base URL. Overridable so tests can point elsewhere.
    pub github_api_url: String,
    /// Cache policy for the download endpoint; API endpoints are never cached.
    pub download_cache: CachePolicy,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("podium.db")
    }

    /// Root directory rendered presentations are staged into and served from.
    #[must_use]
    pub fn public_root(&self) -> PathBuf {
        self.data_dir.join("public")
    }

    /// Base URL this instance is reachable at, used for webhook registration
    /// and presentation links.
    #[must_use]
    pub fn external_url(&self) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            site: "localhost".to_string(),
            public_base_url: None,
            renderer: PathBuf::from("hovercraft"),
            github_api_url: "https://api.github.com".to_string(),
            download_cache: CachePolicy::Ttl(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_url_falls_back_to_bind_address() {
        let config = ServerConfig::default();
        assert_eq!(config.external_url(), "http://127.0.0.1:8080");

        let config = ServerConfig {
            public_base_url: Some("https://podium.example.com".to_string()),
            ..ServerConfig::default()
        };
        assert_eq!(config.external_url(), "https://podium.example.com");
    }

    #[test]
    fn test_cache_policy_header() {
        assert_eq!(CachePolicy::Disabled.header_value(), "no-store");
        assert_eq!(CachePolicy::Ttl(60).header_value(), "public, max-age=60");
    }
}
