//! Connection configuration for the QSEoW Repository and engine services.
//!
//! The configuration is assembled by the CLI from flags and `CTRLQ_*`
//! environment variables (flags win) and validated before any network I/O.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

/// Default engine (websocket) port for certificate access
pub const DEFAULT_ENGINE_PORT: u16 = 4747;

/// Default Repository (QRS) port for certificate access
pub const DEFAULT_QRS_PORT: u16 = 4242;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Credential material for both the REST and engine transports
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Mutual TLS with a client certificate triple
    Certificate {
        /// Client certificate (PEM)
        cert: PathBuf,
        /// Client certificate key (PEM)
        key: PathBuf,
        /// Root certificate of the Sense CA (PEM)
        root: PathBuf,
    },
    /// Bearer token (API key) through a virtual proxy
    Bearer(String),
}

/// Connection parameters shared by every command
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// QSEoW host name or IP
    pub host: String,
    /// Repository REST port
    pub qrs_port: u16,
    /// Engine websocket port
    pub engine_port: u16,
    /// Virtual proxy prefix, without surrounding slashes; empty for the
    /// default proxy
    pub virtual_proxy: String,
    /// Verify the server certificate; `false` disables verification only,
    /// the transports always speak TLS
    pub secure: bool,
    /// Engine API schema version to negotiate
    pub schema_version: String,
    /// Credential material
    pub credentials: Credentials,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ConnectionConfig {
    /// Check the configuration before any network I/O: host present and
    /// certificate files readable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if let Credentials::Certificate { cert, key, root } = &self.credentials {
            for path in [cert, key, root] {
                fs::metadata(path).map_err(|source| ConfigError::CertificateUnreadable {
                    path: path.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Whether the transports skip server certificate verification. The
    /// QSEoW services speak TLS only, so `secure` gates verification,
    /// never the scheme.
    pub fn danger_accept_invalid_certs(&self) -> bool {
        !self.secure
    }

    /// Base URL of the Repository service, virtual proxy included
    pub fn qrs_base_url(&self) -> String {
        let mut url = format!("https://{}:{}", self.host, self.qrs_port);
        if !self.virtual_proxy.is_empty() {
            url.push('/');
            url.push_str(&self.virtual_proxy);
        }
        url
    }

    /// Websocket URL of the engine's global context
    pub fn engine_url(&self) -> String {
        let mut url = format!("wss://{}:{}", self.host, self.engine_port);
        if !self.virtual_proxy.is_empty() {
            url.push('/');
            url.push_str(&self.virtual_proxy);
        }
        url.push_str("/app/engineData");
        url
    }
}

/// Normalize a user-supplied virtual proxy prefix: strip surrounding slashes
/// and whitespace.
pub fn normalize_virtual_proxy(prefix: &str) -> String {
    prefix.trim().trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(secure: bool, proxy: &str) -> ConnectionConfig {
        ConnectionConfig {
            host: "sense.example.com".to_string(),
            qrs_port: DEFAULT_QRS_PORT,
            engine_port: DEFAULT_ENGINE_PORT,
            virtual_proxy: normalize_virtual_proxy(proxy),
            secure,
            schema_version: "12.612.0".to_string(),
            credentials: Credentials::Bearer("token".to_string()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[test]
    fn test_qrs_base_url_default_proxy() {
        let cfg = test_config(true, "");
        assert_eq!(cfg.qrs_base_url(), "https://sense.example.com:4242");
    }

    #[test]
    fn test_qrs_base_url_with_proxy() {
        let cfg = test_config(true, "/jwt/");
        assert_eq!(cfg.qrs_base_url(), "https://sense.example.com:4242/jwt");
    }

    #[test]
    fn test_engine_url() {
        let cfg = test_config(true, "");
        assert_eq!(
            cfg.engine_url(),
            "wss://sense.example.com:4747/app/engineData"
        );
    }

    #[test]
    fn test_secure_false_keeps_tls_and_only_skips_verification() {
        let cfg = test_config(false, "");
        assert!(cfg.danger_accept_invalid_certs());
        assert_eq!(cfg.qrs_base_url(), "https://sense.example.com:4242");
        assert_eq!(
            cfg.engine_url(),
            "wss://sense.example.com:4747/app/engineData"
        );

        let cfg = test_config(true, "");
        assert!(!cfg.danger_accept_invalid_certs());
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let mut cfg = test_config(true, "");
        cfg.host = "  ".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingHost)));
    }

    #[test]
    fn test_validate_rejects_unreadable_certificate() {
        let mut cfg = test_config(true, "");
        cfg.credentials = Credentials::Certificate {
            cert: PathBuf::from("/nonexistent/client.pem"),
            key: PathBuf::from("/nonexistent/client_key.pem"),
            root: PathBuf::from("/nonexistent/root.pem"),
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::CertificateUnreadable { .. })
        ));
    }
}
