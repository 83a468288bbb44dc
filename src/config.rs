use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "clinicore";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "info".to_string()
}

/// Database path (`CLINICORE_DB`, default `clinicore.db` in the
/// working directory).
pub fn database_path() -> PathBuf {
    std::env::var("CLINICORE_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("clinicore.db"))
}

/// Listen address (`CLINICORE_ADDR`, default `127.0.0.1:4000`).
pub fn listen_addr() -> SocketAddr {
    std::env::var("CLINICORE_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| "127.0.0.1:4000".parse().expect("default addr parses"))
}

/// Triage advisor base URL (`TRIAGE_SERVICE_URL`, default local
/// port 5001).
pub fn triage_service_url() -> String {
    std::env::var("TRIAGE_SERVICE_URL")
        .unwrap_or_else(|_| "http://localhost:5001".to_string())
}

/// Triage HTTP timeout in seconds (`TRIAGE_TIMEOUT_SECS`, default 10).
/// A slow advisor inflates booking latency bounded only by this value.
pub fn triage_timeout_secs() -> u64 {
    std::env::var("TRIAGE_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_name_is_clinicore() {
        assert_eq!(APP_NAME, "clinicore");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn default_db_path_is_relative() {
        if std::env::var("CLINICORE_DB").is_err() {
            assert_eq!(database_path(), PathBuf::from("clinicore.db"));
        }
    }

    #[test]
    fn default_triage_url_is_local_5001() {
        if std::env::var("TRIAGE_SERVICE_URL").is_err() {
            assert_eq!(triage_service_url(), "http://localhost:5001");
        }
    }

    #[test]
    fn default_timeout_is_ten_seconds() {
        if std::env::var("TRIAGE_TIMEOUT_SECS").is_err() {
            assert_eq!(triage_timeout_secs(), 10);
        }
    }
}
