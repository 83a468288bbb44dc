//! Shared types for the API layer.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::db::open_database;
use crate::triage::TriageAdvisor;

/// Shared context for all routes and middleware. Each request opens
/// its own SQLite connection; WAL mode plus a busy timeout make
/// concurrent writers safe.
#[derive(Clone)]
pub struct ApiContext {
    pub db_path: Arc<PathBuf>,
    pub triage: Arc<dyn TriageAdvisor>,
}

impl ApiContext {
    pub fn new(db_path: PathBuf, triage: Arc<dyn TriageAdvisor>) -> Self {
        Self {
            db_path: Arc::new(db_path),
            triage,
        }
    }

    /// Open a fresh connection for the current request.
    pub fn open_db(&self) -> Result<Connection, ApiError> {
        open_database(&self.db_path).map_err(ApiError::from)
    }
}

/// Hash a bearer token with SHA-256, hex-encoded for storage in the
/// `users.token_hash` column.
pub fn hash_token_hex(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of
/// entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
