//! Opaque session tokens stored in the key-value store.

use crate::chat::user::Session;
use crate::db::kv::KeyValueStore;
use crate::error::ApiError;

/// Session token TTL in seconds (24 hours).
pub const SESSION_TTL_SECS: u64 = 24 * 3600;

/// Generate an opaque random token with the given prefix.
pub fn generate_opaque_token(prefix: &str, bytes: usize) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use rand::Rng;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(&buf))
}

pub fn generate_session_token() -> String {
    generate_opaque_token("cst", 32)
}

fn session_key(token: &str) -> String {
    format!("chat:session:{}", token)
}

pub async fn store_session(
    kv: &dyn KeyValueStore,
    token: &str,
    session: &Session,
) -> Result<(), ApiError> {
    let value = serde_json::to_string(session)?;
    kv.set_ex(&session_key(token), &value, SESSION_TTL_SECS).await
}

pub async fn lookup_session(
    kv: &dyn KeyValueStore,
    token: &str,
) -> Result<Option<Session>, ApiError> {
    match kv.get(&session_key(token)).await? {
        Some(v) => {
            let session: Session =
                serde_json::from_str(&v).map_err(|_| ApiError::internal("corrupt session data"))?;
            Ok(Some(session))
        }
        None => Ok(None),
    }
}

pub async fn revoke_session(kv: &dyn KeyValueStore, token: &str) -> Result<(), ApiError> {
    kv.del(&session_key(token)).await
}
