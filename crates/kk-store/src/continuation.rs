//! Opaque continue tokens for paginated lists.
//!
//! A token is the hex encoding of a small JSON document naming the token
//! version, the list revision it was issued at, and the last key (relative to
//! the listed directory) that was returned.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

const TOKEN_VERSION: &str = "meta.k8s.io/v1";

#[derive(Debug, Serialize, Deserialize)]
struct ContinueToken {
    v: String,
    rv: u64,
    start: String,
}

/// Encode a continue token resuming after `last_key`.
pub fn encode_continue(last_key: &str, revision: u64) -> StoreResult<String> {
    let token = ContinueToken {
        v: TOKEN_VERSION.to_string(),
        rv: revision,
        start: last_key.to_string(),
    };
    let json = serde_json::to_vec(&token)
        .map_err(|e| StoreError::InvalidArgument(format!("cannot encode continue token: {e}")))?;
    Ok(hex::encode(json))
}

/// Decode a continue token into `(last_key, revision)`.
pub fn decode_continue(token: &str) -> StoreResult<(String, u64)> {
    let invalid =
        |reason: String| StoreError::InvalidArgument(format!("invalid continue token: {reason}"));

    let bytes = hex::decode(token).map_err(|e| invalid(e.to_string()))?;
    let token: ContinueToken = serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;
    if token.v != TOKEN_VERSION {
        return Err(invalid(format!("unsupported version {:?}", token.v)));
    }
    if token.start.is_empty() {
        return Err(invalid("missing start key".into()));
    }
    if token.start.split('/').any(|c| c == "..") || token.start.starts_with('/') {
        return Err(invalid("start key escapes the listed directory".into()));
    }
    Ok((token.start, token.rv))
}
