//! Credential normalization.
//!
//! Upstream tokens may be configured as `Bearer sk-...`, `sk-...` or the raw
//! token. The upstream only accepts the raw token.

const BEARER_PREFIX: &str = "Bearer ";
const SK_PREFIX: &str = "sk-";

/// Strip a `Bearer ` prefix and then an `sk-` prefix.
///
/// The pair is stripped until neither matches, so the result is a fixed point:
/// `normalize_token(normalize_token(x)) == normalize_token(x)` for every input.
pub fn normalize_token(raw: &str) -> &str {
    let mut token = raw;
    loop {
        let stripped = token.strip_prefix(BEARER_PREFIX).unwrap_or(token);
        let stripped = stripped.strip_prefix(SK_PREFIX).unwrap_or(stripped);
        if stripped.len() == token.len() {
            return token;
        }
        token = stripped;
    }
}

/// Strip only the `Bearer ` scheme from a presented `Authorization` value.
pub fn strip_bearer(raw: &str) -> &str {
    raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw).trim()
}

/// Render the outbound `Authorization` header value for a normalized token.
pub fn bearer(token: &str) -> String {
    format!("{}{}", BEARER_PREFIX, token)
}
