//! Shared helpers: identifier generation, user id normalization, secret obfuscation.

use axum::http::HeaderMap;
use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};
use unicode_normalization::UnicodeNormalization;

pub const ORGANIZATION_ID_PREFIX: &str = "org-";
pub const PROJECT_ID_PREFIX: &str = "proj-";
pub const API_KEY_ID_PREFIX: &str = "key_";
pub const SECRET_PREFIX: &str = "sk-";

const RESOURCE_ID_LEN: usize = 22;
const API_KEY_ID_LEN: usize = 16;
const SECRET_LEN: usize = 48;

/// Prefix + `len` alphanumeric characters drawn from the OS CSPRNG.
pub fn generate_id(prefix: &str, len: usize) -> String {
    let suffix: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

pub fn generate_organization_id() -> String {
    generate_id(ORGANIZATION_ID_PREFIX, RESOURCE_ID_LEN)
}

pub fn generate_project_id() -> String {
    generate_id(PROJECT_ID_PREFIX, RESOURCE_ID_LEN)
}

pub fn generate_api_key_id() -> String {
    generate_id(API_KEY_ID_PREFIX, API_KEY_ID_LEN)
}

pub fn generate_secret() -> String {
    generate_id(SECRET_PREFIX, SECRET_LEN)
}

/// User ids are case-insensitive (typically e-mail addresses).
pub fn normalize_user_id(user_id: &str) -> String {
    user_id.trim().nfkc().collect::<String>().to_lowercase()
}

pub fn service_account_user_id(name: &str) -> String {
    format!("system:serviceaccount:{}", name)
}

/// First 5 characters, up to 5 stars, last 2 characters.
///
/// `sk-1234567890abcdef` becomes `sk-12*****ef`. Prefix and suffix never
/// overlap, so secrets of 7 characters or fewer get no stars and come back
/// in full. Generated secrets are always 51 characters.
pub fn obfuscate_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let len = chars.len();
    let prefix_len = len.min(5);
    let suffix_start = len.saturating_sub(2).max(prefix_len);
    let stars = len.saturating_sub(7).min(5);

    let mut out: String = chars[..prefix_len].iter().collect();
    out.push_str(&"*".repeat(stars));
    out.extend(&chars[suffix_start..]);
    out
}

/// Kubernetes namespace names are RFC 1123 labels.
pub fn is_valid_namespace(namespace: &str) -> bool {
    let bytes = namespace.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    let allowed = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-';
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    bytes.iter().all(allowed) && alnum(&bytes[0]) && alnum(&bytes[bytes.len() - 1])
}

/// Read a non-empty, trimmed header value.
pub fn extract_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}
