//! Static login credentials

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// The single username/key pair allowed to log in
///
/// Only SHA-256 digests are kept so comparisons run in constant time
/// regardless of input length.
#[derive(Clone)]
pub struct Credentials {
    username_hash: [u8; 32],
    key_hash: [u8; 32],
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

impl Credentials {
    pub fn new(username: &str, key: &str) -> Self {
        Self {
            username_hash: digest(username),
            key_hash: digest(key),
        }
    }

    pub fn verify(&self, username: &str, key: &str) -> bool {
        let username_match = digest(username)[..].ct_eq(&self.username_hash[..]);
        let key_match = digest(key)[..].ct_eq(&self.key_hash[..]);
        (username_match & key_match).into()
    }

    /// Check an `Authorization: Basic ...` header value
    pub fn verify_basic(&self, header: &str) -> bool {
        match parse_basic(header) {
            Some((username, key)) => self.verify(&username, &key),
            None => false,
        }
    }
}

/// Split a Basic auth header into `(username, password)`
pub fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (username, password) = credentials.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
