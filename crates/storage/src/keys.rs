//! Opaque project API keys.
//!
//! Format: `argus_` + lowercase hex of 16 random bytes, 38 characters
//! total. Bytes come from the OS entropy source; a failing source is an
//! error for the containing operation, never a panic.

use std::fmt::Write;

use argus_core::StoreError;
use rand::TryRngCore;
use rand::rngs::OsRng;

pub const API_KEY_PREFIX: &str = "argus_";

const KEY_BYTES: usize = 16;

pub fn generate_api_key() -> Result<String, StoreError> {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| StoreError::Entropy(e.to_string()))?;

    let mut key = String::with_capacity(API_KEY_PREFIX.len() + KEY_BYTES * 2);
    key.push_str(API_KEY_PREFIX);
    for b in bytes {
        write!(key, "{b:02x}").expect("writing to a String cannot fail");
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_has_prefix_and_length() {
        let key = generate_api_key().unwrap();
        assert!(key.starts_with(API_KEY_PREFIX));
        assert_eq!(key.len(), 38);
        assert!(
            key[API_KEY_PREFIX.len()..]
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        );
    }

    #[test]
    fn consecutive_keys_differ() {
        let a = generate_api_key().unwrap();
        let b = generate_api_key().unwrap();
        let c = generate_api_key().unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }
}
