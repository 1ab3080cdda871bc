//! Salted, iterated SHA-256 password hashes.
//!
//! Stored form: `sha256$<iterations>$<salt-hex>$<digest-hex>`.

use rand::RngCore;
use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";
const DEFAULT_ITERATIONS: u32 = 20_000;
const SALT_LEN: usize = 16;

pub fn hash_password(plaintext: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    hash_with(plaintext, &salt, DEFAULT_ITERATIONS)
}

fn hash_with(plaintext: &str, salt: &[u8], iterations: u32) -> String {
    let digest = derive(plaintext, salt, iterations);
    format!(
        "{SCHEME}${iterations}${}${}",
        hex::encode(salt),
        hex::encode(digest)
    )
}

fn derive(plaintext: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut h = Sha256::new();
    h.update(salt);
    h.update(plaintext.as_bytes());
    let mut digest = h.finalize();
    for _ in 1..iterations {
        let mut h = Sha256::new();
        h.update(digest);
        h.update(salt);
        digest = h.finalize();
    }
    digest.to_vec()
}

/// Check a plaintext against a stored hash. Malformed hashes never verify.
pub fn verify_password(stored: &str, plaintext: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };
    ct_eq(&derive(plaintext, &salt, iterations), &expected)
}

fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
