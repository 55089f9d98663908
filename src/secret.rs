//! Secret generation.
//!
//! Synthesis never touches a random source directly; it goes through a
//! [`SecretGenerator`] so builds can be made deterministic in tests.

use crate::schema::GenerateKind;
use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";
const HEX: &[u8] = b"0123456789abcdef";

/// bcrypt work factor for basic-auth entries.
pub const HTPASSWD_COST: u32 = 10;

/// Shortest password that can hold one character of every class.
pub const MIN_COMPLEX_LENGTH: usize = 4;

pub trait SecretGenerator: Send + Sync {
    /// A random string of `length` characters. With `complexity`, the result
    /// contains at least one uppercase, lowercase, digit and special character;
    /// otherwise it is alphanumeric.
    fn generate(&self, length: usize, complexity: bool) -> String;

    /// `length` lowercase hex characters.
    fn generate_hex(&self, length: usize) -> String;

    fn generate_kind(&self, kind: GenerateKind, length: usize) -> String {
        match kind {
            GenerateKind::Password => self.generate(length, true),
            GenerateKind::Token => self.generate(length, false),
            GenerateKind::Hex => self.generate_hex(length),
        }
    }
}

/// CSPRNG-backed generator (ChaCha via `thread_rng`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSecretGenerator;

impl SecretGenerator for RandomSecretGenerator {
    fn generate(&self, length: usize, complexity: bool) -> String {
        generate_password(length, complexity)
    }

    fn generate_hex(&self, length: usize) -> String {
        pick(HEX, length)
    }
}

fn pick(charset: &[u8], count: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let idx = rng.gen_range(0..charset.len());
            charset[idx] as char
        })
        .collect()
}

pub fn generate_password(length: usize, complexity: bool) -> String {
    if !complexity {
        let alphanumeric: Vec<u8> = [UPPER, LOWER, DIGITS].concat();
        return pick(&alphanumeric, length);
    }

    let length = length.max(MIN_COMPLEX_LENGTH);
    let full: Vec<u8> = [UPPER, LOWER, DIGITS, SPECIAL].concat();
    let mut rng = rand::thread_rng();

    let mut chars: Vec<u8> = [UPPER, LOWER, DIGITS, SPECIAL]
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    chars.extend((chars.len()..length).map(|_| full[rng.gen_range(0..full.len())]));
    chars.shuffle(&mut rng);

    chars.into_iter().map(char::from).collect()
}

/// Basic-auth entry `user:$2y$...` in the bcrypt form accepted by
/// `htpasswd` and Traefik. The 16-byte salt comes from `generator`.
pub fn htpasswd_entry(generator: &dyn SecretGenerator, user: &str, password: &str) -> Result<String> {
    let salt: [u8; 16] = hex::decode(generator.generate_hex(32))
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| Error::Secret("salt must be 32 hex characters".to_string()))?;
    let hash = bcrypt::hash_with_salt(password, HTPASSWD_COST, salt)
        .map_err(|e| Error::Secret(format!("bcrypt failed: {}", e)))?;
    Ok(format!("{}:{}", user, hash.format_for_version(bcrypt::Version::TwoY)))
}
