use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::TryRngCore;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};

// Provably-fair construction:
// server_seed (secret) + client_seed + nonce -> HMAC-SHA256 -> 32-bit words
// The stream is extended by hashing the previous buffer when it runs dry.

pub type HmacSha256 = Hmac<Sha256>;

pub fn derive_hash_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Source of uniformly distributed 32-bit words for the reel engine.
///
/// Implementations must fail rather than fall back to a predictable sequence.
pub trait EntropySource {
    fn next_word(&mut self) -> CoreResult<u32>;
}

/// Uniform index in `0..n` by rejection sampling, so every catalog entry is
/// equally likely no matter how `n` divides `2^32`.
pub fn uniform_index<E: EntropySource + ?Sized>(source: &mut E, n: usize) -> CoreResult<usize> {
    debug_assert!(n > 0 && n as u64 <= u32::MAX as u64);
    let n = n as u64;
    let span = u32::MAX as u64 + 1;
    let zone = span - span % n;
    loop {
        let word = source.next_word()? as u64;
        if word < zone {
            return Ok((word % n) as usize);
        }
    }
}

pub struct ProvablyFairRng {
    pub server_seed: String, // secret
    pub client_seed: String,
    pub nonce: u64,
}

impl ProvablyFairRng {
    pub fn new(server_seed: impl Into<String>, client_seed: impl Into<String>, nonce: u64) -> Self {
        Self {
            server_seed: server_seed.into(),
            client_seed: client_seed.into(),
            nonce,
        }
    }

    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }

    pub fn hmac_bytes(&self) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(self.server_seed.as_bytes())
            .expect("HMAC takes any key size");
        let msg = format!("{}:{}", self.client_seed, self.nonce);
        mac.update(msg.as_bytes());
        let res = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&res);
        out
    }

    /// Fresh word stream for one spin.
    pub fn stream(&self) -> HmacStream {
        HmacStream {
            buffer: self.hmac_bytes(),
            cursor: 0,
        }
    }
}

pub struct HmacStream {
    buffer: [u8; 32],
    cursor: usize,
}

impl EntropySource for HmacStream {
    fn next_word(&mut self) -> CoreResult<u32> {
        if self.cursor + 4 > self.buffer.len() {
            let next = Sha256::digest(self.buffer);
            self.buffer.copy_from_slice(&next);
            self.cursor = 0;
        }
        let chunk = &self.buffer[self.cursor..self.cursor + 4];
        self.cursor += 4;
        Ok(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }
}

/// Operating-system entropy. Errors surface as `RandomSourceUnavailable`.
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn next_word(&mut self) -> CoreResult<u32> {
        OsRng
            .try_next_u32()
            .map_err(|e| CoreError::RandomSourceUnavailable(e.to_string()))
    }
}

const REFERRAL_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Referral code: `A` followed by `len` characters from `[A-Z0-9]`.
pub fn referral_code<E: EntropySource + ?Sized>(source: &mut E, len: usize) -> CoreResult<String> {
    let mut code = String::with_capacity(len + 1);
    code.push('A');
    for _ in 0..len {
        code.push(REFERRAL_ALPHABET[uniform_index(source, REFERRAL_ALPHABET.len())?] as char);
    }
    Ok(code)
}

/// New 256-bit server seed, hex encoded.
pub fn generate_server_seed() -> CoreResult<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CoreError::RandomSourceUnavailable(e.to_string()))?;
    Ok(hex::encode(bytes))
}
