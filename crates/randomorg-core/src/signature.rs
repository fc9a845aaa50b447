//! Signature verification for signed JSON-RPC results.
//!
//! The service signs the serialized `random` object with RSASSA-PKCS1-v1_5
//! over SHA-512. Verification always runs over the bytes captured from the
//! response, never a re-encoding of the values.
//!
//! Public keys are cached process-wide, one slot per key identity. Concurrent
//! first requests for the same identity wait on the slot lock, so exactly one
//! of them fetches.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256, Sha512};

use crate::error::{Error, Result};
use crate::http::{HttpClient, ServerError};

/// RSA public key used to check service signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    key: RsaPublicKey,
}

impl PublicKey {
    /// Parse a `PUBLIC KEY` (SubjectPublicKeyInfo) or `RSA PUBLIC KEY`
    /// (PKCS#1) PEM document.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let pem = pem.trim();
        RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map(|key| Self { key })
            .map_err(|e| Error::format(format!("unusable public key: {e}")))
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.key.size() * 8
    }
}

/// Check `signature` over `signed`.
///
/// Returns `false` for any malformed or mismatched signature; never errors.
pub fn verify(signed: &[u8], signature: &[u8], key: &PublicKey) -> bool {
    let digest = Sha512::digest(signed);
    key.key
        .verify(Pkcs1v15Sign::new::<Sha512>(), &digest, signature)
        .is_ok()
}

// ---------------------------------------------------------------------------
// Key cache
// ---------------------------------------------------------------------------

type Slot = Arc<Mutex<Option<Arc<PublicKey>>>>;

/// Write-once-per-identity public key cache.
#[derive(Default)]
pub struct KeyCache {
    slots: Mutex<HashMap<String, Slot>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached key for `identity`, running `fetch` only if none is cached.
    ///
    /// A failed fetch leaves the slot empty so a later caller can try again.
    pub fn get_or_fetch<F>(&self, identity: &str, fetch: F) -> Result<Arc<PublicKey>>
    where
        F: FnOnce() -> Result<PublicKey>,
    {
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(identity.to_string()).or_default())
        };

        let mut cached = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(key) = cached.as_ref() {
            return Ok(Arc::clone(key));
        }
        let key = Arc::new(fetch()?);
        debug!("cached {}-bit public key for {identity}", key.bits());
        *cached = Some(Arc::clone(&key));
        Ok(key)
    }

    pub fn get(&self, identity: &str) -> Option<Arc<PublicKey>> {
        let slot = lock(&self.slots).get(identity).cloned()?;
        let cached = slot.lock().unwrap_or_else(PoisonError::into_inner);
        cached.clone()
    }

    /// Number of identities holding a key.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        slots
            .iter()
            .filter(|s| s.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static KEY_CACHE: LazyLock<Arc<KeyCache>> = LazyLock::new(|| Arc::new(KeyCache::new()));

/// The process-wide cache shared by every client.
pub fn global_cache() -> Arc<KeyCache> {
    Arc::clone(&KEY_CACHE)
}

/// Cache identity of inline PEM material.
pub fn inline_identity(pem: &str) -> String {
    let digest = Sha256::digest(pem.trim().as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("inline:{hex}")
}

/// Download and parse the PEM public key served at `url`.
pub fn fetch_public_key(http: &dyn HttpClient, url: &str, timeout: Duration) -> Result<PublicKey> {
    info!("fetching signing public key from {url}");
    let resp = http.get(url, &[], timeout)?;
    if resp.is_server_error() {
        return Err(Error::transport(ServerError {
            status: resp.status,
            url: url.to_string(),
        }));
    }
    if !resp.is_success() {
        return Err(Error::Protocol {
            code: i64::from(resp.status),
            message: format!("public key endpoint {url} answered {}", resp.status),
        });
    }
    PublicKey::from_pem(&resp.text())
}
