//! Bundled RSA key material for signing stub results.
//!
//! The keys are fixtures, generated once and checked in. They sign nothing
//! outside tests.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha512};

/// PKCS#8 private key the stub signs with.
pub const PRIVATE_PEM: &str = include_str!("../fixtures/signing_key.pem");
/// SubjectPublicKeyInfo matching [`PRIVATE_PEM`].
pub const PUBLIC_PEM: &str = include_str!("../fixtures/signing_key.pub.pem");
/// An unrelated public key. Nothing the stub signs verifies against it.
pub const FOREIGN_PUBLIC_PEM: &str = include_str!("../fixtures/foreign_key.pub.pem");

static SIGNING_KEY: LazyLock<RsaPrivateKey> = LazyLock::new(|| {
    RsaPrivateKey::from_pkcs8_pem(PRIVATE_PEM).expect("bundled signing key is valid PKCS#8")
});

/// RSASSA-PKCS1-v1_5 / SHA-512 signature over `data`.
pub fn sign(data: &[u8]) -> Vec<u8> {
    let digest = Sha512::digest(data);
    SIGNING_KEY
        .sign(Pkcs1v15Sign::new::<Sha512>(), &digest)
        .expect("1024-bit key fits a SHA-512 DigestInfo")
}

pub fn sign_base64(data: &[u8]) -> String {
    BASE64.encode(sign(data))
}

/// `hashedApiKey` as the service reports it: base64 of SHA-512.
pub fn hash_api_key(api_key: &str) -> String {
    BASE64.encode(Sha512::digest(api_key.as_bytes()))
}
