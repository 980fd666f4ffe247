//! RSA signing key pair.
//!
//! One pair per process: generated at startup or loaded from a PEM file. The
//! public half is published (PEM, raw components, JWK) so other services can
//! verify tokens without calling back into the gateway.

use base64::Engine as _;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use riskgate_core::error::{Result, RiskGateError};

const KEY_BITS: usize = 2048;

fn base64url(data: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn unsigned_be(n: &rsa::BigUint) -> Vec<u8> {
    let mut bytes = n.to_bytes_be();
    while bytes.len() > 1 && bytes.first().is_some_and(|b| *b == 0) {
        bytes.remove(0);
    }
    bytes
}

/// Raw public key components, base64url encoded as in a JWK.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PublicComponents {
    pub n: String,
    pub e: String,
}

#[derive(Clone)]
pub struct KeyPair {
    kid: String,
    private: RsaPrivateKey,
    public: RsaPublicKey,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair").field("kid", &self.kid).finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a fresh 2048-bit pair. CPU bound; call once at startup.
    pub fn generate() -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| RiskGateError::Internal(format!("rsa key generation failed: {e}")))?;
        Self::from_private(private)
    }

    /// Load a PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`) PEM.
    pub fn from_private_pem(pem: &str) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| RiskGateError::BadRequest(format!("invalid rsa private key pem: {e}")))?;
        Self::from_private(private)
    }

    fn from_private(private: RsaPrivateKey) -> Result<Self> {
        let public = private.to_public_key();

        let der = private
            .to_pkcs1_der()
            .map_err(|e| RiskGateError::Internal(format!("encode pkcs1 der: {e}")))?;
        let encoding = EncodingKey::from_rsa_der(der.as_bytes());

        let n = unsigned_be(public.n());
        let e = unsigned_be(public.e());
        let decoding = DecodingKey::from_rsa_components(&base64url(&n), &base64url(&e))
            .map_err(|e| RiskGateError::Internal(format!("build decoding key: {e}")))?;

        // Stable across restarts for a supplied key: derived from the modulus.
        let kid = base64url(&n[..n.len().min(16)]);

        Ok(Self { kid, private, public, encoding, decoding })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn public_components(&self) -> PublicComponents {
        PublicComponents {
            n: base64url(&unsigned_be(self.public.n())),
            e: base64url(&unsigned_be(self.public.e())),
        }
    }

    /// SubjectPublicKeyInfo PEM (`PUBLIC KEY`).
    pub fn public_key_pem(&self) -> Result<String> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| RiskGateError::Internal(format!("encode public pem: {e}")))
    }

    /// PKCS#1 PEM of the private key, for key distribution/rotation tooling.
    pub fn private_key_pem(&self) -> Result<String> {
        self.private
            .to_pkcs1_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| RiskGateError::Internal(format!("encode private pem: {e}")))
    }

    /// Public JWK for the given signing algorithm.
    pub fn public_jwk(&self, alg: Algorithm) -> serde_json::Value {
        let parts = self.public_components();
        serde_json::json!({
            "kty": "RSA",
            "use": "sig",
            "alg": format!("{alg:?}"),
            "kid": self.kid,
            "n": parts.n,
            "e": parts.e,
        })
    }
}
