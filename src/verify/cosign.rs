//! Cosign signature verification: raw key + signature pairs and JSON
//! bundles carrying a certificate and signature together.
//!
//! Key material arrives as PEM or DER, possibly base64-wrapped, and may be
//! an ECDSA P-256, Ed25519, or RSA public key, or an X.509 certificate
//! whose subject key is one of those.

use base64::Engine;
use ed25519_dalek::Verifier as _;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use rsa::signature::Verifier as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_cert::der::{Decode, DecodePem, Encode};

#[derive(Error, Debug)]
pub enum CosignError {
    #[error("unable to parse public key")]
    Key,

    #[error("unable to parse signature")]
    Signature,

    #[error("unable to validate signature")]
    Verify,
}

/// A parsed verification key.
pub enum PublicKey {
    EcdsaP256(p256::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
    Rsa(rsa::pkcs1v15::VerifyingKey<Sha256>),
}

/// A cosign bundle: certificate and signature in one JSON envelope.
#[derive(Debug, Deserialize)]
pub struct Bundle {
    #[serde(rename = "Certificate", alias = "certificate", alias = "cert")]
    pub certificate: String,
    #[serde(rename = "Signature", alias = "signature", alias = "base64Signature")]
    pub signature: String,
}

impl Bundle {
    /// Attempt to read asset content as a bundle. Not every `.sig` without
    /// a key is one, so failure is not an error.
    pub fn parse(content: &[u8]) -> Option<Self> {
        serde_json::from_slice(content).ok()
    }
}

/// Base64-decode if the content decodes cleanly, otherwise hand back the
/// raw bytes.
pub fn decode_base64_or_raw(content: &[u8]) -> Vec<u8> {
    let text: Vec<u8> = content
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(&text)
        .unwrap_or_else(|_| content.to_vec())
}

/// Parse a public key from PEM or DER, accepting certificates as carriers.
pub fn parse_public_key(content: &[u8]) -> Result<PublicKey, CosignError> {
    let text = std::str::from_utf8(content).unwrap_or("");

    if text.contains("BEGIN CERTIFICATE") {
        let cert = x509_cert::Certificate::from_pem(content).map_err(|_| CosignError::Key)?;
        return key_from_spki_der(&spki_der(&cert)?);
    }

    if text.contains("BEGIN PUBLIC KEY") {
        use ed25519_dalek::pkcs8::DecodePublicKey as _;
        use p256::pkcs8::DecodePublicKey as _;
        use rsa::pkcs8::DecodePublicKey as _;

        if let Ok(key) = p256::ecdsa::VerifyingKey::from_public_key_pem(text) {
            return Ok(PublicKey::EcdsaP256(key));
        }
        if let Ok(key) = ed25519_dalek::VerifyingKey::from_public_key_pem(text) {
            return Ok(PublicKey::Ed25519(key));
        }
        if let Ok(key) = rsa::RsaPublicKey::from_public_key_pem(text) {
            return Ok(PublicKey::Rsa(rsa::pkcs1v15::VerifyingKey::new(key)));
        }
        return Err(CosignError::Key);
    }

    // Raw DER: either a certificate or a bare SubjectPublicKeyInfo.
    if let Ok(cert) = x509_cert::Certificate::from_der(content) {
        return key_from_spki_der(&spki_der(&cert)?);
    }
    key_from_spki_der(content)
}

fn spki_der(cert: &x509_cert::Certificate) -> Result<Vec<u8>, CosignError> {
    cert.tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|_| CosignError::Key)
}

fn key_from_spki_der(der: &[u8]) -> Result<PublicKey, CosignError> {
    use ed25519_dalek::pkcs8::DecodePublicKey as _;
    use p256::pkcs8::DecodePublicKey as _;
    use rsa::pkcs8::DecodePublicKey as _;

    if let Ok(key) = p256::ecdsa::VerifyingKey::from_public_key_der(der) {
        return Ok(PublicKey::EcdsaP256(key));
    }
    if let Ok(key) = ed25519_dalek::VerifyingKey::from_public_key_der(der) {
        return Ok(PublicKey::Ed25519(key));
    }
    if let Ok(key) = rsa::RsaPublicKey::from_public_key_der(der) {
        return Ok(PublicKey::Rsa(rsa::pkcs1v15::VerifyingKey::new(key)));
    }
    Err(CosignError::Key)
}

/// Verify `sig` over `data` with `key`. ECDSA verifies the SHA-256 of the
/// data, as cosign does; Ed25519 and RSA verify the message itself.
pub fn verify_signature(key: &PublicKey, data: &[u8], sig: &[u8]) -> Result<(), CosignError> {
    match key {
        PublicKey::EcdsaP256(key) => {
            let digest = Sha256::digest(data);
            let signature = p256::ecdsa::Signature::from_der(sig)
                .or_else(|_| p256::ecdsa::Signature::from_slice(sig))
                .map_err(|_| CosignError::Signature)?;
            key.verify_prehash(&digest, &signature)
                .map_err(|_| CosignError::Verify)
        }
        PublicKey::Ed25519(key) => {
            let signature =
                ed25519_dalek::Signature::from_slice(sig).map_err(|_| CosignError::Signature)?;
            key.verify(data, &signature).map_err(|_| CosignError::Verify)
        }
        PublicKey::Rsa(key) => {
            let signature =
                rsa::pkcs1v15::Signature::try_from(sig).map_err(|_| CosignError::Signature)?;
            key.verify(data, &signature).map_err(|_| CosignError::Verify)
        }
    }
}

/// Verify a bundle's embedded signature over `data`.
pub fn verify_bundle(bundle: &Bundle, data: &[u8]) -> Result<(), CosignError> {
    let cert = decode_base64_or_raw(bundle.certificate.as_bytes());
    let key = parse_public_key(&cert)?;
    let sig = decode_base64_or_raw(bundle.signature.as_bytes());
    verify_signature(&key, data, &sig)
}
