//! Detached GPG signature verification.
//!
//! Keys are expected armored; signatures may be armored or raw. A
//! signature verifies if the primary key or any signing subkey accepts it.

use std::io::Cursor;

use pgp::{Deserializable, SignedPublicKey, StandaloneSignature};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GpgError {
    #[error("failed to parse public key: {0}")]
    Key(String),

    #[error("failed to parse signature: {0}")]
    Signature(String),

    #[error("signature verification failed: {0}")]
    Verify(String),
}

fn parse_signature(sig_bytes: &[u8]) -> Result<StandaloneSignature, GpgError> {
    match StandaloneSignature::from_armor_single(Cursor::new(sig_bytes)) {
        Ok((sig, _)) => Ok(sig),
        // Not armored; parse as a raw signature packet.
        Err(_) => StandaloneSignature::from_bytes(Cursor::new(sig_bytes))
            .map_err(|e| GpgError::Signature(e.to_string())),
    }
}

/// Verify a detached signature over `data` with an armored public key.
pub fn verify_detached(key_bytes: &[u8], sig_bytes: &[u8], data: &[u8]) -> Result<(), GpgError> {
    let (key, _) = SignedPublicKey::from_armor_single(Cursor::new(key_bytes))
        .map_err(|e| GpgError::Key(e.to_string()))?;

    let signature = parse_signature(sig_bytes)?;

    if signature.verify(&key, data).is_ok() {
        return Ok(());
    }

    for subkey in &key.public_subkeys {
        if signature.verify(subkey, data).is_ok() {
            return Ok(());
        }
    }

    Err(GpgError::Verify(
        "no key in the keyring accepted the signature".to_string(),
    ))
}

/// Key id named by a detached signature, as upper-case hex. Used to fetch
/// the public key from a keyserver when the release ships none.
pub fn signature_key_id(sig_bytes: &[u8]) -> Result<String, GpgError> {
    let signature = parse_signature(sig_bytes)?;

    let issuer = signature
        .signature
        .issuer()
        .into_iter()
        .next()
        .ok_or_else(|| GpgError::Signature("signature does not name a key id".to_string()))?;

    Ok(hex::encode_upper(issuer.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_key_rejected() {
        let err = verify_detached(b"not a key", b"not a signature", b"data").unwrap_err();
        assert!(matches!(err, GpgError::Key(_)));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        // A syntactically-armored key would still be required first; a bad
        // signature with a bad key reports the key.
        let err = signature_key_id(b"\x00\x01\x02").unwrap_err();
        assert!(matches!(err, GpgError::Signature(_)));
    }
}
