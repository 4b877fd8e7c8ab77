//! Concrete primitives for the pairwise seed handshake: RSA-2048
//! keys, PKCS#1 v1.5 signatures over SHA-256, RSA-OAEP key wrap, and
//! AES-128-EAX for the envelope itself.

use aes::Aes128;
use eax::aead::{generic_array::GenericArray, Aead, KeyInit};
use eax::Eax;
use rand::{rngs::OsRng, RngCore};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::{Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::types::{HandshakeEnvelope, HexBytes};

type Aes128Eax = Eax<Aes128>;

pub const AES_KEY_LEN: usize = 16;
pub const AES_NONCE_LEN: usize = 16;
pub const AES_TAG_LEN: usize = 16;

pub fn load_private_key(path: impl AsRef<std::path::Path>) -> Result<RsaPrivateKey> {
    let pem = std::fs::read_to_string(path)?;
    RsaPrivateKey::from_pkcs1_pem(&pem).map_err(|e| Error::Pkcs8(e.to_string()))
}

pub fn load_public_key(path: impl AsRef<std::path::Path>) -> Result<RsaPublicKey> {
    let pem = std::fs::read_to_string(path)?;
    RsaPublicKey::from_pkcs1_pem(&pem).map_err(|e| Error::Pkcs8(e.to_string()))
}

/// `SHA-256(decimal_string(seed))`, the message actually signed.
pub fn seed_digest(seed: &num_bigint::BigUint) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_str_radix(10).as_bytes());
    hasher.finalize().into()
}

pub fn sign_digest(private_key: &RsaPrivateKey, digest: &[u8; 32]) -> Result<Vec<u8>> {
    let scheme = Pkcs1v15Sign::new::<Sha256>();
    Ok(private_key.sign(scheme, digest)?)
}

pub fn verify_digest(public_key: &RsaPublicKey, digest: &[u8; 32], signature: &[u8]) -> Result<()> {
    let scheme = Pkcs1v15Sign::new::<Sha256>();
    public_key
        .verify(scheme, digest, signature)
        .map_err(|_| Error::BadSignature)
}

/// The plaintext sealed inside each handshake envelope.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HandshakePayload {
    pub timestamp: u64,
    pub seed: num_bigint::BigUint,
    pub signature: HexBytes,
}

/// Builds the full handshake envelope: encrypts `payload` under a fresh
/// AES-128-EAX session key, then wraps that key under the recipient's RSA
/// public key with OAEP.
pub fn seal_envelope(
    recipient_public_key: &RsaPublicKey,
    payload: &HandshakePayload,
) -> Result<HandshakeEnvelope> {
    let plaintext = serde_json::to_vec(payload)?;

    let mut key = [0u8; AES_KEY_LEN];
    let mut nonce = [0u8; AES_NONCE_LEN];
    OsRng.fill_bytes(&mut key);
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes128Eax::new(GenericArray::from_slice(&key));
    let sealed = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext.as_ref())
        .map_err(|_| Error::Aead)?;
    // RustCrypto's `Aead::encrypt` appends the tag to the ciphertext; the wire
    // format keeps them as separate hex fields, so split it back apart here.
    let (ciphertext, tag) = sealed.split_at(sealed.len() - AES_TAG_LEN);

    let session_key = recipient_public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &key)
        .map_err(Error::Rsa)?;

    Ok(HandshakeEnvelope {
        session_key: HexBytes::new(session_key),
        ciphertext: HexBytes::new(ciphertext.to_vec()),
        cipher_nonce: HexBytes::new(nonce.to_vec()),
        tag: HexBytes::new(tag.to_vec()),
    })
}

/// Unwraps an envelope addressed to us: RSA-OAEP-decrypts the session key
/// with our private key, then AES-128-EAX-decrypts and verifies the payload.
/// Any failure here is a silently-dropped envelope; callers
/// decide what to do with the `Err`.
pub fn open_envelope(
    our_private_key: &RsaPrivateKey,
    envelope: &HandshakeEnvelope,
) -> Result<HandshakePayload> {
    let key = our_private_key
        .decrypt(Oaep::new::<Sha256>(), &envelope.session_key.0)
        .map_err(Error::Rsa)?;
    if key.len() != AES_KEY_LEN {
        return Err(Error::Malformed("session key has the wrong length".into()));
    }

    let mut sealed = envelope.ciphertext.0.clone();
    sealed.extend_from_slice(&envelope.tag.0);

    let cipher = Aes128Eax::new(GenericArray::from_slice(&key));
    let nonce = &envelope.cipher_nonce.0;
    if nonce.len() != AES_NONCE_LEN {
        return Err(Error::Malformed("nonce has the wrong length".into()));
    }
    let plaintext = cipher
        .decrypt(GenericArray::from_slice(nonce), sealed.as_ref())
        .map_err(|_| Error::Aead)?;

    Ok(serde_json::from_slice(&plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use rand::rngs::OsRng as TestOsRng;

    fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let private = RsaPrivateKey::new(&mut TestOsRng, 2048).unwrap();
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    #[test]
    fn seals_and_opens_roundtrip() {
        let (their_sk, their_pk) = keypair();
        let (my_sk, my_pk) = keypair();

        let seed = BigUint::from(123456789u64);
        let digest = seed_digest(&seed);
        let signature = sign_digest(&my_sk, &digest).unwrap();
        verify_digest(&my_pk, &digest, &signature).unwrap();

        let payload = HandshakePayload {
            timestamp: 1_700_000_000,
            seed: seed.clone(),
            signature: HexBytes::new(signature),
        };
        let envelope = seal_envelope(&their_pk, &payload).unwrap();
        let opened = open_envelope(&their_sk, &envelope).unwrap();
        assert_eq!(opened.seed, seed);
        assert_eq!(opened.timestamp, payload.timestamp);
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let (their_sk, their_pk) = keypair();
        let (my_sk, _my_pk) = keypair();
        let seed = BigUint::from(42u64);
        let digest = seed_digest(&seed);
        let signature = sign_digest(&my_sk, &digest).unwrap();
        let payload = HandshakePayload {
            timestamp: 1_700_000_000,
            seed,
            signature: HexBytes::new(signature),
        };
        let mut envelope = seal_envelope(&their_pk, &payload).unwrap();
        envelope.ciphertext.0[0] ^= 0xff;
        assert!(open_envelope(&their_sk, &envelope).is_err());
    }
}
