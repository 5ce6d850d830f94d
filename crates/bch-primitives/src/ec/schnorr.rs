//! BCH Schnorr signatures over secp256k1.
//!
//! The 64-byte (r, s) scheme introduced with the 2019 protocol upgrade:
//! the challenge commits to the R x-coordinate, the full compressed
//! public key, and the 32-byte message digest
//! (`e = SHA256(r || pubkey || m)`). Nonces are normalized so that R has
//! an even Y coordinate, which lets verification reject the negated
//! signature without carrying extra parity data.

use k256::elliptic_curve::group::Group;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::point::AffineCoordinates;
use k256::elliptic_curve::{Field, PrimeField};
use k256::{FieldBytes, ProjectivePoint, Scalar, U256};
use sha2::{Digest, Sha256};

use crate::ec::private_key::PrivateKey;
use crate::ec::public_key::PublicKey;
use crate::PrimitivesError;

/// Length of a Schnorr signature in bytes (32-byte r + 32-byte s).
pub const SCHNORR_SIG_LEN: usize = 64;

/// Sign a 32-byte message digest, producing a 64-byte Schnorr signature.
///
/// The nonce is derived deterministically from the private key and the
/// digest, so signing is reproducible and requires no RNG.
///
/// # Arguments
/// * `hash` - The 32-byte digest to sign.
/// * `priv_key` - The signing key.
///
/// # Returns
/// A 64-byte `r || s` signature.
pub fn sign(hash: &[u8; 32], priv_key: &PrivateKey) -> Result<[u8; SCHNORR_SIG_LEN], PrimitivesError> {
    let d: Scalar = *priv_key.signing_key().as_nonzero_scalar().as_ref();
    let pubkey = priv_key.public_key().to_compressed();

    // Deterministic nonce: reduce(SHA256(d || m || counter)), bumping the
    // counter in the negligible case the reduction lands on zero.
    let mut k = Scalar::ZERO;
    for counter in 0u8..=255 {
        let mut hasher = Sha256::new();
        hasher.update(priv_key.to_bytes());
        hasher.update(hash);
        hasher.update([counter]);
        let digest: [u8; 32] = hasher.finalize().into();
        k = <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(digest));
        if k != Scalar::ZERO {
            break;
        }
    }
    if k == Scalar::ZERO {
        return Err(PrimitivesError::InvalidSignature(
            "schnorr nonce derivation failed".to_string(),
        ));
    }

    let r_point = (ProjectivePoint::GENERATOR * k).to_affine();
    // Negating k flips the Y parity of R but leaves its x-coordinate
    // unchanged, so r can be taken before the adjustment.
    if bool::from(r_point.y_is_odd()) {
        k = -k;
    }
    let r: [u8; 32] = r_point.x().into();

    let e = challenge(&r, &pubkey, hash);
    let s = k + e * d;

    let mut sig = [0u8; SCHNORR_SIG_LEN];
    sig[..32].copy_from_slice(&r);
    sig[32..].copy_from_slice(&s.to_bytes());
    Ok(sig)
}

/// Verify a 64-byte Schnorr signature against a 32-byte digest.
///
/// # Returns
/// `true` if the signature is valid for this digest and public key.
pub fn verify(hash: &[u8; 32], sig: &[u8], pub_key: &PublicKey) -> bool {
    if sig.len() != SCHNORR_SIG_LEN {
        return false;
    }
    let mut r = [0u8; 32];
    r.copy_from_slice(&sig[..32]);

    let s = match Option::<Scalar>::from(Scalar::from_repr(*FieldBytes::from_slice(&sig[32..]))) {
        Some(s) => s,
        None => return false,
    };

    let pubkey_bytes = pub_key.to_compressed();
    let e = challenge(&r, &pubkey_bytes, hash);

    let p = ProjectivePoint::from(*pub_key.verifying_key().as_affine());
    let r_point = ProjectivePoint::GENERATOR * s - p * e;
    if bool::from(r_point.is_identity()) {
        return false;
    }

    let r_affine = r_point.to_affine();
    if bool::from(r_affine.y_is_odd()) {
        return false;
    }
    r_affine.x().as_slice() == r
}

/// Compute the challenge scalar `e = SHA256(r || pubkey || m) mod n`.
fn challenge(r: &[u8; 32], pubkey: &[u8; 33], hash: &[u8; 32]) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(r);
    hasher.update(pubkey);
    hasher.update(hash);
    let digest: [u8; 32] = hasher.finalize().into();
    <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn test_sign_verify_roundtrip() {
        let key = PrivateKey::new();
        let hash = sha256(b"schnorr message");
        let sig = sign(&hash, &key).unwrap();
        assert_eq!(sig.len(), SCHNORR_SIG_LEN);
        assert!(verify(&hash, &sig, &key.public_key()));
    }

    #[test]
    fn test_deterministic() {
        let key = PrivateKey::new();
        let hash = sha256(b"same message");
        assert_eq!(sign(&hash, &key).unwrap(), sign(&hash, &key).unwrap());
    }

    #[test]
    fn test_wrong_message_rejected() {
        let key = PrivateKey::new();
        let sig = sign(&sha256(b"a"), &key).unwrap();
        assert!(!verify(&sha256(b"b"), &sig, &key.public_key()));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let key = PrivateKey::new();
        let other = PrivateKey::new();
        let hash = sha256(b"msg");
        let sig = sign(&hash, &key).unwrap();
        assert!(!verify(&hash, &sig, &other.public_key()));
    }

    #[test]
    fn test_malformed_length_rejected() {
        let key = PrivateKey::new();
        let hash = sha256(b"msg");
        assert!(!verify(&hash, &[0u8; 63], &key.public_key()));
        assert!(!verify(&hash, &[0u8; 65], &key.public_key()));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let key = PrivateKey::new();
        let hash = sha256(b"msg");
        let mut sig = sign(&hash, &key).unwrap();
        sig[40] ^= 0x01;
        assert!(!verify(&hash, &sig, &key.public_key()));
    }
}
