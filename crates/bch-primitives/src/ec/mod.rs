/// Elliptic curve cryptography on secp256k1.
///
/// Provides private keys, public keys, ECDSA signatures with DER
/// serialization, and the BCH Schnorr signature scheme.

pub mod private_key;
pub mod public_key;
pub mod signature;
pub mod schnorr;

pub use private_key::PrivateKey;
pub use public_key::PublicKey;
pub use signature::Signature;

/// Signature algorithm selector for transaction signing.
///
/// The wire format discriminates the two by length: Schnorr signatures
/// are exactly 64 bytes before the sighash-type byte, ECDSA signatures
/// are DER-encoded and shorter or longer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SigningAlgorithm {
    /// RFC6979 deterministic ECDSA with low-S DER encoding (the default).
    #[default]
    Ecdsa,
    /// 64-byte BCH Schnorr.
    Schnorr,
}
