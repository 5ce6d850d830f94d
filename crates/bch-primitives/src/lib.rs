/// BCH Blockchain SDK - Cryptographic primitives, hashing, and utilities.
///
/// This crate provides the foundational building blocks for the BCH SDK:
/// - Hash functions (SHA-256, SHA-256d, RIPEMD-160, Hash160)
/// - Elliptic curve cryptography (secp256k1 keys, ECDSA and Schnorr signatures)
/// - Little-endian wire codec with variable-length integer encoding

pub mod hash;
pub mod util;
pub mod ec;

mod error;
pub use error::PrimitivesError;
