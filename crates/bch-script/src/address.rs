//! Legacy Bitcoin Cash address handling.
//!
//! Supports P2PKH and P2SH addresses in Base58Check form, with
//! mainnet/testnet discrimination. Checksums are SHA-256d.

use std::fmt;

use bch_primitives::ec::PublicKey;
use bch_primitives::hash::{hash160, sha256d};

use crate::ScriptError;

/// Mainnet P2PKH address version byte.
const MAINNET_P2PKH: u8 = 0x00;
/// Mainnet P2SH address version byte.
const MAINNET_P2SH: u8 = 0x05;
/// Testnet P2PKH address version byte.
const TESTNET_P2PKH: u8 = 0x6f;
/// Testnet P2SH address version byte.
const TESTNET_P2SH: u8 = 0xc4;

/// Network selector for address version bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    /// Mainnet (P2PKH prefix 0x00, P2SH prefix 0x05).
    Mainnet,
    /// Testnet (P2PKH prefix 0x6f, P2SH prefix 0xc4).
    Testnet,
}

/// Whether an address carries a public key hash or a script hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressKind {
    /// Pay-to-Public-Key-Hash.
    PubKeyHash,
    /// Pay-to-Script-Hash.
    ScriptHash,
}

/// A legacy Base58Check address.
///
/// Contains the 20-byte hash, the address kind, and the network. Can be
/// serialized to/from the Base58Check string format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    /// The human-readable Base58Check address string.
    pub address_string: String,
    /// The 20-byte hash160 payload.
    pub hash: [u8; 20],
    /// Public key hash or script hash.
    pub kind: AddressKind,
    /// The network this address belongs to.
    pub network: Network,
}

impl Address {
    /// Parse a Base58Check-encoded address string.
    ///
    /// Decodes the string, validates the checksum, and detects the
    /// network and kind from the version byte.
    pub fn from_string(addr: &str) -> Result<Self, ScriptError> {
        let decoded = bs58::decode(addr)
            .into_vec()
            .map_err(|_| ScriptError::InvalidAddress(format!("bad char for '{}'", addr)))?;

        if decoded.len() != 25 {
            return Err(ScriptError::InvalidAddressLength(addr.to_string()));
        }

        let checksum = sha256d(&decoded[..21]);
        if decoded[21..25] != checksum[..4] {
            return Err(ScriptError::EncodingChecksumFailed);
        }

        let (network, kind) = match decoded[0] {
            MAINNET_P2PKH => (Network::Mainnet, AddressKind::PubKeyHash),
            MAINNET_P2SH => (Network::Mainnet, AddressKind::ScriptHash),
            TESTNET_P2PKH => (Network::Testnet, AddressKind::PubKeyHash),
            TESTNET_P2SH => (Network::Testnet, AddressKind::ScriptHash),
            _ => return Err(ScriptError::UnsupportedAddress(addr.to_string())),
        };

        let mut hash = [0u8; 20];
        hash.copy_from_slice(&decoded[1..21]);

        Ok(Address {
            address_string: addr.to_string(),
            hash,
            kind,
            network,
        })
    }

    /// Create an address from a 20-byte public key hash.
    pub fn from_public_key_hash(hash: &[u8; 20], network: Network) -> Self {
        Self::encode(hash, AddressKind::PubKeyHash, network)
    }

    /// Create an address from a 20-byte script hash (P2SH).
    pub fn from_script_hash(hash: &[u8; 20], network: Network) -> Self {
        Self::encode(hash, AddressKind::ScriptHash, network)
    }

    /// Create a P2PKH address from a public key.
    pub fn from_public_key(key: &PublicKey, network: Network) -> Self {
        Self::from_public_key_hash(&key.hash160(), network)
    }

    /// Create a P2SH address from raw redeem-script bytes.
    pub fn from_redeem_script(script_bytes: &[u8], network: Network) -> Self {
        Self::from_script_hash(&hash160(script_bytes), network)
    }

    fn encode(hash: &[u8; 20], kind: AddressKind, network: Network) -> Self {
        let version = match (network, kind) {
            (Network::Mainnet, AddressKind::PubKeyHash) => MAINNET_P2PKH,
            (Network::Mainnet, AddressKind::ScriptHash) => MAINNET_P2SH,
            (Network::Testnet, AddressKind::PubKeyHash) => TESTNET_P2PKH,
            (Network::Testnet, AddressKind::ScriptHash) => TESTNET_P2SH,
        };

        let mut payload = Vec::with_capacity(25);
        payload.push(version);
        payload.extend_from_slice(hash);
        let checksum = sha256d(&payload);
        payload.extend_from_slice(&checksum[..4]);

        Address {
            address_string: bs58::encode(&payload).into_string(),
            hash: *hash,
            kind,
            network,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address_string)
    }
}
