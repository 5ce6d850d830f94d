//! CashToken data carried by transaction outputs.
//!
//! Token information travels on the wire as a prefix inside the
//! output's script field: a 0xef marker, the 32-byte category id, a
//! bitfield, an optional NFT commitment, and an optional fungible
//! amount. This module owns the token types and the prefix codec; the
//! `Output` type folds the prefix in and out of its script bytes so the
//! outer wire layout stays `value | varint(len) | bytes`.

use bch_primitives::util::{TxReader, TxWriter, VarInt};

use crate::TransactionError;

/// Marker byte introducing a token prefix in an output's script field.
pub const TOKEN_PREFIX_MARKER: u8 = 0xef;

/// Largest representable fungible amount (2^63 - 1).
pub const MAX_TOKEN_AMOUNT: u64 = i64::MAX as u64;

// Bitfield layout: high nibble is structure flags, low nibble is the
// NFT capability.
const RESERVED_BIT: u8 = 0x80;
const HAS_COMMITMENT_LENGTH: u8 = 0x40;
const HAS_NFT: u8 = 0x20;
const HAS_AMOUNT: u8 = 0x10;
const CAPABILITY_MASK: u8 = 0x0f;

/// An NFT capability: what the token permits its holder to do with the
/// category going forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Capability {
    /// An immutable NFT.
    #[default]
    None,
    /// The commitment may be rewritten when the NFT is spent.
    Mutable,
    /// New tokens of the category may be created.
    Minting,
}

impl Capability {
    fn from_bits(bits: u8) -> Result<Self, TransactionError> {
        match bits {
            0x00 => Ok(Capability::None),
            0x01 => Ok(Capability::Mutable),
            0x02 => Ok(Capability::Minting),
            other => Err(TransactionError::SerializationError(format!(
                "invalid token capability {:#04x}",
                other
            ))),
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            Capability::None => 0x00,
            Capability::Mutable => 0x01,
            Capability::Minting => 0x02,
        }
    }

    /// The lowercase name used in the object form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::None => "none",
            Capability::Mutable => "mutable",
            Capability::Minting => "minting",
        }
    }

    /// Parse the object-form name back into a capability.
    pub fn from_str_name(name: &str) -> Result<Self, TransactionError> {
        match name {
            "none" => Ok(Capability::None),
            "mutable" => Ok(Capability::Mutable),
            "minting" => Ok(Capability::Minting),
            other => Err(TransactionError::InvalidArgument(format!(
                "unknown token capability '{}'",
                other
            ))),
        }
    }
}

/// The non-fungible half of a token: a capability and a commitment blob.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Nft {
    /// What the NFT permits.
    pub capability: Capability,
    /// Arbitrary commitment bytes (may be empty).
    pub commitment: Vec<u8>,
}

/// Token data attached to an output.
///
/// `category` is stored in internal (little-endian) byte order, the
/// same order it appears on the wire and the same order input txids are
/// stored in, which is what the category accounting compares against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenData {
    /// The 32-byte token category id.
    pub category: [u8; 32],
    /// Fungible amount, 0..=MAX_TOKEN_AMOUNT. Zero when the output
    /// carries only an NFT.
    pub amount: u64,
    /// Non-fungible token data, if any.
    pub nft: Option<Nft>,
}

impl TokenData {
    /// The category id as displayed (byte-reversed hex, like a txid).
    pub fn category_hex(&self) -> String {
        let mut bytes = self.category;
        bytes.reverse();
        hex::encode(bytes)
    }

    /// Parse a displayed category hex string into internal byte order.
    pub fn category_from_hex(hex_str: &str) -> Result<[u8; 32], TransactionError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| TransactionError::InvalidArgument(format!("invalid category hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(TransactionError::InvalidArgument(format!(
                "category must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        out.reverse();
        Ok(out)
    }

    /// Split a wire script field into its token prefix and the actual
    /// locking script bytes.
    ///
    /// Returns `(None, bytes)` unchanged when no marker is present.
    pub fn unwrap_script(bytes: &[u8]) -> Result<(Option<TokenData>, Vec<u8>), TransactionError> {
        if bytes.first() != Some(&TOKEN_PREFIX_MARKER) {
            return Ok((None, bytes.to_vec()));
        }

        let mut reader = TxReader::new(&bytes[1..]);
        let category_bytes = reader.read_bytes(32).map_err(|e| {
            TransactionError::SerializationError(format!("reading token category: {}", e))
        })?;
        let mut category = [0u8; 32];
        category.copy_from_slice(category_bytes);

        let bitfield = reader.read_u8().map_err(|e| {
            TransactionError::SerializationError(format!("reading token bitfield: {}", e))
        })?;

        if bitfield & RESERVED_BIT != 0 {
            return Err(TransactionError::SerializationError(
                "token bitfield has reserved bit set".to_string(),
            ));
        }
        let has_commitment = bitfield & HAS_COMMITMENT_LENGTH != 0;
        let has_nft = bitfield & HAS_NFT != 0;
        let has_amount = bitfield & HAS_AMOUNT != 0;
        let capability = Capability::from_bits(bitfield & CAPABILITY_MASK)?;

        if !has_nft && !has_amount {
            return Err(TransactionError::SerializationError(
                "token prefix encodes neither an NFT nor an amount".to_string(),
            ));
        }
        if !has_nft && (has_commitment || capability != Capability::None) {
            return Err(TransactionError::SerializationError(
                "token prefix has NFT fields without the NFT bit".to_string(),
            ));
        }

        let nft = if has_nft {
            let commitment = if has_commitment {
                let len = reader.read_varint().map_err(|e| {
                    TransactionError::SerializationError(format!(
                        "reading commitment length: {}",
                        e
                    ))
                })?;
                if len.value() == 0 {
                    return Err(TransactionError::SerializationError(
                        "token commitment length must be non-zero".to_string(),
                    ));
                }
                reader
                    .read_bytes(len.value() as usize)
                    .map_err(|e| {
                        TransactionError::SerializationError(format!(
                            "reading commitment: {}",
                            e
                        ))
                    })?
                    .to_vec()
            } else {
                Vec::new()
            };
            Some(Nft {
                capability,
                commitment,
            })
        } else {
            None
        };

        let amount = if has_amount {
            let amount = reader
                .read_varint()
                .map_err(|e| {
                    TransactionError::SerializationError(format!("reading token amount: {}", e))
                })?
                .value();
            if amount == 0 || amount > MAX_TOKEN_AMOUNT {
                return Err(TransactionError::SerializationError(format!(
                    "token amount {} out of range",
                    amount
                )));
            }
            amount
        } else {
            0
        };

        let script_start = 1 + (bytes.len() - 1 - reader.remaining());
        Ok((
            Some(TokenData {
                category,
                amount,
                nft,
            }),
            bytes[script_start..].to_vec(),
        ))
    }

    /// Encode this token data as a wire prefix (marker included).
    pub fn to_prefix_bytes(&self) -> Vec<u8> {
        let mut writer = TxWriter::with_capacity(34 + self.nft.as_ref().map_or(0, |n| n.commitment.len() + 1) + 9);
        writer.write_u8(TOKEN_PREFIX_MARKER);
        writer.write_bytes(&self.category);

        let mut bitfield = 0u8;
        if let Some(nft) = &self.nft {
            bitfield |= HAS_NFT;
            bitfield |= nft.capability.to_bits();
            if !nft.commitment.is_empty() {
                bitfield |= HAS_COMMITMENT_LENGTH;
            }
        }
        if self.amount > 0 {
            bitfield |= HAS_AMOUNT;
        }
        writer.write_u8(bitfield);

        if let Some(nft) = &self.nft {
            if !nft.commitment.is_empty() {
                writer.write_varint(VarInt::from(nft.commitment.len()));
                writer.write_bytes(&nft.commitment);
            }
        }
        if self.amount > 0 {
            writer.write_varint(VarInt(self.amount));
        }
        writer.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category() -> [u8; 32] {
        [0xcc; 32]
    }

    #[test]
    fn test_fungible_roundtrip() {
        let token = TokenData {
            category: category(),
            amount: 1000,
            nft: None,
        };
        let mut wrapped = token.to_prefix_bytes();
        wrapped.extend_from_slice(&[0x51, 0x52]); // trailing script bytes
        let (parsed, script) = TokenData::unwrap_script(&wrapped).unwrap();
        assert_eq!(parsed.unwrap(), token);
        assert_eq!(script, vec![0x51, 0x52]);
    }

    #[test]
    fn test_nft_with_commitment_roundtrip() {
        let token = TokenData {
            category: category(),
            amount: 0,
            nft: Some(Nft {
                capability: Capability::Minting,
                commitment: vec![0x01, 0x02, 0x03],
            }),
        };
        let wrapped = token.to_prefix_bytes();
        let (parsed, script) = TokenData::unwrap_script(&wrapped).unwrap();
        assert_eq!(parsed.unwrap(), token);
        assert!(script.is_empty());
    }

    #[test]
    fn test_nft_and_amount_roundtrip() {
        let token = TokenData {
            category: category(),
            amount: MAX_TOKEN_AMOUNT,
            nft: Some(Nft {
                capability: Capability::Mutable,
                commitment: Vec::new(),
            }),
        };
        let (parsed, _) = TokenData::unwrap_script(&token.to_prefix_bytes()).unwrap();
        assert_eq!(parsed.unwrap(), token);
    }

    #[test]
    fn test_no_marker_passthrough() {
        let script = vec![0x76, 0xa9, 0x14];
        let (token, rest) = TokenData::unwrap_script(&script).unwrap();
        assert!(token.is_none());
        assert_eq!(rest, script);
    }

    #[test]
    fn test_rejects_empty_prefix() {
        // Marker + category + bitfield with neither NFT nor amount.
        let mut bytes = vec![TOKEN_PREFIX_MARKER];
        bytes.extend_from_slice(&[0u8; 32]);
        bytes.push(0x00);
        assert!(TokenData::unwrap_script(&bytes).is_err());
    }

    #[test]
    fn test_rejects_reserved_bit() {
        let mut bytes = vec![TOKEN_PREFIX_MARKER];
        bytes.extend_from_slice(&[0u8; 32]);
        bytes.push(0x90); // reserved | amount
        bytes.push(0x01);
        assert!(TokenData::unwrap_script(&bytes).is_err());
    }

    #[test]
    fn test_rejects_truncated_prefix() {
        let bytes = vec![TOKEN_PREFIX_MARKER, 0x01, 0x02];
        assert!(TokenData::unwrap_script(&bytes).is_err());
    }

    #[test]
    fn test_category_hex_is_reversed() {
        let mut category = [0u8; 32];
        category[0] = 0xaa;
        let token = TokenData {
            category,
            amount: 1,
            nft: None,
        };
        let display = token.category_hex();
        assert!(display.ends_with("aa"));
        assert_eq!(TokenData::category_from_hex(&display).unwrap(), category);
    }

    #[test]
    fn test_capability_names() {
        for cap in [Capability::None, Capability::Mutable, Capability::Minting] {
            assert_eq!(Capability::from_str_name(cap.as_str()).unwrap(), cap);
        }
        assert!(Capability::from_str_name("bogus").is_err());
    }
}
