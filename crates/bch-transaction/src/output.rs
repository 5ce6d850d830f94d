//! Transaction output with satoshi value, locking script, and optional
//! CashToken data.
//!
//! On the wire an output is `value(8 LE) | varint(len) | bytes`, where
//! `bytes` is the token prefix (when token data is present) followed by
//! the locking script. Parsing splits the prefix back out so callers
//! always see the bare locking script.

use bch_primitives::util::{varint_prefixed_len, TxReader, TxWriter, VarInt};
use bch_script::Script;

use crate::token::TokenData;
use crate::transaction::MAX_MONEY;
use crate::TransactionError;

/// A single output in a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    /// The number of satoshis locked by this output.
    pub satoshis: u64,

    /// The locking script (scriptPubKey) defining spending conditions,
    /// without any token prefix.
    pub script: Script,

    /// CashToken data carried by this output, if any.
    pub token_data: Option<TokenData>,
}

impl Output {
    /// Create an output with the given value and locking script.
    pub fn new(satoshis: u64, script: Script) -> Self {
        Output {
            satoshis,
            script,
            token_data: None,
        }
    }

    /// Create an output carrying token data.
    pub fn with_token_data(satoshis: u64, script: Script, token_data: TokenData) -> Self {
        Output {
            satoshis,
            script,
            token_data: Some(token_data),
        }
    }

    /// Whether the value lies in [0, MAX_MONEY].
    pub fn has_valid_satoshis(&self) -> bool {
        self.satoshis <= MAX_MONEY
    }

    /// The script field as it appears on the wire: token prefix (when
    /// present) followed by the locking script bytes.
    pub fn wire_script_bytes(&self) -> Vec<u8> {
        match &self.token_data {
            Some(token) => {
                let mut bytes = token.to_prefix_bytes();
                bytes.extend_from_slice(self.script.as_bytes());
                bytes
            }
            None => self.script.as_bytes().to_vec(),
        }
    }

    /// Deserialize an output from a `TxReader`.
    ///
    /// Reads 8-byte LE satoshis, a varint script length, and the script
    /// bytes; a leading token prefix is split into `token_data`.
    pub fn read_from(reader: &mut TxReader) -> Result<Self, TransactionError> {
        let satoshis = reader.read_u64_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading satoshis: {}", e))
        })?;

        let script_len = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading script length: {}", e))
        })?;

        let wire_bytes = reader.read_bytes(script_len.value() as usize).map_err(|e| {
            TransactionError::SerializationError(format!("reading locking script: {}", e))
        })?;

        let (token_data, script_bytes) = TokenData::unwrap_script(wire_bytes)?;

        Ok(Output {
            satoshis,
            script: Script::from_bytes(&script_bytes),
            token_data,
        })
    }

    /// Serialize this output into a `TxWriter`.
    pub fn write_to(&self, writer: &mut TxWriter) {
        writer.write_u64_le(self.satoshis);
        let wire_bytes = self.wire_script_bytes();
        writer.write_varint(VarInt::from(wire_bytes.len()));
        writer.write_bytes(&wire_bytes);
    }

    /// Serialize this output to a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = TxWriter::new();
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// Serialize this output for signature hash computation (identical
    /// to the wire form).
    pub fn bytes_for_sig_hash(&self) -> Vec<u8> {
        self.to_bytes()
    }

    /// The serialized byte size of this output.
    pub fn size(&self) -> usize {
        let wire_len = match &self.token_data {
            Some(token) => token.to_prefix_bytes().len() + self.script.len(),
            None => self.script.len(),
        };
        8 + varint_prefixed_len(wire_len)
    }
}
