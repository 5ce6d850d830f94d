//! Normalization of caller-supplied UTXO descriptors.
//!
//! `UnspentOutput` is the builder's intake format: callers describe the
//! coin they want to spend and the builder selects an input template
//! from the script shape (and the optional public key list).

use bch_primitives::ec::PublicKey;
use bch_script::Script;

use crate::TransactionError;

/// A spendable coin: the outpoint, the locking script, and the value.
#[derive(Clone, Debug)]
pub struct UnspentOutput {
    /// Txid of the funding transaction, internal (little-endian) order.
    pub tx_id: [u8; 32],
    /// Index of the output within the funding transaction.
    pub output_index: u32,
    /// The locking script of the output.
    pub script: Script,
    /// The value of the output.
    pub satoshis: u64,
    /// Optional sequence number override for the created input.
    pub sequence_number: Option<u32>,
    /// Public keys for escrow spends: the first is the reclaim key, the
    /// rest are the funding input keys. Empty for ordinary spends.
    pub public_keys: Vec<PublicKey>,
}

impl UnspentOutput {
    /// Create a descriptor from a display-order (reversed hex) txid.
    pub fn new(
        tx_id_hex: &str,
        output_index: u32,
        script: Script,
        satoshis: u64,
    ) -> Result<Self, TransactionError> {
        let bytes = hex::decode(tx_id_hex)
            .map_err(|e| TransactionError::InvalidArgument(format!("invalid txid hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(TransactionError::InvalidArgument(format!(
                "txid must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut tx_id = [0u8; 32];
        tx_id.copy_from_slice(&bytes);
        tx_id.reverse();

        Ok(UnspentOutput {
            tx_id,
            output_index,
            script,
            satoshis,
            sequence_number: None,
            public_keys: Vec::new(),
        })
    }

    /// Override the sequence number of the created input.
    pub fn with_sequence(mut self, sequence_number: u32) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    /// Attach escrow public keys (reclaim key first).
    pub fn with_public_keys(mut self, public_keys: Vec<PublicKey>) -> Self {
        self.public_keys = public_keys;
        self
    }

    /// The txid in display order (reversed hex).
    pub fn tx_id_hex(&self) -> String {
        let mut bytes = self.tx_id;
        bytes.reverse();
        hex::encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txid_hex_is_reversed() {
        let hex_id = "aa".repeat(31) + "bb";
        let utxo = UnspentOutput::new(&hex_id, 0, Script::new(), 1000).unwrap();
        assert_eq!(utxo.tx_id[0], 0xbb);
        assert_eq!(utxo.tx_id[31], 0xaa);
        assert_eq!(utxo.tx_id_hex(), hex_id);
    }

    #[test]
    fn test_rejects_bad_txid() {
        assert!(UnspentOutput::new("zz", 0, Script::new(), 0).is_err());
        assert!(UnspentOutput::new("aabb", 0, Script::new(), 0).is_err());
    }
}
