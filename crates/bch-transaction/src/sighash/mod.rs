//! Signature hash computation and verification for transaction signing.
//!
//! Bitcoin Cash signs with the BIP-143-style digest introduced by the
//! UAHF fork: every signature commits to the value being spent and
//! carries the FORKID flag for replay protection.
//!
//! See <https://github.com/bitcoincashorg/bitcoincash.org/blob/master/spec/replay-protected-sighash.md>

use bch_primitives::ec::{schnorr, PrivateKey, PublicKey, Signature, SigningAlgorithm};
use bch_primitives::hash::sha256d;
use bch_primitives::util::{TxWriter, VarInt};

use crate::transaction::Transaction;
use crate::TransactionError;

// -----------------------------------------------------------------------
// Sighash flag constants
// -----------------------------------------------------------------------

/// Sign all inputs and all outputs (the default).
pub const SIGHASH_ALL: u32 = 0x01;

/// Sign all inputs but no outputs, allowing outputs to be modified.
pub const SIGHASH_NONE: u32 = 0x02;

/// Sign all inputs and only the output at the signed input's index.
pub const SIGHASH_SINGLE: u32 = 0x03;

/// Replay-protection flag required on all transactions after the fork.
pub const SIGHASH_FORKID: u32 = 0x40;

/// Combined with another flag: only sign the current input.
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// The standard sighash type: ALL | FORKID.
pub const SIGHASH_ALL_FORKID: u32 = SIGHASH_ALL | SIGHASH_FORKID;

/// Mask applied to extract the base sighash type (ALL, NONE, SINGLE).
pub const SIGHASH_MASK: u32 = 0x1f;

// -----------------------------------------------------------------------
// Digest computation
// -----------------------------------------------------------------------

/// Compute the BIP-143-style signature hash for a given input.
///
/// # Arguments
/// * `tx`           - The transaction being signed.
/// * `input_index`  - Index of the input being signed.
/// * `subscript`    - The scriptCode being satisfied (locking script or
///                    redeem script).
/// * `sighash_type` - The combined sighash flags.
/// * `satoshis`     - The value of the output being spent.
///
/// # Returns
/// A 32-byte double-SHA256 digest.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    subscript: &[u8],
    sighash_type: u32,
    satoshis: u64,
) -> Result<[u8; 32], TransactionError> {
    let preimage = calc_preimage(tx, input_index, subscript, sighash_type, satoshis)?;
    Ok(sha256d(&preimage))
}

/// Compute the pre-image bytes for the BIP-143-style sighash.
///
/// Layout: nVersion | hashPrevouts | hashSequence | outpoint |
/// scriptCode | value | nSequence | hashOutputs | nLocktime |
/// sighashType, all little-endian where applicable.
pub fn calc_preimage(
    tx: &Transaction,
    input_index: usize,
    subscript: &[u8],
    sighash_type: u32,
    satoshis: u64,
) -> Result<Vec<u8>, TransactionError> {
    let inputs = tx.inputs();
    if input_index >= inputs.len() {
        return Err(TransactionError::InvalidIndex {
            index: input_index,
            length: inputs.len(),
        });
    }

    let input = &inputs[input_index];
    let base_type = sighash_type & SIGHASH_MASK;

    let hash_prevouts = if sighash_type & SIGHASH_ANYONECANPAY == 0 {
        prevouts_hash(tx)
    } else {
        [0u8; 32]
    };

    let hash_sequence = if sighash_type & SIGHASH_ANYONECANPAY == 0
        && base_type != SIGHASH_SINGLE
        && base_type != SIGHASH_NONE
    {
        sequence_hash(tx)
    } else {
        [0u8; 32]
    };

    let hash_outputs = if base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        outputs_hash(tx, None)
    } else if base_type == SIGHASH_SINGLE && input_index < tx.outputs().len() {
        outputs_hash(tx, Some(input_index))
    } else {
        [0u8; 32]
    };

    let mut writer = TxWriter::with_capacity(160 + subscript.len());

    writer.write_i32_le(tx.version());
    writer.write_bytes(&hash_prevouts);
    writer.write_bytes(&hash_sequence);
    writer.write_bytes(&input.prev_tx_id);
    writer.write_u32_le(input.output_index);
    writer.write_varint(VarInt::from(subscript.len()));
    writer.write_bytes(subscript);
    writer.write_u64_le(satoshis);
    writer.write_u32_le(input.sequence_number);
    writer.write_bytes(&hash_outputs);
    writer.write_u32_le(tx.n_lock_time());
    writer.write_u32_le(sighash_type);

    Ok(writer.into_bytes())
}

/// Double-SHA256 of all input outpoints (txid + vout) concatenated.
fn prevouts_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = TxWriter::with_capacity(tx.inputs().len() * 36);
    for input in tx.inputs() {
        writer.write_bytes(&input.prev_tx_id);
        writer.write_u32_le(input.output_index);
    }
    sha256d(writer.as_bytes())
}

/// Double-SHA256 of all input sequence numbers concatenated.
fn sequence_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = TxWriter::with_capacity(tx.inputs().len() * 4);
    for input in tx.inputs() {
        writer.write_u32_le(input.sequence_number);
    }
    sha256d(writer.as_bytes())
}

/// Double-SHA256 of serialized outputs: all of them, or only the one at
/// index `n` for SIGHASH_SINGLE.
fn outputs_hash(tx: &Transaction, n: Option<usize>) -> [u8; 32] {
    let mut writer = TxWriter::new();
    match n {
        None => {
            for output in tx.outputs() {
                writer.write_bytes(&output.bytes_for_sig_hash());
            }
        }
        Some(idx) => {
            writer.write_bytes(&tx.outputs()[idx].bytes_for_sig_hash());
        }
    }
    sha256d(writer.as_bytes())
}

// -----------------------------------------------------------------------
// Signing and verification
// -----------------------------------------------------------------------

/// Sign one input, producing raw signature bytes (without the trailing
/// sighash-type byte).
///
/// DER-encoded ECDSA or 64-byte Schnorr depending on `alg`.
pub fn sign(
    tx: &Transaction,
    key: &PrivateKey,
    input_index: usize,
    sighash_type: u32,
    subscript: &[u8],
    satoshis: u64,
    alg: SigningAlgorithm,
) -> Result<Vec<u8>, TransactionError> {
    let digest = signature_hash(tx, input_index, subscript, sighash_type, satoshis)?;
    match alg {
        SigningAlgorithm::Ecdsa => Ok(Signature::sign(&digest, key)?.to_der()),
        SigningAlgorithm::Schnorr => Ok(schnorr::sign(&digest, key)?.to_vec()),
    }
}

/// Verify raw signature bytes for one input.
///
/// The algorithm is detected from the signature length; see
/// [`algorithm_for`].
pub fn verify(
    tx: &Transaction,
    sig_bytes: &[u8],
    public_key: &PublicKey,
    input_index: usize,
    subscript: &[u8],
    satoshis: u64,
    sighash_type: u32,
) -> bool {
    let digest = match signature_hash(tx, input_index, subscript, sighash_type, satoshis) {
        Ok(d) => d,
        Err(_) => return false,
    };
    match algorithm_for(sig_bytes) {
        SigningAlgorithm::Schnorr => schnorr::verify(&digest, sig_bytes, public_key),
        SigningAlgorithm::Ecdsa => match Signature::from_der(sig_bytes) {
            Ok(sig) => sig.verify(&digest, public_key),
            Err(_) => false,
        },
    }
}

/// Detect the signature algorithm from raw signature bytes: exactly 64
/// bytes means Schnorr, anything else is treated as DER ECDSA.
pub fn algorithm_for(sig_bytes: &[u8]) -> SigningAlgorithm {
    if sig_bytes.len() == schnorr::SCHNORR_SIG_LEN {
        SigningAlgorithm::Schnorr
    } else {
        SigningAlgorithm::Ecdsa
    }
}
