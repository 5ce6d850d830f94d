//! Transaction input referencing a previous output, with a tagged
//! signing variant per recognized script template.
//!
//! The variant decides how an input is sized before signing, how
//! signatures are produced and validated, and how the unlocking script
//! is assembled. Capability methods are total: the `Raw` variant (no
//! recognized template) answers signing questions with `None`, which
//! the transaction surfaces as an unverifiable-signature error.

pub mod escrow;
pub mod multisig;

use bch_primitives::ec::{PrivateKey, PublicKey, SigningAlgorithm};
use bch_primitives::util::{varint_prefixed_len, TxReader, TxWriter, VarInt};
use bch_script::chunk::push_data_prefix;
use bch_script::Script;

use crate::output::Output;
use crate::sighash;
use crate::transaction::Transaction;
use crate::unspent::UnspentOutput;
use crate::TransactionError;

pub use escrow::EscrowState;
pub use multisig::MultisigState;

/// Default sequence number: a finalized input with no lock-time.
pub const DEFAULT_SEQNUMBER: u32 = 0xFFFF_FFFF;

/// Sequence number that opts an input into nLockTime enforcement.
pub const DEFAULT_LOCKTIME_SEQNUMBER: u32 = 0xFFFF_FFFE;

/// Worst-case P2PKH unlocking script: push(72-byte DER sig + type byte)
/// + push(33-byte pubkey).
const PKH_SCRIPT_MAX_SIZE: usize = 74 + 34;

/// Worst-case P2PK unlocking script: push(sig + type byte).
const PK_SCRIPT_MAX_SIZE: usize = 74;

/// Worst-case per-signature cost in a multisig unlocking script.
const MULTISIG_SIG_MAX_SIZE: usize = 74;

/// One signature produced for one input.
#[derive(Clone, Debug)]
pub struct TransactionSignature {
    /// The input this signature belongs to.
    pub input_index: usize,
    /// The sighash flags the digest was computed with.
    pub sighash_type: u32,
    /// The public key the signature verifies against.
    pub public_key: PublicKey,
    /// Raw signature bytes: DER ECDSA or 64-byte Schnorr, without the
    /// trailing sighash-type byte.
    pub signature: Vec<u8>,
}

impl TransactionSignature {
    /// The bytes pushed on the wire: signature followed by the
    /// sighash-type byte.
    pub fn to_push_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.signature.len() + 1);
        out.extend_from_slice(&self.signature);
        out.push(self.sighash_type as u8);
        out
    }
}

/// The signing strategy attached to an input, selected from the shape
/// of the output being spent.
#[derive(Clone, Debug)]
pub enum InputVariant {
    /// No recognized template; carries whatever script it was parsed with.
    Raw,
    /// Spends a P2PKH (or P2SH treated as such) output.
    PublicKeyHash {
        /// The applied signature, if any.
        signature: Option<TransactionSignature>,
    },
    /// Spends a P2PK output.
    PublicKey {
        /// The key the output pays to.
        public_key: PublicKey,
        /// The applied signature, if any.
        signature: Option<TransactionSignature>,
    },
    /// Spends a bare multisig output.
    MultiSig(MultisigState),
    /// Spends a P2SH-wrapped multisig output.
    MultiSigScriptHash(MultisigState),
    /// Spends a ZCE escrow output with the reclaim key.
    Escrow(EscrowState),
}

/// A single input in a transaction.
///
/// The wire fields are public; the unlocking script, the back-reference
/// to the spent output, and the signing variant are managed through
/// methods so signature state stays consistent.
#[derive(Clone, Debug)]
pub struct Input {
    /// The 32-byte txid of the output being spent, internal
    /// (little-endian) byte order.
    pub prev_tx_id: [u8; 32],

    /// Index of the output within the funding transaction.
    pub output_index: u32,

    /// Sequence number. Defaults to `0xFFFFFFFF` (finalized).
    pub sequence_number: u32,

    /// The unlocking script (scriptSig). Empty until signed.
    script: Script,

    /// The output being spent. Required for signing and for summing
    /// input amounts.
    output: Option<Output>,

    /// The signing strategy for this input.
    variant: InputVariant,
}

impl Input {
    /// Create a raw input with an explicit unlocking script.
    pub fn new_raw(
        prev_tx_id: [u8; 32],
        output_index: u32,
        script: Script,
        sequence_number: u32,
    ) -> Self {
        Input {
            prev_tx_id,
            output_index,
            sequence_number,
            script,
            output: None,
            variant: InputVariant::Raw,
        }
    }

    /// Build an input from a UTXO descriptor, selecting the variant
    /// from the script shape.
    ///
    /// A descriptor carrying more than one public key selects the
    /// escrow variant (first key reclaims, the rest are the funding
    /// input keys). Otherwise P2PKH-shaped scripts (including P2SH and
    /// the witness forms, which this chain treats the same way) select
    /// the public-key-hash signer and P2PK selects the public-key
    /// signer; anything else stays raw.
    pub fn from_utxo(utxo: &UnspentOutput) -> Result<Self, TransactionError> {
        let variant = if utxo.public_keys.len() > 1 {
            InputVariant::Escrow(EscrowState::new(
                utxo.public_keys[0].clone(),
                utxo.public_keys[1..].to_vec(),
            ))
        } else if utxo.script.is_p2pkh()
            || utxo.script.is_witness_public_key_hash_out()
            || utxo.script.is_p2sh()
        {
            InputVariant::PublicKeyHash { signature: None }
        } else if utxo.script.is_p2pk() {
            let key_bytes = utxo.script.public_key()?;
            InputVariant::PublicKey {
                public_key: PublicKey::from_bytes(&key_bytes)?,
                signature: None,
            }
        } else {
            InputVariant::Raw
        };

        Ok(Input {
            prev_tx_id: utxo.tx_id,
            output_index: utxo.output_index,
            sequence_number: utxo.sequence_number.unwrap_or(DEFAULT_SEQNUMBER),
            script: Script::new(),
            output: Some(Output::new(utxo.satoshis, utxo.script.clone())),
            variant,
        })
    }

    /// Build a multisig input from a UTXO descriptor and an explicit
    /// key set.
    ///
    /// Bare multisig outputs select the bare variant; P2SH (or witness
    /// script hash) outputs select the wrapped variant with the redeem
    /// script rebuilt from the key set. Anything else is unsupported.
    pub fn from_utxo_multisig(
        utxo: &UnspentOutput,
        public_keys: Vec<PublicKey>,
        threshold: usize,
    ) -> Result<Self, TransactionError> {
        if threshold == 0 || threshold > public_keys.len() {
            return Err(TransactionError::InvalidArgument(format!(
                "threshold {} out of range for {} keys",
                threshold,
                public_keys.len()
            )));
        }

        let variant = if utxo.script.is_multisig_out() {
            InputVariant::MultiSig(MultisigState::new(public_keys, threshold))
        } else if utxo.script.is_p2sh() || utxo.script.is_witness_script_hash_out() {
            InputVariant::MultiSigScriptHash(MultisigState::new_script_hash(
                public_keys,
                threshold,
            )?)
        } else {
            return Err(TransactionError::UnsupportedScript(utxo.script.to_hex()));
        };

        Ok(Input {
            prev_tx_id: utxo.tx_id,
            output_index: utxo.output_index,
            sequence_number: utxo.sequence_number.unwrap_or(DEFAULT_SEQNUMBER),
            script: Script::new(),
            output: Some(Output::new(utxo.satoshis, utxo.script.clone())),
            variant,
        })
    }

    // -----------------------------------------------------------------
    // Wire format
    // -----------------------------------------------------------------

    /// Deserialize an input: 32-byte txid, u32 vout, varint-prefixed
    /// unlocking script, u32 sequence.
    pub fn read_from(reader: &mut TxReader) -> Result<Self, TransactionError> {
        let txid_bytes = reader.read_bytes(32).map_err(|e| {
            TransactionError::SerializationError(format!("reading prev txid: {}", e))
        })?;
        let mut prev_tx_id = [0u8; 32];
        prev_tx_id.copy_from_slice(txid_bytes);

        let output_index = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading output index: {}", e))
        })?;

        let script_len = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading script length: {}", e))
        })?;

        let script_bytes = reader.read_bytes(script_len.value() as usize).map_err(|e| {
            TransactionError::SerializationError(format!("reading unlocking script: {}", e))
        })?;

        let sequence_number = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading sequence number: {}", e))
        })?;

        Ok(Input {
            prev_tx_id,
            output_index,
            sequence_number,
            script: Script::from_bytes(script_bytes),
            output: None,
            variant: InputVariant::Raw,
        })
    }

    /// Serialize this input into a `TxWriter`.
    pub fn write_to(&self, writer: &mut TxWriter) {
        writer.write_bytes(&self.prev_tx_id);
        writer.write_u32_le(self.output_index);
        writer.write_varint(VarInt::from(self.script.len()));
        writer.write_bytes(self.script.as_bytes());
        writer.write_u32_le(self.sequence_number);
    }

    /// Serialize this input to a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = TxWriter::new();
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// The serialized byte size of this input as currently assembled.
    pub fn size(&self) -> usize {
        36 + varint_prefixed_len(self.script.len()) + 4
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    /// The unlocking script.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Replace the unlocking script wholesale (raw inputs only carry
    /// whatever they are given).
    pub fn set_script(&mut self, script: Script) {
        self.script = script;
    }

    /// The output being spent, if attached.
    pub fn output(&self) -> Option<&Output> {
        self.output.as_ref()
    }

    /// Attach or replace the spent output.
    pub fn set_output(&mut self, output: Option<Output>) {
        self.output = output;
    }

    /// The signing variant.
    pub fn variant(&self) -> &InputVariant {
        &self.variant
    }

    /// The prev-txid in display order (reversed hex).
    pub fn prev_tx_id_hex(&self) -> String {
        let mut bytes = self.prev_tx_id;
        bytes.reverse();
        hex::encode(bytes)
    }

    /// Whether this is a null outpoint (coinbase-style): all-zero txid
    /// and index 0xFFFFFFFF.
    pub fn is_null(&self) -> bool {
        self.prev_tx_id == [0u8; 32] && self.output_index == 0xFFFF_FFFF
    }

    // -----------------------------------------------------------------
    // Capability contract
    // -----------------------------------------------------------------

    /// Worst-case serialized size once fully signed, used by the fee
    /// estimator before signatures exist.
    pub fn estimated_size(&self) -> usize {
        let script_estimate = match &self.variant {
            InputVariant::Raw => self.script.len(),
            InputVariant::PublicKeyHash { .. } => PKH_SCRIPT_MAX_SIZE,
            InputVariant::PublicKey { .. } => PK_SCRIPT_MAX_SIZE,
            InputVariant::MultiSig(state) => 1 + MULTISIG_SIG_MAX_SIZE * state.threshold(),
            InputVariant::MultiSigScriptHash(state) => {
                let redeem_len = state.redeem_script().map_or(0, |s| s.len());
                1 + MULTISIG_SIG_MAX_SIZE * state.threshold() + push_len(redeem_len)
            }
            InputVariant::Escrow(state) => {
                let redeem_len = state.redeem_script().map_or(0, |s| s.len());
                74 + 34 + push_len(redeem_len)
            }
        };
        36 + varint_prefixed_len(script_estimate) + 4
    }

    /// The scriptCode signatures for this input commit to: the locking
    /// script for direct spends, the redeem script for script-hash
    /// spends. `None` when the spent output is not attached.
    pub fn signing_subscript(&self) -> Option<Vec<u8>> {
        match &self.variant {
            InputVariant::MultiSigScriptHash(state) => {
                state.redeem_script().map(|s| s.as_bytes().to_vec())
            }
            InputVariant::Escrow(state) => {
                state.redeem_script().ok().map(|s| s.as_bytes().to_vec())
            }
            _ => self.output.as_ref().map(|o| o.script.as_bytes().to_vec()),
        }
    }

    /// Produce the signatures this private key can contribute to this
    /// input.
    ///
    /// `hash_data` is the hash160 of the signing key's public key; the
    /// P2PKH variant uses it to decide whether the key matches the
    /// spent output.
    pub fn get_signatures(
        &self,
        tx: &Transaction,
        key: &PrivateKey,
        input_index: usize,
        sighash_type: u32,
        hash_data: &[u8; 20],
        alg: SigningAlgorithm,
    ) -> Result<Vec<TransactionSignature>, TransactionError> {
        let Some(output) = &self.output else {
            return Ok(Vec::new());
        };
        let Some(subscript) = self.signing_subscript() else {
            return Ok(Vec::new());
        };
        let satoshis = output.satoshis;
        let signer_key = key.public_key();

        let matching_keys: Vec<PublicKey> = match &self.variant {
            InputVariant::Raw => Vec::new(),
            InputVariant::PublicKeyHash { .. } => {
                match output.script.public_key_hash() {
                    Ok(pkh) if pkh == *hash_data => vec![signer_key],
                    _ => Vec::new(),
                }
            }
            InputVariant::PublicKey { public_key, .. } => {
                if *public_key == signer_key {
                    vec![signer_key]
                } else {
                    Vec::new()
                }
            }
            InputVariant::MultiSig(state) | InputVariant::MultiSigScriptHash(state) => state
                .public_keys()
                .iter()
                .filter(|k| **k == signer_key)
                .cloned()
                .collect(),
            InputVariant::Escrow(state) => {
                if *state.reclaim_key() == signer_key {
                    vec![signer_key]
                } else {
                    Vec::new()
                }
            }
        };

        let mut signatures = Vec::with_capacity(matching_keys.len());
        for public_key in matching_keys {
            let sig_bytes =
                sighash::sign(tx, key, input_index, sighash_type, &subscript, satoshis, alg)?;
            signatures.push(TransactionSignature {
                input_index,
                sighash_type,
                public_key,
                signature: sig_bytes,
            });
        }
        Ok(signatures)
    }

    /// Store a signature that has already been validated and rebuild
    /// the unlocking script from the variant state.
    pub fn accept_signature(
        &mut self,
        sig: TransactionSignature,
        _alg: SigningAlgorithm,
    ) -> Result<(), TransactionError> {
        match &mut self.variant {
            InputVariant::Raw => {
                return Err(TransactionError::UnableToVerifySignature);
            }
            InputVariant::PublicKeyHash { signature } => {
                let mut script = Script::new();
                script.append_push_data(&sig.to_push_bytes())?;
                script.append_push_data(&sig.public_key.to_compressed())?;
                *signature = Some(sig);
                self.script = script;
            }
            InputVariant::PublicKey { signature, .. } => {
                let mut script = Script::new();
                script.append_push_data(&sig.to_push_bytes())?;
                *signature = Some(sig);
                self.script = script;
            }
            InputVariant::MultiSig(state) | InputVariant::MultiSigScriptHash(state) => {
                state.set_signature(sig)?;
                self.script = state.build_unlocking_script()?;
            }
            InputVariant::Escrow(state) => {
                state.set_signature(sig);
                self.script = state.build_unlocking_script()?;
            }
        }
        Ok(())
    }

    /// Drop all signatures and reset the unlocking script.
    pub fn clear_signatures(&mut self) {
        match &mut self.variant {
            InputVariant::Raw => return,
            InputVariant::PublicKeyHash { signature } => *signature = None,
            InputVariant::PublicKey { signature, .. } => *signature = None,
            InputVariant::MultiSig(state) | InputVariant::MultiSigScriptHash(state) => {
                state.clear()
            }
            InputVariant::Escrow(state) => state.clear(),
        }
        self.script = Script::new();
    }

    /// Whether this input has all the signatures it needs.
    ///
    /// `None` means the question cannot be answered because the script
    /// template is unrecognized.
    pub fn is_fully_signed(&self) -> Option<bool> {
        match &self.variant {
            InputVariant::Raw => None,
            InputVariant::PublicKeyHash { signature } => Some(signature.is_some()),
            InputVariant::PublicKey { signature, .. } => Some(signature.is_some()),
            InputVariant::MultiSig(state) | InputVariant::MultiSigScriptHash(state) => {
                Some(state.is_fully_signed())
            }
            InputVariant::Escrow(state) => Some(state.is_fully_signed()),
        }
    }

    /// Check a signature against this input's digest.
    ///
    /// `None` means the question cannot be answered (unrecognized
    /// template); `Some(false)` covers both an invalid signature and a
    /// missing spent output.
    pub fn is_valid_signature(&self, tx: &Transaction, sig: &TransactionSignature) -> Option<bool> {
        if matches!(self.variant, InputVariant::Raw) {
            return None;
        }
        let Some(output) = &self.output else {
            return Some(false);
        };
        let Some(subscript) = self.signing_subscript() else {
            return Some(false);
        };
        Some(sighash::verify(
            tx,
            &sig.signature,
            &sig.public_key,
            sig.input_index,
            &subscript,
            output.satoshis,
            sig.sighash_type,
        ))
    }
}

/// Serialized size of a minimal push of `len` bytes.
fn push_len(len: usize) -> usize {
    push_data_prefix(len).map_or(1, |p| p.len()) + len
}
