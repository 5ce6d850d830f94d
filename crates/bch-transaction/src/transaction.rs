//! Core transaction type: a mutable builder over inputs and outputs
//! with fee solving, change management, signature orchestration, and
//! wire serialization.
//!
//! The builder keeps one loop invariant: every structural mutation
//! funnels through the change-recompute, which first clears all input
//! signatures (the digests they commit to are stale) and then re-solves
//! the change output against the current fee policy.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::fmt;

use bch_primitives::ec::{PrivateKey, PublicKey, SigningAlgorithm};
use bch_primitives::hash::{hash160, sha256d};
use bch_primitives::util::{varint_prefixed_len, TxReader, TxWriter, VarInt};
use bch_script::{Address, Script};
use num_bigint::BigUint;

use crate::input::{Input, TransactionSignature, DEFAULT_LOCKTIME_SEQNUMBER, DEFAULT_SEQNUMBER};
use crate::output::Output;
use crate::sighash::SIGHASH_ALL_FORKID;
use crate::token::{Capability, MAX_TOKEN_AMOUNT};
use crate::unspent::UnspentOutput;
use crate::TransactionError;

// -----------------------------------------------------------------------
// Protocol constants
// -----------------------------------------------------------------------

/// The transaction version new transactions are created with.
pub const CURRENT_VERSION: i32 = 2;

/// The default lock time (no lock).
pub const DEFAULT_NLOCKTIME: u32 = 0;

/// Maximum serialized transaction size in bytes.
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// Below this value an output is considered dust.
pub const DUST_AMOUNT: u64 = 546;

/// Margin factor between the estimated fee and the largest/smallest
/// fee the safe serializer accepts.
pub const FEE_SECURITY_MARGIN: u64 = 150;

/// Largest representable number of satoshis.
pub const MAX_MONEY: u64 = 21_000_000_000_000_000;

/// Lock times below this value are block heights; at or above it they
/// are UNIX timestamps.
pub const NLOCKTIME_BLOCKHEIGHT_LIMIT: u32 = 500_000_000;

/// Largest representable lock time.
pub const NLOCKTIME_MAX_VALUE: u64 = 4_294_967_295;

/// Default fee rate in satoshis per 1000 bytes.
pub const FEE_PER_KB: u64 = 100_000;

/// Worst-case serialized size of a change output (value + varint + a
/// P2SH/P2PKH-sized script with headroom).
pub const CHANGE_OUTPUT_MAX_SIZE: usize = 62;

/// Serialized overhead outside inputs and outputs: version, the two
/// worst-case count varints, and the lock time.
pub const MAXIMUM_EXTRA_SIZE: usize = 4 + 9 + 9 + 4;

/// Classification of a non-zero lock time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockTime {
    /// The transaction unlocks at this block height.
    BlockHeight(u32),
    /// The transaction unlocks at this UNIX timestamp.
    Timestamp(u32),
}

/// Gate switches for the safe serializer. Every flag defaults to off
/// (all checks run); `disable_all` bypasses the gate entirely.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerializeOpts {
    /// Skip every check.
    pub disable_all: bool,
    /// Allow outputs to exceed inputs.
    pub disable_more_output_than_input: bool,
    /// Skip the large-fee bound.
    pub disable_large_fees: bool,
    /// Skip the small-fee bound.
    pub disable_small_fees: bool,
    /// Allow dust outputs.
    pub disable_dust_outputs: bool,
    /// Allow missing signatures.
    pub disable_is_fully_signed: bool,
}

impl SerializeOpts {
    /// Options that bypass the gate entirely.
    pub fn unchecked() -> Self {
        SerializeOpts {
            disable_all: true,
            ..Default::default()
        }
    }
}

// -----------------------------------------------------------------------
// Transaction
// -----------------------------------------------------------------------

/// A Bitcoin Cash transaction under construction or parsed from the
/// wire.
///
/// # Wire format
///
/// | Field        | Size                 |
/// |--------------|----------------------|
/// | version      | 4 bytes (LE, signed) |
/// | input count  | VarInt               |
/// | inputs       | variable             |
/// | output count | VarInt               |
/// | outputs      | variable             |
/// | nLockTime    | 4 bytes (LE)         |
#[derive(Clone, Debug)]
pub struct Transaction {
    pub(crate) version: i32,
    pub(crate) inputs: Vec<Input>,
    pub(crate) outputs: Vec<Output>,
    pub(crate) n_lock_time: u32,

    pub(crate) change_script: Option<Script>,
    pub(crate) change_index: Option<usize>,
    pub(crate) fee: Option<u64>,
    pub(crate) fee_per_kb: Option<u64>,
    pub(crate) fee_per_byte: Option<u64>,

    // Memoized sums; single-threaded by construction, invalidated on
    // every structural mutation.
    pub(crate) input_amount_cache: Cell<Option<u64>>,
    pub(crate) output_amount_cache: Cell<Option<u64>>,
}

impl Transaction {
    /// Create a new empty transaction with the current version and no
    /// lock time.
    pub fn new() -> Self {
        Transaction {
            version: CURRENT_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            n_lock_time: DEFAULT_NLOCKTIME,
            change_script: None,
            change_index: None,
            fee: None,
            fee_per_kb: None,
            fee_per_byte: None,
            input_amount_cache: Cell::new(None),
            output_amount_cache: Cell::new(None),
        }
    }

    // -----------------------------------------------------------------
    // Deserialization
    // -----------------------------------------------------------------

    /// Parse a transaction from a hex-encoded string.
    pub fn from_hex(hex_str: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| TransactionError::SerializationError(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Parse a transaction from raw bytes.
    ///
    /// The slice must contain exactly one complete transaction with no
    /// trailing data.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = TxReader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        if !reader.is_empty() {
            return Err(TransactionError::SerializationError(format!(
                "trailing {} bytes after transaction",
                reader.remaining()
            )));
        }
        Ok(tx)
    }

    /// Deserialize a transaction from a `TxReader`.
    ///
    /// Fails with `NoData` when the reader is already exhausted.
    pub fn read_from(reader: &mut TxReader) -> Result<Self, TransactionError> {
        if reader.is_empty() {
            return Err(TransactionError::NoData);
        }

        let version = reader.read_i32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading version: {}", e))
        })?;

        let input_count = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading input count: {}", e))
        })?;
        let mut inputs = Vec::with_capacity(input_count.value().min(1024) as usize);
        for _ in 0..input_count.value() {
            inputs.push(Input::read_from(reader)?);
        }

        let output_count = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading output count: {}", e))
        })?;
        let mut outputs = Vec::with_capacity(output_count.value().min(1024) as usize);
        for _ in 0..output_count.value() {
            outputs.push(Output::read_from(reader)?);
        }

        let n_lock_time = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading lock time: {}", e))
        })?;

        let mut tx = Transaction::new();
        tx.version = version;
        tx.inputs = inputs;
        tx.outputs = outputs;
        tx.n_lock_time = n_lock_time;
        Ok(tx)
    }

    // -----------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------

    /// Serialize this transaction to raw wire bytes without any checks.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = TxWriter::with_capacity(256);
        writer.write_i32_le(self.version);

        writer.write_varint(VarInt::from(self.inputs.len()));
        for input in &self.inputs {
            input.write_to(&mut writer);
        }

        writer.write_varint(VarInt::from(self.outputs.len()));
        for output in &self.outputs {
            output.write_to(&mut writer);
        }

        writer.write_u32_le(self.n_lock_time);
        writer.into_bytes()
    }

    /// Serialize to lowercase hex without any checks.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Serialize to hex after running every gate check.
    pub fn serialize(&self) -> Result<String, TransactionError> {
        self.serialize_with(&SerializeOpts::default())
    }

    /// Serialize to hex, bypassing the gate entirely.
    pub fn serialize_unchecked(&self) -> String {
        self.to_hex()
    }

    /// Serialize to hex with selected gate checks disabled.
    pub fn serialize_with(&self, opts: &SerializeOpts) -> Result<String, TransactionError> {
        match self.get_serialization_error(opts) {
            Some(err) => Err(err),
            None => Ok(self.to_hex()),
        }
    }

    /// Run the serialization gate and return the first failure, if any.
    ///
    /// Checks run in order: output values, output-vs-input totals, fee
    /// bounds, dust outputs, signature completeness.
    pub fn get_serialization_error(&self, opts: &SerializeOpts) -> Option<TransactionError> {
        if opts.disable_all {
            return None;
        }

        for (index, output) in self.outputs.iter().enumerate() {
            if !output.has_valid_satoshis() {
                return Some(TransactionError::InvalidSatoshis {
                    index,
                    satoshis: output.satoshis,
                });
            }
        }

        let unspent = self.unspent_value();
        if !opts.disable_more_output_than_input && unspent < 0 {
            return Some(TransactionError::InvalidOutputAmountSum);
        }

        if let Some(err) = self.fee_error(opts, unspent) {
            return Some(err);
        }

        if !opts.disable_dust_outputs {
            for (index, output) in self.outputs.iter().enumerate() {
                if output.satoshis < DUST_AMOUNT && !output.script.is_data_out() {
                    return Some(TransactionError::DustOutputs(index));
                }
            }
        }

        if !opts.disable_is_fully_signed {
            match self.is_fully_signed() {
                Err(err) => return Some(err),
                Ok(false) => return Some(TransactionError::MissingSignatures),
                Ok(true) => {}
            }
        }

        None
    }

    fn fee_error(&self, opts: &SerializeOpts, unspent: i128) -> Option<TransactionError> {
        if let Some(fee) = self.fee {
            if unspent != fee as i128 {
                return Some(TransactionError::FeeDifferent {
                    fee,
                    unspent: unspent.max(0) as u64,
                });
            }
            return None;
        }

        if !opts.disable_large_fees {
            let maximum = FEE_SECURITY_MARGIN * self.estimate_fee();
            if unspent > maximum as i128 {
                if self.change_script.is_none() {
                    return Some(TransactionError::ChangeAddressMissing);
                }
                return Some(TransactionError::FeeTooLarge {
                    fee: unspent.max(0) as u64,
                    maximum,
                });
            }
        }

        if !opts.disable_small_fees {
            let minimum = self.estimate_fee().div_ceil(FEE_SECURITY_MARGIN);
            if unspent < minimum as i128 {
                return Some(TransactionError::FeeTooSmall {
                    fee: unspent.max(0) as u64,
                    minimum,
                });
            }
        }

        None
    }

    // -----------------------------------------------------------------
    // Transaction id
    // -----------------------------------------------------------------

    /// The transaction id: double SHA-256 of the serialized bytes, in
    /// internal (little-endian) order.
    pub fn tx_id(&self) -> [u8; 32] {
        sha256d(&self.to_bytes())
    }

    /// The transaction id as displayed: byte-reversed hex.
    pub fn tx_id_hex(&self) -> String {
        let mut id = self.tx_id();
        id.reverse();
        hex::encode(id)
    }

    /// The serialized size in bytes.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    /// The transaction version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Set the version; only versions 1..=CURRENT_VERSION are accepted.
    pub fn set_version(&mut self, version: i32) -> Result<&mut Self, TransactionError> {
        if version < 1 || version > CURRENT_VERSION {
            return Err(TransactionError::InvalidArgument(format!(
                "version must be between 1 and {}, got {}",
                CURRENT_VERSION, version
            )));
        }
        self.version = version;
        Ok(self)
    }

    /// The raw nLockTime value.
    pub fn n_lock_time(&self) -> u32 {
        self.n_lock_time
    }

    /// The ordered inputs.
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    /// The ordered outputs.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// The input at `index`, or an `InvalidIndex` error.
    pub fn input_at(&self, index: usize) -> Result<&Input, TransactionError> {
        self.inputs.get(index).ok_or(TransactionError::InvalidIndex {
            index,
            length: self.inputs.len(),
        })
    }

    /// The output at `index`, or an `InvalidIndex` error.
    pub fn output_at(&self, index: usize) -> Result<&Output, TransactionError> {
        self.outputs.get(index).ok_or(TransactionError::InvalidIndex {
            index,
            length: self.outputs.len(),
        })
    }

    /// The index of the change output, when one exists.
    pub fn change_index(&self) -> Option<usize> {
        self.change_index
    }

    /// The configured change script, if any.
    pub fn change_script(&self) -> Option<&Script> {
        self.change_script.as_ref()
    }

    /// The current change output, when one exists.
    pub fn change_output(&self) -> Option<&Output> {
        self.change_index.and_then(|i| self.outputs.get(i))
    }

    /// Sum of attached input values. Inputs without an attached output
    /// contribute zero.
    pub fn input_amount(&self) -> u64 {
        if let Some(cached) = self.input_amount_cache.get() {
            return cached;
        }
        let sum = self
            .inputs
            .iter()
            .filter_map(|i| i.output().map(|o| o.satoshis))
            .sum();
        self.input_amount_cache.set(Some(sum));
        sum
    }

    /// Sum of output values.
    pub fn output_amount(&self) -> u64 {
        if let Some(cached) = self.output_amount_cache.get() {
            return cached;
        }
        let sum = self.outputs.iter().map(|o| o.satoshis).sum();
        self.output_amount_cache.set(Some(sum));
        sum
    }

    /// Inputs minus outputs, signed.
    pub fn unspent_value(&self) -> i128 {
        self.input_amount() as i128 - self.output_amount() as i128
    }

    fn invalidate_caches(&self) {
        self.input_amount_cache.set(None);
        self.output_amount_cache.set(None);
    }

    // -----------------------------------------------------------------
    // Coinbase
    // -----------------------------------------------------------------

    /// Whether this is a coinbase transaction: exactly one input and it
    /// is null.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_null()
    }

    // -----------------------------------------------------------------
    // Builder surface: inputs
    // -----------------------------------------------------------------

    /// Spend a coin. Selects an input template from the descriptor's
    /// script shape; duplicate outpoints are silently ignored.
    pub fn spend(&mut self, utxo: &UnspentOutput) -> Result<&mut Self, TransactionError> {
        if !self.has_input(&utxo.tx_id, utxo.output_index) {
            let input = Input::from_utxo(utxo)?;
            self.inputs.push(input);
        }
        self.update_change_output();
        Ok(self)
    }

    /// Spend several coins at once.
    pub fn spend_many(&mut self, utxos: &[UnspentOutput]) -> Result<&mut Self, TransactionError> {
        for utxo in utxos {
            if !self.has_input(&utxo.tx_id, utxo.output_index) {
                let input = Input::from_utxo(utxo)?;
                self.inputs.push(input);
            }
        }
        self.update_change_output();
        Ok(self)
    }

    /// Spend a multisig coin (bare or P2SH-wrapped) with an explicit
    /// key set and threshold.
    pub fn spend_multisig(
        &mut self,
        utxo: &UnspentOutput,
        public_keys: Vec<PublicKey>,
        threshold: usize,
    ) -> Result<&mut Self, TransactionError> {
        if !self.has_input(&utxo.tx_id, utxo.output_index) {
            let input = Input::from_utxo_multisig(utxo, public_keys, threshold)?;
            self.inputs.push(input);
        }
        self.update_change_output();
        Ok(self)
    }

    fn has_input(&self, tx_id: &[u8; 32], output_index: u32) -> bool {
        self.inputs
            .iter()
            .any(|i| i.prev_tx_id == *tx_id && i.output_index == output_index)
    }

    /// Add a pre-built input. The input must carry the output it
    /// spends, and that output's value must be within range.
    pub fn add_input(&mut self, input: Input) -> Result<&mut Self, TransactionError> {
        let Some(output) = input.output() else {
            return Err(TransactionError::MissingUtxoInfo(self.inputs.len()));
        };
        if !output.has_valid_satoshis() {
            return Err(TransactionError::InvalidSatoshis {
                index: self.inputs.len(),
                satoshis: output.satoshis,
            });
        }
        Ok(self.add_input_unchecked(input))
    }

    /// Add a pre-built input without requiring its spent output.
    pub fn add_input_unchecked(&mut self, input: Input) -> &mut Self {
        self.inputs.push(input);
        self.update_change_output();
        self
    }

    /// Remove the input at `index`.
    pub fn remove_input_at(&mut self, index: usize) -> Result<&mut Self, TransactionError> {
        if index >= self.inputs.len() {
            return Err(TransactionError::InvalidIndex {
                index,
                length: self.inputs.len(),
            });
        }
        self.inputs.remove(index);
        self.update_change_output();
        Ok(self)
    }

    /// Remove the input spending the given outpoint.
    pub fn remove_input_by_outpoint(
        &mut self,
        tx_id: &[u8; 32],
        output_index: u32,
    ) -> Result<&mut Self, TransactionError> {
        let position = self
            .inputs
            .iter()
            .position(|i| i.prev_tx_id == *tx_id && i.output_index == output_index)
            .ok_or_else(|| {
                TransactionError::InvalidArgument(format!(
                    "no input spends outpoint {}:{}",
                    hex::encode(tx_id),
                    output_index
                ))
            })?;
        self.inputs.remove(position);
        self.update_change_output();
        Ok(self)
    }

    /// Replace existing inputs matching each descriptor's outpoint with
    /// a freshly built input.
    ///
    /// Returns, per descriptor, the index of the replaced input, or
    /// `None` when no input spends that outpoint.
    pub fn associate_inputs(
        &mut self,
        utxos: &[UnspentOutput],
    ) -> Result<Vec<Option<usize>>, TransactionError> {
        let mut indexes = Vec::with_capacity(utxos.len());
        for utxo in utxos {
            let position = self
                .inputs
                .iter()
                .position(|i| i.prev_tx_id == utxo.tx_id && i.output_index == utxo.output_index);
            if let Some(idx) = position {
                self.inputs[idx] = Input::from_utxo(utxo)?;
            }
            indexes.push(position);
        }
        self.update_change_output();
        Ok(indexes)
    }

    // -----------------------------------------------------------------
    // Builder surface: outputs
    // -----------------------------------------------------------------

    /// Append an output paying `satoshis` to an address.
    pub fn to_address(&mut self, address: &Address, satoshis: u64) -> &mut Self {
        self.outputs
            .push(Output::new(satoshis, Script::pay_to_address(address)));
        self.update_change_output();
        self
    }

    /// Append a zero-value OP_RETURN output carrying `data`.
    pub fn add_data(&mut self, data: &[u8]) -> Result<&mut Self, TransactionError> {
        let script = Script::data_out(data)?;
        self.outputs.push(Output::new(0, script));
        self.update_change_output();
        Ok(self)
    }

    /// Append a pre-built output.
    pub fn add_output(&mut self, output: Output) -> &mut Self {
        self.outputs.push(output);
        self.update_change_output();
        self
    }

    /// Append a P2SH escrow output for a ZCE-secured payment.
    ///
    /// The escrow redeem script is derived from the payment's input
    /// public keys and the reclaim key. When no change script is set,
    /// any explicit fee is dropped so the escrow value does not break
    /// fee accounting.
    pub fn escrow(
        &mut self,
        input_keys: &[PublicKey],
        reclaim_key: &PublicKey,
        satoshis: u64,
    ) -> Result<&mut Self, TransactionError> {
        let redeem = Script::escrow_redeem_script(input_keys, reclaim_key)?;
        let script = Script::pay_to_script_hash(&hash160(redeem.as_bytes()));
        self.outputs.push(Output::new(satoshis, script));
        if self.change_script.is_none() {
            self.fee = None;
        }
        self.update_change_output();
        Ok(self)
    }

    /// Remove every output, including the change output.
    pub fn clear_outputs(&mut self) -> &mut Self {
        self.outputs.clear();
        self.change_index = None;
        self.update_change_output();
        self
    }

    /// Remove the output at `index`.
    pub fn remove_output(&mut self, index: usize) -> Result<&mut Self, TransactionError> {
        if index >= self.outputs.len() {
            return Err(TransactionError::InvalidIndex {
                index,
                length: self.outputs.len(),
            });
        }
        self.outputs.remove(index);
        // Keep the change back-reference pointing at the same element.
        self.change_index = match self.change_index {
            Some(ci) if ci == index => None,
            Some(ci) if ci > index => Some(ci - 1),
            other => other,
        };
        self.update_change_output();
        Ok(self)
    }

    // -----------------------------------------------------------------
    // Builder surface: change and fee policy
    // -----------------------------------------------------------------

    /// Route any surplus above the fee to this address.
    pub fn change(&mut self, address: &Address) -> &mut Self {
        self.change_script = Some(Script::pay_to_address(address));
        self.update_change_output();
        self
    }

    /// Set an explicit absolute fee.
    pub fn fee(&mut self, satoshis: u64) -> &mut Self {
        self.fee = Some(satoshis);
        self.update_change_output();
        self
    }

    /// Set the fee rate in satoshis per 1000 bytes.
    pub fn fee_per_kb(&mut self, rate: u64) -> &mut Self {
        self.fee_per_kb = Some(rate);
        self.update_change_output();
        self
    }

    /// Set the fee rate in satoshis per byte. Ignored when a per-kb
    /// rate is set.
    pub fn fee_per_byte(&mut self, rate: u64) -> &mut Self {
        self.fee_per_byte = Some(rate);
        self.update_change_output();
        self
    }

    // -----------------------------------------------------------------
    // Change & fee solver
    // -----------------------------------------------------------------

    /// Re-solve the change output after a mutation.
    ///
    /// Clears all signatures (the digest domain changed), removes any
    /// previous change output, and appends a fresh one when the surplus
    /// clears the dust threshold; otherwise the surplus is left to the
    /// fee.
    fn update_change_output(&mut self) {
        self.invalidate_caches();
        self.clear_signatures();

        let Some(change_script) = self.change_script.clone() else {
            return;
        };

        if let Some(index) = self.change_index.take() {
            if index < self.outputs.len() {
                self.outputs.remove(index);
            }
            self.invalidate_caches();
        }

        let available = self.unspent_value();
        if available <= 0 {
            return;
        }

        let fee = match self.fee {
            Some(fee) => fee,
            None => self.estimate_fee(),
        };

        let Some(change) = (available as u64).checked_sub(fee) else {
            return;
        };
        if change >= DUST_AMOUNT {
            self.outputs.push(Output::new(change, change_script));
            self.change_index = Some(self.outputs.len() - 1);
            self.invalidate_caches();
        }
    }

    /// Estimate the fee for the builder's current shape.
    ///
    /// Uses each input's worst-case signed size. When a change script
    /// is set and the available surplus can cover a change output, the
    /// estimate includes the change output's serialized size.
    pub fn estimate_fee(&self) -> u64 {
        let estimated_size = self.estimate_size();
        let fee_no_change = self.fee_for_size(estimated_size);

        let Some(change_script) = &self.change_script else {
            return fee_no_change;
        };

        let change_output_size = 8 + varint_prefixed_len(change_script.len());
        let fee_with_change = self.fee_for_size(estimated_size + change_output_size);

        if self.unspent_value() <= fee_with_change as i128 {
            fee_no_change
        } else {
            fee_with_change
        }
    }

    /// Estimate the serialized size of the transaction once signed,
    /// using each input variant's worst case.
    pub fn estimate_size(&self) -> usize {
        let inputs: usize = self.inputs.iter().map(|i| i.estimated_size()).sum();
        let outputs: usize = self.outputs.iter().map(|o| o.size()).sum();
        MAXIMUM_EXTRA_SIZE + inputs + outputs
    }

    /// ceil(size * rate) for the active fee policy.
    fn fee_for_size(&self, size: usize) -> u64 {
        if let Some(rate) = self.fee_per_byte {
            return size as u64 * rate;
        }
        let rate = self.fee_per_kb.unwrap_or(FEE_PER_KB);
        (size as u64 * rate).div_ceil(1000)
    }

    /// The fee this transaction pays.
    ///
    /// Zero for coinbase; the explicit fee when set; the whole surplus
    /// when no change output exists (either no change script is
    /// configured, or the surplus fell below dust); the estimate
    /// otherwise.
    pub fn get_fee(&self) -> u64 {
        if self.is_coinbase() {
            return 0;
        }
        if let Some(fee) = self.fee {
            return fee;
        }
        if self.change_index.is_none() {
            return self.unspent_value().max(0) as u64;
        }
        self.estimate_fee()
    }

    // -----------------------------------------------------------------
    // Lock time
    // -----------------------------------------------------------------

    /// Lock the transaction until a UNIX timestamp.
    ///
    /// Timestamps below the block-height threshold are rejected: they
    /// would be interpreted as block heights by the network.
    pub fn lock_until_timestamp(&mut self, timestamp: u64) -> Result<&mut Self, TransactionError> {
        if timestamp < NLOCKTIME_BLOCKHEIGHT_LIMIT as u64 {
            return Err(TransactionError::LockTimeTooEarly(timestamp));
        }
        if timestamp > NLOCKTIME_MAX_VALUE {
            return Err(TransactionError::NLockTimeOutOfRange(timestamp));
        }
        self.enable_lock_time(timestamp as u32);
        Ok(self)
    }

    /// Lock the transaction until a block height.
    pub fn lock_until_block_height(&mut self, height: u32) -> Result<&mut Self, TransactionError> {
        if height >= NLOCKTIME_BLOCKHEIGHT_LIMIT {
            return Err(TransactionError::BlockHeightTooHigh(height as u64));
        }
        self.enable_lock_time(height);
        Ok(self)
    }

    fn enable_lock_time(&mut self, lock_time: u32) {
        // Inputs still carrying the default sequence would disable the
        // lock; move them to the locktime-enabling sequence.
        for input in &mut self.inputs {
            if input.sequence_number == DEFAULT_SEQNUMBER {
                input.sequence_number = DEFAULT_LOCKTIME_SEQNUMBER;
            }
        }
        self.n_lock_time = lock_time;
    }

    /// Classify the lock time: `None` when unset, a block height below
    /// the threshold, a timestamp at or above it.
    pub fn lock_time(&self) -> Option<LockTime> {
        if self.n_lock_time == 0 {
            return None;
        }
        if self.n_lock_time < NLOCKTIME_BLOCKHEIGHT_LIMIT {
            Some(LockTime::BlockHeight(self.n_lock_time))
        } else {
            Some(LockTime::Timestamp(self.n_lock_time))
        }
    }

    // -----------------------------------------------------------------
    // Signing
    // -----------------------------------------------------------------

    /// Sign every input this key can sign, with the default sighash
    /// type (ALL | FORKID) and ECDSA.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<&mut Self, TransactionError> {
        self.sign_with(std::slice::from_ref(key), None, SigningAlgorithm::Ecdsa)
    }

    /// Sign with one or more keys, an optional sighash type, and a
    /// signature algorithm.
    ///
    /// Every input must carry the output it spends; signing cannot
    /// compute digests otherwise.
    pub fn sign_with(
        &mut self,
        keys: &[PrivateKey],
        sighash_type: Option<u32>,
        alg: SigningAlgorithm,
    ) -> Result<&mut Self, TransactionError> {
        for (index, input) in self.inputs.iter().enumerate() {
            if input.output().is_none() {
                return Err(TransactionError::MissingUtxoInfo(index));
            }
        }

        let sighash_type = sighash_type.unwrap_or(SIGHASH_ALL_FORKID);
        let mut signatures = Vec::new();
        for key in keys {
            let hash_data = key.public_key().hash160();
            for index in 0..self.inputs.len() {
                signatures.extend(self.inputs[index].get_signatures(
                    self,
                    key,
                    index,
                    sighash_type,
                    &hash_data,
                    alg,
                )?);
            }
        }

        for signature in signatures {
            self.apply_signature(signature, alg)?;
        }
        Ok(self)
    }

    /// Apply one signature to its input, validating it first.
    pub fn apply_signature(
        &mut self,
        signature: TransactionSignature,
        alg: SigningAlgorithm,
    ) -> Result<&mut Self, TransactionError> {
        let index = signature.input_index;
        if index >= self.inputs.len() {
            return Err(TransactionError::InvalidIndex {
                index,
                length: self.inputs.len(),
            });
        }

        match self.inputs[index].is_valid_signature(self, &signature) {
            None => return Err(TransactionError::UnableToVerifySignature),
            Some(false) => {
                return Err(TransactionError::InvalidArgument(
                    "signature does not verify against its input".to_string(),
                ))
            }
            Some(true) => {}
        }

        self.inputs[index].accept_signature(signature, alg)?;
        self.invalidate_caches();
        Ok(self)
    }

    /// Whether every input is fully signed.
    ///
    /// Inputs whose script template is unrecognized make the question
    /// unanswerable and surface as `UnableToVerifySignature`.
    pub fn is_fully_signed(&self) -> Result<bool, TransactionError> {
        let mut all = true;
        for input in &self.inputs {
            match input.is_fully_signed() {
                None => return Err(TransactionError::UnableToVerifySignature),
                Some(signed) => all &= signed,
            }
        }
        Ok(all)
    }

    /// Check a signature against the input it names.
    pub fn verify_signature(
        &self,
        signature: &TransactionSignature,
    ) -> Result<bool, TransactionError> {
        let input = self.input_at(signature.input_index)?;
        match input.is_valid_signature(self, signature) {
            None => Err(TransactionError::UnableToVerifySignature),
            Some(valid) => Ok(valid),
        }
    }

    /// Drop all signatures from every input.
    pub fn clear_signatures(&mut self) {
        for input in &mut self.inputs {
            input.clear_signatures();
        }
    }

    // -----------------------------------------------------------------
    // BIP-69 deterministic ordering
    // -----------------------------------------------------------------

    /// Sort inputs and outputs into the BIP-69 deterministic order.
    ///
    /// Inputs order by display-order txid bytes then output index;
    /// outputs order by value then script bytes. Both sorts are stable,
    /// so equal keys keep their original relative position.
    pub fn sort(&mut self) -> Result<&mut Self, TransactionError> {
        self.sort_outputs(|outputs| {
            let mut sorted = outputs.to_vec();
            sorted.sort_by(|a, b| {
                a.satoshis
                    .cmp(&b.satoshis)
                    .then_with(|| a.script.as_bytes().cmp(b.script.as_bytes()))
            });
            sorted
        })?;
        self.sort_inputs(|inputs| {
            let mut sorted = inputs.to_vec();
            sorted.sort_by(|a, b| {
                let a_id = reversed(&a.prev_tx_id);
                let b_id = reversed(&b.prev_tx_id);
                a_id.cmp(&b_id)
                    .then_with(|| a.output_index.cmp(&b.output_index))
            });
            sorted
        })
    }

    /// Reorder inputs with a caller-supplied function.
    ///
    /// The function must return a permutation of the same elements;
    /// anything else is an `InvalidSorting` error. Reordering clears
    /// all signatures.
    pub fn sort_inputs<F>(&mut self, f: F) -> Result<&mut Self, TransactionError>
    where
        F: FnOnce(&[Input]) -> Vec<Input>,
    {
        let sorted = f(&self.inputs);
        let before: Vec<Vec<u8>> = self.inputs.iter().map(|i| i.to_bytes()).collect();
        let after: Vec<Vec<u8>> = sorted.iter().map(|i| i.to_bytes()).collect();
        if !is_permutation(&before, &after) {
            return Err(TransactionError::InvalidSorting);
        }
        self.inputs = sorted;
        self.clear_signatures();
        self.invalidate_caches();
        Ok(self)
    }

    /// Reorder outputs with a caller-supplied function.
    ///
    /// The function must return a permutation of the same elements.
    /// The change index is rebound to follow the moved change output,
    /// and all signatures are cleared (output order is part of every
    /// signature's digest).
    pub fn sort_outputs<F>(&mut self, f: F) -> Result<&mut Self, TransactionError>
    where
        F: FnOnce(&[Output]) -> Vec<Output>,
    {
        let sorted = f(&self.outputs);
        let before: Vec<Vec<u8>> = self.outputs.iter().map(|o| o.to_bytes()).collect();
        let after: Vec<Vec<u8>> = sorted.iter().map(|o| o.to_bytes()).collect();
        if !is_permutation(&before, &after) {
            return Err(TransactionError::InvalidSorting);
        }

        let change_bytes = self.change_index.map(|i| before[i].clone());
        self.outputs = sorted;
        if let Some(bytes) = change_bytes {
            self.change_index = after.iter().position(|b| *b == bytes);
        }
        self.clear_signatures();
        self.invalidate_caches();
        Ok(self)
    }

    // -----------------------------------------------------------------
    // Sanity verification
    // -----------------------------------------------------------------

    /// Run structural sanity checks.
    ///
    /// Returns a description of the first failure; this is a
    /// diagnostic, not a gate (the safe serializer is the gate).
    pub fn verify(&self) -> Result<(), String> {
        if self.inputs.is_empty() {
            return Err("transaction txins empty".to_string());
        }
        if self.outputs.is_empty() {
            return Err("transaction txouts empty".to_string());
        }

        let mut total: u128 = 0;
        for (index, output) in self.outputs.iter().enumerate() {
            if !output.has_valid_satoshis() {
                return Err(format!("transaction txout {} satoshis is invalid", index));
            }
            total += output.satoshis as u128;
            if total > MAX_MONEY as u128 {
                return Err("transaction txout total greater than MAX_MONEY".to_string());
            }
        }

        if self.size() > MAX_BLOCK_SIZE {
            return Err("transaction over the maximum block size".to_string());
        }

        let mut outpoints = HashSet::new();
        for (index, input) in self.inputs.iter().enumerate() {
            if !outpoints.insert((input.prev_tx_id, input.output_index)) {
                return Err(format!("transaction input {} duplicate input", index));
            }
        }

        if self.is_coinbase() {
            let script_len = self.inputs[0].script().len();
            if script_len < 2 || script_len > 100 {
                return Err("coinbase transaction script size invalid".to_string());
            }
        } else {
            for (index, input) in self.inputs.iter().enumerate() {
                if input.is_null() {
                    return Err(format!("transaction input {} has null input", index));
                }
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------
    // Token category accounting
    // -----------------------------------------------------------------

    /// Validate CashToken category accounting across this transaction.
    ///
    /// For every category appearing in the outputs: fungible amounts
    /// must be covered by inputs of the same category unless the
    /// category is being minted here (an input spends vout 0 of the
    /// category's genesis transaction), and every NFT must descend from
    /// a parent input whose capability permits it.
    pub fn validate_tokens(&self) -> Result<(), TransactionError> {
        let mut categories: HashMap<[u8; 32], Vec<usize>> = HashMap::new();
        for (index, output) in self.outputs.iter().enumerate() {
            if let Some(token) = &output.token_data {
                categories.entry(token.category).or_default().push(index);
            }
        }

        for (category, output_indexes) in categories {
            let category_hex = {
                let mut bytes = category;
                bytes.reverse();
                hex::encode(bytes)
            };

            // Fungible supply entering through inputs of this category.
            let mut input_fungible = BigUint::from(0u64);
            for input in &self.inputs {
                if let Some(token) = input.output().and_then(|o| o.token_data.as_ref()) {
                    if token.category == category {
                        input_fungible += token.amount;
                    }
                }
            }

            // A minting UTXO: an input spending the category's genesis
            // transaction. Token categories are only valid when minted
            // from output zero.
            let minting_input = self.inputs.iter().find(|i| i.prev_tx_id == category);
            if let Some(input) = minting_input {
                if input.output_index != 0 {
                    return Err(TransactionError::TokenValidation(format!(
                        "category {} minting input must spend output 0, spends {}",
                        category_hex, input.output_index
                    )));
                }
            }

            // Parent NFTs available for derivation, keyed by outpoint.
            let mut parents: Vec<(Capability, Vec<u8>)> = self
                .inputs
                .iter()
                .filter_map(|i| i.output().and_then(|o| o.token_data.as_ref()))
                .filter(|t| t.category == category)
                .filter_map(|t| {
                    t.nft
                        .as_ref()
                        .map(|n| (n.capability, n.commitment.clone()))
                })
                .collect();

            let mut minted_amount = BigUint::from(0u64);
            let mut sent_amount = BigUint::from(0u64);

            for &output_index in &output_indexes {
                let Some(token) = self.outputs[output_index].token_data.as_ref() else {
                    continue;
                };

                if minting_input.is_some() {
                    minted_amount += token.amount;
                    continue;
                }

                sent_amount += token.amount;

                if let Some(nft) = &token.nft {
                    let parent_position = parents.iter().position(|(capability, commitment)| {
                        if nft.capability == Capability::None {
                            *commitment == nft.commitment || *capability != Capability::None
                        } else {
                            *capability != Capability::None
                        }
                    });
                    let Some(position) = parent_position else {
                        return Err(TransactionError::TokenValidation(format!(
                            "output {} NFT of category {} has no authorizing parent input",
                            output_index, category_hex
                        )));
                    };
                    // Minting parents may authorize any number of
                    // children; everything else is consumed.
                    if parents[position].0 != Capability::Minting {
                        parents.remove(position);
                    }
                }
            }

            if minted_amount > BigUint::from(MAX_TOKEN_AMOUNT) {
                return Err(TransactionError::TokenValidation(format!(
                    "category {} mints more than the maximum token amount",
                    category_hex
                )));
            }
            if sent_amount > input_fungible {
                return Err(TransactionError::TokenValidation(format!(
                    "category {} sends more fungible tokens than the inputs provide",
                    category_hex
                )));
            }
        }

        Ok(())
    }
}

/// Display-order copy of an internal-order txid.
fn reversed(bytes: &[u8; 32]) -> [u8; 32] {
    let mut out = *bytes;
    out.reverse();
    out
}

/// Whether `b` is a rearrangement of `a` (by serialized form).
fn is_permutation(a: &[Vec<u8>], b: &[Vec<u8>]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut x = a.to_vec();
    let mut y = b.to_vec();
    x.sort();
    y.sort();
    x == y
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Transaction {
    /// Display the transaction as its hex-encoded serialization.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
