//! M-of-N multisignature input state.
//!
//! Shared by the bare multisig variant and the P2SH-wrapped variant;
//! the latter carries the redeem script and appends it to the
//! unlocking script.

use bch_primitives::ec::PublicKey;
use bch_script::opcodes::OP_0;
use bch_script::Script;

use crate::input::TransactionSignature;
use crate::TransactionError;

/// Signing state for a multisig input: the key set, the threshold, and
/// one signature slot per key.
#[derive(Clone, Debug)]
pub struct MultisigState {
    public_keys: Vec<PublicKey>,
    threshold: usize,
    /// Present only for the P2SH-wrapped form.
    redeem_script: Option<Script>,
    /// One slot per public key, in key order.
    signatures: Vec<Option<TransactionSignature>>,
}

impl MultisigState {
    /// State for a bare multisig output.
    pub fn new(public_keys: Vec<PublicKey>, threshold: usize) -> Self {
        let slots = public_keys.len();
        MultisigState {
            public_keys,
            threshold,
            redeem_script: None,
            signatures: vec![None; slots],
        }
    }

    /// State for a P2SH-wrapped multisig output; builds the redeem
    /// script from the key set.
    pub fn new_script_hash(
        public_keys: Vec<PublicKey>,
        threshold: usize,
    ) -> Result<Self, TransactionError> {
        let redeem = Script::multisig_out(&public_keys, threshold)?;
        let slots = public_keys.len();
        Ok(MultisigState {
            public_keys,
            threshold,
            redeem_script: Some(redeem),
            signatures: vec![None; slots],
        })
    }

    /// The public keys, in script order.
    pub fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }

    /// The number of required signatures.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// The redeem script, for the P2SH-wrapped form.
    pub fn redeem_script(&self) -> Option<&Script> {
        self.redeem_script.as_ref()
    }

    /// The number of signatures collected so far.
    pub fn signature_count(&self) -> usize {
        self.signatures.iter().filter(|s| s.is_some()).count()
    }

    /// Whether enough signatures have been collected.
    pub fn is_fully_signed(&self) -> bool {
        self.signature_count() >= self.threshold
    }

    /// Collected signatures in key order.
    pub fn signatures(&self) -> impl Iterator<Item = &TransactionSignature> {
        self.signatures.iter().filter_map(|s| s.as_ref())
    }

    /// Store a signature in the slot of its public key.
    pub fn set_signature(&mut self, sig: TransactionSignature) -> Result<(), TransactionError> {
        let slot = self
            .public_keys
            .iter()
            .position(|k| *k == sig.public_key)
            .ok_or_else(|| {
                TransactionError::InvalidArgument(
                    "signature public key is not part of this multisig".to_string(),
                )
            })?;
        self.signatures[slot] = Some(sig);
        Ok(())
    }

    /// Drop all collected signatures.
    pub fn clear(&mut self) {
        for slot in &mut self.signatures {
            *slot = None;
        }
    }

    /// Assemble the unlocking script from the collected signatures.
    ///
    /// `OP_0 <sig>...` for bare multisig (the leading OP_0 absorbs the
    /// historical CHECKMULTISIG off-by-one), with the redeem script
    /// appended for the P2SH-wrapped form.
    pub fn build_unlocking_script(&self) -> Result<Script, TransactionError> {
        let mut script = Script::new();
        script.append_opcodes(&[OP_0])?;
        for sig in self.signatures() {
            script.append_push_data(&sig.to_push_bytes())?;
        }
        if let Some(redeem) = &self.redeem_script {
            script.append_push_data(redeem.as_bytes())?;
        }
        Ok(script)
    }
}
