//! Escrow input state for ZCE reclaim spends.
//!
//! An escrow input spends the P2SH escrow output of a secured payment.
//! Its redeem script is derived from the payment's input public keys
//! plus the reclaim key, and the unlocking script is exactly three
//! pushes: the reclaim signature, the reclaim public key, and the
//! redeem script.

use bch_primitives::ec::PublicKey;
use bch_script::Script;

use crate::input::TransactionSignature;
use crate::TransactionError;

/// Signing state for an escrow reclaim input.
#[derive(Clone, Debug)]
pub struct EscrowState {
    reclaim_key: PublicKey,
    input_keys: Vec<PublicKey>,
    signature: Option<TransactionSignature>,
}

impl EscrowState {
    /// Create escrow state from the reclaim key and the funding
    /// transaction's input keys.
    pub fn new(reclaim_key: PublicKey, input_keys: Vec<PublicKey>) -> Self {
        EscrowState {
            reclaim_key,
            input_keys,
            signature: None,
        }
    }

    /// The key authorized to reclaim the escrow.
    pub fn reclaim_key(&self) -> &PublicKey {
        &self.reclaim_key
    }

    /// The funding transaction's input keys.
    pub fn input_keys(&self) -> &[PublicKey] {
        &self.input_keys
    }

    /// Derive the escrow redeem script for this key set.
    pub fn redeem_script(&self) -> Result<Script, TransactionError> {
        Ok(Script::escrow_redeem_script(
            &self.input_keys,
            &self.reclaim_key,
        )?)
    }

    /// Whether the reclaim signature has been applied.
    pub fn is_fully_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Store the reclaim signature.
    pub fn set_signature(&mut self, sig: TransactionSignature) {
        self.signature = Some(sig);
    }

    /// Drop the reclaim signature.
    pub fn clear(&mut self) {
        self.signature = None;
    }

    /// Assemble the three-push unlocking script:
    /// `<sig> <reclaim pubkey> <redeem script>`.
    pub fn build_unlocking_script(&self) -> Result<Script, TransactionError> {
        let mut script = Script::new();
        if let Some(sig) = &self.signature {
            script.append_push_data(&sig.to_push_bytes())?;
        }
        script.append_push_data(&self.reclaim_key.to_compressed())?;
        script.append_push_data(self.redeem_script()?.as_bytes())?;
        Ok(script)
    }
}
