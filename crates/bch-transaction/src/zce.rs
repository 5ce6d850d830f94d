//! Zero-Confirmation Escrow (ZCE) secured-payment verification.
//!
//! A ZCE-secured payment carries a P2SH escrow output whose redeem
//! script commits to every input key of the payment plus a reclaim key.
//! A companion reclaim transaction spends the escrow back to the payer;
//! if the payer double-spends, the escrow is forfeit instead. A merchant
//! accepts the payment at zero confirmations when the escrow value,
//! both transactions' fee rates, and the reclaim signature all check
//! out.

use bch_primitives::ec::PublicKey;
use bch_primitives::hash::hash160;
use bch_script::Script;

use crate::sighash::{self, SIGHASH_ALL_FORKID};
use crate::transaction::Transaction;

/// Upper bound on the number of payment inputs a ZCE escrow covers.
pub const ZCE_MAX_INPUTS: usize = 65_536;

/// The sighash-type byte every ZCE signature must end with.
const ZCE_SIGHASH_BYTE: u8 = SIGHASH_ALL_FORKID as u8;

impl Transaction {
    /// Whether this payment is secured by a Zero-Confirmation Escrow.
    ///
    /// `reclaim` is the companion transaction spending the escrow
    /// output; `escrow_amount` is the collateral the merchant requires;
    /// `min_fee_rate` is the floor fee rate (satoshis per byte) both
    /// transactions must clear. All nine conditions must hold:
    ///
    /// 1. This payment has at most `ZCE_MAX_INPUTS` inputs.
    /// 2. Every payment input spends a P2PKH output.
    /// 3. The reclaim's first input references this transaction and an
    ///    existing output (the escrow UTXO).
    /// 4. The escrow value covers `escrow_amount` plus this payment's
    ///    size at `min_fee_rate`.
    /// 5. The reclaim pays at least `min_fee_rate`.
    /// 6. The escrow input's unlocking script is exactly three pushes:
    ///    signature, public key, redeem script.
    /// 7. Every signature (reclaim and payment) uses ALL | FORKID.
    /// 8. The redeem script hash matches both the escrow output and the
    ///    redeem script rebuilt from the payment's input keys plus the
    ///    reclaim key.
    /// 9. The reclaim signature verifies over the escrow UTXO.
    pub fn is_zce_secured(
        &self,
        reclaim: &Transaction,
        escrow_amount: u64,
        min_fee_rate: u64,
    ) -> bool {
        // 1. Input count bound.
        if self.inputs().is_empty() || self.inputs().len() > ZCE_MAX_INPUTS {
            return false;
        }

        // 2. Every payment input spends a P2PKH output.
        for input in self.inputs() {
            match input.output() {
                Some(output) if output.script.is_p2pkh() => {}
                _ => return false,
            }
        }

        // 3. The reclaim's first input must point at an output of this
        // transaction: the escrow UTXO.
        let Some(reclaim_input) = reclaim.inputs().first() else {
            return false;
        };
        if reclaim_input.prev_tx_id != self.tx_id() {
            return false;
        }
        let Some(escrow_utxo) = self.outputs().get(reclaim_input.output_index as usize) else {
            return false;
        };

        // 4. Escrow collateral: the required amount plus this payment's
        // own fee allowance.
        let required = escrow_amount.saturating_add(self.size() as u64 * min_fee_rate);
        if escrow_utxo.satoshis < required {
            return false;
        }

        // 5. The reclaim must pay the floor fee rate. Its first input
        // spends the escrow; any additional inputs contribute what
        // their attached outputs declare.
        let reclaim_inputs_value: u64 = escrow_utxo.satoshis
            + reclaim.inputs()[1..]
                .iter()
                .filter_map(|i| i.output().map(|o| o.satoshis))
                .sum::<u64>();
        let Some(reclaim_fee) = reclaim_inputs_value.checked_sub(reclaim.output_amount()) else {
            return false;
        };
        if reclaim_fee < reclaim.size() as u64 * min_fee_rate {
            return false;
        }

        // 6. The escrow spend is exactly <sig> <pubkey> <redeem>.
        let Ok(chunks) = reclaim_input.script().chunks() else {
            return false;
        };
        if chunks.len() != 3 {
            return false;
        }
        let (Some(sig_bytes), Some(pubkey_bytes), Some(redeem_bytes)) = (
            chunks[0].data.as_ref(),
            chunks[1].data.as_ref(),
            chunks[2].data.as_ref(),
        ) else {
            return false;
        };
        if sig_bytes.is_empty() || pubkey_bytes.is_empty() || redeem_bytes.is_empty() {
            return false;
        }

        // 7. Every signature commits with ALL | FORKID: the reclaim
        // signature and the first push of every payment input.
        if sig_bytes.last() != Some(&ZCE_SIGHASH_BYTE) {
            return false;
        }
        let mut input_pubkeys = Vec::with_capacity(self.inputs().len());
        for input in self.inputs() {
            let Ok(input_chunks) = input.script().chunks() else {
                return false;
            };
            if input_chunks.len() != 2 {
                return false;
            }
            let (Some(input_sig), Some(input_key)) =
                (input_chunks[0].data.as_ref(), input_chunks[1].data.as_ref())
            else {
                return false;
            };
            if input_sig.last() != Some(&ZCE_SIGHASH_BYTE) {
                return false;
            }
            let Ok(key) = PublicKey::from_bytes(input_key) else {
                return false;
            };
            input_pubkeys.push(key);
        }

        // 8. The redeem script must be the one derived from the
        // payment's input keys plus the reclaim key, and its hash must
        // be the one the escrow output pays to.
        let Ok(reclaim_key) = PublicKey::from_bytes(pubkey_bytes) else {
            return false;
        };
        let Ok(expected_redeem) = Script::escrow_redeem_script(&input_pubkeys, &reclaim_key) else {
            return false;
        };
        let expected_hash = hash160(expected_redeem.as_bytes());
        let Ok(escrow_hash) = escrow_utxo.script.script_hash() else {
            return false;
        };
        if escrow_hash != expected_hash || hash160(redeem_bytes) != expected_hash {
            return false;
        }

        // 9. The reclaim signature verifies over the escrow UTXO with
        // the redeem script as scriptCode. Schnorr or ECDSA is decided
        // by the signature length.
        let raw_sig = &sig_bytes[..sig_bytes.len() - 1];
        sighash::verify(
            reclaim,
            raw_sig,
            &reclaim_key,
            0,
            redeem_bytes,
            escrow_utxo.satoshis,
            SIGHASH_ALL_FORKID,
        )
    }
}
