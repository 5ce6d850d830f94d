//! Bitcoin Cash Script type - a sequence of opcodes and data pushes.
//!
//! Scripts appear in transaction inputs (unlocking) and outputs
//! (locking). The `Script` wraps a `Vec<u8>` and provides construction,
//! classification, template builders, and ASM output. No interpretation
//! happens here; the transaction engine only needs shape predicates and
//! deterministic builders.

use std::fmt;

use bch_primitives::ec::PublicKey;
use bch_primitives::hash::hash160;

use crate::chunk::{decode_script, push_data_prefix, ScriptChunk};
use crate::opcodes::*;
use crate::{Address, AddressKind, ScriptError};

/// A Bitcoin Cash script, represented as a byte vector newtype.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Script(Vec<u8>);

impl Script {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Create a new empty script.
    pub fn new() -> Self {
        Script(Vec::new())
    }

    /// Create a script from a hex-encoded string.
    pub fn from_hex(hex_str: &str) -> Result<Self, ScriptError> {
        let bytes = hex::decode(hex_str).map_err(|e| ScriptError::InvalidHex(e.to_string()))?;
        Ok(Script(bytes))
    }

    /// Create a script from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Script(bytes.to_vec())
    }

    /// Create a script from a Bitcoin ASM string.
    ///
    /// Space-separated tokens: known opcode names are emitted directly,
    /// anything else is treated as hex push data.
    pub fn from_asm(asm: &str) -> Result<Self, ScriptError> {
        let mut script = Script::new();
        if asm.is_empty() {
            return Ok(script);
        }
        for section in asm.split(' ') {
            if let Some(opcode) = string_to_opcode(section) {
                script.append_opcodes(&[opcode])?;
            } else {
                let data =
                    hex::decode(section).map_err(|_| ScriptError::InvalidOpcodeData)?;
                script.append_push_data(&data)?;
            }
        }
        Ok(script)
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Encode the script as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Convert the script to its ASM (human-readable assembly) form.
    ///
    /// Returns an empty string for empty or undecodable scripts.
    pub fn to_asm(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        match decode_script(&self.0) {
            Ok(chunks) => chunks
                .iter()
                .map(|c| c.to_asm_string())
                .collect::<Vec<_>>()
                .join(" "),
            Err(_) => String::new(),
        }
    }

    /// Return a reference to the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Return the length of the script in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the script is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the script into a vector of decoded chunks.
    pub fn chunks(&self) -> Result<Vec<ScriptChunk>, ScriptError> {
        decode_script(&self.0)
    }

    // -----------------------------------------------------------------------
    // Script classification
    // -----------------------------------------------------------------------

    /// Check if this is a Pay-to-Public-Key-Hash output script.
    ///
    /// Pattern: OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG
    pub fn is_p2pkh(&self) -> bool {
        let b = &self.0;
        b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == OP_DATA_20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
    }

    /// Check if this is a Pay-to-Public-Key output script.
    ///
    /// Pattern: <33- or 65-byte pubkey> OP_CHECKSIG
    pub fn is_p2pk(&self) -> bool {
        let parts = match self.chunks() {
            Ok(p) => p,
            Err(_) => return false,
        };
        if parts.len() == 2 && parts[1].op == OP_CHECKSIG {
            if let Some(ref pubkey) = parts[0].data {
                if !pubkey.is_empty() {
                    let version = pubkey[0];
                    if (version == 0x04 || version == 0x06 || version == 0x07)
                        && pubkey.len() == 65
                    {
                        return true;
                    } else if (version == 0x02 || version == 0x03) && pubkey.len() == 33 {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Check if this is a Pay-to-Script-Hash output script.
    ///
    /// Pattern: OP_HASH160 <20 bytes> OP_EQUAL
    pub fn is_p2sh(&self) -> bool {
        let b = &self.0;
        b.len() == 23 && b[0] == OP_HASH160 && b[1] == OP_DATA_20 && b[22] == OP_EQUAL
    }

    /// Check if this is a data-carrier output script.
    ///
    /// Pattern: OP_RETURN ... or OP_FALSE OP_RETURN ...
    pub fn is_data_out(&self) -> bool {
        let b = &self.0;
        (!b.is_empty() && b[0] == OP_RETURN)
            || (b.len() > 1 && b[0] == OP_FALSE && b[1] == OP_RETURN)
    }

    /// Check if this is a bare multisig output script.
    ///
    /// Pattern: OP_M <pubkey1> ... <pubkeyN> OP_N OP_CHECKMULTISIG
    pub fn is_multisig_out(&self) -> bool {
        let parts = match self.chunks() {
            Ok(p) => p,
            Err(_) => return false,
        };
        if parts.len() < 4 {
            return false;
        }
        if !is_small_int_op(parts[0].op) {
            return false;
        }
        for chunk in &parts[1..parts.len() - 2] {
            match &chunk.data {
                Some(d) if !d.is_empty() => {}
                _ => return false,
            }
        }
        let second_last = &parts[parts.len() - 2];
        let last = &parts[parts.len() - 1];
        is_small_int_op(second_last.op) && last.op == OP_CHECKMULTISIG
    }

    /// Check if this is a witness public-key-hash program.
    ///
    /// Witness programs do not exist on this chain; the predicate is
    /// total so callers can share selection tables with segwit chains.
    pub fn is_witness_public_key_hash_out(&self) -> bool {
        false
    }

    /// Check if this is a witness script-hash program.
    ///
    /// Witness programs do not exist on this chain; always false.
    pub fn is_witness_script_hash_out(&self) -> bool {
        false
    }

    // -----------------------------------------------------------------------
    // Template builders
    // -----------------------------------------------------------------------

    /// Build the locking script paying to an address.
    ///
    /// P2PKH for key-hash addresses, P2SH for script-hash addresses.
    pub fn pay_to_address(address: &Address) -> Script {
        match address.kind {
            AddressKind::PubKeyHash => Script::pay_to_public_key_hash(&address.hash),
            AddressKind::ScriptHash => Script::pay_to_script_hash(&address.hash),
        }
    }

    /// Build a P2PKH locking script from a 20-byte public key hash.
    ///
    /// Produces: OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG
    pub fn pay_to_public_key_hash(pkh: &[u8; 20]) -> Script {
        let mut bytes = Vec::with_capacity(25);
        bytes.push(OP_DUP);
        bytes.push(OP_HASH160);
        bytes.push(OP_DATA_20);
        bytes.extend_from_slice(pkh);
        bytes.push(OP_EQUALVERIFY);
        bytes.push(OP_CHECKSIG);
        Script(bytes)
    }

    /// Build a P2SH locking script from a 20-byte script hash.
    ///
    /// Produces: OP_HASH160 <hash> OP_EQUAL
    pub fn pay_to_script_hash(script_hash: &[u8; 20]) -> Script {
        let mut bytes = Vec::with_capacity(23);
        bytes.push(OP_HASH160);
        bytes.push(OP_DATA_20);
        bytes.extend_from_slice(script_hash);
        bytes.push(OP_EQUAL);
        Script(bytes)
    }

    /// Build an unspendable data-carrier script.
    ///
    /// Produces: OP_RETURN <payload> (empty payload yields bare OP_RETURN).
    pub fn data_out(payload: &[u8]) -> Result<Script, ScriptError> {
        let mut script = Script(vec![OP_RETURN]);
        if !payload.is_empty() {
            script.append_push_data(payload)?;
        }
        Ok(script)
    }

    /// Build a bare M-of-N multisig locking script.
    ///
    /// Produces: OP_M <pubkeys...> OP_N OP_CHECKMULTISIG
    ///
    /// # Arguments
    /// * `public_keys` - Between 1 and 16 keys, in the order they appear.
    /// * `threshold` - M, the number of required signatures.
    pub fn multisig_out(public_keys: &[PublicKey], threshold: usize) -> Result<Script, ScriptError> {
        if public_keys.is_empty() || public_keys.len() > 16 {
            return Err(ScriptError::InvalidKeyCount(public_keys.len()));
        }
        let out_of_range = || {
            ScriptError::InvalidScript(format!(
                "threshold {} out of range for {} keys",
                threshold,
                public_keys.len()
            ))
        };
        if threshold == 0 {
            return Err(out_of_range());
        }
        let m_op = small_int_op(threshold).ok_or_else(out_of_range)?;
        let n_op = small_int_op(public_keys.len()).ok_or_else(out_of_range)?;
        if threshold > public_keys.len() {
            return Err(out_of_range());
        }

        let mut script = Script(vec![m_op]);
        for key in public_keys {
            script.append_push_data(&key.to_compressed())?;
        }
        script.0.push(n_op);
        script.0.push(OP_CHECKMULTISIG);
        Ok(script)
    }

    /// Build the ZCE escrow redeem script.
    ///
    /// The script commits to the funding transaction's input public keys
    /// (sorted, deduplicated, concatenated, and hashed) with a dropped
    /// push, then requires a signature from the reclaim key:
    ///
    /// `<hash160(input keys)> OP_DROP OP_DUP OP_HASH160
    ///  <hash160(reclaim key)> OP_EQUALVERIFY OP_CHECKSIG`
    ///
    /// Spending it therefore takes exactly three pushes:
    /// `<sig> <reclaim pubkey> <redeem script>`.
    pub fn escrow_redeem_script(
        input_keys: &[PublicKey],
        reclaim_key: &PublicKey,
    ) -> Result<Script, ScriptError> {
        if input_keys.is_empty() {
            return Err(ScriptError::InvalidKeyCount(0));
        }
        let mut sorted: Vec<[u8; 33]> = input_keys.iter().map(|k| k.to_compressed()).collect();
        sorted.sort();
        sorted.dedup();

        let mut concat = Vec::with_capacity(sorted.len() * 33);
        for key in &sorted {
            concat.extend_from_slice(key);
        }

        let mut script = Script::new();
        script.append_push_data(&hash160(&concat))?;
        script.0.push(OP_DROP);
        script.0.push(OP_DUP);
        script.0.push(OP_HASH160);
        script.append_push_data(&reclaim_key.hash160())?;
        script.0.push(OP_EQUALVERIFY);
        script.0.push(OP_CHECKSIG);
        Ok(script)
    }

    // -----------------------------------------------------------------------
    // Data extraction
    // -----------------------------------------------------------------------

    /// Extract the 20-byte public key hash from a P2PKH script.
    pub fn public_key_hash(&self) -> Result<[u8; 20], ScriptError> {
        if self.0.is_empty() {
            return Err(ScriptError::EmptyScript);
        }
        if !self.is_p2pkh() {
            return Err(ScriptError::WrongTemplate("P2PKH"));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&self.0[3..23]);
        Ok(out)
    }

    /// Extract the 20-byte script hash from a P2SH script.
    pub fn script_hash(&self) -> Result<[u8; 20], ScriptError> {
        if self.0.is_empty() {
            return Err(ScriptError::EmptyScript);
        }
        if !self.is_p2sh() {
            return Err(ScriptError::WrongTemplate("P2SH"));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&self.0[2..22]);
        Ok(out)
    }

    /// Extract the pushed public key from a P2PK script.
    pub fn public_key(&self) -> Result<Vec<u8>, ScriptError> {
        if !self.is_p2pk() {
            return Err(ScriptError::WrongTemplate("P2PK"));
        }
        let chunks = self.chunks()?;
        Ok(chunks[0].data.clone().unwrap_or_default())
    }

    /// Extract the payload of a data-carrier script, concatenating every
    /// push after the OP_RETURN marker.
    pub fn data_payload(&self) -> Result<Vec<u8>, ScriptError> {
        if !self.is_data_out() {
            return Err(ScriptError::WrongTemplate("data"));
        }
        let chunks = self.chunks()?;
        let mut out = Vec::new();
        let mut seen_return = false;
        for chunk in chunks {
            if !seen_return {
                seen_return = chunk.op == OP_RETURN;
                continue;
            }
            if let Some(data) = chunk.data {
                out.extend_from_slice(&data);
            }
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Mutation / building
    // -----------------------------------------------------------------------

    /// Append data bytes to the script with the minimal PUSHDATA prefix.
    pub fn append_push_data(&mut self, data: &[u8]) -> Result<(), ScriptError> {
        let prefix = push_data_prefix(data.len())?;
        self.0.extend_from_slice(&prefix);
        self.0.extend_from_slice(data);
        Ok(())
    }

    /// Append raw opcodes to the script.
    ///
    /// Rejects push-data opcodes (OP_DATA_1..OP_PUSHDATA4); use
    /// `append_push_data` for those.
    pub fn append_opcodes(&mut self, opcodes: &[u8]) -> Result<(), ScriptError> {
        for &op in opcodes {
            if op >= OP_DATA_1 && op <= OP_PUSHDATA4 {
                return Err(ScriptError::InvalidOpcodeType(opcode_to_string(op)));
            }
        }
        self.0.extend_from_slice(opcodes);
        Ok(())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl fmt::Display for Script {
    /// Display the script as hex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bch_primitives::ec::PrivateKey;

    const PKH_SCRIPT: &str = "76a914eb0bd5edba389198e73f8efabddfc61666969ff788ac";

    #[test]
    fn test_p2pkh_classification() {
        let script = Script::from_hex(PKH_SCRIPT).unwrap();
        assert!(script.is_p2pkh());
        assert!(!script.is_p2sh());
        assert!(!script.is_p2pk());
        assert!(!script.is_data_out());
        assert_eq!(
            hex::encode(script.public_key_hash().unwrap()),
            "eb0bd5edba389198e73f8efabddfc61666969ff7"
        );
    }

    #[test]
    fn test_p2pkh_builder_roundtrip() {
        let mut pkh = [0u8; 20];
        pkh.copy_from_slice(&hex::decode("eb0bd5edba389198e73f8efabddfc61666969ff7").unwrap());
        let script = Script::pay_to_public_key_hash(&pkh);
        assert_eq!(script.to_hex(), PKH_SCRIPT);
    }

    #[test]
    fn test_p2sh() {
        let script = Script::pay_to_script_hash(&[0x11; 20]);
        assert!(script.is_p2sh());
        assert_eq!(script.script_hash().unwrap(), [0x11; 20]);
        assert_eq!(script.len(), 23);
    }

    #[test]
    fn test_p2pk() {
        let key = PrivateKey::new().public_key();
        let mut script = Script::new();
        script.append_push_data(&key.to_compressed()).unwrap();
        script.append_opcodes(&[OP_CHECKSIG]).unwrap();
        assert!(script.is_p2pk());
        assert_eq!(script.public_key().unwrap(), key.to_compressed().to_vec());
    }

    #[test]
    fn test_data_out() {
        let script = Script::data_out(b"hello world").unwrap();
        assert!(script.is_data_out());
        assert_eq!(script.data_payload().unwrap(), b"hello world");

        let empty = Script::data_out(b"").unwrap();
        assert!(empty.is_data_out());
        assert_eq!(empty.data_payload().unwrap(), b"");
    }

    #[test]
    fn test_multisig_out() {
        let keys: Vec<_> = (0..3).map(|_| PrivateKey::new().public_key()).collect();
        let script = Script::multisig_out(&keys, 2).unwrap();
        assert!(script.is_multisig_out());
        assert!(!script.is_p2pkh());

        assert!(Script::multisig_out(&keys, 4).is_err());
        assert!(Script::multisig_out(&[], 1).is_err());
    }

    #[test]
    fn test_escrow_redeem_script_shape() {
        let inputs: Vec<_> = (0..2).map(|_| PrivateKey::new().public_key()).collect();
        let reclaim = PrivateKey::new().public_key();
        let script = Script::escrow_redeem_script(&inputs, &reclaim).unwrap();

        let chunks = script.chunks().unwrap();
        assert_eq!(chunks.len(), 7);
        assert_eq!(chunks[0].data.as_ref().unwrap().len(), 20);
        assert_eq!(chunks[1].op, OP_DROP);
        assert_eq!(chunks[2].op, OP_DUP);
        assert_eq!(chunks[3].op, OP_HASH160);
        assert_eq!(
            chunks[4].data.as_deref(),
            Some(&reclaim.hash160()[..])
        );
        assert_eq!(chunks[6].op, OP_CHECKSIG);

        // Key order must not matter.
        let reversed: Vec<_> = inputs.iter().rev().cloned().collect();
        let script2 = Script::escrow_redeem_script(&reversed, &reclaim).unwrap();
        assert_eq!(script.as_bytes(), script2.as_bytes());
    }

    #[test]
    fn test_asm_roundtrip() {
        let script = Script::from_hex(PKH_SCRIPT).unwrap();
        let asm = script.to_asm();
        assert_eq!(
            asm,
            "OP_DUP OP_HASH160 eb0bd5edba389198e73f8efabddfc61666969ff7 OP_EQUALVERIFY OP_CHECKSIG"
        );
        let rebuilt = Script::from_asm(&asm).unwrap();
        assert_eq!(rebuilt.to_hex(), PKH_SCRIPT);
    }

    #[test]
    fn test_witness_predicates_total() {
        let script = Script::from_hex(PKH_SCRIPT).unwrap();
        assert!(!script.is_witness_public_key_hash_out());
        assert!(!script.is_witness_script_hash_out());
    }
}
