//! Bitcoin Cash script opcode constants.
//!
//! Only the opcodes this SDK emits or inspects are named here; anything
//! else round-trips through chunk parsing as a bare byte.

/// Push an empty byte array (also known as OP_0).
pub const OP_FALSE: u8 = 0x00;
/// Alias for OP_FALSE.
pub const OP_0: u8 = 0x00;

/// Direct data pushes: opcode value equals the push length (1..=75).
pub const OP_DATA_1: u8 = 0x01;
/// Push 20 bytes (hash160 values).
pub const OP_DATA_20: u8 = 0x14;
/// Push 32 bytes (sha256 values, token categories).
pub const OP_DATA_32: u8 = 0x20;
/// Push 33 bytes (compressed public keys).
pub const OP_DATA_33: u8 = 0x21;
/// Push 65 bytes (uncompressed public keys).
pub const OP_DATA_65: u8 = 0x41;
/// The largest direct push (75 bytes).
pub const OP_DATA_75: u8 = 0x4b;

/// The next byte is the push length.
pub const OP_PUSHDATA1: u8 = 0x4c;
/// The next two bytes (LE) are the push length.
pub const OP_PUSHDATA2: u8 = 0x4d;
/// The next four bytes (LE) are the push length.
pub const OP_PUSHDATA4: u8 = 0x4e;

/// Push the number -1.
pub const OP_1NEGATE: u8 = 0x4f;

/// Push the number 1 (also OP_TRUE).
pub const OP_1: u8 = 0x51;
/// Push the number 2.
pub const OP_2: u8 = 0x52;
/// Push the number 3.
pub const OP_3: u8 = 0x53;
/// Push the number 16.
pub const OP_16: u8 = 0x60;

/// Marks an output as unspendable data carrier.
pub const OP_RETURN: u8 = 0x6a;

/// Remove the top stack item.
pub const OP_DROP: u8 = 0x75;
/// Duplicate the top stack item.
pub const OP_DUP: u8 = 0x76;

/// Push equality of the top two stack items.
pub const OP_EQUAL: u8 = 0x87;
/// OP_EQUAL then OP_VERIFY.
pub const OP_EQUALVERIFY: u8 = 0x88;

/// Hash the top stack item with RIPEMD160(SHA256(x)).
pub const OP_HASH160: u8 = 0xa9;

/// Verify a signature against a public key.
pub const OP_CHECKSIG: u8 = 0xac;
/// Verify M-of-N signatures against public keys.
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// Whether `op` pushes a small integer (OP_0, OP_1..OP_16).
pub fn is_small_int_op(op: u8) -> bool {
    op == OP_0 || (OP_1..=OP_16).contains(&op)
}

/// Decode a small-int opcode to its numeric value (OP_0 -> 0, OP_N -> N).
///
/// Returns `None` for opcodes outside the small-int range.
pub fn small_int_value(op: u8) -> Option<usize> {
    if op == OP_0 {
        Some(0)
    } else if (OP_1..=OP_16).contains(&op) {
        Some((op - OP_1 + 1) as usize)
    } else {
        None
    }
}

/// Encode a small integer (0..=16) as its opcode.
pub fn small_int_op(n: usize) -> Option<u8> {
    match n {
        0 => Some(OP_0),
        1..=16 => Some(OP_1 + (n as u8) - 1),
        _ => None,
    }
}

/// Render an opcode as its canonical ASM name.
pub fn opcode_to_string(op: u8) -> String {
    match op {
        OP_0 => "OP_0".to_string(),
        OP_PUSHDATA1 => "OP_PUSHDATA1".to_string(),
        OP_PUSHDATA2 => "OP_PUSHDATA2".to_string(),
        OP_PUSHDATA4 => "OP_PUSHDATA4".to_string(),
        OP_1NEGATE => "OP_1NEGATE".to_string(),
        OP_1..=OP_16 => format!("OP_{}", op - OP_1 + 1),
        OP_RETURN => "OP_RETURN".to_string(),
        OP_DROP => "OP_DROP".to_string(),
        OP_DUP => "OP_DUP".to_string(),
        OP_EQUAL => "OP_EQUAL".to_string(),
        OP_EQUALVERIFY => "OP_EQUALVERIFY".to_string(),
        OP_HASH160 => "OP_HASH160".to_string(),
        OP_CHECKSIG => "OP_CHECKSIG".to_string(),
        OP_CHECKMULTISIG => "OP_CHECKMULTISIG".to_string(),
        _ => format!("OP_UNKNOWN_{:02x}", op),
    }
}

/// Resolve an ASM token to its opcode, if it names one.
pub fn string_to_opcode(s: &str) -> Option<u8> {
    match s {
        "OP_0" | "OP_FALSE" => Some(OP_0),
        "OP_PUSHDATA1" => Some(OP_PUSHDATA1),
        "OP_PUSHDATA2" => Some(OP_PUSHDATA2),
        "OP_PUSHDATA4" => Some(OP_PUSHDATA4),
        "OP_1NEGATE" => Some(OP_1NEGATE),
        "OP_RETURN" => Some(OP_RETURN),
        "OP_DROP" => Some(OP_DROP),
        "OP_DUP" => Some(OP_DUP),
        "OP_EQUAL" => Some(OP_EQUAL),
        "OP_EQUALVERIFY" => Some(OP_EQUALVERIFY),
        "OP_HASH160" => Some(OP_HASH160),
        "OP_CHECKSIG" => Some(OP_CHECKSIG),
        "OP_CHECKMULTISIG" => Some(OP_CHECKMULTISIG),
        _ => {
            if let Some(n) = s.strip_prefix("OP_") {
                if let Ok(v) = n.parse::<u8>() {
                    if v >= 1 && v <= 16 {
                        return Some(OP_1 + v - 1);
                    }
                }
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_int_roundtrip() {
        for n in 0..=16usize {
            let op = small_int_op(n).unwrap();
            assert!(is_small_int_op(op));
            assert_eq!(small_int_value(op), Some(n));
        }
        assert!(small_int_op(17).is_none());
        assert!(!is_small_int_op(OP_DUP));
    }

    #[test]
    fn test_opcode_names() {
        assert_eq!(opcode_to_string(OP_DUP), "OP_DUP");
        assert_eq!(opcode_to_string(OP_2), "OP_2");
        assert_eq!(string_to_opcode("OP_16"), Some(OP_16));
        assert_eq!(string_to_opcode("OP_CHECKSIG"), Some(OP_CHECKSIG));
        assert_eq!(string_to_opcode("deadbeef"), None);
    }
}
