//! Script chunk parsing.
//!
//! A chunk is one decoded script operation: an opcode plus the data it
//! pushes, if any. Chunk decoding underlies script classification, ASM
//! rendering, and unlocking-script disassembly.

use crate::opcodes::*;
use crate::ScriptError;

/// A single decoded script operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptChunk {
    /// The opcode byte. For direct pushes this is the length byte itself.
    pub op: u8,
    /// The pushed data, if the opcode pushes any.
    pub data: Option<Vec<u8>>,
}

impl ScriptChunk {
    /// Render this chunk as an ASM token: pushed data as hex, opcodes by name.
    pub fn to_asm_string(&self) -> String {
        match &self.data {
            Some(data) if !data.is_empty() => hex::encode(data),
            Some(_) => "OP_0".to_string(),
            None => opcode_to_string(self.op),
        }
    }
}

/// Decode a full script into its chunks.
///
/// # Arguments
/// * `bytes` - The raw script bytes.
///
/// # Returns
/// A vector of `ScriptChunk` values, or an error if a push runs past the
/// end of the script.
pub fn decode_script(bytes: &[u8]) -> Result<Vec<ScriptChunk>, ScriptError> {
    let mut chunks = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let op = bytes[pos];
        pos += 1;

        match op {
            // Direct pushes: the opcode is the length.
            1..=0x4b => {
                let len = op as usize;
                if pos + len > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                chunks.push(ScriptChunk {
                    op,
                    data: Some(bytes[pos..pos + len].to_vec()),
                });
                pos += len;
            }
            OP_PUSHDATA1 => {
                if pos + 1 > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                let len = bytes[pos] as usize;
                pos += 1;
                if pos + len > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                chunks.push(ScriptChunk {
                    op,
                    data: Some(bytes[pos..pos + len].to_vec()),
                });
                pos += len;
            }
            OP_PUSHDATA2 => {
                if pos + 2 > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                let len = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as usize;
                pos += 2;
                if pos + len > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                chunks.push(ScriptChunk {
                    op,
                    data: Some(bytes[pos..pos + len].to_vec()),
                });
                pos += len;
            }
            OP_PUSHDATA4 => {
                if pos + 4 > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                let len = u32::from_le_bytes([
                    bytes[pos],
                    bytes[pos + 1],
                    bytes[pos + 2],
                    bytes[pos + 3],
                ]) as usize;
                pos += 4;
                if pos + len > bytes.len() {
                    return Err(ScriptError::DataTooSmall);
                }
                chunks.push(ScriptChunk {
                    op,
                    data: Some(bytes[pos..pos + len].to_vec()),
                });
                pos += len;
            }
            // OP_0 pushes an empty array.
            OP_0 => {
                chunks.push(ScriptChunk {
                    op,
                    data: Some(Vec::new()),
                });
            }
            _ => {
                chunks.push(ScriptChunk { op, data: None });
            }
        }
    }

    Ok(chunks)
}

/// Build the minimal push-data prefix for `len` bytes of data.
///
/// Chooses the direct push for 1-75 bytes, OP_PUSHDATA1 for up to 255,
/// OP_PUSHDATA2 for up to 65535, and OP_PUSHDATA4 beyond that.
///
/// # Returns
/// The prefix bytes, or an error if the data exceeds u32 length.
pub fn push_data_prefix(len: usize) -> Result<Vec<u8>, ScriptError> {
    if len == 0 {
        return Ok(vec![OP_0]);
    }
    if len <= 0x4b {
        return Ok(vec![len as u8]);
    }
    if len <= 0xff {
        return Ok(vec![OP_PUSHDATA1, len as u8]);
    }
    if len <= 0xffff {
        let mut out = vec![OP_PUSHDATA2];
        out.extend_from_slice(&(len as u16).to_le_bytes());
        return Ok(out);
    }
    if len <= 0xffff_ffff {
        let mut out = vec![OP_PUSHDATA4];
        out.extend_from_slice(&(len as u32).to_le_bytes());
        return Ok(out);
    }
    Err(ScriptError::DataTooBig(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_direct_push() {
        let chunks = decode_script(&[0x03, 0xaa, 0xbb, 0xcc]).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].data.as_deref(), Some(&[0xaa, 0xbb, 0xcc][..]));
    }

    #[test]
    fn test_decode_pushdata1() {
        let mut script = vec![OP_PUSHDATA1, 76];
        script.extend(std::iter::repeat(0x11).take(76));
        let chunks = decode_script(&script).unwrap();
        assert_eq!(chunks[0].data.as_ref().unwrap().len(), 76);
    }

    #[test]
    fn test_decode_truncated_push() {
        assert!(decode_script(&[0x05, 0x01]).is_err());
        assert!(decode_script(&[OP_PUSHDATA1]).is_err());
        assert!(decode_script(&[OP_PUSHDATA2, 0x01]).is_err());
    }

    #[test]
    fn test_decode_opcodes() {
        let chunks = decode_script(&[OP_DUP, OP_HASH160]).unwrap();
        assert_eq!(chunks[0].op, OP_DUP);
        assert!(chunks[0].data.is_none());
        assert_eq!(chunks[1].op, OP_HASH160);
    }

    #[test]
    fn test_decode_op_0() {
        let chunks = decode_script(&[OP_0]).unwrap();
        assert_eq!(chunks[0].data.as_deref(), Some(&[][..]));
    }

    #[test]
    fn test_push_prefix_boundaries() {
        assert_eq!(push_data_prefix(0).unwrap(), vec![OP_0]);
        assert_eq!(push_data_prefix(75).unwrap(), vec![75]);
        assert_eq!(push_data_prefix(76).unwrap(), vec![OP_PUSHDATA1, 76]);
        assert_eq!(push_data_prefix(255).unwrap(), vec![OP_PUSHDATA1, 255]);
        assert_eq!(push_data_prefix(256).unwrap(), vec![OP_PUSHDATA2, 0x00, 0x01]);
    }
}
