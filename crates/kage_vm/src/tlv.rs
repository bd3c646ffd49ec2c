//! TLV bytecode format.
//!
//! Record: `op: u8 | len: u32 BE | payload[len]`. Only `PUSH` has a
//! payload (UTF-8). A full program file is `"KBC1" | statements: u32 BE`
//! followed by records.

use crate::opcode::{Bytecode, Instr, Opcode};
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"KBC1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TlvError {
    #[error("tlv: truncated record at offset {offset}")]
    Truncated { offset: usize },
    #[error("tlv: unknown opcode 0x{byte:02x} at offset {offset}")]
    UnknownOpcode { offset: usize, byte: u8 },
    #[error("tlv: {op:?} takes no payload (offset {offset})")]
    PayloadNotAllowed { offset: usize, op: Opcode },
    #[error("tlv: payload is not UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("tlv: payload of {len} bytes does not fit a u32 length")]
    PayloadTooLarge { len: usize },
    #[error("tlv: missing KBC1 header")]
    BadMagic,
}

fn push_record(out: &mut Vec<u8>, op: Opcode, payload: &[u8]) -> Result<(), TlvError> {
    let len = u32::try_from(payload.len()).map_err(|_| TlvError::PayloadTooLarge { len: payload.len() })?;
    out.push(op.byte());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

pub fn encode_stream(code: &[Instr]) -> Result<Vec<u8>, TlvError> {
    let mut out = Vec::new();
    for ins in code {
        match ins {
            Instr::Push(s) => push_record(&mut out, Opcode::Push, s.as_bytes())?,
            other => push_record(&mut out, other.op(), &[])?,
        }
    }
    Ok(out)
}

pub fn decode_stream(buf: &[u8]) -> Result<Vec<Instr>, TlvError> {
    let mut code = Vec::new();
    let mut i = 0usize;
    while i < buf.len() {
        let start = i;
        let byte = buf[i];
        let op = Opcode::from_byte(byte).ok_or(TlvError::UnknownOpcode { offset: start, byte })?;
        let len_bytes: [u8; 4] = buf
            .get(i + 1..i + 5)
            .and_then(|s| s.try_into().ok())
            .ok_or(TlvError::Truncated { offset: start })?;
        let len = u32::from_be_bytes(len_bytes) as usize;
        i += 5;
        let payload = buf
            .get(i..i.saturating_add(len))
            .filter(|p| p.len() == len)
            .ok_or(TlvError::Truncated { offset: start })?;
        i += len;

        let ins = match op {
            Opcode::Push => {
                let s = std::str::from_utf8(payload).map_err(|_| TlvError::InvalidUtf8 { offset: start })?;
                Instr::Push(s.to_string())
            }
            _ if len != 0 => return Err(TlvError::PayloadNotAllowed { offset: start, op }),
            Opcode::Pop => Instr::Pop,
            Opcode::Encrypt => Instr::Encrypt,
            Opcode::Decrypt => Instr::Decrypt,
        };
        code.push(ins);
    }
    Ok(code)
}

pub fn encode_bytecode(bc: &Bytecode) -> Result<Vec<u8>, TlvError> {
    let statements = u32::try_from(bc.statements).map_err(|_| TlvError::PayloadTooLarge { len: bc.statements })?;
    let mut out = Vec::with_capacity(8);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&statements.to_be_bytes());
    out.extend(encode_stream(&bc.code)?);
    Ok(out)
}

pub fn decode_bytecode(buf: &[u8]) -> Result<Bytecode, TlvError> {
    if buf.len() < 8 || &buf[..4] != MAGIC {
        return Err(TlvError::BadMagic);
    }
    let statements = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
    let code = decode_stream(&buf[8..])?;
    Ok(Bytecode { statements, code })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Instr> {
        vec![
            Instr::Push("Double encrypted!".into()),
            Instr::Encrypt,
            Instr::Encrypt,
            Instr::Push(String::new()),
            Instr::Decrypt,
            Instr::Pop,
        ]
    }

    #[test]
    fn record_layout() {
        let buf = encode_stream(&[Instr::Push("hi".into()), Instr::Encrypt]).unwrap();
        assert_eq!(buf, vec![0x01, 0, 0, 0, 2, b'h', b'i', 0x10, 0, 0, 0, 0]);
    }

    #[test]
    fn stream_decodes_back() {
        let code = sample();
        assert_eq!(decode_stream(&encode_stream(&code).unwrap()).unwrap(), code);
    }

    #[test]
    fn program_file_keeps_statement_count() {
        let bc = Bytecode { statements: 2, code: sample() };
        let buf = encode_bytecode(&bc).unwrap();
        assert_eq!(&buf[..4], b"KBC1");
        assert_eq!(decode_bytecode(&buf).unwrap(), bc);
    }

    #[test]
    fn rejects_unknown_opcode() {
        assert_eq!(
            decode_stream(&[0x10, 0, 0, 0, 0, 0x7f, 0, 0, 0, 0]),
            Err(TlvError::UnknownOpcode { offset: 5, byte: 0x7f })
        );
    }

    #[test]
    fn rejects_truncation() {
        assert_eq!(decode_stream(&[0x01, 0, 0]), Err(TlvError::Truncated { offset: 0 }));
        assert_eq!(
            decode_stream(&[0x01, 0, 0, 0, 5, b'a']),
            Err(TlvError::Truncated { offset: 0 })
        );
    }

    #[test]
    fn rejects_payload_on_bare_opcodes() {
        assert_eq!(
            decode_stream(&[0x11, 0, 0, 0, 1, 0xaa]),
            Err(TlvError::PayloadNotAllowed { offset: 0, op: Opcode::Decrypt })
        );
    }

    #[test]
    fn rejects_non_utf8_push() {
        assert_eq!(
            decode_stream(&[0x01, 0, 0, 0, 1, 0xff]),
            Err(TlvError::InvalidUtf8 { offset: 0 })
        );
    }

    #[test]
    fn rejects_missing_header() {
        assert_eq!(decode_bytecode(b"KBC"), Err(TlvError::BadMagic));
        assert_eq!(decode_bytecode(b"XXXX\0\0\0\x01"), Err(TlvError::BadMagic));
    }
}
