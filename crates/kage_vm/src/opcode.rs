use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Push = 0x01,
    Pop = 0x02,
    Encrypt = 0x10,
    Decrypt = 0x11,
}

impl Opcode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Opcode::Push),
            0x02 => Some(Opcode::Pop),
            0x10 => Some(Opcode::Encrypt),
            0x11 => Some(Opcode::Decrypt),
            _ => None,
        }
    }

    pub fn byte(self) -> u8 {
        self as u8
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Encrypt => "ENCRYPT",
            Opcode::Decrypt => "DECRYPT",
        }
    }
}

/// One VM instruction. Only `Push` carries an operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "arg", rename_all = "snake_case")]
pub enum Instr {
    Push(String),
    Pop,
    Encrypt,
    Decrypt,
}

impl Instr {
    pub fn op(&self) -> Opcode {
        match self {
            Instr::Push(_) => Opcode::Push,
            Instr::Pop => Opcode::Pop,
            Instr::Encrypt => Opcode::Encrypt,
            Instr::Decrypt => Opcode::Decrypt,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Push(s) => write!(f, "{} {:?}", self.op().mnemonic(), s),
            other => f.write_str(other.op().mnemonic()),
        }
    }
}

/// Compiled program: linear code plus the number of top-level statements,
/// which is the stack depth a clean run must end with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bytecode {
    pub statements: usize,
    pub code: Vec<Instr>,
}

impl Bytecode {
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// One line per instruction: `0003: ENCRYPT`.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (i, ins) in self.code.iter().enumerate() {
            out.push_str(&format!("{:04}: {}\n", i, ins));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_bytes_round_trip() {
        for op in [Opcode::Push, Opcode::Pop, Opcode::Encrypt, Opcode::Decrypt] {
            assert_eq!(Opcode::from_byte(op.byte()), Some(op));
        }
        assert_eq!(Opcode::from_byte(0x00), None);
        assert_eq!(Opcode::from_byte(0xff), None);
    }

    #[test]
    fn disassembly_listing() {
        let bc = Bytecode {
            statements: 1,
            code: vec![Instr::Push("a \"q\"".into()), Instr::Encrypt, Instr::Decrypt],
        };
        assert_eq!(
            bc.disassemble(),
            "0000: PUSH \"a \\\"q\\\"\"\n0001: ENCRYPT\n0002: DECRYPT\n"
        );
    }
}
