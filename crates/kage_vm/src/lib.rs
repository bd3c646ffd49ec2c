//! Kage - a two-keyword language whose only computation is authenticated
//! encryption.
//!
//! ```text
//! source ──parse──▶ Program ──compile──▶ Bytecode ──Vm::run──▶ Value
//!                                                    │
//!                                       crypto (XSalsa20-Poly1305 + base64)
//! ```
//!
//! - No global state: every operation takes its key explicitly
//! - Parsing is all-or-nothing, errors carry kind + byte offset
//! - Bytecode is linear (no jumps) and can be stored as a TLV stream

pub mod ast;
pub mod codec;
pub mod compiler;
pub mod crypto;
pub mod error;
pub mod exec;
pub mod opcode;
pub mod parser;
pub mod pipeline;
pub mod tlv;
pub mod types;

pub use ast::{Expr, Program};
pub use compiler::{compile, CompileError};
pub use crypto::{CryptoError, KeyId, SecretKey, KEY_SIZE};
pub use error::KageError;
pub use exec::{ExecError, Vm, VmConfig, VmOutcome, VmState};
pub use opcode::{Bytecode, Instr, Opcode};
pub use parser::{parse, ParseError, ParseErrorKind, ParserConfig};
pub use pipeline::{
    decrypt_value, encrypt_value, evaluate, execute_bytecode, full_decrypt, peel, run, run_with,
    Peeled, RunOptions,
};
pub use types::Value;
