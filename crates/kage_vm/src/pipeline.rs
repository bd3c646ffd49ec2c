//! Source → parse → compile → execute, plus layer peeling.

use crate::compiler::compile;
use crate::crypto;
use crate::error::Result;
use crate::exec::{Vm, VmConfig, VmOutcome};
use crate::opcode::{Bytecode, Instr};
use crate::parser::{parse_with, ParserConfig};
use crate::types::Value;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub parser: ParserConfig,
    pub vm: VmConfig,
}

/// Parse, compile and execute `source` under `key`; returns the value of the
/// last statement.
pub fn run(source: &str, key: &[u8]) -> Result<Value> {
    Ok(run_with(source, key, &RunOptions::default())?.into_result()?)
}

/// Like [`run`], returning every statement's value and the step count.
pub fn run_with(source: &str, key: &[u8], opts: &RunOptions) -> Result<VmOutcome> {
    let program = parse_with(source, opts.parser)?;
    let bc = compile(&program)?;
    execute_bytecode(&bc, key, opts.vm)
}

/// Run already-compiled bytecode on a fresh VM.
pub fn execute_bytecode(bc: &Bytecode, key: &[u8], cfg: VmConfig) -> Result<VmOutcome> {
    let mut vm = Vm::new(cfg, key);
    Ok(vm.run(bc)?)
}

/// [`run`] followed by [`full_decrypt`].
pub fn evaluate(source: &str, key: &[u8]) -> Result<Value> {
    let value = run(source, key)?;
    Ok(full_decrypt(value, key))
}

/// Seal one string: `PUSH plaintext; ENCRYPT`.
pub fn encrypt_value(plaintext: &str, key: &[u8]) -> Result<Value> {
    single_op(plaintext, Instr::Encrypt, key)
}

/// Open one envelope: `PUSH envelope; DECRYPT`.
pub fn decrypt_value(envelope: &str, key: &[u8]) -> Result<Value> {
    single_op(envelope, Instr::Decrypt, key)
}

fn single_op(operand: &str, op: Instr, key: &[u8]) -> Result<Value> {
    let bc = Bytecode {
        statements: 1,
        code: vec![Instr::Push(operand.to_string()), op],
    };
    Ok(execute_bytecode(&bc, key, VmConfig::default())?.into_result()?)
}

/// Result of peeling: the innermost value reached and how many layers
/// came off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peeled {
    pub value: Value,
    pub layers: usize,
}

/// Decrypt repeatedly until the value is not a string or no longer opens
/// under `key`. A failed attempt ends the loop; it is not an error.
pub fn peel(value: Value, key: &[u8]) -> Peeled {
    let mut current = value;
    let mut layers = 0usize;
    loop {
        let Value::Str(text) = &current else {
            break;
        };
        match crypto::decrypt(text, key) {
            Ok(plain) => {
                current = Value::from_plaintext(plain);
                layers += 1;
            }
            Err(stop) => {
                debug!(layers, reason = %stop, "peel stopped");
                break;
            }
        }
    }
    Peeled { value: current, layers }
}

/// Strip every encryption layer `key` can open. Never fails: returns the
/// last value that decrypted, or `value` itself if none did.
pub fn full_decrypt(value: Value, key: &[u8]) -> Value {
    peel(value, key).value
}
