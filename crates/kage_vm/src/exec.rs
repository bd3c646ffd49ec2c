use crate::crypto::{self, CryptoError, KeyId};
use crate::opcode::{Bytecode, Instr, Opcode};
use crate::types::Value;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("stack underflow for {0:?}")]
    StackUnderflow(Opcode),
    #[error("stack overflow: limit {limit}")]
    StackOverflow { limit: usize },
    #[error("{op:?} failed: {source}")]
    Crypto {
        op: Opcode,
        #[source]
        source: CryptoError,
    },
    #[error("residual stack: expected {expected} values, found {actual}")]
    ResidualStack { expected: usize, actual: usize },
    #[error("no result on stack")]
    EmptyResult,
    #[error("vm is {0:?}, not ready")]
    NotReady(VmState),
}

impl ExecError {
    /// The crypto failure behind an ENCRYPT/DECRYPT error, if any.
    pub fn crypto(&self) -> Option<&CryptoError> {
        match self {
            ExecError::Crypto { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    /// `None` lets the stack grow without bound.
    pub stack_limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Ready,
    HaltedOk,
    HaltedError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmOutcome {
    /// One value per top-level statement, in source order.
    pub values: Vec<Value>,
    pub steps: u64,
}

impl VmOutcome {
    /// Value of the last statement.
    pub fn result(&self) -> Option<&Value> {
        self.values.last()
    }

    pub fn into_result(mut self) -> Result<Value, ExecError> {
        self.values.pop().ok_or(ExecError::EmptyResult)
    }
}

/// Stack machine whose only operations are sealing and opening values
/// under one key.
pub struct Vm<'k> {
    cfg: VmConfig,
    stack: Vec<Value>,
    steps: u64,
    key: &'k [u8],
    state: VmState,
}

impl<'k> Vm<'k> {
    pub fn new(cfg: VmConfig, key: &'k [u8]) -> Self {
        Self {
            cfg,
            stack: Vec::new(),
            steps: 0,
            key,
            state: VmState::Ready,
        }
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Clear the stack and return to `Ready`.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.steps = 0;
        self.state = VmState::Ready;
    }

    pub fn push(&mut self, v: Value) -> Result<(), ExecError> {
        if let Some(limit) = self.cfg.stack_limit {
            if self.stack.len() >= limit {
                return Err(ExecError::StackOverflow { limit });
            }
        }
        self.stack.push(v);
        Ok(())
    }

    fn pop(&mut self, op: Opcode) -> Result<Value, ExecError> {
        self.stack.pop().ok_or(ExecError::StackUnderflow(op))
    }

    fn step(&mut self, ins: &Instr) -> Result<(), ExecError> {
        self.steps += 1;
        trace!(step = self.steps, op = ins.op().mnemonic(), depth = self.stack.len());
        match ins {
            Instr::Push(s) => self.push(Value::Str(s.clone()))?,
            Instr::Pop => {
                self.pop(Opcode::Pop)?;
            }
            Instr::Encrypt => {
                let v = self.pop(Opcode::Encrypt)?;
                let sealed = crypto::encrypt(v.as_bytes(), self.key)
                    .map_err(|source| ExecError::Crypto { op: Opcode::Encrypt, source })?;
                self.push(Value::Str(sealed))?;
            }
            Instr::Decrypt => {
                let v = self.pop(Opcode::Decrypt)?;
                let text = String::from_utf8_lossy(v.as_bytes());
                let opened = crypto::decrypt(&text, self.key)
                    .map_err(|source| ExecError::Crypto { op: Opcode::Decrypt, source })?;
                self.push(Value::from_plaintext(opened))?;
            }
        }
        Ok(())
    }

    /// Execute `code` in order, leaving results on the stack. Halts on the
    /// first failing instruction.
    pub fn execute(&mut self, code: &[Instr]) -> Result<u64, ExecError> {
        if self.state != VmState::Ready {
            return Err(ExecError::NotReady(self.state));
        }
        for ins in code {
            if let Err(e) = self.step(ins) {
                self.state = VmState::HaltedError;
                debug!(step = self.steps, error = %e, "vm halted with error");
                return Err(e);
            }
        }
        self.state = VmState::HaltedOk;
        Ok(self.steps)
    }

    /// Pop the single result of a finished run. Anything other than exactly
    /// one value on the stack is an internal-consistency failure.
    pub fn pop_result(&mut self) -> Result<Value, ExecError> {
        match self.stack.len() {
            0 => Err(ExecError::EmptyResult),
            1 => self.pop(Opcode::Pop),
            n => Err(ExecError::ResidualStack { expected: 1, actual: n }),
        }
    }

    /// Execute a compiled program. The stack must end holding exactly one
    /// value per top-level statement; they are drained into the outcome.
    pub fn run(&mut self, bc: &Bytecode) -> Result<VmOutcome, ExecError> {
        let steps = self.execute(&bc.code)?;
        if self.stack.len() != bc.statements {
            self.state = VmState::HaltedError;
            return Err(ExecError::ResidualStack {
                expected: bc.statements,
                actual: self.stack.len(),
            });
        }
        if self.stack.is_empty() {
            self.state = VmState::HaltedError;
            return Err(ExecError::EmptyResult);
        }
        debug!(steps, values = self.stack.len(), key = %KeyId::of(self.key), "vm run complete");
        Ok(VmOutcome {
            values: std::mem::take(&mut self.stack),
            steps,
        })
    }
}
