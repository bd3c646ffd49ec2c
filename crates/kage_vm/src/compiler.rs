//! AST → bytecode.
//!
//! Post-order: an operand's code comes before its operator, so every
//! statement leaves exactly one value on the stack. Statements are emitted
//! in source order with nothing between them. Keyword chains are walked
//! iteratively; nesting depth costs heap, not native stack.

use crate::ast::{Expr, Program};
use crate::opcode::{Bytecode, Instr};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("compile: program has no statements")]
    EmptyProgram,
}

pub fn compile(program: &Program) -> Result<Bytecode, CompileError> {
    if program.is_empty() {
        return Err(CompileError::EmptyProgram);
    }
    let mut code = Vec::new();
    for stmt in &program.statements {
        compile_expr(stmt, &mut code);
    }
    debug!(statements = program.len(), instructions = code.len(), "compiled program");
    Ok(Bytecode { statements: program.len(), code })
}

fn compile_expr(expr: &Expr, code: &mut Vec<Instr>) {
    let mut pending = Vec::new();
    let mut cur = expr;
    loop {
        match cur {
            Expr::Str { value, offset } => {
                trace!(offset, len = value.len(), "PUSH");
                code.push(Instr::Push(value.clone()));
                break;
            }
            Expr::Encrypt { operand, .. } => {
                pending.push(Instr::Encrypt);
                cur = operand;
            }
            Expr::Decrypt { operand, .. } => {
                pending.push(Instr::Decrypt);
                cur = operand;
            }
        }
    }
    // innermost operator runs first
    code.extend(pending.into_iter().rev());
}
