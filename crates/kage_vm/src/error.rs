use crate::compiler::CompileError;
use crate::crypto::CryptoError;
use crate::exec::ExecError;
use crate::parser::ParseError;
use crate::tlv::TlvError;
use thiserror::Error;

/// First failure from any phase of the pipeline.
#[derive(Error, Debug)]
pub enum KageError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("compile: {0}")]
    Compile(#[from] CompileError),
    #[error("vm: {0}")]
    Exec(#[from] ExecError),
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Tlv(#[from] TlvError),
}

impl KageError {
    /// Crypto failure, whether raised directly or from inside the VM.
    pub fn crypto(&self) -> Option<&CryptoError> {
        match self {
            KageError::Crypto(e) => Some(e),
            KageError::Exec(e) => e.crypto(),
            _ => None,
        }
    }

    pub fn parse(&self) -> Option<&ParseError> {
        match self {
            KageError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, KageError>;
