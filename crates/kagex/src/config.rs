//! Key and limit resolution for the CLI.
//!
//! Key lookup order:
//!   1. `--key` flag
//!   2. `KAGE_KEY` env (handled by clap, same field)
//!   3. `--key-file` / `KAGE_KEY_FILE`

use kage_vm::{CryptoError, ParserConfig, RunOptions, SecretKey, VmConfig, KEY_SIZE};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing key: pass --key, set KAGE_KEY, or point --key-file at one")]
    MissingKey,
    #[error("bad key: {0} (expected 64 hex chars or base64 of 32 bytes)")]
    BadKey(CryptoError),
    #[error("read key file {path}: {source}")]
    ReadKeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Accepts 64 hex characters, else standard base64 of 32 bytes.
pub fn parse_key_text(text: &str) -> Result<SecretKey, ConfigError> {
    let t = text.trim();
    if t.len() == KEY_SIZE * 2 && t.bytes().all(|b| b.is_ascii_hexdigit()) {
        return SecretKey::from_hex(t).map_err(ConfigError::BadKey);
    }
    SecretKey::from_base64(t).map_err(ConfigError::BadKey)
}

/// A key file holds either exactly 32 raw bytes or key text.
pub fn read_key_file(path: &Path) -> Result<SecretKey, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::ReadKeyFile {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.len() == KEY_SIZE {
        return SecretKey::from_slice(&bytes).map_err(ConfigError::BadKey);
    }
    parse_key_text(&String::from_utf8_lossy(&bytes))
}

pub fn resolve_key(flag: Option<&str>, file: Option<&Path>) -> Result<SecretKey, ConfigError> {
    match (flag, file) {
        (Some(text), _) => parse_key_text(text),
        (None, Some(path)) => read_key_file(path),
        (None, None) => Err(ConfigError::MissingKey),
    }
}

pub fn run_options(stack_limit: Option<usize>, max_depth: Option<usize>) -> RunOptions {
    let mut parser = ParserConfig::default();
    if let Some(d) = max_depth {
        parser.max_depth = d;
    }
    RunOptions {
        parser,
        vm: VmConfig { stack_limit },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("kagex-{}-{name}", std::process::id()));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn hex_and_base64_keys() {
        let hex_key = "41".repeat(32);
        let a = parse_key_text(&hex_key).unwrap();
        let b = parse_key_text("QUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUE=").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes(), &[b'A'; 32]);
    }

    #[test]
    fn short_keys_are_rejected() {
        assert!(matches!(parse_key_text("abcd"), Err(ConfigError::BadKey(_))));
        assert!(matches!(parse_key_text("123abc"), Err(ConfigError::BadKey(_))));
    }

    #[test]
    fn raw_key_file() {
        let path = scratch("raw", &[7u8; 32]);
        assert_eq!(read_key_file(&path).unwrap().as_bytes(), &[7u8; 32]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn text_key_file_with_newline() {
        let path = scratch("text", format!("{}\n", "07".repeat(32)).as_bytes());
        assert_eq!(read_key_file(&path).unwrap().as_bytes(), &[7u8; 32]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn flag_beats_file_and_absence_is_an_error() {
        let path = scratch("prec", &[9u8; 32]);
        let k = resolve_key(Some(&"41".repeat(32)), Some(&path)).unwrap();
        assert_eq!(k.as_bytes(), &[b'A'; 32]);
        assert!(matches!(resolve_key(None, None), Err(ConfigError::MissingKey)));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_key_file_reports_path() {
        let err = read_key_file(Path::new("/nonexistent/kage.key")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/kage.key"));
    }

    #[test]
    fn limits_map_into_run_options() {
        let o = run_options(Some(8), Some(3));
        assert_eq!(o.vm.stack_limit, Some(8));
        assert_eq!(o.parser.max_depth, 3);
        assert_eq!(run_options(None, None), RunOptions::default());
    }
}
