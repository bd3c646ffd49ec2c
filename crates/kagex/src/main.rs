use clap::{Parser, Subcommand};
use colored::Colorize;
use kage_vm::KageError;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

/// Standardized exit codes.
/// 0 = OK, 1 = other, 2 = input/config, 3 = crypto (key, envelope, auth), 4 = parse/compile/bytecode.
#[allow(dead_code)]
const EXIT_OK: i32 = 0;
const EXIT_OTHER: i32 = 1;
const EXIT_INPUT: i32 = 2;
const EXIT_CRYPTO: i32 = 3;
const EXIT_SYNTAX: i32 = 4;

#[derive(Parser, Debug)]
#[command(name = "kagex", version, about = "Kage CLI: run, compile, disassemble, peel")]
struct Cli {
    /// Key as 64 hex chars or base64 of 32 bytes
    #[arg(long, env = "KAGE_KEY", global = true, hide_env_values = true)]
    key: Option<String>,

    /// File holding the key (32 raw bytes, or hex/base64 text)
    #[arg(long, env = "KAGE_KEY_FILE", global = true)]
    key_file: Option<PathBuf>,

    /// Maximum VM stack depth (unbounded when unset)
    #[arg(long, env = "KAGE_STACK_SIZE", global = true)]
    stack_limit: Option<usize>,

    /// Maximum keyword nesting per statement
    #[arg(long, env = "KAGE_MAX_DEPTH", global = true)]
    max_depth: Option<usize>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging on stderr (KAGE_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a program and print the last statement's value
    Run {
        /// Source file (or - for stdin)
        #[arg(default_value = "-")]
        input: String,
        /// Print every statement's value
        #[arg(long)]
        all: bool,
    },
    /// Run a program, then strip every encryption layer from the result
    Eval {
        /// Source file (or - for stdin)
        #[arg(default_value = "-")]
        input: String,
    },
    /// Parse a program and print its syntax tree as JSON
    Parse {
        /// Source file (or - for stdin)
        #[arg(default_value = "-")]
        input: String,
    },
    /// Compile a program to a KBC1 bytecode file
    Compile {
        /// Source file (or - for stdin)
        input: String,
        /// Output path
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Execute a KBC1 bytecode file
    Exec {
        /// Bytecode file
        file: PathBuf,
    },
    /// Disassemble a KBC1 bytecode file (or source with --source)
    Disasm {
        /// Bytecode or source file
        file: String,
        /// Treat the input as source and compile it first
        #[arg(long)]
        source: bool,
    },
    /// Encrypt one string
    Encrypt {
        /// Plaintext (or - for stdin)
        #[arg(default_value = "-")]
        text: String,
    },
    /// Decrypt one envelope
    Decrypt {
        /// Envelope text (or - for stdin)
        #[arg(default_value = "-")]
        envelope: String,
    },
    /// Strip every layer the key can open
    Peel {
        /// Envelope text (or - for stdin)
        #[arg(default_value = "-")]
        envelope: String,
    },
    /// Generate a random key
    Keygen {
        /// Print base64 instead of hex
        #[arg(long)]
        base64: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("KAGE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Map an error chain to an exit code by its root category.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(k) = err.downcast_ref::<KageError>() {
        return match k {
            KageError::Crypto(_) => EXIT_CRYPTO,
            KageError::Exec(e) if e.crypto().is_some() => EXIT_CRYPTO,
            KageError::Exec(_) => EXIT_OTHER,
            KageError::Parse(_) | KageError::Compile(_) | KageError::Tlv(_) => EXIT_SYNTAX,
        };
    }
    if err.downcast_ref::<config::ConfigError>().is_some()
        || err.downcast_ref::<std::io::Error>().is_some()
    {
        return EXIT_INPUT;
    }
    EXIT_OTHER
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = commands::dispatch(&cli) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        process::exit(exit_code_for(&e));
    }
}
