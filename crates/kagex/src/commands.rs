use crate::config;
use crate::{Cli, Commands};
use anyhow::Context;
use colored::Colorize;
use kage_vm::parser::parse_with;
use kage_vm::{
    codec, compile, decrypt_value, encrypt_value, execute_bytecode, peel, run_with, tlv, Bytecode,
    KageError, SecretKey, Value,
};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

pub fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    let opts = config::run_options(cli.stack_limit, cli.max_depth);
    let key = || config::resolve_key(cli.key.as_deref(), cli.key_file.as_deref());

    match &cli.command {
        Commands::Run { input, all } => {
            let src = read_source(input)?;
            let key = key()?;
            let out = run_with(&src, key.as_bytes(), &opts)?;
            tracing::debug!(steps = out.steps, key = %key.id(), "run finished");
            let shown: &[Value] = if *all {
                &out.values
            } else {
                out.values.last().map(std::slice::from_ref).unwrap_or(&[])
            };
            print_values(shown, cli.json)
        }
        Commands::Eval { input } => {
            let src = read_source(input)?;
            let key = key()?;
            let out = run_with(&src, key.as_bytes(), &opts)?;
            let value = out.into_result().map_err(KageError::from)?;
            let peeled = peel(value, key.as_bytes());
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "value": peeled.value, "layers": peeled.layers })
                );
            } else {
                println!("{}", peeled.value);
                eprintln!("{} {}", "layers:".dimmed(), peeled.layers);
            }
            Ok(())
        }
        Commands::Parse { input } => {
            let src = read_source(input)?;
            let program = parse_with(&src, opts.parser).map_err(KageError::from)?;
            println!("{}", serde_json::to_string_pretty(&program)?);
            Ok(())
        }
        Commands::Compile { input, out } => {
            let src = read_source(input)?;
            let program = parse_with(&src, opts.parser).map_err(KageError::from)?;
            let bc = compile(&program).map_err(KageError::from)?;
            let bytes = tlv::encode_bytecode(&bc).map_err(KageError::from)?;
            fs::write(out, &bytes).with_context(|| format!("write {}", out.display()))?;
            println!(
                "{} {} ({} instructions, {} bytes)",
                "wrote".green(),
                out.display(),
                bc.len(),
                bytes.len()
            );
            Ok(())
        }
        Commands::Exec { file } => {
            let bc = load_bytecode(file)?;
            let key = key()?;
            let out = execute_bytecode(&bc, key.as_bytes(), opts.vm)?;
            let last = out.into_result().map_err(KageError::from)?;
            print_values(std::slice::from_ref(&last), cli.json)
        }
        Commands::Disasm { file, source } => {
            let bc = if *source {
                let src = read_source(file)?;
                let program = parse_with(&src, opts.parser).map_err(KageError::from)?;
                compile(&program).map_err(KageError::from)?
            } else {
                load_bytecode(Path::new(file))?
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&bc)?);
            } else {
                println!("{} {}", "; statements:".dimmed(), bc.statements);
                print!("{}", bc.disassemble());
            }
            Ok(())
        }
        Commands::Encrypt { text } => {
            let plain = read_text(text)?;
            let key = key()?;
            let sealed = encrypt_value(&plain, key.as_bytes())?;
            print_values(std::slice::from_ref(&sealed), cli.json)
        }
        Commands::Decrypt { envelope } => {
            let env = read_text(envelope)?;
            let key = key()?;
            let opened = decrypt_value(env.trim(), key.as_bytes())?;
            print_values(std::slice::from_ref(&opened), cli.json)
        }
        Commands::Peel { envelope } => {
            let env = read_text(envelope)?;
            let key = key()?;
            let peeled = peel(Value::Str(env.trim().to_string()), key.as_bytes());
            if peeled.layers == 0 {
                eprintln!("{}", "warning: nothing opened under this key".yellow());
            }
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "value": peeled.value, "layers": peeled.layers })
                );
            } else {
                println!("{}", peeled.value);
                eprintln!("{} {}", "layers:".dimmed(), peeled.layers);
            }
            Ok(())
        }
        Commands::Keygen { base64 } => {
            let key = SecretKey::generate().map_err(KageError::from)?;
            if *base64 {
                println!("{}", codec::encode(key.as_bytes()));
            } else {
                println!("{}", hex::encode(key.as_bytes()));
            }
            eprintln!("{} {}", "id:".dimmed(), key.id().to_string().cyan());
            Ok(())
        }
    }
}

// ── input ───────────────────────────────────────────────────────

fn read_stdin() -> anyhow::Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("read stdin")?;
    Ok(buf)
}

/// Program text from a file, or stdin for `-`.
fn read_source(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        return read_stdin();
    }
    fs::read_to_string(input).with_context(|| format!("read source {input}"))
}

/// Literal argument text, or stdin for `-` (one trailing newline dropped).
fn read_text(arg: &str) -> anyhow::Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut buf = read_stdin()?;
    if buf.ends_with('\n') {
        buf.pop();
        if buf.ends_with('\r') {
            buf.pop();
        }
    }
    Ok(buf)
}

fn load_bytecode(path: &Path) -> anyhow::Result<Bytecode> {
    let bytes = fs::read(path).with_context(|| format!("read bytecode {}", path.display()))?;
    let bc = tlv::decode_bytecode(&bytes).map_err(KageError::from)?;
    Ok(bc)
}

// ── output ──────────────────────────────────────────────────────

fn print_values(values: &[Value], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(values)?);
        return Ok(());
    }
    for v in values {
        match v {
            Value::Str(_) => println!("{v}"),
            Value::Bytes(_) => println!("{}", v.to_string().yellow()),
        }
    }
    Ok(())
}
