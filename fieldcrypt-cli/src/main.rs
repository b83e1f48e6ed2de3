//! `fieldcrypt` CLI tool for encrypting and decrypting document fields.

#![warn(clippy::pedantic, clippy::nursery)]

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fieldcrypt::prelude::*;
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "fieldcrypt")]
#[command(about = "Field-level encryption for JSON documents", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt fields of a JSON document
    Encrypt {
        #[command(flatten)]
        common: CommonArgs,

        /// Field to encrypt, as a dotted path with an optional `=alias`
        #[arg(short, long = "field", value_name = "PATH[=ALIAS]", value_parser = parse_field, required = true)]
        fields: Vec<EncryptedField>,
    },
    /// Decrypt every encrypted field of a JSON document
    Decrypt {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// File holding the hex-encoded 64-byte key
    #[arg(short, long, env = "FIELDCRYPT_KEY_FILE")]
    key_file: PathBuf,

    /// Key identifier recorded in encrypted nodes
    #[arg(long, env = "FIELDCRYPT_KEY_ID", default_value = "default")]
    key_id: String,

    /// Prefix marking encrypted field names
    #[arg(long, env = "FIELDCRYPT_PREFIX", default_value = fieldcrypt::manager::DEFAULT_ENCRYPTED_FIELD_NAME_PREFIX)]
    prefix: String,

    /// Input document (defaults to stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output document (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the output document
    #[arg(long)]
    pretty: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("fieldcrypt=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).without_time())
        .init();

    if let Err(e) = run(cli.command) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Encrypt { common, fields } => {
            let aliases: BTreeSet<&str> = fields.iter().filter_map(|f| f.alias.as_deref()).collect();
            let transcoder = transcoder(&common, &aliases)?;
            let input = read_input(common.input.as_deref())?;
            let encrypted = transcoder
                .encrypt_bytes(&input, &fields)
                .context("failed to encrypt document")?;
            write_output(common.output.as_deref(), &encrypted, common.pretty)
        }
        Commands::Decrypt { common } => {
            let transcoder = transcoder(&common, &BTreeSet::new())?;
            let input = read_input(common.input.as_deref())?;
            let decrypted = transcoder
                .decrypt_bytes(&input)
                .context("failed to decrypt document")?;
            write_output(common.output.as_deref(), &decrypted, common.pretty)
        }
    }
}

/// Parses `a.b.c` or `a.b.c=alias`.
fn parse_field(value: &str) -> Result<EncryptedField, String> {
    let (path, alias) = match value.split_once('=') {
        Some((path, alias)) => (path, Some(alias)),
        None => (value, None),
    };
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(format!("invalid field path: {path:?}"));
    }
    let field = EncryptedField::parse(path);
    match alias {
        Some("") => Err("alias must not be empty".to_string()),
        Some(alias) => Ok(field.with_alias(alias)),
        None => Ok(field),
    }
}

fn load_key(path: &Path, key_id: &str) -> Result<Key> {
    let encoded = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {}", path.display()))?;
    let bytes = hex::decode(encoded.trim()).context("key file is not valid hex")?;
    if bytes.len() != fieldcrypt::aead::KEY_SIZE {
        bail!(
            "key must be {} bytes, found {}",
            fieldcrypt::aead::KEY_SIZE,
            bytes.len()
        );
    }
    Ok(Key::new(key_id, bytes))
}

/// Builds a transcoder with one key serving the default encrypter and every alias.
fn transcoder(common: &CommonArgs, aliases: &BTreeSet<&str>) -> Result<Transcoder> {
    let key = load_key(&common.key_file, &common.key_id)?;
    let provider = AeadAes256CbcHmacSha512Provider::new(Arc::new(InsecureKeyring::from_keys([key])));

    let mut manager = DefaultManager::with_prefix(common.prefix.as_str());
    manager.register_default_encrypter(provider.encrypter_for_key(common.key_id.as_str()))?;
    for alias in aliases {
        manager.register_encrypter(*alias, provider.encrypter_for_key(common.key_id.as_str()))?;
    }
    manager.register_decrypter(provider.decrypter())?;

    Ok(Transcoder::new(Arc::new(manager)))
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf).context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&Path>, document: &[u8], pretty: bool) -> Result<()> {
    let mut rendered = if pretty {
        let value: serde_json::Value = serde_json::from_slice(document)?;
        serde_json::to_vec_pretty(&value)?
    } else {
        document.to_vec()
    };
    rendered.push(b'\n');

    match path {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&rendered)?;
            stdout.flush()?;
            Ok(())
        }
    }
}
