//! # Lattice Block Log CLI
//!
//! Operator tool for inspecting and exercising block log directories:
//!
//! ```text
//! lattice-blocklog generate --dir DIR --blocks N [--vchain ID] [--seed S]
//! lattice-blocklog stats    (--dir DIR [--vchain ID] | --config FILE)
//! lattice-blocklog scan     (--dir DIR [--vchain ID] | --config FILE)
//!                           [--from H] [--page N] [--json]
//! ```
//!
//! Attaching takes the directory's exclusive lock, so the tool operates on
//! logs no node is currently using.

use std::process::ExitCode;

use rand::rngs::StdRng;
use rand::SeedableRng;

use lattice_blocklog::{BlockLogConfig, BlockPersistence, FilesystemPersistence};
use lattice_types::{build_random_chain, BlockPair};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    let result = match command.as_str() {
        "generate" => cmd_generate(&args[1..]),
        "stats" => cmd_stats(&args[1..]),
        "scan" => cmd_scan(&args[1..]),
        "help" | "--help" | "-h" => {
            println!("{USAGE}");
            Ok(())
        }
        other => Err(format!("unknown command `{other}`\n{USAGE}")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

const USAGE: &str = "\
usage:
  lattice-blocklog generate --dir DIR --blocks N [--vchain ID] [--seed S]
  lattice-blocklog stats    (--dir DIR [--vchain ID] | --config FILE)
  lattice-blocklog scan     (--dir DIR [--vchain ID] | --config FILE)
                            [--from H] [--page N] [--json]";

/// Flag/value pairs from the command line.
struct Flags {
    pairs: Vec<(String, String)>,
    switches: Vec<String>,
}

impl Flags {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut pairs = Vec::new();
        let mut switches = Vec::new();
        let mut iter = args.iter().peekable();
        while let Some(flag) = iter.next() {
            if !flag.starts_with("--") {
                return Err(format!("unexpected argument `{flag}`"));
            }
            match iter.peek() {
                Some(value) if !value.starts_with("--") => {
                    pairs.push((flag.clone(), (*value).clone()));
                    iter.next();
                }
                _ => switches.push(flag.clone()),
            }
        }
        Ok(Self { pairs, switches })
    }

    fn get(&self, flag: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(f, _)| f == flag)
            .map(|(_, v)| v.as_str())
    }

    fn get_parsed<T: std::str::FromStr>(&self, flag: &str) -> Result<Option<T>, String> {
        self.get(flag)
            .map(|v| v.parse().map_err(|_| format!("invalid value for {flag}: `{v}`")))
            .transpose()
    }

    fn has(&self, flag: &str) -> bool {
        self.switches.iter().any(|f| f == flag)
    }
}

fn config_from_flags(flags: &Flags) -> Result<BlockLogConfig, String> {
    if let Some(path) = flags.get("--config") {
        return BlockLogConfig::from_json_file(path).map_err(|e| e.to_string());
    }
    let dir = flags
        .get("--dir")
        .ok_or("either --dir or --config is required")?;
    let mut config = BlockLogConfig::new(dir);
    if let Some(vchain) = flags.get_parsed::<u32>("--vchain")? {
        config = config.with_virtual_chain_id(vchain);
    }
    Ok(config)
}

fn attach(config: BlockLogConfig) -> Result<FilesystemPersistence, String> {
    let persistence = FilesystemPersistence::open(config).map_err(|e| e.to_string())?;
    tracing::debug!(
        top_height = persistence.metrics().top_height(),
        size_on_disk = persistence.metrics().size_on_disk_bytes(),
        "attached to block log"
    );
    Ok(persistence)
}

fn cmd_generate(args: &[String]) -> Result<(), String> {
    let flags = Flags::parse(args)?;
    let config = config_from_flags(&flags)?;
    let blocks: u64 = flags
        .get_parsed("--blocks")?
        .ok_or("--blocks is required")?;
    let seed: u64 = flags.get_parsed("--seed")?.unwrap_or(42);

    let persistence = attach(config)?;
    if persistence.get_last_block_height().map_err(|e| e.to_string())? != 0 {
        return Err("refusing to generate into a non-empty block log".into());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let chain = build_random_chain(&mut rng, blocks);
    for block in chain {
        persistence
            .write_next_block(block)
            .map_err(|e| e.to_string())?;
    }

    println!(
        "generated {blocks} blocks, {} bytes on disk",
        persistence.metrics().size_on_disk_bytes()
    );
    persistence.graceful_shutdown();
    Ok(())
}

fn cmd_stats(args: &[String]) -> Result<(), String> {
    let flags = Flags::parse(args)?;
    let config = config_from_flags(&flags)?;
    let path = config.blocks_file_path();

    let persistence = attach(config)?;
    let top = persistence
        .get_last_block_height()
        .map_err(|e| e.to_string())?;

    println!("blocks file:   {}", path.display());
    println!("top height:    {top}");
    println!(
        "size on disk:  {} bytes",
        persistence.metrics().size_on_disk_bytes()
    );
    if let Some(block) = persistence.get_last_block().map_err(|e| e.to_string())? {
        println!("top hash:      0x{}", hex::encode(block.block_hash()));
        println!("top timestamp: {}", block.timestamp());
    }
    Ok(())
}

fn cmd_scan(args: &[String]) -> Result<(), String> {
    let flags = Flags::parse(args)?;
    let config = config_from_flags(&flags)?;
    let from: u64 = flags.get_parsed("--from")?.unwrap_or(1);
    let page: u8 = flags.get_parsed("--page")?.unwrap_or(10);
    let as_json = flags.has("--json");

    let persistence = attach(config)?;
    if persistence
        .get_last_block_height()
        .map_err(|e| e.to_string())?
        == 0
    {
        println!("block log is empty");
        return Ok(());
    }

    let mut failure: Option<String> = None;
    persistence
        .scan_blocks(from, page, &mut |_, blocks| {
            for block in blocks {
                match render_block(block, as_json) {
                    Ok(line) => println!("{line}"),
                    Err(e) => {
                        failure = Some(e);
                        return false;
                    }
                }
            }
            true
        })
        .map_err(|e| e.to_string())?;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn render_block(block: &BlockPair, as_json: bool) -> Result<String, String> {
    if as_json {
        serde_json::to_string(&serde_json::json!({
            "height": block.height(),
            "timestamp": block.timestamp(),
            "hash": format!("0x{}", hex::encode(block.block_hash())),
            "transactions": block.transactions_block.signed_transactions.len(),
            "receipts": block.results_block.transaction_receipts.len(),
            "state_diffs": block.results_block.contract_state_diffs.len(),
        }))
        .map_err(|e| e.to_string())
    } else {
        Ok(format!(
            "height {:>8}  ts {}  txs {:>3}  receipts {:>3}  diffs {:>3}  hash 0x{}",
            block.height(),
            block.timestamp(),
            block.transactions_block.signed_transactions.len(),
            block.results_block.transaction_receipts.len(),
            block.results_block.contract_state_diffs.len(),
            hex::encode(&block.block_hash()[..8]),
        ))
    }
}
