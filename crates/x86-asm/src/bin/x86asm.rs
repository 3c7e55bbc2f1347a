use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use log::info;

use x86_asm::{AsmError, Assembler, TargetMode};

/// Assemble Intel-syntax x86 source into raw machine code.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
struct Arguments {
    /// Initial target mode in bits.
    #[arg(short, long, default_value_t = 64, value_parser = clap::value_parser!(u32).range(16..=64))]
    mode: u32,

    /// Address of the first output byte (decimal or 0x-prefixed hex).
    #[arg(short, long, default_value = "0", value_parser = parse_address)]
    base: u64,

    /// Write the raw bytes here instead of printing hex to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print an address / bytes / source listing.
    #[arg(long, action = ArgAction::SetTrue)]
    listing: bool,

    #[arg(required = true)]
    input: PathBuf,
}

fn parse_address(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

fn report(path: &str, err: &AsmError) {
    match err {
        AsmError::Multiple { errors } => {
            for e in errors {
                report(path, e);
            }
        }
        e => eprintln!("{}:{}", path, e),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Arguments::parse();

    let Some(mode) = TargetMode::from_bits(args.mode) else {
        bail!("unsupported mode {}: expected 16, 32 or 64", args.mode);
    };
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let name = args.input.display().to_string();

    let mut asm = Assembler::new(mode);
    asm.base_address(args.base);
    if args.listing {
        asm.enable_listing();
    }
    let emitted = asm.emit(&source).map(|_| ());
    let result = match emitted.and_then(|()| asm.finish()) {
        Ok(r) => r,
        Err(err) => {
            report(&name, &err);
            bail!("assembly of {} failed", name);
        }
    };
    info!("{}: {} bytes", name, result.len());

    if args.listing {
        print!("{}", result.listing());
    }
    match &args.output {
        Some(path) => fs::write(path, result.bytes())
            .with_context(|| format!("writing {}", path.display()))?,
        None if !args.listing => {
            let mut out = io::stdout().lock();
            for chunk in result.bytes().chunks(16) {
                let line: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
                writeln!(out, "{}", line.join(" "))?;
            }
        }
        None => {}
    }
    Ok(())
}
