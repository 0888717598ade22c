use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser, Subcommand};
use fitdecoder::{DecodeOptions, FitFile, Profile};
use tracing::{Level, info};

#[derive(Parser)]
#[command(name = "fitdecoder", version, about, color = ColorChoice::Auto)]
struct Args {
    #[command(subcommand)]
    cmd: Commands,

    /// Configure diagnostic logging level
    ///
    /// Set to WARN to see recoverable irregularities such as unknown base
    /// types, or DEBUG to trace every record.
    #[clap(long, default_value_t = Level::ERROR)]
    log: Level,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a file's header and verify its checksums
    Check(CheckArgs),

    /// Decode a file and print every message
    Dump(DumpArgs),
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// FIT input path
    input: PathBuf,
}

#[derive(Parser, Debug)]
struct DumpArgs {
    /// FIT input path
    input: PathBuf,

    /// Profile JSON extracted from the FIT SDK
    ///
    /// Without a profile, messages and fields print under their generated
    /// unknown_msg_* / unknown_field_* names.
    #[clap(long, short)]
    profile: Option<PathBuf>,

    /// Print raw values: no invalid masking, scaling, or date conversion
    #[clap(long, action)]
    raw: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_max_level(args.log).init();

    match args.cmd {
        Commands::Check(check_args) => run_check(check_args),
        Commands::Dump(dump_args) => run_dump(dump_args),
    }
}

fn run_check(args: CheckArgs) -> Result<()> {
    let fit = FitFile::open(&args.input)
        .with_context(|| format!("Opening {}", args.input.display()))?;
    let header = fit.header();

    println!("header size:      {}", header.header_size);
    println!(
        "protocol version: {}.{}",
        header.protocol_version >> 4,
        header.protocol_version & 0x0F
    );
    println!("profile version:  {}", header.profile_version);
    println!("data size:        {} bytes", header.data_size);
    match header.crc {
        Some(crc) => println!("header crc:       {crc:#06x} (ok)"),
        None => println!("header crc:       absent"),
    }

    fit.verify_checksum().context("Verifying the file trailer")?;
    println!("trailer crc:      ok");
    Ok(())
}

fn run_dump(args: DumpArgs) -> Result<()> {
    let profile = match &args.profile {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Reading profile {}", path.display()))?;
            serde_json::from_str::<Profile>(&json)
                .with_context(|| format!("Parsing profile {}", path.display()))?
        }
        None => Profile::new(),
    };

    let options = if args.raw {
        DecodeOptions::default()
            .with_process_invalids(false)
            .with_apply_scale_offset(false)
            .with_convert_datetime(false)
    } else {
        DecodeOptions::default()
    };

    let fit = FitFile::open(&args.input)
        .with_context(|| format!("Opening {}", args.input.display()))?;
    let decoded = fit.decode(&profile, options)?;
    info!(
        groups = decoded.names().len(),
        messages = decoded.num_messages(),
        "Decoded {}",
        args.input.display()
    );

    for (_, messages) in decoded.iter() {
        for message in messages {
            print!("{message}");
        }
    }
    Ok(())
}
