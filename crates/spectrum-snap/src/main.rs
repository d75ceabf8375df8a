//! `spectrum-snap`: print what a snapshot holds, or convert it to another
//! format.
//!
//! ```text
//! spectrum-snap info game.z80
//! spectrum-snap convert game.sna game.z80 --z80-version v2
//! spectrum-snap convert game.z80 game.bin --format zx82
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use emu_spectrum::snapshot::z80::{self, Z80Options, Z80Version};
use emu_spectrum::snapshot::zx82;
use emu_spectrum::{PagingMode, Snapshot, SnapshotFormat};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spectrum-snap", version, about)]
struct Cli {
    /// Log decoding details (repeat for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print model, registers, interrupt state, border and paging.
    Info { file: PathBuf },

    /// Decode a snapshot and write it in another format.
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// Output format; defaults to the output file's extension.
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Z80 header version.
        #[arg(long, value_enum)]
        z80_version: Option<Z80VersionArg>,

        /// Store memory uncompressed (Z80 v1/v3, ZX82).
        #[arg(long)]
        no_compress: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Sna,
    Z80,
    Sp,
    Zx,
    Zx82,
}

impl From<FormatArg> for SnapshotFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Sna => Self::Sna,
            FormatArg::Z80 => Self::Z80,
            FormatArg::Sp => Self::Sp,
            FormatArg::Zx => Self::Zx,
            FormatArg::Zx82 => Self::Zx82,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Z80VersionArg {
    V1,
    V2,
    V3,
    #[value(name = "v3.1")]
    V3_1,
}

impl From<Z80VersionArg> for Z80Version {
    fn from(arg: Z80VersionArg) -> Self {
        match arg {
            Z80VersionArg::V1 => Self::V1,
            Z80VersionArg::V2 => Self::V2,
            Z80VersionArg::V3 => Self::V3,
            Z80VersionArg::V3_1 => Self::V3_1,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Info { file } => info_command(&file),
        Command::Convert {
            input,
            output,
            format,
            z80_version,
            no_compress,
        } => convert(&input, &output, format, z80_version, !no_compress),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<Snapshot> {
    Snapshot::load(path).with_context(|| format!("failed to load {}", path.display()))
}

fn info_command(path: &Path) -> Result<()> {
    let snapshot = load(path)?;
    let r = &snapshot.registers;

    println!("{:<10}{}", "File", path.display());
    println!("{:<10}{}", "Model", snapshot.model());
    println!(
        "{:<10}AF={:04X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X}",
        "Main",
        r.af(),
        r.bc(),
        r.de(),
        r.hl(),
        r.ix,
        r.iy
    );
    println!(
        "{:<10}AF'={:04X} BC'={:04X} DE'={:04X} HL'={:04X}",
        "Alternate",
        r.af_alt(),
        r.bc_alt(),
        r.de_alt(),
        r.hl_alt()
    );
    println!(
        "{:<10}PC={:04X} SP={:04X} I={:02X} R={:02X}",
        "Control", r.pc, r.sp, r.i, r.r
    );
    println!(
        "{:<10}IM {} IFF1={} IFF2={}",
        "Interrupt",
        r.im,
        u8::from(r.iff1),
        u8::from(r.iff2)
    );
    println!("{:<10}{}", "Border", snapshot.border);

    if let Some(paging) = snapshot.paging() {
        let mode = match paging.mode {
            PagingMode::Normal => format!("ROM {} RAM {}", paging.rom, paging.ram_bank),
            PagingMode::Special(config) => format!("special configuration {config}"),
        };
        println!(
            "{:<10}{mode}, screen {}, {}",
            "Paging",
            paging.screen_bank(),
            if paging.enabled { "unlocked" } else { "locked" }
        );
    }
    Ok(())
}

fn convert(
    input: &Path,
    output: &Path,
    format: Option<FormatArg>,
    z80_version: Option<Z80VersionArg>,
    compress: bool,
) -> Result<()> {
    let snapshot = load(input)?;
    let format = match format {
        Some(arg) => SnapshotFormat::from(arg),
        None => SnapshotFormat::from_path(output)
            .context("cannot tell the output format; pass --format")?,
    };
    if z80_version.is_some() && format != SnapshotFormat::Z80 {
        bail!("--z80-version only applies to Z80 output");
    }
    if !format.supports(snapshot.model()) {
        bail!("{format} files cannot hold a {} snapshot", snapshot.model());
    }

    let bytes = match format {
        SnapshotFormat::Z80 => {
            let options = Z80Options {
                version: z80_version.map(Z80Version::from),
                compress,
            };
            z80::encode_with(&snapshot, &options)
        }
        SnapshotFormat::Zx82 => zx82::encode_with(&snapshot, compress),
        other => other.encode(&snapshot),
    }
    .with_context(|| format!("failed to encode {format}"))?;

    std::fs::write(output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(
        model = %snapshot.model(),
        %format,
        bytes = bytes.len(),
        "wrote {}",
        output.display()
    );
    Ok(())
}
