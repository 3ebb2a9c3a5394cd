// Command-line front end.
//
// Explicit subcommands over the file-level operations:
//
//   oxibsdiff diff  <SRC> <DST> <PATCH>     write a patch
//   oxibsdiff patch <SRC> <DST> <PATCH>     apply a patch (in place when
//                                           SRC and DST are the same file)
//   oxibsdiff info  <PATCH>                 inspect a patch header
//
// The container variant is selected with `--format`; `info --json` emits a
// machine-readable summary.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::format::{self, Format};
use crate::io::{file_diff, file_patch};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// BSDIFF4/BSDF2 binary patch tool.
#[derive(Parser, Debug)]
#[command(
    name = "oxibsdiff",
    version,
    about = "BSDIFF4/BSDF2 binary diff/patch tool",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Write a patch transforming SRC into DST.
    Diff {
        src: PathBuf,
        dst: PathBuf,
        patch: PathBuf,

        /// Container format to write.
        #[arg(long, value_enum, default_value_t = FormatArg::Legacy)]
        format: FormatArg,
    },
    /// Apply PATCH to SRC, writing DST (in place when SRC == DST).
    Patch {
        src: PathBuf,
        dst: PathBuf,
        patch: PathBuf,

        /// Container format to expect.
        #[arg(long, value_enum, default_value_t = FormatArg::Legacy)]
        format: FormatArg,
    },
    /// Print patch header information without applying it.
    Info {
        patch: PathBuf,

        /// Container format to expect.
        #[arg(long, value_enum, default_value_t = FormatArg::Legacy)]
        format: FormatArg,

        /// Emit the summary as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// BSDIFF4 (bzip2 sections).
    Legacy,
    /// BSDF2 (Brotli sections).
    Bsdf2,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Legacy => Format::Legacy,
            FormatArg::Bsdf2 => Format::Modern,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_diff(cli: &Cli, src: &PathBuf, dst: &PathBuf, patch: &PathBuf, format: Format) -> i32 {
    if patch.exists() && !cli.force {
        eprintln!(
            "oxibsdiff: output file exists, use -f to overwrite: {}",
            patch.display()
        );
        return 1;
    }
    match file_diff(src, dst, patch, format) {
        Ok(()) => {
            if cli.verbose > 0 && !cli.quiet {
                eprintln!("oxibsdiff: wrote {format} patch to {}", patch.display());
            }
            0
        }
        Err(e) => {
            eprintln!("oxibsdiff: diff: {e}");
            1
        }
    }
}

fn cmd_patch(cli: &Cli, src: &PathBuf, dst: &PathBuf, patch: &PathBuf, format: Format) -> i32 {
    match file_patch(src, dst, patch, format) {
        Ok(()) => {
            if cli.verbose > 0 && !cli.quiet {
                eprintln!("oxibsdiff: patched {} -> {}", src.display(), dst.display());
            }
            0
        }
        Err(e) => {
            eprintln!("oxibsdiff: patch: {e}");
            1
        }
    }
}

fn cmd_info(patch: &PathBuf, format: Format, json: bool) -> i32 {
    let file = match File::open(patch) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("oxibsdiff: info: {}: {e}", patch.display());
            return 1;
        }
    };
    let info = match format::read_info(&mut BufReader::new(file), format) {
        Ok(info) => info,
        Err(e) => {
            eprintln!("oxibsdiff: info: {e}");
            return 1;
        }
    };

    if json {
        let summary = serde_json::json!({
            "format": format.to_string(),
            "control_compressed_len": info.control_len,
            "diff_compressed_len": info.diff_len,
            "destination_len": info.dst_len,
            "control_tuples": info.control.len(),
        });
        println!("{summary}");
    } else {
        println!("format:             {format}");
        println!("control (compressed): {} bytes", info.control_len);
        println!("diff (compressed):    {} bytes", info.diff_len);
        println!("destination length:   {} bytes", info.dst_len);
        println!("control tuples:       {}", info.control.len());
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Cmd::Diff {
            ref src,
            ref dst,
            ref patch,
            format,
        } => cmd_diff(&cli, src, dst, patch, format.into()),
        Cmd::Patch {
            ref src,
            ref dst,
            ref patch,
            format,
        } => cmd_patch(&cli, src, dst, patch, format.into()),
        Cmd::Info {
            ref patch,
            format,
            json,
        } => cmd_info(patch, format.into(), json),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
