// Command-line front end for twopfx.
//
// Moves raw RGB24 files (frames concatenated, row-major) in and out of
// 2PFX containers and prints container structure.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::codec::decoder::{self, DecodeOptions};
use crate::codec::delta::ClipPolicy;
use crate::codec::header::{self, MAGIC, MAX_SAMPLES};
use crate::frame::FrameDims;
use crate::io;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// 2PFX lossless temporal-delta codec for RGB frame sequences.
#[derive(Parser, Debug)]
#[command(
    name = "twopfx",
    version,
    about = "2PFX lossless frame-sequence codec",
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

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Encode a raw RGB24 frame file into a 2PFX container.
    Encode(EncodeArgs),
    /// Decode a 2PFX container into a raw RGB24 frame file.
    Decode(DecodeArgs),
    /// Print the container header and per-frame record sizes.
    Info(InfoArgs),
    /// Print build/format details.
    Config,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Frame width in pixels.
    #[arg(long)]
    width: u32,

    /// Frame height in pixels.
    #[arg(long)]
    height: u32,

    /// Raw RGB24 input (frames back to back).
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Container output.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Fail on any reconstructed sample outside 0..=255 instead of clamping.
    #[arg(long)]
    strict: bool,

    /// Container input.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Raw RGB24 output.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Container input.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Encode,
    Decode,
    Info,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    dims: Option<FrameDims>,
    clip_policy: ClipPolicy,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Config,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        dims: None,
        clip_policy: ClipPolicy::Clamp,
        input_file: None,
        output_file: None,
    };

    match cli.command {
        Cmd::Encode(args) => {
            opts.command = Command::Encode;
            opts.dims = Some(FrameDims::new(args.width, args.height));
            opts.input_file = Some(args.input);
            opts.output_file = Some(args.output);
        }
        Cmd::Decode(args) => {
            opts.command = Command::Decode;
            if args.strict {
                opts.clip_policy = ClipPolicy::Strict;
            }
            opts.input_file = Some(args.input);
            opts.output_file = Some(args.output);
        }
        Cmd::Info(args) => {
            opts.command = Command::Info;
            opts.input_file = Some(args.input);
        }
        Cmd::Config => {}
    }

    opts
}

fn log_filter(opts: &Options) -> &'static str {
    match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    }
}

fn hex(digest: &[u8; 32]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn check_output(path: &Path, force: bool) -> Result<(), String> {
    if path.exists() && !force {
        return Err(format!(
            "output file exists, use -f to overwrite: {}",
            path.display()
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    println!("twopfx version {}", env!("CARGO_PKG_VERSION"));
    println!("magic={}", String::from_utf8_lossy(&MAGIC));
    println!("header_len={}", header::HEADER_LEN);
    println!("record_prefix_len={}", header::RECORD_PREFIX_LEN);
    println!("max_samples_per_frame={MAX_SAMPLES}");
    println!("file_io_checksums={}", cfg!(feature = "file-io"));
    0
}

// ---------------------------------------------------------------------------
// Encode command
// ---------------------------------------------------------------------------

fn cmd_encode(opts: &Options) -> i32 {
    let (Some(input), Some(output), Some(dims)) = (&opts.input_file, &opts.output_file, opts.dims)
    else {
        eprintln!("twopfx: encode: missing input, output, or dimensions");
        return 1;
    };
    if let Err(msg) = check_output(output, opts.force) {
        eprintln!("twopfx: {msg}");
        return 1;
    }

    let stats = match io::encode_raw_file(input, dims, output) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("twopfx: encode: {}: {e}", input.display());
            return 1;
        }
    };

    log::info!(
        "encoded {} frames ({}) : {} -> {} bytes, {} escapes",
        stats.frames,
        stats.dims,
        stats.raw_size,
        stats.container_size,
        stats.escapes
    );

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "twopfx: encoder: frames: {}, raw size: {}, container size: {}, ratio: {:.2}",
            stats.frames,
            stats.raw_size,
            stats.container_size,
            stats.ratio()
        );
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "encode",
            "frames": stats.frames,
            "width": stats.dims.width,
            "height": stats.dims.height,
            "raw_size": stats.raw_size,
            "container_size": stats.container_size,
            "escapes": stats.escapes,
            "ratio": stats.ratio(),
            "container_sha256": stats.container_sha256.as_ref().map(hex),
        });
        eprintln!("{json:#}");
    }

    0
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn cmd_decode(opts: &Options) -> i32 {
    let (Some(input), Some(output)) = (&opts.input_file, &opts.output_file) else {
        eprintln!("twopfx: decode: missing input or output");
        return 1;
    };
    if let Err(msg) = check_output(output, opts.force) {
        eprintln!("twopfx: {msg}");
        return 1;
    }

    let decode_opts = DecodeOptions {
        clip_policy: opts.clip_policy,
    };
    let stats = match io::decode_to_raw_file(input, output, decode_opts) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("twopfx: decode: {}: {e}", input.display());
            return 1;
        }
    };

    if stats.clipped_channels > 0 && !opts.quiet {
        eprintln!(
            "twopfx: warning: {} samples were clamped; output may differ from the source",
            stats.clipped_channels
        );
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "twopfx: decoder: frames: {}, dims: {}, container size: {}, raw size: {}",
            stats.frames, stats.dims, stats.container_size, stats.raw_size
        );
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "decode",
            "frames": stats.frames,
            "width": stats.dims.width,
            "height": stats.dims.height,
            "container_size": stats.container_size,
            "raw_size": stats.raw_size,
            "escapes": stats.escapes,
            "clipped_channels": stats.clipped_channels,
            "raw_sha256": stats.raw_sha256.as_ref().map(hex),
        });
        eprintln!("{json:#}");
    }

    0
}

// ---------------------------------------------------------------------------
// Info command
// ---------------------------------------------------------------------------

fn cmd_info(opts: &Options) -> i32 {
    let Some(input) = &opts.input_file else {
        eprintln!("twopfx: info: missing input");
        return 1;
    };
    let file = match File::open(input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("twopfx: input file: {}: {e}", input.display());
            return 1;
        }
    };

    let info = match decoder::inspect(BufReader::new(file)) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("twopfx: info: {}: {e}", input.display());
            return 1;
        }
    };

    if opts.json_output {
        let records: Vec<_> = info
            .records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "bitstream_len": r.bitstream_len,
                    "side_len": r.side_len,
                    "escapes": r.escapes,
                })
            })
            .collect();
        let json = serde_json::json!({
            "command": "info",
            "frames": info.header.frame_count,
            "width": info.header.dims.width,
            "height": info.header.dims.height,
            "container_size": info.total_len,
            "raw_size": info.raw_len(),
            "escapes": info.total_escapes(),
            "records": records,
        });
        println!("{json:#}");
        return 0;
    }

    println!("twopfx: container:        {}", input.display());
    println!("twopfx: frames:           {}", info.header.frame_count);
    println!("twopfx: dimensions:       {}", info.header.dims);
    println!("twopfx: container size:   {}", info.total_len);
    println!("twopfx: raw size:         {}", info.raw_len());
    println!("twopfx: escapes:          {}", info.total_escapes());
    if opts.verbose > 0 {
        for (i, r) in info.records.iter().enumerate() {
            println!(
                "twopfx: frame {i:>6}: bitstream {:>10} side {:>10} escapes {:>10}",
                r.bitstream_len, r.side_len, r.escapes
            );
        }
    }
    0
}

// ---------------------------------------------------------------------------
// Fuzzing hook
// ---------------------------------------------------------------------------

#[cfg(feature = "fuzzing")]
pub fn fuzz_try_parse_args(args: &[String]) {
    if let Ok(cli) = Cli::try_parse_from(args) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&opts)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Encode => cmd_encode(&opts),
        Command::Decode => cmd_decode(&opts),
        Command::Info => cmd_info(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_opts(args: &[&str]) -> Options {
        let argv: Vec<String> = std::iter::once("twopfx".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    #[test]
    fn encode_subcommand_maps_correctly() {
        let opts = parse_opts(&[
            "encode", "--width", "640", "--height", "480", "in.rgb", "out.2pfx",
        ]);
        assert_eq!(opts.command, Command::Encode);
        assert_eq!(opts.dims, Some(FrameDims::new(640, 480)));
        assert_eq!(opts.input_file, Some(PathBuf::from("in.rgb")));
        assert_eq!(opts.output_file, Some(PathBuf::from("out.2pfx")));
    }

    #[test]
    fn encode_requires_dimensions() {
        let argv = ["twopfx", "encode", "in.rgb", "out.2pfx"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn decode_subcommand_maps_correctly() {
        let opts = parse_opts(&["--quiet", "decode", "--strict", "in.2pfx", "out.rgb"]);
        assert_eq!(opts.command, Command::Decode);
        assert_eq!(opts.clip_policy, ClipPolicy::Strict);
        assert!(opts.quiet);
        assert_eq!(opts.input_file, Some(PathBuf::from("in.2pfx")));
        assert_eq!(opts.output_file, Some(PathBuf::from("out.rgb")));
    }

    #[test]
    fn decode_defaults_to_clamp() {
        let opts = parse_opts(&["decode", "in.2pfx", "out.rgb"]);
        assert_eq!(opts.clip_policy, ClipPolicy::Clamp);
    }

    #[test]
    fn global_flags() {
        let opts = parse_opts(&["--force", "--json", "info", "in.2pfx"]);
        assert!(opts.force);
        assert!(opts.json_output);
        assert_eq!(opts.command, Command::Info);
    }

    #[test]
    fn verbose_is_capped() {
        let opts = parse_opts(&["-vvv", "config"]);
        assert_eq!(opts.verbose, 2);
        assert_eq!(log_filter(&opts), "debug");
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let argv = ["twopfx", "-q", "-v", "config"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn hex_digest() {
        let mut d = [0u8; 32];
        d[0] = 0xAB;
        d[31] = 0x01;
        let s = hex(&d);
        assert_eq!(s.len(), 64);
        assert!(s.starts_with("ab00"));
        assert!(s.ends_with("01"));
    }
}
