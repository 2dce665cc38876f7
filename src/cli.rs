// Command-line interface for svndelta.
//
// Encodes content into svndiff (optionally Base64 text, as carried in
// <S:txdelta> bodies), decodes it back, and dumps window structure.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::io::{
    DecodeFileOptions, DeltaEncoding, EncodeFileOptions, IoError, decode_stream, encode_stream,
};
use crate::svndiff::instruction::Instruction;
use crate::svndiff::{
    DEFAULT_WINDOW_SIZE, DecodeOptions, EncodeOptions, HARD_MAX_WINDOW_SIZE, SVNDIFF_SIGNATURE,
    StreamDecoder,
};
use crate::transcode::base64::{Base64Decoder, DEFAULT_BLOCK_SIZE};

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

fn parse_md5(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(s.to_ascii_lowercase())
    } else {
        Err(format!("'{s}' is not a 32-digit hex MD5"))
    }
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// svndiff0 delta encoder/decoder.
#[derive(Parser, Debug)]
#[command(
    name = "svndelta",
    version,
    about = "svndiff0 delta encoder/decoder",
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
    /// Encode content as an svndiff stream of full-text windows.
    Encode(EncodeArgs),
    /// Decode an svndiff stream.
    Decode(DecodeArgs),
    /// Print the header and instructions of every window.
    Windows(WindowsArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Emit Base64 text instead of raw svndiff bytes.
    #[arg(long)]
    base64: bool,

    /// Maximum window size (supports K/M/G suffix).
    #[arg(long = "window-size", value_parser = parse_byte_size, default_value_t = DEFAULT_WINDOW_SIZE as u64)]
    window_size: u64,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Input file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Source file that source copies read from.
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    source: Option<PathBuf>,

    /// Input is Base64 text (whitespace is ignored).
    #[arg(long)]
    base64: bool,

    /// Expected hex MD5 of the decoded output.
    #[arg(long, value_parser = parse_md5)]
    md5: Option<String>,

    /// Largest window accepted (supports K/M/G suffix).
    #[arg(long = "max-window-size", value_parser = parse_byte_size, default_value_t = HARD_MAX_WINDOW_SIZE as u64)]
    max_window_size: u64,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Input delta file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct WindowsArgs {
    /// Input is Base64 text.
    #[arg(long)]
    base64: bool,

    /// Print window headers only.
    #[arg(long = "headers-only")]
    headers_only: bool,

    /// Input delta file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Encode,
    Decode,
    Windows,
    Config,
}

struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    encoding: DeltaEncoding,
    window_size: u64,
    max_window_size: u64,
    expected_md5: Option<String>,
    headers_only: bool,
    source_file: Option<PathBuf>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

fn encoding(base64: bool) -> DeltaEncoding {
    if base64 {
        DeltaEncoding::Base64
    } else {
        DeltaEncoding::Binary
    }
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Config,
        use_stdout: false,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        encoding: DeltaEncoding::Binary,
        window_size: DEFAULT_WINDOW_SIZE as u64,
        max_window_size: HARD_MAX_WINDOW_SIZE as u64,
        expected_md5: None,
        headers_only: false,
        source_file: None,
        input_file: None,
        output_file: None,
    };

    match cli.command {
        Cmd::Encode(args) => {
            opts.command = Command::Encode;
            opts.use_stdout = args.stdout;
            opts.encoding = encoding(args.base64);
            opts.window_size = args.window_size;
            opts.input_file = args.input;
            opts.output_file = args.output;
        }
        Cmd::Decode(args) => {
            opts.command = Command::Decode;
            opts.use_stdout = args.stdout;
            opts.encoding = encoding(args.base64);
            opts.expected_md5 = args.md5;
            opts.max_window_size = args.max_window_size;
            opts.source_file = args.source;
            opts.input_file = args.input;
            opts.output_file = args.output;
        }
        Cmd::Windows(args) => {
            opts.command = Command::Windows;
            opts.encoding = encoding(args.base64);
            opts.headers_only = args.headers_only;
            opts.input_file = Some(args.input);
        }
        Cmd::Config => {}
    }
    opts
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("svndelta".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Shared I/O setup
// ---------------------------------------------------------------------------

fn open_input(opts: &Options) -> Result<Box<dyn Read>, i32> {
    match &opts.input_file {
        Some(path) => match File::open(path) {
            Ok(f) => Ok(Box::new(BufReader::with_capacity(BUF_SIZE, f))),
            Err(e) => {
                eprintln!("svndelta: input file: {}: {e}", path.display());
                Err(1)
            }
        },
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Output path to create, or `None` for stdout.
fn output_path(opts: &Options) -> Result<Option<&Path>, i32> {
    match (opts.use_stdout, &opts.output_file) {
        (true, _) | (_, None) => Ok(None),
        (false, Some(path)) => {
            if path.exists() && !opts.force {
                eprintln!(
                    "svndelta: output file exists, use -f to overwrite: {}",
                    path.display()
                );
                return Err(1);
            }
            Ok(Some(path.as_path()))
        }
    }
}

fn stdout_writer() -> Box<dyn Write> {
    Box::new(BufWriter::with_capacity(BUF_SIZE, io::stdout().lock()))
}

fn open_output(opts: &Options) -> Result<Box<dyn Write>, i32> {
    match output_path(opts)? {
        None => Ok(stdout_writer()),
        Some(path) => {
            match File::create(path) {
                Ok(f) => Ok(Box::new(BufWriter::with_capacity(BUF_SIZE, f))),
                Err(e) => {
                    eprintln!("svndelta: output file: {}: {e}", path.display());
                    Err(1)
                }
            }
        }
    }
}

/// Output file created on first write or flush, so a decode that fails
/// before producing anything leaves no file behind (and leaves an existing
/// one untouched).
struct DeferredFile<'a> {
    path: &'a Path,
    file: Option<BufWriter<File>>,
}

impl DeferredFile<'_> {
    fn file(&mut self) -> io::Result<&mut BufWriter<File>> {
        if self.file.is_none() {
            let f = File::create(self.path)?;
            self.file = Some(BufWriter::with_capacity(BUF_SIZE, f));
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("output file not open"))
    }
}

impl Write for DeferredFile<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

fn print_json(json: serde_json::Value) {
    match serde_json::to_string_pretty(&json) {
        Ok(s) => eprintln!("{s}"),
        Err(e) => eprintln!("svndelta: json: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("svndelta version {version} (Rust)");
    eprintln!("Licensed under the MIT License");

    let ptr_size = std::mem::size_of::<*const ()>();
    let signature = String::from_utf8_lossy(&SVNDIFF_SIGNATURE[..3]);

    eprintln!("SVNDIFF_SIGNATURE={signature}{}", SVNDIFF_SIGNATURE[3]);
    eprintln!("DEFAULT_WINDOW_SIZE={DEFAULT_WINDOW_SIZE}");
    eprintln!("HARD_MAX_WINDOW_SIZE={HARD_MAX_WINDOW_SIZE}");
    eprintln!("BASE64_BLOCK_SIZE={DEFAULT_BLOCK_SIZE}");
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Encode command
// ---------------------------------------------------------------------------

fn cmd_encode(opts: &Options) -> i32 {
    let reader = match open_input(opts) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let writer = match open_output(opts) {
        Ok(w) => w,
        Err(code) => return code,
    };

    let encode_opts = EncodeFileOptions {
        encoding: opts.encoding,
        svndiff: EncodeOptions {
            window_size: opts.window_size as usize,
        },
    };

    let stats = match encode_stream(reader, writer, &encode_opts) {
        Ok((_, stats)) => stats,
        Err(e) => {
            eprintln!("svndelta: encode error: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "svndelta: encoder: input size: {}, output size: {}, windows: {}, md5: {}",
            stats.content_size, stats.delta_size, stats.windows, stats.content_md5
        );
    }

    if opts.json_output {
        print_json(serde_json::json!({
            "command": "encode",
            "input_size": stats.content_size,
            "output_size": stats.delta_size,
            "windows": stats.windows,
            "md5": stats.content_md5,
            "base64": opts.encoding == DeltaEncoding::Base64,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn cmd_decode(opts: &Options) -> i32 {
    let source = match &opts.source_file {
        Some(path) => match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("svndelta: source file: {}: {e}", path.display());
                return 1;
            }
        },
        None => Vec::new(),
    };
    let reader = match open_input(opts) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let path = match output_path(opts) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let mut deferred = path.map(|path| DeferredFile { path, file: None });

    let decode_opts = DecodeFileOptions {
        encoding: opts.encoding,
        expected_md5: opts.expected_md5.clone(),
        svndiff: DecodeOptions {
            max_window_size: opts.max_window_size as usize,
        },
    };

    let result = match deferred.as_mut() {
        Some(file) => decode_stream(reader, &source, file, &decode_opts).map(|(_, stats)| stats),
        None => decode_stream(reader, &source, stdout_writer(), &decode_opts)
            .map(|(_, stats)| stats),
    };
    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            match e {
                IoError::Delta(e) => eprintln!("svndelta: decode error: {e}"),
                e => eprintln!("svndelta: {e}"),
            }
            // A file only exists here if writing the decoded output failed.
            if let Some(DeferredFile {
                path,
                file: Some(file),
            }) = deferred
            {
                drop(file);
                let _ = std::fs::remove_file(path);
            }
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "svndelta: decoder: source size: {}, output size: {}, windows: {}, md5: {}",
            stats.source_size, stats.output_size, stats.windows, stats.output_md5
        );
    }

    if opts.json_output {
        print_json(serde_json::json!({
            "command": "decode",
            "source_size": stats.source_size,
            "input_size": stats.delta_size,
            "output_size": stats.output_size,
            "windows": stats.windows,
            "md5": stats.output_md5,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Windows command
// ---------------------------------------------------------------------------

fn describe(inst: &Instruction) -> String {
    match *inst {
        Instruction::CopyFromSource { length, offset } => {
            format!("source  {length:>8} @ {offset}")
        }
        Instruction::CopyFromTarget { length, offset } => {
            format!("target  {length:>8} @ {offset}")
        }
        Instruction::CopyFromData { length } => format!("data    {length:>8}"),
    }
}

fn cmd_windows(opts: &Options) -> i32 {
    let reader = match open_input(opts) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let reader: Box<dyn Read> = match opts.encoding {
        DeltaEncoding::Binary => reader,
        DeltaEncoding::Base64 => Box::new(BufReader::with_capacity(
            BUF_SIZE,
            Base64Decoder::new(reader),
        )),
    };

    let mut decoder = StreamDecoder::new(reader);
    let mut window_num: u64 = 0;
    let mut target_offset: u64 = 0;
    let mut listing = Vec::new();

    loop {
        let window = match decoder.next_window() {
            Ok(Some(w)) => w,
            Ok(None) => break,
            Err(e) => {
                eprintln!("svndelta: window {window_num}: {e}");
                return 1;
            }
        };
        let header = window.header();

        if window_num > 0 && !opts.json_output {
            println!();
        }
        if !opts.json_output {
            println!("svndiff window number:        {window_num}");
            println!("svndiff window at offset:     {target_offset}");
            println!(
                "svndiff source view:          {} bytes at {}",
                header.source_view_length, header.source_view_offset
            );
            println!("svndiff target view length:   {}", header.target_view_length);
            println!("svndiff instructions length:  {}", header.instructions_len);
            println!("svndiff new data length:      {}", header.data_len);
            if !opts.headers_only {
                for (i, inst) in window.instructions.iter().enumerate() {
                    println!("  {i:>6}  {}", describe(inst));
                }
            }
        }
        listing.push(serde_json::json!({
            "window": window_num,
            "offset": target_offset,
            "source_view_offset": header.source_view_offset,
            "source_view_length": header.source_view_length,
            "target_view_length": header.target_view_length,
            "instructions_len": header.instructions_len,
            "data_len": header.data_len,
            "instructions": window.instructions.len(),
        }));

        target_offset += header.target_view_length;
        window_num += 1;
    }

    if opts.json_output {
        print_json(serde_json::json!({
            "command": "windows",
            "windows": listing,
            "target_size": target_offset,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();

    let default_filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let mut opts = resolve_options(cli);

    if opts.window_size == 0 || opts.window_size > HARD_MAX_WINDOW_SIZE as u64 {
        eprintln!(
            "svndelta: --window-size: {} is outside 1..={HARD_MAX_WINDOW_SIZE}",
            opts.window_size
        );
        process::exit(1);
    }
    if opts.max_window_size > HARD_MAX_WINDOW_SIZE as u64 {
        eprintln!(
            "svndelta: --max-window-size: {} exceeds max {HARD_MAX_WINDOW_SIZE}",
            opts.max_window_size
        );
        process::exit(1);
    }

    // Warn if -c overrides output filename.
    if opts.use_stdout
        && !opts.quiet
        && let Some(path) = &opts.output_file
    {
        eprintln!(
            "svndelta: warning: -c option overrides output filename: {}",
            path.display()
        );
    }
    if opts.use_stdout {
        opts.output_file = None;
    }

    let exit_code = match opts.command {
        Command::Encode => cmd_encode(&opts),
        Command::Decode => cmd_decode(&opts),
        Command::Windows => cmd_windows(&opts),
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
        let argv: Vec<String> = std::iter::once("svndelta".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    fn parse_err(args: &[&str]) -> bool {
        let argv: Vec<String> = std::iter::once("svndelta".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        Cli::try_parse_from(argv).is_err()
    }

    #[test]
    fn parse_byte_size_suffixes() {
        assert_eq!(parse_byte_size("1").unwrap(), 1);
        assert_eq!(parse_byte_size("2K").unwrap(), 2 * 1024);
        assert_eq!(parse_byte_size("3m").unwrap(), 3 * 1024 * 1024);
        assert_eq!(parse_byte_size("4G").unwrap(), 4 * 1024 * 1024 * 1024);
        assert!(parse_byte_size("").is_err());
        assert!(parse_byte_size("12X").is_err());
    }

    #[test]
    fn parse_md5_validates_hex() {
        assert_eq!(
            parse_md5("5D41402ABC4B2A76B9719D911017C592").unwrap(),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert!(parse_md5("5d41402abc4b2a76").is_err());
        assert!(parse_md5("zz41402abc4b2a76b9719d911017c592").is_err());
    }

    #[test]
    fn encode_subcommand_maps_correctly() {
        let opts = parse_opts(&[
            "encode",
            "--base64",
            "--window-size",
            "64K",
            "in.bin",
            "out.b64",
        ]);
        assert_eq!(opts.command, Command::Encode);
        assert_eq!(opts.encoding, DeltaEncoding::Base64);
        assert_eq!(opts.window_size, 64 * 1024);
        assert_eq!(opts.input_file, Some(PathBuf::from("in.bin")));
        assert_eq!(opts.output_file, Some(PathBuf::from("out.b64")));
    }

    #[test]
    fn encode_defaults() {
        let opts = parse_opts(&["encode"]);
        assert_eq!(opts.encoding, DeltaEncoding::Binary);
        assert_eq!(opts.window_size, DEFAULT_WINDOW_SIZE as u64);
        assert!(opts.input_file.is_none());
        assert!(opts.output_file.is_none());
    }

    #[test]
    fn decode_subcommand_maps_correctly() {
        let opts = parse_opts(&[
            "--quiet",
            "decode",
            "--source",
            "source.bin",
            "--base64",
            "--md5",
            "d41d8cd98f00b204e9800998ecf8427e",
            "--max-window-size",
            "1M",
            "in.b64",
            "out.bin",
        ]);
        assert_eq!(opts.command, Command::Decode);
        assert!(opts.quiet);
        assert_eq!(opts.encoding, DeltaEncoding::Base64);
        assert_eq!(
            opts.expected_md5.as_deref(),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
        assert_eq!(opts.max_window_size, 1024 * 1024);
        assert_eq!(
            opts.source_file.as_deref(),
            Some(std::path::Path::new("source.bin"))
        );
        assert_eq!(opts.input_file, Some(PathBuf::from("in.b64")));
        assert_eq!(opts.output_file, Some(PathBuf::from("out.bin")));
    }

    #[test]
    fn bad_md5_is_rejected_by_parser() {
        assert!(parse_err(&["decode", "--md5", "abc", "in", "out"]));
    }

    #[test]
    fn global_stdio_and_force_flags() {
        let opts = parse_opts(&["--force", "encode", "--stdout", "in", "out"]);
        assert!(opts.use_stdout);
        assert!(opts.force);
    }

    #[test]
    fn verbose_is_capped() {
        let verbose = parse_opts(&["-v", "-v", "-v", "encode", "in", "out"]);
        assert_eq!(verbose.verbose, 2);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(parse_err(&["-q", "-v", "config"]));
    }

    #[test]
    fn windows_command_maps() {
        let opts = parse_opts(&["--json", "windows", "--headers-only", "--base64", "d.b64"]);
        assert_eq!(opts.command, Command::Windows);
        assert!(opts.json_output);
        assert!(opts.headers_only);
        assert_eq!(opts.encoding, DeltaEncoding::Base64);
        assert_eq!(opts.input_file, Some(PathBuf::from("d.b64")));
        assert!(parse_err(&["windows"]));
    }

    #[test]
    fn config_command_maps() {
        assert_eq!(parse_opts(&["config"]).command, Command::Config);
    }

    #[test]
    fn instruction_descriptions() {
        assert_eq!(
            describe(&Instruction::CopyFromSource {
                length: 4,
                offset: 2
            }),
            "source         4 @ 2"
        );
        assert_eq!(
            describe(&Instruction::CopyFromData { length: 10 }),
            "data          10"
        );
    }
}
