//! Bytecode image runner.
//!
//! Loads an image written by `lhvma` and executes it until HALT.
//!
//! # Usage
//! ```text
//! lhvm [OPTIONS] <image> [OPTIONS]
//! ```
//!
//! Options may come before or after the image path.
//!
//! # Arguments
//! - `image`: Bytecode image to run
//!
//! # Options
//! - `-d, --debug`: Send LOG dumps to `debug.log`
//! - `--log <file>`: Send LOG dumps to `file`
//! - `--cols <n>`, `--rows <n>`: Pixel buffer size (defaults to 100x40)
//! - `--list`: Print the disassembly instead of running
//!
//! The logger threshold is read from `LHVM_LOG` (`debug`, `info`, `warn`,
//! `error`).

use lhvm::utils::log;
use lhvm::virtual_machine::host::StdHost;
use lhvm::virtual_machine::program::Program;
use lhvm::virtual_machine::vm::{VM, VmConfig};
use lhvm::{debug, error, info};
use std::env;
use std::fs::{self, File};
use std::io::{self, Write};
use std::process;

/// Log file opened by `--debug`.
const DEBUG_LOG: &str = "debug.log";

/// Parsed command line.
#[derive(Debug, PartialEq)]
struct Options {
    image: String,
    log_path: Option<String>,
    list: bool,
    config: VmConfig,
}

/// What the command line asks for.
#[derive(Debug, PartialEq)]
enum Command {
    Run(Options),
    Help,
}

/// Parses `args` (without the program name). Flags may appear before or
/// after the image path.
fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut image: Option<String> = None;
    let mut log_path: Option<String> = None;
    let mut list = false;
    let mut config = VmConfig::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--debug" | "-d" => log_path = Some(DEBUG_LOG.to_string()),
            "--log" => {
                i += 1;
                let path = args.get(i).ok_or("--log requires an argument")?;
                log_path = Some(path.clone());
            }
            k @ ("--cols" | "--rows") => {
                i += 1;
                let raw = args.get(i).ok_or(format!("{k} requires an argument"))?;
                let n = match raw.parse::<usize>() {
                    Ok(n) if n > 0 => n,
                    _ => return Err(format!("{k} expects a positive integer, got '{raw}'")),
                };
                if k == "--cols" {
                    config.cols = n;
                } else {
                    config.rows = n;
                }
            }
            "--list" => list = true,
            flag if flag.len() > 1 && flag.starts_with('-') => {
                return Err(format!("Unexpected argument: {flag}"));
            }
            path if image.is_none() => image = Some(path.to_string()),
            extra => return Err(format!("Unexpected argument: {extra}")),
        }
        i += 1;
    }

    let image = image.ok_or("missing <image> argument")?;
    Ok(Command::Run(Options {
        image,
        log_path,
        list,
        config,
    }))
}

fn main() {
    log::init_from_env();
    let args: Vec<String> = env::args().collect();

    let options = match parse_args(&args[1..]) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            print_usage(&args[0]);
            process::exit(0);
        }
        Err(message) => {
            error!("{message}\n");
            print_usage(&args[0]);
            process::exit(1);
        }
    };
    let image_path = &options.image;

    let text = fs::read_to_string(image_path).unwrap_or_else(|e| {
        error!("Failed to read {image_path}: {e}");
        process::exit(1)
    });

    let program = Program::from_text(&text).unwrap_or_else(|e| {
        error!("{image_path}: {e}");
        process::exit(1)
    });
    debug!(
        "loaded {image_path}: {} words, entry {}",
        program.code.len(),
        program.entry
    );

    if options.list {
        print!("{}", program.disassemble());
        return;
    }

    let sink: Box<dyn Write> = match &options.log_path {
        Some(path) => match File::create(path) {
            Ok(file) => {
                info!("Writing LOG output to {path}");
                Box::new(file)
            }
            Err(e) => {
                error!("Failed to create log file {path}: {e}");
                process::exit(1);
            }
        },
        None => Box::new(io::sink()),
    };

    let mut vm = VM::new(program, &options.config).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1)
    });
    let mut host = StdHost::with_log(sink);

    if let Err(e) = vm.run(&mut host) {
        error!("{e}");
        process::exit(1);
    }
    debug!("halted after {} instructions", vm.steps());
}

const USAGE: &str = "\
Bytecode Runner

USAGE:
    {program} [OPTIONS] <image> [OPTIONS]

ARGS:
    <image>    Bytecode image produced by lhvma

OPTIONS:
    -d, --debug         Write LOG output to debug.log
        --log <file>    Write LOG output to <file>
        --cols <n>      Pixel buffer width (defaults to 100)
        --rows <n>      Pixel buffer height (defaults to 40)
        --list          Print the disassembly and exit
    -h, --help          Print this help message

ENVIRONMENT:
    LHVM_LOG    Logger threshold: debug, info, warn or error

EXAMPLES:
    # Run an image
    {program} program.bin

    # Run with LOG dumps captured in debug.log
    {program} -d program.bin

    # Inspect an image
    {program} program.bin --list
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    fn run_options(list: &[&str]) -> Options {
        match parse_args(&args(list)) {
            Ok(Command::Run(options)) => options,
            other => panic!("expected run options, got {other:?}"),
        }
    }

    #[test]
    fn debug_flag_before_image() {
        let options = run_options(&["-d", "prog.bin"]);
        assert_eq!(options.image, "prog.bin");
        assert_eq!(options.log_path.as_deref(), Some(DEBUG_LOG));
    }

    #[test]
    fn debug_flag_after_image() {
        assert_eq!(run_options(&["prog.bin", "-d"]), run_options(&["-d", "prog.bin"]));
    }

    #[test]
    fn valued_flags_anywhere() {
        let options = run_options(&["--cols", "20", "prog.bin", "--rows", "10", "--log", "out.log"]);
        assert_eq!(options.image, "prog.bin");
        assert_eq!(options.config.cols, 20);
        assert_eq!(options.config.rows, 10);
        assert_eq!(options.log_path.as_deref(), Some("out.log"));
        assert!(!options.list);
    }

    #[test]
    fn defaults() {
        let options = run_options(&["prog.bin"]);
        assert_eq!(options.config, VmConfig::default());
        assert_eq!(options.log_path, None);
    }

    #[test]
    fn help_anywhere() {
        assert_eq!(parse_args(&args(&["prog.bin", "-h"])), Ok(Command::Help));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["-d"])).is_err());
        assert!(parse_args(&args(&["a.bin", "b.bin"])).is_err());
        assert!(parse_args(&args(&["prog.bin", "--verbose"])).is_err());
        assert!(parse_args(&args(&["prog.bin", "--cols"])).is_err());
        assert!(parse_args(&args(&["prog.bin", "--rows", "0"])).is_err());
        assert!(parse_args(&args(&["prog.bin", "--log"])).is_err());
    }
}
