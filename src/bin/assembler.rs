//! Assembly to bytecode compiler CLI.
//!
//! Reads an assembly source file and writes a bytecode image for `lhvm`.
//!
//! # Usage
//! ```text
//! lhvma [OPTIONS] <source.asm> <output> [OPTIONS]
//! ```
//!
//! Options may come before, between or after the paths.
//!
//! # Arguments
//! - `source.asm`: Assembly source file to compile
//! - `output`: Image file to write
//!
//! # Options
//! - `--sections`: Treat declarations as sections instead of flat labels
//!
//! # Examples
//! ```text
//! lhvma program.asm program.bin
//! lhvma --sections program.asm program.bin
//! ```

use lhvm::utils::log;
use lhvm::virtual_machine::assembler::{Layout, assemble_file};
use lhvm::{error, info};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

/// Parsed command line.
#[derive(Debug, PartialEq)]
struct Options {
    input: String,
    output: String,
    layout: Layout,
}

/// What the command line asks for.
#[derive(Debug, PartialEq)]
enum Command {
    Assemble(Options),
    Help,
}

/// Parses `args` (without the program name). `--sections` may appear
/// anywhere; the first two other arguments are the source and the output.
fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut paths: Vec<&str> = Vec::with_capacity(2);
    let mut layout = Layout::Labels;

    for arg in args {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--sections" => layout = Layout::Sections,
            flag if flag.len() > 1 && flag.starts_with('-') => {
                return Err(format!("Unexpected argument: {flag}"));
            }
            path if paths.len() < 2 => paths.push(path),
            extra => return Err(format!("Unexpected argument: {extra}")),
        }
    }

    match paths.as_slice() {
        [input, output] => Ok(Command::Assemble(Options {
            input: input.to_string(),
            output: output.to_string(),
            layout,
        })),
        [_] => Err("missing <output> argument".to_string()),
        _ => Err("missing <source.asm> argument".to_string()),
    }
}

fn main() {
    log::init_from_env();
    let args: Vec<String> = env::args().collect();

    let options = match parse_args(&args[1..]) {
        Ok(Command::Assemble(options)) => options,
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
    let input_path = &options.input;
    let output_path = &options.output;

    if !Path::new(input_path).exists() {
        error!("Input file does not exist: {}", input_path);
        process::exit(1);
    }

    if let Some(parent) = Path::new(output_path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        error!("Output directory does not exist: {}", parent.display());
        process::exit(1);
    }

    // diagnostics are logged by the assembler itself
    let program = match assemble_file(input_path, options.layout) {
        Ok(p) => p,
        Err(_) => process::exit(1),
    };

    if let Err(e) = fs::write(output_path, program.to_text()) {
        error!("Failed to write output file: {}", e);
        process::exit(1);
    }

    info!(
        "Compiled {} -> {} ({} words, entry {})",
        input_path,
        output_path,
        program.code.len(),
        program.entry
    );
}

const USAGE: &str = "\
Assembly Compiler

USAGE:
    {program} [OPTIONS] <source.asm> <output> [OPTIONS]

ARGS:
    <source.asm>    Assembly source file to compile
    <output>        Bytecode image to write

OPTIONS:
    --sections      Lay out declarations as named sections
    -h, --help      Print this help message

EXAMPLES:
    # Compile flat, label-delimited source
    {program} program.asm program.bin

    # Compile section-form source
    {program} --sections program.asm program.bin
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
