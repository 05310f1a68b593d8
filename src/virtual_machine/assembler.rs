//! Assembly language parser and bytecode compiler.
//!
//! Converts mnemonic source into a flat [`Program`]. Assembly runs in two
//! passes: layout records the address of every declaration while collecting
//! tokens, then resolution turns every token into a word. Because layout sees
//! the whole file first, forward references need no special handling.
//!
//! # Syntax
//!
//! ```text
//! // comment
//! main:
//!     PUSH 2
//!     PUSH 3
//!     CALL add 2      # trailing comment
//!     PRINT
//!     HALT
//! add:
//!     ARG 0
//!     ARG 1
//!     ADD
//!     RET
//! ```
//!
//! - Unindented lines declare a label (or section); the trailing `:` is optional
//! - Indented lines hold an instruction and its operands
//! - Operands are separated by spaces, tabs or commas
//! - Comments start with `//` or `#`
//!
//! Every token resolves, in order, as a mnemonic, a declared name, or an
//! integer literal (`42`, `-1`, `0x2a`, `0o52`, `052`, `0b101010`, `1_000`).
//! The address of `main` becomes the program's entry point.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Instruction, Word};
use crate::virtual_machine::program::Program;
use crate::{debug, error, warn};
use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_MARKERS: [&str; 2] = ["//", "#"];
const LABEL_SUFFIX: char = ':';

/// Name whose address becomes the entry point.
pub const ENTRY_LABEL: &str = "main";

/// How declarations map onto the flat address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Labels mark positions in a single stream, in source order.
    #[default]
    Labels,
    /// Each declaration opens a named section owning the following lines.
    /// Re-declaring a name appends to it. Sections are laid out in order of
    /// first declaration.
    Sections,
}

/// Formats a compiler-style diagnostic for assembly failures.
fn render_assembly_diagnostic(
    file: &str,
    source: &str,
    line: usize,
    offset: usize,
    message: &str,
) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}:{offset}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let prefix: String = line_text
            .chars()
            .take(offset.saturating_sub(1))
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        let _ = writeln!(diag, "     |");
        let _ = writeln!(diag, "{:>4} | {}", line, line_text);
        let _ = writeln!(diag, "     | {}^", prefix);
    }

    diag
}

/// Emit a diagnostic through the logger for assembly errors.
fn log_assembly_error(file: &str, source: &str, err: &VMError) {
    if let VMError::AssemblyError {
        line,
        offset,
        source: message,
    } = err
    {
        error!(
            "{}",
            render_assembly_diagnostic(file, source, *line, *offset, message)
        );
    } else {
        error!("{err}");
    }
}

/// Symbol table built during layout.
#[derive(Debug, Default)]
pub struct AsmContext {
    /// Declared names mapped to word addresses.
    pub(crate) labels: HashMap<String, usize>,
}

impl AsmContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a name at the given word address.
    pub(crate) fn define_label(&mut self, name: &str, addr: usize) -> Result<(), VMError> {
        if self.labels.contains_key(name) {
            return Err(VMError::DuplicateLabel {
                label: name.to_string(),
            });
        }
        debug!("label {name} -> {addr}");
        self.labels.insert(name.to_string(), addr);
        Ok(())
    }

    /// Resolves a name to its word address.
    pub(crate) fn resolve_label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    /// 1-based line number.
    line: usize,
    /// 1-based column offset in the line.
    offset: usize,
}

/// One classified source line.
#[derive(Debug)]
enum Line<'a> {
    Blank,
    Declaration(Token<'a>),
    Instruction(Vec<Token<'a>>),
}

/// Cuts a trailing or whole-line comment.
fn strip_comment(line: &str) -> &str {
    let cut = COMMENT_MARKERS
        .iter()
        .filter_map(|marker| line.find(marker))
        .min()
        .unwrap_or(line.len());
    &line[..cut]
}

/// Splits an instruction line on whitespace and commas, keeping columns.
fn tokenize(line_no: usize, line: &str) -> Vec<Token<'_>> {
    let mut out = Vec::with_capacity(4);
    let mut start: Option<usize> = None;

    for (i, c) in line.char_indices() {
        let separator = c == ',' || c.is_whitespace();
        match (separator, start) {
            (true, Some(s)) => {
                out.push(Token {
                    text: &line[s..i],
                    line: line_no,
                    offset: s + 1,
                });
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }

    if let Some(s) = start {
        out.push(Token {
            text: &line[s..],
            line: line_no,
            offset: s + 1,
        });
    }
    out
}

/// Classifies a raw line by indentation.
fn classify(line_no: usize, raw: &str) -> Result<Line<'_>, VMError> {
    let code = strip_comment(raw);
    if code.trim().is_empty() {
        return Ok(Line::Blank);
    }

    if code.starts_with([' ', '\t']) {
        let tokens = tokenize(line_no, code);
        return Ok(if tokens.is_empty() {
            Line::Blank
        } else {
            Line::Instruction(tokens)
        });
    }

    let name = code.trim_matches(|c: char| c == LABEL_SUFFIX || c.is_whitespace());
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(VMError::AssemblyError {
            line: line_no,
            offset: 1,
            source: VMError::InvalidLabel {
                label: name.to_string(),
            }
            .to_string(),
        });
    }
    Ok(Line::Declaration(Token {
        text: name,
        line: line_no,
        offset: 1,
    }))
}

/// Wraps an error with the token's source location.
fn at_token(token: &Token, err: VMError) -> VMError {
    VMError::AssemblyError {
        line: token.line,
        offset: token.offset,
        source: err.to_string(),
    }
}

/// Parses an integer literal: decimal, `0x` hex, `0o` or leading-zero octal,
/// `0b` binary, with an optional sign and `_` digit separators.
pub(crate) fn parse_int(tok: &str) -> Option<Word> {
    let (negative, body) = match tok.as_bytes().first()? {
        b'-' => (true, &tok[1..]),
        b'+' => (false, &tok[1..]),
        _ => (false, tok),
    };

    let prefixed =
        |lower: &str, upper: &str| body.strip_prefix(lower).or_else(|| body.strip_prefix(upper));
    let (radix, digits) = if let Some(d) = prefixed("0x", "0X") {
        (16, d)
    } else if let Some(d) = prefixed("0b", "0B") {
        (2, d)
    } else if let Some(d) = prefixed("0o", "0O") {
        (8, d)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..])
    } else {
        (10, body)
    };

    if !digits.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return None;
    }
    let digits: String = digits.chars().filter(|c| *c != '_').collect();
    let magnitude = i128::from_str_radix(&digits, radix).ok()?;
    Word::try_from(if negative { -magnitude } else { magnitude }).ok()
}

/// Resolves one token: mnemonic, then declared name, then integer literal.
fn resolve_token(ctx: &AsmContext, token: &Token) -> Result<Word, VMError> {
    if let Some(instr) = Instruction::from_mnemonic(token.text) {
        return Ok(instr.code());
    }
    if let Some(addr) = ctx.resolve_label(token.text) {
        return Ok(addr as Word);
    }
    parse_int(token.text).ok_or_else(|| {
        at_token(
            token,
            VMError::InvalidToken {
                token: token.text.to_string(),
            },
        )
    })
}

/// Pass 1 for [`Layout::Labels`]: names mark the running word count.
fn layout_labels<'a>(
    lines: Vec<Line<'a>>,
    ctx: &mut AsmContext,
) -> Result<Vec<Token<'a>>, VMError> {
    let mut stream = Vec::new();
    for line in lines {
        match line {
            Line::Blank => {}
            Line::Declaration(name) => ctx
                .define_label(name.text, stream.len())
                .map_err(|e| at_token(&name, e))?,
            Line::Instruction(tokens) => stream.extend(tokens),
        }
    }
    Ok(stream)
}

/// Pass 1 for [`Layout::Sections`]: gather sections, then place them back to
/// back in first-declaration order.
fn layout_sections<'a>(
    lines: Vec<Line<'a>>,
    ctx: &mut AsmContext,
) -> Result<Vec<Token<'a>>, VMError> {
    let mut sections: Vec<(&'a str, Vec<Token<'a>>)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut current: Option<usize> = None;

    for line in lines {
        match line {
            Line::Blank => {}
            Line::Declaration(name) => {
                let slot = *index.entry(name.text).or_insert_with(|| {
                    sections.push((name.text, Vec::new()));
                    sections.len() - 1
                });
                current = Some(slot);
            }
            Line::Instruction(tokens) => {
                let slot =
                    current.ok_or_else(|| at_token(&tokens[0], VMError::OrphanInstruction))?;
                sections[slot].1.extend(tokens);
            }
        }
    }

    let mut stream = Vec::new();
    for (name, tokens) in sections {
        ctx.define_label(name, stream.len())?;
        stream.extend(tokens);
    }
    Ok(stream)
}

/// Runs both passes over `source`.
fn assemble(source: &str, layout: Layout) -> Result<Program, VMError> {
    let lines = source
        .lines()
        .enumerate()
        .map(|(i, raw)| classify(i + 1, raw))
        .collect::<Result<Vec<_>, _>>()?;

    // Pass 1: layout
    let mut ctx = AsmContext::new();
    let stream = match layout {
        Layout::Labels => layout_labels(lines, &mut ctx)?,
        Layout::Sections => layout_sections(lines, &mut ctx)?,
    };

    // Pass 2: resolve
    let code = stream
        .iter()
        .map(|token| resolve_token(&ctx, token))
        .collect::<Result<Vec<_>, _>>()?;

    let entry = match ctx.resolve_label(ENTRY_LABEL) {
        Some(addr) => addr as Word,
        None => {
            warn!("no `{ENTRY_LABEL}` label; entry point defaults to 0");
            0
        }
    };

    Ok(Program { entry, code })
}

/// Assemble flat, label-delimited source into a program.
pub fn assemble_source(source: impl Into<String>) -> Result<Program, VMError> {
    assemble_source_with_name(&source.into(), "<source>", Layout::Labels)
}

/// Assemble section-form source into a program.
pub fn assemble_sections(source: impl Into<String>) -> Result<Program, VMError> {
    assemble_source_with_name(&source.into(), "<source>", Layout::Sections)
}

/// Assembles source with an associated filename for error diagnostics.
fn assemble_source_with_name(
    source: &str,
    source_name: &str,
    layout: Layout,
) -> Result<Program, VMError> {
    let result = assemble(source, layout);
    if let Err(err) = &result {
        log_assembly_error(source_name, source, err);
    }
    result
}

/// Convenience: assemble directly from file path
pub fn assemble_file<P: AsRef<Path>>(path: P, layout: Layout) -> Result<Program, VMError> {
    let path_ref = path.as_ref();
    let source = fs::read_to_string(path_ref)
        .map_err(|e| VMError::IoError {
            path: path_ref.display().to_string(),
            source: e.to_string(),
        })
        .inspect_err(|e| error!("{e}"))?;
    assemble_source_with_name(&source, &path_ref.display().to_string(), layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUSH: Word = Instruction::Push.code();
    const ADD: Word = Instruction::Add.code();
    const CALL: Word = Instruction::Call.code();
    const RET: Word = Instruction::Ret.code();
    const ARG: Word = Instruction::Arg.code();
    const PRINT: Word = Instruction::Print.code();
    const HALT: Word = Instruction::Halt.code();
    const JMP: Word = Instruction::Jmp.code();

    #[test]
    fn parse_int_radixes() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-1"), Some(-1));
        assert_eq!(parse_int("+7"), Some(7));
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("0x2a"), Some(42));
        assert_eq!(parse_int("0XFF"), Some(255));
        assert_eq!(parse_int("-0x10"), Some(-16));
        assert_eq!(parse_int("052"), Some(42));
        assert_eq!(parse_int("0o52"), Some(42));
        assert_eq!(parse_int("0b101010"), Some(42));
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("-9223372036854775808"), Some(Word::MIN));
    }

    #[test]
    fn parse_int_rejects() {
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("-"), None);
        assert_eq!(parse_int("08"), None);
        assert_eq!(parse_int("0x"), None);
        assert_eq!(parse_int("0x+5"), None);
        assert_eq!(parse_int("--1"), None);
        assert_eq!(parse_int("_1"), None);
        assert_eq!(parse_int("12abc"), None);
        assert_eq!(parse_int("9223372036854775808"), None);
    }

    #[test]
    fn strip_comment_markers() {
        assert_eq!(strip_comment("    PUSH 1 // one"), "    PUSH 1 ");
        assert_eq!(strip_comment("    PUSH 1 # one"), "    PUSH 1 ");
        assert_eq!(strip_comment("// whole line"), "");
        assert_eq!(strip_comment("main:"), "main:");
    }

    #[test]
    fn tokenize_columns_and_commas() {
        let tokens = tokenize(4, "\tJMPLT 10,  loop");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["JMPLT", "10", "loop"]);
        assert_eq!(tokens[0].offset, 2);
        assert_eq!(tokens[1].offset, 8);
        assert_eq!(tokens[2].offset, 13);
        assert!(tokens.iter().all(|t| t.line == 4));
    }

    #[test]
    fn assemble_empty_source() {
        let program = assemble_source("").unwrap();
        assert!(program.code.is_empty());
        assert_eq!(program.entry, 0);
    }

    #[test]
    fn assemble_comments_and_blank_lines() {
        let source = "// header\n\n    # indented comment\n\t\n";
        let program = assemble_source(source).unwrap();
        assert!(program.code.is_empty());
    }

    #[test]
    fn assemble_arithmetic_example() {
        let source = "
main:
    PUSH 2
    PUSH 2
    ADD
    PUSH 1
    SUBT
    PRINT
    HALT
";
        let program = assemble_source(source).unwrap();
        assert_eq!(program.entry, 0);
        assert_eq!(program.code, vec![PUSH, 2, PUSH, 2, ADD, PUSH, 1, 3, PRINT, HALT]);
    }

    #[test]
    fn entry_comes_from_main() {
        let source = "
helper:
    RET
main:
    HALT
";
        let program = assemble_source(source).unwrap();
        assert_eq!(program.entry, 1);
        assert_eq!(program.code, vec![RET, HALT]);
    }

    #[test]
    fn forward_and_backward_references() {
        let source = "
main:
    JMP end
loop:
    JMP loop
end:
    HALT
";
        let program = assemble_source(source).unwrap();
        assert_eq!(program.code, vec![JMP, 4, JMP, 2, HALT]);
    }

    #[test]
    fn label_colon_is_optional() {
        let with = assemble_source("main:\n    JMP main\n").unwrap();
        let without = assemble_source("main\n    JMP main\n").unwrap();
        let spaced = assemble_source("main :  \n    JMP main\n").unwrap();
        assert_eq!(with, without);
        assert_eq!(with, spaced);
    }

    #[test]
    fn adjacent_labels_share_an_address() {
        let source = "
main:
start:
    JMP start
";
        let program = assemble_source(source).unwrap();
        assert_eq!(program.entry, 0);
        assert_eq!(program.code, vec![JMP, 0]);
    }

    #[test]
    fn mnemonic_wins_over_label_and_label_over_literal() {
        let source = "
main:
    PUSH PUSH
010:
    PUSH 010
";
        let program = assemble_source(source).unwrap();
        // `PUSH` operand resolves to the opcode 0; `010` resolves to the label at 2, not octal 8
        assert_eq!(program.code, vec![PUSH, PUSH, PUSH, 2]);
    }

    #[test]
    fn mnemonics_are_case_sensitive() {
        let err = assemble_source("main:\n    push 1\n").unwrap_err();
        assert!(matches!(
            err,
            VMError::AssemblyError { line: 2, offset: 5, ref source } if source.contains("push")
        ));
    }

    #[test]
    fn unresolvable_token_is_fatal() {
        let err = assemble_source("main:\n    PUSH 1\n    JMP nowhere\n").unwrap_err();
        assert!(matches!(
            err,
            VMError::AssemblyError { line: 3, offset: 9, ref source } if source.contains("nowhere")
        ));
    }

    #[test]
    fn duplicate_label_error() {
        let err = assemble_source("main:\n    HALT\nmain:\n    HALT\n").unwrap_err();
        assert!(matches!(
            err,
            VMError::AssemblyError { line: 3, ref source, .. } if source.contains("duplicate label: main")
        ));
    }

    #[test]
    fn invalid_label_names() {
        assert!(matches!(
            assemble_source(":\n"),
            Err(VMError::AssemblyError { line: 1, .. })
        ));
        assert!(matches!(
            assemble_source("two words:\n    HALT\n"),
            Err(VMError::AssemblyError { line: 1, ref source, .. }) if source.contains("two words")
        ));
    }

    #[test]
    fn missing_main_defaults_to_zero() {
        let program = assemble_source("    PUSH 1\n    HALT\n").unwrap();
        assert_eq!(program.entry, 0);
        assert_eq!(program.code, vec![PUSH, 1, HALT]);
    }

    #[test]
    fn call_example_assembles() {
        let source = "
add:
    ARG 0
    ARG 1
    ADD
    RET
main:
    PUSH 2
    PUSH 3
    CALL add, 2
    PRINT
    HALT
";
        let program = assemble_source(source).unwrap();
        assert_eq!(program.entry, 6);
        assert_eq!(
            program.code,
            vec![ARG, 0, ARG, 1, ADD, RET, PUSH, 2, PUSH, 3, CALL, 0, 2, PRINT, HALT]
        );
    }

    #[test]
    fn sections_resolve_to_actual_placement() {
        let source = "
main:
    CALL helper 0
    HALT
helper:
    PUSH 9
    RET
";
        let program = assemble_sections(source).unwrap();
        let helper = program.code[1] as usize;
        assert_eq!(&program.code[helper..helper + 3], &[PUSH, 9, RET]);
        assert_eq!(program.code[program.entry as usize], CALL);
    }

    #[test]
    fn sections_merge_on_redeclaration() {
        let source = "
main:
    PUSH 1
helper:
    RET
main:
    HALT
";
        let program = assemble_sections(source).unwrap();
        assert_eq!(program.entry, 0);
        assert_eq!(program.code, vec![PUSH, 1, HALT, RET]);

        // the flat form treats the same source as a duplicate
        assert!(assemble_source(source).is_err());
    }

    #[test]
    fn sections_are_laid_out_in_declaration_order() {
        let source = "
zeta:
    PUSH 1
alpha:
    PUSH 2
main:
    HALT
";
        let first = assemble_sections(source).unwrap();
        assert_eq!(first.code, vec![PUSH, 1, PUSH, 2, HALT]);
        assert_eq!(first.entry, 4);
        assert_eq!(assemble_sections(source).unwrap(), first);
    }

    #[test]
    fn sections_reject_orphan_instructions() {
        let err = assemble_sections("    HALT\nmain:\n    HALT\n").unwrap_err();
        assert!(matches!(
            err,
            VMError::AssemblyError { line: 1, offset: 5, ref source } if source.contains("outside of any section")
        ));
    }

    #[test]
    fn diagnostic_points_at_token() {
        let source = "main:\n    PUSH oops\n";
        let diag = render_assembly_diagnostic("prog.asm", source, 2, 10, "invalid constant");
        assert_eq!(
            diag,
            "error: invalid constant\n --> prog.asm:2:10\n     |\n   2 |     PUSH oops\n     |          ^\n"
        );
    }

    #[test]
    fn assemble_file_missing() {
        let err = assemble_file("/definitely/not/here.asm", Layout::Labels).unwrap_err();
        assert!(matches!(err, VMError::IoError { ref path, .. } if path.contains("here.asm")));
    }
}
