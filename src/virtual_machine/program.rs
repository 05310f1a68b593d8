//! Bytecode image representation and its text form.
//!
//! An image is line oriented: the first line holds the decimal entry index,
//! every following line one decimal word of the program.
//!
//! ```text
//! 0
//! 0
//! 2
//! 12
//! 19
//! ```

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Instruction, Word};
use std::fmt::Write;

/// Assembled program: flat words plus the index execution starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Index of the first instruction to execute.
    pub entry: Word,
    /// Opcodes interleaved with their immediates.
    pub code: Vec<Word>,
}

impl Program {
    pub fn new(entry: Word, code: Vec<Word>) -> Self {
        Self { entry, code }
    }

    /// Serializes the program as an image.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity((self.code.len() + 1) * 4);
        let _ = writeln!(out, "{}", self.entry);
        for word in &self.code {
            let _ = writeln!(out, "{word}");
        }
        out
    }

    /// Parses an image. Trailing blank lines are ignored; any other line that
    /// is not a decimal integer is rejected with its 1-based line number.
    pub fn from_text(text: &str) -> Result<Self, VMError> {
        let mut lines = text.trim_end().lines().enumerate();

        let entry = match lines.next() {
            Some((_, line)) if !line.trim().is_empty() => parse_word(1, line)?,
            _ => {
                return Err(VMError::DecodeError {
                    line: 1,
                    reason: "missing entry point".to_string(),
                });
            }
        };

        let code = lines
            .map(|(i, line)| parse_word(i + 1, line))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { entry, code })
    }

    /// Renders a linear-sweep listing, one instruction per line.
    ///
    /// Words that do not decode as an opcode, or instructions cut off by the
    /// end of the program, are listed as `.word` data.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let mut pc = 0usize;
        while pc < self.code.len() {
            let word = self.code[pc];
            let marker = if pc as Word == self.entry { ">" } else { " " };
            match Instruction::try_from(word) {
                Ok(instr) if pc + instr.immediates() < self.code.len() => {
                    let _ = write!(out, "{marker}{pc:04}: {}", instr.mnemonic());
                    for imm in &self.code[pc + 1..=pc + instr.immediates()] {
                        let _ = write!(out, " {imm}");
                    }
                    out.push('\n');
                    pc += 1 + instr.immediates();
                }
                _ => {
                    let _ = writeln!(out, "{marker}{pc:04}: .word {word}");
                    pc += 1;
                }
            }
        }
        out
    }
}

fn parse_word(line: usize, text: &str) -> Result<Word, VMError> {
    text.trim()
        .parse::<Word>()
        .map_err(|e| VMError::DecodeError {
            line,
            reason: format!("{:?} is not an integer ({e})", text.trim()),
        })
}
