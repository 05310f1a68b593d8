//! Stack-based bytecode virtual machine with a terminal pixel buffer.
//!
//! Programs are flat sequences of signed words produced by the assembler.
//! The VM executes them against a fixed-size operand stack, a word-addressed
//! RAM and a grid of xterm-256 palette indices that PAINT rasterizes to the
//! terminal.
//!
//! # Architecture
//!
//! - **Stack**: 128 words; CALL builds its activation record on it
//! - **RAM**: 1024 words, addressed by LD/ST
//! - **VRAM**: 100x40 palette indices, background 236
//! - **Instruction format**: opcode word followed by zero to two immediates
//! - **Side effects**: PRINT, LOG, PAINT and SLEEP go through a [`host::Host`]
//!
//! # Modules
//!
//! - [`assembler`]: Two-pass assembly with diagnostics
//! - [`display`]: Pixel buffer and screen backends
//! - [`errors`]: Assembly, image and execution error types
//! - [`host`]: Side-effect boundary and the standard host
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`palette`]: xterm-256 palette and RGB quantization
//! - [`program`]: Bytecode image format and disassembly
//! - [`vm`]: Interpreter

pub mod assembler;
pub mod display;
pub mod errors;
pub mod host;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod palette;
pub mod program;
pub mod vm;
