//! lhvm library.
//!
//! Provides the bytecode interpreter, its assembler and the terminal
//! rasterizer behind the `lhvm` and `lhvma` binaries.

pub mod utils;
pub mod virtual_machine;
