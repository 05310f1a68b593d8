use super::memory::Ram;
use super::stack::Stack;
use crate::virtual_machine::display::Vram;
use crate::virtual_machine::isa::Word;
use crate::virtual_machine::palette::BACKGROUND;

/// Sizes of the machine allocated for each run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmConfig {
    /// Operand stack capacity, in words.
    pub stack_size: usize,
    /// RAM size, in words.
    pub ram_size: usize,
    /// Pixel buffer width.
    pub cols: usize,
    /// Pixel buffer height.
    pub rows: usize,
    /// Palette index of an untouched pixel.
    pub background: u8,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_size: 128,
            ram_size: 1024,
            cols: 100,
            rows: 40,
            background: BACKGROUND,
        }
    }
}

/// Mutable machine state owned by a single run.
pub(super) struct ExecContext {
    /// Index of the next word to fetch.
    pub(super) pc: usize,
    /// Stack index of the current frame's saved pc, or -1 outside any call.
    pub(super) fp: Word,
    pub(super) stack: Stack,
    pub(super) ram: Ram,
    pub(super) vram: Vram,
}

impl ExecContext {
    pub(super) fn new(entry: usize, config: &VmConfig) -> Self {
        Self {
            pc: entry,
            fp: -1,
            stack: Stack::new(config.stack_size),
            ram: Ram::new(config.ram_size),
            vram: Vram::new(config.cols, config.rows, config.background),
        }
    }
}
