use crate::virtual_machine::isa::Word;
use lhvm_derive::Error;

/// Errors raised while loading, assembling, or running a program.
///
/// Every variant is fatal: the VM stops at the first fault and nothing is
/// retried.
#[derive(Debug, Error)]
pub enum VMError {
    // =========================
    // Run-time faults
    // =========================
    /// Fetched word is not an opcode.
    #[error("invalid instruction {opcode} at pc {pc}")]
    InvalidInstruction { opcode: Word, pc: usize },
    /// Fetch or jump target outside the program.
    #[error("program counter {pc} outside program of {len} words")]
    ProgramCounterOutOfBounds { pc: Word, len: usize },
    /// Push onto a full operand stack.
    #[error("stack overflow at pc {pc} (capacity {capacity})")]
    StackOverflow { pc: usize, capacity: usize },
    /// Pop or peek on an empty operand stack.
    #[error("stack underflow at pc {pc}")]
    StackUnderflow { pc: usize },
    /// Frame-relative access (ARG, RET) reaching outside the stack's capacity.
    #[error("stack index {index} out of bounds at pc {pc} (sp {sp})")]
    StackIndexOutOfBounds { index: Word, sp: Word, pc: usize },
    /// RET found a negative argument count in the activation record.
    #[error("invalid argument count {nargs} in frame at pc {pc}")]
    InvalidArgCount { nargs: Word, pc: usize },
    /// LD/ST address outside RAM.
    #[error("ram address {addr} out of bounds at pc {pc} (size {size})")]
    RamOutOfBounds { addr: Word, size: usize, pc: usize },
    /// SETPX/RECT coordinate outside the pixel buffer.
    #[error("pixel ({x}, {y}) outside {cols}x{rows} screen at pc {pc}")]
    VramOutOfBounds {
        x: Word,
        y: Word,
        cols: usize,
        rows: usize,
        pc: usize,
    },
    /// A host sink (stdout, log, screen) failed.
    #[error("io error: {0}")]
    Io(String),

    // =========================
    // Assembly errors
    // =========================
    /// Token that is neither a mnemonic, a known label, nor an integer.
    #[error("invalid constant or unknown label: {token}")]
    InvalidToken { token: String },
    /// Label or flat-form name declared twice.
    #[error("duplicate label: {label}")]
    DuplicateLabel { label: String },
    /// Declaration whose name is empty or contains whitespace.
    #[error("invalid label name: {label:?}")]
    InvalidLabel { label: String },
    /// Instruction line before any section declaration in section form.
    #[error("instruction outside of any section")]
    OrphanInstruction,
    /// Assembly error with source location.
    #[error("line {line}: {source}")]
    AssemblyError {
        line: usize,
        offset: usize,
        source: String,
    },
    /// File I/O error while reading source or writing an image.
    #[error("io error on {path}: {source}")]
    IoError { path: String, source: String },

    // =========================
    // Image errors
    // =========================
    /// Malformed bytecode image.
    #[error("decoding error on line {line}: {reason}")]
    DecodeError { line: usize, reason: String },
}

impl VMError {
    /// Stamps the pc of the faulting instruction onto run-time faults.
    pub(crate) fn at_pc(self, at: usize) -> Self {
        match self {
            VMError::InvalidInstruction { opcode, .. } => {
                VMError::InvalidInstruction { opcode, pc: at }
            }
            VMError::StackOverflow { capacity, .. } => VMError::StackOverflow { pc: at, capacity },
            VMError::StackUnderflow { .. } => VMError::StackUnderflow { pc: at },
            VMError::StackIndexOutOfBounds { index, sp, .. } => {
                VMError::StackIndexOutOfBounds { index, sp, pc: at }
            }
            VMError::InvalidArgCount { nargs, .. } => VMError::InvalidArgCount { nargs, pc: at },
            VMError::RamOutOfBounds { addr, size, .. } => {
                VMError::RamOutOfBounds { addr, size, pc: at }
            }
            VMError::VramOutOfBounds {
                x, y, cols, rows, ..
            } => VMError::VramOutOfBounds {
                x,
                y,
                cols,
                rows,
                pc: at,
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for VMError {
    fn from(err: std::io::Error) -> Self {
        VMError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_named_fields() {
        let err = VMError::StackOverflow {
            pc: 12,
            capacity: 128,
        };
        assert_eq!(err.to_string(), "stack overflow at pc 12 (capacity 128)");
    }

    #[test]
    fn display_skips_unmentioned_fields() {
        let err = VMError::AssemblyError {
            line: 3,
            offset: 5,
            source: "duplicate label: main".to_string(),
        };
        assert_eq!(err.to_string(), "line 3: duplicate label: main");
    }

    #[test]
    fn display_positional_and_unit() {
        assert_eq!(VMError::Io("broken pipe".into()).to_string(), "io error: broken pipe");
        assert_eq!(
            VMError::OrphanInstruction.to_string(),
            "instruction outside of any section"
        );
    }

    #[test]
    fn at_pc_stamps_memory_faults() {
        let ram = VMError::RamOutOfBounds {
            addr: 2048,
            size: 1024,
            pc: 0,
        }
        .at_pc(17);
        assert!(matches!(ram, VMError::RamOutOfBounds { pc: 17, .. }));
        assert_eq!(
            ram.to_string(),
            "ram address 2048 out of bounds at pc 17 (size 1024)"
        );

        let vram = VMError::VramOutOfBounds {
            x: 100,
            y: 0,
            cols: 100,
            rows: 40,
            pc: 0,
        }
        .at_pc(3);
        assert!(matches!(vram, VMError::VramOutOfBounds { x: 100, pc: 3, .. }));
    }

    #[test]
    fn at_pc_leaves_pc_faults_alone() {
        let err = VMError::ProgramCounterOutOfBounds { pc: 99, len: 4 }.at_pc(2);
        assert!(matches!(err, VMError::ProgramCounterOutOfBounds { pc: 99, len: 4 }));
    }

    #[test]
    fn io_error_converts() {
        let err: VMError = std::io::Error::other("disk gone").into();
        assert!(matches!(err, VMError::Io(ref msg) if msg == "disk gone"));
    }
}
