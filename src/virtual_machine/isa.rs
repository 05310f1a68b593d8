//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical opcode table and hands it to a callback macro, so the assembler,
//! the interpreter and the static ISA check all read the same list.
//!
//! This module generates:
//! - The [`Instruction`] enum with its numeric codes
//! - `TryFrom<Word>` for decoding fetched words
//! - Mnemonic lookups in both directions
//!
//! # Bytecode Format
//!
//! A program is a flat sequence of [`Word`]s. Each instruction is one word
//! holding its code, followed by its immediates, one word each, in the order
//! listed below. Codes are dense, starting at 0 with `PUSH`.

use crate::virtual_machine::errors::VMError;

/// One cell of program, stack or RAM.
pub type Word = i64;

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Stack and arithmetic
            // =========================
            /// PUSH value ; push the immediate
            Push = 0, "PUSH" => [value: Imm],
            /// POP ; discard the top value
            Pop = 1, "POP" => [],
            /// ADD ; push(pop() + pop())
            Add = 2, "ADD" => [],
            /// SUBT ; b = pop(), a = pop(), push(a - b)
            Subt = 3, "SUBT" => [],
            /// SLEEP ms ; block the thread for ms milliseconds
            Sleep = 4, "SLEEP" => [ms: Imm],
            // =========================
            // Control flow
            // =========================
            /// JMP addr ; pc = addr
            Jmp = 5, "JMP" => [addr: Addr],
            /// JMPLT comp, addr ; if pop() < comp then pc = addr
            Jmplt = 6, "JMPLT" => [comp: Imm, addr: Addr],
            /// JMPGT comp, addr ; if pop() > comp then pc = addr
            Jmpgt = 7, "JMPGT" => [comp: Imm, addr: Addr],
            /// JMPEQ comp, addr ; if peek() == comp then pc = addr (top is kept)
            Jmpeq = 8, "JMPEQ" => [comp: Imm, addr: Addr],
            /// CALL addr, nargs ; push nargs, fp, pc ; fp = sp ; pc = addr
            Call = 9, "CALL" => [addr: Addr, nargs: Imm],
            /// RET ; unwind the current frame and its arguments, leaving the return value
            Ret = 10, "RET" => [],
            /// ARG n ; push stack[fp - n - 3]
            Arg = 11, "ARG" => [n: Imm],
            // =========================
            // Devices
            // =========================
            /// PRINT ; write pop() as a decimal line to stdout
            Print = 12, "PRINT" => [],
            /// SETPX ; c = pop(), y = pop(), x = pop() ; vram[x, y] = quantize(c)
            Setpx = 13, "SETPX" => [],
            /// RECT ; c, h, w, y, x popped in that order ; fill the rectangle
            Rect = 14, "RECT" => [],
            /// PAINT ; clear the terminal and draw the whole pixel buffer
            Paint = 15, "PAINT" => [],
            /// CLEAR ; reset the pixel buffer to the background color
            Clear = 16, "CLEAR" => [],
            // =========================
            // Memory
            // =========================
            /// LD addr ; push ram[addr]
            Ld = 17, "LD" => [addr: Addr],
            /// ST addr ; ram[addr] = pop()
            St = 18, "ST" => [addr: Addr],
            // =========================
            // Machine
            // =========================
            /// HALT ; stop execution
            Halt = 19, "HALT" => [],
            /// LOG ; dump stack[0..sp) to the log sink as `[]int{a, b}`
            Log = 20, "LOG" => [],
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:expr, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<Word> for Instruction {
            type Error = VMError;

            fn try_from(value: Word) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(VMError::InvalidInstruction { opcode: value, pc: 0 }),
                }
            }
        }

        impl Instruction {
            /// Every instruction, in opcode order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name, )* ];

            /// Returns the numeric code emitted into bytecode.
            pub const fn code(&self) -> Word {
                *self as Word
            }

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Looks up an instruction by its exact (uppercase) mnemonic.
            pub fn from_mnemonic(name: &str) -> Option<Self> {
                match name {
                    $( $mnemonic => Some(Instruction::$name), )*
                    _ => None,
                }
            }

            /// Number of immediate words following the opcode.
            pub const fn immediates(&self) -> usize {
                match self {
                    $( Instruction::$name => define_instructions!(@count $( $field ),*), )*
                }
            }
        }
    };

    (@count $( $x:ident ),* ) => {
        <[()]>::len(&[ $( define_instructions!(@unit $x) ),* ])
    };

    (@unit $x:ident) => { () };
}

for_each_instruction!(define_instructions);
