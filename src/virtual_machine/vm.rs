//! Core virtual machine implementation.
//!
//! The VM executes a flat word program on a fixed-capacity operand stack.
//! Calls build their activation record on that same stack: CALL pushes
//! `nargs`, the caller's `fp` and the return pc, then points `fp` at the saved
//! pc. Arguments sit below the record, so `ARG n` reads `stack[fp - n - 3]`.
//!
//! All buffer accesses are checked. Any violation stops the run with a
//! [`VMError`] naming the faulting pc; nothing is recovered.

mod context;
mod memory;
mod stack;

pub use context::VmConfig;

use crate::virtual_machine::display::Vram;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::host::Host;
use crate::virtual_machine::isa::{Instruction, Word};
use crate::virtual_machine::palette::quantize;
use crate::virtual_machine::program::Program;
use context::ExecContext;
use std::time::Duration;

macro_rules! exec_vm {
    // Entry point
    (
        vm = $vm:ident,
        host = $host:ident,
        instr = $instr:ident,
        { $( $variant:ident => $handler:ident $args:tt ),* $(,)? }
    ) => {{
        match $instr {
            $(
                Instruction::$variant => exec_vm!(@call $vm, $host, $handler, $args),
            )*
        }
    }};

    // Handler that drives the host (semicolon separator)
    (@call $vm:ident, $host:ident, $handler:ident, (host; $( $field:ident ),* $(,)? )) => {{
        $( let $field = $vm.fetch()?; )*
        $vm.$handler($host, $( $field ),*)
    }};

    // Handler on machine state only
    (@call $vm:ident, $host:ident, $handler:ident, ( $( $field:ident ),* $(,)? )) => {{
        $( let $field = $vm.fetch()?; )*
        $vm.$handler($( $field ),*)
    }};
}

/// Bytecode virtual machine.
///
/// Built once per program; [`run`](VM::run) executes from the entry point
/// until HALT.
pub struct VM {
    /// Program words.
    code: Vec<Word>,
    /// Registers, stack, RAM and pixel buffer.
    ctx: ExecContext,
    /// Instructions executed so far.
    steps: u64,
    halted: bool,
}

impl VM {
    /// Creates a VM positioned at the program's entry point.
    pub fn new(program: Program, config: &VmConfig) -> Result<Self, VMError> {
        let entry = usize::try_from(program.entry).map_err(|_| {
            VMError::ProgramCounterOutOfBounds {
                pc: program.entry,
                len: program.code.len(),
            }
        })?;
        Ok(Self {
            code: program.code,
            ctx: ExecContext::new(entry, config),
            steps: 0,
            halted: false,
        })
    }

    /// Executes instructions until HALT or a fault.
    pub fn run<H: Host>(&mut self, host: &mut H) -> Result<(), VMError> {
        while self.step(host)? {}
        Ok(())
    }

    /// Executes a single instruction. Returns `false` once HALT has run.
    pub fn step<H: Host>(&mut self, host: &mut H) -> Result<bool, VMError> {
        if self.halted {
            return Ok(false);
        }
        let at = self.ctx.pc;
        self.exec(host).map_err(|e| e.at_pc(at))?;
        self.steps += 1;
        Ok(!self.halted)
    }

    /// Index of the next word to fetch.
    pub fn pc(&self) -> usize {
        self.ctx.pc
    }

    /// Current frame pointer, -1 outside any call.
    pub fn fp(&self) -> Word {
        self.ctx.fp
    }

    /// Index of the top stack slot, -1 when empty.
    pub fn sp(&self) -> Word {
        self.ctx.stack.sp()
    }

    /// Live stack slots, bottom first.
    pub fn stack(&self) -> &[Word] {
        self.ctx.stack.as_slice()
    }

    pub fn ram(&self) -> &[Word] {
        self.ctx.ram.as_slice()
    }

    pub fn vram(&self) -> &Vram {
        &self.ctx.vram
    }

    /// Number of instructions executed.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Reads the word at pc and advances pc.
    fn fetch(&mut self) -> Result<Word, VMError> {
        let word = *self
            .code
            .get(self.ctx.pc)
            .ok_or(VMError::ProgramCounterOutOfBounds {
                pc: self.ctx.pc as Word,
                len: self.code.len(),
            })?;
        self.ctx.pc += 1;
        Ok(word)
    }

    /// Moves pc to `addr`. Targets past the end fault on the next fetch.
    fn jump(&mut self, addr: Word) -> Result<(), VMError> {
        self.ctx.pc = usize::try_from(addr).map_err(|_| VMError::ProgramCounterOutOfBounds {
            pc: addr,
            len: self.code.len(),
        })?;
        Ok(())
    }

    fn push(&mut self, value: Word) -> Result<(), VMError> {
        self.ctx.stack.push(value)
    }

    fn pop(&mut self) -> Result<Word, VMError> {
        self.ctx.stack.pop()
    }

    /// Fetches, decodes and executes one instruction.
    fn exec<H: Host>(&mut self, host: &mut H) -> Result<(), VMError> {
        let opcode = self.fetch()?;
        let instruction = Instruction::try_from(opcode)?;
        exec_vm! {
            vm = self,
            host = host,
            instr = instruction,
            {
                // Stack and arithmetic
                Push => op_push(value),
                Pop => op_pop(),
                Add => op_add(),
                Subt => op_subt(),
                Sleep => op_sleep(host; ms),
                // Control flow
                Jmp => op_jmp(addr),
                Jmplt => op_jmplt(comp, addr),
                Jmpgt => op_jmpgt(comp, addr),
                Jmpeq => op_jmpeq(comp, addr),
                Call => op_call(addr, nargs),
                Ret => op_ret(),
                Arg => op_arg(n),
                // Devices
                Print => op_print(host;),
                Setpx => op_setpx(),
                Rect => op_rect(),
                Paint => op_paint(host;),
                Clear => op_clear(),
                // Memory
                Ld => op_ld(addr),
                St => op_st(addr),
                // Machine
                Halt => op_halt(),
                Log => op_log(host;),
            }
        }
    }

    fn op_push(&mut self, value: Word) -> Result<(), VMError> {
        self.push(value)
    }

    fn op_pop(&mut self) -> Result<(), VMError> {
        self.pop().map(drop)
    }

    fn op_add(&mut self) -> Result<(), VMError> {
        let a = self.pop()?;
        let b = self.pop()?;
        self.push(a.wrapping_add(b))
    }

    fn op_subt(&mut self) -> Result<(), VMError> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(a.wrapping_sub(b))
    }

    fn op_sleep<H: Host>(&mut self, host: &mut H, ms: Word) -> Result<(), VMError> {
        host.sleep(Duration::from_millis(ms.max(0) as u64));
        Ok(())
    }

    fn op_jmp(&mut self, addr: Word) -> Result<(), VMError> {
        self.jump(addr)
    }

    fn op_jmplt(&mut self, comp: Word, addr: Word) -> Result<(), VMError> {
        if self.pop()? < comp {
            self.jump(addr)?;
        }
        Ok(())
    }

    fn op_jmpgt(&mut self, comp: Word, addr: Word) -> Result<(), VMError> {
        if self.pop()? > comp {
            self.jump(addr)?;
        }
        Ok(())
    }

    fn op_jmpeq(&mut self, comp: Word, addr: Word) -> Result<(), VMError> {
        if self.ctx.stack.peek()? == comp {
            self.jump(addr)?;
        }
        Ok(())
    }

    fn op_call(&mut self, addr: Word, nargs: Word) -> Result<(), VMError> {
        self.push(nargs)?;
        self.push(self.ctx.fp)?;
        self.push(self.ctx.pc as Word)?;
        self.ctx.fp = self.ctx.stack.sp();
        self.jump(addr)
    }

    fn op_ret(&mut self) -> Result<(), VMError> {
        let value = self.pop()?;

        // sp := fp, even when the callee popped into its own record
        self.ctx.stack.set_sp(self.ctx.fp)?;

        let return_pc = self.pop()?;
        self.ctx.fp = self.pop()?;
        let nargs = self.pop()?;
        if nargs < 0 {
            return Err(VMError::InvalidArgCount { nargs, pc: 0 });
        }
        for _ in 0..nargs {
            self.pop()?;
        }

        self.push(value)?;
        self.jump(return_pc)
    }

    fn op_arg(&mut self, n: Word) -> Result<(), VMError> {
        let index = self.ctx.fp.wrapping_sub(n).wrapping_sub(3);
        let value = self.ctx.stack.get(index)?;
        self.push(value)
    }

    fn op_print<H: Host>(&mut self, host: &mut H) -> Result<(), VMError> {
        let value = self.pop()?;
        host.print(value)?;
        Ok(())
    }

    fn op_setpx(&mut self) -> Result<(), VMError> {
        let color = self.pop()?;
        let y = self.pop()?;
        let x = self.pop()?;
        self.ctx.vram.set(x, y, quantize(color))
    }

    fn op_rect(&mut self) -> Result<(), VMError> {
        let color = self.pop()?;
        let h = self.pop()?;
        let w = self.pop()?;
        let y = self.pop()?;
        let x = self.pop()?;
        self.ctx.vram.fill_rect(x, y, w, h, quantize(color))
    }

    fn op_paint<H: Host>(&mut self, host: &mut H) -> Result<(), VMError> {
        self.ctx.vram.paint(host.screen())?;
        Ok(())
    }

    fn op_clear(&mut self) -> Result<(), VMError> {
        self.ctx.vram.clear();
        Ok(())
    }

    fn op_ld(&mut self, addr: Word) -> Result<(), VMError> {
        let value = self.ctx.ram.load(addr)?;
        self.push(value)
    }

    fn op_st(&mut self, addr: Word) -> Result<(), VMError> {
        let value = self.pop()?;
        self.ctx.ram.store(addr, value)
    }

    fn op_halt(&mut self) -> Result<(), VMError> {
        self.halted = true;
        Ok(())
    }

    /// Dumps every slot below the top as `[]int{a, b}`; the top itself is
    /// left out.
    fn op_log<H: Host>(&mut self, host: &mut H) -> Result<(), VMError> {
        let slots = self.ctx.stack.as_slice();
        if let Some((_top, below)) = slots.split_last() {
            host.log(&dump_slots(below))?;
        }
        Ok(())
    }
}

/// Renders stack slots in the `[]int{1, 2}` form LOG writes.
fn dump_slots(slots: &[Word]) -> String {
    let words: Vec<String> = slots.iter().map(Word::to_string).collect();
    format!("[]int{{{}}}", words.join(", "))
}
