use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Word;

/// Fixed-capacity operand stack.
///
/// Slots are allocated up front and `sp` moves over them. Moving `sp` down
/// leaves the old values in place, so a frame can be re-exposed by moving it
/// back up.
///
/// Faults carry `pc: 0`; the interpreter stamps the real pc before the error
/// leaves [`VM::step`](super::VM::step).
pub(super) struct Stack {
    slots: Vec<Word>,
    /// Index of the top slot, -1 when empty.
    sp: Word,
}

impl Stack {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity],
            sp: -1,
        }
    }

    pub(super) fn sp(&self) -> Word {
        self.sp
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Live slots, bottom first.
    pub(super) fn as_slice(&self) -> &[Word] {
        &self.slots[..(self.sp + 1) as usize]
    }

    pub(super) fn push(&mut self, value: Word) -> Result<(), VMError> {
        let capacity = self.capacity();
        let slot = self
            .slots
            .get_mut((self.sp + 1) as usize)
            .ok_or(VMError::StackOverflow { pc: 0, capacity })?;
        *slot = value;
        self.sp += 1;
        Ok(())
    }

    pub(super) fn pop(&mut self) -> Result<Word, VMError> {
        let value = self.peek()?;
        self.sp -= 1;
        Ok(value)
    }

    pub(super) fn peek(&self) -> Result<Word, VMError> {
        if self.sp < 0 {
            return Err(VMError::StackUnderflow { pc: 0 });
        }
        Ok(self.slots[self.sp as usize])
    }

    /// Reads any slot within capacity, live or not.
    pub(super) fn get(&self, index: Word) -> Result<Word, VMError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.slots.get(i).copied())
            .ok_or(VMError::StackIndexOutOfBounds {
                index,
                sp: self.sp,
                pc: 0,
            })
    }

    /// Moves `sp` to any index from -1 up to the last slot, in either
    /// direction.
    pub(super) fn set_sp(&mut self, sp: Word) -> Result<(), VMError> {
        if sp < -1 || sp >= self.capacity() as Word {
            return Err(VMError::StackIndexOutOfBounds {
                index: sp,
                sp: self.sp,
                pc: 0,
            });
        }
        self.sp = sp;
        Ok(())
    }
}
