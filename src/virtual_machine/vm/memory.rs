use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Word;

/// Word-addressed scalar memory, zeroed at creation.
pub(super) struct Ram {
    cells: Vec<Word>,
}

impl Ram {
    pub(super) fn new(size: usize) -> Self {
        Self {
            cells: vec![0; size],
        }
    }

    pub(super) fn as_slice(&self) -> &[Word] {
        &self.cells
    }

    fn index(&self, addr: Word) -> Result<usize, VMError> {
        usize::try_from(addr)
            .ok()
            .filter(|i| *i < self.cells.len())
            .ok_or(VMError::RamOutOfBounds {
                addr,
                size: self.cells.len(),
                pc: 0,
            })
    }

    pub(super) fn load(&self, addr: Word) -> Result<Word, VMError> {
        Ok(self.cells[self.index(addr)?])
    }

    pub(super) fn store(&mut self, addr: Word, value: Word) -> Result<(), VMError> {
        let i = self.index(addr)?;
        self.cells[i] = value;
        Ok(())
    }
}
