//! Pixel buffer and terminal rasterization.
//!
//! [`Vram`] stores one xterm palette index per cell. A [`Screen`] turns a full
//! frame into output: [`TerminalScreen`] draws colored block glyphs through
//! termcolor, [`FrameBuffer`] records frames in memory.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Word;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Glyph drawn for every cell.
pub const PIXEL: &str = "█";

/// Clears the screen and homes the cursor.
const CLEAR_SEQUENCE: &[u8] = b"\x1b[2J\x1b[H";

/// Row-major grid of palette indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vram {
    cols: usize,
    rows: usize,
    background: u8,
    cells: Vec<u8>,
}

impl Vram {
    /// Creates a buffer filled with `background`.
    pub fn new(cols: usize, rows: usize, background: u8) -> Self {
        Self {
            cols,
            rows,
            background,
            cells: vec![background; cols * rows],
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn background(&self) -> u8 {
        self.background
    }

    /// Resets every cell to the background index.
    pub fn clear(&mut self) {
        self.cells.fill(self.background);
    }

    fn offset(&self, x: Word, y: Word) -> Result<usize, VMError> {
        let in_range = |v: Word, limit: usize| usize::try_from(v).ok().filter(|v| *v < limit);
        match (in_range(x, self.cols), in_range(y, self.rows)) {
            (Some(x), Some(y)) => Ok(y * self.cols + x),
            _ => Err(VMError::VramOutOfBounds {
                x,
                y,
                cols: self.cols,
                rows: self.rows,
                pc: 0,
            }),
        }
    }

    /// Returns the palette index at `(x, y)`.
    pub fn get(&self, x: Word, y: Word) -> Result<u8, VMError> {
        Ok(self.cells[self.offset(x, y)?])
    }

    /// Sets the cell at `(x, y)`.
    pub fn set(&mut self, x: Word, y: Word, index: u8) -> Result<(), VMError> {
        let offset = self.offset(x, y)?;
        self.cells[offset] = index;
        Ok(())
    }

    /// Fills `[x, x + w) x [y, y + h)`. Empty or negative extents draw nothing.
    ///
    /// Cells are written in row order, so a rectangle running off the screen
    /// faults after painting the part that fits.
    pub fn fill_rect(&mut self, x: Word, y: Word, w: Word, h: Word, index: u8) -> Result<(), VMError> {
        for cy in y..y.saturating_add(h) {
            for cx in x..x.saturating_add(w) {
                self.set(cx, cy, index)?;
            }
        }
        Ok(())
    }

    /// Iterates over rows, top to bottom.
    pub fn lines(&self) -> impl Iterator<Item = &[u8]> {
        self.cells.chunks(self.cols.max(1)).take(self.rows)
    }

    /// Clears `screen` and redraws every row.
    pub fn paint(&self, screen: &mut dyn Screen) -> io::Result<()> {
        screen.clear()?;
        for row in self.lines() {
            screen.draw_row(row)?;
        }
        screen.present()
    }
}

/// Minimal rendering capability the VM paints through.
pub trait Screen {
    /// Starts a new frame.
    fn clear(&mut self) -> io::Result<()>;
    /// Draws one row of palette indices, left to right.
    fn draw_row(&mut self, row: &[u8]) -> io::Result<()>;
    /// Finishes the frame.
    fn present(&mut self) -> io::Result<()>;
}

/// Screen backed by an ANSI 256-color terminal on stdout.
pub struct TerminalScreen {
    out: StandardStream,
}

impl TerminalScreen {
    pub fn stdout() -> Self {
        Self {
            out: StandardStream::stdout(ColorChoice::Always),
        }
    }
}

impl Screen for TerminalScreen {
    fn clear(&mut self) -> io::Result<()> {
        self.out.write_all(CLEAR_SEQUENCE)
    }

    fn draw_row(&mut self, row: &[u8]) -> io::Result<()> {
        let mut spec = ColorSpec::new();
        for &index in row {
            self.out.set_color(spec.set_fg(Some(Color::Ansi256(index))))?;
            self.out.write_all(PIXEL.as_bytes())?;
        }
        self.out.reset()?;
        self.out.write_all(b"\n")
    }

    fn present(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Screen that keeps every presented frame in memory.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<Vec<u8>>,
    frames: Vec<Vec<Vec<u8>>>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames presented so far, oldest first.
    pub fn frames(&self) -> &[Vec<Vec<u8>>] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&Vec<Vec<u8>>> {
        self.frames.last()
    }
}

impl Screen for FrameBuffer {
    fn clear(&mut self) -> io::Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn draw_row(&mut self, row: &[u8]) -> io::Result<()> {
        self.pending.push(row.to_vec());
        Ok(())
    }

    fn present(&mut self) -> io::Result<()> {
        self.frames.push(std::mem::take(&mut self.pending));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::palette::BACKGROUND;

    #[test]
    fn new_buffer_is_background() {
        let vram = Vram::new(4, 3, BACKGROUND);
        assert_eq!(vram.lines().count(), 3);
        assert!(vram.lines().all(|row| row == [BACKGROUND; 4]));
    }

    #[test]
    fn set_and_get() {
        let mut vram = Vram::new(4, 3, BACKGROUND);
        vram.set(3, 2, 9).unwrap();
        assert_eq!(vram.get(3, 2).unwrap(), 9);
        assert_eq!(vram.get(2, 3 - 1).unwrap(), BACKGROUND);
    }

    #[test]
    fn out_of_range_x_does_not_wrap_to_next_row() {
        let mut vram = Vram::new(4, 3, BACKGROUND);
        assert!(matches!(
            vram.set(4, 0, 1),
            Err(VMError::VramOutOfBounds { x: 4, y: 0, cols: 4, rows: 3, .. })
        ));
        assert!(vram.set(-1, 1, 1).is_err());
        assert!(vram.set(0, 3, 1).is_err());
        assert_eq!(vram, Vram::new(4, 3, BACKGROUND));
    }

    #[test]
    fn fill_rect_is_half_open() {
        let mut vram = Vram::new(5, 4, 0);
        vram.fill_rect(1, 1, 3, 2, 7).unwrap();
        let rows: Vec<&[u8]> = vram.lines().collect();
        assert_eq!(rows[0], [0, 0, 0, 0, 0]);
        assert_eq!(rows[1], [0, 7, 7, 7, 0]);
        assert_eq!(rows[2], [0, 7, 7, 7, 0]);
        assert_eq!(rows[3], [0, 0, 0, 0, 0]);
    }

    #[test]
    fn fill_rect_with_empty_extent_draws_nothing() {
        let mut vram = Vram::new(2, 2, 0);
        vram.fill_rect(0, 0, 0, 2, 5).unwrap();
        vram.fill_rect(0, 0, 2, -1, 5).unwrap();
        assert_eq!(vram, Vram::new(2, 2, 0));
    }

    #[test]
    fn clear_resets_cells() {
        let mut vram = Vram::new(2, 2, 3);
        vram.fill_rect(0, 0, 2, 2, 5).unwrap();
        vram.clear();
        assert_eq!(vram, Vram::new(2, 2, 3));
    }

    #[test]
    fn paint_records_full_frame() {
        let mut vram = Vram::new(3, 2, 1);
        vram.set(2, 1, 4).unwrap();
        let mut screen = FrameBuffer::new();
        vram.paint(&mut screen).unwrap();
        vram.paint(&mut screen).unwrap();
        assert_eq!(screen.frames().len(), 2);
        assert_eq!(
            screen.last_frame().unwrap(),
            &vec![vec![1, 1, 1], vec![1, 1, 4]]
        );
    }
}
