//! xterm 256-color palette and nearest-color quantization.
//!
//! Packed colors are `0xRRGGBBAA` words. Only the low 32 bits are read, and
//! the alpha byte does not take part in matching.

use crate::virtual_machine::isa::Word;

/// Palette index used for an untouched pixel (a dark gray, `#303030`).
pub const BACKGROUND: u8 = 236;

const SYSTEM: [u32; 16] = [
    0x000000, 0x800000, 0x008000, 0x808000, 0x000080, 0x800080, 0x008080, 0xc0c0c0,
    0x808080, 0xff0000, 0x00ff00, 0xffff00, 0x0000ff, 0xff00ff, 0x00ffff, 0xffffff,
];

const CUBE_LEVELS: [u32; 6] = [0x00, 0x5f, 0x87, 0xaf, 0xd7, 0xff];

const fn build_palette() -> [u32; 256] {
    let mut out = [0u32; 256];
    let mut i = 0;
    while i < 16 {
        out[i] = SYSTEM[i];
        i += 1;
    }
    // 6x6x6 color cube
    while i < 232 {
        let n = i - 16;
        let r = CUBE_LEVELS[n / 36];
        let g = CUBE_LEVELS[(n / 6) % 6];
        let b = CUBE_LEVELS[n % 6];
        out[i] = (r << 16) | (g << 8) | b;
        i += 1;
    }
    // grayscale ramp
    while i < 256 {
        let v = 8 + 10 * (i as u32 - 232);
        out[i] = (v << 16) | (v << 8) | v;
        i += 1;
    }
    out
}

/// RGB value of every xterm palette index.
pub static XTERM_256: [u32; 256] = build_palette();

fn channels(rgb: u32) -> (i32, i32, i32) {
    (
        ((rgb >> 16) & 0xff) as i32,
        ((rgb >> 8) & 0xff) as i32,
        (rgb & 0xff) as i32,
    )
}

/// Maps a packed `0xRRGGBBAA` color to the closest palette index by squared
/// RGB distance.
///
/// Ties resolve to the lowest index, so pure black maps to 0 rather than 16.
pub fn quantize(packed: Word) -> u8 {
    let (r, g, b) = channels(packed as u32 >> 8);
    let mut best = 0usize;
    let mut best_dist = i32::MAX;
    for (idx, &candidate) in XTERM_256.iter().enumerate() {
        let (cr, cg, cb) = channels(candidate);
        let dist = (r - cr).pow(2) + (g - cg).pow(2) + (b - cb).pow(2);
        if dist < best_dist {
            best = idx;
            best_dist = dist;
            if dist == 0 {
                break;
            }
        }
    }
    best as u8
}
