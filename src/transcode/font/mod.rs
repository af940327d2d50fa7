//! Font conversion and `@font-face` generation.
//!
//! TrueType sources are re-packed into WOFF (zlib) and WOFF2 (brotli)
//! containers without touching glyph data. Face descriptors come from the
//! file name alone, see [`FontFace::from_stem`].

mod face;
mod sfnt;
mod woff;
mod woff2;

pub use face::{FontFace, FontFaceSheet, FontFormat};
pub use woff::to_woff;
pub use woff2::to_woff2;

/// Hand-built sfnt files for tests.
#[cfg(test)]
pub(crate) mod fixture {
    /// A minimal TrueType font: `head`, `hhea`, `maxp` and a `name` table
    /// padded with `filler` bytes so compression has something to chew on.
    pub fn tiny_ttf(filler: usize) -> Vec<u8> {
        let mut head = vec![0u8; 54];
        head[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
        head[12..16].copy_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
        head[18..20].copy_from_slice(&1000u16.to_be_bytes());

        let mut hhea = vec![0u8; 36];
        hhea[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
        hhea[34..36].copy_from_slice(&1u16.to_be_bytes());

        let mut maxp = vec![0u8; 6];
        maxp[0..4].copy_from_slice(&0x0000_5000u32.to_be_bytes());
        maxp[4..6].copy_from_slice(&1u16.to_be_bytes());

        // Format 0 name table with no records, then filler
        let mut name = vec![0u8; 6];
        name[4..6].copy_from_slice(&6u16.to_be_bytes());
        name.extend(std::iter::repeat_n(b'a', filler));

        build(&[(*b"head", head), (*b"hhea", hhea), (*b"maxp", maxp), (*b"name", name)])
    }

    fn build(tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
        let count = tables.len() as u16;
        let mut out = Vec::new();
        out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        out.extend_from_slice(&count.to_be_bytes());
        out.extend_from_slice(&[0u8; 6]);

        let mut offset = 12 + 16 * tables.len();
        for (tag, data) in tables {
            out.extend_from_slice(tag);
            out.extend_from_slice(&0u32.to_be_bytes());
            out.extend_from_slice(&(offset as u32).to_be_bytes());
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            offset += data.len().next_multiple_of(4);
        }
        for (_, data) in tables {
            out.extend_from_slice(data);
            out.resize(out.len().next_multiple_of(4), 0);
        }
        out
    }
}
