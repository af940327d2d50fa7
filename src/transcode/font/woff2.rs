//! WOFF2 encoding with null table transforms.
//!
//! All tables are concatenated into one brotli stream. `glyf` and `loca`
//! are stored untransformed, which WOFF2 marks with transform version 3.

use std::io::Write;

use super::sfnt::Sfnt;
use crate::transcode::TranscodeError;

const SIGNATURE: u32 = u32::from_be_bytes(*b"wOF2");
const HEADER_LEN: usize = 48;

const BROTLI_QUALITY: u32 = 11;
const BROTLI_LGWIN: u32 = 22;
const BROTLI_BUFFER: usize = 4096;

/// Tags with a one-byte directory encoding, indexed by flag value.
const KNOWN_TAGS: [&[u8; 4]; 63] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post", b"cvt ", b"fpgm",
    b"glyf", b"loca", b"prep", b"CFF ", b"VORG", b"EBDT", b"EBLC", b"gasp", b"hdmx", b"kern",
    b"LTSH", b"PCLT", b"VDMX", b"vhea", b"vmtx", b"BASE", b"GDEF", b"GPOS", b"GSUB", b"EBSC",
    b"JSTF", b"MATH", b"CBDT", b"CBLC", b"COLR", b"CPAL", b"SVG ", b"sbix", b"acnt", b"avar",
    b"bdat", b"bloc", b"bsln", b"cvar", b"fdsc", b"feat", b"fmtx", b"fvar", b"gvar", b"hsty",
    b"just", b"lcar", b"mort", b"morx", b"opbd", b"prop", b"trak", b"Zapf", b"Silf", b"Glat",
    b"Gloc", b"Feat", b"Sill",
];

const ARBITRARY_TAG: u8 = 63;
const NULL_TRANSFORM_GLYF: u8 = 3 << 6;

/// Convert a TrueType/OpenType font to WOFF2.
pub fn to_woff2(ttf: &[u8]) -> Result<Vec<u8>, TranscodeError> {
    let sfnt = Sfnt::parse(ttf)?;

    let mut directory = Vec::new();
    let mut stream = Vec::new();
    for table in &sfnt.tables {
        let known = KNOWN_TAGS.iter().position(|t| **t == table.tag);
        let transform = if matches!(&table.tag, b"glyf" | b"loca") {
            NULL_TRANSFORM_GLYF
        } else {
            0
        };
        match known {
            Some(index) => directory.push(index as u8 | transform),
            None => {
                directory.push(ARBITRARY_TAG | transform);
                directory.extend_from_slice(&table.tag);
            }
        }
        write_base128(&mut directory, table.data.len() as u32);
        stream.extend_from_slice(table.data);
    }

    let compressed = compress(&stream)?;
    let total = (HEADER_LEN + directory.len() + compressed.len()).next_multiple_of(4);

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&SIGNATURE.to_be_bytes());
    out.extend_from_slice(&sfnt.flavor.to_be_bytes());
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&(sfnt.tables.len() as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&(sfnt.total_size() as u32).to_be_bytes());
    out.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    // metadata and private blocks
    out.extend_from_slice(&[0u8; 20]);
    out.extend_from_slice(&directory);
    out.extend_from_slice(&compressed);
    out.resize(total, 0);
    Ok(out)
}

fn compress(data: &[u8]) -> Result<Vec<u8>, TranscodeError> {
    let mut writer =
        brotli::CompressorWriter::new(Vec::new(), BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_LGWIN);
    writer
        .write_all(data)
        .map_err(|e| TranscodeError::Font(format!("brotli: {e}")))?;
    Ok(writer.into_inner())
}

/// WOFF2 `UIntBase128`: big-endian 7-bit groups, high bit marks continuation.
fn write_base128(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut len = 0;
    let mut v = value;
    loop {
        groups[len] = (v & 0x7F) as u8;
        len += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | continuation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::font::fixture::tiny_ttf;
    use std::io::Read;

    fn u32_at(data: &[u8], at: usize) -> u32 {
        u32::from_be_bytes(data[at..at + 4].try_into().unwrap())
    }

    fn base128(value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        write_base128(&mut out, value);
        out
    }

    #[test]
    fn test_base128() {
        assert_eq!(base128(0), vec![0x00]);
        assert_eq!(base128(63), vec![0x3F]);
        assert_eq!(base128(128), vec![0x81, 0x00]);
        assert_eq!(base128(4000), vec![0x9F, 0x20]);
    }

    #[test]
    fn test_header_and_stream() {
        let ttf = tiny_ttf(4000);
        let woff2 = to_woff2(&ttf).unwrap();

        assert_eq!(&woff2[0..4], b"wOF2");
        assert_eq!(u32_at(&woff2, 8) as usize, woff2.len());
        assert_eq!(u16::from_be_bytes([woff2[12], woff2[13]]), 4);
        assert_eq!(u32_at(&woff2, 16) as usize, ttf.len());
        assert_eq!(woff2.len() % 4, 0);
        assert!(woff2.len() < ttf.len());

        // head, hhea, maxp, name with their flag indices
        let dir = &woff2[HEADER_LEN..];
        assert_eq!(dir[0], 1);
        assert_eq!(&dir[1..2], &base128(54)[..]);

        let compressed_len = u32_at(&woff2, 20) as usize;
        let dir_len = 1 + 1 + 1 + 1 + 1 + 1 + 1 + base128(6 + 4000).len();
        let start = HEADER_LEN + dir_len;
        let mut stream = Vec::new();
        brotli::Decompressor::new(&woff2[start..start + compressed_len], 4096)
            .read_to_end(&mut stream)
            .unwrap();

        let sfnt = Sfnt::parse(&ttf).unwrap();
        let expected: Vec<u8> = sfnt.tables.iter().flat_map(|t| t.data.to_vec()).collect();
        assert_eq!(stream, expected);
    }
}
