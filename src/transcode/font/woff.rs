//! WOFF 1.0 encoding: zlib-compressed sfnt tables.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use super::sfnt::Sfnt;
use crate::transcode::TranscodeError;

const SIGNATURE: u32 = u32::from_be_bytes(*b"wOFF");
const HEADER_LEN: usize = 44;
const ENTRY_LEN: usize = 20;

/// Convert a TrueType/OpenType font to WOFF.
///
/// Each table is compressed on its own and stored raw when compression
/// does not make it smaller.
pub fn to_woff(ttf: &[u8]) -> Result<Vec<u8>, TranscodeError> {
    let sfnt = Sfnt::parse(ttf)?;

    let mut blobs = Vec::with_capacity(sfnt.tables.len());
    for table in &sfnt.tables {
        let compressed = deflate(table.data)?;
        blobs.push(if compressed.len() < table.data.len() {
            compressed
        } else {
            table.data.to_vec()
        });
    }

    let mut offset = HEADER_LEN + ENTRY_LEN * sfnt.tables.len();
    let mut directory = Vec::with_capacity(ENTRY_LEN * sfnt.tables.len());
    for (table, blob) in sfnt.tables.iter().zip(&blobs) {
        directory.extend_from_slice(&table.tag);
        directory.extend_from_slice(&(offset as u32).to_be_bytes());
        directory.extend_from_slice(&(blob.len() as u32).to_be_bytes());
        directory.extend_from_slice(&(table.data.len() as u32).to_be_bytes());
        directory.extend_from_slice(&table.checksum.to_be_bytes());
        offset += blob.len().next_multiple_of(4);
    }
    let total = offset;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&SIGNATURE.to_be_bytes());
    out.extend_from_slice(&sfnt.flavor.to_be_bytes());
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&(sfnt.tables.len() as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&(sfnt.total_size() as u32).to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    // metadata and private blocks: offset, length, original length / offset, length
    out.extend_from_slice(&[0u8; 20]);
    out.extend_from_slice(&directory);
    for blob in &blobs {
        out.extend_from_slice(blob);
        out.resize(out.len().next_multiple_of(4), 0);
    }

    debug_assert_eq!(out.len(), total);
    Ok(out)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, TranscodeError> {
    let err = |e: std::io::Error| TranscodeError::Font(format!("zlib: {e}"));
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).map_err(err)?;
    encoder.finish().map_err(err)
}
