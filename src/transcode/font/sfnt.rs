//! sfnt table directory reading.

use crate::transcode::TranscodeError;

const TTC_TAG: u32 = u32::from_be_bytes(*b"ttcf");

/// A parsed sfnt: its flavor and tables sorted by tag.
pub struct Sfnt<'a> {
    pub flavor: u32,
    pub tables: Vec<Table<'a>>,
}

pub struct Table<'a> {
    pub tag: [u8; 4],
    pub checksum: u32,
    pub data: &'a [u8],
}

impl<'a> Sfnt<'a> {
    /// Validate the font with ttf-parser, then read its table directory.
    pub fn parse(data: &'a [u8]) -> Result<Self, TranscodeError> {
        let flavor = read_u32(data, 0).ok_or_else(|| invalid("file too short"))?;
        if flavor == TTC_TAG {
            return Err(invalid("font collections are not supported"));
        }
        ttf_parser::Face::parse(data, 0).map_err(|e| invalid(&e.to_string()))?;

        let count = read_u16(data, 4).ok_or_else(|| invalid("truncated header"))? as usize;
        let mut tables = Vec::with_capacity(count);
        for i in 0..count {
            let record = 12 + i * 16;
            let tag = data
                .get(record..record + 4)
                .and_then(|t| <[u8; 4]>::try_from(t).ok())
                .ok_or_else(|| invalid("truncated table directory"))?;
            let (Some(checksum), Some(offset), Some(length)) = (
                read_u32(data, record + 4),
                read_u32(data, record + 8),
                read_u32(data, record + 12),
            ) else {
                return Err(invalid("truncated table directory"));
            };
            let (offset, length) = (offset as usize, length as usize);
            let table = data.get(offset..offset + length).ok_or_else(|| {
                invalid(&format!(
                    "table `{}` out of bounds",
                    String::from_utf8_lossy(&tag)
                ))
            })?;
            tables.push(Table {
                tag,
                checksum,
                data: table,
            });
        }

        tables.sort_by_key(|t| t.tag);
        Ok(Self { flavor, tables })
    }

    /// Size of the uncompressed sfnt these tables reconstruct to.
    pub fn total_size(&self) -> usize {
        12 + 16 * self.tables.len()
            + self
                .tables
                .iter()
                .map(|t| t.data.len().next_multiple_of(4))
                .sum::<usize>()
    }
}

fn invalid(msg: &str) -> TranscodeError {
    TranscodeError::Font(format!("invalid font: {msg}"))
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}
