// src/map/sector.rs

use std::io::{self, Read};
use byteorder::{LE, ReadBytesExt};

/// Size of one entry in a `SECTORS` lump.
pub const SECTOR_LUMP_SIZE: usize = 26;

/// A sector in classic DOOM format (26 bytes).
///
/// Layout (all little-endian):
///
/// ```text
/// offset  field          type / size
/// ------  -------------  ------------
///  0-1    floor_height   i16
///  2-3    ceiling_height i16
///  4-11   floor_tex      [u8; 8]
/// 12-19   ceiling_tex    [u8; 8]
/// 20-21   light_level    i16
/// 22-23   special_type   i16
/// 24-25   tag            i16
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    pub floor_height: i32,
    pub ceiling_height: i32,
    pub floor_tex: String,
    pub ceiling_tex: String,
    pub light: i32,
    pub special: i32,
    pub tag: i32,
}

impl Sector {
    pub fn new(floor_height: i32, ceiling_height: i32, floor_tex: &str, ceiling_tex: &str, light: i32) -> Self {
        Sector {
            floor_height,
            ceiling_height,
            floor_tex: floor_tex.to_uppercase(),
            ceiling_tex: ceiling_tex.to_uppercase(),
            light,
            special: 0,
            tag: 0,
        }
    }

    pub fn from_wad<R: Read>(reader: &mut R) -> io::Result<Self> {
        let floor_height = reader.read_i16::<LE>()? as i32;
        let ceiling_height = reader.read_i16::<LE>()? as i32;
        let floor_tex = read_name8(reader)?;
        let ceiling_tex = read_name8(reader)?;
        let light = reader.read_i16::<LE>()? as i32;
        let special = reader.read_i16::<LE>()? as i32;
        let tag = reader.read_i16::<LE>()? as i32;

        Ok(Sector {
            floor_height,
            ceiling_height,
            floor_tex,
            ceiling_tex,
            light,
            special,
            tag,
        })
    }
}

/// Reads an 8-byte texture/flat name, trimming trailing `\0` and spaces and
/// uppercasing it.
pub(crate) fn read_name8<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;

    let raw = buf
        .iter()
        .map(|&c| c as char)
        .collect::<String>()
        .to_uppercase();

    let trimmed = raw.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
    Ok(trimmed.to_string())
}
