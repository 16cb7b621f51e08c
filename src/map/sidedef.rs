// src/map/sidedef.rs

use std::io::{self, Read};
use byteorder::{LE, ReadBytesExt};

use crate::map::sector::read_name8;

/// Size of one entry in a `SIDEDEFS` lump.
pub const SIDEDEF_LUMP_SIZE: usize = 30;

/// A sidedef in classic DOOM format (30 bytes total).
///
/// Layout (all little-endian):
///
/// ```text
/// offset  field       type / size
/// ------  ----------  ------------
///  0-1    x_offset    i16
///  2-3    y_offset    i16
///  4-11   upper_tex   [u8; 8]
/// 12-19   lower_tex   [u8; 8]
/// 20-27   mid_tex     [u8; 8]
/// 28-29   sector      i16  (index into sector list)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SideDef {
    pub x_offset: i32,
    pub y_offset: i32,
    pub upper_tex: String,
    pub lower_tex: String,
    pub mid_tex: String,

    /// Sector index for this sidedef. Negative means "no sector", which the
    /// node builder treats as void.
    pub sector: i32,
}

impl SideDef {
    /// A texture-less sidedef facing `sector`. Handy for building maps in code.
    pub fn facing(sector: i32) -> Self {
        SideDef {
            x_offset: 0,
            y_offset: 0,
            upper_tex: "-".to_string(),
            lower_tex: "-".to_string(),
            mid_tex: "-".to_string(),
            sector,
        }
    }

    pub fn from_wad<R: Read>(reader: &mut R) -> io::Result<Self> {
        let x_offset = reader.read_i16::<LE>()? as i32;
        let y_offset = reader.read_i16::<LE>()? as i32;
        let upper_tex = read_name8(reader)?;
        let lower_tex = read_name8(reader)?;
        let mid_tex = read_name8(reader)?;
        let sector = reader.read_i16::<LE>()? as i32;

        Ok(SideDef {
            x_offset,
            y_offset,
            upper_tex,
            lower_tex,
            mid_tex,
            sector,
        })
    }
}
