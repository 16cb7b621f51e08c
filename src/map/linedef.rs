// src/map/linedef.rs
use std::io::{self, Read};
use byteorder::{LE, ReadBytesExt};

/// Size of one entry in a classic `LINEDEFS` lump.
pub const LINEDEF_LUMP_SIZE: usize = 14;

/// Sidedef slot value meaning "no sidedef".
pub const NO_SIDEDEF: i32 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct LineDef {
    pub start: usize,
    pub end: usize,
    pub flags: i32,
    pub line_type: i32,
    pub tag: i32,
    /// Front (right) sidedef index, or `NO_SIDEDEF`.
    pub right: i32,
    /// Back (left) sidedef index, or `NO_SIDEDEF`.
    pub left: i32,
}

impl LineDef {
    pub fn from_wad<R: Read>(reader: &mut R) -> io::Result<Self> {
        let start = reader.read_u16::<LE>()? as usize;
        let end = reader.read_u16::<LE>()? as usize;
        let flags = reader.read_i16::<LE>()? as i32;
        let line_type = reader.read_i16::<LE>()? as i32;
        let tag = reader.read_i16::<LE>()? as i32;
        // 0xFFFF marks an absent side in the lump.
        let right = side_index(reader.read_u16::<LE>()?);
        let left = side_index(reader.read_u16::<LE>()?);
        Ok(LineDef { start, end, flags, line_type, tag, right, left })
    }

    pub fn has_right(&self) -> bool {
        self.right >= 0
    }

    pub fn has_left(&self) -> bool {
        self.left >= 0
    }
}

fn side_index(raw: u16) -> i32 {
    if raw == u16::MAX {
        NO_SIDEDEF
    } else {
        raw as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_linedef_missing_left_side() {
        let mut data = Vec::new();
        for word in [0u16, 1, 0, 0, 0, 3, 0xFFFF] {
            data.extend_from_slice(&word.to_le_bytes());
        }
        let line = LineDef::from_wad(&mut Cursor::new(data)).unwrap();
        assert_eq!(line.start, 0);
        assert_eq!(line.end, 1);
        assert_eq!(line.right, 3);
        assert_eq!(line.left, NO_SIDEDEF);
        assert!(line.has_right());
        assert!(!line.has_left());
    }
}
