// src/map/vertex.rs
use std::io::{self, Read};
use byteorder::{LE, ReadBytesExt};

/// Size of one entry in a `VERTEXES` lump.
pub const VERTEX_LUMP_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub raw_x: i32,
    pub raw_y: i32,
}

impl Vertex {
    pub fn new(raw_x: i32, raw_y: i32) -> Self {
        Vertex { raw_x, raw_y }
    }

    pub fn from_wad<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Vertex {
            raw_x: reader.read_i16::<LE>()? as i32,
            raw_y: reader.read_i16::<LE>()? as i32,
        })
    }

    /// Map coordinates as used by the node builder.
    pub fn coords(&self) -> (f64, f64) {
        (self.raw_x as f64, self.raw_y as f64)
    }
}
