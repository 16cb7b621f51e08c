// src/document/document.rs

use crate::map::{LineDef, Sector, SideDef, Vertex};
use crate::map::linedef::LINEDEF_LUMP_SIZE;
use crate::map::sector::SECTOR_LUMP_SIZE;
use crate::map::sidedef::SIDEDEF_LUMP_SIZE;
use crate::map::vertex::VERTEX_LUMP_SIZE;
use byteorder::{LE, ReadBytesExt};
use log::{info, warn};
use parking_lot::RwLock;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::str;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub enum ObjType {
    Linedefs,
    Sidedefs,
    Vertices,
    Sectors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// A single lump entry from the WAD directory.
#[derive(Debug, Clone)]
pub struct LumpEntry {
    pub offset: i32,
    pub size: i32,
    pub name: String,
}

/// A grouping of lumps that form a level.
#[derive(Debug, Clone)]
pub struct LevelInfo {
    pub name: String,
    pub lump_indices: Vec<usize>,
}

/// The map description handed to the node builder.
///
/// Geometry lists sit behind `RwLock`s so a loaded document can be shared
/// (as `Arc<Document>`) between the loader and any number of builds.
#[derive(Default)]
pub struct Document {
    pub vertices: Arc<RwLock<Vec<Arc<Vertex>>>>,
    pub sectors: Arc<RwLock<Vec<Arc<Sector>>>>,
    pub sidedefs: Arc<RwLock<Vec<Arc<SideDef>>>>,
    pub linedefs: Arc<RwLock<Vec<Arc<LineDef>>>>,

    pub directory: Arc<RwLock<Vec<LumpEntry>>>,
    pub levels: Arc<RwLock<Vec<LevelInfo>>>,
    pub selected_level: Arc<RwLock<Option<String>>>,
    wad_data: Arc<RwLock<Option<Vec<u8>>>>,
}

const FILELUMP_SIZE: usize = 16; // 4 bytes (filepos) + 4 bytes (size) + 8 bytes (name)

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertices(&self) -> Arc<RwLock<Vec<Arc<Vertex>>>> {
        Arc::clone(&self.vertices)
    }
    pub fn linedefs(&self) -> Arc<RwLock<Vec<Arc<LineDef>>>> {
        Arc::clone(&self.linedefs)
    }
    pub fn sectors(&self) -> Arc<RwLock<Vec<Arc<Sector>>>> {
        Arc::clone(&self.sectors)
    }
    pub fn sidedefs(&self) -> Arc<RwLock<Vec<Arc<SideDef>>>> {
        Arc::clone(&self.sidedefs)
    }

    pub fn num_objects(&self, obj_type: ObjType) -> usize {
        match obj_type {
            ObjType::Linedefs => self.linedefs.read().len(),
            ObjType::Sidedefs => self.sidedefs.read().len(),
            ObjType::Vertices => self.vertices.read().len(),
            ObjType::Sectors => self.sectors.read().len(),
        }
    }

    // --- Construction helpers ---

    /// Adds a vertex and returns its index.
    pub fn add_vertex(&mut self, x: i32, y: i32) -> usize {
        let mut vertices = self.vertices.write();
        vertices.push(Arc::new(Vertex::new(x, y)));
        vertices.len() - 1
    }

    /// Adds a sector with editor defaults and returns its index.
    pub fn add_sector(&mut self, floor_z: i32, ceiling_z: i32) -> usize {
        let mut sectors = self.sectors.write();
        sectors.push(Arc::new(Sector::new(floor_z, ceiling_z, "FLOOR4_8", "CEIL3_5", 160)));
        sectors.len() - 1
    }

    /// Adds a sidedef facing `sector` and returns its index.
    pub fn add_sidedef(&mut self, sector: usize) -> usize {
        let mut sidedefs = self.sidedefs.write();
        sidedefs.push(Arc::new(SideDef::facing(sector as i32)));
        sidedefs.len() - 1
    }

    /// Adds a linedef from `start` to `end`. The right (front) side faces
    /// `right_sector`; a left side is only created when `left_sector` is given.
    pub fn add_linedef(&mut self, start: usize, end: usize, right_sector: Option<usize>, left_sector: Option<usize>) -> usize {
        let right = right_sector.map_or(-1, |s| self.add_sidedef(s) as i32);
        let left = left_sector.map_or(-1, |s| self.add_sidedef(s) as i32);
        let mut linedefs = self.linedefs.write();
        linedefs.push(Arc::new(LineDef {
            start,
            end,
            flags: 0,
            line_type: 0,
            tag: 0,
            right,
            left,
        }));
        linedefs.len() - 1
    }

    /// Returns true if the linedef has zero length.
    pub fn is_zero_length(&self, line: &LineDef) -> bool {
        let vertices = self.vertices.read();
        match (vertices.get(line.start), vertices.get(line.end)) {
            (Some(a), Some(b)) => a.raw_x == b.raw_x && a.raw_y == b.raw_y,
            _ => false,
        }
    }

    /// Returns true if both sides of the linedef reference the same sector.
    pub fn is_self_ref(&self, line: &LineDef) -> bool {
        match (self.sector_of_side(line, Side::Right), self.sector_of_side(line, Side::Left)) {
            (Some(right), Some(left)) => right == left,
            _ => false,
        }
    }

    /// Sector index faced by the given side of the linedef, if any.
    pub fn sector_of_side(&self, line: &LineDef, side: Side) -> Option<usize> {
        let sidedef = match side {
            Side::Right => line.right,
            Side::Left => line.left,
        };
        if sidedef < 0 {
            return None;
        }
        let sidedefs = self.sidedefs.read();
        let sd = sidedefs.get(sidedef as usize)?;
        if sd.sector < 0 || sd.sector as usize >= self.sectors.read().len() {
            return None;
        }
        Some(sd.sector as usize)
    }

    /// Clears all geometry (but not directory/level data).
    pub fn clear_geometry(&mut self) {
        self.vertices.write().clear();
        self.sectors.write().clear();
        self.sidedefs.write().clear();
        self.linedefs.write().clear();
    }

    // --- WAD loading and level selection ---

    /// Loads a WAD from `reader`, indexes its levels and loads the first one.
    pub fn load_wad<R: Read + Seek>(&mut self, reader: &mut R) -> io::Result<()> {
        self.clear_geometry();

        let total_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let mut full_data = Vec::with_capacity(total_size as usize);
        reader.read_to_end(&mut full_data)?;
        let mut cursor = Cursor::new(full_data.as_slice());

        let mut header_buf = [0u8; 12];
        cursor.read_exact(&mut header_buf)?;
        let ident = &header_buf[0..4];
        if ident != b"IWAD" && ident != b"PWAD" {
            return Err(io::Error::new(io::ErrorKind::InvalidData,
                format!("Invalid WAD identifier: {}", String::from_utf8_lossy(ident))));
        }
        let num_lumps = (&header_buf[4..8]).read_i32::<LE>()?;
        let infotableofs = (&header_buf[8..12]).read_i32::<LE>()?;
        if num_lumps < 0 || infotableofs < 0 || (infotableofs as u64) > total_size {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Directory offset exceeds total file size"));
        }

        let dir_size = (num_lumps as usize) * FILELUMP_SIZE;
        cursor.seek(SeekFrom::Start(infotableofs as u64))?;
        let mut dir_buf = vec![0u8; dir_size];
        cursor.read_exact(&mut dir_buf)?;

        let mut directory = Vec::with_capacity(num_lumps as usize);
        for entry in dir_buf.chunks_exact(FILELUMP_SIZE) {
            let lump_offset = (&entry[0..4]).read_i32::<LE>()?;
            let lump_size = (&entry[4..8]).read_i32::<LE>()?;
            let lump_name = str::from_utf8(&entry[8..16]).unwrap_or("").trim_end_matches('\0').trim_end().to_string();
            if lump_offset < 0 || lump_size < 0 ||
               (lump_offset as u64) + (lump_size as u64) > total_size {
                warn!("Lump '{}' has invalid offset/size ({}+{} > {})", lump_name, lump_offset, lump_size, total_size);
                continue;
            }
            directory.push(LumpEntry { offset: lump_offset, size: lump_size, name: lump_name });
        }
        *self.levels.write() = Self::group_levels(&directory);
        *self.directory.write() = directory;
        *self.wad_data.write() = Some(full_data);

        let first_level_name = self.levels.read().first().map(|lvl| lvl.name.clone());
        if let Some(level_name) = first_level_name {
            self.select_level(&level_name)?;
        }
        Ok(())
    }

    /// Groups lumps from the directory into levels based on markers (e.g. "MAP01" or "E1M1").
    fn group_levels(directory: &[LumpEntry]) -> Vec<LevelInfo> {
        let mut levels = Vec::new();
        let mut current_level: Option<LevelInfo> = None;
        for (i, entry) in directory.iter().enumerate() {
            if Self::is_level_marker(&entry.name) {
                if let Some(lvl) = current_level.take() {
                    levels.push(lvl);
                }
                current_level = Some(LevelInfo {
                    name: entry.name.clone(),
                    lump_indices: vec![i],
                });
            } else if let Some(ref mut lvl) = current_level {
                lvl.lump_indices.push(i);
            }
        }
        if let Some(lvl) = current_level {
            levels.push(lvl);
        }
        levels
    }

    fn is_level_marker(name: &str) -> bool {
        let upper = name.trim().to_uppercase();
        let bytes = upper.as_bytes();
        if upper.starts_with("MAP") && bytes.len() >= 5 {
            bytes[3..5].iter().all(|c| c.is_ascii_digit())
        } else if bytes.len() == 4 && bytes[0] == b'E' && bytes[2] == b'M' {
            bytes[1].is_ascii_digit() && bytes[3].is_ascii_digit()
        } else {
            false
        }
    }

    /// Loads the geometry of a level (by its marker, e.g. "MAP01") from the
    /// WAD previously passed to [`Document::load_wad`].
    pub fn select_level(&mut self, level_name: &str) -> io::Result<()> {
        let data = self.wad_data.read().clone().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "No WAD loaded")
        })?;
        self.load_level(level_name, &mut Cursor::new(data))
    }

    /// Loads the geometry for a level from `reader`, using the directory
    /// indexed by the last [`Document::load_wad`].
    pub fn load_level<R: Read + Seek>(&mut self, level_name: &str, reader: &mut R) -> io::Result<()> {
        self.clear_geometry();
        let level_info = self.levels.read().iter()
            .find(|lvl| lvl.name.eq_ignore_ascii_case(level_name))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("Level {} not found", level_name)))?;

        let directory = self.directory.read().clone();
        for &index in &level_info.lump_indices {
            let entry = &directory[index];
            match entry.name.as_str() {
                "VERTEXES" => load_lump(reader, entry, VERTEX_LUMP_SIZE, &*self.vertices, Vertex::from_wad)?,
                "SECTORS" => load_lump(reader, entry, SECTOR_LUMP_SIZE, &*self.sectors, Sector::from_wad)?,
                "SIDEDEFS" => load_lump(reader, entry, SIDEDEF_LUMP_SIZE, &*self.sidedefs, SideDef::from_wad)?,
                "LINEDEFS" => load_lump(reader, entry, LINEDEF_LUMP_SIZE, &*self.linedefs, LineDef::from_wad)?,
                _ => { /* Ignore other lumps, including the level marker itself */ }
            }
        }
        info!("Loaded level {} ({} vertices, {} linedefs, {} sectors)",
            level_info.name,
            self.num_objects(ObjType::Vertices),
            self.num_objects(ObjType::Linedefs),
            self.num_objects(ObjType::Sectors));
        *self.selected_level.write() = Some(level_info.name);
        Ok(())
    }

    /// Returns a list of available level markers.
    pub fn available_levels(&self) -> Vec<String> {
        self.levels.read().iter().map(|lvl| lvl.name.clone()).collect()
    }
}

fn load_lump<R, T, F>(reader: &mut R, entry: &LumpEntry, record_size: usize, target: &RwLock<Vec<Arc<T>>>, read: F) -> io::Result<()>
where
    R: Read + Seek,
    F: Fn(&mut R) -> io::Result<T>,
{
    reader.seek(SeekFrom::Start(entry.offset as u64))?;
    let count = entry.size as usize / record_size;
    let mut records = target.write();
    records.clear();
    records.reserve(count);
    for _ in 0..count {
        records.push(Arc::new(read(reader)?));
    }
    Ok(())
}
