// src/map/mod.rs
pub mod vertex;
pub mod linedef;
pub mod sidedef;
pub mod sector;

pub use vertex::Vertex;
pub use linedef::LineDef;
pub use sidedef::SideDef;
pub use sector::Sector;
