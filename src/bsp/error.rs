// src/bsp/error.rs

use thiserror::Error;

use crate::bsp::bsp_node::LeafId;
use crate::bsp::model::{SegId, VertexId};

/// Fatal node builder failures. Recoverable map problems are collected in
/// [`crate::bsp::BuildReport`] instead.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid map data: {0}")]
    InvalidMapData(String),

    #[error("Nodes have already been built for this level")]
    AlreadyBuilt,

    #[error("Map has no usable lines; no tree was built")]
    EmptyTree,

    #[error("Partition {partition} left the {side} subset empty")]
    EmptySubset { side: &'static str, partition: SegId },

    #[error("{0} has no line-backed segments")]
    LeafWithoutLineSegments(LeafId),

    #[error("{0} has no sector")]
    LeafWithoutSector(LeafId),

    #[error("No edge tips recorded at {0}")]
    MissingEdgeTips(VertexId),

    #[error("{0} has a twin that is not filed anywhere")]
    OrphanSegment(SegId),

    #[error("Failed to parse build configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Failed to read build configuration: {0}")]
    Io(#[from] std::io::Error),
}
