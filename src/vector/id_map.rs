//! Position to chunk id mapping for a built index.

use crate::vector::types::{ChunkId, VectorError};

/// Chunk ids in index insertion order.
///
/// Entry `i` is the chunk whose vector sits at position `i` of the index
/// built from the same load. Both are replaced together on rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    ids: Vec<ChunkId>,
}

impl IdMapping {
    #[must_use]
    pub fn new(ids: Vec<ChunkId>) -> Self {
        Self { ids }
    }

    /// Resolves an index position to its chunk id.
    pub fn resolve(&self, position: usize) -> Result<ChunkId, VectorError> {
        self.ids
            .get(position)
            .copied()
            .ok_or(VectorError::PositionOutOfRange {
                position,
                len: self.ids.len(),
            })
    }

    /// Finds the position of a chunk id, if indexed.
    ///
    /// Linear scan; ids are only sorted when the source delivered them sorted.
    #[must_use]
    pub fn position_of(&self, id: ChunkId) -> Option<usize> {
        self.ids.iter().position(|candidate| *candidate == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.ids.iter().copied()
    }
}

impl From<Vec<ChunkId>> for IdMapping {
    fn from(ids: Vec<ChunkId>) -> Self {
        Self::new(ids)
    }
}
