use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Inclusive frame range of one task, plus the chunk size the coordinator
/// used when it split the layer into tasks.
///
/// The agent does not split ranges further: one assignment is one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRange {
    pub start: i64,
    pub end: i64,
    #[serde(default = "default_chunk")]
    pub chunk_size: u32,
}

fn default_chunk() -> u32 {
    1
}

impl FrameRange {
    pub fn new(start: i64, end: i64, chunk_size: u32) -> Self {
        Self {
            start,
            end,
            chunk_size,
        }
    }

    /// A range covering exactly one frame.
    pub fn single(frame: i64) -> Self {
        Self::new(frame, frame, 1)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.start > self.end {
            return Err(ModelError::InvalidFrameRange {
                start: self.start,
                end: self.end,
            });
        }
        if self.chunk_size == 0 {
            return Err(ModelError::ZeroChunk);
        }
        Ok(())
    }

    /// Number of frames covered by the range.
    pub fn frame_count(&self) -> u64 {
        (self.end - self.start).unsigned_abs() + 1
    }

    /// Number of chunk-sized render invocations the range represents.
    pub fn chunk_count(&self) -> u64 {
        let chunk = u64::from(self.chunk_size.max(1));
        self.frame_count().div_ceil(chunk)
    }
}
