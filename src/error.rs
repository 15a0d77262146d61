use thiserror::Error;

use crate::types::SpriteKey;

/// Rejected room or object area configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("room size must be positive and finite, got {width}x{height}")]
    RoomSize { width: f32, height: f32 },

    #[error("object area size must be positive and finite, got {width}x{height}")]
    CellSize { width: f32, height: f32 },
}

/// Why a precise mask could not be produced. Recovered by falling back to
/// the bounding box.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaskError {
    #[error("entity has no visual frame")]
    NoVisualFrame,

    #[error("no opacity mask for sprite {sprite:?} frame {frame}")]
    FrameUnavailable { sprite: SpriteKey, frame: u32 },

    #[error("mask for sprite {sprite:?} frame {frame} is {got:?}, frame is {expected:?}")]
    SizeMismatch {
        sprite: SpriteKey,
        frame: u32,
        got: (u32, u32),
        expected: (u32, u32),
    },
}

pub(crate) fn validate_sizes(
    room_width: f32,
    room_height: f32,
    cell_width: f32,
    cell_height: f32,
) -> Result<(), ConfigError> {
    let positive = |v: f32| v.is_finite() && v > 0.0;
    if !(positive(room_width) && positive(room_height)) {
        return Err(ConfigError::RoomSize {
            width: room_width,
            height: room_height,
        });
    }
    if !(positive(cell_width) && positive(cell_height)) {
        return Err(ConfigError::CellSize {
            width: cell_width,
            height: cell_height,
        });
    }
    Ok(())
}
