//! roomcollide: room collision engine (object area grid, box/ellipse/pixel narrow phase)

pub mod types;
pub mod api;
pub mod error;
pub mod direction;
pub mod mask;
pub mod narrowphase;
pub mod entity;
pub mod filter;
pub mod grid;
pub mod room;

pub use crate::types::*;
pub use crate::api::*;
pub use crate::direction::{Direction, classify};
pub use crate::entity::Entity;
pub use crate::error::{ConfigError, MaskError};
pub use crate::filter::Filter;
pub use crate::grid::{Area, ObjectAreaGrid};
pub use crate::mask::{Mask, MaskCache, NoMasks, SpriteMasks};
pub use crate::narrowphase::Narrowphase;
pub use crate::room::Room;
