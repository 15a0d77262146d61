use std::fmt;

use crate::entity::Entity;
use crate::types::{ClassId, EntityId};

/// Which other entities a collision query is interested in.
#[derive(Copy, Clone, Default)]
pub enum Filter<'a> {
    /// Every tangible entity.
    #[default]
    Any,
    /// One specific entity.
    Entity(EntityId),
    /// Any entity of a list.
    Entities(&'a [EntityId]),
    /// Entities tagged with a class.
    Class(ClassId),
    /// Caller predicate.
    Predicate(&'a dyn Fn(EntityId, &Entity) -> bool),
}

impl Filter<'_> {
    pub fn matches(&self, id: EntityId, entity: &Entity) -> bool {
        match *self {
            Filter::Any => true,
            Filter::Entity(want) => id == want,
            Filter::Entities(list) => list.contains(&id),
            Filter::Class(class) => entity.class == Some(class),
            Filter::Predicate(pred) => pred(id, entity),
        }
    }
}

impl fmt::Debug for Filter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Any => f.write_str("Any"),
            Filter::Entity(id) => f.debug_tuple("Entity").field(id).finish(),
            Filter::Entities(list) => f.debug_tuple("Entities").field(list).finish(),
            Filter::Class(class) => f.debug_tuple("Class").field(class).finish(),
            Filter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
