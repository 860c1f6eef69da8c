//! Entity model for persons and their addresses.
//!
//! # Responsibility
//! - Define the plain records persisted by the repository layer.
//! - Keep relation consistency rules next to the data they protect.
//!
//! # Invariants
//! - Identity is `None` until storage (or a merge-insert) assigns it.
//! - Once assigned, identity never changes.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod address;
pub mod person;

/// Surrogate primary key shared by all entities.
pub type EntityId = i64;

/// Model-level invariant violations detected before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An entity already carrying identity was given a different one.
    IdentityReassigned {
        entity: &'static str,
        current: EntityId,
        requested: EntityId,
    },
    /// A resolved relation has not been persisted yet.
    UnsavedRelation {
        entity: &'static str,
        relation: &'static str,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdentityReassigned {
                entity,
                current,
                requested,
            } => write!(
                f,
                "{entity} identity is already {current}; refusing to reassign to {requested}"
            ),
            Self::UnsavedRelation { entity, relation } => write!(
                f,
                "{entity}.{relation} references an entity without identity; save it first"
            ),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn assign_identity(
    slot: &mut Option<EntityId>,
    entity: &'static str,
    id: EntityId,
) -> Result<(), ValidationError> {
    match *slot {
        Some(current) if current != id => Err(ValidationError::IdentityReassigned {
            entity,
            current,
            requested: id,
        }),
        _ => {
            *slot = Some(id);
            Ok(())
        }
    }
}
