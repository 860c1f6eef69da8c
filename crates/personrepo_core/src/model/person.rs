//! Person entity.
//!
//! # Invariants
//! - When `address` is resolved, `address_id` equals the resolved id.
//! - The resolved `address` is authoritative on write; `address_id` is only
//!   authoritative when no address has been resolved.

use super::address::Address;
use super::{assign_identity, EntityId, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    id: Option<EntityId>,
    last_name: String,
    email: String,
    birth: Option<NaiveDate>,
    address_id: Option<EntityId>,
    /// Populated only when loaded with `LoadStrategy::Eager` or set by callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<Address>,
}

impl Person {
    /// Creates a transient person without identity or address.
    pub fn new(
        last_name: impl Into<String>,
        email: impl Into<String>,
        birth: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: None,
            last_name: last_name.into(),
            email: email.into(),
            birth,
            address_id: None,
            address: None,
        }
    }

    /// Returns the same person carrying a caller-chosen identity.
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    /// Assigns identity once; a different id afterwards is rejected.
    pub fn assign_id(&mut self, id: EntityId) -> Result<(), ValidationError> {
        assign_identity(&mut self.id, "Person", id)
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn set_last_name(&mut self, last_name: impl Into<String>) {
        self.last_name = last_name.into();
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn birth(&self) -> Option<NaiveDate> {
        self.birth
    }

    pub fn set_birth(&mut self, birth: Option<NaiveDate>) {
        self.birth = birth;
    }

    /// Foreign key to `tbl_address`, derived from `address` when resolved.
    pub fn address_id(&self) -> Option<EntityId> {
        self.address_id
    }

    /// Sets the foreign key directly (deferred style).
    ///
    /// A resolved address pointing elsewhere is dropped so both sides never
    /// disagree.
    pub fn set_address_id(&mut self, address_id: Option<EntityId>) {
        if self
            .address
            .as_ref()
            .is_some_and(|address| address.id() != address_id)
        {
            self.address = None;
        }
        self.address_id = address_id;
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// Resolves the relation; the foreign key follows the address identity.
    pub fn set_address(&mut self, address: Address) {
        self.address_id = address.id();
        self.address = Some(address);
    }

    pub fn clear_address(&mut self) {
        self.address = None;
        self.address_id = None;
    }

    /// Checks relation consistency before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(address) = &self.address {
            if address.id().is_none() {
                return Err(ValidationError::UnsavedRelation {
                    entity: "Person",
                    relation: "address",
                });
            }
        }
        Ok(())
    }
}
