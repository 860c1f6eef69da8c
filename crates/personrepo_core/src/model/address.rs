//! Address entity.

use super::{assign_identity, EntityId, ValidationError};
use serde::{Deserialize, Serialize};

/// Postal address referenced by zero or more persons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    id: Option<EntityId>,
    province: String,
    city: String,
}

impl Address {
    /// Creates a transient address without identity.
    pub fn new(province: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            id: None,
            province: province.into(),
            city: city.into(),
        }
    }

    /// Returns the same address carrying a caller-chosen identity.
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    /// Assigns identity once; a different id afterwards is rejected.
    pub fn assign_id(&mut self, id: EntityId) -> Result<(), ValidationError> {
        assign_identity(&mut self.id, "Address", id)
    }

    pub fn province(&self) -> &str {
        &self.province
    }

    pub fn set_province(&mut self, province: impl Into<String>) {
        self.province = province.into();
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn set_city(&mut self, city: impl Into<String>) {
        self.city = city.into();
    }

    /// Addresses carry no relations; any field values are storable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
