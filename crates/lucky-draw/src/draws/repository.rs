use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    DrawRegistry, DrawStatus, PropertyId, Registration, RegistryId, UserId, WriteConflict,
};

/// Storage abstraction for draw registries.
///
/// Every mutating method is a conditional update: the adapter must evaluate the guard and apply
/// the write as one atomic unit, either under a registry-scoped lock or as a single conditional
/// statement in the backing store.
pub trait DrawRepository: Send + Sync {
    /// Persist a new registry unless its property already has an `active` draw
    /// (`Conflict(PropertyEnrolled)`).
    fn insert(&self, registry: DrawRegistry) -> Result<DrawRegistry, RepositoryError>;
    fn fetch(&self, id: &RegistryId) -> Result<Option<DrawRegistry>, RepositoryError>;
    /// Registries matching `status` (all when `None`), newest `created_at` first.
    fn list(&self, status: Option<DrawStatus>) -> Result<Vec<DrawRegistry>, RepositoryError>;
    /// Registries containing a registration by `user_id`, newest first.
    fn registered_by(&self, user_id: &UserId) -> Result<Vec<DrawRegistry>, RepositoryError>;
    /// Append via [`DrawRegistry::admit`].
    fn append_registration(
        &self,
        id: &RegistryId,
        registration: Registration,
    ) -> Result<DrawRegistry, RepositoryError>;
    /// Complete via [`DrawRegistry::seal_winner`]; `pool` is the registrant count the winner was
    /// drawn from (`Conflict(PoolChanged)` when it no longer matches).
    fn seal_winner(
        &self,
        id: &RegistryId,
        winner: &UserId,
        pool: usize,
        at: DateTime<Utc>,
    ) -> Result<DrawRegistry, RepositoryError>;
    fn cancel(&self, id: &RegistryId, at: DateTime<Utc>) -> Result<DrawRegistry, RepositoryError>;
    /// Hard delete; registrations go with the registry.
    fn remove(&self, id: &RegistryId) -> Result<DrawRegistry, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("conditional write rejected: {0}")]
    Conflict(#[from] WriteConflict),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Catalog projection of a property, enough to label draws and exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySummary {
    pub id: PropertyId,
    pub title: String,
    pub location: String,
    pub price: u64,
    #[serde(default)]
    pub images: Vec<String>,
    pub is_approved: bool,
}

/// Details for a property created together with its draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProperty {
    pub title: String,
    pub location: String,
    pub price: u64,
    pub beds: u8,
    pub baths: u8,
    pub sqft: u32,
    pub property_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub contact_phone: String,
}

/// Read side of the Property Catalog plus the one creation path draws need.
pub trait PropertyCatalog: Send + Sync {
    fn fetch(&self, id: &PropertyId) -> Result<Option<PropertySummary>, CatalogError>;
    fn approved(&self) -> Result<Vec<PropertySummary>, CatalogError>;
    /// Create an already-approved property.
    fn create(&self, property: NewProperty) -> Result<PropertySummary, CatalogError>;
    fn discard(&self, id: &PropertyId) -> Result<(), CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("property rejected: {0}")]
    Rejected(String),
    #[error("property catalog unavailable: {0}")]
    Unavailable(String),
}

/// Name and email of a registrant as known to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

/// Batch lookup of user records; unknown ids are simply absent from the result.
pub trait UserDirectory: Send + Sync {
    fn lookup(&self, ids: &[UserId]) -> Result<HashMap<UserId, UserProfile>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

/// Verified identity and role claim for the current request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Resolves bearer credentials into a [`Caller`]. Token formats and secrets stay behind it.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, bearer_token: &str) -> Result<Caller, IdentityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}
