//! Mutex-backed collaborators used by the API service, the CLI demo and the tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    DrawRegistry, DrawStatus, PropertyId, Registration, RegistryId, UserId, WriteConflict,
};
use super::repository::{
    Caller, CatalogError, DirectoryError, DrawRepository, IdentityError, IdentityProvider,
    NewProperty, PropertyCatalog, PropertySummary, RepositoryError, UserDirectory, UserProfile,
};

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, String> {
    mutex.lock().map_err(|_| format!("{what} mutex poisoned"))
}

/// Registries keyed by id. One store-wide lock covers every check-then-write.
#[derive(Default, Clone)]
pub struct InMemoryDrawRepository {
    records: Arc<Mutex<HashMap<RegistryId, DrawRegistry>>>,
}

impl InMemoryDrawRepository {
    fn guard(&self) -> Result<MutexGuard<'_, HashMap<RegistryId, DrawRegistry>>, RepositoryError> {
        lock(&self.records, "repository").map_err(RepositoryError::Unavailable)
    }

    fn mutate<F>(&self, id: &RegistryId, apply: F) -> Result<DrawRegistry, RepositoryError>
    where
        F: FnOnce(&mut DrawRegistry) -> Result<(), WriteConflict>,
    {
        let mut guard = self.guard()?;
        let registry = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        apply(registry)?;
        Ok(registry.clone())
    }
}

fn newest_first(mut registries: Vec<DrawRegistry>) -> Vec<DrawRegistry> {
    registries.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
    registries
}

impl DrawRepository for InMemoryDrawRepository {
    fn insert(&self, registry: DrawRegistry) -> Result<DrawRegistry, RepositoryError> {
        let mut guard = self.guard()?;
        if guard.contains_key(registry.id()) {
            return Err(RepositoryError::Unavailable(format!(
                "registry id {} already stored",
                registry.id()
            )));
        }
        let enrolled = guard.values().any(|existing| {
            existing.property_id() == registry.property_id()
                && existing.status() == DrawStatus::Active
        });
        if enrolled {
            return Err(WriteConflict::PropertyEnrolled.into());
        }
        guard.insert(registry.id().clone(), registry.clone());
        Ok(registry)
    }

    fn fetch(&self, id: &RegistryId) -> Result<Option<DrawRegistry>, RepositoryError> {
        Ok(self.guard()?.get(id).cloned())
    }

    fn list(&self, status: Option<DrawStatus>) -> Result<Vec<DrawRegistry>, RepositoryError> {
        let guard = self.guard()?;
        let matching = guard
            .values()
            .filter(|registry| status.map_or(true, |wanted| registry.status() == wanted))
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    fn registered_by(&self, user_id: &UserId) -> Result<Vec<DrawRegistry>, RepositoryError> {
        let guard = self.guard()?;
        let matching = guard
            .values()
            .filter(|registry| registry.is_registered(user_id))
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    fn append_registration(
        &self,
        id: &RegistryId,
        registration: Registration,
    ) -> Result<DrawRegistry, RepositoryError> {
        self.mutate(id, |registry| registry.admit(registration))
    }

    fn seal_winner(
        &self,
        id: &RegistryId,
        winner: &UserId,
        pool: usize,
        at: DateTime<Utc>,
    ) -> Result<DrawRegistry, RepositoryError> {
        self.mutate(id, |registry| registry.seal_winner(winner, pool, at).map(|_| ()))
    }

    fn cancel(&self, id: &RegistryId, at: DateTime<Utc>) -> Result<DrawRegistry, RepositoryError> {
        self.mutate(id, |registry| registry.cancel(at))
    }

    fn remove(&self, id: &RegistryId) -> Result<DrawRegistry, RepositoryError> {
        self.guard()?.remove(id).ok_or(RepositoryError::NotFound)
    }
}

static PROPERTY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_property_id() -> PropertyId {
    let id = PROPERTY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PropertyId(format!("prop-{id:06}"))
}

#[derive(Default, Clone)]
pub struct InMemoryPropertyCatalog {
    properties: Arc<Mutex<HashMap<PropertyId, PropertySummary>>>,
}

impl InMemoryPropertyCatalog {
    /// Load an existing listing, e.g. one approved through the regular workflow.
    pub fn seed(&self, property: PropertySummary) -> Result<(), CatalogError> {
        let mut guard = lock(&self.properties, "catalog").map_err(CatalogError::Unavailable)?;
        guard.insert(property.id.clone(), property);
        Ok(())
    }
}

impl PropertyCatalog for InMemoryPropertyCatalog {
    fn fetch(&self, id: &PropertyId) -> Result<Option<PropertySummary>, CatalogError> {
        let guard = lock(&self.properties, "catalog").map_err(CatalogError::Unavailable)?;
        Ok(guard.get(id).cloned())
    }

    fn approved(&self) -> Result<Vec<PropertySummary>, CatalogError> {
        let guard = lock(&self.properties, "catalog").map_err(CatalogError::Unavailable)?;
        let mut approved: Vec<_> = guard
            .values()
            .filter(|property| property.is_approved)
            .cloned()
            .collect();
        approved.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(approved)
    }

    fn create(&self, property: NewProperty) -> Result<PropertySummary, CatalogError> {
        if property.title.trim().is_empty() || property.location.trim().is_empty() {
            return Err(CatalogError::Rejected(
                "title and location are required".to_string(),
            ));
        }
        if property.images.is_empty() {
            return Err(CatalogError::Rejected(
                "at least one image is required".to_string(),
            ));
        }

        let summary = PropertySummary {
            id: next_property_id(),
            title: property.title,
            location: property.location,
            price: property.price,
            images: property.images,
            is_approved: true,
        };
        let mut guard = lock(&self.properties, "catalog").map_err(CatalogError::Unavailable)?;
        guard.insert(summary.id.clone(), summary.clone());
        Ok(summary)
    }

    fn discard(&self, id: &PropertyId) -> Result<(), CatalogError> {
        let mut guard = lock(&self.properties, "catalog").map_err(CatalogError::Unavailable)?;
        guard.remove(id);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<Mutex<HashMap<UserId, UserProfile>>>,
}

impl InMemoryUserDirectory {
    pub fn upsert(&self, profile: UserProfile) -> Result<(), DirectoryError> {
        let mut guard = lock(&self.users, "directory").map_err(DirectoryError::Unavailable)?;
        guard.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    /// Drop a user account; draws keep referencing the id.
    pub fn forget(&self, user_id: &UserId) -> Result<(), DirectoryError> {
        let mut guard = lock(&self.users, "directory").map_err(DirectoryError::Unavailable)?;
        guard.remove(user_id);
        Ok(())
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn lookup(&self, ids: &[UserId]) -> Result<HashMap<UserId, UserProfile>, DirectoryError> {
        let guard = lock(&self.users, "directory").map_err(DirectoryError::Unavailable)?;
        Ok(ids
            .iter()
            .filter_map(|id| guard.get(id).map(|profile| (id.clone(), profile.clone())))
            .collect())
    }
}

/// Bearer tokens issued elsewhere, mapped to the identity they were issued for.
#[derive(Default, Clone)]
pub struct StaticTokenIdentity {
    tokens: Arc<Mutex<HashMap<String, Caller>>>,
}

impl StaticTokenIdentity {
    pub fn grant(&self, token: impl Into<String>, caller: Caller) -> Result<(), IdentityError> {
        let mut guard = lock(&self.tokens, "identity").map_err(IdentityError::Unavailable)?;
        guard.insert(token.into(), caller);
        Ok(())
    }
}

impl IdentityProvider for StaticTokenIdentity {
    fn authenticate(&self, bearer_token: &str) -> Result<Caller, IdentityError> {
        let guard = lock(&self.tokens, "identity").map_err(IdentityError::Unavailable)?;
        guard
            .get(bearer_token)
            .cloned()
            .ok_or(IdentityError::InvalidToken)
    }
}
