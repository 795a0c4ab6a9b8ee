use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{DrawRegistry, DrawStatus, PropertyId, RegistryId, UserId};
use super::lifecycle::DrawPhase;
use super::repository::{PropertySummary, UserProfile};

/// Shown in place of a registrant's name once their account no longer resolves.
pub const UNRESOLVED_NAME: &str = "Unknown user";
pub const UNRESOLVED_EMAIL: &str = "";

#[derive(Debug, Clone, Serialize)]
pub struct PropertyCard {
    pub property_id: PropertyId,
    pub title: String,
    pub location: String,
    pub price: u64,
    pub images: Vec<String>,
}

impl From<&PropertySummary> for PropertyCard {
    fn from(property: &PropertySummary) -> Self {
        Self {
            property_id: property.id.clone(),
            title: property.title.clone(),
            location: property.location.clone(),
            price: property.price,
            images: property.images.clone(),
        }
    }
}

/// Listing entry for public and admin catalogs of draws.
#[derive(Debug, Clone, Serialize)]
pub struct DrawSummary {
    pub registry_id: RegistryId,
    pub property_id: PropertyId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<PropertyCard>,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub phase: DrawPhase,
    pub status: DrawStatus,
    pub registrant_count: usize,
    pub created_at: DateTime<Utc>,
}

impl DrawSummary {
    pub fn new(
        registry: &DrawRegistry,
        property: Option<&PropertySummary>,
        now: DateTime<Utc>,
    ) -> Self {
        let window = registry.window();
        Self {
            registry_id: registry.id().clone(),
            property_id: registry.property_id().clone(),
            property: property.map(PropertyCard::from),
            opens_at: window.opens_at(),
            closes_at: window.closes_at(),
            phase: registry.phase(now),
            status: registry.status(),
            registrant_count: registry.registrants().len(),
            created_at: registry.created_at(),
        }
    }
}

/// What anyone may see about a draw: window, counts, outcome flag.
#[derive(Debug, Clone, Serialize)]
pub struct PublicDrawView {
    #[serde(flatten)]
    pub summary: DrawSummary,
    pub has_winner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_user_registered: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrantView {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub contact_phone: String,
    pub registered_at: DateTime<Utc>,
    pub is_winner: bool,
}

/// Administrator view including every registrant with resolved contact details.
#[derive(Debug, Clone, Serialize)]
pub struct AdminDrawView {
    #[serde(flatten)]
    pub summary: DrawSummary,
    pub winner_user_id: Option<UserId>,
    pub updated_at: DateTime<Utc>,
    pub registrants: Vec<RegistrantView>,
}

impl AdminDrawView {
    pub fn new(
        registry: &DrawRegistry,
        property: Option<&PropertySummary>,
        profiles: &HashMap<UserId, UserProfile>,
        now: DateTime<Utc>,
    ) -> Self {
        let registrants = registry
            .registrants()
            .iter()
            .map(|registration| {
                let (name, email) = resolve(profiles, &registration.user_id);
                RegistrantView {
                    user_id: registration.user_id.clone(),
                    name,
                    email,
                    contact_phone: registration.contact_phone.clone(),
                    registered_at: registration.registered_at,
                    is_winner: registration.is_winner,
                }
            })
            .collect();

        Self {
            summary: DrawSummary::new(registry, property, now),
            winner_user_id: registry.winner_user_id().cloned(),
            updated_at: registry.updated_at(),
            registrants,
        }
    }
}

pub(crate) fn resolve(
    profiles: &HashMap<UserId, UserProfile>,
    user_id: &UserId,
) -> (String, String) {
    match profiles.get(user_id) {
        Some(profile) => (profile.name.clone(), profile.email.clone()),
        None => (UNRESOLVED_NAME.to_string(), UNRESOLVED_EMAIL.to_string()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentReceipt {
    pub registry_id: RegistryId,
    pub property: PropertyCard,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

impl EnrollmentReceipt {
    pub fn new(registry: &DrawRegistry, property: &PropertySummary) -> Self {
        let window = registry.window();
        Self {
            registry_id: registry.id().clone(),
            property: PropertyCard::from(property),
            opens_at: window.opens_at(),
            closes_at: window.closes_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationReceipt {
    pub registry_id: RegistryId,
    pub user_id: UserId,
    pub registered_at: DateTime<Utc>,
    pub registrant_count: usize,
}

/// One draw from the point of view of a registrant.
#[derive(Debug, Clone, Serialize)]
pub struct UserRegistrationView {
    pub registry_id: RegistryId,
    pub property_id: PropertyId,
    pub property_title: Option<String>,
    pub closes_at: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
    pub status: DrawStatus,
    pub is_winner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WinnerAnnouncement {
    pub registry_id: RegistryId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub contact_phone: String,
    pub registrant_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovalReceipt {
    pub registry_id: RegistryId,
    pub property_id: PropertyId,
    pub registrants_removed: usize,
}
