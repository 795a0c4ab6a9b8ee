use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::domain::{DrawRegistry, DrawWindow, PropertyId, WriteConflict};
use super::repository::{
    CatalogError, DrawRepository, NewProperty, PropertyCatalog, PropertySummary, RepositoryError,
    UserDirectory,
};
use super::service::{LuckyDrawError, LuckyDrawService, Missing, WindowProblem};
use super::views::EnrollmentReceipt;
use crate::config::DrawPolicy;

/// Check a proposed window against the enrollment policy at `now`.
pub fn validate_window(
    policy: &DrawPolicy,
    opens_at: DateTime<Utc>,
    closes_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<DrawWindow, WindowProblem> {
    let window = DrawWindow::new(opens_at, closes_at).ok_or(WindowProblem::CloseNotAfterOpen)?;
    if closes_at <= now {
        return Err(WindowProblem::ClosesInPast);
    }
    if !policy.allow_past_open && opens_at < now {
        return Err(WindowProblem::OpensInPast);
    }
    Ok(window)
}

fn enrollment_error(err: RepositoryError) -> LuckyDrawError {
    match err {
        RepositoryError::Conflict(WriteConflict::PropertyEnrolled) => {
            LuckyDrawError::AlreadyEnrolled
        }
        other => other.into(),
    }
}

fn catalog_error(err: CatalogError) -> LuckyDrawError {
    match err {
        CatalogError::Rejected(reason) => LuckyDrawError::InvalidProperty(reason),
        other => other.into(),
    }
}

impl<R, C, U> LuckyDrawService<R, C, U>
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    /// Enroll an existing catalog property in a new draw.
    pub fn enroll_property(
        &self,
        property_id: &PropertyId,
        opens_at: DateTime<Utc>,
        closes_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentReceipt, LuckyDrawError> {
        let window = validate_window(&self.policy, opens_at, closes_at, now)
            .map_err(LuckyDrawError::InvalidWindow)?;
        let property = self
            .catalog
            .fetch(property_id)?
            .ok_or(LuckyDrawError::NotFound(Missing::Property))?;

        let registry = DrawRegistry::enroll(property.id.clone(), window, now);
        let stored = self.repository.insert(registry).map_err(enrollment_error)?;

        info!(
            registry_id = %stored.id(),
            property_id = %property.id,
            opens_at = %opens_at,
            closes_at = %closes_at,
            "property enrolled in lucky draw"
        );
        Ok(EnrollmentReceipt::new(&stored, &property))
    }

    /// Create an auto-approved property and its draw together. The property is discarded again
    /// when the draw cannot be stored.
    pub fn enroll_new_property(
        &self,
        property: NewProperty,
        opens_at: DateTime<Utc>,
        closes_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentReceipt, LuckyDrawError> {
        let window = validate_window(&self.policy, opens_at, closes_at, now)
            .map_err(LuckyDrawError::InvalidWindow)?;
        let created = self.catalog.create(property).map_err(catalog_error)?;

        let registry = DrawRegistry::enroll(created.id.clone(), window, now);
        let stored = match self.repository.insert(registry) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(
                    property_id = %created.id,
                    error = %err,
                    "draw insert failed; discarding new property"
                );
                if let Err(discard) = self.catalog.discard(&created.id) {
                    warn!(
                        property_id = %created.id,
                        error = %discard,
                        "failed to discard orphaned property"
                    );
                }
                return Err(enrollment_error(err));
            }
        };

        info!(
            registry_id = %stored.id(),
            property_id = %created.id,
            "property created and enrolled in lucky draw"
        );
        Ok(EnrollmentReceipt::new(&stored, &created))
    }

    /// Approved properties that are not currently in an `active` draw.
    pub fn list_available_properties(&self) -> Result<Vec<PropertySummary>, LuckyDrawError> {
        let enrolled: HashSet<PropertyId> = self.active_property_ids()?.into_iter().collect();
        Ok(self
            .catalog
            .approved()?
            .into_iter()
            .filter(|property| !enrolled.contains(&property.id))
            .collect())
    }
}
