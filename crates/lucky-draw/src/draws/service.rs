use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{DrawRegistry, DrawStatus, PropertyId, RegistryId, UserId, WriteConflict};
use super::lifecycle::IneligibleReason;
use super::picker::{ThreadRngPicker, WinnerPicker};
use super::repository::{
    CatalogError, DirectoryError, DrawRepository, PropertyCatalog, PropertySummary,
    RepositoryError, UserDirectory, UserProfile,
};
use super::views::{AdminDrawView, DrawSummary, PublicDrawView, RemovalReceipt};
use crate::config::DrawPolicy;

/// Facade over the draw registry and its collaborators.
///
/// Enrollment, registration, winner selection and export live in their own modules as further
/// `impl` blocks on this type.
pub struct LuckyDrawService<R, C, U> {
    pub(super) repository: Arc<R>,
    pub(super) catalog: Arc<C>,
    pub(super) directory: Arc<U>,
    pub(super) picker: Arc<dyn WinnerPicker>,
    pub(super) policy: DrawPolicy,
}

impl<R, C, U> LuckyDrawService<R, C, U>
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    pub fn new(repository: Arc<R>, catalog: Arc<C>, directory: Arc<U>, policy: DrawPolicy) -> Self {
        Self {
            repository,
            catalog,
            directory,
            picker: Arc::new(ThreadRngPicker),
            policy,
        }
    }

    pub fn with_picker(mut self, picker: Arc<dyn WinnerPicker>) -> Self {
        self.picker = picker;
        self
    }

    pub fn policy(&self) -> DrawPolicy {
        self.policy
    }

    pub(super) fn load(&self, registry_id: &RegistryId) -> Result<DrawRegistry, LuckyDrawError> {
        self.repository
            .fetch(registry_id)?
            .ok_or(LuckyDrawError::NotFound(Missing::Draw))
    }

    pub(super) fn property_of(
        &self,
        registry: &DrawRegistry,
    ) -> Result<Option<PropertySummary>, LuckyDrawError> {
        Ok(self.catalog.fetch(registry.property_id())?)
    }

    pub(super) fn profiles_of(
        &self,
        registry: &DrawRegistry,
    ) -> Result<HashMap<UserId, UserProfile>, LuckyDrawError> {
        let ids: Vec<UserId> = registry
            .registrants()
            .iter()
            .map(|registration| registration.user_id.clone())
            .collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(self.directory.lookup(&ids)?)
    }

    /// Public projection; `caller` adds the "already registered" flag.
    pub fn public_view(
        &self,
        registry_id: &RegistryId,
        caller: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> Result<PublicDrawView, LuckyDrawError> {
        let registry = self.load(registry_id)?;
        let property = self.property_of(&registry)?;
        Ok(PublicDrawView {
            summary: DrawSummary::new(&registry, property.as_ref(), now),
            has_winner: registry.winner_user_id().is_some(),
            is_user_registered: caller.map(|user_id| registry.is_registered(user_id)),
        })
    }

    pub fn admin_view(
        &self,
        registry_id: &RegistryId,
        now: DateTime<Utc>,
    ) -> Result<AdminDrawView, LuckyDrawError> {
        let registry = self.load(registry_id)?;
        let property = self.property_of(&registry)?;
        let profiles = self.profiles_of(&registry)?;
        Ok(AdminDrawView::new(
            &registry,
            property.as_ref(),
            &profiles,
            now,
        ))
    }

    pub fn list_enrolled(
        &self,
        status: Option<DrawStatus>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DrawSummary>, LuckyDrawError> {
        self.repository
            .list(status)?
            .iter()
            .map(|registry| {
                let property = self.property_of(registry)?;
                Ok(DrawSummary::new(registry, property.as_ref(), now))
            })
            .collect()
    }

    /// Hard-delete a draw together with its registrations.
    pub fn remove_enrollment(
        &self,
        registry_id: &RegistryId,
    ) -> Result<RemovalReceipt, LuckyDrawError> {
        let removed = self.repository.remove(registry_id).map_err(|err| match err {
            RepositoryError::NotFound => LuckyDrawError::NotFound(Missing::Draw),
            other => other.into(),
        })?;

        info!(
            registry_id = %removed.id(),
            property_id = %removed.property_id(),
            registrants = removed.registrants().len(),
            "lucky draw enrollment removed"
        );

        Ok(RemovalReceipt {
            registry_id: removed.id().clone(),
            property_id: removed.property_id().clone(),
            registrants_removed: removed.registrants().len(),
        })
    }

    /// Close a draw without a winner. Only `active` draws without a winner can be cancelled.
    pub fn cancel_draw(
        &self,
        registry_id: &RegistryId,
        now: DateTime<Utc>,
    ) -> Result<DrawSummary, LuckyDrawError> {
        let cancelled = match self.repository.cancel(registry_id, now) {
            Ok(registry) => registry,
            Err(RepositoryError::NotFound) => return Err(LuckyDrawError::NotFound(Missing::Draw)),
            Err(RepositoryError::Conflict(WriteConflict::DrawSealed)) => {
                let reason = self.sealed_reason(registry_id, now)?;
                return Err(LuckyDrawError::NotCancellable(reason));
            }
            Err(other) => return Err(other.into()),
        };

        info!(registry_id = %cancelled.id(), "lucky draw cancelled");
        let property = self.property_of(&cancelled)?;
        Ok(DrawSummary::new(&cancelled, property.as_ref(), now))
    }

    /// Reason a registry refused a conditional write, read back after the fact.
    pub(super) fn sealed_reason(
        &self,
        registry_id: &RegistryId,
        now: DateTime<Utc>,
    ) -> Result<IneligibleReason, LuckyDrawError> {
        let registry = self.load(registry_id)?;
        Ok(registry
            .selection_blocker(now)
            .unwrap_or(IneligibleReason::AlreadyCompleted))
    }

    pub(super) fn active_property_ids(&self) -> Result<Vec<PropertyId>, LuckyDrawError> {
        Ok(self
            .repository
            .list(Some(DrawStatus::Active))?
            .into_iter()
            .map(|registry| registry.property_id().clone())
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Draw,
    Property,
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Draw => f.write_str("lucky draw"),
            Missing::Property => f.write_str("property"),
        }
    }
}

/// Why a proposed registration window was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WindowProblem {
    #[error("registration must close after it opens")]
    CloseNotAfterOpen,
    #[error("registration must close in the future")]
    ClosesInPast,
    #[error("registration must open in the future")]
    OpensInPast,
}

/// Error raised by the lucky draw service.
#[derive(Debug, thiserror::Error)]
pub enum LuckyDrawError {
    #[error("{0} not found")]
    NotFound(Missing),
    #[error("invalid registration window: {0}")]
    InvalidWindow(WindowProblem),
    #[error("property already has an active lucky draw")]
    AlreadyEnrolled,
    #[error("invalid property: {0}")]
    InvalidProperty(String),
    #[error("registration is not open for this lucky draw")]
    RegistrationClosed,
    #[error("already registered for this lucky draw")]
    DuplicateRegistration,
    #[error("contact phone must be exactly {expected_digits} digits")]
    InvalidContact { expected_digits: usize },
    #[error("no registrations found for this lucky draw")]
    NoRegistrants,
    #[error("not eligible for winner selection: {0}")]
    NotEligible(IneligibleReason),
    #[error("lucky draw can no longer be cancelled: {0}")]
    NotCancellable(IneligibleReason),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("failed to write registrant export: {0}")]
    Export(#[from] csv::Error),
}

impl LuckyDrawError {
    /// Stable machine-readable code for API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            LuckyDrawError::NotFound(_) => "not_found",
            LuckyDrawError::InvalidWindow(_) => "invalid_window",
            LuckyDrawError::AlreadyEnrolled => "already_enrolled",
            LuckyDrawError::InvalidProperty(_) => "invalid_property",
            LuckyDrawError::RegistrationClosed => "registration_closed",
            LuckyDrawError::DuplicateRegistration => "duplicate_registration",
            LuckyDrawError::InvalidContact { .. } => "invalid_contact",
            LuckyDrawError::NoRegistrants => "no_registrants",
            LuckyDrawError::NotEligible(_) => "not_eligible",
            LuckyDrawError::NotCancellable(_) => "not_cancellable",
            LuckyDrawError::Repository(_)
            | LuckyDrawError::Catalog(_)
            | LuckyDrawError::Directory(_)
            | LuckyDrawError::Export(_) => "internal",
        }
    }

    /// Storage and collaborator faults, as opposed to caller-recoverable outcomes.
    pub fn is_internal(&self) -> bool {
        self.code() == "internal"
    }
}
