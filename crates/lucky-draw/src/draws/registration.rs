use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{DrawStatus, Registration, RegistryId, UserId, WriteConflict};
use super::repository::{DrawRepository, PropertyCatalog, RepositoryError, UserDirectory};
use super::service::{LuckyDrawError, LuckyDrawService, Missing};
use super::views::{RegistrationReceipt, UserRegistrationView};

/// A contact phone is exactly `digits` ASCII digits, nothing else.
pub fn is_valid_contact(phone: &str, digits: usize) -> bool {
    phone.len() == digits && phone.bytes().all(|byte| byte.is_ascii_digit())
}

impl<R, C, U> LuckyDrawService<R, C, U>
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    /// Enter `user_id` into an open draw.
    ///
    /// Checks run in a fixed order and stop at the first failure: the draw exists, its window is
    /// open, the user has not entered yet, the contact phone is well formed. The final append is
    /// repeated as a conditional write so a racing duplicate still loses.
    pub fn register(
        &self,
        registry_id: &RegistryId,
        user_id: &UserId,
        contact_phone: &str,
        now: DateTime<Utc>,
    ) -> Result<RegistrationReceipt, LuckyDrawError> {
        let registry = self.load(registry_id)?;

        if !registry.is_registration_open(now) || registry.status() != DrawStatus::Active {
            return Err(LuckyDrawError::RegistrationClosed);
        }
        if registry.is_registered(user_id) {
            return Err(LuckyDrawError::DuplicateRegistration);
        }
        let expected_digits = self.policy.contact_digits;
        if !is_valid_contact(contact_phone, expected_digits) {
            return Err(LuckyDrawError::InvalidContact { expected_digits });
        }

        let registration = Registration::new(user_id.clone(), contact_phone.to_string(), now);
        let stored = self
            .repository
            .append_registration(registry_id, registration)
            .map_err(|err| match err {
                RepositoryError::Conflict(WriteConflict::DuplicateRegistrant) => {
                    LuckyDrawError::DuplicateRegistration
                }
                RepositoryError::Conflict(WriteConflict::DrawSealed) => {
                    LuckyDrawError::RegistrationClosed
                }
                RepositoryError::NotFound => LuckyDrawError::NotFound(Missing::Draw),
                other => other.into(),
            })?;

        info!(
            registry_id = %registry_id,
            user_id = %user_id,
            registrants = stored.registrants().len(),
            "lucky draw registration recorded"
        );

        Ok(RegistrationReceipt {
            registry_id: registry_id.clone(),
            user_id: user_id.clone(),
            registered_at: now,
            registrant_count: stored.registrants().len(),
        })
    }

    /// Every draw `user_id` has entered, newest first.
    pub fn list_user_registrations(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserRegistrationView>, LuckyDrawError> {
        let mut views = Vec::new();
        for registry in self.repository.registered_by(user_id)? {
            let Some(entry) = registry.registration_for(user_id) else {
                continue;
            };
            let property = self.property_of(&registry)?;
            views.push(UserRegistrationView {
                registry_id: registry.id().clone(),
                property_id: registry.property_id().clone(),
                property_title: property.map(|property| property.title),
                closes_at: registry.window().closes_at(),
                registered_at: entry.registered_at,
                status: registry.status(),
                is_winner: entry.is_winner,
            });
        }
        Ok(views)
    }
}
