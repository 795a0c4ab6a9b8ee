use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::domain::{RegistryId, WriteConflict};
use super::repository::{DrawRepository, PropertyCatalog, RepositoryError, UserDirectory};
use super::service::{LuckyDrawError, LuckyDrawService, Missing};
use super::views::{resolve, WinnerAnnouncement};

/// Redraws allowed while in-flight registrations keep landing after close.
const MAX_SELECTION_ATTEMPTS: usize = 5;

impl<R, C, U> LuckyDrawService<R, C, U>
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    /// Pick one registrant uniformly at random and complete the draw.
    ///
    /// Not retryable: once a winner is sealed every further call fails with `NotEligible`.
    /// Winner flag, `winner_user_id` and the `completed` status are written by a single
    /// conditional update, so a concurrent second call cannot produce another winner. The update
    /// also requires the registrant count the pick was drawn from; when a late registration lands
    /// in between, the pick is redrawn over the grown pool.
    pub fn select_winner(
        &self,
        registry_id: &RegistryId,
        now: DateTime<Utc>,
    ) -> Result<WinnerAnnouncement, LuckyDrawError> {
        let mut attempt = 1;
        let (sealed, pool) = loop {
            let registry = self.load(registry_id)?;

            let pool = registry.registrants().len();
            if pool == 0 {
                return Err(LuckyDrawError::NoRegistrants);
            }
            if let Some(reason) = registry.selection_blocker(now) {
                warn!(registry_id = %registry_id, %reason, "winner selection refused");
                return Err(LuckyDrawError::NotEligible(reason));
            }

            let index = self.picker.pick(pool);
            let chosen = registry
                .registrants()
                .get(index)
                .ok_or_else(|| {
                    RepositoryError::Unavailable(format!(
                        "picker returned index {index} for a pool of {pool}"
                    ))
                })?
                .user_id
                .clone();

            match self.repository.seal_winner(registry_id, &chosen, pool, now) {
                Ok(sealed) => break (sealed, pool),
                Err(RepositoryError::Conflict(WriteConflict::PoolChanged))
                    if attempt < MAX_SELECTION_ATTEMPTS =>
                {
                    warn!(
                        registry_id = %registry_id,
                        attempt,
                        "registrations changed during selection"
                    );
                    attempt += 1;
                }
                Err(RepositoryError::Conflict(WriteConflict::DrawSealed)) => {
                    let reason = self.sealed_reason(registry_id, now)?;
                    warn!(registry_id = %registry_id, %reason, "winner selection lost a race");
                    return Err(LuckyDrawError::NotEligible(reason));
                }
                Err(RepositoryError::NotFound) => {
                    return Err(LuckyDrawError::NotFound(Missing::Draw));
                }
                Err(other) => return Err(other.into()),
            }
        };

        let winner = sealed
            .winner()
            .ok_or(RepositoryError::Unavailable(
                "sealed registry has no winner flag".to_string(),
            ))?
            .clone();

        // The winner is committed at this point; a directory outage only degrades the labels.
        let profiles = match self.directory.lookup(std::slice::from_ref(&winner.user_id)) {
            Ok(profiles) => profiles,
            Err(err) => {
                warn!(registry_id = %registry_id, error = %err, "winner profile lookup failed");
                Default::default()
            }
        };
        let (name, email) = resolve(&profiles, &winner.user_id);

        info!(
            registry_id = %registry_id,
            winner = %winner.user_id,
            pool,
            "lucky draw winner selected"
        );

        Ok(WinnerAnnouncement {
            registry_id: registry_id.clone(),
            user_id: winner.user_id,
            name,
            email,
            contact_phone: winner.contact_phone,
            registrant_count: sealed.registrants().len(),
        })
    }
}
