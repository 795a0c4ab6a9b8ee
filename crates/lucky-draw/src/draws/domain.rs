use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::{self, DrawPhase, IneligibleReason};

/// Identifier wrapper for a draw registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistryId(pub String);

impl RegistryId {
    pub fn generate() -> Self {
        Self(format!("draw-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a Property Catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(pub String);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable subject handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Event-driven latch on a registry. Only winner selection and cancellation advance it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawStatus {
    Active,
    Completed,
    Cancelled,
}

impl DrawStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DrawStatus::Active => "active",
            DrawStatus::Completed => "completed",
            DrawStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for DrawStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(DrawStatus::Active),
            "completed" => Ok(DrawStatus::Completed),
            "cancelled" | "canceled" => Ok(DrawStatus::Cancelled),
            _ => Err(UnknownStatus(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown draw status '{0}'")]
pub struct UnknownStatus(pub String);

/// Registration window; `closes_at > opens_at` is guaranteed by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredWindow")]
pub struct DrawWindow {
    opens_at: DateTime<Utc>,
    closes_at: DateTime<Utc>,
}

impl DrawWindow {
    pub fn new(opens_at: DateTime<Utc>, closes_at: DateTime<Utc>) -> Option<Self> {
        (closes_at > opens_at).then_some(Self {
            opens_at,
            closes_at,
        })
    }

    pub fn opens_at(&self) -> DateTime<Utc> {
        self.opens_at
    }

    pub fn closes_at(&self) -> DateTime<Utc> {
        self.closes_at
    }

    pub fn phase(&self, now: DateTime<Utc>) -> DrawPhase {
        lifecycle::phase(now, self.opens_at, self.closes_at)
    }
}

#[derive(Deserialize)]
struct StoredWindow {
    opens_at: DateTime<Utc>,
    closes_at: DateTime<Utc>,
}

impl TryFrom<StoredWindow> for DrawWindow {
    type Error = CorruptRecord;

    fn try_from(stored: StoredWindow) -> Result<Self, Self::Error> {
        DrawWindow::new(stored.opens_at, stored.closes_at).ok_or(CorruptRecord::InvertedWindow)
    }
}

/// One user's entry into a draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub user_id: UserId,
    pub contact_phone: String,
    pub registered_at: DateTime<Utc>,
    pub is_winner: bool,
}

impl Registration {
    pub fn new(user_id: UserId, contact_phone: String, registered_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            contact_phone,
            registered_at,
            is_winner: false,
        }
    }
}

/// Aggregate root: one record per property enrolled in a lucky draw.
///
/// Mutations go through [`DrawRegistry::admit`], [`DrawRegistry::seal_winner`] and
/// [`DrawRegistry::cancel`]; storage adapters must run them while holding whatever guard makes
/// the check and the write a single atomic unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredRegistry")]
pub struct DrawRegistry {
    id: RegistryId,
    property_id: PropertyId,
    window: DrawWindow,
    registrants: Vec<Registration>,
    status: DrawStatus,
    winner_user_id: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DrawRegistry {
    pub fn enroll(property_id: PropertyId, window: DrawWindow, now: DateTime<Utc>) -> Self {
        Self {
            id: RegistryId::generate(),
            property_id,
            window,
            registrants: Vec::new(),
            status: DrawStatus::Active,
            winner_user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &RegistryId {
        &self.id
    }

    pub fn property_id(&self) -> &PropertyId {
        &self.property_id
    }

    pub fn window(&self) -> DrawWindow {
        self.window
    }

    pub fn registrants(&self) -> &[Registration] {
        &self.registrants
    }

    pub fn status(&self) -> DrawStatus {
        self.status
    }

    pub fn winner_user_id(&self) -> Option<&UserId> {
        self.winner_user_id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn phase(&self, now: DateTime<Utc>) -> DrawPhase {
        self.window.phase(now)
    }

    pub fn is_registration_open(&self, now: DateTime<Utc>) -> bool {
        self.phase(now) == DrawPhase::Active
    }

    /// Why winner selection cannot run right now, if anything blocks it.
    pub fn selection_blocker(&self, now: DateTime<Utc>) -> Option<IneligibleReason> {
        lifecycle::selection_blocker(
            self.phase(now),
            self.status,
            self.winner_user_id.is_some(),
        )
    }

    pub fn is_eligible_for_winner_selection(&self, now: DateTime<Utc>) -> bool {
        self.selection_blocker(now).is_none()
    }

    pub fn is_registered(&self, user_id: &UserId) -> bool {
        self.registrants
            .iter()
            .any(|registration| &registration.user_id == user_id)
    }

    pub fn registration_for(&self, user_id: &UserId) -> Option<&Registration> {
        self.registrants
            .iter()
            .find(|registration| &registration.user_id == user_id)
    }

    pub fn winner(&self) -> Option<&Registration> {
        self.registrants.iter().find(|registration| registration.is_winner)
    }

    fn is_sealed(&self) -> bool {
        self.status != DrawStatus::Active || self.winner_user_id.is_some()
    }

    /// Append a registration unless the user already entered or the draw is sealed.
    pub fn admit(&mut self, registration: Registration) -> Result<(), WriteConflict> {
        if self.is_sealed() {
            return Err(WriteConflict::DrawSealed);
        }
        if self.is_registered(&registration.user_id) {
            return Err(WriteConflict::DuplicateRegistrant);
        }

        self.updated_at = registration.registered_at;
        self.registrants.push(registration);
        Ok(())
    }

    /// Flag `user_id` as the winner and complete the draw in one step.
    ///
    /// `pool` is the registrant count the winner was drawn from; any other count means entries
    /// landed after the pick and the draw would no longer be uniform.
    pub fn seal_winner(
        &mut self,
        user_id: &UserId,
        pool: usize,
        at: DateTime<Utc>,
    ) -> Result<&Registration, WriteConflict> {
        if self.is_sealed() {
            return Err(WriteConflict::DrawSealed);
        }
        if self.registrants.len() != pool {
            return Err(WriteConflict::PoolChanged);
        }
        let index = self
            .registrants
            .iter()
            .position(|registration| &registration.user_id == user_id)
            .ok_or(WriteConflict::UnknownRegistrant)?;

        self.registrants[index].is_winner = true;
        self.winner_user_id = Some(user_id.clone());
        self.status = DrawStatus::Completed;
        self.updated_at = at;
        Ok(&self.registrants[index])
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<(), WriteConflict> {
        if self.is_sealed() {
            return Err(WriteConflict::DrawSealed);
        }
        self.status = DrawStatus::Cancelled;
        self.updated_at = at;
        Ok(())
    }
}

#[derive(Deserialize)]
struct StoredRegistry {
    id: RegistryId,
    property_id: PropertyId,
    window: DrawWindow,
    registrants: Vec<Registration>,
    status: DrawStatus,
    winner_user_id: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StoredRegistry> for DrawRegistry {
    type Error = CorruptRecord;

    fn try_from(stored: StoredRegistry) -> Result<Self, Self::Error> {
        let mut seen = HashSet::new();
        if !stored
            .registrants
            .iter()
            .all(|registration| seen.insert(&registration.user_id))
        {
            return Err(CorruptRecord::DuplicateRegistrant);
        }

        let mut flagged = stored.registrants.iter().filter(|r| r.is_winner);
        let winner = flagged.next().map(|registration| &registration.user_id);
        if flagged.next().is_some() {
            return Err(CorruptRecord::SeveralWinners);
        }
        if winner != stored.winner_user_id.as_ref() {
            return Err(CorruptRecord::WinnerMismatch);
        }
        let completed = stored.status == DrawStatus::Completed;
        if completed != winner.is_some() {
            return Err(CorruptRecord::WinnerMismatch);
        }

        Ok(Self {
            id: stored.id,
            property_id: stored.property_id,
            window: stored.window,
            registrants: stored.registrants,
            status: stored.status,
            winner_user_id: stored.winner_user_id,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }
}

/// Stored registry data that breaks an aggregate invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CorruptRecord {
    #[error("window closes before it opens")]
    InvertedWindow,
    #[error("user registered more than once")]
    DuplicateRegistrant,
    #[error("more than one registration flagged as winner")]
    SeveralWinners,
    #[error("winner flag, winner id and status disagree")]
    WinnerMismatch,
}

/// Conditional-write failures reported by the registry and by storage adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WriteConflict {
    #[error("property already has an active draw")]
    PropertyEnrolled,
    #[error("user already registered for this draw")]
    DuplicateRegistrant,
    #[error("draw is no longer accepting changes")]
    DrawSealed,
    #[error("user is not a registrant of this draw")]
    UnknownRegistrant,
    #[error("registrations changed while the winner was being drawn")]
    PoolChanged,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn registry() -> DrawRegistry {
        let window = DrawWindow::new(at(1, 0), at(10, 0)).expect("valid window");
        DrawRegistry::enroll(PropertyId("prop-1".to_string()), window, at(1, 0))
    }

    fn entry(user: &str, day: u32) -> Registration {
        Registration::new(UserId(user.to_string()), "9876543210".to_string(), at(day, 12))
    }

    #[test]
    fn window_requires_close_after_open() {
        assert!(DrawWindow::new(at(2, 0), at(1, 0)).is_none());
        assert!(DrawWindow::new(at(1, 0), at(1, 0)).is_none());
        assert!(DrawWindow::new(at(1, 0), at(1, 1)).is_some());
    }

    #[test]
    fn admit_rejects_second_entry_from_same_user() {
        let mut registry = registry();
        registry.admit(entry("u1", 5)).expect("first entry");

        assert_eq!(
            registry.admit(entry("u1", 6)),
            Err(WriteConflict::DuplicateRegistrant)
        );
        assert_eq!(registry.registrants().len(), 1);
        assert_eq!(registry.updated_at(), at(5, 12));
    }

    #[test]
    fn seal_winner_sets_all_three_fields() {
        let mut registry = registry();
        registry.admit(entry("u1", 2)).expect("u1");
        registry.admit(entry("u2", 3)).expect("u2");

        let winner = registry
            .seal_winner(&UserId("u2".to_string()), 2, at(11, 0))
            .expect("sealed")
            .clone();

        assert!(winner.is_winner);
        assert_eq!(registry.status(), DrawStatus::Completed);
        assert_eq!(registry.winner_user_id(), Some(&UserId("u2".to_string())));
        assert_eq!(
            registry.registrants().iter().filter(|r| r.is_winner).count(),
            1
        );
        assert_eq!(registry.updated_at(), at(11, 0));
    }

    #[test]
    fn sealed_registry_rejects_further_writes() {
        let mut registry = registry();
        registry.admit(entry("u1", 2)).expect("u1");
        registry
            .seal_winner(&UserId("u1".to_string()), 1, at(11, 0))
            .expect("sealed");

        assert_eq!(registry.admit(entry("u2", 3)), Err(WriteConflict::DrawSealed));
        assert_eq!(
            registry
                .seal_winner(&UserId("u1".to_string()), 1, at(12, 0))
                .map(|_| ()),
            Err(WriteConflict::DrawSealed)
        );
        assert_eq!(registry.cancel(at(12, 0)), Err(WriteConflict::DrawSealed));
    }

    #[test]
    fn seal_winner_requires_known_registrant() {
        let mut registry = registry();
        registry.admit(entry("u1", 2)).expect("u1");

        assert_eq!(
            registry
                .seal_winner(&UserId("ghost".to_string()), 1, at(11, 0))
                .map(|_| ()),
            Err(WriteConflict::UnknownRegistrant)
        );
        assert_eq!(registry.status(), DrawStatus::Active);
    }

    #[test]
    fn seal_winner_refuses_a_grown_pool() {
        let mut registry = registry();
        registry.admit(entry("u1", 2)).expect("u1");
        registry.admit(entry("late", 9)).expect("late");

        assert_eq!(
            registry
                .seal_winner(&UserId("u1".to_string()), 1, at(11, 0))
                .map(|_| ()),
            Err(WriteConflict::PoolChanged)
        );
        assert_eq!(registry.status(), DrawStatus::Active);
        assert!(registry.winner().is_none());
    }

    #[test]
    fn stored_window_must_close_after_open() {
        let inverted = r#"{"opens_at":"2025-02-01T00:00:00Z","closes_at":"2025-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<DrawWindow>(inverted).is_err());

        let valid = r#"{"opens_at":"2025-01-01T00:00:00Z","closes_at":"2025-02-01T00:00:00Z"}"#;
        let window = serde_json::from_str::<DrawWindow>(valid).expect("valid window");
        assert_eq!(window.opens_at(), at(1, 0));
    }

    fn stored(registrants: &str, status: &str, winner: &str) -> String {
        format!(
            r#"{{"id":"draw-1","property_id":"prop-1",
                "window":{{"opens_at":"2025-01-01T00:00:00Z","closes_at":"2025-01-10T00:00:00Z"}},
                "registrants":[{registrants}],"status":"{status}","winner_user_id":{winner},
                "created_at":"2025-01-01T00:00:00Z","updated_at":"2025-01-01T00:00:00Z"}}"#
        )
    }

    fn stored_entry(user: &str, is_winner: bool) -> String {
        format!(
            r#"{{"user_id":"{user}","contact_phone":"9876543210",
                "registered_at":"2025-01-02T00:00:00Z","is_winner":{is_winner}}}"#
        )
    }

    #[test]
    fn stored_registry_keeps_aggregate_invariants() {
        let both = format!("{},{}", stored_entry("u1", true), stored_entry("u1", true));
        assert!(serde_json::from_str::<DrawRegistry>(&stored(&both, "active", "null")).is_err());

        let two_winners = format!("{},{}", stored_entry("u1", true), stored_entry("u2", true));
        let json = stored(&two_winners, "completed", r#""u1""#);
        assert!(serde_json::from_str::<DrawRegistry>(&json).is_err());

        let flagged_but_active = stored(&stored_entry("u1", true), "active", r#""u1""#);
        assert!(serde_json::from_str::<DrawRegistry>(&flagged_but_active).is_err());

        let wrong_id = stored(&stored_entry("u1", true), "completed", r#""u2""#);
        assert!(serde_json::from_str::<DrawRegistry>(&wrong_id).is_err());

        let completed = stored(&stored_entry("u1", true), "completed", r#""u1""#);
        let registry = serde_json::from_str::<DrawRegistry>(&completed).expect("consistent");
        assert_eq!(registry.winner_user_id(), Some(&UserId("u1".to_string())));
        assert_eq!(registry.status(), DrawStatus::Completed);
    }

    #[test]
    fn registry_round_trips_through_storage_format() {
        let mut original = registry();
        original.admit(entry("u1", 2)).expect("u1");
        let json = serde_json::to_string(&original).expect("serialize");
        let restored: DrawRegistry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, original);
    }

    #[test]
    fn status_parses_from_query_strings() {
        assert_eq!("Active".parse::<DrawStatus>(), Ok(DrawStatus::Active));
        assert_eq!("canceled".parse::<DrawStatus>(), Ok(DrawStatus::Cancelled));
        assert!("upcoming".parse::<DrawStatus>().is_err());
    }
}
