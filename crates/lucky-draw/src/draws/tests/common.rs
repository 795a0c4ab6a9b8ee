use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::DrawPolicy;
use crate::draws::domain::{
    DrawRegistry, DrawStatus, DrawWindow, PropertyId, Registration, RegistryId, UserId,
};
use crate::draws::memory::{
    InMemoryDrawRepository, InMemoryPropertyCatalog, InMemoryUserDirectory, StaticTokenIdentity,
};
use crate::draws::picker::WinnerPicker;
use crate::draws::repository::{
    Caller, DrawRepository, NewProperty, PropertySummary, RepositoryError, Role, UserProfile,
};
use crate::draws::service::LuckyDrawService;

pub(super) type MemoryService =
    LuckyDrawService<InMemoryDrawRepository, InMemoryPropertyCatalog, InMemoryUserDirectory>;

pub(super) const VILLA: &str = "prop-villa";
pub(super) const LOFT: &str = "prop-loft";
pub(super) const PHONE: &str = "9876543210";
pub(super) const USER_TOKEN: &str = "token-u1";
pub(super) const OTHER_USER_TOKEN: &str = "token-u2";
pub(super) const ADMIN_TOKEN: &str = "token-admin";

pub(super) fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Creation time for scenario draws, before the window opens.
pub(super) fn enrolled_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 20, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn opens() -> DateTime<Utc> {
    ts(1, 0)
}

pub(super) fn closes() -> DateTime<Utc> {
    ts(10, 0)
}

pub(super) fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

/// Always returns the same index, clamped to the pool.
pub(super) struct FixedPicker(pub(super) usize);

impl WinnerPicker for FixedPicker {
    fn pick(&self, pool: usize) -> usize {
        self.0.min(pool - 1)
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<MemoryService>,
    pub(super) repository: Arc<InMemoryDrawRepository>,
    pub(super) catalog: Arc<InMemoryPropertyCatalog>,
    pub(super) directory: Arc<InMemoryUserDirectory>,
}

pub(super) fn harness() -> Harness {
    harness_with(DrawPolicy::default(), Arc::new(FixedPicker(0)))
}

pub(super) fn harness_with(policy: DrawPolicy, picker: Arc<dyn WinnerPicker>) -> Harness {
    let repository = Arc::new(InMemoryDrawRepository::default());
    let catalog = Arc::new(InMemoryPropertyCatalog::default());
    let directory = Arc::new(InMemoryUserDirectory::default());

    catalog.seed(property(VILLA, "Sea View Villa")).expect("seed villa");
    catalog.seed(property(LOFT, "City Loft")).expect("seed loft");
    for (id, name) in [("u1", "Asha Rao"), ("u2", "Ravi Kumar"), ("u3", "Meera Iyer")] {
        directory
            .upsert(UserProfile {
                user_id: user(id),
                name: name.to_string(),
                email: format!("{id}@example.com"),
            })
            .expect("upsert user");
    }

    let service = LuckyDrawService::new(
        repository.clone(),
        catalog.clone(),
        directory.clone(),
        policy,
    )
    .with_picker(picker);

    Harness {
        service: Arc::new(service),
        repository,
        catalog,
        directory,
    }
}

pub(super) fn property(id: &str, title: &str) -> PropertySummary {
    PropertySummary {
        id: PropertyId(id.to_string()),
        title: title.to_string(),
        location: "Goa".to_string(),
        price: 12_500_000,
        images: vec![format!("https://cdn.example.com/{id}.jpg")],
        is_approved: true,
    }
}

pub(super) fn new_property() -> NewProperty {
    NewProperty {
        title: "Hillside Cottage".to_string(),
        location: "Shimla".to_string(),
        price: 8_000_000,
        beds: 3,
        baths: 2,
        sqft: 1_450,
        property_type: "cottage".to_string(),
        description: "Pine views".to_string(),
        amenities: vec!["parking".to_string()],
        images: vec!["https://cdn.example.com/cottage.jpg".to_string()],
        contact_phone: "9123456780".to_string(),
    }
}

/// Scenario draw for the villa: opens 2025-01-01, closes 2025-01-10.
pub(super) fn enroll_villa(harness: &Harness) -> RegistryId {
    harness
        .service
        .enroll_property(&PropertyId(VILLA.to_string()), opens(), closes(), enrolled_at())
        .expect("villa enrolled")
        .registry_id
}

/// Store a draw whose window is already in the past relative to the wall clock.
pub(super) fn closed_draw_with(
    repository: &InMemoryDrawRepository,
    property_id: &str,
    users: &[&str],
) -> RegistryId {
    let now = Utc::now();
    let window =
        DrawWindow::new(now - Duration::days(10), now - Duration::days(1)).expect("window");
    let mut registry =
        DrawRegistry::enroll(PropertyId(property_id.to_string()), window, now - Duration::days(11));
    for (offset, id) in users.iter().enumerate() {
        registry
            .admit(Registration::new(
                user(id),
                format!("98765432{offset:02}"),
                now - Duration::days(5) + Duration::minutes(offset as i64),
            ))
            .expect("admit");
    }
    repository.insert(registry).expect("insert closed draw").id().clone()
}

/// Store a draw whose window contains the wall clock.
pub(super) fn open_draw(repository: &InMemoryDrawRepository, property_id: &str) -> RegistryId {
    let now = Utc::now();
    let window =
        DrawWindow::new(now - Duration::hours(1), now + Duration::days(3)).expect("window");
    let registry =
        DrawRegistry::enroll(PropertyId(property_id.to_string()), window, now - Duration::hours(2));
    repository.insert(registry).expect("insert open draw").id().clone()
}

pub(super) fn identity() -> Arc<StaticTokenIdentity> {
    let identity = StaticTokenIdentity::default();
    identity
        .grant(
            USER_TOKEN,
            Caller {
                user_id: user("u1"),
                role: Role::User,
            },
        )
        .expect("grant user");
    identity
        .grant(
            OTHER_USER_TOKEN,
            Caller {
                user_id: user("u2"),
                role: Role::User,
            },
        )
        .expect("grant user");
    identity
        .grant(
            ADMIN_TOKEN,
            Caller {
                user_id: user("admin"),
                role: Role::Admin,
            },
        )
        .expect("grant admin");
    Arc::new(identity)
}

pub(super) struct UnavailableRepository;

impl DrawRepository for UnavailableRepository {
    fn insert(&self, _registry: DrawRegistry) -> Result<DrawRegistry, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &RegistryId) -> Result<Option<DrawRegistry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _status: Option<DrawStatus>) -> Result<Vec<DrawRegistry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn registered_by(&self, _user_id: &UserId) -> Result<Vec<DrawRegistry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn append_registration(
        &self,
        _id: &RegistryId,
        _registration: Registration,
    ) -> Result<DrawRegistry, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn seal_winner(
        &self,
        _id: &RegistryId,
        _winner: &UserId,
        _pool: usize,
        _at: DateTime<Utc>,
    ) -> Result<DrawRegistry, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn cancel(
        &self,
        _id: &RegistryId,
        _at: DateTime<Utc>,
    ) -> Result<DrawRegistry, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: &RegistryId) -> Result<DrawRegistry, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// In-memory store that lets one registration land right before the first winner seal.
pub(super) struct LateEntryRepository {
    pub(super) inner: InMemoryDrawRepository,
    late: Mutex<Option<Registration>>,
}

impl LateEntryRepository {
    pub(super) fn new(late: Registration) -> Self {
        Self {
            inner: InMemoryDrawRepository::default(),
            late: Mutex::new(Some(late)),
        }
    }
}

impl DrawRepository for LateEntryRepository {
    fn insert(&self, registry: DrawRegistry) -> Result<DrawRegistry, RepositoryError> {
        self.inner.insert(registry)
    }

    fn fetch(&self, id: &RegistryId) -> Result<Option<DrawRegistry>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(&self, status: Option<DrawStatus>) -> Result<Vec<DrawRegistry>, RepositoryError> {
        self.inner.list(status)
    }

    fn registered_by(&self, user_id: &UserId) -> Result<Vec<DrawRegistry>, RepositoryError> {
        self.inner.registered_by(user_id)
    }

    fn append_registration(
        &self,
        id: &RegistryId,
        registration: Registration,
    ) -> Result<DrawRegistry, RepositoryError> {
        self.inner.append_registration(id, registration)
    }

    fn seal_winner(
        &self,
        id: &RegistryId,
        winner: &UserId,
        pool: usize,
        at: DateTime<Utc>,
    ) -> Result<DrawRegistry, RepositoryError> {
        let late = self.late.lock().expect("late entry lock").take();
        if let Some(registration) = late {
            self.inner.append_registration(id, registration)?;
        }
        self.inner.seal_winner(id, winner, pool, at)
    }

    fn cancel(&self, id: &RegistryId, at: DateTime<Utc>) -> Result<DrawRegistry, RepositoryError> {
        self.inner.cancel(id, at)
    }

    fn remove(&self, id: &RegistryId) -> Result<DrawRegistry, RepositoryError> {
        self.inner.remove(id)
    }
}

pub(super) fn unavailable_service(
) -> LuckyDrawService<UnavailableRepository, InMemoryPropertyCatalog, InMemoryUserDirectory> {
    let catalog = InMemoryPropertyCatalog::default();
    catalog.seed(property(VILLA, "Sea View Villa")).expect("seed villa");
    LuckyDrawService::new(
        Arc::new(UnavailableRepository),
        Arc::new(catalog),
        Arc::new(InMemoryUserDirectory::default()),
        DrawPolicy::default(),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf8 body")
}
