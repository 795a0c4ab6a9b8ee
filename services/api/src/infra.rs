use chrono::{DateTime, Duration, Utc};
use lucky_draw::draws::{
    Caller, CatalogError, DirectoryError, DrawRegistry, DrawRepository, DrawWindow,
    IdentityError, InMemoryDrawRepository, InMemoryPropertyCatalog, InMemoryUserDirectory,
    PropertyId, PropertySummary, RegistryId, RepositoryError, Role, StaticTokenIdentity, UserId,
    UserProfile,
};
use lucky_draw::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const DEMO_ADMIN_TOKEN: &str = "demo-admin-token";
pub(crate) const SHOWCASE_PROPERTY: &str = "prop-harbour";

/// Token handed to the `index`th seeded registrant, starting at 1.
pub(crate) fn demo_user_token(index: usize) -> String {
    format!("demo-user-token-{index}")
}

pub(crate) fn demo_user_id(index: usize) -> UserId {
    UserId(format!("user-{index:03}"))
}

/// In-memory collaborators backing the service when no external stores are wired in.
#[derive(Default, Clone)]
pub(crate) struct Deployment {
    pub(crate) repository: Arc<InMemoryDrawRepository>,
    pub(crate) catalog: Arc<InMemoryPropertyCatalog>,
    pub(crate) directory: Arc<InMemoryUserDirectory>,
    pub(crate) identity: Arc<StaticTokenIdentity>,
}

#[derive(Debug)]
pub(crate) enum SeedError {
    Catalog(CatalogError),
    Directory(DirectoryError),
    Identity(IdentityError),
    Repository(RepositoryError),
}

impl fmt::Display for SeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedError::Catalog(err) => write!(f, "seeding catalog failed: {}", err),
            SeedError::Directory(err) => write!(f, "seeding users failed: {}", err),
            SeedError::Identity(err) => write!(f, "seeding tokens failed: {}", err),
            SeedError::Repository(err) => write!(f, "seeding draws failed: {}", err),
        }
    }
}

impl std::error::Error for SeedError {}

impl From<SeedError> for AppError {
    fn from(value: SeedError) -> Self {
        AppError::Startup(Box::new(value))
    }
}

impl From<CatalogError> for SeedError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl From<DirectoryError> for SeedError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

impl From<IdentityError> for SeedError {
    fn from(value: IdentityError) -> Self {
        Self::Identity(value)
    }
}

impl From<RepositoryError> for SeedError {
    fn from(value: RepositoryError) -> Self {
        Self::Repository(value)
    }
}

pub(crate) fn demo_properties() -> Vec<PropertySummary> {
    [
        ("prop-harbour", "Harbour Penthouse", "Mumbai", 45_000_000),
        ("prop-garden", "Garden Row House", "Pune", 9_500_000),
        ("prop-lakeside", "Lakeside Villa", "Udaipur", 21_000_000),
    ]
    .into_iter()
    .map(|(id, title, location, price)| PropertySummary {
        id: PropertyId(id.to_string()),
        title: title.to_string(),
        location: location.to_string(),
        price,
        images: vec![format!("https://cdn.example.com/{id}/cover.jpg")],
        is_approved: true,
    })
    .collect()
}

impl Deployment {
    /// Approved listings, `registrants` users with bearer tokens, and one admin token.
    pub(crate) fn seeded(registrants: usize) -> Result<Self, SeedError> {
        let deployment = Self::default();

        for property in demo_properties() {
            deployment.catalog.seed(property)?;
        }

        for index in 1..=registrants {
            let user_id = demo_user_id(index);
            deployment.directory.upsert(UserProfile {
                user_id: user_id.clone(),
                name: format!("Demo Registrant {index}"),
                email: format!("registrant{index}@example.com"),
            })?;
            deployment.identity.grant(
                demo_user_token(index),
                Caller {
                    user_id,
                    role: Role::User,
                },
            )?;
        }

        deployment.identity.grant(
            DEMO_ADMIN_TOKEN,
            Caller {
                user_id: UserId("admin".to_string()),
                role: Role::Admin,
            },
        )?;

        Ok(deployment)
    }

    /// Store an open draw for the first seeded property so the API has something to serve.
    pub(crate) fn open_showcase_draw(&self, now: DateTime<Utc>) -> Result<RegistryId, SeedError> {
        let window = DrawWindow::new(now, now + Duration::days(7)).ok_or_else(|| {
            SeedError::Repository(RepositoryError::Unavailable(
                "showcase window is empty".to_string(),
            ))
        })?;
        let registry = DrawRegistry::enroll(PropertyId(SHOWCASE_PROPERTY.to_string()), window, now);
        Ok(self.repository.insert(registry)?.id().clone())
    }
}
