//! Lucky draw registry for property listings.
//!
//! A property is enrolled with a registration window. Users register while the window is open,
//! and once it has closed an administrator selects exactly one winner uniformly at random. The
//! phase of a draw is always derived from the clock, while its status only moves forward from
//! `active` to `completed` or `cancelled`.

pub mod domain;
pub mod enrollment;
pub mod export;
pub mod lifecycle;
pub mod memory;
pub mod picker;
pub mod registration;
pub mod repository;
pub mod router;
pub mod selection;
pub mod service;
pub mod views;

#[cfg(test)]
mod tests;

pub use domain::{
    CorruptRecord, DrawRegistry, DrawStatus, DrawWindow, PropertyId, Registration, RegistryId,
    UnknownStatus, UserId, WriteConflict,
};
pub use enrollment::validate_window;
pub use export::{export_file_name, RegistrantExport, RegistrantRow, EXPORT_HEADERS};
pub use lifecycle::{DrawPhase, IneligibleReason};
pub use memory::{
    InMemoryDrawRepository, InMemoryPropertyCatalog, InMemoryUserDirectory, StaticTokenIdentity,
};
pub use picker::{picker_for_seed, SeededPicker, ThreadRngPicker, WinnerPicker};
pub use registration::is_valid_contact;
pub use repository::{
    Caller, CatalogError, DirectoryError, DrawRepository, IdentityError, IdentityProvider,
    NewProperty, PropertyCatalog, PropertySummary, RepositoryError, Role, UserDirectory,
    UserProfile,
};
pub use router::lucky_draw_router;
pub use service::{LuckyDrawError, LuckyDrawService, Missing, WindowProblem};
pub use views::{
    AdminDrawView, DrawSummary, EnrollmentReceipt, PropertyCard, PublicDrawView,
    RegistrantView, RegistrationReceipt, RemovalReceipt, UserRegistrationView,
    WinnerAnnouncement,
};
