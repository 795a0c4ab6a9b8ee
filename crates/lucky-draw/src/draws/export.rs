//! Registrant export as a CSV attachment.
//!
//! Column order is a compatibility surface for downstream spreadsheets and must not change.

use std::collections::HashMap;
use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use super::domain::{DrawRegistry, RegistryId, UserId};
use super::repository::{DrawRepository, PropertyCatalog, UserDirectory, UserProfile};
use super::service::{LuckyDrawError, LuckyDrawService};
use super::views::resolve;

pub const EXPORT_HEADERS: [&str; 6] = [
    "ID",
    "Name",
    "Email",
    "Phone",
    "Registration Date",
    "Winner",
];

/// One exported line per registrant, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrantRow {
    pub sequence: usize,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub registered_at: String,
    pub winner: &'static str,
}

/// Rows are emitted even for users the directory no longer knows, so counts always reconcile.
pub fn registrant_rows(
    registry: &DrawRegistry,
    profiles: &HashMap<UserId, UserProfile>,
) -> Vec<RegistrantRow> {
    registry
        .registrants()
        .iter()
        .enumerate()
        .map(|(index, registration)| {
            let (name, email) = resolve(profiles, &registration.user_id);
            RegistrantRow {
                sequence: index + 1,
                name,
                email,
                phone: registration.contact_phone.clone(),
                registered_at: registration
                    .registered_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
                winner: if registration.is_winner { "Yes" } else { "No" },
            }
        })
        .collect()
}

/// Header first, then one record per row; an empty draw still yields the header line.
pub fn write_csv<W, I>(rows: I, writer: W) -> Result<W, csv::Error>
where
    W: Write,
    I: IntoIterator<Item = RegistrantRow>,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(EXPORT_HEADERS)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

pub fn export_file_name(property_title: &str, at: DateTime<Utc>) -> String {
    let slug = property_title
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() { "draw".to_string() } else { slug };
    format!(
        "lucky-draw-registrations-{slug}-{}.csv",
        at.timestamp_millis()
    )
}

#[derive(Debug, Clone)]
pub struct RegistrantExport {
    pub registry_id: RegistryId,
    pub file_name: String,
    pub row_count: usize,
    pub bytes: Vec<u8>,
}

impl<R, C, U> LuckyDrawService<R, C, U>
where
    R: DrawRepository + 'static,
    C: PropertyCatalog + 'static,
    U: UserDirectory + 'static,
{
    /// Read-only CSV projection of a draw's registrants.
    pub fn export_registrants(
        &self,
        registry_id: &RegistryId,
        now: DateTime<Utc>,
    ) -> Result<RegistrantExport, LuckyDrawError> {
        let registry = self.load(registry_id)?;
        let title = self
            .property_of(&registry)?
            .map(|property| property.title)
            .unwrap_or_else(|| registry.property_id().0.clone());
        let profiles = self.profiles_of(&registry)?;

        let rows = registrant_rows(&registry, &profiles);
        let row_count = rows.len();
        let bytes = write_csv(rows, Vec::new())?;

        info!(registry_id = %registry_id, rows = row_count, "registrant export generated");

        Ok(RegistrantExport {
            registry_id: registry_id.clone(),
            file_name: export_file_name(&title, now),
            row_count,
            bytes,
        })
    }
}
