//! Repositories module - one repository per entity
//!
//! Every repository owns a clone of the connection pool. Queries are written
//! with `sqlx::query_as::<_, Entity>` and checked at run time, so the crate
//! builds without a database; the integration tests run every query against
//! the migrated schema.
//!
//! Quick reference of the fetch methods:
//!
//! | rows          | method                 | returns                    |
//! |---------------|------------------------|----------------------------|
//! | none          | `.execute(..)`         | `SqliteQueryResult`        |
//! | zero or one   | `.fetch_optional(..)`  | `Option<T>`                |
//! | exactly one   | `.fetch_one(..)`       | `T`, `RowNotFound` if none |
//! | many          | `.fetch_all(..)`       | `Vec<T>`                   |
//!
//! Multi-statement operations take `self.connection_pool.begin()` and run
//! every statement on `&mut *tx`; dropping the transaction rolls it back.

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

// ************************* REPOSITORY MODULES ************************* //

pub mod appointment;
pub mod clinic;
pub mod invitation;
pub mod invoice;
pub mod measurement_attribute;
pub mod medical_record;
pub mod medicine;
pub mod patient;
pub mod refresh_token;
pub mod specialization;
pub mod staff;
pub mod traits;
pub mod user;
pub mod user_token;

pub use traits::{Create, Delete, Read, ReadInClinic, Update};

pub use appointment::AppointmentRepository;
pub use clinic::ClinicRepository;
pub use invitation::{InvitationAccount, InvitationRepository};
pub use invoice::{InvoiceRepository, IssueOutcome};
pub use measurement_attribute::MeasurementAttributeRepository;
pub use medical_record::MedicalRecordRepository;
pub use medicine::MedicineRepository;
pub use patient::PatientRepository;
pub use refresh_token::RefreshTokenRepository;
pub use specialization::SpecializationRepository;
pub use staff::StaffRepository;
pub use user::UserRepository;
pub use user_token::UserTokenRepository;

// ************************* POOL ************************* //

/// Embedded migrations of `./migrations`
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Open the pool and bring the schema up to date
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
    if database_url.contains(":memory:") {
        // an in-memory database lives as long as its connection
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options.connect_with(options).await?;
    MIGRATOR.run(&pool).await?;
    info!("Database ready, migrations applied");
    Ok(pool)
}

/// `term%` for a LIKE ... ESCAPE '\' clause, with the wildcards of `term` escaped
pub(crate) fn like_prefix(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 1);
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    connect("sqlite::memory:", 1)
        .await
        .expect("failed to open in-memory database")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("ann"), "ann%");
        assert_eq!(like_prefix("50%_off"), "50\\%\\_off%");
    }
}
