//! Generic repository operations shared by the per-table repositories
//!
//! Reads never return soft-deleted rows. Tenant-owned rows are created from a
//! `(clinic_id, dto)` pair and read back through [`ReadInClinic`].

/// Insert a row and return it with its generated id
pub trait Create<Entity, CreateDTO> {
    async fn create(&self, data: &CreateDTO) -> Result<Entity, sqlx::Error>;
}

/// Look a row up by primary key
pub trait Read<Entity, Id> {
    async fn read(&self, id: &Id) -> Result<Option<Entity>, sqlx::Error>;
}

/// Look a tenant-owned row up by primary key inside one clinic.
/// A row of another clinic is reported exactly like a missing one.
pub trait ReadInClinic<Entity> {
    async fn read_in_clinic(&self, clinic_id: &i64, id: &i64) -> Result<Option<Entity>, sqlx::Error>;
}

/// Partial update: only the `Some(_)` fields of the DTO are written.
///
/// Fails with `sqlx::Error::RowNotFound` when the row is missing or deleted.
pub trait Update<Entity, UpdateDTO, Id> {
    async fn update(&self, id: &Id, data: &UpdateDTO) -> Result<Entity, sqlx::Error>;
}

/// Remove a row; tenant-owned rows only get their `deleted_at` set
pub trait Delete<Id> {
    async fn delete(&self, id: &Id) -> Result<(), sqlx::Error>;
}
