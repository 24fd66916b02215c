//! Application State - global application state
//!
//! Holds every repository, the configuration and the shared services
//! needed by the handlers.

use crate::core::config::Config;
use crate::core::email::EmailSender;
use crate::core::templates::TemplateEngine;
use crate::repositories::{
    AppointmentRepository, ClinicRepository, InvitationRepository, InvoiceRepository,
    MeasurementAttributeRepository, MedicalRecordRepository, MedicineRepository,
    PatientRepository, RefreshTokenRepository, SpecializationRepository, StaffRepository,
    UserRepository, UserTokenRepository,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Global state shared by every route and middleware
pub struct AppState {
    /// Raw pool, used by the health check
    pub pool: SqlitePool,

    pub config: Config,

    /// Outgoing email (SMTP, log or in-memory)
    pub email: Arc<dyn EmailSender>,

    /// Email templates, registered once at startup
    pub templates: TemplateEngine,

    pub user: UserRepository,
    pub refresh_token: RefreshTokenRepository,
    pub user_token: UserTokenRepository,
    pub clinic: ClinicRepository,
    pub specialization: SpecializationRepository,
    pub staff: StaffRepository,
    pub invitation: InvitationRepository,
    pub patient: PatientRepository,
    pub appointment: AppointmentRepository,
    pub medicine: MedicineRepository,
    pub invoice: InvoiceRepository,
    pub record: MedicalRecordRepository,
    pub attribute: MeasurementAttributeRepository,
}

impl AppState {
    /// Create a new AppState initializing every repository with the given pool
    ///
    /// # Arguments
    /// * `pool` - shared SQLite connection pool
    /// * `config` - loaded configuration
    /// * `email` - email sender used by the auth and invitation flows
    /// * `templates` - templates of the emails those flows send
    pub fn new(
        pool: SqlitePool,
        config: Config,
        email: Arc<dyn EmailSender>,
        templates: TemplateEngine,
    ) -> Self {
        Self {
            user: UserRepository::new(pool.clone()),
            refresh_token: RefreshTokenRepository::new(pool.clone()),
            user_token: UserTokenRepository::new(pool.clone()),
            clinic: ClinicRepository::new(pool.clone()),
            specialization: SpecializationRepository::new(pool.clone()),
            staff: StaffRepository::new(pool.clone()),
            invitation: InvitationRepository::new(pool.clone()),
            patient: PatientRepository::new(pool.clone()),
            appointment: AppointmentRepository::new(pool.clone()),
            medicine: MedicineRepository::new(pool.clone()),
            invoice: InvoiceRepository::new(pool.clone()),
            record: MedicalRecordRepository::new(pool.clone()),
            attribute: MeasurementAttributeRepository::new(pool.clone()),
            pool,
            config,
            email,
            templates,
        }
    }
}
