//! Entities module - domain entities of the clinic backend
//!
//! Every entity maps to a table. Guard methods for the business rules
//! (invitation lifecycle, token state, appointment and invoice transitions)
//! live next to the data they inspect.

pub mod appointment;
pub mod clinic;
pub mod enums;
pub mod invoice;
pub mod medical_record;
pub mod medicine;
pub mod patient;
pub mod refresh_token;
pub mod specialization;
pub mod staff;
pub mod staff_invitation;
pub mod user;
pub mod user_token;

// Re-exports to simplify imports
pub use appointment::Appointment;
pub use clinic::Clinic;
pub use enums::{AppointmentStatus, Gender, InvitationStatus, InvoiceStatus, StaffRole, TokenPurpose};
pub use invoice::{Invoice, InvoiceItem};
pub use medical_record::{MeasurementAttribute, MedicalRecord, RecordMeasurement};
pub use medicine::Medicine;
pub use patient::Patient;
pub use refresh_token::{RefreshToken, RefreshTokenState};
pub use specialization::Specialization;
pub use staff::{Staff, StaffWithUser};
pub use staff_invitation::{InvitationGuardError, StaffInvitation};
pub use user::User;
pub use user_token::UserToken;
