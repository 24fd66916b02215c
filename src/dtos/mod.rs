//! DTOs module - Data Transfer Objects
//!
//! This module contains the DTOs used for client-server communication.
//! DTOs separate the external representation (API) from the internal one (entities).

pub mod appointment;
pub mod auth;
pub mod clinic;
pub mod invitation;
pub mod invoice;
pub mod medical_record;
pub mod medicine;
pub mod patient;
pub mod query;
pub mod staff;
pub mod user;
pub mod validation;

// Re-exports to simplify imports
pub use appointment::{
    AppointmentChangesDTO, AppointmentDTO, AppointmentQuery, AppointmentStatusDTO,
    CreateAppointmentDTO, UpdateAppointmentDTO,
};
pub use auth::{
    ChangePasswordDTO, ConfirmEmailDTO, EmailOnlyDTO, LoginDTO, MessageResponseDTO,
    RefreshRequestDTO, RegisterDTO, ResetPasswordDTO, TokenResponseDTO,
};
pub use clinic::{ClinicDTO, CompleteOnboardingDTO, CreateClinicDTO, OnboardingResultDTO, UpdateClinicDTO};
pub use invitation::{
    AcceptInvitationDTO, AcceptedInvitationDTO, CreateInvitationDTO, InvitationDTO,
    InvitationPreviewDTO, InvitationQuery, IssuedInvitationDTO, NewInvitationDTO,
};
pub use invoice::{
    CreateInvoiceDTO, InvoiceDTO, InvoiceItemDTO, InvoiceItemInputDTO, InvoiceQuery,
    NewInvoiceItemDTO, ReplaceInvoiceItemsDTO,
};
pub use medical_record::{
    CreateMeasurementAttributeDTO, CreateMedicalRecordDTO, MeasurementAttributeDTO,
    MeasurementDTO, MeasurementInputDTO, MedicalRecordDTO, NewMedicalRecordDTO,
    UpdateMedicalRecordDTO,
};
pub use medicine::{CreateMedicineDTO, MedicineDTO, MedicineQuery, StockAdjustmentDTO, UpdateMedicineDTO};
pub use patient::{CreatePatientDTO, PatientDTO, PatientQuery, UpdatePatientDTO};
pub use query::{Page, Paged};
pub use staff::{CreateStaffDTO, StaffDTO, StaffQuery, UpdateStaffDTO};
pub use user::{CreateUserDTO, MeDTO, UpdateUserDTO, UserDTO};
