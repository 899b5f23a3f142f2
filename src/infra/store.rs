//! Persistence seam between request handling and the backing database.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    Appointment, AppointmentStatus, Doctor, NewAppointment, NewProfile, NewUser, Patient, User,
};

pub const EMAIL_TAKEN: &str = "Email already exists";
pub const SLOT_TAKEN: &str = "Doctor already has an appointment at that time";
pub const STATUS_CHANGED: &str = "Appointment status changed concurrently; reload and retry";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// A conditional write found the row in a different state.
    #[error("{0}")]
    Stale(String),
    #[error("storage error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Inserts the user and its role profile as one unit. Fails with
    /// [`StoreError::Conflict`] when the email is taken.
    async fn create_account(&self, user: NewUser, profile: NewProfile) -> Result<User, StoreError>;

    /// Most recently created first.
    async fn list_users(&self, limit: i64) -> Result<Vec<User>, StoreError>;

    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError>;

    async fn update_patient(&self, patient: &Patient) -> Result<Patient, StoreError>;

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError>;

    async fn find_doctor(&self, id: i64) -> Result<Option<Doctor>, StoreError>;

    async fn find_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the doctor already holds a
    /// non-cancelled appointment at the same date and time.
    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError>;

    async fn find_appointment(&self, id: i64) -> Result<Option<Appointment>, StoreError>;

    async fn appointments_for_patient(&self, patient_id: i64) -> Result<Vec<Appointment>, StoreError>;

    async fn appointments_for_doctor(&self, doctor_id: i64) -> Result<Vec<Appointment>, StoreError>;

    /// Writes `status` only while the row still holds `expected`, failing
    /// with [`StoreError::Stale`] otherwise. `notes: None` keeps the stored
    /// notes.
    async fn update_appointment_status(
        &self,
        id: i64,
        expected: AppointmentStatus,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, StoreError>;
}
