pub mod appointment;
pub mod doctor;
pub mod patient;
pub mod user;

pub use appointment::{Appointment, AppointmentStatus, DoctorSummary, NewAppointment, PatientSummary};
pub use doctor::{Doctor, NewDoctor};
pub use patient::{NewPatient, Patient, PatientUpdate};
pub use user::{Identity, NewProfile, NewUser, Role, User, UserView};
