use std::collections::BTreeMap;

use async_trait::async_trait;
use time::{Date, Time};
use tokio::sync::RwLock;

use crate::domain::{
    Appointment, AppointmentStatus, Doctor, DoctorSummary, NewAppointment, NewProfile, NewUser,
    Patient, PatientSummary, User,
};

use super::store::{Store, StoreError, EMAIL_TAKEN, SLOT_TAKEN, STATUS_CHANGED};

#[derive(Debug, Clone)]
struct AppointmentRow {
    id: i64,
    patient_id: i64,
    doctor_id: i64,
    date: Date,
    time: Time,
    reason: Option<String>,
    status: AppointmentStatus,
    notes: Option<String>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    patients: BTreeMap<i64, Patient>,
    doctors: BTreeMap<i64, Doctor>,
    appointments: BTreeMap<i64, AppointmentRow>,
}

impl Tables {
    fn next_id<V>(map: &BTreeMap<i64, V>) -> i64 {
        map.keys().next_back().copied().unwrap_or(0) + 1
    }

    fn user_id_for(&self, email: &str) -> Option<i64> {
        self.users.values().find(|u| u.email == email).map(|u| u.id)
    }

    fn hydrate(&self, row: &AppointmentRow) -> Result<Appointment, StoreError> {
        let patient = self
            .patients
            .get(&row.patient_id)
            .ok_or_else(|| StoreError::Backend(format!("dangling patient {}", row.patient_id)))?;
        let doctor = self
            .doctors
            .get(&row.doctor_id)
            .ok_or_else(|| StoreError::Backend(format!("dangling doctor {}", row.doctor_id)))?;
        Ok(Appointment {
            id: row.id,
            patient: PatientSummary {
                id: patient.id,
                name: patient.name.clone(),
            },
            doctor: DoctorSummary {
                id: doctor.id,
                name: doctor.name.clone(),
                specialization: doctor.specialization.clone(),
            },
            date: row.date,
            time: row.time,
            reason: row.reason.clone(),
            status: row.status,
            notes: row.notes.clone(),
        })
    }

    fn hydrate_where<F>(&self, keep: F) -> Result<Vec<Appointment>, StoreError>
    where
        F: Fn(&AppointmentRow) -> bool,
    {
        self.appointments
            .values()
            .filter(|row| keep(row))
            .map(|row| self.hydrate(row))
            .collect()
    }
}

/// Process-local store. Ids are assigned per table starting at 1.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_account(&self, new: NewUser, profile: NewProfile) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.user_id_for(&new.email).is_some() {
            return Err(StoreError::Conflict(EMAIL_TAKEN.into()));
        }
        let user = User {
            id: Tables::next_id(&tables.users),
            email: new.email,
            password_hash: new.password_hash,
            name: new.name,
            role: new.role,
        };
        match profile {
            NewProfile::Patient(p) => {
                let id = Tables::next_id(&tables.patients);
                tables.patients.insert(
                    id,
                    Patient {
                        id,
                        user_id: user.id,
                        name: p.name,
                        phone: p.phone,
                        address: p.address,
                        emergency_contact: p.emergency_contact,
                        age: p.age,
                        medical_history: p.medical_history,
                    },
                );
            }
            NewProfile::Doctor(d) => {
                let id = Tables::next_id(&tables.doctors);
                tables.doctors.insert(
                    id,
                    Doctor {
                        id,
                        user_id: user.id,
                        name: d.name,
                        specialization: d.specialization,
                        phone: d.phone,
                        department: None,
                        avatar: None,
                        experience: None,
                        rating: None,
                        bio: d.bio,
                    },
                );
            }
            NewProfile::None => {}
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_users(&self, limit: i64) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(tables.users.values().rev().take(limit).cloned().collect())
    }

    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        let tables = self.tables.read().await;
        let Some(user_id) = tables.user_id_for(email) else {
            return Ok(None);
        };
        Ok(tables.patients.values().find(|p| p.user_id == user_id).cloned())
    }

    async fn update_patient(&self, patient: &Patient) -> Result<Patient, StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .patients
            .get_mut(&patient.id)
            .ok_or_else(|| StoreError::NotFound("Patient not found".into()))?;
        *slot = patient.clone();
        Ok(slot.clone())
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.doctors.values().cloned().collect())
    }

    async fn find_doctor(&self, id: i64) -> Result<Option<Doctor>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.doctors.get(&id).cloned())
    }

    async fn find_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError> {
        let tables = self.tables.read().await;
        let Some(user_id) = tables.user_id_for(email) else {
            return Ok(None);
        };
        Ok(tables.doctors.values().find(|d| d.user_id == user_id).cloned())
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.patients.contains_key(&new.patient_id) {
            return Err(StoreError::NotFound("Patient not found".into()));
        }
        if !tables.doctors.contains_key(&new.doctor_id) {
            return Err(StoreError::NotFound("Doctor not found".into()));
        }
        let taken = tables.appointments.values().any(|a| {
            a.doctor_id == new.doctor_id
                && a.date == new.date
                && a.time == new.time
                && a.status != AppointmentStatus::Cancelled
        });
        if taken {
            return Err(StoreError::Conflict(SLOT_TAKEN.into()));
        }
        let row = AppointmentRow {
            id: Tables::next_id(&tables.appointments),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            date: new.date,
            time: new.time,
            reason: new.reason,
            status: AppointmentStatus::Pending,
            notes: None,
        };
        let appointment = tables.hydrate(&row)?;
        tables.appointments.insert(row.id, row);
        Ok(appointment)
    }

    async fn find_appointment(&self, id: i64) -> Result<Option<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        tables.appointments.get(&id).map(|row| tables.hydrate(row)).transpose()
    }

    async fn appointments_for_patient(&self, patient_id: i64) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        tables.hydrate_where(|row| row.patient_id == patient_id)
    }

    async fn appointments_for_doctor(&self, doctor_id: i64) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        tables.hydrate_where(|row| row.doctor_id == doctor_id)
    }

    async fn update_appointment_status(
        &self,
        id: i64,
        expected: AppointmentStatus,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;
        let row = tables
            .appointments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("Appointment not found".into()))?;
        if row.status != expected {
            return Err(StoreError::Stale(STATUS_CHANGED.into()));
        }
        row.status = status;
        if notes.is_some() {
            row.notes = notes;
        }
        let row = row.clone();
        tables.hydrate(&row)
    }
}
