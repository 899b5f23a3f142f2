use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};

use crate::domain::{
    Appointment, AppointmentStatus, Doctor, DoctorSummary, NewAppointment, NewProfile, NewUser,
    Patient, PatientSummary, Role, User,
};

use super::db::{Db, APPOINTMENTS_SLOT_KEY, USERS_EMAIL_KEY};
use super::store::{Store, StoreError, EMAIL_TAKEN, SLOT_TAKEN, STATUS_CHANGED};

const UNIQUE_VIOLATION: &str = "23505";

const APPOINTMENT_SELECT: &str = "
    SELECT a.id, a.date, a.time, a.reason, a.status, a.notes,
           p.id AS patient_id, p.name AS patient_name,
           d.id AS doctor_id, d.name AS doctor_name, d.specialization AS doctor_specialization
      FROM appointments a
      JOIN patients p ON p.id = a.patient_id
      JOIN doctors d ON d.id = a.doctor_id";

const PATIENT_COLUMNS: &str =
    "p.id, p.user_id, p.name, p.phone, p.address, p.emergency_contact, p.age, p.medical_history";

const DOCTOR_COLUMNS: &str =
    "d.id, d.user_id, d.name, d.specialization, d.phone, d.department, d.avatar, d.experience, d.rating, d.bio";

#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                if let Some(message) = conflict_message(db_err.constraint()) {
                    return StoreError::Conflict(message.into());
                }
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Client-facing message for a unique violation on a known constraint.
fn conflict_message(constraint: Option<&str>) -> Option<&'static str> {
    match constraint? {
        USERS_EMAIL_KEY => Some(EMAIL_TAKEN),
        APPOINTMENTS_SLOT_KEY => Some(SLOT_TAKEN),
        _ => None,
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        name: row.try_get("name")?,
        role: role
            .parse::<Role>()
            .map_err(|e| StoreError::Backend(e.to_string()))?,
    })
}

fn patient_from_row(row: &PgRow) -> Result<Patient, StoreError> {
    Ok(Patient {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        emergency_contact: row.try_get("emergency_contact")?,
        age: row.try_get("age")?,
        medical_history: row.try_get("medical_history")?,
    })
}

fn doctor_from_row(row: &PgRow) -> Result<Doctor, StoreError> {
    Ok(Doctor {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        specialization: row.try_get("specialization")?,
        phone: row.try_get("phone")?,
        department: row.try_get("department")?,
        avatar: row.try_get("avatar")?,
        experience: row.try_get("experience")?,
        rating: row.try_get("rating")?,
        bio: row.try_get("bio")?,
    })
}

fn appointment_from_row(row: &PgRow) -> Result<Appointment, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(Appointment {
        id: row.try_get("id")?,
        patient: PatientSummary {
            id: row.try_get("patient_id")?,
            name: row.try_get("patient_name")?,
        },
        doctor: DoctorSummary {
            id: row.try_get("doctor_id")?,
            name: row.try_get("doctor_name")?,
            specialization: row.try_get("doctor_specialization")?,
        },
        date: row.try_get("date")?,
        time: row.try_get("time")?,
        reason: row.try_get("reason")?,
        status: status
            .parse::<AppointmentStatus>()
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        notes: row.try_get("notes")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, email, password_hash, name, role FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn create_account(&self, new: NewUser, profile: NewProfile) -> Result<User, StoreError> {
        let mut tx = self.db.begin().await?;

        let user_id: i64 = sqlx::query(
            "INSERT INTO users (email, password_hash, name, role) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.name)
        .bind(new.role.as_str())
        .fetch_one(&mut *tx)
        .await?
        .try_get("id")?;

        match profile {
            NewProfile::Patient(p) => {
                sqlx::query(
                    "INSERT INTO patients (user_id, name, phone, address, emergency_contact, age, medical_history)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(user_id)
                .bind(&p.name)
                .bind(&p.phone)
                .bind(&p.address)
                .bind(&p.emergency_contact)
                .bind(p.age)
                .bind(&p.medical_history)
                .execute(&mut *tx)
                .await?;
            }
            NewProfile::Doctor(d) => {
                sqlx::query(
                    "INSERT INTO doctors (user_id, name, specialization, phone, bio)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(user_id)
                .bind(&d.name)
                .bind(&d.specialization)
                .bind(&d.phone)
                .bind(&d.bio)
                .execute(&mut *tx)
                .await?;
            }
            NewProfile::None => {}
        }

        tx.commit().await?;
        Ok(User {
            id: user_id,
            email: new.email,
            password_hash: new.password_hash,
            name: new.name,
            role: new.role,
        })
    }

    async fn list_users(&self, limit: i64) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, email, password_hash, name, role FROM users ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        let sql = format!(
            "SELECT {PATIENT_COLUMNS} FROM patients p JOIN users u ON u.id = p.user_id WHERE u.email = $1"
        );
        let row = sqlx::query(&sql).bind(email).fetch_optional(&self.db).await?;
        row.as_ref().map(patient_from_row).transpose()
    }

    async fn update_patient(&self, patient: &Patient) -> Result<Patient, StoreError> {
        let sql = format!(
            "UPDATE patients p
                SET name = $2, phone = $3, address = $4, emergency_contact = $5, age = $6, medical_history = $7
              WHERE p.id = $1
          RETURNING {PATIENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(patient.id)
            .bind(&patient.name)
            .bind(&patient.phone)
            .bind(&patient.address)
            .bind(&patient.emergency_contact)
            .bind(patient.age)
            .bind(&patient.medical_history)
            .fetch_optional(&self.db)
            .await?;
        match row {
            Some(row) => patient_from_row(&row),
            None => Err(StoreError::NotFound("Patient not found".into())),
        }
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let sql = format!("SELECT {DOCTOR_COLUMNS} FROM doctors d ORDER BY d.id");
        let rows = sqlx::query(&sql).fetch_all(&self.db).await?;
        rows.iter().map(doctor_from_row).collect()
    }

    async fn find_doctor(&self, id: i64) -> Result<Option<Doctor>, StoreError> {
        let sql = format!("SELECT {DOCTOR_COLUMNS} FROM doctors d WHERE d.id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;
        row.as_ref().map(doctor_from_row).transpose()
    }

    async fn find_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError> {
        let sql = format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctors d JOIN users u ON u.id = d.user_id WHERE u.email = $1"
        );
        let row = sqlx::query(&sql).bind(email).fetch_optional(&self.db).await?;
        row.as_ref().map(doctor_from_row).transpose()
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let id: i64 = sqlx::query(
            "INSERT INTO appointments (patient_id, doctor_id, date, time, reason, status)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(new.patient_id)
        .bind(new.doctor_id)
        .bind(new.date)
        .bind(new.time)
        .bind(&new.reason)
        .bind(AppointmentStatus::Pending.as_str())
        .fetch_one(&self.db)
        .await?
        .try_get("id")?;

        self.find_appointment(id)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("appointment {id} vanished after insert")))
    }

    async fn find_appointment(&self, id: i64) -> Result<Option<Appointment>, StoreError> {
        let sql = format!("{APPOINTMENT_SELECT} WHERE a.id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn appointments_for_patient(&self, patient_id: i64) -> Result<Vec<Appointment>, StoreError> {
        let sql = format!("{APPOINTMENT_SELECT} WHERE a.patient_id = $1 ORDER BY a.date, a.time, a.id");
        let rows = sqlx::query(&sql).bind(patient_id).fetch_all(&self.db).await?;
        rows.iter().map(appointment_from_row).collect()
    }

    async fn appointments_for_doctor(&self, doctor_id: i64) -> Result<Vec<Appointment>, StoreError> {
        let sql = format!("{APPOINTMENT_SELECT} WHERE a.doctor_id = $1 ORDER BY a.date, a.time, a.id");
        let rows = sqlx::query(&sql).bind(doctor_id).fetch_all(&self.db).await?;
        rows.iter().map(appointment_from_row).collect()
    }

    async fn update_appointment_status(
        &self,
        id: i64,
        expected: AppointmentStatus,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, StoreError> {
        let res = sqlx::query(
            "UPDATE appointments SET status = $2, notes = COALESCE($3, notes) WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(notes)
        .bind(expected.as_str())
        .execute(&self.db)
        .await?;
        if res.rows_affected() == 0 {
            return match self.find_appointment(id).await? {
                Some(_) => Err(StoreError::Stale(STATUS_CHANGED.into())),
                None => Err(StoreError::NotFound("Appointment not found".into())),
            };
        }
        self.find_appointment(id)
            .await?
            .ok_or_else(|| StoreError::NotFound("Appointment not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewDoctor, NewPatient};
    use crate::infra::db::{ensure_schema, SCHEMA};
    use time::macros::{date, time};

    #[test]
    fn unique_violations_map_by_constraint() {
        assert_eq!(conflict_message(Some(USERS_EMAIL_KEY)), Some(EMAIL_TAKEN));
        assert_eq!(conflict_message(Some(APPOINTMENTS_SLOT_KEY)), Some(SLOT_TAKEN));
        assert_eq!(conflict_message(Some("patients_user_id_key")), None);
        assert_eq!(conflict_message(None), None);
    }

    #[test]
    fn schema_declares_mapped_constraints() {
        for name in [USERS_EMAIL_KEY, APPOINTMENTS_SLOT_KEY] {
            assert!(SCHEMA.iter().any(|stmt| stmt.contains(name)), "{name} missing from schema");
        }
    }

    /// Needs a disposable database: `DATABASE_URL=... cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn postgres_conflicts_and_status_guard() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let db = sqlx::PgPool::connect(&url).await.unwrap();
        ensure_schema(&db).await.unwrap();
        let store = PgStore::new(db);
        let tag = uuid::Uuid::new_v4().simple().to_string();

        let account = |email: String, role: Role, profile: NewProfile| {
            let store = store.clone();
            async move {
                store
                    .create_account(
                        NewUser {
                            email,
                            password_hash: "hash".into(),
                            name: "Someone".into(),
                            role,
                        },
                        profile,
                    )
                    .await
            }
        };
        let patient_email = format!("p-{tag}@x.com");
        let doctor_email = format!("d-{tag}@x.com");
        account(
            patient_email.clone(),
            Role::Patient,
            NewProfile::Patient(NewPatient {
                name: "Pat".into(),
                phone: String::new(),
                address: None,
                emergency_contact: None,
                age: None,
                medical_history: None,
            }),
        )
        .await
        .unwrap();
        account(
            doctor_email.clone(),
            Role::Doctor,
            NewProfile::Doctor(NewDoctor {
                name: "Doc".into(),
                specialization: "General".into(),
                phone: String::new(),
                bio: None,
            }),
        )
        .await
        .unwrap();

        let dup = account(patient_email.clone(), Role::Patient, NewProfile::None).await;
        assert!(matches!(dup, Err(StoreError::Conflict(ref m)) if m == EMAIL_TAKEN));

        let patient = store.find_patient_by_email(&patient_email).await.unwrap().unwrap();
        let doctor = store.find_doctor_by_email(&doctor_email).await.unwrap().unwrap();
        let booking = || NewAppointment {
            patient_id: patient.id,
            doctor_id: doctor.id,
            date: date!(2031 - 01 - 01),
            time: time!(10:00),
            reason: None,
        };
        let appt = store.insert_appointment(booking()).await.unwrap();
        let taken = store.insert_appointment(booking()).await;
        assert!(matches!(taken, Err(StoreError::Conflict(ref m)) if m == SLOT_TAKEN));

        let stale = store
            .update_appointment_status(
                appt.id,
                AppointmentStatus::Confirmed,
                AppointmentStatus::Completed,
                None,
            )
            .await;
        assert!(matches!(stale, Err(StoreError::Stale(_))));
        let missing = store
            .update_appointment_status(i64::MAX, AppointmentStatus::Pending, AppointmentStatus::Confirmed, None)
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }
}
