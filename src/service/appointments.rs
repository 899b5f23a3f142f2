use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::appointment::{parse_date, parse_time};
use crate::domain::{Appointment, AppointmentStatus, Identity, NewAppointment, Role};
use crate::error::{ApiError, ApiResult};
use crate::infra::{Store, StoreError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    pub doctor_id: i64,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Books a PENDING appointment for the calling patient.
pub async fn book(store: &dyn Store, who: &Identity, req: BookRequest) -> ApiResult<Appointment> {
    let patient = store
        .find_patient_by_email(&who.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    let doctor = store
        .find_doctor(req.doctor_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;

    let appointment = store
        .insert_appointment(NewAppointment {
            patient_id: patient.id,
            doctor_id: doctor.id,
            date: parse_date(&req.date)?,
            time: parse_time(&req.time)?,
            reason: req.reason,
        })
        .await?;
    info!(
        appointment_id = appointment.id,
        patient_id = patient.id,
        doctor_id = doctor.id,
        "appointment booked"
    );
    Ok(appointment)
}

pub async fn list_for_patient(store: &dyn Store, who: &Identity) -> ApiResult<Vec<Appointment>> {
    let patient = store
        .find_patient_by_email(&who.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    Ok(store.appointments_for_patient(patient.id).await?)
}

pub async fn list_for_doctor(store: &dyn Store, who: &Identity) -> ApiResult<Vec<Appointment>> {
    let doctor = store
        .find_doctor_by_email(&who.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;
    Ok(store.appointments_for_doctor(doctor.id).await?)
}

/// Moves an appointment along its lifecycle. Doctors act on their own
/// appointments, patients may only cancel theirs, admins act on any.
pub async fn update_status(
    store: &dyn Store,
    who: &Identity,
    id: i64,
    update: StatusUpdate,
) -> ApiResult<Appointment> {
    let current = store
        .find_appointment(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".into()))?;
    let next = update.status.parse::<AppointmentStatus>()?;

    authorize(store, who, &current, next).await?;

    if !current.status.can_transition_to(next) {
        warn!(appointment_id = id, from = %current.status, to = %next, "rejected status change");
        return Err(ApiError::InvalidTransition(format!(
            "Cannot move appointment from {} to {}",
            current.status, next
        )));
    }

    let updated = store
        .update_appointment_status(id, current.status, next, update.notes)
        .await
        .map_err(|err| {
            if let StoreError::Stale(_) = &err {
                warn!(appointment_id = id, expected = %current.status, to = %next, "lost status race");
            }
            err
        })?;
    info!(appointment_id = id, from = %current.status, to = %next, "appointment status changed");
    Ok(updated)
}

async fn authorize(
    store: &dyn Store,
    who: &Identity,
    appointment: &Appointment,
    next: AppointmentStatus,
) -> ApiResult<()> {
    let allowed = match who.role {
        Role::Admin => true,
        Role::Doctor => store
            .find_doctor_by_email(&who.email)
            .await?
            .is_some_and(|d| d.id == appointment.doctor.id),
        Role::Patient => {
            next == AppointmentStatus::Cancelled
                && store
                    .find_patient_by_email(&who.email)
                    .await?
                    .is_some_and(|p| p.id == appointment.patient.id)
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not allowed to change this appointment".into()))
    }
}
