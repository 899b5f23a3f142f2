use tracing::info;

use crate::domain::{Doctor, Identity, Patient, PatientUpdate, UserView};
use crate::error::{ApiError, ApiResult};
use crate::infra::Store;

const ADMIN_USER_PAGE: i64 = 50;

pub async fn list_doctors(store: &dyn Store) -> ApiResult<Vec<Doctor>> {
    Ok(store.list_doctors().await?)
}

pub async fn get_doctor(store: &dyn Store, id: i64) -> ApiResult<Doctor> {
    store
        .find_doctor(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))
}

pub async fn patient_profile(store: &dyn Store, who: &Identity) -> ApiResult<Patient> {
    store
        .find_patient_by_email(&who.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))
}

/// Overwrites name, phone, address and emergency contact; everything else
/// on the profile is kept.
pub async fn update_patient_profile(
    store: &dyn Store,
    who: &Identity,
    mut update: PatientUpdate,
) -> ApiResult<Patient> {
    update.name = update.name.trim().to_string();
    if update.name.is_empty() {
        return Err(ApiError::InvalidArgument("Name is required".into()));
    }
    let mut patient = patient_profile(store, who).await?;
    patient.apply(update);
    let saved = store.update_patient(&patient).await?;
    info!(patient_id = saved.id, "patient profile updated");
    Ok(saved)
}

pub async fn recent_users(store: &dyn Store) -> ApiResult<Vec<UserView>> {
    let users = store.list_users(ADMIN_USER_PAGE).await?;
    Ok(users.iter().map(UserView::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewPatient, NewProfile, NewUser, Role};
    use crate::infra::MemoryStore;

    async fn seeded() -> (MemoryStore, Identity) {
        let store = MemoryStore::new();
        let user = store
            .create_account(
                NewUser {
                    email: "p@x.com".into(),
                    password_hash: "h".into(),
                    name: "Pat".into(),
                    role: Role::Patient,
                },
                NewProfile::Patient(NewPatient {
                    name: "Pat".into(),
                    phone: "1".into(),
                    address: None,
                    emergency_contact: None,
                    age: Some(40),
                    medical_history: Some("Blood Group: A-".into()),
                }),
            )
            .await
            .unwrap();
        (store, Identity::from(&user))
    }

    #[tokio::test]
    async fn profile_update_keeps_medical_fields() {
        let (store, who) = seeded().await;
        let saved = update_patient_profile(
            &store,
            &who,
            PatientUpdate {
                name: "  Patricia ".into(),
                phone: Some("555-0101".into()),
                address: Some("1 Main St".into()),
                emergency_contact: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(saved.name, "Patricia");
        assert_eq!(saved.age, Some(40));
        assert_eq!(saved.medical_history.as_deref(), Some("Blood Group: A-"));
        assert_eq!(patient_profile(&store, &who).await.unwrap(), saved);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (store, who) = seeded().await;
        let err = update_patient_profile(
            &store,
            &who,
            PatientUpdate {
                name: " ".into(),
                phone: None,
                address: None,
                emergency_contact: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn missing_doctor_is_not_found() {
        let (store, _) = seeded().await;
        assert!(list_doctors(&store).await.unwrap().is_empty());
        assert!(matches!(get_doctor(&store, 1).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn recent_users_are_sanitized() {
        let (store, _) = seeded().await;
        let users = recent_users(&store).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, "patient");
    }
}
