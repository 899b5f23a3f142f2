use serde::{Deserialize, Serialize};
use time::Date;
use tracing::{debug, info, warn};

use crate::domain::appointment::{age_on, parse_date};
use crate::domain::{Identity, NewDoctor, NewPatient, NewProfile, NewUser, Role, UserView};
use crate::error::{ApiError, ApiResult};
use crate::infra::Store;
use crate::security::jwt::{strip_bearer, JwtManager};
use crate::security::password;

const DEFAULT_SPECIALIZATION: &str = "General";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub emergency_contact: Option<String>,
    pub blood_group: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
}

fn validate_email(email: &str) -> bool {
    email.contains('@') && email.len() <= 255
}

pub async fn login(store: &dyn Store, jwt: &JwtManager, req: LoginRequest) -> ApiResult<LoginResponse> {
    let email = req.email.trim();
    let Some(user) = store.find_user_by_email(email).await? else {
        debug!(%email, "login for unknown email");
        return Err(ApiError::NotFound("User not found".into()));
    };

    if !password::verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = user.id, "login with wrong password");
        return Err(ApiError::InvalidCredential);
    }

    let view = UserView::from(&user);
    let token = jwt.issue_access(&user.email, Some(view.role.clone()))?;
    info!(user_id = user.id, role = %user.role, "login");
    Ok(LoginResponse { token, user: view })
}

/// Creates the account and, for patients and doctors, the linked profile.
/// `today` anchors the age computed from the date of birth. ADMIN accounts
/// can only be created by an authenticated admin `caller`.
pub async fn register(
    store: &dyn Store,
    req: RegisterRequest,
    today: Date,
    caller: Option<&Identity>,
) -> ApiResult<UserView> {
    let email = req.email.trim().to_string();
    if !validate_email(&email) {
        return Err(ApiError::InvalidArgument("Invalid email".into()));
    }
    if req.password.is_empty() {
        return Err(ApiError::InvalidArgument("Password is required".into()));
    }
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::InvalidArgument("Name is required".into()));
    }
    let role = req
        .role
        .parse::<Role>()
        .map_err(|e| ApiError::InvalidArgument(e.to_string()))?;
    if role == Role::Admin && !caller.is_some_and(|who| who.role == Role::Admin) {
        warn!(%email, "admin registration without admin caller");
        return Err(ApiError::Forbidden("Only an admin can create admin accounts".into()));
    }

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email already exists".into()));
    }

    let phone = req.phone.unwrap_or_default();
    let profile = match role {
        Role::Patient => {
            let age = match req.date_of_birth.as_deref().map(str::trim) {
                Some(dob) if !dob.is_empty() => Some(age_on(parse_date(dob)?, today)?),
                _ => None,
            };
            NewProfile::Patient(NewPatient {
                name: name.clone(),
                phone,
                address: req.address,
                emergency_contact: req.emergency_contact,
                age,
                medical_history: Some(
                    req.blood_group
                        .map(|g| format!("Blood Group: {g}"))
                        .unwrap_or_default(),
                ),
            })
        }
        Role::Doctor => NewProfile::Doctor(NewDoctor {
            name: name.clone(),
            specialization: req
                .specialization
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SPECIALIZATION.into()),
            phone,
            bio: Some(
                req.license_number
                    .map(|n| format!("License Number: {n}"))
                    .unwrap_or_default(),
            ),
        }),
        Role::Admin => NewProfile::None,
    };

    let password_hash = password::hash_password(&req.password)?;
    let user = store
        .create_account(
            NewUser {
                email,
                password_hash,
                name,
                role,
            },
            profile,
        )
        .await?;
    info!(user_id = user.id, role = %user.role, "registered");
    Ok(UserView::from(&user))
}

/// Creates the bootstrap admin unless the email is already registered.
pub async fn ensure_admin(store: &dyn Store, email: &str, password: &str) -> ApiResult<()> {
    if store.find_user_by_email(email).await?.is_some() {
        debug!(%email, "bootstrap admin already present");
        return Ok(());
    }
    let user = store
        .create_account(
            NewUser {
                email: email.to_string(),
                password_hash: password::hash_password(password)?,
                name: "Administrator".into(),
                role: Role::Admin,
            },
            NewProfile::None,
        )
        .await?;
    info!(user_id = user.id, "bootstrap admin created");
    Ok(())
}

/// Resolves a raw token to the identity of an existing user.
pub async fn authenticate(store: &dyn Store, jwt: &JwtManager, token: &str) -> ApiResult<Identity> {
    let claims = jwt.verify(token).map_err(|_| ApiError::Unauthorized)?;
    let user = store
        .find_user_by_email(&claims.sub)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Identity::from(&user))
}

pub async fn me(store: &dyn Store, who: &Identity) -> ApiResult<UserView> {
    let user = store
        .find_user_by_email(&who.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(UserView::from(&user))
}

/// Never fails: any problem with the header, the token or the user yields
/// `valid: false`.
pub async fn validate_token(store: &dyn Store, jwt: &JwtManager, authorization: Option<&str>) -> TokenValidation {
    let invalid = TokenValidation { valid: false, user: None };
    let Some(token) = authorization.and_then(strip_bearer) else {
        return invalid;
    };
    let Ok(claims) = jwt.verify(token) else {
        return invalid;
    };
    match store.find_user_by_email(&claims.sub).await {
        Ok(Some(user)) => TokenValidation {
            valid: true,
            user: Some(UserView::from(&user)),
        },
        Ok(None) => invalid,
        Err(err) => {
            warn!(error = %err, "token validation lookup failed");
            invalid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::MemoryStore;
    use time::macros::date;
    use time::Duration;

    const TODAY: Date = date!(2025 - 06 - 15);

    fn jwt() -> JwtManager {
        JwtManager::new("unit-secret", Duration::hours(10))
    }

    fn patient(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            name: "Pat Smith".into(),
            role: "patient".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn register_then_login_issues_token_for_email() {
        let store = MemoryStore::new();
        let jwt = jwt();
        let view = register(&store, patient("p@x.com", "pw123"), TODAY, None).await.unwrap();
        assert_eq!(view.role, "patient");

        let out = login(
            &store,
            &jwt,
            LoginRequest {
                email: "p@x.com".into(),
                password: "pw123".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(jwt.verify(&out.token).unwrap().sub, "p@x.com");
        assert_eq!(out.user.email, "p@x.com");
        assert_eq!(out.user.role, "patient");
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let store = MemoryStore::new();
        register(&store, patient("p@x.com", "pw123"), TODAY, None).await.unwrap();
        let err = register(&store, patient("p@x.com", "other"), TODAY, None).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(store.list_users(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn login_failures() {
        let store = MemoryStore::new();
        let jwt = jwt();
        register(&store, patient("p@x.com", "pw123"), TODAY, None).await.unwrap();

        let wrong = login(
            &store,
            &jwt,
            LoginRequest {
                email: "p@x.com".into(),
                password: "pw124".into(),
            },
        )
        .await;
        assert!(matches!(wrong, Err(ApiError::InvalidCredential)));

        let unknown = login(
            &store,
            &jwt,
            LoginRequest {
                email: "nobody@x.com".into(),
                password: "pw123".into(),
            },
        )
        .await;
        assert!(matches!(unknown, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn patient_profile_gets_age_and_blood_group() {
        let store = MemoryStore::new();
        let mut req = patient("p@x.com", "pw123");
        req.date_of_birth = Some("1990-06-16".into());
        req.blood_group = Some("O+".into());
        register(&store, req, TODAY, None).await.unwrap();

        let profile = store.find_patient_by_email("p@x.com").await.unwrap().unwrap();
        assert_eq!(profile.age, Some(34));
        assert_eq!(profile.medical_history.as_deref(), Some("Blood Group: O+"));
        assert_eq!(profile.phone, "");
    }

    #[tokio::test]
    async fn bad_date_of_birth_fails_and_writes_nothing() {
        let store = MemoryStore::new();
        let mut req = patient("p@x.com", "pw123");
        req.date_of_birth = Some("16/06/1990".into());
        let err = register(&store, req, TODAY, None).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
        assert!(store.find_user_by_email("p@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn doctor_registration_creates_doctor_profile() {
        let store = MemoryStore::new();
        let req = RegisterRequest {
            email: "d@x.com".into(),
            password: "pw".into(),
            name: "Dr Who".into(),
            role: "DOCTOR".into(),
            license_number: Some("LIC-42".into()),
            ..Default::default()
        };
        register(&store, req, TODAY, None).await.unwrap();
        let doctor = store.find_doctor_by_email("d@x.com").await.unwrap().unwrap();
        assert_eq!(doctor.specialization, "General");
        assert_eq!(doctor.bio.as_deref(), Some("License Number: LIC-42"));
        assert!(store.find_patient_by_email("d@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_role_is_rejected() {
        let store = MemoryStore::new();
        let mut req = patient("n@x.com", "pw");
        req.role = "nurse".into();
        assert!(matches!(
            register(&store, req, TODAY, None).await,
            Err(ApiError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn only_admins_create_admins() {
        let store = MemoryStore::new();
        let admin_req = |email: &str| RegisterRequest {
            email: email.into(),
            password: "pw".into(),
            name: "Root".into(),
            role: "admin".into(),
            ..Default::default()
        };

        let err = register(&store, admin_req("evil@x.com"), TODAY, None).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let doctor = Identity {
            user_id: 9,
            email: "d@x.com".into(),
            role: Role::Doctor,
        };
        let err = register(&store, admin_req("evil@x.com"), TODAY, Some(&doctor)).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert!(store.find_user_by_email("evil@x.com").await.unwrap().is_none());

        ensure_admin(&store, "root@x.com", "rootpw").await.unwrap();
        ensure_admin(&store, "root@x.com", "ignored").await.unwrap();
        let root = Identity::from(&store.find_user_by_email("root@x.com").await.unwrap().unwrap());
        assert_eq!(root.role, Role::Admin);

        let view = register(&store, admin_req("second@x.com"), TODAY, Some(&root)).await.unwrap();
        assert_eq!(view.role, "admin");
        assert_eq!(store.list_users(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn validate_token_never_errors() {
        let store = MemoryStore::new();
        let jwt = jwt();
        register(&store, patient("p@x.com", "pw123"), TODAY, None).await.unwrap();
        let token = jwt.issue_access("p@x.com", None).unwrap();

        let ok = validate_token(&store, &jwt, Some(&format!("Bearer {token}"))).await;
        assert!(ok.valid);
        assert_eq!(ok.user.unwrap().email, "p@x.com");

        assert!(!validate_token(&store, &jwt, None).await.valid);
        assert!(!validate_token(&store, &jwt, Some("Bearer nope")).await.valid);
        assert!(!validate_token(&store, &jwt, Some(&token)).await.valid);

        let ghost = jwt.issue_access("ghost@x.com", None).unwrap();
        assert!(!validate_token(&store, &jwt, Some(&format!("Bearer {ghost}"))).await.valid);

        let expired = JwtManager::new("unit-secret", Duration::hours(-1))
            .issue_access("p@x.com", None)
            .unwrap();
        assert!(!validate_token(&store, &jwt, Some(&format!("Bearer {expired}"))).await.valid);
    }
}
