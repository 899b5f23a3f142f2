use axum::{extract::Request, middleware::Next, response::Response};

use crate::domain::{Identity, Role};
use crate::error::ApiError;

/// Must run after `require_auth`.
pub async fn admin_only(req: Request, next: Next) -> Result<Response, ApiError> {
    match req.extensions().get::<Identity>() {
        Some(who) if who.role == Role::Admin => Ok(next.run(req).await),
        Some(_) => Err(ApiError::Forbidden("Admin only".into())),
        None => Err(ApiError::Unauthorized),
    }
}
