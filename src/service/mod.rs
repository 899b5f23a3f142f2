//! Operations behind the HTTP handlers. Each takes the store and, where the
//! caller matters, an explicit [`Identity`](crate::domain::Identity).

pub mod appointments;
pub mod auth;
pub mod directory;
