use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;
use crate::mailer::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub mailer: Arc<dyn Mailer>,
    pub session_ttl_hours: i64,
    pub magic_link_ttl_minutes: i64,
    pub frontend_url: String,
    pub public_base_url: String,
    pub media_dir: String,
    pub clinic_name: String,
}

/* -------------------------
   API DTOs
--------------------------*/

/// Standard success envelope: every endpoint returns `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: String,
    /// Single role stored as smallint in DB, returned as a string.
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub email: String,
    pub role: i16,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SessionTokenRow {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Serialized as-is in doctor endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DoctorRow {
    pub doctor_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub profile_photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SlotRow {
    pub slot_id: Uuid,
    pub doctor_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

/* -------------------------
   Helpers
--------------------------*/

pub const ROLE_PATIENT: i16 = 0;
pub const ROLE_ADMIN: i16 = 1;

pub fn role_to_string(role: i16) -> String {
    match role {
        ROLE_PATIENT => "patient",
        ROLE_ADMIN => "admin",
        _ => "unknown",
    }
    .to_string()
}

pub const APPOINTMENT_CONFIRMED: i16 = 0;
pub const APPOINTMENT_CANCELLED: i16 = 1;

pub fn status_to_string(status: i16) -> String {
    match status {
        APPOINTMENT_CONFIRMED => "confirmed",
        APPOINTMENT_CANCELLED => "cancelled",
        _ => "unknown",
    }
    .to_string()
}

pub fn status_from_string(s: &str) -> Option<i16> {
    match s {
        "confirmed" => Some(APPOINTMENT_CONFIRMED),
        "cancelled" => Some(APPOINTMENT_CANCELLED),
        _ => None,
    }
}

/* -------------------------
   Field validation
--------------------------*/

/// Rough shape check only; the mail provider is the real validator.
/// Trims and lowercases, so equal addresses compare equal.
pub fn validate_email(field: &'static str, value: &str) -> Result<String, ApiError> {
    let v = value.trim().to_lowercase();
    let ok = v.len() >= 5
        && v.len() <= 254
        && v.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        });
    if !ok {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("{field} must be a valid email address"),
        ));
    }
    Ok(v)
}

pub fn validate_name(field: &'static str, value: &str) -> Result<String, ApiError> {
    let v = value.trim();
    if v.is_empty() || v.len() > 100 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("{field} must be 1-100 characters"),
        ));
    }
    Ok(v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_mapping() {
        assert_eq!(role_to_string(0), "patient");
        assert_eq!(role_to_string(1), "admin");
        assert_eq!(role_to_string(7), "unknown");
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(status_to_string(APPOINTMENT_CONFIRMED), "confirmed");
        assert_eq!(status_to_string(APPOINTMENT_CANCELLED), "cancelled");
        assert_eq!(status_from_string("confirmed"), Some(APPOINTMENT_CONFIRMED));
        assert_eq!(status_from_string("cancelled"), Some(APPOINTMENT_CANCELLED));
        assert_eq!(status_from_string("pending"), None);
    }

    #[test]
    fn test_validate_email_accepts_and_normalizes() {
        assert_eq!(validate_email("email", "  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert_eq!(
            validate_email("email", "a.b+c@mail.example.org").unwrap(),
            "a.b+c@mail.example.org"
        );
    }

    #[test]
    fn test_validate_email_rejects_garbage() {
        assert!(validate_email("email", "").is_err());
        assert!(validate_email("email", "notanemail").is_err());
        assert!(validate_email("email", "@example.com").is_err());
        assert!(validate_email("email", "user@nodot").is_err());
        assert!(validate_email("email", "user@.com").is_err());
    }

    #[test]
    fn test_validate_name_bounds() {
        assert_eq!(validate_name("first_name", "  Ada ").unwrap(), "Ada");
        assert!(validate_name("first_name", "").is_err());
        assert!(validate_name("first_name", "   ").is_err());
        assert!(validate_name("first_name", &"x".repeat(101)).is_err());
        assert!(validate_name("first_name", &"x".repeat(100)).is_ok());
    }
}
