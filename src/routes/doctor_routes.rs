// src/routes/doctor_routes.rs

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, put},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, DoctorRow, OkData, ROLE_ADMIN, validate_name},
    storage,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_doctors).post(create_doctor))
        .route("/doctors/specializations", get(list_specializations))
        .route(
            "/doctors/{doctor_id}",
            get(get_doctor).put(update_doctor).delete(delete_doctor),
        )
        .route("/doctors/{doctor_id}/photo", put(upload_photo).delete(delete_photo))
}

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == ROLE_ADMIN {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admins can manage doctors".into(),
        ))
    }
}

async fn load_doctor(state: &AppState, doctor_id: Uuid) -> Result<DoctorRow, ApiError> {
    sqlx::query_as::<_, DoctorRow>(
        r#"
        SELECT doctor_id, first_name, last_name, specialization, profile_photo_url,
               created_at, updated_at
        FROM doctor
        WHERE doctor_id = $1
        "#,
    )
    .bind(doctor_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "doctor not found".into()))
}

/* ============================================================
   Public endpoints
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListDoctorsQuery {
    pub specialization: Option<String>,
}

pub async fn list_doctors(
    State(state): State<AppState>,
    Query(q): Query<ListDoctorsQuery>,
) -> Result<Json<ApiOk<Vec<DoctorRow>>>, ApiError> {
    let doctors: Vec<DoctorRow> = sqlx::query_as::<_, DoctorRow>(
        r#"
        SELECT doctor_id, first_name, last_name, specialization, profile_photo_url,
               created_at, updated_at
        FROM doctor
        WHERE ($1::text IS NULL OR specialization = $1)
        ORDER BY last_name ASC, first_name ASC
        "#,
    )
    .bind(q.specialization.as_deref().map(str::trim).filter(|s| !s.is_empty()))
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: doctors }))
}

pub async fn list_specializations(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<String>>>, ApiError> {
    let specializations: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT specialization
        FROM doctor
        ORDER BY specialization ASC
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: specializations,
    }))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    let doctor = load_doctor(&state, doctor_id).await?;
    Ok(Json(ApiOk { data: doctor }))
}

/* ============================================================
   Admin: create / update / delete
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateDoctorRequest {
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub profile_photo_url: Option<String>,
}

pub async fn create_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateDoctorRequest>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    ensure_admin(&auth)?;

    let first_name = validate_name("first_name", &req.first_name)?;
    let last_name = validate_name("last_name", &req.last_name)?;
    let specialization = validate_name("specialization", &req.specialization)?;

    let doctor: DoctorRow = sqlx::query_as::<_, DoctorRow>(
        r#"
        INSERT INTO doctor (first_name, last_name, specialization, profile_photo_url)
        VALUES ($1, $2, $3, $4)
        RETURNING doctor_id, first_name, last_name, specialization, profile_photo_url,
                  created_at, updated_at
        "#,
    )
    .bind(&first_name)
    .bind(&last_name)
    .bind(&specialization)
    .bind(req.profile_photo_url.as_deref().filter(|s| !s.is_empty()))
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: doctor }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoctorRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub specialization: Option<String>,
    /// Empty string clears the photo.
    pub profile_photo_url: Option<String>,
}

pub async fn update_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
    Json(req): Json<UpdateDoctorRequest>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    ensure_admin(&auth)?;

    let existing = load_doctor(&state, doctor_id).await?;

    if req.first_name.is_none()
        && req.last_name.is_none()
        && req.specialization.is_none()
        && req.profile_photo_url.is_none()
    {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "nothing to update".into(),
        ));
    }

    let first_name = match &req.first_name {
        Some(v) => validate_name("first_name", v)?,
        None => existing.first_name.clone(),
    };
    let last_name = match &req.last_name {
        Some(v) => validate_name("last_name", v)?,
        None => existing.last_name.clone(),
    };
    let specialization = match &req.specialization {
        Some(v) => validate_name("specialization", v)?,
        None => existing.specialization.clone(),
    };
    let profile_photo_url = match req.profile_photo_url.as_deref().map(str::trim) {
        Some("") => None,
        Some(url) => Some(url.to_string()),
        None => existing.profile_photo_url.clone(),
    };

    // Clearing the URL also removes the file we may have stored for it.
    if profile_photo_url.is_none() {
        if let Some(rel) = existing.profile_photo_url.as_deref().and_then(storage::path_from_url) {
            storage::delete_doctor_photo(&state.media_dir, rel).await;
        }
    }

    let updated: DoctorRow = sqlx::query_as::<_, DoctorRow>(
        r#"
        UPDATE doctor
        SET first_name = $2,
            last_name = $3,
            specialization = $4,
            profile_photo_url = $5,
            updated_at = now()
        WHERE doctor_id = $1
        RETURNING doctor_id, first_name, last_name, specialization, profile_photo_url,
                  created_at, updated_at
        "#,
    )
    .bind(doctor_id)
    .bind(&first_name)
    .bind(&last_name)
    .bind(&specialization)
    .bind(profile_photo_url.as_deref())
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: updated }))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    ensure_admin(&auth)?;

    let existing = load_doctor(&state, doctor_id).await?;

    // Cancelled history cascades away with the doctor; confirmed bookings
    // must be dealt with first.
    let has_confirmed: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM appointment
            WHERE doctor_id = $1 AND status = 0
        )
        "#,
    )
    .bind(doctor_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;
    if has_confirmed {
        return Err(ApiError::Conflict(
            "DOCTOR_HAS_APPOINTMENTS",
            "doctor has confirmed appointments; cancel them first".into(),
        ));
    }

    sqlx::query(r#"DELETE FROM doctor WHERE doctor_id = $1"#)
        .bind(doctor_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if let Some(rel) = existing.profile_photo_url.as_deref().and_then(storage::path_from_url) {
        storage::delete_doctor_photo(&state.media_dir, rel).await;
    }

    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}

/* ============================================================
   Admin: profile photo upload
   ============================================================ */

pub async fn upload_photo(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(content_type): TypedHeader<ContentType>,
    body: Bytes,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    ensure_admin(&auth)?;

    let existing = load_doctor(&state, doctor_id).await?;

    let mime = content_type.to_string();
    let Some(ext) = storage::extension_for(&mime) else {
        return Err(ApiError::BadRequest(
            "UNSUPPORTED_MEDIA_TYPE",
            "photo must be JPEG, PNG or WebP".into(),
        ));
    };
    if body.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "photo body is empty".into(),
        ));
    }
    if body.len() > storage::MAX_PHOTO_BYTES {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "photo too large (max 1 MiB)".into(),
        ));
    }

    // A re-upload with a different image type lands at a new path; drop the
    // old file so it does not linger on disk.
    let new_rel = storage::photo_rel(doctor_id, ext);
    if let Some(old) = existing.profile_photo_url.as_deref().and_then(storage::path_from_url) {
        if old != new_rel {
            storage::delete_doctor_photo(&state.media_dir, old).await;
        }
    }

    let rel = storage::save_doctor_photo(&state.media_dir, doctor_id, ext, &body)
        .await
        .map_err(|e| ApiError::Internal(format!("photo write error: {e}")))?;
    let url = storage::photo_url(&state.public_base_url, &rel);

    let updated: DoctorRow = sqlx::query_as::<_, DoctorRow>(
        r#"
        UPDATE doctor
        SET profile_photo_url = $2,
            updated_at = now()
        WHERE doctor_id = $1
        RETURNING doctor_id, first_name, last_name, specialization, profile_photo_url,
                  created_at, updated_at
        "#,
    )
    .bind(doctor_id)
    .bind(&url)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: updated }))
}

pub async fn delete_photo(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    ensure_admin(&auth)?;

    let existing = load_doctor(&state, doctor_id).await?;

    if let Some(rel) = existing.profile_photo_url.as_deref().and_then(storage::path_from_url) {
        storage::delete_doctor_photo(&state.media_dir, rel).await;
    }

    let updated: DoctorRow = sqlx::query_as::<_, DoctorRow>(
        r#"
        UPDATE doctor
        SET profile_photo_url = NULL,
            updated_at = now()
        WHERE doctor_id = $1
        RETURNING doctor_id, first_name, last_name, specialization, profile_photo_url,
                  created_at, updated_at
        "#,
    )
    .bind(doctor_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: updated }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appointment_history_follows_doctor_delete() {
        // delete_doctor refuses while confirmed bookings exist; past
        // (cancelled) appointments cascade away with the doctor rather than
        // making the row undeletable
        let sql = include_str!("../../migrations/006_appointment.sql");
        assert!(sql.contains("REFERENCES doctor(doctor_id) ON DELETE CASCADE"));
    }
}
