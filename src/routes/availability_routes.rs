// src/routes/availability_routes.rs

use std::collections::{BTreeSet, HashSet};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ApiError, is_unique_violation},
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, OkData, ROLE_ADMIN, SlotRow},
};

/// Every bookable slot is exactly this long; staff give a range and the
/// server cuts it up.
const SLOT_MINUTES: i64 = 30;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors/{doctor_id}/slots", get(get_doctor_slots))
        .route("/doctors/{doctor_id}/available-dates", get(get_available_dates))
        .route("/availability", post(create_slots))
        .route("/availability/{slot_id}", patch(toggle_slot).delete(delete_slot))
}

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == ROLE_ADMIN {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admins can manage availability".into(),
        ))
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("VALIDATION_ERROR", "date must be YYYY-MM-DD".into()))
}

fn parse_time(field: &'static str, s: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| ApiError::BadRequest("VALIDATION_ERROR", format!("{field} must be HH:MM")))
}

/// Consecutive slot start times covering [start, end); a tail shorter than a
/// full slot is dropped.
fn slot_starts(start: NaiveDateTime, end: NaiveDateTime) -> Vec<NaiveDateTime> {
    let mut starts = vec![];
    let mut current = start;
    while current + Duration::minutes(SLOT_MINUTES) <= end {
        starts.push(current);
        current += Duration::minutes(SLOT_MINUTES);
    }
    starts
}

fn to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)
}

/* ============================================================
   Public: slots for a doctor
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    /// YYYY-MM-DD; restricts to slots starting on that date.
    pub date: Option<String>,
    /// Defaults to true: patients only see open slots.
    pub available_only: Option<bool>,
}

pub async fn get_doctor_slots(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Query(q): Query<SlotsQuery>,
) -> Result<Json<ApiOk<Vec<SlotRow>>>, ApiError> {
    let available_only = q.available_only.unwrap_or(true);

    let day = match q.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(parse_date(s)?),
        None => None,
    };
    let (range_start, range_end) = match day {
        Some(d) => {
            let start = to_utc(d.and_hms_opt(0, 0, 0).unwrap());
            (Some(start), Some(start + Duration::days(1)))
        }
        None => (None, None),
    };

    let slots: Vec<SlotRow> = sqlx::query_as::<_, SlotRow>(
        r#"
        SELECT slot_id, doctor_id, start_at, end_at, is_available, created_at
        FROM availability_slot
        WHERE doctor_id = $1
          AND ($2::timestamptz IS NULL OR start_at >= $2)
          AND ($3::timestamptz IS NULL OR start_at < $3)
          AND ($4 = false OR is_available = true)
        ORDER BY start_at ASC
        "#,
    )
    .bind(doctor_id)
    .bind(range_start)
    .bind(range_end)
    .bind(available_only)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: slots }))
}

/* ============================================================
   Public: dates with open slots
   ============================================================ */

pub async fn get_available_dates(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<ApiOk<Vec<String>>>, ApiError> {
    let starts: Vec<DateTime<Utc>> = sqlx::query_scalar(
        r#"
        SELECT start_at
        FROM availability_slot
        WHERE doctor_id = $1
          AND is_available = true
          AND start_at > now()
        ORDER BY start_at ASC
        "#,
    )
    .bind(doctor_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let dates: BTreeSet<String> = starts
        .into_iter()
        .map(|t| t.format("%Y-%m-%d").to_string())
        .collect();

    Ok(Json(ApiOk {
        data: dates.into_iter().collect(),
    }))
}

/* ============================================================
   Admin: bulk slot creation
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateSlotsRequest {
    pub doctor_id: Uuid,
    /// YYYY-MM-DD, must be tomorrow or later (no same-day slots).
    pub date: String,
    /// HH:MM
    pub start_time: String,
    /// HH:MM
    pub end_time: String,
}

#[derive(Debug, Serialize)]
pub struct SlotsCreatedData {
    pub message: String,
    pub slots_created: usize,
    pub slots: Vec<SlotRow>,
}

pub async fn create_slots(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateSlotsRequest>,
) -> Result<Json<ApiOk<SlotsCreatedData>>, ApiError> {
    ensure_admin(&auth)?;

    let date = parse_date(&req.date)?;
    if date <= Utc::now().date_naive() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "date must be at least tomorrow (no same-day slots)".into(),
        ));
    }
    let start_time = parse_time("start_time", &req.start_time)?;
    let end_time = parse_time("end_time", &req.end_time)?;
    let start = date.and_time(start_time);
    let end = date.and_time(end_time);
    if end <= start {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "end_time must be after start_time".into(),
        ));
    }

    let doctor_exists: bool = sqlx::query_scalar(
        r#"SELECT EXISTS (SELECT 1 FROM doctor WHERE doctor_id = $1)"#,
    )
    .bind(req.doctor_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;
    if !doctor_exists {
        return Err(ApiError::NotFound("NOT_FOUND", "doctor not found".into()));
    }

    // Re-running the same range is allowed; already-present starts are skipped.
    let day_start = to_utc(date.and_hms_opt(0, 0, 0).unwrap());
    let existing: Vec<DateTime<Utc>> = sqlx::query_scalar(
        r#"
        SELECT start_at
        FROM availability_slot
        WHERE doctor_id = $1
          AND start_at >= $2
          AND start_at < $3
        "#,
    )
    .bind(req.doctor_id)
    .bind(day_start)
    .bind(day_start + Duration::days(1))
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;
    let existing: HashSet<DateTime<Utc>> = existing.into_iter().collect();

    let to_create: Vec<DateTime<Utc>> = slot_starts(start, end)
        .into_iter()
        .map(to_utc)
        .filter(|t| !existing.contains(t))
        .collect();

    if to_create.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "all slots in this range already exist".into(),
        ));
    }

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let mut slots = Vec::with_capacity(to_create.len());
    for start_at in to_create {
        let slot: SlotRow = sqlx::query_as::<_, SlotRow>(
            r#"
            INSERT INTO availability_slot (doctor_id, start_at, end_at, is_available)
            VALUES ($1, $2, $3, true)
            RETURNING slot_id, doctor_id, start_at, end_at, is_available, created_at
            "#,
        )
        .bind(req.doctor_id)
        .bind(start_at)
        .bind(start_at + Duration::minutes(SLOT_MINUTES))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            // Another admin may have created the same start between our
            // pre-check and this insert.
            if is_unique_violation(&e) {
                ApiError::Conflict("SLOT_EXISTS", "slot already exists at this time".into())
            } else {
                ApiError::db(e)
            }
        })?;
        slots.push(slot);
    }

    tx.commit().await.map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: SlotsCreatedData {
            message: format!("Created {} slots", slots.len()),
            slots_created: slots.len(),
            slots,
        },
    }))
}

/* ============================================================
   Admin: toggle / delete
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ToggleSlotRequest {
    pub is_available: bool,
}

pub async fn toggle_slot(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(slot_id): Path<Uuid>,
    Json(req): Json<ToggleSlotRequest>,
) -> Result<Json<ApiOk<SlotRow>>, ApiError> {
    ensure_admin(&auth)?;

    let slot: SlotRow = sqlx::query_as::<_, SlotRow>(
        r#"
        UPDATE availability_slot
        SET is_available = $2
        WHERE slot_id = $1
        RETURNING slot_id, doctor_id, start_at, end_at, is_available, created_at
        "#,
    )
    .bind(slot_id)
    .bind(req.is_available)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "slot not found".into()))?;

    Ok(Json(ApiOk { data: slot }))
}

pub async fn delete_slot(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    ensure_admin(&auth)?;

    let has_active: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM appointment
            WHERE slot_id = $1 AND status = 0
        )
        "#,
    )
    .bind(slot_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;
    if has_active {
        return Err(ApiError::Conflict(
            "SLOT_BOOKED",
            "slot has a confirmed appointment; cancel it first".into(),
        ));
    }

    let res = sqlx::query(r#"DELETE FROM availability_slot WHERE slot_id = $1"#)
        .bind(slot_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "slot not found".into()));
    }

    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 9, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_slot_starts_exact_range() {
        let starts = slot_starts(dt(9, 0), dt(11, 0));
        assert_eq!(starts, vec![dt(9, 0), dt(9, 30), dt(10, 0), dt(10, 30)]);
    }

    #[test]
    fn test_slot_starts_drops_short_tail() {
        // 9:00-10:45 -> last full slot starts at 10:00
        let starts = slot_starts(dt(9, 0), dt(10, 45));
        assert_eq!(starts, vec![dt(9, 0), dt(9, 30), dt(10, 0)]);
    }

    #[test]
    fn test_slot_starts_range_too_short() {
        assert!(slot_starts(dt(9, 0), dt(9, 29)).is_empty());
        assert!(slot_starts(dt(9, 0), dt(9, 0)).is_empty());
    }

    #[test]
    fn test_cancelled_history_does_not_block_slot_delete() {
        // delete_slot only refuses confirmed bookings; cancelled appointments
        // must follow the slot out via the FK instead of blocking the delete
        let sql = include_str!("../../migrations/006_appointment.sql");
        assert!(sql.contains("REFERENCES availability_slot(slot_id) ON DELETE CASCADE"));
    }

    #[test]
    fn test_parse_date_and_time() {
        assert!(parse_date("2026-09-01").is_ok());
        assert!(parse_date(" 2026-09-01 ").is_ok());
        assert!(parse_date("01/09/2026").is_err());
        assert!(parse_time("start_time", "09:30").is_ok());
        assert!(parse_time("start_time", "930").is_err());
        assert!(parse_time("start_time", "25:00").is_err());
    }
}
