// src/routes/appointment_routes.rs

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ApiError, is_unique_violation},
    mailer,
    middleware::auth_context::AuthContext,
    models::{
        APPOINTMENT_CANCELLED, APPOINTMENT_CONFIRMED, ApiOk, AppState, ROLE_ADMIN,
        status_from_string, status_to_string, validate_email, validate_name,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(create_appointment))
        .route("/appointments/me", get(get_my_appointments))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment)
                .patch(patch_appointment)
                .delete(cancel_appointment),
        )
        .route(
            "/appointments/{appointment_id}/reschedule",
            post(reschedule_appointment),
        )
        .route("/appointments/admin/all", get(get_all_appointments))
        .route("/appointments/admin/manual", post(create_manual_appointment))
}

fn is_admin(auth: &AuthContext) -> bool {
    auth.role == ROLE_ADMIN
}

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if is_admin(auth) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admins can manage all appointments".into(),
        ))
    }
}

/* ============================================================
   Contact validation
   ============================================================ */

fn validate_phone(value: &str) -> Result<String, ApiError> {
    let v = value.trim();
    if v.len() < 10 || v.len() > 20 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "patient_phone must be 10-20 characters".into(),
        ));
    }
    Ok(v.to_string())
}

#[derive(Debug, Clone)]
struct Contact {
    first_name: String,
    last_name: String,
    phone: String,
    email: String,
}

fn validate_contact(
    first_name: &str,
    last_name: &str,
    phone: &str,
    email: &str,
) -> Result<Contact, ApiError> {
    Ok(Contact {
        first_name: validate_name("patient_first_name", first_name)?,
        last_name: validate_name("patient_last_name", last_name)?,
        phone: validate_phone(phone)?,
        email: validate_email("patient_email", email)?,
    })
}

/* ============================================================
   Response DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct DoctorBrief {
    pub doctor_id: Uuid,
    pub display: String,
    pub specialization: String,
    pub profile_photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SlotBrief {
    pub slot_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub is_available: bool,
}

#[derive(Debug, Serialize)]
pub struct AppointmentDto {
    pub appointment_id: Uuid,
    pub slot_id: Uuid,
    pub doctor_id: Uuid,
    pub user_id: Option<Uuid>,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub patient_phone: String,
    pub patient_email: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub doctor: DoctorBrief,
    pub slot: SlotBrief,
}

#[derive(Debug, sqlx::FromRow)]
struct DetailRow {
    appointment_id: Uuid,
    slot_id: Uuid,
    doctor_id: Uuid,
    user_id: Option<Uuid>,
    patient_first_name: String,
    patient_last_name: String,
    patient_phone: String,
    patient_email: String,
    status: i16,
    created_at: DateTime<Utc>,
    d_first: String,
    d_last: String,
    d_spec: String,
    d_photo: Option<String>,
    s_start: DateTime<Utc>,
    s_end: DateTime<Utc>,
    s_available: bool,
}

impl DetailRow {
    fn into_dto(self) -> AppointmentDto {
        AppointmentDto {
            appointment_id: self.appointment_id,
            slot_id: self.slot_id,
            doctor_id: self.doctor_id,
            user_id: self.user_id,
            patient_first_name: self.patient_first_name,
            patient_last_name: self.patient_last_name,
            patient_phone: self.patient_phone,
            patient_email: self.patient_email,
            status: status_to_string(self.status),
            created_at: self.created_at,
            doctor: DoctorBrief {
                doctor_id: self.doctor_id,
                display: format!("{} {}", self.d_first, self.d_last),
                specialization: self.d_spec,
                profile_photo_url: self.d_photo,
            },
            slot: SlotBrief {
                slot_id: self.slot_id,
                start_at: self.s_start,
                end_at: self.s_end,
                is_available: self.s_available,
            },
        }
    }
}

const DETAIL_SELECT: &str = r#"
    SELECT
      a.appointment_id, a.slot_id, a.doctor_id, a.user_id,
      a.patient_first_name, a.patient_last_name, a.patient_phone, a.patient_email,
      a.status, a.created_at,
      d.first_name AS d_first,
      d.last_name  AS d_last,
      d.specialization AS d_spec,
      d.profile_photo_url AS d_photo,
      s.start_at AS s_start,
      s.end_at   AS s_end,
      s.is_available AS s_available
    FROM appointment a
    JOIN doctor d ON d.doctor_id = a.doctor_id
    JOIN availability_slot s ON s.slot_id = a.slot_id
"#;

async fn load_detail(state: &AppState, appointment_id: Uuid) -> Result<DetailRow, ApiError> {
    sqlx::query_as::<_, DetailRow>(&format!("{DETAIL_SELECT} WHERE a.appointment_id = $1"))
        .bind(appointment_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "appointment not found".into()))
}

async fn send_mail_best_effort(state: &AppState, to: &str, subject: String, html: String) {
    if let Err(e) = state.mailer.send(to, &subject, &html).await {
        tracing::warn!(%to, "failed to send appointment email: {e}");
    }
}

fn slot_date_time(start_at: DateTime<Utc>) -> (String, String) {
    (
        start_at.format("%Y-%m-%d").to_string(),
        start_at.format("%H:%M").to_string(),
    )
}

/* ============================================================
   Booking core (shared by patient, manual and reschedule paths)
   ============================================================ */

#[derive(Debug, sqlx::FromRow)]
struct SlotForBooking {
    slot_id: Uuid,
    doctor_id: Uuid,
    start_at: DateTime<Utc>,
    is_available: bool,
    d_first: String,
    d_last: String,
    d_spec: String,
}

/// Lock a slot row and verify it can be booked. Runs inside the caller's
/// transaction; the row lock plus the partial unique index on confirmed
/// appointments are what prevent a double booking.
async fn lock_bookable_slot(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    slot_id: Uuid,
    require_future: bool,
) -> Result<SlotForBooking, ApiError> {
    let slot: SlotForBooking = sqlx::query_as::<_, SlotForBooking>(
        r#"
        SELECT s.slot_id, s.doctor_id, s.start_at, s.is_available,
               d.first_name AS d_first,
               d.last_name  AS d_last,
               d.specialization AS d_spec
        FROM availability_slot s
        JOIN doctor d ON d.doctor_id = s.doctor_id
        WHERE s.slot_id = $1
        FOR UPDATE OF s
        "#,
    )
    .bind(slot_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "slot not found".into()))?;

    if !slot.is_available {
        return Err(ApiError::Conflict(
            "SLOT_TAKEN",
            "slot is no longer available".into(),
        ));
    }
    if require_future && slot.start_at <= Utc::now() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "cannot book a slot in the past".into(),
        ));
    }
    Ok(slot)
}

async fn insert_appointment(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    slot: &SlotForBooking,
    user_id: Option<Uuid>,
    contact: &Contact,
) -> Result<Uuid, ApiError> {
    let appointment_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO appointment
            (slot_id, doctor_id, user_id,
             patient_first_name, patient_last_name, patient_phone, patient_email,
             status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 0)
        RETURNING appointment_id
        "#,
    )
    .bind(slot.slot_id)
    .bind(slot.doctor_id)
    .bind(user_id)
    .bind(&contact.first_name)
    .bind(&contact.last_name)
    .bind(&contact.phone)
    .bind(&contact.email)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("SLOT_TAKEN", "slot is no longer available".into())
        } else {
            ApiError::db(e)
        }
    })?;

    sqlx::query(
        r#"
        UPDATE availability_slot
        SET is_available = false
        WHERE slot_id = $1
        "#,
    )
    .bind(slot.slot_id)
    .execute(&mut **tx)
    .await
    .map_err(ApiError::db)?;

    Ok(appointment_id)
}

async fn send_confirmation(state: &AppState, slot: &SlotForBooking, contact: &Contact) {
    let (date, time) = slot_date_time(slot.start_at);
    let (subject, html) = mailer::confirmation_email(
        &state.clinic_name,
        &format!("{} {}", contact.first_name, contact.last_name),
        &format!("{} {}", slot.d_first, slot.d_last),
        &slot.d_spec,
        &date,
        &time,
    );
    send_mail_best_effort(state, &contact.email, subject, html).await;
}

/* ============================================================
   POST /appointments (patient booking)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub slot_id: Uuid,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub patient_phone: String,
    pub patient_email: String,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let contact = validate_contact(
        &req.patient_first_name,
        &req.patient_last_name,
        &req.patient_phone,
        &req.patient_email,
    )?;

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;
    let slot = lock_bookable_slot(&mut tx, req.slot_id, true).await?;
    let appointment_id = insert_appointment(&mut tx, &slot, Some(auth.user_id), &contact).await?;
    tx.commit().await.map_err(ApiError::db)?;

    send_confirmation(&state, &slot, &contact).await;

    let detail = load_detail(&state, appointment_id).await?;
    Ok(Json(ApiOk {
        data: detail.into_dto(),
    }))
}

/* ============================================================
   POST /appointments/admin/manual (phone / walk-in booking)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ManualAppointmentRequest {
    pub slot_id: Uuid,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub patient_phone: String,
    pub patient_email: String,
    /// Optional link to an existing patient account.
    pub user_id: Option<Uuid>,
}

pub async fn create_manual_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ManualAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    ensure_admin(&auth)?;

    let contact = validate_contact(
        &req.patient_first_name,
        &req.patient_last_name,
        &req.patient_phone,
        &req.patient_email,
    )?;

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;
    // Staff may also record a booking for a slot that just started.
    let slot = lock_bookable_slot(&mut tx, req.slot_id, false).await?;
    let appointment_id = insert_appointment(&mut tx, &slot, req.user_id, &contact).await?;
    tx.commit().await.map_err(ApiError::db)?;

    send_confirmation(&state, &slot, &contact).await;

    let detail = load_detail(&state, appointment_id).await?;
    Ok(Json(ApiOk {
        data: detail.into_dto(),
    }))
}

/* ============================================================
   GET /appointments/me, GET /appointments/{id}
   ============================================================ */

pub async fn get_my_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<AppointmentDto>>>, ApiError> {
    let rows: Vec<DetailRow> = sqlx::query_as::<_, DetailRow>(&format!(
        "{DETAIL_SELECT} WHERE a.user_id = $1 ORDER BY a.created_at DESC"
    ))
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: rows.into_iter().map(DetailRow::into_dto).collect(),
    }))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let detail = load_detail(&state, appointment_id).await?;

    if !is_admin(&auth) && detail.user_id != Some(auth.user_id) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You cannot access another user's appointment".into(),
        ));
    }

    Ok(Json(ApiOk {
        data: detail.into_dto(),
    }))
}

/* ============================================================
   PATCH /appointments/{id} (contact details)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub patient_first_name: Option<String>,
    pub patient_last_name: Option<String>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
}

pub async fn patch_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let existing = load_detail(&state, appointment_id).await?;

    if !is_admin(&auth) && existing.user_id != Some(auth.user_id) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You cannot modify another user's appointment".into(),
        ));
    }

    if req.patient_first_name.is_none()
        && req.patient_last_name.is_none()
        && req.patient_phone.is_none()
        && req.patient_email.is_none()
    {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "nothing to update".into(),
        ));
    }

    let first_name = match &req.patient_first_name {
        Some(v) => Some(validate_name("patient_first_name", v)?),
        None => None,
    };
    let last_name = match &req.patient_last_name {
        Some(v) => Some(validate_name("patient_last_name", v)?),
        None => None,
    };
    let phone = match &req.patient_phone {
        Some(v) => Some(validate_phone(v)?),
        None => None,
    };
    let email = match &req.patient_email {
        Some(v) => Some(validate_email("patient_email", v)?),
        None => None,
    };

    sqlx::query(
        r#"
        UPDATE appointment
        SET patient_first_name = COALESCE($2, patient_first_name),
            patient_last_name  = COALESCE($3, patient_last_name),
            patient_phone      = COALESCE($4, patient_phone),
            patient_email      = COALESCE($5, patient_email),
            updated_at = now()
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .bind(first_name)
    .bind(last_name)
    .bind(phone)
    .bind(email)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    let detail = load_detail(&state, appointment_id).await?;
    Ok(Json(ApiOk {
        data: detail.into_dto(),
    }))
}

/* ============================================================
   POST /appointments/{id}/reschedule
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub slot_id: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct AppointmentLockRow {
    user_id: Option<Uuid>,
    slot_id: Uuid,
    status: i16,
    s_start: DateTime<Utc>,
}

async fn lock_appointment(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    appointment_id: Uuid,
) -> Result<AppointmentLockRow, ApiError> {
    sqlx::query_as::<_, AppointmentLockRow>(
        r#"
        SELECT a.user_id, a.slot_id, a.status, s.start_at AS s_start
        FROM appointment a
        JOIN availability_slot s ON s.slot_id = a.slot_id
        WHERE a.appointment_id = $1
        FOR UPDATE OF a
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "appointment not found".into()))
}

/// Move a confirmed appointment to another open slot. The old slot is freed
/// and the new one claimed in the same transaction; the appointment follows
/// the new slot's doctor.
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let appointment = lock_appointment(&mut tx, appointment_id).await?;

    if !is_admin(&auth) && appointment.user_id != Some(auth.user_id) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You cannot reschedule another user's appointment".into(),
        ));
    }
    if appointment.status != APPOINTMENT_CONFIRMED {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "only confirmed appointments can be rescheduled".into(),
        ));
    }
    if !is_admin(&auth) && appointment.s_start <= Utc::now() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "cannot reschedule a past appointment".into(),
        ));
    }
    if appointment.slot_id == req.slot_id {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "appointment already uses this slot".into(),
        ));
    }

    let new_slot = lock_bookable_slot(&mut tx, req.slot_id, true).await?;

    sqlx::query(
        r#"
        UPDATE availability_slot
        SET is_available = true
        WHERE slot_id = $1
        "#,
    )
    .bind(appointment.slot_id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    sqlx::query(
        r#"
        UPDATE availability_slot
        SET is_available = false
        WHERE slot_id = $1
        "#,
    )
    .bind(new_slot.slot_id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    sqlx::query(
        r#"
        UPDATE appointment
        SET slot_id = $2,
            doctor_id = $3,
            updated_at = now()
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .bind(new_slot.slot_id)
    .bind(new_slot.doctor_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("SLOT_TAKEN", "slot is no longer available".into())
        } else {
            ApiError::db(e)
        }
    })?;

    tx.commit().await.map_err(ApiError::db)?;

    let detail = load_detail(&state, appointment_id).await?;
    let contact = Contact {
        first_name: detail.patient_first_name.clone(),
        last_name: detail.patient_last_name.clone(),
        phone: detail.patient_phone.clone(),
        email: detail.patient_email.clone(),
    };
    send_confirmation(&state, &new_slot, &contact).await;

    Ok(Json(ApiOk {
        data: detail.into_dto(),
    }))
}

/* ============================================================
   DELETE /appointments/{id} (cancel)
   ============================================================ */

pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let appointment = lock_appointment(&mut tx, appointment_id).await?;

    let owned = appointment.user_id == Some(auth.user_id);
    if !is_admin(&auth) {
        if !owned {
            return Err(ApiError::Forbidden(
                "FORBIDDEN",
                "You cannot cancel another user's appointment".into(),
            ));
        }
        if appointment.s_start <= Utc::now() {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "cannot cancel a past appointment".into(),
            ));
        }
    }
    if appointment.status == APPOINTMENT_CANCELLED {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "appointment is already cancelled".into(),
        ));
    }

    sqlx::query(
        r#"
        UPDATE appointment
        SET status = 1,
            updated_at = now()
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    sqlx::query(
        r#"
        UPDATE availability_slot
        SET is_available = true
        WHERE slot_id = $1
        "#,
    )
    .bind(appointment.slot_id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    let detail = load_detail(&state, appointment_id).await?;
    let (date, time) = slot_date_time(detail.s_start);
    let (subject, html) = mailer::cancellation_email(
        &state.clinic_name,
        &format!("{} {}", detail.patient_first_name, detail.patient_last_name),
        &format!("{} {}", detail.d_first, detail.d_last),
        &date,
        &time,
        is_admin(&auth) && !owned,
    );
    send_mail_best_effort(&state, &detail.patient_email, subject, html).await;

    Ok(Json(ApiOk {
        data: detail.into_dto(),
    }))
}

/* ============================================================
   GET /appointments/admin/all
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct AllAppointmentsQuery {
    pub doctor_id: Option<Uuid>,
    /// YYYY-MM-DD; with date_end forms an inclusive date range.
    pub date: Option<String>,
    pub date_end: Option<String>,
    /// "confirmed" | "cancelled"
    pub status: Option<String>,
}

fn parse_day(field: &'static str, s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("VALIDATION_ERROR", format!("{field} must be YYYY-MM-DD")))
}

fn date_range(
    date: Option<&str>,
    date_end: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ApiError> {
    let start = match date {
        Some(s) => Some(parse_day("date", s)?),
        None => None,
    };
    let end = match date_end {
        Some(s) => Some(parse_day("date_end", s)?),
        None => start, // single-day filter when only `date` is given
    };
    let to_ts = |d: NaiveDate| {
        DateTime::<Utc>::from_naive_utc_and_offset(d.and_hms_opt(0, 0, 0).unwrap(), Utc)
    };
    Ok((
        start.map(to_ts),
        end.map(|d| to_ts(d) + Duration::days(1)),
    ))
}

pub async fn get_all_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<AllAppointmentsQuery>,
) -> Result<Json<ApiOk<Vec<AppointmentDto>>>, ApiError> {
    ensure_admin(&auth)?;

    let status = match q.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(status_from_string(s).ok_or_else(|| {
            ApiError::BadRequest(
                "VALIDATION_ERROR",
                "status must be 'confirmed' or 'cancelled'".into(),
            )
        })?),
        None => None,
    };
    let (range_start, range_end) = date_range(q.date.as_deref(), q.date_end.as_deref())?;

    let rows: Vec<DetailRow> = sqlx::query_as::<_, DetailRow>(&format!(
        r#"
        {DETAIL_SELECT}
        WHERE ($1::uuid IS NULL OR a.doctor_id = $1)
          AND ($2::smallint IS NULL OR a.status = $2)
          AND ($3::timestamptz IS NULL OR s.start_at >= $3)
          AND ($4::timestamptz IS NULL OR s.start_at < $4)
        ORDER BY s.start_at ASC
        "#
    ))
    .bind(q.doctor_id)
    .bind(status)
    .bind(range_start)
    .bind(range_end)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: rows.into_iter().map(DetailRow::into_dto).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone_bounds() {
        assert!(validate_phone("0123456789").is_ok()); // 10 chars
        assert!(validate_phone("+39 02 1234 5678").is_ok());
        assert!(validate_phone("012345678").is_err()); // 9 chars
        assert!(validate_phone(&"9".repeat(21)).is_err());
    }

    #[test]
    fn test_validate_contact_trims_and_normalizes() {
        let c = validate_contact(" Ada ", " Lovelace ", " 0123456789 ", " Ada@Example.COM ").unwrap();
        assert_eq!(c.first_name, "Ada");
        assert_eq!(c.last_name, "Lovelace");
        assert_eq!(c.phone, "0123456789");
        assert_eq!(c.email, "ada@example.com");
    }

    #[test]
    fn test_validate_contact_rejects_bad_email() {
        assert!(validate_contact("A", "B", "0123456789", "nope").is_err());
        assert!(validate_contact("", "B", "0123456789", "a@b.example").is_err());
    }

    #[test]
    fn test_date_range_single_day() {
        let (start, end) = date_range(Some("2026-09-01"), None).unwrap();
        let start = start.unwrap();
        let end = end.unwrap();
        assert_eq!(end - start, Duration::days(1));
        assert_eq!(start.format("%Y-%m-%d %H:%M").to_string(), "2026-09-01 00:00");
    }

    #[test]
    fn test_date_range_span() {
        let (start, end) = date_range(Some("2026-09-01"), Some("2026-09-03")).unwrap();
        assert_eq!(end.unwrap() - start.unwrap(), Duration::days(3)); // inclusive end
    }

    #[test]
    fn test_date_range_open() {
        let (start, end) = date_range(None, None).unwrap();
        assert!(start.is_none());
        assert!(end.is_none());
    }

    #[test]
    fn test_date_range_rejects_garbage() {
        assert!(date_range(Some("01-09-2026"), None).is_err());
        assert!(date_range(Some("2026-09-01"), Some("soon")).is_err());
    }
}
