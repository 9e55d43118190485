use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use libsql::Connection;
use uuid::Uuid;

use crate::AppState;
use crate::auth::get_current_user;
use crate::constants::*;
use crate::events::fetch_owned_event;
use crate::models::{CreatePaymentPayload, Participant, Payment, PaymentDto};
use crate::participants::fetch_participant;
use crate::utils::{
    db_error, db_error_with_context, now_rfc3339, validate_optional_length,
};

pub fn validate_payment_amount(amount: f64) -> Result<(), (StatusCode, String)> {
    if !amount.is_finite() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Payment amount must be a valid finite number".to_string(),
        ));
    }
    if amount < MIN_PAYMENT_AMOUNT {
        return Err((
            StatusCode::BAD_REQUEST,
            "Payment amount must be positive".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_payment_payload(
    payload: &CreatePaymentPayload,
) -> Result<(), (StatusCode, String)> {
    validate_payment_amount(payload.amount)?;
    validate_optional_length(
        payload.payer_name.as_deref(),
        "Payer name",
        MAX_PAYER_NAME_LENGTH,
    )?;
    validate_optional_length(payload.note.as_deref(), "Note", MAX_NOTE_LENGTH)?;
    Ok(())
}

pub fn extract_payment_from_row(row: libsql::Row) -> Result<Payment, (StatusCode, String)> {
    let id: String = row
        .get(0)
        .map_err(|_| db_error_with_context("invalid payment data"))?;
    let event_id: String = row
        .get(1)
        .map_err(|_| db_error_with_context("invalid payment data"))?;
    let amount: f64 = row
        .get(2)
        .map_err(|_| db_error_with_context("invalid payment data"))?;
    let payer_name: Option<String> = row
        .get(3)
        .map_err(|_| db_error_with_context("invalid payment data"))?;
    let note: Option<String> = row
        .get(4)
        .map_err(|_| db_error_with_context("invalid payment data"))?;
    let participant_id: Option<String> = row
        .get(5)
        .map_err(|_| db_error_with_context("invalid payment data"))?;
    let created_at: String = row
        .get(6)
        .map_err(|_| db_error_with_context("invalid payment data"))?;

    Ok(Payment {
        id,
        event_id,
        amount,
        payer_name,
        note,
        participant_id,
        created_at,
    })
}

const SELECT_PAYMENT: &str = "SELECT id, event_id, amount, payer_name, note, participant_id, \
     created_at FROM payments";

pub async fn fetch_payment(
    conn: &Connection,
    payment_id: &str,
) -> Result<Option<Payment>, (StatusCode, String)> {
    let query = format!("{} WHERE id = ?", SELECT_PAYMENT);
    let mut rows = conn
        .query(&query, [payment_id])
        .await
        .map_err(|_| db_error_with_context("failed to query payment"))?;

    match rows.next().await.map_err(|_| db_error())? {
        Some(row) => Ok(Some(extract_payment_from_row(row)?)),
        None => Ok(None),
    }
}

pub async fn load_event_payments(
    conn: &Connection,
    event_id: &str,
) -> Result<Vec<Payment>, (StatusCode, String)> {
    let query = format!(
        "{} WHERE event_id = ? ORDER BY created_at DESC, rowid DESC",
        SELECT_PAYMENT
    );
    let mut rows = conn
        .query(&query, [event_id])
        .await
        .map_err(|_| db_error_with_context("failed to query payments"))?;

    let mut payments = Vec::new();
    while let Some(row) = rows.next().await.map_err(|_| db_error())? {
        payments.push(extract_payment_from_row(row)?);
    }
    Ok(payments)
}

/// Display mapping: when the payment is attributed, the response also names
/// the participant and, for couples, the partner. A reference to a
/// participant that is no longer in the list simply yields no names.
pub fn payment_to_dto(payment: Payment, participants: &[Participant]) -> PaymentDto {
    let participant = payment
        .participant_id
        .as_ref()
        .and_then(|id| participants.iter().find(|p| &p.id == id));
    let partner = participant
        .and_then(|p| p.partner_id.as_ref())
        .and_then(|id| participants.iter().find(|p| &p.id == id));

    PaymentDto {
        id: payment.id,
        event_id: payment.event_id,
        amount: payment.amount,
        payer_name: payment.payer_name,
        note: payment.note,
        participant_id: payment.participant_id,
        participant_name: participant.map(|p| p.name.clone()),
        partner_id: partner.map(|p| p.id.clone()),
        partner_name: partner.map(|p| p.name.clone()),
        created_at: payment.created_at,
    }
}

/// Resolves the attributed participant (if any) and the effective payer
/// name. A blank or missing payer name is replaced by the participant's name
/// at write time; later renames leave stored payments untouched.
async fn resolve_attribution(
    conn: &Connection,
    event_id: &str,
    payload: &CreatePaymentPayload,
) -> Result<(Option<Participant>, Option<String>), (StatusCode, String)> {
    let participant = match payload.participant_id {
        Some(ref participant_id) => {
            let participant = fetch_participant(conn, participant_id)
                .await?
                .ok_or_else(|| {
                    (StatusCode::BAD_REQUEST, "Participant not found".to_string())
                })?;
            if participant.event_id != event_id {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "Participant does not belong to this event".to_string(),
                ));
            }
            Some(participant)
        }
        None => None,
    };

    let payer_name = match payload.payer_name {
        Some(ref name) if !name.trim().is_empty() => Some(name.trim().to_string()),
        _ => participant.as_ref().map(|p| p.name.clone()),
    };

    Ok((participant, payer_name))
}

/// Builds the response for a single payment, loading the partner row when
/// the attributed participant is part of a couple.
async fn payment_response(
    conn: &Connection,
    payment: Payment,
    participant: Option<Participant>,
) -> Result<PaymentDto, (StatusCode, String)> {
    let mut related = Vec::new();
    if let Some(participant) = participant {
        if let Some(ref partner_id) = participant.partner_id {
            if let Some(partner) = fetch_participant(conn, partner_id).await? {
                related.push(partner);
            }
        }
        related.push(participant);
    }
    Ok(payment_to_dto(payment, &related))
}

pub async fn create_payment(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
    Json(payload): Json<CreatePaymentPayload>,
) -> Result<(StatusCode, Json<PaymentDto>), (StatusCode, String)> {
    let user = get_current_user(&app_state.db, &headers).await?;
    validate_payment_payload(&payload)?;

    let conn = app_state.db.write().await;
    fetch_owned_event(
        &conn,
        &event_id,
        &user.id,
        Some("Not authorized to add payments to this event"),
    )
    .await?;

    let (participant, payer_name) = resolve_attribution(&conn, &event_id, &payload).await?;

    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        event_id: event_id.clone(),
        amount: payload.amount,
        payer_name,
        note: payload.note.clone(),
        participant_id: payload.participant_id.clone(),
        created_at: now_rfc3339()?,
    };

    conn.execute(
        "INSERT INTO payments (id, event_id, amount, payer_name, note, participant_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        (
            payment.id.as_str(),
            payment.event_id.as_str(),
            payment.amount,
            payment.payer_name.as_deref(),
            payment.note.as_deref(),
            payment.participant_id.as_deref(),
            payment.created_at.as_str(),
        ),
    )
    .await
    .map_err(|_| db_error_with_context("payment creation failed"))?;

    let dto = payment_response(&conn, payment, participant).await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

pub async fn update_payment(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path((event_id, payment_id)): Path<(String, String)>,
    Json(payload): Json<CreatePaymentPayload>,
) -> Result<(StatusCode, Json<PaymentDto>), (StatusCode, String)> {
    let user = get_current_user(&app_state.db, &headers).await?;
    validate_payment_payload(&payload)?;

    let conn = app_state.db.write().await;
    fetch_owned_event(
        &conn,
        &event_id,
        &user.id,
        Some("Not authorized to update this payment"),
    )
    .await?;

    let existing = fetch_payment(&conn, &payment_id)
        .await?
        .filter(|p| p.event_id == event_id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Payment not found".to_string()))?;

    let (participant, payer_name) = resolve_attribution(&conn, &event_id, &payload).await?;

    let affected_rows = conn
        .execute(
            "UPDATE payments SET amount = ?, payer_name = ?, note = ?, participant_id = ? WHERE id = ?",
            (
                payload.amount,
                payer_name.as_deref(),
                payload.note.as_deref(),
                payload.participant_id.as_deref(),
                payment_id.as_str(),
            ),
        )
        .await
        .map_err(|_| db_error_with_context("failed to update payment"))?;

    if affected_rows == 0 {
        return Err((StatusCode::NOT_FOUND, "Payment not found".to_string()));
    }

    let updated = Payment {
        amount: payload.amount,
        payer_name,
        note: payload.note,
        participant_id: payload.participant_id,
        ..existing
    };

    let dto = payment_response(&conn, updated, participant).await?;
    Ok((StatusCode::OK, Json(dto)))
}

pub async fn delete_payment(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path((event_id, payment_id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    let user = get_current_user(&app_state.db, &headers).await?;

    let conn = app_state.db.write().await;
    fetch_owned_event(
        &conn,
        &event_id,
        &user.id,
        Some("Not authorized to delete this payment"),
    )
    .await?;

    let affected_rows = conn
        .execute(
            "DELETE FROM payments WHERE id = ? AND event_id = ?",
            (payment_id.as_str(), event_id.as_str()),
        )
        .await
        .map_err(|_| db_error_with_context("failed to delete payment"))?;

    if affected_rows == 0 {
        return Err((StatusCode::NOT_FOUND, "Payment not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
