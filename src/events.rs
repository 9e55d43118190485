use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use libsql::Connection;
use uuid::Uuid;

use crate::auth::get_current_user;
use crate::budget;
use crate::constants::*;
use crate::models::{CreateEventPayload, Event, EventDto};
use crate::participants::{load_event_participants, participant_to_dto};
use crate::payments::{load_event_payments, payment_to_dto};
use crate::utils::{
    db_error, db_error_with_context, now_rfc3339, validate_budget_value, validate_optional_length,
    validate_string_length,
};
use crate::{AppState, with_transaction};

pub fn validate_event_payload(payload: &CreateEventPayload) -> Result<(), (StatusCode, String)> {
    validate_string_length(&payload.name, "Event name", MAX_EVENT_NAME_LENGTH)?;
    validate_optional_length(
        payload.description.as_deref(),
        "Description",
        MAX_DESCRIPTION_LENGTH,
    )?;
    validate_budget_value(payload.adult_budget, "Adult budget")?;
    validate_budget_value(payload.child_budget, "Child budget")?;
    if let Some(general_costs) = payload.general_costs {
        validate_budget_value(general_costs, "General costs")?;
    }
    Ok(())
}

pub fn extract_event_from_row(row: libsql::Row) -> Result<Event, (StatusCode, String)> {
    let id: String = row
        .get(0)
        .map_err(|_| db_error_with_context("invalid event data"))?;
    let name: String = row
        .get(1)
        .map_err(|_| db_error_with_context("invalid event data"))?;
    let description: Option<String> = row
        .get(2)
        .map_err(|_| db_error_with_context("invalid event data"))?;
    let adult_budget: f64 = row
        .get(3)
        .map_err(|_| db_error_with_context("invalid event data"))?;
    let child_budget: f64 = row
        .get(4)
        .map_err(|_| db_error_with_context("invalid event data"))?;
    let general_costs: f64 = row
        .get(5)
        .map_err(|_| db_error_with_context("invalid event data"))?;
    let creator_id: String = row
        .get(6)
        .map_err(|_| db_error_with_context("invalid event data"))?;
    let created_at: String = row
        .get(7)
        .map_err(|_| db_error_with_context("invalid event data"))?;

    Ok(Event {
        id,
        name,
        description,
        adult_budget,
        child_budget,
        general_costs,
        creator_id,
        created_at,
    })
}

const SELECT_EVENT: &str = "SELECT id, name, description, adult_budget, child_budget, \
     general_costs, creator_id, created_at FROM events WHERE id = ?";

pub async fn fetch_event(
    conn: &Connection,
    event_id: &str,
) -> Result<Option<Event>, (StatusCode, String)> {
    let mut rows = conn
        .query(SELECT_EVENT, [event_id])
        .await
        .map_err(|_| db_error_with_context("failed to query event"))?;

    match rows.next().await.map_err(|_| db_error())? {
        Some(row) => Ok(Some(extract_event_from_row(row)?)),
        None => Ok(None),
    }
}

/// Loads an event and checks ownership. Reads by non-owners get 404 so the
/// event's existence is not revealed; writes get 403.
pub async fn fetch_owned_event(
    conn: &Connection,
    event_id: &str,
    user_id: &str,
    write_denied_message: Option<&str>,
) -> Result<Event, (StatusCode, String)> {
    let event = fetch_event(conn, event_id)
        .await?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Event not found".to_string()))?;

    if event.creator_id != user_id {
        return Err(match write_denied_message {
            Some(message) => (StatusCode::FORBIDDEN, message.to_string()),
            None => (StatusCode::NOT_FOUND, "Event not found".to_string()),
        });
    }

    Ok(event)
}

/// Assembles the full response shape: nested participants (with their
/// calculated budgets), payments (with attribution display names), and the
/// derived totals. Recomputed on every read; the server is the sole owner of
/// these figures.
pub async fn build_event_dto(
    conn: &Connection,
    event: Event,
) -> Result<EventDto, (StatusCode, String)> {
    let participants = load_event_participants(conn, &event.id).await?;
    let payments = load_event_payments(conn, &event.id).await?;

    let total_budget = budget::total_budget(
        event.adult_budget,
        event.child_budget,
        event.general_costs,
        &participants,
    );
    let budget_per_payer = budget::budget_per_payer(
        event.adult_budget,
        event.child_budget,
        event.general_costs,
        &participants,
    );
    let number_of_payers = budget::number_of_payers(&participants);

    let payment_dtos = payments
        .into_iter()
        .map(|payment| payment_to_dto(payment, &participants))
        .collect();
    let participant_dtos = participants
        .iter()
        .map(|p| participant_to_dto(p.clone(), event.adult_budget, event.child_budget))
        .collect();

    Ok(EventDto {
        id: event.id,
        name: event.name,
        description: event.description,
        adult_budget: event.adult_budget,
        child_budget: event.child_budget,
        general_costs: event.general_costs,
        creator_id: event.creator_id,
        created_at: event.created_at,
        participants: participant_dtos,
        payments: payment_dtos,
        total_budget,
        budget_per_payer,
        number_of_payers,
    })
}

pub async fn create_event(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateEventPayload>,
) -> Result<(StatusCode, Json<EventDto>), (StatusCode, String)> {
    let user = get_current_user(&app_state.db, &headers).await?;
    validate_event_payload(&payload)?;

    let event_id = Uuid::new_v4().to_string();
    let created_at = now_rfc3339()?;
    let general_costs = payload.general_costs.unwrap_or(0.0);

    let conn = app_state.db.write().await;
    conn.execute(
        "INSERT INTO events (id, name, description, adult_budget, child_budget, general_costs, creator_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        (
            event_id.as_str(),
            payload.name.trim(),
            payload.description.as_deref(),
            payload.adult_budget,
            payload.child_budget,
            general_costs,
            user.id.as_str(),
            created_at.as_str(),
        ),
    )
    .await
    .map_err(|_| db_error_with_context("event creation failed"))?;

    let event = Event {
        id: event_id,
        name: payload.name.trim().to_string(),
        description: payload.description,
        adult_budget: payload.adult_budget,
        child_budget: payload.child_budget,
        general_costs,
        creator_id: user.id,
        created_at,
    };

    let dto = build_event_dto(&conn, event).await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

pub async fn list_events(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<Vec<EventDto>>), (StatusCode, String)> {
    let user = get_current_user(&app_state.db, &headers).await?;

    let conn = app_state.db.read().await;
    let mut rows = conn
        .query(
            "SELECT id, name, description, adult_budget, child_budget, general_costs, creator_id, created_at \
             FROM events WHERE creator_id = ? ORDER BY created_at DESC",
            [user.id.as_str()],
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to load events");
            db_error_with_context("failed to query events")
        })?;

    let mut events = Vec::new();
    while let Some(row) = rows.next().await.map_err(|_| db_error())? {
        events.push(extract_event_from_row(row)?);
    }

    let mut dtos = Vec::with_capacity(events.len());
    for event in events {
        dtos.push(build_event_dto(&conn, event).await?);
    }

    Ok((StatusCode::OK, Json(dtos)))
}

pub async fn get_event(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
) -> Result<(StatusCode, Json<EventDto>), (StatusCode, String)> {
    let user = get_current_user(&app_state.db, &headers).await?;

    let conn = app_state.db.read().await;
    let event = fetch_owned_event(&conn, &event_id, &user.id, None).await?;
    let dto = build_event_dto(&conn, event).await?;

    Ok((StatusCode::OK, Json(dto)))
}

pub async fn update_event(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
    Json(payload): Json<CreateEventPayload>,
) -> Result<(StatusCode, Json<EventDto>), (StatusCode, String)> {
    let user = get_current_user(&app_state.db, &headers).await?;
    validate_event_payload(&payload)?;

    let conn = app_state.db.write().await;
    let event = fetch_owned_event(
        &conn,
        &event_id,
        &user.id,
        Some("Not authorized to update this event"),
    )
    .await?;

    let general_costs = payload.general_costs.unwrap_or(0.0);
    let affected_rows = conn
        .execute(
            "UPDATE events SET name = ?, description = ?, adult_budget = ?, child_budget = ?, general_costs = ? \
             WHERE id = ?",
            (
                payload.name.trim(),
                payload.description.as_deref(),
                payload.adult_budget,
                payload.child_budget,
                general_costs,
                event_id.as_str(),
            ),
        )
        .await
        .map_err(|_| db_error_with_context("failed to update event"))?;

    if affected_rows == 0 {
        return Err((StatusCode::NOT_FOUND, "Event not found".to_string()));
    }

    let updated = Event {
        name: payload.name.trim().to_string(),
        description: payload.description,
        adult_budget: payload.adult_budget,
        child_budget: payload.child_budget,
        general_costs,
        ..event
    };

    let dto = build_event_dto(&conn, updated).await?;
    Ok((StatusCode::OK, Json(dto)))
}

pub async fn delete_event(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let user = get_current_user(&app_state.db, &headers).await?;

    {
        let conn = app_state.db.read().await;
        fetch_owned_event(
            &conn,
            &event_id,
            &user.id,
            Some("Not authorized to delete this event"),
        )
        .await?;
    }

    // The event exclusively owns its participants and payments, so the
    // delete cascades over all three tables in one transaction.
    with_transaction(&app_state.db, |conn| {
        let event_id = event_id.clone();
        Box::pin(async move {
            conn.execute(
                "DELETE FROM payments WHERE event_id = ?",
                [event_id.as_str()],
            )
            .await
            .map_err(|_| db_error_with_context("failed to delete payments"))?;

            conn.execute(
                "DELETE FROM participants WHERE event_id = ?",
                [event_id.as_str()],
            )
            .await
            .map_err(|_| db_error_with_context("failed to delete participants"))?;

            let affected_rows = conn
                .execute("DELETE FROM events WHERE id = ?", [event_id.as_str()])
                .await
                .map_err(|_| db_error_with_context("failed to delete event"))?;

            if affected_rows == 0 {
                return Err((StatusCode::NOT_FOUND, "Event not found".to_string()));
            }

            Ok(())
        })
    })
    .await?;

    tracing::info!(event_id = %event_id, "deleted event");

    Ok(StatusCode::NO_CONTENT)
}
