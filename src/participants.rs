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
use crate::events::fetch_owned_event;
use crate::models::{CreateParticipantPayload, Participant, ParticipantDto, ParticipantType};
use crate::utils::{
    db_error, db_error_with_context, validate_budget_value, validate_string_length,
};
use crate::{AppState, with_transaction};

pub fn validate_participant_payload(
    payload: &CreateParticipantPayload,
) -> Result<(), (StatusCode, String)> {
    validate_string_length(&payload.name, "Participant name", MAX_PARTICIPANT_NAME_LENGTH)?;
    if let Some(custom_budget) = payload.custom_budget {
        validate_budget_value(custom_budget, "Custom budget")?;
    }
    Ok(())
}

pub fn extract_participant_from_row(row: libsql::Row) -> Result<Participant, (StatusCode, String)> {
    let id: String = row
        .get(0)
        .map_err(|_| db_error_with_context("invalid participant data"))?;
    let event_id: String = row
        .get(1)
        .map_err(|_| db_error_with_context("invalid participant data"))?;
    let name: String = row
        .get(2)
        .map_err(|_| db_error_with_context("invalid participant data"))?;
    let kind_raw: String = row
        .get(3)
        .map_err(|_| db_error_with_context("invalid participant data"))?;
    let kind = ParticipantType::parse(&kind_raw)
        .ok_or_else(|| db_error_with_context("invalid participant type"))?;
    let custom_budget: Option<f64> = row
        .get(4)
        .map_err(|_| db_error_with_context("invalid participant data"))?;
    let is_couple: bool = row
        .get(5)
        .map_err(|_| db_error_with_context("invalid participant data"))?;
    let partner_id: Option<String> = row
        .get(6)
        .map_err(|_| db_error_with_context("invalid participant data"))?;
    let user_id: Option<String> = row
        .get(7)
        .map_err(|_| db_error_with_context("invalid participant data"))?;

    Ok(Participant {
        id,
        event_id,
        name,
        kind,
        custom_budget,
        is_couple,
        partner_id,
        user_id,
    })
}

const SELECT_PARTICIPANT: &str = "SELECT id, event_id, name, type, custom_budget, is_couple, \
     partner_id, user_id FROM participants";

pub async fn fetch_participant(
    conn: &Connection,
    participant_id: &str,
) -> Result<Option<Participant>, (StatusCode, String)> {
    let query = format!("{} WHERE id = ?", SELECT_PARTICIPANT);
    let mut rows = conn
        .query(&query, [participant_id])
        .await
        .map_err(|_| db_error_with_context("failed to query participant"))?;

    match rows.next().await.map_err(|_| db_error())? {
        Some(row) => Ok(Some(extract_participant_from_row(row)?)),
        None => Ok(None),
    }
}

pub async fn load_event_participants(
    conn: &Connection,
    event_id: &str,
) -> Result<Vec<Participant>, (StatusCode, String)> {
    let query = format!("{} WHERE event_id = ? ORDER BY rowid", SELECT_PARTICIPANT);
    let mut rows = conn
        .query(&query, [event_id])
        .await
        .map_err(|_| db_error_with_context("failed to query participants"))?;

    let mut participants = Vec::new();
    while let Some(row) = rows.next().await.map_err(|_| db_error())? {
        participants.push(extract_participant_from_row(row)?);
    }
    Ok(participants)
}

pub fn participant_to_dto(
    participant: Participant,
    adult_budget: f64,
    child_budget: f64,
) -> ParticipantDto {
    let calculated_budget = budget::participant_budget(&participant, adult_budget, child_budget);
    ParticipantDto {
        id: participant.id,
        event_id: participant.event_id,
        name: participant.name,
        kind: participant.kind,
        custom_budget: participant.custom_budget,
        is_couple: participant.is_couple,
        partner_id: participant.partner_id,
        user_id: participant.user_id,
        calculated_budget,
    }
}

/// Validates a requested partner link: the partner must exist in the same
/// event, be an adult, and not be the participant itself.
async fn validate_partner(
    conn: &Connection,
    event_id: &str,
    partner_id: &str,
    participant_id: Option<&str>,
) -> Result<Participant, (StatusCode, String)> {
    if participant_id == Some(partner_id) {
        return Err((
            StatusCode::BAD_REQUEST,
            "A participant cannot be their own partner".to_string(),
        ));
    }

    let partner = fetch_participant(conn, partner_id)
        .await?
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "Partner not found".to_string()))?;

    if partner.event_id != event_id {
        return Err((
            StatusCode::BAD_REQUEST,
            "Partners must belong to the same event".to_string(),
        ));
    }
    if partner.kind != ParticipantType::Adult {
        return Err((
            StatusCode::BAD_REQUEST,
            "Only adult participants can be selected as partners".to_string(),
        ));
    }

    Ok(partner)
}

async fn validate_user_exists(conn: &Connection, user_id: &str) -> Result<(), (StatusCode, String)> {
    let mut rows = conn
        .query("SELECT id FROM users WHERE id = ?", [user_id])
        .await
        .map_err(|_| db_error_with_context("failed to check user existence"))?;
    if rows.next().await.map_err(|_| db_error())?.is_none() {
        return Err((StatusCode::BAD_REQUEST, "User not found".to_string()));
    }
    Ok(())
}

async fn clear_partner_link(
    conn: &Connection,
    participant_id: &str,
) -> Result<(), (StatusCode, String)> {
    conn.execute(
        "UPDATE participants SET partner_id = NULL, is_couple = 0 WHERE id = ?",
        [participant_id],
    )
    .await
    .map_err(|_| db_error_with_context("failed to clear partner link"))?;
    Ok(())
}

/// Points `partner` back at `participant_id`, dissolving any pair the
/// partner was previously in. Both sides of a couple always reference each
/// other; this is the server's half of the pairing invariant.
async fn link_partner(
    conn: &Connection,
    partner: &Participant,
    participant_id: &str,
) -> Result<(), (StatusCode, String)> {
    if let Some(ref previous) = partner.partner_id {
        if previous != participant_id {
            clear_partner_link(conn, previous).await?;
        }
    }
    conn.execute(
        "UPDATE participants SET partner_id = ?, is_couple = 1 WHERE id = ?",
        (participant_id, partner.id.as_str()),
    )
    .await
    .map_err(|_| db_error_with_context("failed to link partner"))?;
    Ok(())
}

pub async fn create_participant(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
    Json(payload): Json<CreateParticipantPayload>,
) -> Result<(StatusCode, Json<ParticipantDto>), (StatusCode, String)> {
    let user = get_current_user(&app_state.db, &headers).await?;
    validate_participant_payload(&payload)?;

    let (event, partner) = {
        let conn = app_state.db.read().await;
        let event = fetch_owned_event(
            &conn,
            &event_id,
            &user.id,
            Some("Not authorized to add participants to this event"),
        )
        .await?;

        let partner = match payload.partner_id {
            Some(ref partner_id) => {
                Some(validate_partner(&conn, &event_id, partner_id, None).await?)
            }
            None => None,
        };

        if let Some(ref linked_user) = payload.user_id {
            validate_user_exists(&conn, linked_user).await?;
        }

        (event, partner)
    };

    let participant = Participant {
        id: Uuid::new_v4().to_string(),
        event_id: event_id.clone(),
        name: payload.name.trim().to_string(),
        kind: payload.kind,
        custom_budget: payload.custom_budget,
        // The couple flag is derived, never taken from the request
        is_couple: payload.partner_id.is_some(),
        partner_id: payload.partner_id.clone(),
        user_id: payload.user_id.clone(),
    };

    with_transaction(&app_state.db, |conn| {
        let participant = participant.clone();
        let partner = partner.clone();
        Box::pin(async move {
            conn.execute(
                "INSERT INTO participants (id, event_id, name, type, custom_budget, is_couple, partner_id, user_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    participant.id.as_str(),
                    participant.event_id.as_str(),
                    participant.name.as_str(),
                    participant.kind.as_str(),
                    participant.custom_budget,
                    participant.is_couple,
                    participant.partner_id.as_deref(),
                    participant.user_id.as_deref(),
                ),
            )
            .await
            .map_err(|_| db_error_with_context("participant creation failed"))?;

            if let Some(ref partner) = partner {
                link_partner(conn, partner, &participant.id).await?;
            }

            Ok::<(), (StatusCode, String)>(())
        })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(participant_to_dto(
            participant,
            event.adult_budget,
            event.child_budget,
        )),
    ))
}

pub async fn update_participant(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path((event_id, participant_id)): Path<(String, String)>,
    Json(payload): Json<CreateParticipantPayload>,
) -> Result<(StatusCode, Json<ParticipantDto>), (StatusCode, String)> {
    let user = get_current_user(&app_state.db, &headers).await?;
    validate_participant_payload(&payload)?;

    let (event, existing, partner) = {
        let conn = app_state.db.read().await;
        let event = fetch_owned_event(
            &conn,
            &event_id,
            &user.id,
            Some("Not authorized to update this participant"),
        )
        .await?;

        let existing = fetch_participant(&conn, &participant_id)
            .await?
            .filter(|p| p.event_id == event_id)
            .ok_or_else(|| (StatusCode::NOT_FOUND, "Participant not found".to_string()))?;

        let partner = match payload.partner_id {
            Some(ref partner_id) => Some(
                validate_partner(&conn, &event_id, partner_id, Some(participant_id.as_str()))
                    .await?,
            ),
            None => None,
        };

        if let Some(ref linked_user) = payload.user_id {
            validate_user_exists(&conn, linked_user).await?;
        }

        (event, existing, partner)
    };

    let updated = Participant {
        id: existing.id.clone(),
        event_id: existing.event_id.clone(),
        name: payload.name.trim().to_string(),
        kind: payload.kind,
        custom_budget: payload.custom_budget,
        is_couple: payload.partner_id.is_some(),
        partner_id: payload.partner_id.clone(),
        user_id: payload.user_id.clone(),
    };

    with_transaction(&app_state.db, |conn| {
        let existing = existing.clone();
        let updated = updated.clone();
        let partner = partner.clone();
        Box::pin(async move {
            // Dissolve the previous pair when the partner changed or was removed
            if let Some(ref old_partner) = existing.partner_id {
                if updated.partner_id.as_ref() != Some(old_partner) {
                    clear_partner_link(conn, old_partner).await?;
                }
            }

            if let Some(ref partner) = partner {
                link_partner(conn, partner, &updated.id).await?;
            }

            let affected_rows = conn
                .execute(
                    "UPDATE participants SET name = ?, type = ?, custom_budget = ?, is_couple = ?, \
                     partner_id = ?, user_id = ? WHERE id = ?",
                    (
                        updated.name.as_str(),
                        updated.kind.as_str(),
                        updated.custom_budget,
                        updated.is_couple,
                        updated.partner_id.as_deref(),
                        updated.user_id.as_deref(),
                        updated.id.as_str(),
                    ),
                )
                .await
                .map_err(|_| db_error_with_context("failed to update participant"))?;

            if affected_rows == 0 {
                return Err((StatusCode::NOT_FOUND, "Participant not found".to_string()));
            }

            Ok(())
        })
    })
    .await?;

    Ok((
        StatusCode::OK,
        Json(participant_to_dto(
            updated,
            event.adult_budget,
            event.child_budget,
        )),
    ))
}

pub async fn delete_participant(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path((event_id, participant_id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    let user = get_current_user(&app_state.db, &headers).await?;

    let existing = {
        let conn = app_state.db.read().await;
        fetch_owned_event(
            &conn,
            &event_id,
            &user.id,
            Some("Not authorized to delete this participant"),
        )
        .await?;

        fetch_participant(&conn, &participant_id)
            .await?
            .filter(|p| p.event_id == event_id)
            .ok_or_else(|| (StatusCode::NOT_FOUND, "Participant not found".to_string()))?
    };

    with_transaction(&app_state.db, |conn| {
        let existing = existing.clone();
        Box::pin(async move {
            // A deleted participant must not linger as anyone's partner or
            // as a payment attribution
            if let Some(ref partner_id) = existing.partner_id {
                clear_partner_link(conn, partner_id).await?;
            }

            conn.execute(
                "UPDATE payments SET participant_id = NULL WHERE participant_id = ?",
                [existing.id.as_str()],
            )
            .await
            .map_err(|_| db_error_with_context("failed to detach payments"))?;

            let affected_rows = conn
                .execute(
                    "DELETE FROM participants WHERE id = ?",
                    [existing.id.as_str()],
                )
                .await
                .map_err(|_| db_error_with_context("failed to delete participant"))?;

            if affected_rows == 0 {
                return Err((StatusCode::NOT_FOUND, "Participant not found".to_string()));
            }

            Ok(())
        })
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
