use axum::http::StatusCode;

use crate::constants::*;

pub fn db_error() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ERR_DATABASE_OPERATION.to_string(),
    )
}

pub fn db_error_with_context(context: &str) -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Database error: {}", context),
    )
}

pub fn validate_string_length(
    value: &str,
    field_name: &str,
    max_length: usize,
) -> Result<(), (StatusCode, String)> {
    if value.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} cannot be empty", field_name),
        ));
    }
    if value.len() > max_length {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} must be less than {} characters", field_name, max_length),
        ));
    }
    Ok(())
}

/// Optional free-text fields may be blank, but never oversized.
pub fn validate_optional_length(
    value: Option<&str>,
    field_name: &str,
    max_length: usize,
) -> Result<(), (StatusCode, String)> {
    if let Some(value) = value {
        if value.len() > max_length {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("{} must be less than {} characters", field_name, max_length),
            ));
        }
    }
    Ok(())
}

/// Budget figures must be finite and non-negative.
pub fn validate_budget_value(value: f64, field_name: &str) -> Result<(), (StatusCode, String)> {
    if !value.is_finite() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} must be a valid finite number", field_name),
        ));
    }
    if value < 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} cannot be negative", field_name),
        ));
    }
    Ok(())
}

pub fn now_rfc3339() -> Result<String, (StatusCode, String)> {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
