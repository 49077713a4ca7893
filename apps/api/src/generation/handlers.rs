//! Axum route handlers for the Report API.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use tracing::error;

use crate::errors::AppError;
use crate::models::report::{ReportOutcome, ReportRequest};
use crate::render::compose_report;
use crate::state::AppState;

fn validate(request: &ReportRequest) -> Result<(), AppError> {
    if request.subject_name.trim().is_empty() {
        return Err(AppError::Validation("subjectName cannot be empty".to_string()));
    }
    if request.sections.is_empty() {
        return Err(AppError::Validation(
            "a report needs at least one section".to_string(),
        ));
    }
    if let Some(index) = request.sections.iter().position(|s| s.title.trim().is_empty()) {
        return Err(AppError::Validation(format!(
            "section {index} has an empty title"
        )));
    }
    Ok(())
}

/// POST /api/v1/reports
///
/// Generates every section, composes the document and writes it to the output directory.
/// Replies `{ "fileName" }` on success and `{ "error" }` with status 500 on failure.
pub async fn handle_create_report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<(StatusCode, Json<ReportOutcome>), AppError> {
    validate(&request)?;

    let date = request.date.unwrap_or_else(|| Utc::now().date_naive());
    match compose_report(&request, date, &state.fetcher, &state.compose).await {
        Ok(artifact) => Ok((
            StatusCode::OK,
            Json(ReportOutcome::Success {
                file_name: artifact.file_name,
            }),
        )),
        Err(err) => {
            error!(subject = %request.subject_name, error = %err, "report composition failed");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReportOutcome::Failure {
                    error: err.to_string(),
                }),
            ))
        }
    }
}

/// GET /api/v1/reports/:file_name
///
/// Streams a previously written report back as `application/pdf`.
pub async fn handle_download_report(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if file_name.is_empty()
        || file_name.contains(['/', '\\'])
        || file_name.contains("..")
    {
        return Err(AppError::Validation(format!(
            "invalid report file name '{file_name}'"
        )));
    }

    let path = state.compose.output_dir.join(&file_name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("Report {file_name} not found")));
        }
        Err(err) => return Err(err.into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    ))
}
