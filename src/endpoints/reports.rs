//! Citizen report submission and lookup.
//!
//! Submission runs the moderation engine and stores the verdict alongside the
//! report. Moderation never blocks a submission: a flagged report is stored
//! with status `flagged` for human review instead of being rejected.

use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Db;
use crate::moderation::{ModerationEngine, ModerationVerdict};
use crate::serve::{AppState, Result};
use crate::Error;

#[derive(Deserialize)]
pub struct CreateReportInput {
    pub description: String,
    pub photo_reference: Option<String>,
}

#[derive(Serialize)]
pub struct ReportOutput {
    pub id: String,
    pub description: String,
    pub photo_reference: Option<String>,
    /// `approved`, `pending` (mismatch, needs a second look) or `flagged`.
    pub status: String,
    pub verdict: serde_json::Value,
    pub created_at: String,
}

fn report_status(verdict: &ModerationVerdict) -> &'static str {
    if verdict.flagged {
        "flagged"
    } else if verdict.auto_approve {
        "approved"
    } else {
        "pending"
    }
}

async fn create_report(
    State(db): State<Db>,
    State(moderation): State<Arc<ModerationEngine>>,
    Json(input): Json<CreateReportInput>,
) -> Result<Json<ReportOutput>> {
    if input.description.trim().is_empty() {
        return Err(Error::invalid_input(anyhow!(
            "report description must not be empty"
        )));
    }

    let verdict = moderation
        .moderate(input.photo_reference.as_deref(), &input.description)
        .await;

    let id = Uuid::new_v4().to_string();
    let status = report_status(&verdict);
    let verdict_json =
        serde_json::to_string(&verdict).context("failed to serialize verdict")?;
    let created_at = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO reports (id, description, photo_reference, status, verdict, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&input.description)
    .bind(&input.photo_reference)
    .bind(status)
    .bind(&verdict_json)
    .bind(&created_at)
    .execute(&db)
    .await
    .context("failed to store report")?;

    Ok(Json(ReportOutput {
        id,
        description: input.description,
        photo_reference: input.photo_reference,
        status: status.to_owned(),
        verdict: serde_json::to_value(&verdict).context("failed to encode verdict")?,
        created_at,
    }))
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: String,
    description: String,
    photo_reference: Option<String>,
    status: String,
    verdict: String,
    created_at: String,
}

async fn get_report(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<ReportOutput>> {
    let row: Option<ReportRow> = sqlx::query_as(
        "SELECT id, description, photo_reference, status, verdict, created_at FROM reports WHERE id = ?",
    )
    .bind(&id)
    .fetch_optional(&db)
    .await
    .context("failed to fetch report")?;

    let row = row.ok_or_else(|| Error::not_found(anyhow!("no report with id {id}")))?;
    let verdict: serde_json::Value =
        serde_json::from_str(&row.verdict).context("stored verdict is not valid json")?;

    Ok(Json(ReportOutput {
        id: row.id,
        description: row.description,
        photo_reference: row.photo_reference,
        status: row.status,
        verdict,
        created_at: row.created_at,
    }))
}

#[rustfmt::skip]
pub fn routes() -> Router<AppState> {
    // UP /api/reports
    // UG /api/reports/{id}
    Router::new()
        .route("/api/reports",      post(create_report))
        .route("/api/reports/{id}", get(get_report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::{decide, SafetyLikelihoods, ToxicityScores};

    #[test]
    fn status_follows_the_verdict() {
        let clean = decide(
            &SafetyLikelihoods::default(),
            Vec::new(),
            &ToxicityScores::default(),
            "hay un hueco en la via principal",
        );
        assert_eq!(report_status(&clean), "approved");

        let toxic = decide(
            &SafetyLikelihoods::default(),
            Vec::new(),
            &ToxicityScores::default(),
            "eres un idiota",
        );
        assert_eq!(report_status(&toxic), "flagged");
    }
}
