use crate::domain::AnalysisResult;
use anyhow::Context;
use serde::Serialize;
use sqlx::Row;

#[derive(Debug, Clone, Serialize)]
pub struct StoredAnalysis {
    pub id: uuid::Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub result: AnalysisResult,
}

/// Stores one run, successful or not. The full result is kept as JSONB; the
/// scalar columns exist for querying.
pub async fn persist_analysis(pool: &sqlx::PgPool, result: &AnalysisResult) -> anyhow::Result<uuid::Uuid> {
    let id = uuid::Uuid::new_v4();
    let payload = serde_json::to_value(result).context("serialize analysis result failed")?;
    let error_kind = result.error_kind.map(|k| k.as_str());
    let recommendation = result.recommendation.as_ref();
    let data_range = result.data_range.as_ref();
    let data_rows = data_range
        .map(|r| i32::try_from(r.rows))
        .transpose()
        .context("data range row count does not fit in INTEGER")?;

    sqlx::query(
        "INSERT INTO analysis_runs \
         (id, ticker, created_at, success, error, error_kind, recommendation, risk_level, llm_used, data_start, data_end, data_rows, result) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(id)
    .bind(&result.ticker)
    .bind(result.analyzed_at)
    .bind(result.success)
    .bind(&result.error)
    .bind(error_kind)
    .bind(recommendation.map(|p| p.recommendation.to_string()))
    .bind(recommendation.map(|p| p.risk_level.to_string()))
    .bind(result.llm_used)
    .bind(data_range.map(|r| r.start))
    .bind(data_range.map(|r| r.end))
    .bind(data_rows)
    .bind(payload)
    .execute(pool)
    .await
    .context("insert analysis_runs failed")?;

    Ok(id)
}

pub async fn latest_for_ticker(pool: &sqlx::PgPool, ticker: &str) -> anyhow::Result<Option<StoredAnalysis>> {
    let row = sqlx::query(
        "SELECT id, created_at, result FROM analysis_runs \
         WHERE ticker = $1 \
         ORDER BY created_at DESC \
         LIMIT 1",
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await
    .context("select latest analysis_runs failed")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let id: uuid::Uuid = row.try_get("id").context("decode analysis_runs.id failed")?;
    let created_at: chrono::DateTime<chrono::Utc> = row
        .try_get("created_at")
        .context("decode analysis_runs.created_at failed")?;
    let payload: serde_json::Value = row
        .try_get("result")
        .context("decode analysis_runs.result failed")?;
    let result = serde_json::from_value::<AnalysisResult>(payload)
        .with_context(|| format!("stored analysis {id} does not match AnalysisResult"))?;

    Ok(Some(StoredAnalysis {
        id,
        created_at,
        result,
    }))
}
