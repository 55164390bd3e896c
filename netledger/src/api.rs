use crate::config::LedgerConfig;
use crate::error::Result;
use crate::ledger::{UsageLedger, UsageRecord};
use crate::sampler::DynSampler;
use axum::{
    Router,
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDate;
use common::{format_bytes, format_rate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument};

/// Upper bound for the `days` query parameter.
const MAX_WINDOW_DAYS: u32 = 3650;

pub struct ApiServer {
    config: Arc<LedgerConfig>,
    sampler: Arc<DynSampler>,
    ledger: Arc<UsageLedger>,
}

#[derive(Clone)]
struct AppState {
    sampler: Arc<DynSampler>,
    ledger: Arc<UsageLedger>,
    window_days: u32,
}

#[derive(Debug, Deserialize)]
struct WindowParams {
    days: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DataUsage {
    date: NaiveDate,
    sent: u64,
    received: u64,
    sent_human: String,
    received_human: String,
}

impl From<UsageRecord> for DataUsage {
    fn from(record: UsageRecord) -> Self {
        Self {
            date: record.date,
            sent: record.sent,
            received: record.received,
            sent_human: format_bytes(record.sent),
            received_human: format_bytes(record.received),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentUsageResponse {
    sent: String,
    received: String,
    /// Bytes per second
    download_speed: f64,
    upload_speed: f64,
    download_speed_human: String,
    upload_speed_human: String,
    counter_reset: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    total_sent: String,
    total_received: String,
    total_sent_bytes: u64,
    total_received_bytes: u64,
    days: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct GenericResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
}

impl ApiServer {
    pub fn new(
        config: Arc<LedgerConfig>,
        sampler: Arc<DynSampler>,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            config,
            sampler,
            ledger,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let app = router(AppState {
            sampler: self.sampler,
            ledger: self.ledger,
            window_days: self.config.window_days,
        });

        info!("Starting API server on {}", self.config.listen_addr);

        let listener = tokio::net::TcpListener::bind(&self.config.listen_addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/data", get(get_data))
        .route("/update", get(update_usage).post(update_usage))
        .route("/current", get(get_current))
        .route("/summary", get(get_summary))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn failure(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(GenericResponse {
            success: false,
            message,
        }),
    )
        .into_response()
}

impl AppState {
    fn window(&self, params: &WindowParams) -> std::result::Result<u32, Response> {
        match params.days {
            None => Ok(self.window_days),
            Some(days) if days <= MAX_WINDOW_DAYS => Ok(days),
            Some(days) => Err(failure(
                StatusCode::BAD_REQUEST,
                format!("days must be at most {MAX_WINDOW_DAYS}, got {days}"),
            )),
        }
    }
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[instrument(skip(state))]
async fn get_data(State(state): State<AppState>, Query(params): Query<WindowParams>) -> Response {
    let days = match state.window(&params) {
        Ok(days) => days,
        Err(response) => return response,
    };

    match state.ledger.query_recent(days).await {
        Ok(records) => {
            let usages: Vec<DataUsage> = records.into_iter().map(DataUsage::from).collect();
            (StatusCode::OK, Json(usages)).into_response()
        }
        Err(e) => {
            error!("Failed to query data usage: {}", e);
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to query data usage: {}", e),
            )
        }
    }
}

#[instrument(skip(state))]
async fn update_usage(State(state): State<AppState>) -> Response {
    let sample = match state.sampler.sample() {
        Ok(sample) => sample,
        Err(e) => {
            error!("Failed to sample network usage: {}", e);
            return failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to sample network usage: {}", e),
            );
        }
    };

    match state.ledger.record_usage(sample.sent, sample.received).await {
        Ok(()) => {
            debug!(
                sent = sample.sent,
                received = sample.received,
                "API: usage recorded"
            );
            (
                StatusCode::OK,
                Json(GenericResponse {
                    success: true,
                    message: "Network usage updated successfully!".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to save data usage: {}", e);
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to save data usage: {}", e),
            )
        }
    }
}

#[instrument(skip(state))]
async fn get_current(State(state): State<AppState>) -> Response {
    match state.sampler.sample() {
        Ok(sample) => {
            debug!(elapsed = ?sample.elapsed, "API: current usage sampled");
            (
                StatusCode::OK,
                Json(CurrentUsageResponse {
                    sent: format_bytes(sample.sent),
                    received: format_bytes(sample.received),
                    download_speed: sample.download_rate,
                    upload_speed: sample.upload_rate,
                    download_speed_human: format_rate(sample.download_rate),
                    upload_speed_human: format_rate(sample.upload_rate),
                    counter_reset: sample.counter_reset,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to sample network usage: {}", e);
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to sample network usage: {}", e),
            )
        }
    }
}

#[instrument(skip(state))]
async fn get_summary(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Response {
    let days = match state.window(&params) {
        Ok(days) => days,
        Err(response) => return response,
    };

    match state.ledger.summarize(days).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(SummaryResponse {
                total_sent: format_bytes(summary.total_sent),
                total_received: format_bytes(summary.total_received),
                total_sent_bytes: summary.total_sent,
                total_received_bytes: summary.total_received,
                days,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to summarize data usage: {}", e);
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to summarize data usage: {}", e),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::CounterSource;
    use crate::sampler::UsageSampler;
    use crate::ledger::tests::drop_usage_table;
    use crate::sampler::tests::ScriptedCounters;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use chrono::Local;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_app(reads: Vec<Option<(u64, u64)>>) -> (TempDir, Router, Arc<UsageLedger>) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(
            UsageLedger::connect(dir.path().join("usage.db"))
                .await
                .unwrap(),
        );
        let source: Box<dyn CounterSource> = Box::new(ScriptedCounters::new(reads));
        let sampler = Arc::new(UsageSampler::new(source).unwrap());

        let app = router(AppState {
            sampler,
            ledger: ledger.clone(),
            window_days: 30,
        });
        (dir, app, ledger)
    }

    async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_reports_version() {
        let (_dir, app, _) = test_app(vec![Some((0, 0))]).await;

        let (status, body) = call(&app, Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn update_then_data_returns_todays_record() {
        let (_dir, app, _) = test_app(vec![Some((1000, 2000)), Some((1500, 2800))]).await;

        let (status, body) = call(&app, Method::POST, "/update").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = call(&app, Method::GET, "/data").await;
        assert_eq!(status, StatusCode::OK);
        let records = body.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0]["date"],
            Local::now().date_naive().format("%Y-%m-%d").to_string()
        );
        assert_eq!(records[0]["sent"], 1500);
        assert_eq!(records[0]["received"], 2800);
        assert_eq!(records[0]["sentHuman"], "1.5 kB");
        assert_eq!(records[0]["receivedHuman"], "2.8 kB");
    }

    #[tokio::test]
    async fn current_formats_totals() {
        let (_dir, app, _) = test_app(vec![Some((1000, 2000)), Some((82_854_982, 2800))]).await;

        let (status, body) = call(&app, Method::GET, "/current").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sent"], "83 MB");
        assert_eq!(body["received"], "2.8 kB");
        assert!(body["downloadSpeed"].as_f64().unwrap() >= 0.0);
        assert!(body["uploadSpeed"].as_f64().unwrap() >= 0.0);
        assert_eq!(body["counterReset"], false);
    }

    #[tokio::test]
    async fn summary_sums_recorded_days() {
        let (_dir, app, ledger) = test_app(vec![Some((0, 0))]).await;
        let today = Local::now().date_naive();
        ledger.record_usage_on(today, 1_000, 2_000).await.unwrap();
        ledger
            .record_usage_on(today.pred_opt().unwrap(), 500, 500)
            .await
            .unwrap();

        let (status, body) = call(&app, Method::GET, "/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalSentBytes"], 1_500);
        assert_eq!(body["totalReceivedBytes"], 2_500);
        assert_eq!(body["totalSent"], "1.5 kB");
        assert_eq!(body["days"], 30);

        let (_, body) = call(&app, Method::GET, "/summary?days=0").await;
        assert_eq!(body["totalSentBytes"], 1_000);
    }

    #[tokio::test]
    async fn empty_ledger_yields_empty_data_and_zero_summary() {
        let (_dir, app, _) = test_app(vec![Some((0, 0))]).await;

        let (_, body) = call(&app, Method::GET, "/data").await;
        assert_eq!(body, Value::Array(vec![]));

        let (_, body) = call(&app, Method::GET, "/summary").await;
        assert_eq!(body["totalSentBytes"], 0);
        assert_eq!(body["totalReceivedBytes"], 0);
    }

    #[tokio::test]
    async fn oversized_window_is_rejected() {
        let (_dir, app, _) = test_app(vec![Some((0, 0))]).await;

        let (status, body) = call(&app, Method::GET, "/data?days=5000").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn store_failure_on_update_leaves_sampler_usable() {
        let (_dir, app, ledger) =
            test_app(vec![Some((0, 0)), Some((1_000, 2_000)), Some((1_500, 2_800))]).await;
        drop_usage_table(&ledger).await;

        let (status, body) = call(&app, Method::POST, "/update").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);

        let (status, body) = call(&app, Method::GET, "/current").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sent"], "1.5 kB");
        assert_eq!(body["counterReset"], false);
    }

    #[tokio::test]
    async fn counter_failure_is_surfaced_and_nothing_is_recorded() {
        let (_dir, app, ledger) = test_app(vec![Some((0, 0)), None, None]).await;

        let (status, body) = call(&app, Method::GET, "/current").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);

        let (status, _) = call(&app, Method::GET, "/update").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(ledger.query_recent(30).await.unwrap().is_empty());
    }
}
