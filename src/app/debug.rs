use crate::alerts::RunSummary;
use crate::broker::ConnectionStatus;
use crate::error::AppError;
use crate::ports::TimeProvider;
use crate::schedule::JobSchedule;
use crate::state;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;

pub(crate) async fn run_alerts(
    State(state): State<state::AppState>,
) -> Result<Json<RunSummary>, AppError> {
    info!("manual alert generator run requested");
    Ok(Json(state.generator.run().await?))
}

#[derive(Serialize)]
pub(crate) struct SweepResponse {
    pub(crate) deleted: u64,
}

pub(crate) async fn sweep_alerts(
    State(state): State<state::AppState>,
) -> Result<Json<SweepResponse>, AppError> {
    info!("manual retention sweep requested");
    let deleted = state.sweeper.run().await?;
    Ok(Json(SweepResponse { deleted }))
}

pub(crate) async fn connections(State(state): State<state::AppState>) -> Json<ConnectionStatus> {
    Json(state.registry.status())
}

#[derive(Serialize)]
pub(crate) struct JobsDebugResponse {
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) server_time: OffsetDateTime,
    pub(crate) jobs: Vec<JobEntry>,
}

#[derive(Serialize)]
pub(crate) struct JobEntry {
    pub(crate) name: &'static str,
    pub(crate) schedule: JobSchedule,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) started_at: OffsetDateTime,
    pub(crate) finished: bool,
}

pub(crate) async fn jobs(State(state): State<state::AppState>) -> Json<JobsDebugResponse> {
    let server_time = state.time.now();
    let jobs = {
        let handles = state.jobs.lock();
        handles
            .iter()
            .map(|handle| JobEntry {
                name: handle.name,
                schedule: handle.schedule,
                started_at: handle.started_at,
                finished: handle.is_finished(),
            })
            .collect()
    };
    Json(JobsDebugResponse { server_time, jobs })
}
