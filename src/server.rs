use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use log::{error, info, warn};
use std::env;
use std::path::PathBuf;

use crate::data::{TimetablingInput, TimetablingOutput};
use crate::error::TimetablingError;
use crate::{report, solver};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Where every successful solve persists its tables, if anywhere.
    pub results_dir: Option<PathBuf>,
}

impl AppState {
    pub fn from_env() -> Self {
        Self {
            results_dir: env::var("TIMETABLING_RESULTS_DIR").ok().map(PathBuf::from),
        }
    }
}

fn status_of(err: &TimetablingError) -> StatusCode {
    match err {
        TimetablingError::Config(_) | TimetablingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        TimetablingError::Infeasible { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        TimetablingError::Solver(_) | TimetablingError::Interpretation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn solve_and_persist(input: &TimetablingInput, state: &AppState) -> Result<TimetablingOutput, TimetablingError> {
    let output = solver::solve(input)?;
    if let Some(dir) = &state.results_dir {
        if let Err(e) = report::persist(dir, &output) {
            warn!("Could not write results to {}: {e}", dir.display());
        }
    }
    Ok(output)
}

async fn solve_handler(
    State(state): State<AppState>,
    Json(input): Json<TimetablingInput>,
) -> Result<Json<TimetablingOutput>, (StatusCode, String)> {
    info!(
        "Received timetabling request: {} professors, {} classes, {} electives",
        input.professors.len(),
        input.courses.len(),
        input.electives.len()
    );

    let result = tokio::task::spawn_blocking(move || solve_and_persist(&input, &state))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("solver task failed: {e}")))?;

    match result {
        Ok(output) => Ok(Json(output)),
        Err(e) => {
            error!("{e}");
            Err((status_of(&e), e.to_string()))
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/timetable/solve", post(solve_handler))
        .with_state(state)
}

pub async fn run_server() -> std::io::Result<()> {
    let addr = env::var("TIMETABLING_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let app = router(AppState::from_env());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
