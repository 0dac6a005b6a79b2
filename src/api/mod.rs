use axum::{
    Json, Router,
    extract::Query,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{
    DocumentError, GuardrailStatus, SimulationSummary, current_year, household_to_json,
    parse_household, project, sample_household, to_real_dollars,
};

#[derive(Parser, Debug)]
#[command(
    name = "runway",
    about = "Deterministic household retirement projection (cash, taxable, pre-tax, Roth)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Project a household document and print the summary as JSON.
    Project {
        #[arg(help = "Household JSON file, or - to read stdin")]
        file: PathBuf,
        #[arg(long, help = "Apply -37% / +26% / +15% returns to the first three years")]
        stress_test: bool,
        #[arg(long, help = "Restate money in start-year dollars")]
        real_dollars: bool,
        #[arg(long, help = "Print single-line JSON")]
        compact: bool,
    },
    /// Print the sample household document.
    Sample {
        #[arg(long, help = "Projection start year, defaults to the current year")]
        start_year: Option<i32>,
    },
    /// Start the HTTP API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to read {path}: {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ProjectOptions {
    pub stress_test: bool,
    pub real_dollars: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectQuery {
    stress_test: Option<bool>,
    real_dollars: Option<bool>,
}

impl From<ProjectQuery> for ProjectOptions {
    fn from(value: ProjectQuery) -> Self {
        ProjectOptions {
            stress_test: value.stress_test.unwrap_or(false),
            real_dollars: value.real_dollars.unwrap_or(false),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub stress_test: bool,
    pub real_dollars: bool,
    pub guardrail: GuardrailStatus,
    pub summary: SimulationSummary,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn project_document(
    json: &str,
    options: ProjectOptions,
) -> Result<ProjectResponse, DocumentError> {
    let household = parse_household(json)?;
    let nominal = project(&household, options.stress_test);
    let guardrail = GuardrailStatus::classify(&nominal);
    let summary = if options.real_dollars {
        to_real_dollars(&nominal, household.parameters.inflation)
    } else {
        nominal
    };

    Ok(ProjectResponse {
        stress_test: options.stress_test,
        real_dollars: options.real_dollars,
        guardrail,
        summary,
    })
}

pub async fn run(cli: Cli) -> Result<(), ApiError> {
    match cli.command {
        Command::Project {
            file,
            stress_test,
            real_dollars,
            compact,
        } => {
            let json = read_input(&file)?;
            let response = project_document(
                &json,
                ProjectOptions {
                    stress_test,
                    real_dollars,
                },
            )?;
            let output = if compact {
                serde_json::to_string(&response)?
            } else {
                serde_json::to_string_pretty(&response)?
            };
            println!("{output}");
        }
        Command::Sample { start_year } => {
            let household = sample_household(start_year.unwrap_or_else(current_year));
            println!("{}", household_to_json(&household)?);
        }
        Command::Serve { port } => run_http_server(port).await?,
    }
    Ok(())
}

fn read_input(file: &Path) -> Result<String, ApiError> {
    let path = file.display().to_string();
    let result = if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        std::fs::read_to_string(file)
    };
    result.map_err(|source| ApiError::Input { path, source })
}

fn router() -> Router {
    Router::new()
        .route("/api/household/sample", get(sample_handler))
        .route("/api/project", post(project_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    log::info!("runway HTTP API listening on http://{addr}");
    log::info!("local access: http://127.0.0.1:{port}/api/household/sample");

    axum::serve(listener, router()).await
}

async fn sample_handler() -> Response {
    json_response(StatusCode::OK, sample_household(current_year()))
}

async fn project_handler(Query(query): Query<ProjectQuery>, body: String) -> Response {
    match project_document(&body, query.into()) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(e) => {
            log::warn!("rejected projection request: {e}");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
