//! Subcommand implementations. Each opens its own session from the
//! environment and prints its result to stdout.

use std::fs;
use std::path::Path;

use greenlight_core::{ApiError, Config, Deliverables, GreenLight, ShiftsExpenses};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Output encoding failed: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Refusing to {0} without --yes")]
    NotConfirmed(&'static str),
}

fn session() -> Result<GreenLight, CommandError> {
    Ok(GreenLight::from_config(Config::from_env()?)?)
}

fn print_json<S: Serialize>(value: &S) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json<D: DeserializeOwned>(path: &Path) -> Result<D, CommandError> {
    let display = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| CommandError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CommandError::Json { path: display, source })
}

pub fn ping() -> Result<(), CommandError> {
    let mut config = Config::from_env()?;
    config.api_key = None;
    let gl = GreenLight::from_config(config)?;
    println!("{}", gl.get_api_hash()?);
    Ok(())
}

pub fn whoami() -> Result<(), CommandError> {
    let gl = session()?;
    println!("stage:  {}", gl.stage());
    println!("role:   {}", gl.role_type());
    if let Some(admin) = gl.admin() {
        println!("admin:  {} ({})", admin.name, admin.id);
    }
    if let Some(client) = gl.client() {
        println!("client: {} ({})", client.name, client.id);
    }
    Ok(())
}

pub fn clients() -> Result<(), CommandError> {
    print_json(&session()?.get_admin_clients()?)
}

pub fn client(id: &str, scope: Option<&str>) -> Result<(), CommandError> {
    print_json(&session()?.get_client(id, scope)?)
}

pub fn delete_clients(confirmed: bool) -> Result<(), CommandError> {
    if !confirmed {
        return Err(CommandError::NotConfirmed("delete all clients"));
    }
    let report = session()?.delete_all_clients()?;
    info!(deleted = report.deleted, remaining = report.remaining.len(), "delete finished");
    println!("deleted {} client(s)", report.deleted);
    if !report.remaining.is_empty() {
        print_json(&report.remaining)?;
    }
    Ok(())
}

pub fn timesheet(file: &Path, ext_id: Option<&str>, approve: bool) -> Result<(), CommandError> {
    let entries: ShiftsExpenses = read_json(file)?;
    let id = session()?.create_timesheet_with_shifts_expenses(&entries, ext_id, approve)?;
    println!("{id}");
    Ok(())
}

pub fn deliverables(file: &Path, ext_id: Option<&str>, approve: bool) -> Result<(), CommandError> {
    let entries: Deliverables = read_json(file)?;
    let id = session()?.create_timesheet_with_deliverables(&entries, ext_id, approve)?;
    println!("{id}");
    Ok(())
}

pub fn background_check(job_id: &str, scope: Option<&str>) -> Result<(), CommandError> {
    print_json(&session()?.get_background_check_status(job_id, scope)?)
}
