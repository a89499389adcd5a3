//! Blocking client for the GreenLight staffing and payroll API.
//!
//! # Overview
//! `GreenLight` opens a session against one stage of the Service. With an
//! API key it resolves the key's profile to an admin or client role, then
//! exposes single-call resource operations (clients, projects, positions,
//! jobs, timesheets) and multi-call workflows (inviting a worker, building
//! and submitting a timesheet).
//!
//! # Design
//! - Requests are plain data (`HttpRequest` / `HttpResponse`); the only I/O
//!   happens behind the `Transport` trait. `UreqTransport` is the default.
//! - Every call is one synchronous round trip validated against an expected
//!   status. There is no retry, caching or concurrency.
//! - Records are typed; fields the crate does not name are kept in `extra`.

pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod period;
pub mod resources;
pub mod session;
pub mod stage;
pub mod transport;
pub mod types;
pub mod workflows;

pub use config::Config;
pub use error::ApiError;
pub use executor::{ApiCall, Executor, ExecutorConfig};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use period::period_ending;
pub use session::{GreenLight, RoleType};
pub use stage::Stage;
pub use transport::{Transport, UreqTransport};
pub use types::*;
pub use workflows::DeleteReport;
