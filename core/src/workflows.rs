//! Multi-call sequences built from single resource operations.
//!
//! # Design
//! Steps run strictly one after another. Nothing is rolled back: once the
//! first record of a workflow exists, a later failure is returned as
//! `ApiError::Incomplete` carrying that record's id, and everything created
//! up to that point stays on the Service.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::executor::ApiCall;
use crate::period::period_ending;
use crate::session::{GreenLight, RoleType};
use crate::stage::Stage;
use crate::transport::Transport;
use crate::types::{
    Client, ClientSummary, Created, Deliverables, Job, JobUpdate, NewTimesheet, Position, ProjectPay,
    ShiftsExpenses, Worker, WorkerDetails,
};

/// Address reference type for a job's worker.
const CONTRACTOR_REF: &str = "contractor";

#[derive(Serialize)]
struct JobInvite<'a> {
    position_id: &'a str,
    client_id: &'a str,
    worker: &'a Worker,
    #[serde(skip_serializing_if = "Option::is_none")]
    ext_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ext_id_scope: Option<&'a str>,
    projects: &'a [ProjectPay],
}

/// Outcome of `delete_all_clients`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: usize,
    /// Clients still listed after the deletes.
    pub remaining: Vec<ClientSummary>,
}

impl<T: Transport> GreenLight<T> {
    /// Invite a worker to an approved position.
    ///
    /// Posts the invitation, fetches the new job, tags it with
    /// `your_job_id` when given, and stores the worker's mailing address
    /// against the job's contractor when one was supplied. Every call creates
    /// a new job; repeating identical inputs is not deduplicated.
    ///
    /// # Errors
    ///
    /// Request errors from the invitation itself. Failures after the job
    /// exists come back as `Incomplete` naming the job id.
    pub fn invite_worker(
        &self,
        position: &Position,
        worker: &WorkerDetails,
        pay_by_project: &[ProjectPay],
        your_job_id: Option<&str>,
    ) -> Result<Job, ApiError> {
        let invite = JobInvite {
            position_id: &position.id,
            client_id: &position.client_id,
            worker: &worker.worker,
            ext_id: worker.ext_id.as_deref(),
            ext_id_scope: worker.ext_id_scope.as_deref(),
            projects: pay_by_project,
        };
        let body = serde_json::to_value(&invite).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let created: Created = self.exec_as(&ApiCall::post("/job_invite", body))?;
        debug!(job_id = %created.id, position_id = %position.id, "worker invited");

        self.finish_invite(&created.id, worker, your_job_id)
            .map_err(|e| ApiError::incomplete("invite_worker", &created.id, e))
    }

    fn finish_invite(&self, job_id: &str, worker: &WorkerDetails, your_job_id: Option<&str>) -> Result<Job, ApiError> {
        let mut job = self.get_job(job_id, None)?;

        if let Some(ext_id) = your_job_id {
            let update = JobUpdate {
                ext_id: Some(ext_id.to_string()),
                ..JobUpdate::default()
            };
            self.update_job(job_id, &update)?;
        }

        if let Some(address) = &worker.mailing_address {
            let contractor_id = job
                .contractor_id
                .as_deref()
                .ok_or(ApiError::MissingField("contractor_id"))?;
            let created = self.create_address(address, CONTRACTOR_REF, contractor_id)?;
            debug!(address_id = %created.id, contractor_id, "mailing address stored");
        }

        if your_job_id.is_some() {
            job = self.get_job(job_id, None)?;
        }
        info!(job_id = %job.id, "job ready");
        Ok(job)
    }

    /// Create a timesheet for hours worked, add every shift and expense,
    /// submit it and optionally approve it. Returns the timesheet id.
    ///
    /// # Errors
    ///
    /// `InvalidDate` for undatable shifts, request errors from creating the
    /// timesheet, and `Incomplete` naming the timesheet for any later step.
    pub fn create_timesheet_with_shifts_expenses(
        &self,
        entries: &ShiftsExpenses,
        your_timesheet_id: Option<&str>,
        approve: bool,
    ) -> Result<String, ApiError> {
        let period_ending = period_ending(&entries.shifts, &[])?;
        let id = self.open_timesheet(&entries.job_id, period_ending, your_timesheet_id)?;

        let fill = || -> Result<(), ApiError> {
            for shift in &entries.shifts {
                self.add_shift(&id, &entries.job_id, shift)?;
            }
            for expense in &entries.expenses {
                self.add_expense(&id, &entries.job_id, expense)?;
            }
            debug!(
                timesheet_id = %id,
                shifts = entries.shifts.len(),
                expenses = entries.expenses.len(),
                "timesheet filled"
            );
            self.close_timesheet(&id, approve)
        };
        fill().map_err(|e| ApiError::incomplete("create_timesheet_with_shifts_expenses", &id, e))?;
        Ok(id)
    }

    /// Create an invoice timesheet, add every deliverable, submit it and
    /// optionally approve it. Returns the timesheet id.
    ///
    /// # Errors
    ///
    /// As `create_timesheet_with_shifts_expenses`.
    pub fn create_timesheet_with_deliverables(
        &self,
        entries: &Deliverables,
        your_timesheet_id: Option<&str>,
        approve: bool,
    ) -> Result<String, ApiError> {
        let period_ending = period_ending(&[], &entries.deliverables)?;
        let id = self.open_timesheet(&entries.job_id, period_ending, your_timesheet_id)?;

        let fill = || -> Result<(), ApiError> {
            for deliverable in &entries.deliverables {
                self.add_deliverable(&id, &entries.job_id, deliverable)?;
            }
            debug!(timesheet_id = %id, deliverables = entries.deliverables.len(), "timesheet filled");
            self.close_timesheet(&id, approve)
        };
        fill().map_err(|e| ApiError::incomplete("create_timesheet_with_deliverables", &id, e))?;
        Ok(id)
    }

    fn open_timesheet(&self, job_id: &str, period_ending: String, ext_id: Option<&str>) -> Result<String, ApiError> {
        let timesheet = NewTimesheet {
            job_id: job_id.to_string(),
            period_ending,
            ext_id: ext_id.map(str::to_string),
            ext_id_scope: None,
        };
        let created = self.create_timesheet(&timesheet)?;
        debug!(timesheet_id = %created.id, period_ending = %timesheet.period_ending, "timesheet created");
        Ok(created.id)
    }

    fn close_timesheet(&self, id: &str, approve: bool) -> Result<(), ApiError> {
        self.submit_timesheet(id)?;
        if approve {
            self.approve_timesheet(id)?;
        }
        info!(timesheet_id = %id, approved = approve, "timesheet submitted");
        Ok(())
    }

    /// The client new work should go to: a client session's own client, or
    /// the first client an admin has.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a profile, `NoClient` when an admin has no
    /// clients, `Permission` for unclassified sessions, request errors
    /// otherwise.
    pub fn select_client(&self) -> Result<Client, ApiError> {
        if self.profile().is_none() {
            return Err(ApiError::NotAuthenticated);
        }
        match self.role_type() {
            RoleType::Client => self.client().cloned().ok_or(ApiError::NoClient("select_client")),
            RoleType::Admin => {
                let first = self
                    .get_admin_clients()?
                    .into_iter()
                    .next()
                    .ok_or(ApiError::NoClient("select_client"))?;
                self.get_client(&first.id, None)
            }
            RoleType::Unclassified => Err(ApiError::Permission {
                operation: "select_client",
                required: RoleType::Client,
                actual: RoleType::Unclassified,
            }),
        }
    }

    /// Delete every client of the session's admin. Refused on production.
    ///
    /// # Errors
    ///
    /// `StageGuard` on production, `Permission` for non-admin sessions, and
    /// the first failed delete.
    pub fn delete_all_clients(&self) -> Result<DeleteReport, ApiError> {
        if self.stage() == Stage::Production {
            return Err(ApiError::StageGuard {
                operation: "delete_all_clients",
                stage: Stage::Production.as_str(),
            });
        }
        let clients = self.get_admin_clients()?;
        for client in &clients {
            debug!(client_id = %client.id, name = %client.name, "deleting client");
            self.delete_client(&client.id)?;
        }
        let remaining = self.get_admin_clients()?;
        if !remaining.is_empty() {
            warn!(remaining = remaining.len(), total = clients.len(), "clients not deleted");
        }
        Ok(DeleteReport {
            deleted: clients.len().saturating_sub(remaining.len()),
            remaining,
        })
    }
}
