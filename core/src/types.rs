//! Records exchanged with the Service.
//!
//! # Design
//! Full records name the fields this crate reads and keep everything else in
//! a flattened `extra` map, so a fetched record can be shown or re-sent
//! without loss. Summary records (used by list operations) have no `extra`:
//! deserializing into them is what trims a listing to a stable field subset.
//! Request payloads (`New*`) skip unset optional fields entirely.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields a record carries beyond the ones this crate names.
pub type Extra = Map<String, Value>;

/// Response of the unauthenticated `/version` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiVersion {
    pub hash: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// The identity behind an API key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub role: String,
    /// `"admin"` or `"client"`.
    pub resource: String,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Body of a successful create call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Created {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Admin {
    pub id: String,
    pub name: String,
    /// Stable namespace for this admin's external ids.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub countries: BTreeMap<String, String>,
    #[serde(default)]
    pub currencies: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub id: String,
    pub name: String,
    /// Owning admin.
    pub admin_id: String,
    /// Stable namespace for this client's external ids.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub ext_id: Option<String>,
    #[serde(default)]
    pub ext_id_scope: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A client as listed under its admin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ext_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Hiring rules a client starts out with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobPolicies {
    pub w2_only: bool,
    pub individual_po: bool,
    pub bg_check: bool,
    pub bg_check_type: String,
    pub drug_check: bool,
}

impl Default for JobPolicies {
    fn default() -> Self {
        Self {
            w2_only: false,
            individual_po: false,
            bg_check: false,
            bg_check_type: "n/a".to_string(),
            drug_check: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewClient {
    pub name: String,
    #[serde(default)]
    pub countries: BTreeMap<String, String>,
    #[serde(default)]
    pub currencies: BTreeMap<String, String>,
    #[serde(default)]
    pub job_policies: JobPolicies,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id_scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub client_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ext_id: Option<String>,
    #[serde(default)]
    pub ext_id_scope: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewProject {
    pub client_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id_scope: Option<String>,
}

/// A client-side answer to a classification question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub question_id: String,
    pub answer: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub position_id: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// `w2-only`, `w2-or-ic`, ... once client questions are answered.
    #[serde(default)]
    pub classify_client_result: Option<String>,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub ext_id: Option<String>,
    #[serde(default)]
    pub ext_id_scope: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A staffing requisition to create. Dates go out as `YYYY-MM-DD`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPosition {
    pub client_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub hourly: bool,
    /// Client address id for onsite work; offsite when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onsite_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hm_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classify_client_pref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id_scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub position_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub contractor_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ext_id: Option<String>,
    #[serde(default)]
    pub ext_id_scope: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A job as listed under its client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSummary {
    pub id: String,
    #[serde(default)]
    pub position_id: Option<String>,
    #[serde(default)]
    pub contractor_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ext_id: Option<String>,
}

/// Fields a job can be updated with.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id_scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// A job with its onboarding state expanded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobExtended {
    pub id: String,
    #[serde(default)]
    pub onboarding: Option<Onboarding>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Onboarding {
    #[serde(default)]
    pub w2_path: Option<W2Path>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct W2Path {
    #[serde(default)]
    pub background_check: Option<Value>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAddress {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub id: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Worker {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Who to invite, plus optional details pre-filled for them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerDetails {
    pub worker: Worker,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailing_address: Option<NewAddress>,
    /// Caller's id for the worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id_scope: Option<String>,
}

/// Pay (and optionally bill) rate for one project on a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectPay {
    pub project_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub pay_rate: Decimal,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub bill_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timesheet {
    pub id: String,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub period_ending: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTimesheet {
    pub job_id: String,
    pub period_ending: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id_scope: Option<String>,
}

/// Worked hours. `time_in` and `time_out` are ISO-8601 with a UTC offset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewShift {
    pub project_id: String,
    pub time_in: String,
    pub time_out: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewExpense {
    pub project_id: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDeliverable {
    pub project_id: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Contents of an hours timesheet for one job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShiftsExpenses {
    pub job_id: String,
    #[serde(default)]
    pub shifts: Vec<NewShift>,
    #[serde(default)]
    pub expenses: Vec<NewExpense>,
}

/// Contents of an invoice timesheet for one job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deliverables {
    pub job_id: String,
    #[serde(default)]
    pub deliverables: Vec<NewDeliverable>,
}
