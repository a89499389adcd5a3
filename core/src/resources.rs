//! Single-call operations on Service resources.
//!
//! Each method issues one request (two for `create_position`, which also
//! approves, and `get_background_check_status`, which may resolve an external
//! id first) and shapes the result into a typed record.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ApiError;
use crate::executor::ApiCall;
use crate::session::{GreenLight, RoleType};
use crate::transport::Transport;
use crate::types::{
    Address, Admin, Answer, ApiVersion, Client, ClientSummary, Created, Job, JobExtended, JobSummary,
    JobUpdate, NewAddress, NewClient, NewDeliverable, NewExpense, NewPosition, NewProject, NewShift,
    NewTimesheet, Position, Project, Question, Timesheet,
};

/// Address kind attached to worker mailing addresses.
pub const MAILING_ADDRESS_KIND: &str = "mailing";
pub const MAILING_ADDRESS_NAME: &str = "Mailing address";

fn to_body<S: Serialize>(value: &S) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Serialization(e.to_string()))
}

/// Add `key: value` to a JSON object body.
fn with_field(mut body: Value, key: &str, value: impl Into<Value>) -> Value {
    if let Some(obj) = body.as_object_mut() {
        obj.insert(key.to_string(), value.into());
    }
    body
}

impl<T: Transport> GreenLight<T> {
    /// Hash identifying the deployed API version. Needs no API key.
    ///
    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn get_api_hash(&self) -> Result<String, ApiError> {
        let version: ApiVersion = self.exec_as(&ApiCall::get("/version"))?;
        Ok(version.hash)
    }

    /// Fetch an admin by Service id, or by external id when `scope` is given.
    ///
    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn get_admin(&self, id: &str, scope: Option<&str>) -> Result<Admin, ApiError> {
        self.exec_as(&ApiCall::get(format!("/admin/{id}")).query_opt("scope", scope))
    }

    /// Fetch a client by Service id, or by external id when `scope` is given.
    ///
    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn get_client(&self, id: &str, scope: Option<&str>) -> Result<Client, ApiError> {
        self.exec_as(&ApiCall::get(format!("/client/{id}")).query_opt("scope", scope))
    }

    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn get_project(&self, id: &str, scope: Option<&str>) -> Result<Project, ApiError> {
        self.exec_as(&ApiCall::get(format!("/project/{id}")).query_opt("scope", scope))
    }

    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn get_position(&self, id: &str, scope: Option<&str>) -> Result<Position, ApiError> {
        self.exec_as(&ApiCall::get(format!("/position/{id}")).query_opt("scope", scope))
    }

    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn get_job(&self, id: &str, scope: Option<&str>) -> Result<Job, ApiError> {
        self.exec_as(&ApiCall::get(format!("/job/{id}")).query_opt("scope", scope))
    }

    /// Fetch a job with its onboarding state expanded.
    ///
    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn get_job_extended(&self, id: &str, scope: Option<&str>) -> Result<JobExtended, ApiError> {
        let call = ApiCall::get(format!("/job/{id}"))
            .query_opt("scope", scope)
            .query("extended", "true");
        self.exec_as(&call)
    }

    /// Create a client under the session's admin. An `ext_id` without a
    /// scope is qualified with the session's own scope.
    ///
    /// # Errors
    ///
    /// `Permission` unless the session is an admin; request errors otherwise.
    pub fn create_client(&self, client: &NewClient) -> Result<Created, ApiError> {
        self.require_role("create_client", RoleType::Admin)?;
        let admin = self.admin().ok_or(ApiError::MissingField("admin"))?;
        let body = with_field(to_body(client)?, "admin_id", admin.id.as_str());
        let created: Created = self.exec_as(&ApiCall::post("/client", body))?;
        debug!(client_id = %created.id, "client created");
        Ok(created)
    }

    /// # Errors
    ///
    /// `Permission` unless the session is an admin; request errors otherwise.
    pub fn delete_client(&self, id: &str) -> Result<(), ApiError> {
        self.require_role("delete_client", RoleType::Admin)?;
        self.exec(&ApiCall::delete(format!("/client/{id}")))?;
        Ok(())
    }

    /// Clients of the session's admin, trimmed to summary fields.
    ///
    /// # Errors
    ///
    /// `Permission` unless the session is an admin; request errors otherwise.
    pub fn get_admin_clients(&self) -> Result<Vec<ClientSummary>, ApiError> {
        self.require_role("get_admin_clients", RoleType::Admin)?;
        let admin = self.admin().ok_or(ApiError::MissingField("admin"))?;
        self.exec_as(&ApiCall::get(format!("/admin/{}/clients", admin.id)))
    }

    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn get_client_addresses(&self, client_id: &str) -> Result<Vec<Address>, ApiError> {
        self.exec_as(&ApiCall::get(format!("/client/{client_id}/addresses")))
    }

    /// Active jobs of a client, trimmed to summary fields.
    ///
    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn get_client_active_jobs(&self, client_id: &str) -> Result<Vec<JobSummary>, ApiError> {
        self.exec_as(&ApiCall::get(format!("/client/{client_id}/jobs")).query("status", "active"))
    }

    /// Projects a job can bill to.
    ///
    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn get_job_projects(&self, job_id: &str) -> Result<Vec<Project>, ApiError> {
        self.exec_as(&ApiCall::get(format!("/job/{job_id}/projects")))
    }

    /// Client-side classification questions, optionally for one position.
    ///
    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn get_questions_for_client(&self, position_id: Option<&str>) -> Result<Vec<Question>, ApiError> {
        let call = ApiCall::get("/question")
            .query("audience", "client")
            .query_opt("position_id", position_id);
        self.exec_as(&call)
    }

    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn create_project(&self, project: &NewProject) -> Result<Created, ApiError> {
        self.exec_as(&ApiCall::post("/project", to_body(project)?))
    }

    /// Create a position and approve it so workers can be invited.
    ///
    /// # Errors
    ///
    /// Request errors from either call. A failed approval is reported as
    /// `Incomplete` naming the created position.
    pub fn create_position(&self, position: &NewPosition, your_position_id: Option<&str>) -> Result<Created, ApiError> {
        let mut body = to_body(position)?;
        if let Some(ext_id) = your_position_id {
            body = with_field(body, "ext_id", ext_id);
        }
        let created: Created = self.exec_as(&ApiCall::post("/position", body))?;
        self.approve_position(&created.id)
            .map_err(|e| ApiError::incomplete("create_position", &created.id, e))?;
        debug!(position_id = %created.id, "position created and approved");
        Ok(created)
    }

    /// # Errors
    ///
    /// Request errors.
    pub fn approve_position(&self, id: &str) -> Result<(), ApiError> {
        self.exec(&ApiCall::action(format!("/position/{id}/action/approve")))?;
        Ok(())
    }

    /// Merge `answers` into the position's answers, replacing any earlier
    /// answer to the same question.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub fn add_position_answers(&self, position: &Position, answers: &[Answer]) -> Result<(), ApiError> {
        let mut merged: Vec<Answer> = position
            .answers
            .iter()
            .filter(|old| !answers.iter().any(|new| new.question_id == old.question_id))
            .cloned()
            .collect();
        merged.extend_from_slice(answers);
        let body = json!({ "answers": to_body(&merged)? });
        self.exec(&ApiCall::put(format!("/position/{}", position.id), body))?;
        Ok(())
    }

    /// # Errors
    ///
    /// Request errors.
    pub fn update_job(&self, id: &str, update: &JobUpdate) -> Result<(), ApiError> {
        self.exec(&ApiCall::put(format!("/job/{id}"), to_body(update)?))?;
        Ok(())
    }

    /// Store a mailing address against another record.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub fn create_address(&self, address: &NewAddress, ref_type: &str, ref_id: &str) -> Result<Created, ApiError> {
        let mut body = to_body(address)?;
        body = with_field(body, "ref_type", ref_type);
        body = with_field(body, "ref_id", ref_id);
        body = with_field(body, "kind", MAILING_ADDRESS_KIND);
        body = with_field(body, "name", MAILING_ADDRESS_NAME);
        self.exec_as(&ApiCall::post("/address", body))
    }

    /// Background-check status of a job's worker. With `scope`, `job_id` is
    /// an external id and is resolved to the Service id first.
    ///
    /// # Errors
    ///
    /// `MissingField` naming the first absent level of
    /// `onboarding.w2_path.background_check`; request errors otherwise.
    pub fn get_background_check_status(&self, job_id: &str, scope: Option<&str>) -> Result<Value, ApiError> {
        let internal_id = match scope {
            Some(scope) => self.get_job(job_id, Some(scope))?.id,
            None => job_id.to_string(),
        };
        let job = self.get_job_extended(&internal_id, None)?;
        job.onboarding
            .ok_or(ApiError::MissingField("onboarding"))?
            .w2_path
            .ok_or(ApiError::MissingField("w2_path"))?
            .background_check
            .filter(|v| !v.is_null())
            .ok_or(ApiError::MissingField("background_check"))
    }

    /// # Errors
    ///
    /// Request errors.
    pub fn create_timesheet(&self, timesheet: &NewTimesheet) -> Result<Created, ApiError> {
        self.exec_as(&ApiCall::post("/timesheet", to_body(timesheet)?))
    }

    /// Fetch a timesheet by Service id, or by external id when `scope` is given.
    ///
    /// # Errors
    ///
    /// Request and decoding errors.
    pub fn get_timesheet(&self, id: &str, scope: Option<&str>) -> Result<Timesheet, ApiError> {
        self.exec_as(&ApiCall::get(format!("/timesheet/{id}")).query_opt("scope", scope))
    }

    /// # Errors
    ///
    /// Request errors.
    pub fn add_shift(&self, timesheet_id: &str, job_id: &str, shift: &NewShift) -> Result<Created, ApiError> {
        let body = child_body(to_body(shift)?, timesheet_id, job_id);
        self.exec_as(&ApiCall::post("/shift", body))
    }

    /// # Errors
    ///
    /// Request errors.
    pub fn add_expense(&self, timesheet_id: &str, job_id: &str, expense: &NewExpense) -> Result<Created, ApiError> {
        let body = child_body(to_body(expense)?, timesheet_id, job_id);
        self.exec_as(&ApiCall::post("/expense", body))
    }

    /// # Errors
    ///
    /// Request errors.
    pub fn add_deliverable(
        &self,
        timesheet_id: &str,
        job_id: &str,
        deliverable: &NewDeliverable,
    ) -> Result<Created, ApiError> {
        let body = child_body(to_body(deliverable)?, timesheet_id, job_id);
        self.exec_as(&ApiCall::post("/deliverable", body))
    }

    /// # Errors
    ///
    /// Request errors.
    pub fn submit_timesheet(&self, id: &str) -> Result<(), ApiError> {
        self.exec(&ApiCall::action(format!("/timesheet/{id}/action/submit")))?;
        Ok(())
    }

    /// # Errors
    ///
    /// Request errors.
    pub fn approve_timesheet(&self, id: &str) -> Result<(), ApiError> {
        self.exec(&ApiCall::action(format!("/timesheet/{id}/action/approve")))?;
        Ok(())
    }
}

fn child_body(body: Value, timesheet_id: &str, job_id: &str) -> Value {
    with_field(with_field(body, "timesheet_id", timesheet_id), "job_id", job_id)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::session::tests::{admin_session, client_session};
    use crate::types::NewClient;

    fn new_client(ext_id: Option<&str>) -> NewClient {
        NewClient {
            name: "Globex".to_string(),
            countries: [("US".to_string(), "active".to_string())].into(),
            currencies: [("USD".to_string(), "active".to_string())].into(),
            job_policies: Default::default(),
            ext_id: ext_id.map(str::to_string),
            ext_id_scope: None,
        }
    }

    #[test]
    fn create_client_attaches_admin_and_scope() {
        let gl = admin_session(vec![(201, json!({"id": "c9"}))]);
        let created = gl.create_client(&new_client(Some("crm-42"))).unwrap();
        assert_eq!(created.id, "c9");

        let transport = gl.executor.transport();
        assert_eq!(transport.paths()[2], "POST /client");
        let body = transport.body(2);
        assert_eq!(body["admin_id"], "a1");
        assert_eq!(body["ext_id"], "crm-42");
        assert_eq!(body["ext_id_scope"], "admin-scope");
        assert_eq!(body["job_policies"]["bg_check_type"], "n/a");
    }

    #[test]
    fn create_client_without_ext_id_sends_no_scope() {
        let gl = admin_session(vec![(201, json!({"id": "c9"}))]);
        gl.create_client(&new_client(None)).unwrap();
        assert!(gl.executor.transport().body(2).get("ext_id_scope").is_none());
    }

    #[test]
    fn client_session_cannot_create_or_delete_clients() {
        let gl = client_session(Vec::new());
        let sent_before = gl.executor.transport().sent.borrow().len();

        let err = gl.create_client(&new_client(None)).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Permission {
                operation: "create_client",
                required: RoleType::Admin,
                actual: RoleType::Client
            }
        ));
        assert!(matches!(gl.delete_client("c1"), Err(ApiError::Permission { .. })));
        assert!(matches!(gl.get_admin_clients(), Err(ApiError::Permission { .. })));
        assert_eq!(gl.executor.transport().sent.borrow().len(), sent_before);
    }

    #[test]
    fn delete_client_expects_no_content() {
        let gl = admin_session(vec![(204, Value::Null), (200, json!({}))]);
        gl.delete_client("c1").unwrap();
        let err = gl.delete_client("c2").unwrap_err();
        assert_eq!(err.status(), Some(200));
    }

    #[test]
    fn admin_clients_are_trimmed() {
        let gl = admin_session(vec![(
            200,
            json!([{"id": "c1", "name": "Acme", "job_policies": {}, "ext_id": null}]),
        )]);
        let clients = gl.get_admin_clients().unwrap();
        assert_eq!(
            clients,
            vec![ClientSummary {
                id: "c1".to_string(),
                name: "Acme".to_string(),
                ext_id: None,
                status: None,
            }]
        );
        assert_eq!(gl.executor.transport().paths()[2], "GET /admin/a1/clients");
    }

    #[test]
    fn fetch_by_external_id_sends_scope_query() {
        let gl = admin_session(vec![(200, json!({"id": "p1", "name": "P"}))]);
        gl.get_project("mine-7", Some("admin-scope")).unwrap();
        let sent = gl.executor.transport().sent.borrow();
        assert_eq!(sent[2].query, vec![("scope".to_string(), "admin-scope".to_string())]);
    }

    #[test]
    fn admin_fetch_accepts_scope_like_its_siblings() {
        let gl = admin_session(vec![
            (200, json!({"id": "a2", "name": "Other"})),
            (200, json!({"id": "a2", "name": "Other"})),
        ]);
        gl.get_admin("a2", None).unwrap();
        let admin = gl.get_admin("hq", Some("admin-scope")).unwrap();
        assert_eq!(admin.id, "a2");
        let sent = gl.executor.transport().sent.borrow();
        assert!(sent[2].query.is_empty());
        assert_eq!(sent[3].query, vec![("scope".to_string(), "admin-scope".to_string())]);
        drop(sent);
        assert_eq!(gl.executor.transport().paths()[3], "GET /admin/hq");
    }

    #[test]
    fn timesheet_fetch_decodes_status() {
        let gl = client_session(vec![(
            200,
            json!({"id": "t1", "job_id": "j1", "period_ending": "2020-06-07T22:59:59-05:00", "status": "submitted", "hours": 8}),
        )]);
        let timesheet = gl.get_timesheet("t1", None).unwrap();
        assert_eq!(timesheet.status.as_deref(), Some("submitted"));
        assert_eq!(timesheet.job_id.as_deref(), Some("j1"));
        assert_eq!(timesheet.extra["hours"], 8);
        assert_eq!(gl.executor.transport().paths()[3], "GET /timesheet/t1");
    }

    #[test]
    fn active_jobs_are_filtered_server_side() {
        let gl = client_session(vec![(200, json!([{"id": "j1", "status": "active", "rates": []}]))]);
        let jobs = gl.get_client_active_jobs("c1").unwrap();
        assert_eq!(jobs[0].status.as_deref(), Some("active"));
        let sent = gl.executor.transport().sent.borrow();
        assert_eq!(sent[3].query, vec![("status".to_string(), "active".to_string())]);
    }

    #[test]
    fn questions_optionally_scoped_to_position() {
        let gl = admin_session(vec![(200, json!([])), (200, json!([{"id": "q1"}]))]);
        gl.get_questions_for_client(None).unwrap();
        let questions = gl.get_questions_for_client(Some("pos1")).unwrap();
        assert_eq!(questions[0].id, "q1");
        let sent = gl.executor.transport().sent.borrow();
        assert_eq!(sent[2].query.len(), 1);
        assert!(sent[3].query.contains(&("position_id".to_string(), "pos1".to_string())));
    }

    #[test]
    fn create_position_approves_after_create() {
        let gl = admin_session(vec![(201, json!({"id": "pos1"})), (200, json!({}))]);
        let position = NewPosition {
            client_id: "c1".to_string(),
            title: "Forklift operator".to_string(),
            description: None,
            start_date: chrono::NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            end_date: None,
            hourly: true,
            onsite_id: None,
            hm_id: None,
            classify_client_pref: None,
            ext_id: None,
            ext_id_scope: None,
        };
        let created = gl.create_position(&position, Some("req-1")).unwrap();
        assert_eq!(created.id, "pos1");
        let transport = gl.executor.transport();
        assert_eq!(
            &transport.paths()[2..],
            ["POST /position", "POST /position/pos1/action/approve"]
        );
        let body = transport.body(2);
        assert_eq!(body["start_date"], "2020-06-01");
        assert_eq!(body["ext_id"], "req-1");
        assert_eq!(body["ext_id_scope"], "admin-scope");
    }

    #[test]
    fn failed_approval_names_created_position() {
        let gl = admin_session(vec![(201, json!({"id": "pos1"})), (409, json!({"message": "conflict"}))]);
        let position: NewPosition = serde_json::from_value(json!({
            "client_id": "c1", "title": "T", "start_date": "2020-06-01"
        }))
        .unwrap();
        let err = gl.create_position(&position, None).unwrap_err();
        assert!(matches!(&err, ApiError::Incomplete { resource_id, .. } if resource_id == "pos1"));
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn answers_merge_replacing_same_question() {
        let gl = admin_session(vec![(204, Value::Null)]);
        let position: Position = serde_json::from_value(json!({
            "id": "pos1",
            "client_id": "c1",
            "answers": [
                {"question_id": "q1", "answer": false},
                {"question_id": "q2", "answer": false}
            ]
        }))
        .unwrap();
        let answers = [Answer {
            question_id: "q2".to_string(),
            answer: json!(true),
        }];
        gl.add_position_answers(&position, &answers).unwrap();
        let transport = gl.executor.transport();
        assert_eq!(transport.paths()[2], "PUT /position/pos1");
        assert_eq!(
            transport.body(2),
            json!({"answers": [
                {"question_id": "q1", "answer": false},
                {"question_id": "q2", "answer": true}
            ]})
        );
    }

    #[test]
    fn address_is_tagged_with_reference_and_fixed_kind() {
        let gl = admin_session(vec![(201, json!({"id": "addr1"}))]);
        let address = NewAddress {
            line1: "1 Main St".to_string(),
            line2: None,
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62701".to_string(),
            country: "US".to_string(),
        };
        gl.create_address(&address, "contractor", "w1").unwrap();
        let body = gl.executor.transport().body(2);
        assert_eq!(body["ref_type"], "contractor");
        assert_eq!(body["ref_id"], "w1");
        assert_eq!(body["kind"], MAILING_ADDRESS_KIND);
        assert_eq!(body["name"], MAILING_ADDRESS_NAME);
    }

    #[test]
    fn background_check_resolves_external_id_first() {
        let gl = admin_session(vec![
            (200, json!({"id": "j77"})),
            (200, json!({"id": "j77", "onboarding": {"w2_path": {"background_check": "pending"}}})),
        ]);
        let status = gl.get_background_check_status("my-job", Some("admin-scope")).unwrap();
        assert_eq!(status, json!("pending"));
        let transport = gl.executor.transport();
        assert_eq!(&transport.paths()[2..], ["GET /job/my-job", "GET /job/j77"]);
    }

    #[test]
    fn background_check_reports_absent_level() {
        for (job, field) in [
            (json!({"id": "j1"}), "onboarding"),
            (json!({"id": "j1", "onboarding": {}}), "w2_path"),
            (json!({"id": "j1", "onboarding": {"w2_path": {}}}), "background_check"),
            (
                json!({"id": "j1", "onboarding": {"w2_path": {"background_check": null}}}),
                "background_check",
            ),
        ] {
            let gl = admin_session(vec![(200, job)]);
            let err = gl.get_background_check_status("j1", None).unwrap_err();
            assert!(matches!(err, ApiError::MissingField(f) if f == field), "{field}");
        }
    }

    #[test]
    fn version_hash_works_without_key() {
        use crate::config::Config;
        use crate::session::tests::Scripted;
        use crate::stage::Stage;

        let transport = Scripted::new(vec![(200, json!({"hash": "abc123"}))]);
        let gl = GreenLight::with_transport(Config::new(Stage::Staging), &transport).unwrap();
        assert_eq!(gl.get_api_hash().unwrap(), "abc123");
        assert!(transport.sent.borrow()[0].header("x-api-key").is_none());
    }
}
