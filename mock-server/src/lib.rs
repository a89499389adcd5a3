//! In-memory stand-in for the GreenLight Service.
//!
//! Serves the same paths, status codes and `x-api-key` authentication as the
//! real API, backed by a `Store` of JSON records. Seeded with one admin, one
//! client, and API keys for each (plus two deliberately misconfigured keys).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const ADMIN_KEY: &str = "mock-admin-key";
pub const CLIENT_KEY: &str = "mock-client-key";
/// Key with no profile attached.
pub const ORPHAN_KEY: &str = "mock-orphan-key";
/// Key attached to two profiles.
pub const SHARED_KEY: &str = "mock-shared-key";

pub const ADMIN_ID: &str = "adm-0001";
pub const ADMIN_SCOPE: &str = "scope-admin-0001";
pub const CLIENT_ID: &str = "cli-0001";
pub const CLIENT_SCOPE: &str = "scope-client-0001";
pub const API_HASH: &str = "mock-5f2c9e1";

/// Record collections held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Admin,
    Client,
    Project,
    Position,
    Job,
    Address,
    Question,
    Timesheet,
    Shift,
    Expense,
    Deliverable,
}

#[derive(Debug, Default)]
pub struct Store {
    profiles: HashMap<String, Vec<Value>>,
    records: HashMap<Kind, BTreeMap<String, Value>>,
}

impl Store {
    /// A store with the fixture admin, client, address, questions and keys.
    #[must_use]
    pub fn seeded() -> Self {
        let mut store = Self::default();
        let admin_profile = json!({
            "role": "gl_manager", "resource": "admin", "resource_id": ADMIN_ID, "user_id": "usr-admin"
        });
        let client_profile = json!({
            "role": "cl_owner", "resource": "client", "resource_id": CLIENT_ID, "user_id": "usr-client"
        });
        store.profiles.insert(ADMIN_KEY.to_string(), vec![admin_profile.clone()]);
        store.profiles.insert(CLIENT_KEY.to_string(), vec![client_profile.clone()]);
        store.profiles.insert(ORPHAN_KEY.to_string(), Vec::new());
        store.profiles.insert(SHARED_KEY.to_string(), vec![admin_profile, client_profile]);

        store.insert(
            Kind::Admin,
            json!({
                "id": ADMIN_ID,
                "name": "Mock Staffing",
                "scope": ADMIN_SCOPE,
                "countries": {"US": "active", "GB": "active"},
                "currencies": {"USD": "active", "GBP": "active"}
            }),
        );
        store.insert(
            Kind::Client,
            json!({"id": CLIENT_ID, "name": "Acme Fabrication", "admin_id": ADMIN_ID, "scope": CLIENT_SCOPE, "status": "active"}),
        );
        store.insert(
            Kind::Address,
            json!({"ref_type": "client", "ref_id": CLIENT_ID, "kind": "work", "name": "Plant 1", "line1": "1 Foundry Rd", "city": "Gary"}),
        );
        store.insert(
            Kind::Question,
            json!({"id": "q-control", "text": "Does the client control how the work is done?"}),
        );
        store.insert(
            Kind::Question,
            json!({"id": "q-tools", "text": "Does the client provide tools and equipment?"}),
        );
        store
    }

    /// Insert `record`, assigning an id when it has none. Returns the id.
    pub fn insert(&mut self, kind: Kind, mut record: Value) -> String {
        let id = match record.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        if let Some(obj) = record.as_object_mut() {
            obj.insert("id".to_string(), Value::String(id.clone()));
        }
        self.records.entry(kind).or_default().insert(id.clone(), record);
        id
    }

    #[must_use]
    pub fn get(&self, kind: Kind, id: &str) -> Option<&Value> {
        self.records.get(&kind)?.get(id)
    }

    fn get_mut(&mut self, kind: Kind, id: &str) -> Option<&mut Value> {
        self.records.get_mut(&kind)?.get_mut(id)
    }

    /// Look up by Service id, or by external id within `scope`.
    #[must_use]
    pub fn lookup(&self, kind: Kind, id: &str, scope: Option<&str>) -> Option<&Value> {
        match scope {
            None => self.get(kind, id),
            Some(scope) => self
                .list(kind)
                .find(|r| r["ext_id"] == id && r["ext_id_scope"] == scope),
        }
    }

    pub fn list(&self, kind: Kind) -> impl Iterator<Item = &Value> {
        self.records.get(&kind).into_iter().flat_map(BTreeMap::values)
    }

    #[must_use]
    pub fn count(&self, kind: Kind) -> usize {
        self.records.get(&kind).map_or(0, BTreeMap::len)
    }

    fn remove(&mut self, kind: Kind, id: &str) -> Option<Value> {
        self.records.get_mut(&kind)?.remove(id)
    }

    fn profiles_for(&self, key: &str) -> Option<&Vec<Value>> {
        self.profiles.get(key)
    }
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Debug, Default, Deserialize)]
pub struct Lookup {
    pub scope: Option<String>,
    pub extended: Option<String>,
    pub status: Option<String>,
    pub position_id: Option<String>,
}

type Reply = Result<Response, Response>;

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn fail(status: StatusCode, message: &str) -> Response {
    reply(status, json!({ "message": message }))
}

fn created(id: String) -> Reply {
    Ok(reply(StatusCode::CREATED, json!({ "id": id })))
}

fn not_found() -> Response {
    fail(StatusCode::NOT_FOUND, "Not Found")
}

/// The caller's single profile, or 403 for unknown keys.
fn authorize(store: &Store, headers: &HeaderMap) -> Result<Value, Response> {
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| fail(StatusCode::FORBIDDEN, "Forbidden"))?;
    let profiles = store
        .profiles_for(key)
        .ok_or_else(|| fail(StatusCode::FORBIDDEN, "Forbidden"))?;
    Ok(profiles.first().cloned().unwrap_or(Value::Null))
}

fn require_admin(profile: &Value) -> Result<(), Response> {
    let is_admin = profile["role"].as_str().is_some_and(|r| r.starts_with("gl"));
    if is_admin {
        Ok(())
    } else {
        Err(fail(StatusCode::FORBIDDEN, "admin role required"))
    }
}

fn object(body: Value) -> Result<Map<String, Value>, Response> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(fail(StatusCode::BAD_REQUEST, "body must be a JSON object")),
    }
}

fn require_field<'a>(body: &'a Map<String, Value>, field: &str) -> Result<&'a str, Response> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| fail(StatusCode::BAD_REQUEST, &format!("{field} is required")))
}

/// Reject an `ext_id` that arrives without its scope.
fn check_ext_id(body: &Map<String, Value>) -> Result<(), Response> {
    let has_ext_id = body.get("ext_id").is_some_and(|v| !v.is_null());
    let has_scope = body
        .get("ext_id_scope")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    if has_ext_id && !has_scope {
        return Err(fail(StatusCode::BAD_REQUEST, "ext_id requires ext_id_scope"));
    }
    Ok(())
}

pub fn app() -> Router {
    app_with(Arc::new(RwLock::new(Store::seeded())))
}

pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/version", get(version))
        .route("/profile", get(profile))
        .route("/admin/{id}", get(get_admin))
        .route("/admin/{id}/clients", get(admin_clients))
        .route("/client", post(create_client))
        .route("/client/{id}", get(get_client).delete(delete_client))
        .route("/client/{id}/addresses", get(client_addresses))
        .route("/client/{id}/jobs", get(client_jobs))
        .route("/project", post(create_project))
        .route("/project/{id}", get(get_project))
        .route("/position", post(create_position))
        .route("/position/{id}", get(get_position).put(update_position))
        .route("/position/{id}/action/approve", post(approve_position))
        .route("/question", get(questions))
        .route("/job_invite", post(invite))
        .route("/job/{id}", get(get_job).put(update_job))
        .route("/job/{id}/projects", get(job_projects))
        .route("/address", post(create_address))
        .route("/timesheet", post(create_timesheet))
        .route("/timesheet/{id}", get(get_timesheet))
        .route("/timesheet/{id}/action/submit", post(submit_timesheet))
        .route("/timesheet/{id}/action/approve", post(approve_timesheet))
        .route("/shift", post(create_shift))
        .route("/expense", post(create_expense))
        .route("/deliverable", post(create_deliverable))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn version() -> Json<Value> {
    Json(json!({ "hash": API_HASH }))
}

async fn profile(State(db): State<Db>, headers: HeaderMap) -> Reply {
    let store = db.read().await;
    let key = headers.get("x-api-key").and_then(|v| v.to_str().ok()).unwrap_or("");
    let profiles = store
        .profiles_for(key)
        .ok_or_else(|| fail(StatusCode::FORBIDDEN, "Forbidden"))?;
    Ok(reply(StatusCode::OK, Value::Array(profiles.clone())))
}

async fn get_admin(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(q): Query<Lookup>,
) -> Reply {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let admin = store.lookup(Kind::Admin, &id, q.scope.as_deref()).ok_or_else(not_found)?;
    Ok(reply(StatusCode::OK, admin.clone()))
}

async fn admin_clients(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let store = db.read().await;
    authorize(&store, &headers)?;
    store.get(Kind::Admin, &id).ok_or_else(not_found)?;
    let clients: Vec<Value> = store
        .list(Kind::Client)
        .filter(|c| c["admin_id"] == id.as_str())
        .cloned()
        .collect();
    Ok(reply(StatusCode::OK, Value::Array(clients)))
}

async fn create_client(State(db): State<Db>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let mut store = db.write().await;
    let profile = authorize(&store, &headers)?;
    require_admin(&profile)?;
    let mut body = object(body)?;
    require_field(&body, "name")?;
    let admin_id = require_field(&body, "admin_id")?.to_string();
    store.get(Kind::Admin, &admin_id).ok_or_else(|| fail(StatusCode::BAD_REQUEST, "unknown admin_id"))?;
    check_ext_id(&body)?;
    body.remove("id");
    body.insert("scope".to_string(), json!(format!("scope-{}", Uuid::new_v4())));
    body.insert("status".to_string(), json!("active"));
    let id = store.insert(Kind::Client, Value::Object(body));
    debug!(%id, "client created");
    created(id)
}

async fn get_client(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(q): Query<Lookup>,
) -> Reply {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let client = store.lookup(Kind::Client, &id, q.scope.as_deref()).ok_or_else(not_found)?;
    Ok(reply(StatusCode::OK, client.clone()))
}

async fn delete_client(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let mut store = db.write().await;
    let profile = authorize(&store, &headers)?;
    require_admin(&profile)?;
    store.remove(Kind::Client, &id).ok_or_else(not_found)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn client_addresses(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let store = db.read().await;
    authorize(&store, &headers)?;
    store.get(Kind::Client, &id).ok_or_else(not_found)?;
    let addresses: Vec<Value> = store
        .list(Kind::Address)
        .filter(|a| a["ref_type"] == "client" && a["ref_id"] == id.as_str())
        .cloned()
        .collect();
    Ok(reply(StatusCode::OK, Value::Array(addresses)))
}

async fn client_jobs(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(q): Query<Lookup>,
) -> Reply {
    let store = db.read().await;
    authorize(&store, &headers)?;
    store.get(Kind::Client, &id).ok_or_else(not_found)?;
    let jobs: Vec<Value> = store
        .list(Kind::Job)
        .filter(|j| j["client_id"] == id.as_str())
        .filter(|j| q.status.as_deref().is_none_or(|s| j["status"] == s))
        .cloned()
        .collect();
    Ok(reply(StatusCode::OK, Value::Array(jobs)))
}

async fn create_project(State(db): State<Db>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let mut body = object(body)?;
    let client_id = require_field(&body, "client_id")?.to_string();
    require_field(&body, "name")?;
    store.get(Kind::Client, &client_id).ok_or_else(|| fail(StatusCode::BAD_REQUEST, "unknown client_id"))?;
    check_ext_id(&body)?;
    body.remove("id");
    created(store.insert(Kind::Project, Value::Object(body)))
}

async fn get_project(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(q): Query<Lookup>,
) -> Reply {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let project = store.lookup(Kind::Project, &id, q.scope.as_deref()).ok_or_else(not_found)?;
    Ok(reply(StatusCode::OK, project.clone()))
}

async fn create_position(State(db): State<Db>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let mut body = object(body)?;
    let client_id = require_field(&body, "client_id")?.to_string();
    require_field(&body, "title")?;
    require_field(&body, "start_date")?;
    store.get(Kind::Client, &client_id).ok_or_else(|| fail(StatusCode::BAD_REQUEST, "unknown client_id"))?;
    check_ext_id(&body)?;
    body.remove("id");
    body.insert("status".to_string(), json!("pending"));
    body.insert("answers".to_string(), json!([]));
    created(store.insert(Kind::Position, Value::Object(body)))
}

async fn get_position(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(q): Query<Lookup>,
) -> Reply {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let position = store.lookup(Kind::Position, &id, q.scope.as_deref()).ok_or_else(not_found)?;
    Ok(reply(StatusCode::OK, position.clone()))
}

async fn update_position(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let body = object(body)?;
    let position = store.get_mut(Kind::Position, &id).ok_or_else(not_found)?;
    merge(position, body);
    // Any "yes" answer leaves room for independent-contractor status.
    let answers = position["answers"].as_array().cloned().unwrap_or_default();
    if !answers.is_empty() {
        let any_yes = answers.iter().any(|a| a["answer"] == true);
        position["classify_client_result"] = json!(if any_yes { "w2-or-ic" } else { "w2-only" });
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn approve_position(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let position = store.get_mut(Kind::Position, &id).ok_or_else(not_found)?;
    position["status"] = json!("approved");
    Ok(reply(StatusCode::OK, json!({ "id": id, "status": "approved" })))
}

async fn questions(State(db): State<Db>, headers: HeaderMap, Query(q): Query<Lookup>) -> Reply {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let questions: Vec<Value> = store
        .list(Kind::Question)
        .map(|question| {
            let mut question = question.clone();
            if let Some(position_id) = &q.position_id {
                question["position_id"] = json!(position_id);
            }
            question
        })
        .collect();
    Ok(reply(StatusCode::OK, Value::Array(questions)))
}

async fn invite(State(db): State<Db>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let body = object(body)?;
    let position_id = require_field(&body, "position_id")?;
    let position = store
        .get(Kind::Position, position_id)
        .ok_or_else(|| fail(StatusCode::BAD_REQUEST, "unknown position_id"))?;
    if position["status"] != "approved" {
        return Err(fail(StatusCode::BAD_REQUEST, "position is not approved"));
    }
    let projects = body.get("projects").and_then(Value::as_array).cloned().unwrap_or_default();
    if projects.is_empty() {
        return Err(fail(StatusCode::BAD_REQUEST, "at least one project is required"));
    }
    check_ext_id(&body)?;
    let job = json!({
        "position_id": position_id,
        "client_id": position["client_id"],
        "contractor_id": format!("ctr-{}", Uuid::new_v4()),
        "status": "invited",
        "worker": body.get("worker").cloned().unwrap_or(Value::Null),
        "projects": projects,
        "onboarding": {"w2_path": {"background_check": "not_started"}}
    });
    created(store.insert(Kind::Job, job))
}

async fn get_job(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(q): Query<Lookup>,
) -> Reply {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let mut job = store.lookup(Kind::Job, &id, q.scope.as_deref()).ok_or_else(not_found)?.clone();
    if q.extended.as_deref() != Some("true") {
        if let Some(obj) = job.as_object_mut() {
            obj.remove("onboarding");
        }
    }
    Ok(reply(StatusCode::OK, job))
}

async fn update_job(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let body = object(body)?;
    check_ext_id(&body)?;
    let job = store.get_mut(Kind::Job, &id).ok_or_else(not_found)?;
    merge(job, body);
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn job_projects(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let job = store.get(Kind::Job, &id).ok_or_else(not_found)?;
    let projects: Vec<Value> = job["projects"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|p| p["project_id"].as_str())
        .filter_map(|pid| store.get(Kind::Project, pid).cloned())
        .collect();
    Ok(reply(StatusCode::OK, Value::Array(projects)))
}

async fn create_address(State(db): State<Db>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let mut body = object(body)?;
    require_field(&body, "ref_type")?;
    require_field(&body, "ref_id")?;
    require_field(&body, "line1")?;
    body.remove("id");
    created(store.insert(Kind::Address, Value::Object(body)))
}

async fn create_timesheet(State(db): State<Db>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let mut body = object(body)?;
    let job_id = require_field(&body, "job_id")?;
    store.get(Kind::Job, job_id).ok_or_else(|| fail(StatusCode::BAD_REQUEST, "unknown job_id"))?;
    require_field(&body, "period_ending")?;
    check_ext_id(&body)?;
    body.remove("id");
    body.insert("status".to_string(), json!("draft"));
    created(store.insert(Kind::Timesheet, Value::Object(body)))
}

async fn get_timesheet(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(q): Query<Lookup>,
) -> Reply {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let timesheet = store.lookup(Kind::Timesheet, &id, q.scope.as_deref()).ok_or_else(not_found)?;
    Ok(reply(StatusCode::OK, timesheet.clone()))
}

async fn transition(db: Db, headers: HeaderMap, id: String, from: &str, to: &str) -> Reply {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let timesheet = store.get_mut(Kind::Timesheet, &id).ok_or_else(not_found)?;
    if timesheet["status"] != from {
        return Err(fail(StatusCode::CONFLICT, &format!("timesheet is not {from}")));
    }
    timesheet["status"] = json!(to);
    Ok(reply(StatusCode::OK, json!({ "id": id, "status": to })))
}

async fn submit_timesheet(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    transition(db, headers, id, "draft", "submitted").await
}

async fn approve_timesheet(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    transition(db, headers, id, "submitted", "approved").await
}

async fn create_entry(db: Db, headers: HeaderMap, body: Value, kind: Kind) -> Reply {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let mut body = object(body)?;
    let timesheet_id = require_field(&body, "timesheet_id")?;
    let timesheet = store
        .get(Kind::Timesheet, timesheet_id)
        .ok_or_else(|| fail(StatusCode::BAD_REQUEST, "unknown timesheet_id"))?;
    if timesheet["status"] != "draft" {
        return Err(fail(StatusCode::CONFLICT, "timesheet already submitted"));
    }
    require_field(&body, "job_id")?;
    require_field(&body, "project_id")?;
    body.remove("id");
    created(store.insert(kind, Value::Object(body)))
}

async fn create_shift(State(db): State<Db>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    create_entry(db, headers, body, Kind::Shift).await
}

async fn create_expense(State(db): State<Db>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    create_entry(db, headers, body, Kind::Expense).await
}

async fn create_deliverable(State(db): State<Db>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    create_entry(db, headers, body, Kind::Deliverable).await
}

/// Overwrite top-level fields of `record` with those in `update`.
fn merge(record: &mut Value, update: Map<String, Value>) {
    if let Some(obj) = record.as_object_mut() {
        for (k, v) in update {
            if k != "id" {
                obj.insert(k, v);
            }
        }
    }
}
