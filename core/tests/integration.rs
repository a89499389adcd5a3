//! Workflows against the live mock Service.
//!
//! # Design
//! Starts the mock server on a random port, opens real sessions through
//! `UreqTransport`, and drives each operation over HTTP. Validates request
//! building, scope injection and response parsing end-to-end.

use chrono::NaiveDate;
use greenlight_core::{
    Answer, ApiError, Config, Deliverables, GreenLight, JobPolicies, NewAddress, NewClient, NewDeliverable,
    NewExpense, NewPosition, NewProject, NewShift, ProjectPay, RoleType, ShiftsExpenses, Stage, UreqTransport,
    Worker, WorkerDetails,
};
use mock_server::{ADMIN_ID, ADMIN_KEY, ADMIN_SCOPE, API_HASH, CLIENT_ID, CLIENT_KEY, CLIENT_SCOPE, ORPHAN_KEY, SHARED_KEY};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;

/// Start a fresh mock server on a random port and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn connect(base_url: &str, key: &str) -> Result<GreenLight, ApiError> {
    let config = Config::new(Stage::Staging)
        .with_base_url(base_url)
        .with_api_key(SecretString::from(key.to_string()))
        .with_log_bodies(true);
    GreenLight::with_transport(config, UreqTransport::new())
}

fn ext_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

fn new_position(client_id: &str, ext: Option<&str>) -> NewPosition {
    NewPosition {
        client_id: client_id.to_string(),
        title: "Line welder".to_string(),
        description: Some("MIG welding on the frame line".to_string()),
        start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        end_date: None,
        hourly: true,
        onsite_id: None,
        hm_id: None,
        classify_client_pref: None,
        ext_id: ext.map(str::to_string),
        ext_id_scope: None,
    }
}

fn worker() -> WorkerDetails {
    WorkerDetails {
        worker: Worker {
            first_name: "Dana".to_string(),
            last_name: "Ruiz".to_string(),
            email: "dana.ruiz@example.com".to_string(),
            phone: None,
        },
        mailing_address: Some(NewAddress {
            line1: "12 Elm St".to_string(),
            line2: None,
            city: "Gary".to_string(),
            state: "IN".to_string(),
            postal_code: "46402".to_string(),
            country: "US".to_string(),
        }),
        ext_id: Some(ext_id("worker")),
        ext_id_scope: None,
    }
}

#[test]
fn sessions_resolve_roles() {
    let base = start_server();

    let admin = connect(&base, ADMIN_KEY).unwrap();
    assert_eq!(admin.role_type(), RoleType::Admin);
    assert_eq!(admin.admin().unwrap().id, ADMIN_ID);
    assert!(admin.client().is_none());
    assert_eq!(admin.get_api_hash().unwrap(), API_HASH);

    let client = connect(&base, CLIENT_KEY).unwrap();
    assert_eq!(client.role_type(), RoleType::Client);
    assert_eq!(client.client().unwrap().id, CLIENT_ID);
    assert_eq!(client.admin().unwrap().id, ADMIN_ID);
    assert_eq!(client.scope(), Some(CLIENT_SCOPE));
    assert_eq!(client.get_admin(ADMIN_ID, None).unwrap().scope.as_deref(), Some(ADMIN_SCOPE));
}

#[test]
fn misconfigured_keys_fail_bootstrap() {
    let base = start_server();

    assert!(matches!(connect(&base, ORPHAN_KEY), Err(ApiError::ProfileCount(0))));
    assert!(matches!(connect(&base, SHARED_KEY), Err(ApiError::ProfileCount(2))));

    let err = connect(&base, "not-a-key").unwrap_err();
    assert_eq!(err.status(), Some(403));
}

#[test]
fn client_sessions_cannot_manage_clients() {
    let base = start_server();
    let client = connect(&base, CLIENT_KEY).unwrap();

    let err = client.get_admin_clients().unwrap_err();
    assert!(matches!(
        err,
        ApiError::Permission { required: RoleType::Admin, actual: RoleType::Client, .. }
    ));
    assert!(client.delete_client(CLIENT_ID).is_err());
    assert_eq!(client.select_client().unwrap().id, CLIENT_ID);
}

#[test]
fn admin_client_lifecycle() {
    let base = start_server();
    let admin = connect(&base, ADMIN_KEY).unwrap();

    let mine = ext_id("client");
    let created = admin
        .create_client(&NewClient {
            name: "Northwind Metals".to_string(),
            countries: [("US".to_string(), "active".to_string())].into(),
            currencies: [("USD".to_string(), "active".to_string())].into(),
            job_policies: JobPolicies::default(),
            ext_id: Some(mine.clone()),
            ext_id_scope: None,
        })
        .unwrap();

    // The session scope was filled in, so the external id resolves.
    let scope = admin.scope().unwrap();
    let by_ext = admin.get_client(&mine, Some(scope)).unwrap();
    assert_eq!(by_ext.id, created.id);
    assert_eq!(by_ext.admin_id, ADMIN_ID);

    let listed = admin.get_admin_clients().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(admin.select_client().unwrap().id, listed[0].id);

    let addresses = admin.get_client_addresses(CLIENT_ID).unwrap();
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0].city.as_deref(), Some("Gary"));

    let report = admin.delete_all_clients().unwrap();
    assert_eq!(report.deleted, 2);
    assert!(report.remaining.is_empty());

    let err = admin.get_client(&created.id, None).unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[test]
fn position_to_timesheets() {
    let base = start_server();
    let gl = connect(&base, CLIENT_KEY).unwrap();
    let client = gl.select_client().unwrap();

    // Project
    let project_ext = ext_id("project");
    let project = gl
        .create_project(&NewProject {
            client_id: client.id.clone(),
            name: "Frame line".to_string(),
            description: None,
            ext_id: Some(project_ext.clone()),
            ext_id_scope: None,
        })
        .unwrap();
    assert_eq!(gl.get_project(&project_ext, gl.scope()).unwrap().id, project.id);

    // Position, approved on creation
    let position_ext = ext_id("position");
    let created = gl.create_position(&new_position(&client.id, None), Some(&position_ext)).unwrap();
    let position = gl.get_position(&position_ext, gl.scope()).unwrap();
    assert_eq!(position.id, created.id);
    assert_eq!(position.status.as_deref(), Some("approved"));

    // Classification answers
    let questions = gl.get_questions_for_client(Some(&position.id)).unwrap();
    assert_eq!(questions.len(), 2);
    let answers: Vec<Answer> = questions
        .iter()
        .map(|q| Answer { question_id: q.id.clone(), answer: json!(false) })
        .collect();
    gl.add_position_answers(&position, &answers).unwrap();
    let position = gl.get_position(&position.id, None).unwrap();
    assert_eq!(position.answers.len(), 2);
    assert_eq!(position.classify_client_result.as_deref(), Some("w2-only"));

    // Invite
    let pay = [ProjectPay { project_id: project.id.clone(), pay_rate: Decimal::new(2850, 2), bill_rate: None }];
    let job_ext = ext_id("job");
    let job = gl.invite_worker(&position, &worker(), &pay, Some(&job_ext)).unwrap();
    assert_eq!(job.ext_id.as_deref(), Some(job_ext.as_str()));
    assert_eq!(job.ext_id_scope.as_deref(), Some(CLIENT_SCOPE));
    assert!(job.contractor_id.is_some());

    let projects = gl.get_job_projects(&job.id).unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, project.id);

    let status = gl.get_background_check_status(&job_ext, gl.scope()).unwrap();
    assert_eq!(status, json!("not_started"));
    assert!(gl.get_client_active_jobs(&client.id).unwrap().is_empty());

    // Hours timesheet, submitted and approved
    let hours = ShiftsExpenses {
        job_id: job.id.clone(),
        shifts: vec![
            NewShift {
                project_id: project.id.clone(),
                time_in: "2024-03-04T08:00:00-05:00".to_string(),
                time_out: "2024-03-04T16:30:00-05:00".to_string(),
                break_minutes: Some(30),
            },
            NewShift {
                project_id: project.id.clone(),
                time_in: "2024-03-06T08:00:00-05:00".to_string(),
                time_out: "2024-03-06T16:00:00-05:00".to_string(),
                break_minutes: None,
            },
        ],
        expenses: vec![NewExpense {
            project_id: project.id.clone(),
            date: "2024-03-05".to_string(),
            amount: Decimal::new(4210, 2),
            category: Some("mileage".to_string()),
            description: None,
        }],
    };
    let timesheet_ext = ext_id("ts");
    let timesheet = gl
        .create_timesheet_with_shifts_expenses(&hours, Some(&timesheet_ext), true)
        .unwrap();
    let fetched = gl.get_timesheet(&timesheet_ext, gl.scope()).unwrap();
    assert_eq!(fetched.id, timesheet);
    assert_eq!(fetched.status.as_deref(), Some("approved"));
    assert_eq!(fetched.period_ending.as_deref(), Some("2024-03-10T22:59:59-05:00"));

    // Invoice timesheet, submitted only
    let invoice = Deliverables {
        job_id: job.id.clone(),
        deliverables: vec![NewDeliverable {
            project_id: project.id.clone(),
            date: "2024-03-08".to_string(),
            amount: Decimal::new(120_000, 2),
            description: Some("Fixture design".to_string()),
        }],
    };
    let invoice_id = gl.create_timesheet_with_deliverables(&invoice, None, false).unwrap();
    assert_ne!(invoice_id, timesheet);
    assert_eq!(gl.get_timesheet(&invoice_id, None).unwrap().status.as_deref(), Some("submitted"));

    // Approving twice fails: the timesheet is no longer submitted.
    let err = gl.approve_timesheet(&timesheet).unwrap_err();
    assert_eq!(err.status(), Some(409));
}

#[test]
fn repeated_invites_create_distinct_jobs() {
    let base = start_server();
    let gl = connect(&base, CLIENT_KEY).unwrap();

    let created = gl.create_position(&new_position(CLIENT_ID, None), None).unwrap();
    let position = gl.get_position(&created.id, None).unwrap();
    let pay = [ProjectPay { project_id: "unlisted".to_string(), pay_rate: Decimal::new(20, 0), bill_rate: None }];
    let details = WorkerDetails { mailing_address: None, ..worker() };

    let first = gl.invite_worker(&position, &details, &pay, None).unwrap();
    let second = gl.invite_worker(&position, &details, &pay, None).unwrap();
    assert_ne!(first.id, second.id);
    assert_ne!(first.contractor_id, second.contractor_id);
}

#[test]
fn failed_step_reports_incomplete_workflow() {
    let base = start_server();
    let gl = connect(&base, CLIENT_KEY).unwrap();

    let created = gl.create_position(&new_position(CLIENT_ID, None), None).unwrap();
    let position = gl.get_position(&created.id, None).unwrap();
    let pay = [ProjectPay { project_id: "p".to_string(), pay_rate: Decimal::new(20, 0), bill_rate: None }];

    // The mock rejects an address without a first line, after the job exists.
    let mut details = worker();
    if let Some(address) = details.mailing_address.as_mut() {
        address.line1 = String::new();
    }
    let err = gl.invite_worker(&position, &details, &pay, None).unwrap_err();
    let ApiError::Incomplete { workflow, resource_id, .. } = &err else {
        panic!("expected Incomplete, got {err:?}");
    };
    assert_eq!(*workflow, "invite_worker");
    assert_eq!(err.status(), Some(400));
    assert!(gl.get_job(resource_id, None).is_ok());

    // Nothing exists yet when the first step fails.
    let hours = ShiftsExpenses {
        job_id: "no-such-job".to_string(),
        shifts: vec![NewShift {
            project_id: "p".to_string(),
            time_in: "2024-03-04T08:00:00-05:00".to_string(),
            time_out: "2024-03-04T12:00:00-05:00".to_string(),
            break_minutes: None,
        }],
        expenses: Vec::new(),
    };
    let err = gl.create_timesheet_with_shifts_expenses(&hours, None, false).unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(!matches!(err, ApiError::Incomplete { .. }));
}
