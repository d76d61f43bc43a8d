//! Router tests driven with `tower::ServiceExt::oneshot` against an
//! in-memory SQLite store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;
use vigil_core::{
  dispatch::{Dispatcher, PluginJob},
  plugin::{Plugin, PluginContext, PluginDescriptor, PluginOutcome, ResultStatus},
  registry::PluginRegistry,
  resource::{Resource, ResourceType},
  results::ResultStore,
};
use vigil_store_sqlite::SqliteStore;

use super::*;

#[derive(Default)]
struct Recorder(Mutex<Vec<PluginJob>>);

#[async_trait]
impl Dispatcher for Recorder {
  async fn submit(&self, job: PluginJob) -> vigil_core::Result<()> {
    self.0.lock().unwrap().push(job);
    Ok(())
  }
}

struct Probe(PluginDescriptor);

#[async_trait]
impl Plugin for Probe {
  fn descriptor(&self) -> PluginDescriptor { self.0.clone() }

  async fn execute(&self, _: &Resource, _: &PluginContext) -> PluginOutcome {
    PluginOutcome::no_results()
  }
}

fn probe(name: &str, autostart: bool, targets: &[ResourceType], keys: &[&str]) -> Arc<dyn Plugin> {
  Arc::new(Probe(PluginDescriptor {
    name:          name.into(),
    description:   String::new(),
    is_active:     false,
    autostart,
    disabled:      false,
    targets:       targets.to_vec(),
    needs_api_key: !keys.is_empty(),
    api_key_doc:   None,
    api_key_names: keys.iter().map(|k| k.to_string()).collect(),
  }))
}

struct Harness {
  state:      ApiState<SqliteStore>,
  dispatcher: Arc<Recorder>,
}

async fn harness() -> Harness {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let (registry, _) = PluginRegistry::build([
    probe("dns", true, &[ResourceType::Domain], &[]),
    probe("whois", false, &[ResourceType::Domain], &[]),
    probe("virustotal", false, &[ResourceType::Hash], &["virustotal"]),
  ]);
  let dispatcher = Arc::new(Recorder::default());
  let state = ApiState::new(store, Arc::new(registry), dispatcher.clone());
  Harness { state, dispatcher }
}

async fn send(
  state: &ApiState<SqliteStore>,
  method: &str,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let builder = Request::builder().method(method).uri(uri);
  let req = match body {
    Some(b) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(b.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  let resp = api_router(state.clone()).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

async fn create(state: &ApiState<SqliteStore>, name: &str, kind: &str) -> (StatusCode, Value) {
  send(
    state,
    "POST",
    "/resources",
    Some(json!({
      "name": name,
      "resource_type": kind,
      "project_id": Uuid::new_v4(),
    })),
  )
  .await
}

// ─── Resources ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_autostarts_once() {
  let h = harness().await;

  let (status, body) = create(&h.state, "example.com", "domain").await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["created"], json!(true));
  assert_eq!(body["launched"], json!(["dns"]));

  let (status, body) = create(&h.state, "example.com", "DOMAIN").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["created"], json!(false));
  assert_eq!(h.dispatcher.0.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn create_rejects_unknown_type() {
  let h = harness().await;
  let (status, body) = create(&h.state, "aa:bb:cc", "mac").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("mac"));
}

#[tokio::test]
async fn missing_resource_is_404() {
  let h = harness().await;
  let (status, _) = send(&h.state, "GET", &format!("/resources/{}", Uuid::new_v4()), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn render_over_http() {
  let h = harness().await;
  let (_, body) = create(&h.state, "render.example", "domain").await;
  let id: Uuid = serde_json::from_value(body["resource"]["resource_id"].clone()).unwrap();

  let results = ResultStore::new(Arc::clone(&h.state.store));
  for n in 1..=3 {
    results
      .record(Uuid::new_v4(), id, "dns", json!({ "n": n }), ResultStatus::Completed)
      .await
      .unwrap();
  }

  let (status, doc) = send(
    &h.state,
    "GET",
    &format!("/resources/{id}?history_index=1&history_limit=2"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let plugins = doc["plugins"].as_array().unwrap();
  assert_eq!(plugins.len(), 1);
  assert_eq!(plugins[0]["name"], json!("dns"));
  assert_eq!(plugins[0]["payload"], json!({ "n": 2 }));
  assert_eq!(plugins[0]["history"].as_array().unwrap().len(), 2);

  let (status, diff) = send(
    &h.state,
    "GET",
    &format!("/resources/{id}/plugins/dns/diff?index=2"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(diff["changes"], json!([
    { "path": "/n", "change": "changed", "from": 1, "to": 3 }
  ]));
}

#[tokio::test]
async fn diff_with_invalid_plugin_name_is_bad_request() {
  let h = harness().await;
  let (_, body) = create(&h.state, "badname.example", "domain").await;
  let id = body["resource"]["resource_id"].as_str().unwrap().to_owned();

  let (status, _) = send(
    &h.state,
    "GET",
    &format!("/resources/{id}/plugins/Bad%20Name/diff"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_and_tags() {
  let h = harness().await;
  let (_, body) = create(&h.state, "tags.example", "domain").await;
  let id = body["resource"]["resource_id"].as_str().unwrap().to_owned();

  let (status, hits) = send(&h.state, "GET", "/resources/search?q=TAGS", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(hits.as_array().unwrap().len(), 1);

  let tag = json!({ "name": "c2", "color": null });
  let (status, resource) =
    send(&h.state, "POST", &format!("/resources/{id}/tags"), Some(tag.clone())).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(resource["tags"], json!([tag]));

  let (_, resource) = send(&h.state, "POST", &format!("/resources/{id}/tags"), Some(tag)).await;
  assert_eq!(resource["tags"], json!([]));
}

// ─── Launch ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn launch_returns_started_or_client_errors() {
  let h = harness().await;
  let (_, body) = create(&h.state, "launch.example", "domain").await;
  let id = body["resource"]["resource_id"].as_str().unwrap().to_owned();
  let project = json!({ "project_id": Uuid::new_v4() });

  let (status, body) = send(
    &h.state,
    "POST",
    &format!("/resources/{id}/plugins/whois/launch"),
    Some(project.clone()),
  )
  .await;
  assert_eq!(status, StatusCode::ACCEPTED);
  assert_eq!(body, json!({ "status": "started" }));

  let (status, _) = send(
    &h.state,
    "POST",
    &format!("/resources/{id}/plugins/nope/launch"),
    Some(project.clone()),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = send(
    &h.state,
    "POST",
    &format!("/resources/{id}/plugins/virustotal/launch"),
    Some(project),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─── Plugins & keys ──────────────────────────────────────────────────────────

#[tokio::test]
async fn plugins_by_type() {
  let h = harness().await;
  let (_, list) = send(&h.state, "GET", "/plugins?type=domain", None).await;
  let names: Vec<&str> = list
    .as_array()
    .unwrap()
    .iter()
    .map(|d| d["name"].as_str().unwrap())
    .collect();
  assert_eq!(names, ["dns", "whois"]);

  let (_, all) = send(&h.state, "GET", "/plugins", None).await;
  assert_eq!(all.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn api_key_lifecycle() {
  let h = harness().await;

  let (_, unset) = send(&h.state, "GET", "/plugins/unset-api-keys", None).await;
  assert_eq!(unset, json!(["virustotal"]));

  let (status, _) = send(
    &h.state,
    "PUT",
    "/api-keys",
    Some(json!({ "name": "virustotal", "secret": "k" })),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, names) = send(&h.state, "GET", "/api-keys", None).await;
  assert_eq!(names, json!(["virustotal"]));
  let (_, unset) = send(&h.state, "GET", "/plugins/unset-api-keys", None).await;
  assert_eq!(unset, json!([]));

  let (status, _) = send(&h.state, "DELETE", "/api-keys/virustotal", None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = send(&h.state, "DELETE", "/api-keys/virustotal", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Updates ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn poll_and_health() {
  let h = harness().await;
  let (_, health) = send(&h.state, "GET", "/health", None).await;
  assert_eq!(health, json!({ "status": "ok", "last_update": null }));

  let project = Uuid::new_v4();
  let results = ResultStore::new(Arc::clone(&h.state.store));
  results
    .record(project, Uuid::new_v4(), "dns", json!([]), ResultStatus::ReturnNone)
    .await
    .unwrap();

  let (status, notices) =
    send(&h.state, "GET", &format!("/projects/{project}/updates"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(notices[0]["message"], json!("received no results"));
  assert_eq!(notices[0]["status"], json!("info"));

  let (status, notices) = send(
    &h.state,
    "GET",
    &format!("/projects/{project}/updates?until=2000-01-01T00:00:00Z"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(notices, json!([]));

  let (_, health) = send(&h.state, "GET", "/health", None).await;
  assert!(health["last_update"].is_string());
}
