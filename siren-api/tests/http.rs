//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use siren_api::{AppState, router};
use siren_core::{
    DepotPolicy, OrchestratorConfig, SqliteDispatchStore, VehicleType,
    test_support::{MemoryStore, edges, write_sqlite_network, zones},
};
use tempfile::TempDir;
use tower::ServiceExt;

/// Zones deliberately out of code order; A is the ambulance depot.
fn network() -> (Vec<siren_core::Zone>, Vec<siren_core::Edge>) {
    let mut network = zones(&[
        ("C", "Charlie"),
        ("A", "Alpha"),
        ("B", "Bravo"),
        ("D", "Delta"),
    ]);
    for (zone, ambulances) in network.iter_mut().zip([0, 2, 0, 1]) {
        zone.inventory.ambulance = ambulances;
        zone.inventory.police = 1;
    }
    if let Some(depot) = network.get_mut(1) {
        depot.depots.ambulance = true;
    }
    let links = edges(&[
        ("A", "B", 5.0),
        ("B", "C", 3.0),
        ("A", "C", 10.0),
        ("C", "D", 4.0),
    ]);
    (network, links)
}

#[fixture]
fn store() -> Arc<MemoryStore> {
    let (zone_list, edge_list) = network();
    Arc::new(MemoryStore::new(zone_list, edge_list))
}

fn app(store: &Arc<MemoryStore>) -> Router {
    router(AppState::new(Arc::clone(store) as Arc<dyn siren_api::DispatchBackend>))
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router responds");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let body = serde_json::from_slice(&bytes).expect("body is JSON");
    (status, body)
}

#[rstest]
#[tokio::test]
async fn depot_dispatch_returns_the_route(store: Arc<MemoryStore>) {
    let (status, body) = send(
        app(&store),
        post_json(
            "/dispatch",
            r#"{"destinationZoneCode": "C", "vehicleType": "ambulance"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["sourceZipCode"], json!("A"));
    assert_eq!(body["destZipCode"], json!("C"));
    assert_eq!(body["path"], json!(["A", "B", "C"]));
    assert_eq!(body["distance"], json!(8.0));
    assert_eq!(
        body["message"],
        json!("ambulance dispatched from depot A to C (8 km)")
    );
    assert_eq!(body["mstEdges"].as_array().map(Vec::len), Some(3));
    assert_eq!(store.available("A", VehicleType::Ambulance), Some(1));
}

#[rstest]
#[tokio::test]
async fn legacy_field_name_is_accepted(store: Arc<MemoryStore>) {
    let (status, body) = send(
        app(&store),
        post_json(
            "/dispatch",
            r#"{"destinationZipCode": "A", "vehicleType": "ambulance"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], json!(["A"]));
    assert_eq!(body["distance"], json!(0.0));
}

#[rstest]
#[tokio::test]
async fn incident_dispatch_uses_the_nearest_unit(store: Arc<MemoryStore>) {
    let (status, body) = send(
        app(&store),
        post_json(
            "/dispatch",
            r#"{"sourceZoneCode": "C", "vehicleType": "ambulance"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sourceZipCode"], json!("D"));
    assert_eq!(body["path"], json!(["D", "C"]));
    assert_eq!(store.available("D", VehicleType::Ambulance), Some(0));
}

#[rstest]
#[case::both_targets(
    r#"{"destinationZoneCode": "C", "sourceZoneCode": "B", "vehicleType": "police"}"#,
    "provide either destinationZoneCode or sourceZoneCode, not both"
)]
#[case::no_target(
    r#"{"vehicleType": "police"}"#,
    "destinationZoneCode or sourceZoneCode is required"
)]
#[case::unknown_zone(
    r#"{"destinationZoneCode": "Z", "vehicleType": "ambulance"}"#,
    "zone code Z not found"
)]
#[case::no_depot(
    r#"{"destinationZoneCode": "C", "vehicleType": "police"}"#,
    "no depot found for police"
)]
#[tokio::test]
async fn rejected_dispatches_use_the_failure_envelope(
    store: Arc<MemoryStore>,
    #[case] payload: &str,
    #[case] message: &str,
) {
    let (status, body) = send(app(&store), post_json("/dispatch", payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": message }));
    assert!(store.dispatches().is_empty());
}

#[rstest]
#[tokio::test]
async fn malformed_json_is_a_bad_request(store: Arc<MemoryStore>) {
    let (status, body) = send(app(&store), post_json("/dispatch", "{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].is_string());
}

#[rstest]
#[tokio::test]
async fn store_failures_are_not_leaked(store: Arc<MemoryStore>) {
    store.fail_claims();
    let (status, body) = send(
        app(&store),
        post_json(
            "/dispatch",
            r#"{"destinationZoneCode": "C", "vehicleType": "ambulance"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("dispatch store unavailable"));
    assert_eq!(store.available("A", VehicleType::Ambulance), Some(2));
}

#[rstest]
#[tokio::test]
async fn depot_policy_comes_from_state(store: Arc<MemoryStore>) {
    let state = AppState::new(Arc::clone(&store) as Arc<dyn siren_api::DispatchBackend>)
        .with_config(OrchestratorConfig {
            depot_policy: DepotPolicy::Nearest,
            ..OrchestratorConfig::default()
        });
    assert_eq!(state.config().depot_policy, DepotPolicy::Nearest);

    let (status, body) = send(
        router(state),
        post_json(
            "/dispatch",
            r#"{"destinationZoneCode": "B", "vehicleType": "ambulance"}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], json!(["A", "B"]));
}

#[rstest]
#[tokio::test]
async fn preflight_allows_console_headers(store: Arc<MemoryStore>) {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/dispatch")
        .header(header::ORIGIN, "https://console.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "apikey, content-type")
        .body(Body::empty())
        .expect("request builds");
    let response = app(&store).oneshot(request).await.expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
    let allowed = headers
        .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    for name in ["authorization", "x-client-info", "apikey", "content-type"] {
        assert!(allowed.contains(name), "{name} missing from {allowed}");
    }
}

#[rstest]
#[tokio::test]
async fn zones_are_listed_by_code(store: Arc<MemoryStore>) {
    let (status, body) = send(app(&store), get("/zones")).await;

    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = body
        .as_array()
        .expect("zone list")
        .iter()
        .filter_map(|zone| zone["code"].as_str())
        .collect();
    assert_eq!(codes, ["A", "B", "C", "D"]);
    assert_eq!(body[0]["inventory"]["ambulance"], json!(2));
    assert_eq!(body[0]["depots"]["ambulance"], json!(true));
}

#[rstest]
#[tokio::test]
async fn fleet_totals_follow_dispatches(store: Arc<MemoryStore>) {
    let (_, before) = send(app(&store), get("/fleet")).await;
    assert_eq!(
        before,
        json!({ "ambulance": 3, "fire_truck": 0, "police": 4 })
    );

    let (status, _) = send(
        app(&store),
        post_json(
            "/dispatch",
            r#"{"sourceZoneCode": "B", "vehicleType": "police"}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, after) = send(app(&store), get("/fleet")).await;
    assert_eq!(after["police"], json!(3));
}

#[rstest]
#[tokio::test]
async fn network_view_spans_every_zone(store: Arc<MemoryStore>) {
    let (status, body) = send(app(&store), get("/network")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["zones"], json!(["C", "A", "B", "D"]));
    assert_eq!(body["edges"].as_array().map(Vec::len), Some(4));
    assert_eq!(body["mstEdges"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["componentCount"], json!(1));
}

#[rstest]
#[tokio::test]
async fn invalid_history_limit_is_rejected(store: Arc<MemoryStore>) {
    let (status, body) = send(app(&store), get("/dispatches?limit=many")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[rstest]
#[tokio::test]
async fn health_reports_ok(store: Arc<MemoryStore>) {
    let (status, body) = send(app(&store), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn sqlite_history_is_newest_first() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("dispatch.db");
    let (zone_list, edge_list) = network();
    write_sqlite_network(&path, &zone_list, &edge_list).expect("persist network");
    let store = SqliteDispatchStore::open(&path).expect("open store");
    let state = AppState::new(Arc::new(store));

    for destination in ["C", "B"] {
        let payload =
            format!(r#"{{"destinationZoneCode": "{destination}", "vehicleType": "ambulance"}}"#);
        let (status, _) = send(router(state.clone()), post_json("/dispatch", &payload)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(router(state.clone()), get("/dispatches?limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["dest_code"], json!("B"));

    let (_, all) = send(router(state), get("/dispatches")).await;
    assert_eq!(all.as_array().map(Vec::len), Some(2));
}
