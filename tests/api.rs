use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use yuragi_haptic_core::api::broadcast::BroadcastHub;
use yuragi_haptic_core::api::{router, AppState};
use yuragi_haptic_core::config::Config;
use yuragi_haptic_core::engine::controller::Controller;
use yuragi_haptic_core::engine::yuragi::YuragiAnimator;

fn test_app() -> axum::Router {
  let controller = Arc::new(Controller::new(44_100, 512).unwrap());
  let animator = tokio::sync::Mutex::new(YuragiAnimator::new(Arc::clone(&controller)));
  let broadcast = BroadcastHub::new();
  let config = Config::from_env();
  let state = Arc::new(AppState { controller, animator, broadcast, config });
  router(state)
}

async fn json_body(response: axum::response::Response) -> Value {
  let bytes = response.into_body().collect().await.unwrap().to_bytes();
  serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn s1_health() {
  let app = test_app();
  let response = app.oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap()).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let body = json_body(response).await;
  assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn s2_parameter_round_trip() {
  let app = test_app();
  let payload = json!({
    "channels": [
      {"channel_id": 0, "freq": 60.0, "amp": 0.5, "phase": 0.0, "polarity": "rising"},
      {"channel_id": 1, "freq": 70.0, "amp": 0.6, "phase": 90.0, "polarity": "rising"},
      {"channel_id": 2, "freq": 80.0, "amp": 0.7, "phase": 180.0, "polarity": "falling"},
      {"channel_id": 3, "freq": 90.0, "amp": 0.8, "phase": 270.0, "polarity": "falling"}
    ]
  });
  let put_req = Request::builder()
    .method("PUT")
    .uri("/api/parameters")
    .header("content-type", "application/json")
    .body(Body::from(payload.to_string()))
    .unwrap();
  let response = app.clone().oneshot(put_req).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let get_req = Request::builder().uri("/api/parameters").body(Body::empty()).unwrap();
  let response = app.oneshot(get_req).await.unwrap();
  let body = json_body(response).await;
  let channels = body["channels"].as_array().unwrap();
  assert_eq!(channels[0]["frequency"], 60.0);
  assert_eq!(channels[0]["amplitude"], 0.5);
  assert_eq!(channels[1]["phase"], 90.0);
  assert_eq!(channels[2]["polarity"], "falling");
  assert_eq!(channels[3]["frequency"], 90.0);
}

#[tokio::test]
async fn s3_invalid_frequency_rejected_state_unchanged() {
  let app = test_app();
  let ok_payload = json!({"channels": [{"channel_id": 0, "freq": 60.0, "amp": 0.5}]});
  let put_req = Request::builder()
    .method("PUT")
    .uri("/api/parameters")
    .header("content-type", "application/json")
    .body(Body::from(ok_payload.to_string()))
    .unwrap();
  app.clone().oneshot(put_req).await.unwrap();

  let bad_payload = json!({"channels": [{"channel_id": 0, "freq": 200.0}]});
  let bad_req = Request::builder()
    .method("PUT")
    .uri("/api/parameters")
    .header("content-type", "application/json")
    .body(Body::from(bad_payload.to_string()))
    .unwrap();
  let response = app.clone().oneshot(bad_req).await.unwrap();
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);

  let get_req = Request::builder().uri("/api/parameters").body(Body::empty()).unwrap();
  let response = app.oneshot(get_req).await.unwrap();
  let body = json_body(response).await;
  assert_eq!(body["channels"][0]["frequency"], 60.0);
}

#[tokio::test]
async fn s4_waveform_snapshot() {
  let app = test_app();
  let setup = json!({"channels": [{"channel_id": 0, "freq": 60.0, "amp": 0.5}]});
  let put_req = Request::builder()
    .method("PUT")
    .uri("/api/parameters")
    .header("content-type", "application/json")
    .body(Body::from(setup.to_string()))
    .unwrap();
  app.clone().oneshot(put_req).await.unwrap();

  let activate = json!({"channels": [{"channel_id": 0, "freq": 60.0, "amp": 0.5}]});
  let req = Request::builder()
    .method("PUT")
    .uri("/api/channels/0")
    .header("content-type", "application/json")
    .body(Body::from(activate.to_string()))
    .unwrap();
  app.clone().oneshot(req).await.unwrap();

  let waveform_req = Request::builder()
    .method("POST")
    .uri("/api/waveform")
    .header("content-type", "application/json")
    .body(Body::from(json!({"duration_s": 0.01, "sample_rate": 44100}).to_string()))
    .unwrap();
  let response = app.oneshot(waveform_req).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let body = json_body(response).await;
  let channels = body["channels"].as_array().unwrap();
  assert_eq!(channels.len(), 4);
  for ch in channels {
    assert_eq!(ch["data"].as_array().unwrap().len(), 441);
  }
}

#[tokio::test]
async fn s5_vector_45_with_y_inversion() {
  let app = test_app();
  let req = Request::builder()
    .method("POST")
    .uri("/api/vector-force")
    .header("content-type", "application/json")
    .body(Body::from(json!({"device_id": 1, "angle": 45.0, "magnitude": 0.8, "frequency": 60.0}).to_string()))
    .unwrap();
  let response = app.clone().oneshot(req).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let get_req = Request::builder().uri("/api/parameters").body(Body::empty()).unwrap();
  let response = app.oneshot(get_req).await.unwrap();
  let body = json_body(response).await;
  let channels = body["channels"].as_array().unwrap();
  let amp0 = channels[0]["amplitude"].as_f64().unwrap();
  let amp1 = channels[1]["amplitude"].as_f64().unwrap();
  assert!((amp0 - 0.5657).abs() < 0.001);
  assert!((amp1 - 0.5657).abs() < 0.001);
  assert_eq!(channels[0]["polarity"], "rising");
  assert_eq!(channels[1]["polarity"], "falling");
}

#[tokio::test]
async fn s6_yuragi_default_enable_then_disable() {
  let app = test_app();
  let enable_req = Request::builder()
    .method("POST")
    .uri("/api/yuragi/preset")
    .header("content-type", "application/json")
    .body(Body::from(json!({"preset": "default", "duration": 60.0, "enabled": true}).to_string()))
    .unwrap();
  let response = app.clone().oneshot(enable_req).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let body = json_body(response).await;
  assert_eq!(body["status"], "applied");
  assert_eq!(body["preset"], "default");
  assert_eq!(body["parameters"]["angle"], 0.0);
  assert_eq!(body["parameters"]["magnitude"], 0.7);
  assert_eq!(body["parameters"]["frequency"], 60.0);
  assert_eq!(body["parameters"]["rotation_freq"], 0.33);

  let disable_req = Request::builder()
    .method("POST")
    .uri("/api/yuragi/preset")
    .header("content-type", "application/json")
    .body(Body::from(json!({"preset": "default", "duration": 60.0, "enabled": false}).to_string()))
    .unwrap();
  let response = app.oneshot(disable_req).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let body = json_body(response).await;
  assert_eq!(body["status"], "disabled");
  assert_eq!(body["parameters"]["magnitude"], 0.0);
  assert_eq!(body["parameters"]["rotation_freq"], 0.0);
}

#[tokio::test]
async fn invalid_channel_id_yields_400() {
  let app = test_app();
  let req = Request::builder()
    .method("PUT")
    .uri("/api/channels/9")
    .header("content-type", "application/json")
    .body(Body::from(json!({"freq": 60.0}).to_string()))
    .unwrap();
  let response = app.oneshot(req).await.unwrap();
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_device_id_on_vector_force_yields_400() {
  let app = test_app();
  let req = Request::builder()
    .method("POST")
    .uri("/api/vector-force")
    .header("content-type", "application/json")
    .body(Body::from(json!({"device_id": 3, "angle": 0.0, "magnitude": 0.5, "frequency": 60.0}).to_string()))
    .unwrap();
  let response = app.oneshot(req).await.unwrap();
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
