use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use crate::api::broadcast::BroadcastHub;
use crate::config::Config;
use crate::engine::channel::ChannelParamsPatch;
use crate::engine::controller::{ChannelUpdate, Controller, VectorForceCommand};
use crate::engine::error::HapticError;
use crate::engine::waveform::Polarity;
use crate::engine::yuragi::{preset_by_name, YuragiAnimator};

impl IntoResponse for HapticError {
  fn into_response(self) -> Response {
    let status = match self {
      HapticError::InvalidParam(_) | HapticError::ModeDisabled => StatusCode::BAD_REQUEST,
      HapticError::AudioUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      HapticError::NotReady | HapticError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorBody { error: self.to_string() })).into_response()
  }
}

#[derive(Serialize)]
struct ErrorBody {
  error: String,
}

pub struct AppState {
  pub controller: Arc<Controller>,
  pub animator: AsyncMutex<YuragiAnimator>,
  pub broadcast: Arc<BroadcastHub>,
  pub config: Config,
}

pub fn router(state: Arc<AppState>) -> Router {
  let middleware = tower::ServiceBuilder::new()
    .layer(tower_http::trace::TraceLayer::new_for_http())
    .layer(cors_layer(&state.config.cors_origins));

  Router::new()
    .route("/api/health", get(health))
    .route("/api/parameters", get(get_parameters).put(put_parameters))
    .route("/api/channels/:id", put(patch_channel))
    .route("/api/waveform", post(post_waveform))
    .route("/api/vector-force", post(post_vector_force))
    .route("/api/yuragi/preset", post(post_yuragi_preset))
    .route("/api/streaming/status", get(get_streaming_status))
    .route("/api/streaming/start", post(post_streaming_start))
    .route("/api/streaming/stop", post(post_streaming_stop))
    .route("/api/device-info", get(get_device_info))
    .route("/api/ws", get(crate::api::ws::ws_handler))
    .layer(middleware)
    .with_state(state)
}

fn cors_layer(origins: &[String]) -> tower_http::cors::CorsLayer {
  use tower_http::cors::{AllowOrigin, CorsLayer};
  if origins.iter().any(|o| o == "*") {
    CorsLayer::new().allow_origin(AllowOrigin::any()).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
  } else {
    let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new().allow_origin(parsed).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
  }
}

#[derive(Serialize)]
struct HealthResponse {
  status: &'static str,
}

async fn health() -> Json<HealthResponse> {
  Json(HealthResponse { status: "healthy" })
}

#[derive(Serialize)]
struct ChannelDto {
  #[serde(rename = "channelId")]
  channel_id: u8,
  frequency: f32,
  amplitude: f32,
  phase: f32,
  polarity: Polarity,
}

#[derive(Serialize)]
struct ParametersResponse {
  channels: Vec<ChannelDto>,
}

fn snapshot_to_response(controller: &Controller) -> ParametersResponse {
  let channels = controller
    .get_current_parameters()
    .into_iter()
    .map(|c| ChannelDto {
      channel_id: c.channel_id,
      frequency: c.params.frequency_hz,
      amplitude: c.params.amplitude,
      phase: c.params.phase_deg,
      polarity: c.params.polarity,
    })
    .collect();
  ParametersResponse { channels }
}

async fn get_parameters(State(state): State<Arc<AppState>>) -> Json<ParametersResponse> {
  Json(snapshot_to_response(&state.controller))
}

#[derive(Deserialize)]
struct ChannelPatchDto {
  channel_id: u8,
  #[serde(default)]
  freq: Option<f32>,
  #[serde(default)]
  amp: Option<f32>,
  #[serde(default)]
  phase: Option<f32>,
  #[serde(default)]
  polarity: Option<Polarity>,
}

#[derive(Deserialize)]
struct ParametersPutRequest {
  channels: Vec<ChannelPatchDto>,
}

fn patch_dto_to_update(dto: &ChannelPatchDto) -> ChannelUpdate {
  ChannelUpdate {
    channel_id: dto.channel_id,
    patch: ChannelParamsPatch { frequency_hz: dto.freq, amplitude: dto.amp, phase_deg: dto.phase, polarity: dto.polarity },
  }
}

async fn put_parameters(
  State(state): State<Arc<AppState>>,
  Json(req): Json<ParametersPutRequest>,
) -> Result<Json<ParametersResponse>, HapticError> {
  let batch: Vec<ChannelUpdate> = req.channels.iter().map(patch_dto_to_update).collect();
  state.controller.update_parameters(&batch)?;
  let response = snapshot_to_response(&state.controller);
  state
    .broadcast
    .publish(crate::api::broadcast::BroadcastMessage::parameters_update(serde_json::to_value(&response).unwrap()));
  Ok(Json(response))
}

#[derive(Deserialize)]
struct SingleChannelPatchDto {
  #[serde(default)]
  freq: Option<f32>,
  #[serde(default)]
  amp: Option<f32>,
  #[serde(default)]
  phase: Option<f32>,
  #[serde(default)]
  polarity: Option<Polarity>,
}

async fn patch_channel(
  State(state): State<Arc<AppState>>,
  Path(id): Path<u8>,
  Json(req): Json<SingleChannelPatchDto>,
) -> Result<Json<ChannelDto>, HapticError> {
  let update = ChannelUpdate {
    channel_id: id,
    patch: ChannelParamsPatch { frequency_hz: req.freq, amplitude: req.amp, phase_deg: req.phase, polarity: req.polarity },
  };
  state.controller.update_parameters(std::slice::from_ref(&update))?;
  let snap = state
    .controller
    .get_current_parameters()
    .into_iter()
    .find(|c| c.channel_id == id)
    .ok_or_else(|| HapticError::InvalidParam(format!("channel id must be 0-3, got {id}")))?;
  Ok(Json(ChannelDto {
    channel_id: snap.channel_id,
    frequency: snap.params.frequency_hz,
    amplitude: snap.params.amplitude,
    phase: snap.params.phase_deg,
    polarity: snap.params.polarity,
  }))
}

#[derive(Deserialize)]
struct WaveformRequest {
  duration_s: f32,
  sample_rate: u32,
}

#[derive(Serialize)]
struct WaveformChannelDto {
  #[serde(rename = "channelId")]
  channel_id: u8,
  data: Vec<f32>,
}

#[derive(Serialize)]
struct WaveformResponse {
  timestamp: chrono::DateTime<chrono::Utc>,
  sample_rate: u32,
  channels: Vec<WaveformChannelDto>,
}

async fn post_waveform(
  State(state): State<Arc<AppState>>,
  Json(req): Json<WaveformRequest>,
) -> Result<Json<WaveformResponse>, HapticError> {
  if !(0.0..=1.0).contains(&req.duration_s) || req.duration_s <= 0.0 {
    return Err(HapticError::InvalidParam(format!("duration_s must be in (0, 1], got {}", req.duration_s)));
  }
  if req.sample_rate == 0 {
    return Err(HapticError::InvalidParam("sample_rate must be positive".into()));
  }
  let n = (req.duration_s as f64 * req.sample_rate as f64).round() as usize;
  let frame = state.controller.render_snapshot(n);
  let mut per_channel: Vec<Vec<f32>> = vec![Vec::with_capacity(n); crate::engine::device::NUM_CHANNELS];
  for k in 0..n {
    for (c, column) in per_channel.iter_mut().enumerate() {
      column.push(frame[k * crate::engine::device::NUM_CHANNELS + c]);
    }
  }
  let channels = per_channel
    .into_iter()
    .enumerate()
    .map(|(i, data)| WaveformChannelDto { channel_id: i as u8, data })
    .collect();
  Ok(Json(WaveformResponse { timestamp: chrono::Utc::now(), sample_rate: req.sample_rate, channels }))
}

#[derive(Deserialize)]
struct VectorForceRequest {
  device_id: u8,
  angle: f32,
  magnitude: f32,
  frequency: f32,
}

async fn post_vector_force(
  State(state): State<Arc<AppState>>,
  Json(req): Json<VectorForceRequest>,
) -> Result<Json<ParametersResponse>, HapticError> {
  state.controller.set_vector_force(VectorForceCommand {
    actuator: req.device_id,
    angle_deg: req.angle,
    magnitude: req.magnitude,
    frequency_hz: req.frequency,
  })?;
  let response = snapshot_to_response(&state.controller);
  state
    .broadcast
    .publish(crate::api::broadcast::BroadcastMessage::parameters_update(serde_json::to_value(&response).unwrap()));
  Ok(Json(response))
}

#[derive(Deserialize)]
struct YuragiPresetRequest {
  preset: String,
  duration: f64,
  enabled: bool,
}

#[derive(Serialize)]
struct YuragiParamsDto {
  angle: f32,
  magnitude: f32,
  frequency: f32,
  rotation_freq: f32,
}

#[derive(Serialize)]
struct YuragiPresetResponse {
  status: &'static str,
  preset: String,
  parameters: YuragiParamsDto,
}

async fn post_yuragi_preset(
  State(state): State<Arc<AppState>>,
  Json(req): Json<YuragiPresetRequest>,
) -> Result<Json<YuragiPresetResponse>, HapticError> {
  if !(30.0..=300.0).contains(&req.duration) {
    return Err(HapticError::InvalidParam(format!("duration must be in [30, 300]s, got {}", req.duration)));
  }
  let (name, preset) = preset_by_name(&req.preset);
  let mut animator = state.animator.lock().await;

  if req.enabled {
    for actuator in [1u8, 2u8] {
      animator.start(actuator, name, req.duration).await;
    }
    Ok(Json(YuragiPresetResponse {
      status: "applied",
      preset: name.to_string(),
      parameters: YuragiParamsDto {
        angle: preset.initial_angle_deg,
        magnitude: preset.magnitude,
        frequency: preset.carrier_hz,
        rotation_freq: preset.rotation_hz,
      },
    }))
  } else {
    animator.stop_all().await;
    Ok(Json(YuragiPresetResponse {
      status: "disabled",
      preset: name.to_string(),
      parameters: YuragiParamsDto { angle: preset.initial_angle_deg, magnitude: 0.0, frequency: preset.carrier_hz, rotation_freq: 0.0 },
    }))
  }
}

#[derive(Serialize)]
struct DeviceInfoDto {
  available: bool,
  channels: u8,
  name: String,
  device_mode: &'static str,
}

fn device_mode_for(channels: u8) -> &'static str {
  match channels {
    4 => "dual",
    2 => "single",
    _ => "none",
  }
}

async fn get_device_info(State(state): State<Arc<AppState>>) -> Json<DeviceInfoDto> {
  let info = state.controller.device_info();
  Json(DeviceInfoDto { available: info.available, channels: info.channels, name: info.name, device_mode: device_mode_for(info.channels) })
}

#[derive(Serialize)]
struct StreamingStatusResponse {
  is_streaming: bool,
  sample_rate: u32,
  block_size: usize,
  latency_ms: f64,
  device_info: DeviceInfoDto,
}

async fn get_streaming_status(State(state): State<Arc<AppState>>) -> Json<StreamingStatusResponse> {
  let status = state.controller.get_status();
  Json(StreamingStatusResponse {
    is_streaming: status.is_streaming,
    sample_rate: status.sample_rate,
    block_size: status.block_size,
    latency_ms: status.latency_ms,
    device_info: DeviceInfoDto {
      available: status.device_info.available,
      channels: status.device_info.channels,
      name: status.device_info.name,
      device_mode: device_mode_for(status.device_info.channels),
    },
  })
}

#[derive(Serialize)]
struct StreamingActionResponse {
  is_streaming: bool,
}

async fn post_streaming_start(State(state): State<Arc<AppState>>) -> Result<Json<StreamingActionResponse>, HapticError> {
  state.controller.start_streaming()?;
  Ok(Json(StreamingActionResponse { is_streaming: state.controller.is_streaming() }))
}

async fn post_streaming_stop(State(state): State<Arc<AppState>>) -> Json<StreamingActionResponse> {
  state.controller.stop_streaming();
  Json(StreamingActionResponse { is_streaming: state.controller.is_streaming() })
}
