use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};

use crate::engine::channel::{ChannelParams, ChannelParamsPatch};
use crate::engine::device::{Device, NUM_CHANNELS};
use crate::engine::error::{HapticError, HapticResult};

const LATENCY_RING_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
  pub available: bool,
  pub channels: u8,
  pub name: String,
}

#[derive(Debug, Clone)]
pub struct ChannelUpdate {
  pub channel_id: u8,
  pub patch: ChannelParamsPatch,
}

#[derive(Debug, Clone)]
pub struct VectorForceCommand {
  pub actuator: u8,
  pub angle_deg: f32,
  pub magnitude: f32,
  pub frequency_hz: f32,
}

#[derive(Debug, Clone)]
pub struct ChannelSnapshot {
  pub channel_id: u8,
  pub params: ChannelParams,
  pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct ControllerStatus {
  pub is_streaming: bool,
  pub sample_rate: u32,
  pub block_size: usize,
  pub channels: Vec<ChannelSnapshot>,
  pub latency_ms: f64,
  pub device_info: AudioDeviceInfo,
}

struct AudioState {
  device: Device,
  stop_flag: bool,
}

/// The live `cpal::Stream` never leaves the thread that built it: `cpal::Stream`
/// is `!Send` on several host backends (ALSA included), so it cannot be parked
/// inside a struct shared behind `Arc` with an async API surface. A dedicated
/// OS thread owns the stream for its entire lifetime; `stop_tx` is the only
/// thing that crosses back out, mirroring the teacher's own rule that no
/// engine/stream is ever stored in shared state — only a channel `Sender` is.
struct AudioThreadHandle {
  stop_tx: Sender<()>,
  join: JoinHandle<()>,
}

/// Owns the `Device`, its parameter mutex, latency statistics and a handle
/// to the dedicated thread that owns the platform audio stream. The device
/// mutex is the single point of serialization between API/animator writers
/// and the audio callback reader; writers hold it only for the duration of
/// one batch.
pub struct Controller {
  sample_rate: u32,
  block_size: usize,
  state: Arc<Mutex<AudioState>>,
  latency_ring: Arc<Mutex<VecDeque<f64>>>,
  device_info: AudioDeviceInfo,
  audio_thread: Mutex<Option<AudioThreadHandle>>,
}

impl Controller {
  pub fn new(sample_rate: u32, block_size: usize) -> HapticResult<Self> {
    let device = Device::new(sample_rate as f32)?;
    let device_info = detect_audio_device();
    Ok(Self {
      sample_rate,
      block_size,
      state: Arc::new(Mutex::new(AudioState { device, stop_flag: true })),
      latency_ring: Arc::new(Mutex::new(VecDeque::with_capacity(LATENCY_RING_CAPACITY))),
      device_info,
      audio_thread: Mutex::new(None),
    })
  }

  pub fn sample_rate(&self) -> u32 {
    self.sample_rate
  }

  pub fn block_size(&self) -> usize {
    self.block_size
  }

  pub fn device_info(&self) -> AudioDeviceInfo {
    self.device_info.clone()
  }

  pub fn is_streaming(&self) -> bool {
    self.audio_thread.lock().expect("audio thread handle mutex poisoned").is_some()
  }

  /// Validates every update in `batch` against the current snapshot before
  /// committing any of them, so a failure partway through the batch can
  /// never leave the device half-updated (spec's "validate entire batch
  /// first; apply atomically or not at all").
  pub fn update_parameters(&self, batch: &[ChannelUpdate]) -> HapticResult<()> {
    let mut state = self.state.lock().expect("controller mutex poisoned");

    for update in batch {
      let current = state
        .device
        .channel(update.channel_id)
        .ok_or_else(|| HapticError::InvalidParam(format!("channel id must be 0-3, got {}", update.channel_id)))?
        .params();
      let mut next = current;
      if let Some(f) = update.patch.frequency_hz {
        next.frequency_hz = f;
      }
      if let Some(a) = update.patch.amplitude {
        next.amplitude = a;
      }
      crate::engine::waveform::validate_params(next.frequency_hz, next.amplitude)?;
    }

    for update in batch {
      state.device.set_channel_params(update.channel_id, update.patch)?;
      if update.patch.amplitude.unwrap_or(0.0) > 0.0 {
        state.device.activate_channel(update.channel_id)?;
      }
    }
    Ok(())
  }

  pub fn get_current_parameters(&self) -> Vec<ChannelSnapshot> {
    let state = self.state.lock().expect("controller mutex poisoned");
    state
      .device
      .channels()
      .iter()
      .map(|ch| ChannelSnapshot { channel_id: ch.id, params: ch.params(), is_active: ch.is_active() })
      .collect()
  }

  pub fn set_vector_force(&self, cmd: VectorForceCommand) -> HapticResult<()> {
    let mut state = self.state.lock().expect("controller mutex poisoned");
    state.device.set_vector_force(cmd.actuator, cmd.angle_deg, cmd.magnitude, cmd.frequency_hz)
  }

  pub fn get_latency_ms(&self) -> f64 {
    let ring = self.latency_ring.lock().expect("latency ring poisoned");
    if ring.is_empty() {
      1000.0 * self.block_size as f64 / self.sample_rate as f64
    } else {
      ring.iter().sum::<f64>() / ring.len() as f64
    }
  }

  pub fn get_status(&self) -> ControllerStatus {
    ControllerStatus {
      is_streaming: self.is_streaming(),
      sample_rate: self.sample_rate,
      block_size: self.block_size,
      channels: self.get_current_parameters(),
      latency_ms: self.get_latency_ms(),
      device_info: self.device_info(),
    }
  }

  /// One-shot render path used by the waveform snapshot endpoint. Runs the
  /// live channels directly, which couples the snapshot read to playback
  /// phase: the read advances the same tau the audio callback would have
  /// advanced. Callers that need a read-only view should render from a
  /// separate `Device` clone instead.
  pub fn render_snapshot(&self, n_samples: usize) -> Vec<f32> {
    let mut state = self.state.lock().expect("controller mutex poisoned");
    state.device.compose_block(n_samples)
  }

  /// Spawns a dedicated thread that opens the host audio stream and parks
  /// there for the stream's entire lifetime; the audio callback (running
  /// on cpal's own realtime thread, spawned by that stream) is the sole
  /// render site. Only a `stop` signal and a join handle come back across
  /// threads — the `cpal::Stream` itself never does. Idempotent: a second
  /// call while already streaming is a no-op.
  pub fn start_streaming(&self) -> HapticResult<()> {
    if self.is_streaming() {
      return Ok(());
    }
    if !self.device_info.available {
      return Err(HapticError::AudioUnavailable(self.device_info.name.clone()));
    }

    {
      let mut state = self.state.lock().expect("controller mutex poisoned");
      state.stop_flag = false;
    }

    let state = Arc::clone(&self.state);
    let latency_ring = Arc::clone(&self.latency_ring);
    let available_channels = self.device_info.channels as usize;
    let sample_rate = self.sample_rate;
    let block_size = self.block_size;

    let (stop_tx, stop_rx) = bounded::<()>(1);
    let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);

    let join = std::thread::spawn(move || {
      let opened = open_stream(sample_rate, block_size, available_channels, state, latency_ring);
      let stream = match opened {
        Ok(stream) => {
          let _ = ready_tx.send(Ok(()));
          stream
        }
        Err(e) => {
          let _ = ready_tx.send(Err(e));
          return;
        }
      };
      // Park here, keeping `stream` alive (and thus playing) until told to
      // stop; dropping it on this same thread is what tears it down.
      let _ = stop_rx.recv();
      drop(stream);
    });

    match ready_rx.recv() {
      Ok(Ok(())) => {
        *self.audio_thread.lock().expect("audio thread handle mutex poisoned") = Some(AudioThreadHandle { stop_tx, join });
        Ok(())
      }
      Ok(Err(e)) => {
        let mut state = self.state.lock().expect("controller mutex poisoned");
        state.stop_flag = true;
        let _ = join.join();
        Err(HapticError::AudioUnavailable(e))
      }
      Err(_) => {
        let mut state = self.state.lock().expect("controller mutex poisoned");
        state.stop_flag = true;
        Err(HapticError::AudioUnavailable("audio thread terminated unexpectedly".into()))
      }
    }
  }

  /// Signals the audio thread to drop its stream and waits for it to exit.
  /// Idempotent.
  pub fn stop_streaming(&self) {
    let handle = self.audio_thread.lock().expect("audio thread handle mutex poisoned").take();
    {
      let mut state = self.state.lock().expect("controller mutex poisoned");
      state.stop_flag = true;
    }
    if let Some(handle) = handle {
      let _ = handle.stop_tx.send(());
      let _ = handle.join.join();
    }
  }
}

/// Builds and plays the host output stream on the calling thread, which the
/// caller must be prepared to own the returned `cpal::Stream` for as long as
/// audio should keep playing; the stream stops the moment it is dropped.
fn open_stream(
  sample_rate: u32,
  block_size: usize,
  available_channels: usize,
  state: Arc<Mutex<AudioState>>,
  latency_ring: Arc<Mutex<VecDeque<f64>>>,
) -> Result<cpal::Stream, String> {
  let host = cpal::default_host();
  let device = host.default_output_device().ok_or_else(|| "no output device".to_string())?;
  let mut cfg: cpal::StreamConfig = device.default_output_config().map_err(|e| e.to_string())?.into();
  cfg.channels = available_channels.max(1) as u16;
  cfg.sample_rate = cpal::SampleRate(sample_rate);
  cfg.buffer_size = cpal::BufferSize::Fixed(block_size as u32);

  let err_fn = |e: cpal::StreamError| tracing::error!(error = %e, "audio stream error");
  let stream = device
    .build_output_stream(
      &cfg,
      move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        let t0 = Instant::now();

        let stopped = {
          let st = state.lock().expect("controller mutex poisoned");
          st.stop_flag
        };
        if stopped {
          data.fill(0.0);
          return;
        }

        let frames = data.len() / available_channels.max(1);
        let rendered = {
          let mut st = state.lock().expect("controller mutex poisoned");
          st.device.compose_block(frames)
        };

        for f in 0..frames {
          for c in 0..available_channels {
            let src_idx = f * NUM_CHANNELS + c;
            data[f * available_channels + c] = rendered.get(src_idx).copied().unwrap_or(0.0);
          }
        }

        let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
        let mut ring = latency_ring.lock().expect("latency ring poisoned");
        ring.push_back(elapsed_ms);
        if ring.len() > LATENCY_RING_CAPACITY {
          ring.pop_front();
        }
      },
      err_fn,
      None,
    )
    .map_err(|e| e.to_string())?;

  stream.play().map_err(|e| e.to_string())?;
  Ok(stream)
}

fn detect_audio_device() -> AudioDeviceInfo {
  let host = cpal::default_host();
  let Some(device) = host.default_output_device() else {
    return AudioDeviceInfo { available: false, channels: 0, name: "no output device".into() };
  };

  let name = device.name().unwrap_or_else(|_| "unknown".into());

  if let Ok(default_cfg) = device.default_output_config() {
    let ch = default_cfg.channels();
    if ch >= 4 {
      return AudioDeviceInfo { available: true, channels: 4, name };
    } else if ch >= 2 {
      return AudioDeviceInfo { available: true, channels: 2, name };
    }
  }

  if let Ok(configs) = device.supported_output_configs() {
    for cfg in configs {
      if cfg.channels() >= 4 {
        return AudioDeviceInfo { available: true, channels: 4, name };
      }
    }
  }
  if let Ok(configs) = device.supported_output_configs() {
    for cfg in configs {
      if cfg.channels() >= 2 {
        return AudioDeviceInfo { available: true, channels: 2, name };
      }
    }
  }

  AudioDeviceInfo { available: false, channels: 0, name: "no suitable output device".into() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn latency_falls_back_to_theoretical_value_when_ring_empty() {
    let controller = Controller::new(44_100, 512).unwrap();
    let expected = 1000.0 * 512.0 / 44_100.0;
    assert!((controller.get_latency_ms() - expected).abs() < 1e-9);
  }

  #[test]
  fn batch_update_is_atomic_on_validation_failure() {
    let controller = Controller::new(44_100, 512).unwrap();
    let before = controller.get_current_parameters();
    let batch = vec![
      ChannelUpdate { channel_id: 0, patch: ChannelParamsPatch { frequency_hz: Some(60.0), ..Default::default() } },
      ChannelUpdate { channel_id: 9, patch: ChannelParamsPatch { frequency_hz: Some(60.0), ..Default::default() } },
    ];
    assert!(controller.update_parameters(&batch).is_err());
    let after = controller.get_current_parameters();
    for (b, a) in before.iter().zip(after.iter()) {
      assert_eq!(b.params.frequency_hz, a.params.frequency_hz);
    }
  }

  #[test]
  fn scenario_s2_parameter_round_trip() {
    let controller = Controller::new(44_100, 512).unwrap();
    let batch = vec![
      ChannelUpdate {
        channel_id: 0,
        patch: ChannelParamsPatch {
          frequency_hz: Some(60.0),
          amplitude: Some(0.5),
          phase_deg: Some(0.0),
          polarity: Some(crate::engine::waveform::Polarity::Rising),
        },
      },
      ChannelUpdate {
        channel_id: 1,
        patch: ChannelParamsPatch {
          frequency_hz: Some(70.0),
          amplitude: Some(0.6),
          phase_deg: Some(90.0),
          polarity: Some(crate::engine::waveform::Polarity::Rising),
        },
      },
      ChannelUpdate {
        channel_id: 2,
        patch: ChannelParamsPatch {
          frequency_hz: Some(80.0),
          amplitude: Some(0.7),
          phase_deg: Some(180.0),
          polarity: Some(crate::engine::waveform::Polarity::Falling),
        },
      },
      ChannelUpdate {
        channel_id: 3,
        patch: ChannelParamsPatch {
          frequency_hz: Some(90.0),
          amplitude: Some(0.8),
          phase_deg: Some(270.0),
          polarity: Some(crate::engine::waveform::Polarity::Falling),
        },
      },
    ];
    controller.update_parameters(&batch).unwrap();
    let snap = controller.get_current_parameters();
    assert_eq!(snap[0].params.frequency_hz, 60.0);
    assert_eq!(snap[1].params.amplitude, 0.6);
    assert_eq!(snap[2].params.phase_deg, 180.0);
    assert_eq!(snap[3].params.frequency_hz, 90.0);
  }

  #[test]
  fn scenario_s3_invalid_frequency_rejected_state_unchanged() {
    let controller = Controller::new(44_100, 512).unwrap();
    let ok_batch = vec![ChannelUpdate {
      channel_id: 0,
      patch: ChannelParamsPatch { frequency_hz: Some(60.0), amplitude: Some(0.5), ..Default::default() },
    }];
    controller.update_parameters(&ok_batch).unwrap();

    let bad_batch = vec![ChannelUpdate {
      channel_id: 0,
      patch: ChannelParamsPatch { frequency_hz: Some(200.0), ..Default::default() },
    }];
    assert!(controller.update_parameters(&bad_batch).is_err());

    let snap = controller.get_current_parameters();
    assert_eq!(snap[0].params.frequency_hz, 60.0);
  }
}
