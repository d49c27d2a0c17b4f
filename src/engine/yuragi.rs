use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::controller::{Controller, VectorForceCommand};

const FRAME_HZ: f64 = 60.0;

fn frame_duration() -> Duration {
  Duration::from_secs_f64(1.0 / FRAME_HZ)
}

/// One entry of the canonical preset table, transcribed unchanged from
/// the original `yuragi_animator.py`'s `PRESETS`.
#[derive(Debug, Clone, Copy)]
pub struct YuragiPreset {
  pub initial_angle_deg: f32,
  pub magnitude: f32,
  pub carrier_hz: f32,
  pub rotation_hz: f32,
  pub envelope_hz: f32,
  pub envelope_depth: f32,
  pub enable_speed_modulation: bool,
  pub enable_amplitude_center_offset: bool,
}

pub fn preset_by_name(name: &str) -> (&'static str, YuragiPreset) {
  match name {
    "gentle" => ("gentle", YuragiPreset {
      initial_angle_deg: 45.0,
      magnitude: 0.4,
      carrier_hz: 40.0,
      rotation_hz: 0.2,
      envelope_hz: 0.2,
      envelope_depth: 0.3,
      enable_speed_modulation: false,
      enable_amplitude_center_offset: false,
    }),
    "moderate" => ("moderate", YuragiPreset {
      initial_angle_deg: 0.0,
      magnitude: 0.6,
      carrier_hz: 60.0,
      rotation_hz: 0.33,
      envelope_hz: 0.2,
      envelope_depth: 0.3,
      enable_speed_modulation: false,
      enable_amplitude_center_offset: false,
    }),
    "strong" => ("strong", YuragiPreset {
      initial_angle_deg: 90.0,
      magnitude: 1.0,
      carrier_hz: 80.0,
      rotation_hz: 0.5,
      envelope_hz: 0.2,
      envelope_depth: 0.3,
      enable_speed_modulation: false,
      enable_amplitude_center_offset: false,
    }),
    "intense" => ("intense", YuragiPreset {
      initial_angle_deg: 90.0,
      magnitude: 0.9,
      carrier_hz: 80.0,
      rotation_hz: 0.5,
      envelope_hz: 0.2,
      envelope_depth: 0.3,
      enable_speed_modulation: false,
      enable_amplitude_center_offset: false,
    }),
    "slow" => ("slow", YuragiPreset {
      initial_angle_deg: 180.0,
      magnitude: 0.8,
      carrier_hz: 25.0,
      rotation_hz: 0.15,
      envelope_hz: 0.2,
      envelope_depth: 0.3,
      enable_speed_modulation: false,
      enable_amplitude_center_offset: false,
    }),
    "therapeutic" => ("therapeutic", YuragiPreset {
      initial_angle_deg: 180.0,
      magnitude: 0.5,
      carrier_hz: 50.0,
      rotation_hz: 0.25,
      envelope_hz: 0.2,
      envelope_depth: 0.3,
      enable_speed_modulation: false,
      enable_amplitude_center_offset: false,
    }),
    "therapeutic_fluctuation" => ("therapeutic_fluctuation", YuragiPreset {
      initial_angle_deg: 180.0,
      magnitude: 0.5,
      carrier_hz: 50.0,
      rotation_hz: 0.15,
      envelope_hz: 0.2,
      envelope_depth: 0.3,
      enable_speed_modulation: true,
      enable_amplitude_center_offset: true,
    }),
    _ => ("default", YuragiPreset {
      initial_angle_deg: 0.0,
      magnitude: 0.7,
      carrier_hz: 60.0,
      rotation_hz: 0.33,
      envelope_hz: 0.2,
      envelope_depth: 0.3,
      enable_speed_modulation: false,
      enable_amplitude_center_offset: false,
    }),
  }
}

/// Computes the vector-force command for a single tick, given elapsed time
/// `e` (seconds since the task's start). Pure, so it is independently
/// testable without a timer.
pub fn tick_command(preset: &YuragiPreset, phi: f64, e: f64) -> (f32, f32, f32) {
  let angle_deg = ((phi.to_degrees() + preset.initial_angle_deg as f64) % 360.0) as f32;
  let env = (2.0 * std::f64::consts::PI * preset.envelope_hz as f64 * e).sin() * preset.envelope_depth as f64;
  let magnitude = if preset.enable_amplitude_center_offset {
    (preset.magnitude as f64 * (0.8 + 0.8 * env)).clamp(0.0, 1.0)
  } else {
    (preset.magnitude as f64 * (1.0 + env)).clamp(0.0, 1.0)
  };
  (angle_deg, magnitude as f32, preset.carrier_hz)
}

fn speed_modulation_factor(e: f64) -> f64 {
  (1.0 + 0.8 * (2.0 * std::f64::consts::PI * 0.1 * e).sin()
    + 0.5 * (2.0 * std::f64::consts::PI * 0.07 * e + std::f64::consts::FRAC_PI_3).sin())
  .clamp(0.1, 3.0)
}

/// Cooperative per-actuator animation scheduler. One task per actuator,
/// ticking at 60 Hz, cancelled via a per-actuator `CancellationToken`.
pub struct YuragiAnimator {
  controller: Arc<Controller>,
  tasks: HashMap<u8, (CancellationToken, tokio::task::JoinHandle<()>)>,
}

impl YuragiAnimator {
  pub fn new(controller: Arc<Controller>) -> Self {
    Self { controller, tasks: HashMap::new() }
  }

  /// Cancels any prior task on `actuator`, then spawns a fresh one running
  /// `preset_name` (unknown names collapse to `default`) for `duration_s`.
  pub async fn start(&mut self, actuator: u8, preset_name: &str, duration_s: f64) {
    self.stop(actuator).await;

    let (name, preset) = preset_by_name(preset_name);
    let _ = name;
    let token = CancellationToken::new();
    let child_token = token.clone();
    let controller = Arc::clone(&self.controller);

    let handle = tokio::spawn(async move {
      run_animation(controller, actuator, preset, duration_s, child_token).await;
    });

    self.tasks.insert(actuator, (token, handle));
  }

  /// Signals cancellation and awaits termination; a no-op if no task is
  /// running on `actuator`.
  pub async fn stop(&mut self, actuator: u8) {
    if let Some((token, handle)) = self.tasks.remove(&actuator) {
      token.cancel();
      let _ = handle.await;
    }
  }

  pub async fn stop_all(&mut self) {
    let actuators: Vec<u8> = self.tasks.keys().copied().collect();
    for actuator in actuators {
      self.stop(actuator).await;
    }
  }

  pub fn is_running(&self, actuator: u8) -> bool {
    self.tasks.contains_key(&actuator)
  }
}

async fn run_animation(
  controller: Arc<Controller>,
  actuator: u8,
  preset: YuragiPreset,
  duration_s: f64,
  token: CancellationToken,
) {
  let start = Instant::now();
  let mut phi = 0.0f64;
  let frame_dt = 1.0 / FRAME_HZ;
  let mut next_tick = Instant::now();

  loop {
    let e = start.elapsed().as_secs_f64();
    if e >= duration_s || token.is_cancelled() {
      break;
    }

    let m = if preset.enable_speed_modulation { speed_modulation_factor(e) } else { 1.0 };
    phi += 2.0 * std::f64::consts::PI * preset.rotation_hz as f64 * m * frame_dt;

    let (angle_deg, magnitude, carrier_hz) = tick_command(&preset, phi, e);
    let _ = controller.set_vector_force(VectorForceCommand { actuator, angle_deg, magnitude, frequency_hz: carrier_hz });

    next_tick += frame_duration();
    tokio::select! {
      _ = token.cancelled() => break,
      _ = tokio::time::sleep_until(next_tick) => {}
    }
  }

  let _ = controller.set_vector_force(VectorForceCommand { actuator, angle_deg: 0.0, magnitude: 0.0, frequency_hz: preset.carrier_hz });
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_preset_collapses_to_default() {
    let (name, preset) = preset_by_name("nonexistent");
    assert_eq!(name, "default");
    assert_eq!(preset.magnitude, 0.7);
    assert_eq!(preset.carrier_hz, 60.0);
  }

  #[test]
  fn default_preset_matches_canonical_values() {
    let (_, p) = preset_by_name("default");
    assert_eq!(p.initial_angle_deg, 0.0);
    assert_eq!(p.magnitude, 0.7);
    assert_eq!(p.carrier_hz, 60.0);
    assert_eq!(p.rotation_hz, 0.33);
    assert!(!p.enable_speed_modulation);
  }

  #[test]
  fn therapeutic_fluctuation_enables_both_modulations() {
    let (_, p) = preset_by_name("therapeutic_fluctuation");
    assert!(p.enable_speed_modulation);
    assert!(p.enable_amplitude_center_offset);
    assert_eq!(p.envelope_hz, 0.2);
    assert_eq!(p.rotation_hz, 0.15);
  }

  #[test]
  fn speed_modulation_factor_stays_within_clamp_bounds() {
    for i in 0..1000 {
      let e = i as f64 * 0.01;
      let m = speed_modulation_factor(e);
      assert!((0.1..=3.0).contains(&m), "m={m} out of bounds at e={e}");
    }
  }

  #[test]
  fn amplitude_center_offset_branch_differs_from_plain_envelope() {
    let mut center_offset = preset_by_name("default").1;
    center_offset.enable_amplitude_center_offset = true;
    let mut plain = preset_by_name("default").1;
    plain.enable_amplitude_center_offset = false;

    let e = 2.5;
    let (_, mag_center, _) = tick_command(&center_offset, 0.0, e);
    let (_, mag_plain, _) = tick_command(&plain, 0.0, e);
    assert_ne!(mag_center, mag_plain);
  }

  #[test]
  fn angle_wraps_into_0_360_range() {
    let (_, preset) = preset_by_name("default");
    let (angle, _, _) = tick_command(&preset, 10.0 * std::f64::consts::PI, 0.0);
    assert!((0.0..360.0).contains(&angle));
  }
}
