use crate::engine::channel::{Channel, ChannelParamsPatch};
use crate::engine::error::{HapticError, HapticResult};
use crate::engine::waveform::Polarity;

pub const NUM_CHANNELS: usize = 4;
pub const NUM_DIRECTIONS: u32 = 16;
pub const DIRECTION_STEP_DEG: f32 = 22.5;

/// Four fixed drive channels grouped into two two-axis actuators: channels
/// (0,1) belong to actuator 1, (2,3) to actuator 2.
pub struct Device {
  sr: f32,
  channels: [Channel; NUM_CHANNELS],
  discrete_mode_enabled: bool,
  /// Some source revisions mirror actuator 2's angle (theta -> -theta) for
  /// symmetric two-actuator rotation. The canonical policy (confirmed
  /// against the original `device.py`, which applies no such transform) is
  /// non-mirrored; this flag exposes the alternative as an explicit,
  /// documented mode instead of silently picking one.
  actuator2_mirrored: bool,
}

impl Device {
  pub fn new(sr: f32) -> HapticResult<Self> {
    Ok(Self {
      sr,
      channels: [Channel::new(0, sr)?, Channel::new(1, sr)?, Channel::new(2, sr)?, Channel::new(3, sr)?],
      discrete_mode_enabled: false,
      actuator2_mirrored: false,
    })
  }

  pub fn sample_rate(&self) -> f32 {
    self.sr
  }

  pub fn channel(&self, id: u8) -> Option<&Channel> {
    self.channels.get(id as usize)
  }

  pub fn channels(&self) -> &[Channel; NUM_CHANNELS] {
    &self.channels
  }

  pub fn set_actuator2_mirrored(&mut self, mirrored: bool) {
    self.actuator2_mirrored = mirrored;
  }

  pub fn actuator2_mirrored(&self) -> bool {
    self.actuator2_mirrored
  }

  pub fn set_channel_params(&mut self, id: u8, patch: ChannelParamsPatch) -> HapticResult<()> {
    let channel = self
      .channels
      .get_mut(id as usize)
      .ok_or_else(|| HapticError::InvalidParam(format!("channel id must be 0-3, got {id}")))?;
    channel.set_params(patch)
  }

  pub fn activate_channel(&mut self, id: u8) -> HapticResult<()> {
    let channel = self
      .channels
      .get_mut(id as usize)
      .ok_or_else(|| HapticError::InvalidParam(format!("channel id must be 0-3, got {id}")))?;
    channel.activate();
    Ok(())
  }

  pub fn activate_all(&mut self) {
    for ch in self.channels.iter_mut() {
      ch.activate();
    }
  }

  pub fn deactivate_all(&mut self) {
    for ch in self.channels.iter_mut() {
      ch.deactivate();
    }
  }

  pub fn enable_16_direction_mode(&mut self) {
    self.discrete_mode_enabled = true;
  }

  pub fn disable_16_direction_mode(&mut self) {
    self.discrete_mode_enabled = false;
  }

  pub fn is_16_direction_mode_enabled(&self) -> bool {
    self.discrete_mode_enabled
  }

  /// Decomposes an angle/magnitude command into per-axis polarized
  /// amplitudes and activates both channels of the target actuator.
  /// `actuator` is 1 or 2; channels (0,1) for 1, (2,3) for 2.
  pub fn set_vector_force(&mut self, actuator: u8, angle_deg: f32, magnitude: f32, freq: f32) -> HapticResult<()> {
    if actuator != 1 && actuator != 2 {
      return Err(HapticError::InvalidParam(format!("actuator must be 1 or 2, got {actuator}")));
    }
    let mut theta = angle_deg.to_radians();
    if actuator == 2 && self.actuator2_mirrored {
      theta = -theta;
    }
    let x = magnitude * theta.cos();
    let y = -magnitude * theta.sin(); // Y inversion: matches physical mounting of the Y actuator.

    let base = ((actuator - 1) * 2) as u8;
    self.set_channel_params(
      base,
      ChannelParamsPatch {
        frequency_hz: Some(freq),
        amplitude: Some(x.abs()),
        phase_deg: Some(0.0),
        polarity: Some(Polarity::from_rising(x >= 0.0)),
      },
    )?;
    self.set_channel_params(
      base + 1,
      ChannelParamsPatch {
        frequency_hz: Some(freq),
        amplitude: Some(y.abs()),
        phase_deg: Some(0.0),
        polarity: Some(Polarity::from_rising(y >= 0.0)),
      },
    )?;
    self.activate_channel(base)?;
    self.activate_channel(base + 1)?;
    Ok(())
  }

  /// Maps a discrete direction index to an angle and delegates to
  /// `set_vector_force`. Fails with `ModeDisabled` outside 16-direction mode.
  pub fn set_discrete_direction(&mut self, actuator: u8, idx: u32, magnitude: f32, freq: f32) -> HapticResult<()> {
    if !self.discrete_mode_enabled {
      return Err(HapticError::ModeDisabled);
    }
    if idx >= NUM_DIRECTIONS {
      return Err(HapticError::InvalidParam(format!("direction index must be 0-{}, got {idx}", NUM_DIRECTIONS - 1)));
    }
    let angle = idx as f32 * DIRECTION_STEP_DEG;
    self.set_vector_force(actuator, angle, magnitude, freq)
  }

  /// Renders each channel in order and packs them into an interleaved
  /// `[ch0, ch1, ch2, ch3, ch0, ...]` frame of length `n * 4`.
  pub fn compose_block(&mut self, n: usize) -> Vec<f32> {
    let mut per_channel = [vec![0.0f32; n], vec![0.0f32; n], vec![0.0f32; n], vec![0.0f32; n]];
    for (ch, buf) in self.channels.iter_mut().zip(per_channel.iter_mut()) {
      ch.render(buf);
    }
    let mut frame = vec![0.0f32; n * NUM_CHANNELS];
    for k in 0..n {
      for c in 0..NUM_CHANNELS {
        frame[k * NUM_CHANNELS + c] = per_channel[c][k];
      }
    }
    frame
  }
}
