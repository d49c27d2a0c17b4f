use crate::engine::error::HapticResult;
use crate::engine::noise::NoiseSource;
use crate::engine::resonator::Resonator;
use crate::engine::waveform::{self, Polarity};

pub const MIN_CHANNEL_ID: u8 = 0;
pub const MAX_CHANNEL_ID: u8 = 3;

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ChannelParams {
  pub frequency_hz: f32,
  pub amplitude: f32,
  pub phase_deg: f32,
  pub polarity: Polarity,
}

impl Default for ChannelParams {
  fn default() -> Self {
    Self { frequency_hz: waveform::MIN_FREQUENCY_HZ, amplitude: 0.0, phase_deg: 0.0, polarity: Polarity::Rising }
  }
}

/// Optional per-field overrides applied by `Channel::set_params`; fields
/// left `None` keep their current value.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
pub struct ChannelParamsPatch {
  pub frequency_hz: Option<f32>,
  pub amplitude: Option<f32>,
  pub phase_deg: Option<f32>,
  pub polarity: Option<Polarity>,
}

/// One drive signal: phase accumulator -> sawtooth -> resonator -> noise.
/// τ advances by `block_size / sr` on every rendered block, whether or not
/// the channel is active, so reactivation never produces a phase jump.
pub struct Channel {
  pub id: u8,
  sr: f32,
  params: ChannelParams,
  active: bool,
  tau: f64,
  resonator: Resonator,
  noise: NoiseSource,
}

impl Channel {
  pub fn new(id: u8, sr: f32) -> HapticResult<Self> {
    Ok(Self {
      id,
      sr,
      params: ChannelParams::default(),
      active: false,
      tau: 0.0,
      resonator: Resonator::new(sr)?,
      noise: NoiseSource::new(),
    })
  }

  pub fn params(&self) -> ChannelParams {
    self.params
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn tau(&self) -> f64 {
    self.tau
  }

  /// Overwrites provided fields and validates the resulting bounds before
  /// committing; a rejected patch leaves the channel's parameters intact.
  pub fn set_params(&mut self, patch: ChannelParamsPatch) -> HapticResult<()> {
    let mut next = self.params;
    if let Some(f) = patch.frequency_hz {
      next.frequency_hz = f;
    }
    if let Some(a) = patch.amplitude {
      next.amplitude = a;
    }
    if let Some(p) = patch.phase_deg {
      next.phase_deg = p;
    }
    if let Some(pol) = patch.polarity {
      next.polarity = pol;
    }
    waveform::validate_params(next.frequency_hz, next.amplitude)?;
    self.params = next;
    Ok(())
  }

  pub fn activate(&mut self) {
    self.active = true;
  }

  pub fn deactivate(&mut self) {
    self.active = false;
  }

  pub fn enable_resonator(&mut self, f_n: f32, zeta: f32) -> HapticResult<()> {
    self.resonator.enable(f_n, zeta)
  }

  pub fn disable_resonator(&mut self) {
    self.resonator.disable();
  }

  pub fn enable_noise(&mut self, level: f32, seed: Option<u64>) {
    self.noise.enable(level, seed);
  }

  pub fn disable_noise(&mut self) {
    self.noise.disable();
  }

  /// Renders `n` samples into `out`, always advancing τ by `n / sr`.
  pub fn render(&mut self, out: &mut [f32]) {
    let n = out.len();
    let block_dur = n as f64 / self.sr as f64;

    if !self.active || self.params.amplitude == 0.0 {
      out.fill(0.0);
      self.tau += block_dur;
      return;
    }

    waveform::render(
      out,
      self.params.frequency_hz,
      self.tau,
      self.sr,
      self.params.amplitude,
      self.params.phase_deg,
      self.params.polarity,
    );
    self.resonator.process(out);
    self.noise.apply(out);
    self.tau += block_dur;
  }
}
