use crate::engine::error::{HapticError, HapticResult};

/// Lower bound enforced everywhere a frequency is validated.
///
/// The reference implementation disagreed with itself across revisions
/// (30 Hz in `waveform.py`, 40 Hz enforced by the vector-force endpoint in
/// `main.py`); this crate pins the single value the externally reachable
/// vector-force path actually enforced.
pub const MIN_FREQUENCY_HZ: f32 = 40.0;
pub const MAX_FREQUENCY_HZ: f32 = 120.0;
pub const MIN_AMPLITUDE: f32 = 0.0;
pub const MAX_AMPLITUDE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
  Rising,
  Falling,
}

impl Polarity {
  #[inline]
  pub fn from_rising(rising: bool) -> Self {
    if rising { Polarity::Rising } else { Polarity::Falling }
  }

  #[inline]
  pub fn is_rising(self) -> bool {
    matches!(self, Polarity::Rising)
  }
}

/// Validates frequency and amplitude bounds. Called at parameter-set time;
/// the render path below never validates.
pub fn validate_params(frequency_hz: f32, amplitude: f32) -> HapticResult<()> {
  if !(MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&frequency_hz) {
    return Err(HapticError::InvalidParam(format!(
      "frequency must be between {MIN_FREQUENCY_HZ}-{MAX_FREQUENCY_HZ}Hz, got {frequency_hz}"
    )));
  }
  if !(MIN_AMPLITUDE..=MAX_AMPLITUDE).contains(&amplitude) {
    return Err(HapticError::InvalidParam(format!(
      "amplitude must be between {MIN_AMPLITUDE}-{MAX_AMPLITUDE}, got {amplitude}"
    )));
  }
  Ok(())
}

/// Renders `n` samples of a sawtooth carrier starting at absolute channel
/// time `start_time_s`. `start_time_s` (τ) is the sole phase source: the
/// caller must not reset it between blocks or frequency changes, or phase
/// continuity breaks.
pub fn render(
  out: &mut [f32],
  freq: f32,
  start_time_s: f64,
  sr: f32,
  amplitude: f32,
  phase_deg: f32,
  polarity: Polarity,
) {
  let phase_frac = (phase_deg / 360.0) as f64;
  let freq = freq as f64;
  let sr = sr as f64;
  for (k, sample) in out.iter_mut().enumerate() {
    let t = start_time_s + k as f64 / sr;
    let frac = (freq * t + phase_frac).rem_euclid(1.0);
    let saw = 2.0 * frac - 1.0;
    let s = amplitude as f64 * saw;
    *sample = if polarity.is_rising() { s as f32 } else { -s as f32 };
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_out_of_range_frequency() {
    assert!(validate_params(MIN_FREQUENCY_HZ - 1.0, 0.5).is_err());
    assert!(validate_params(MAX_FREQUENCY_HZ + 1.0, 0.5).is_err());
  }

  #[test]
  fn rejects_out_of_range_amplitude() {
    assert!(validate_params(60.0, -0.1).is_err());
    assert!(validate_params(60.0, 1.1).is_err());
  }

  #[test]
  fn sawtooth_stays_within_amplitude_bound() {
    let sr = 44_100.0;
    let mut block = vec![0.0f32; 4410];
    render(&mut block, 60.0, 0.0, sr, 0.8, 0.0, Polarity::Rising);
    for &s in &block {
      assert!(s.abs() <= 0.8 + 1e-5, "sample {s} exceeded amplitude bound");
    }
    let min = block.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = block.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    assert!((min - (-0.8)).abs() < 0.02);
    assert!((max - 0.8).abs() < 0.02);
  }

  #[test]
  fn falling_polarity_is_negated_rising() {
    let sr = 44_100.0;
    let mut rising = vec![0.0f32; 256];
    let mut falling = vec![0.0f32; 256];
    render(&mut rising, 60.0, 0.0, sr, 0.5, 0.0, Polarity::Rising);
    render(&mut falling, 60.0, 0.0, sr, 0.5, 0.0, Polarity::Falling);
    for (r, f) in rising.iter().zip(falling.iter()) {
      assert!((r + f).abs() < 1e-6);
    }
  }

  #[test]
  fn phase_continuity_across_block_boundaries() {
    let sr = 44_100.0;
    let n = 512usize;
    let mut one_shot = vec![0.0f32; n * 3];
    render(&mut one_shot, 73.0, 0.1, sr, 0.6, 15.0, Polarity::Rising);

    let mut stitched = vec![0.0f32; n * 3];
    let block_dur = n as f64 / sr as f64;
    render(&mut stitched[0..n], 73.0, 0.1, sr, 0.6, 15.0, Polarity::Rising);
    render(&mut stitched[n..2 * n], 73.0, 0.1 + block_dur, sr, 0.6, 15.0, Polarity::Rising);
    render(&mut stitched[2 * n..3 * n], 73.0, 0.1 + 2.0 * block_dur, sr, 0.6, 15.0, Polarity::Rising);

    for (a, b) in one_shot.iter().zip(stitched.iter()) {
      assert!((a - b).abs() <= f32::EPSILON * 4.0, "{a} vs {b}");
    }
  }
}
