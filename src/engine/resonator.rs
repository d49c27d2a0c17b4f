use crate::engine::error::{HapticError, HapticResult};

#[derive(Debug, Clone, Copy)]
struct Coeffs {
  b0: f64,
  b1: f64,
  b2: f64,
  a1: f64,
  a2: f64,
}

impl Coeffs {
  /// Tustin (bilinear) discretization of G(s) = wn^2 / (s^2 + 2*zeta*wn*s + wn^2).
  fn compute(sr: f32, f_n: f32, zeta: f32) -> Self {
    let dt = 1.0 / sr as f64;
    let w_n = 2.0 * std::f64::consts::PI * f_n as f64;
    let zeta = zeta as f64;
    let wndt2 = (w_n * dt).powi(2);
    let a0 = 4.0 + 4.0 * zeta * w_n * dt + wndt2;
    let b0 = wndt2;
    let b1 = 2.0 * b0;
    let b2 = b0;
    let a1 = 2.0 * (wndt2 - 4.0);
    let a2 = 4.0 - 4.0 * zeta * w_n * dt + wndt2;
    Self { b0: b0 / a0, b1: b1 / a0, b2: b2 / a0, a1: a1 / a0, a2: a2 / a0 }
  }
}

/// 2nd-order IIR resonator shaping the mechanical response of the
/// actuator. History persists across blocks and across retunes; only a
/// fresh `Resonator` starts from zero state.
#[derive(Debug, Clone)]
pub struct Resonator {
  sr: f32,
  f_n: f32,
  zeta: f32,
  coeffs: Coeffs,
  enabled: bool,
  u1: f64,
  u2: f64,
  y1: f64,
  y2: f64,
}

impl Resonator {
  pub const DEFAULT_FN_HZ: f32 = 360.0;
  pub const DEFAULT_ZETA: f32 = 0.08;

  pub fn new(sr: f32) -> HapticResult<Self> {
    Self::with_params(sr, Self::DEFAULT_FN_HZ, Self::DEFAULT_ZETA)
  }

  pub fn with_params(sr: f32, f_n: f32, zeta: f32) -> HapticResult<Self> {
    Self::validate(sr, f_n, zeta)?;
    Ok(Self {
      sr,
      f_n,
      zeta,
      coeffs: Coeffs::compute(sr, f_n, zeta),
      enabled: false,
      u1: 0.0,
      u2: 0.0,
      y1: 0.0,
      y2: 0.0,
    })
  }

  fn validate(sr: f32, f_n: f32, zeta: f32) -> HapticResult<()> {
    if sr <= 0.0 {
      return Err(HapticError::InvalidParam("sample rate must be positive".into()));
    }
    if f_n <= 0.0 {
      return Err(HapticError::InvalidParam("natural frequency must be positive".into()));
    }
    if zeta <= 0.0 {
      return Err(HapticError::InvalidParam("damping ratio must be positive".into()));
    }
    Ok(())
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  /// Recomputes coefficients for a new natural frequency / damping ratio.
  /// History is preserved so retuning mid-stream does not glitch output.
  pub fn retune(&mut self, f_n: f32, zeta: f32) -> HapticResult<()> {
    Self::validate(self.sr, f_n, zeta)?;
    self.f_n = f_n;
    self.zeta = zeta;
    self.coeffs = Coeffs::compute(self.sr, f_n, zeta);
    Ok(())
  }

  pub fn enable(&mut self, f_n: f32, zeta: f32) -> HapticResult<()> {
    self.retune(f_n, zeta)?;
    self.enabled = true;
    Ok(())
  }

  pub fn disable(&mut self) {
    self.enabled = false;
  }

  #[inline]
  fn step(&mut self, u0: f64) -> f64 {
    let c = &self.coeffs;
    let y0 = c.b0 * u0 + c.b1 * self.u1 + c.b2 * self.u2 - c.a1 * self.y1 - c.a2 * self.y2;
    self.u2 = self.u1;
    self.u1 = u0;
    self.y2 = self.y1;
    self.y1 = y0;
    y0
  }

  /// Applies the filter in place when enabled; a no-op otherwise.
  pub fn process(&mut self, block: &mut [f32]) {
    if !self.enabled {
      return;
    }
    for sample in block.iter_mut() {
      *sample = self.step(*sample as f64) as f32;
    }
  }
}
