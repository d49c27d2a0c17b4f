pub mod channel;
pub mod controller;
pub mod device;
pub mod error;
pub mod noise;
pub mod resonator;
pub mod waveform;
pub mod yuragi;
