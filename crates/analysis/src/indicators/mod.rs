pub mod band;
pub mod regression;

pub use band::{Band, BandModel};
pub use regression::{ChannelWidth, RegressionChannel};
