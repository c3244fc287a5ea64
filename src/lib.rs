//! PranaFlow library - guided breathing cycles with binaural tones

pub mod audio;
pub mod breath;
pub mod cli;
pub mod params;
pub mod session;
pub mod streak;
pub mod tips;
