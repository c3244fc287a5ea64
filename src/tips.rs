//! Rotating practice tips shown under the breathing status.

use std::time::Duration;

use crate::breath::Phase;

/// How long each tip stays up
pub const TIP_PERIOD: Duration = Duration::from_secs(8);

const TIPS: [&str; 8] = [
    "Keep your spine erect to allow Prana to flow through the Sushumna Nadi.",
    "Relax your shoulders and jaw during the Hold phase.",
    "Focus on the Third Eye point (Ajna Chakra) for deeper concentration.",
    "If you feel anxious, focus on the 8-second exhale to trigger the parasympathetic nervous system.",
    "Use Jnana Mudra (index finger and thumb touching) to lock your focus.",
    "Level 3 is best done in the morning on an empty stomach.",
    "Visualize a golden light expanding in your chest as you hold.",
    "Let the breath be silent and smooth, like pouring oil.",
];

const ADVANCED_TIP: &str = "Level 3 is best done in the morning on an empty stomach.";
const EXHALE_TIP: &str = "If you feel anxious, focus on the 8-second exhale.";

/// Tip for the rotation slot reached after `elapsed`
pub fn tip_at(elapsed: Duration, phase: Phase, level_id: u32) -> &'static str {
    let slot = (elapsed.as_secs() / TIP_PERIOD.as_secs()) as usize % TIPS.len();
    // Exhale advice wins over level advice when both apply
    if phase == Phase::Exhale && slot % 4 == 0 {
        EXHALE_TIP
    } else if level_id == 3 && slot % 3 == 0 {
        ADVANCED_TIP
    } else {
        TIPS[slot]
    }
}
