//! Host wiring around the controller: terminal commands, status lines and
//! offline renders.

use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::audio::{mixer, wav, AudioError, OfflineBackend, ToneControl, ToneEngine};
use crate::breath::{CycleController, CycleSnapshot, ManualTimer, Phase, Timer};
use crate::params::{LevelCatalog, ToneConfig};
use crate::tips;

/// Volume change per `+`/`-` keypress
pub const VOLUME_STEP: f32 = 0.1;

/// One line of terminal input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostCommand {
    TogglePlay,
    Stop,
    ToggleSound,
    ChangeLevel(u32),
    VolumeUp,
    VolumeDown,
    Quit,
}

/// Parse a terminal line (`p`, `s`, `m`, `1`..`9`, `+`, `-`, `q`)
pub fn parse_command(line: &str) -> Option<HostCommand> {
    let line = line.trim();
    let command = match line {
        "p" | "" => HostCommand::TogglePlay,
        "s" => HostCommand::Stop,
        "m" => HostCommand::ToggleSound,
        "+" => HostCommand::VolumeUp,
        "-" => HostCommand::VolumeDown,
        "q" => HostCommand::Quit,
        digits => HostCommand::ChangeLevel(digits.parse().ok()?),
    };
    Some(command)
}

pub const HELP: &str =
    "commands: [enter]/p play-pause  s stop  m sound  1-9 level  +/- volume  q quit";

/// Host-side state that is not part of the cycle
#[derive(Debug, Clone, PartialEq)]
pub struct HostState {
    pub volume: f32,
}

/// Apply a command; returns false when the host should exit
pub fn apply<A: ToneControl, T: Timer>(
    controller: &mut CycleController<A, T>,
    host: &mut HostState,
    command: HostCommand,
) -> bool {
    match command {
        HostCommand::TogglePlay => controller.toggle_play(),
        HostCommand::Stop => controller.stop(),
        HostCommand::ToggleSound => controller.toggle_sound(),
        HostCommand::ChangeLevel(id) => controller.change_level(id),
        HostCommand::VolumeUp | HostCommand::VolumeDown => {
            let step = if command == HostCommand::VolumeUp {
                VOLUME_STEP
            } else {
                -VOLUME_STEP
            };
            host.volume = (host.volume + step).clamp(0.0, 1.0);
            controller.set_volume(host.volume);
        }
        HostCommand::Quit => return false,
    }
    true
}

/// One status line for the terminal
pub fn status_line(snapshot: &CycleSnapshot, streak: u32) -> String {
    let level = &snapshot.level;
    let timing = match snapshot.phase {
        Phase::Idle => "ready".to_string(),
        phase if snapshot.paused => format!("{phase} {}s (paused)", snapshot.time_remaining),
        phase => format!("{phase} {}s", snapshot.time_remaining),
    };
    format!(
        "[{timing}] {} {} | {:.0} Hz | cycles {} | sound {} | streak {} day{}",
        level.name,
        level.ratio,
        level.frequency.base_hz,
        snapshot.cycles_completed,
        if snapshot.sound_enabled { "on" } else { "off" },
        streak,
        if streak == 1 { "" } else { "s" },
    )
}

/// Status line plus the tip for the current rotation slot
pub fn status_with_tip(snapshot: &CycleSnapshot, streak: u32, elapsed: Duration) -> String {
    let tip = tips::tip_at(elapsed, snapshot.phase, snapshot.level.id);
    format!("{}\n  \"{tip}\"", status_line(snapshot, streak))
}

/// What an offline render produced
#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub seconds: u32,
    pub sample_rate_hz: u32,
    pub cycles_completed: u32,
}

/// Render a sound-enabled session of `seconds` simulated seconds to a WAV file
///
/// The session is stopped at the end and its fade-out is included.
pub fn render_session(
    catalog: LevelCatalog,
    level_id: u32,
    seconds: u32,
    volume: f32,
    path: &Path,
) -> Result<RenderReport, AudioError> {
    let config = ToneConfig::default();
    let fade_out_s = config.fade_out_s;
    let mut engine = ToneEngine::new(config, Box::new(OfflineBackend::default()));
    engine.acquire()?;

    let shared = engine.mixer();
    let (sample_rate_hz, tail_frames) = {
        let mixer = mixer::lock(&shared);
        (mixer.sample_rate_hz(), mixer.frames(fade_out_s) as usize)
    };
    let mut writer = wav::create_writer(path, sample_rate_hz)?;

    let mut controller = CycleController::new(catalog, engine, ManualTimer::new());
    controller.change_level(level_id);
    controller.set_volume(volume);
    controller.toggle_sound();
    controller.start();
    info!(level = controller.level().id, seconds, path = %path.display(), "rendering session");

    // One simulated second of audio, then the tick that ends it
    for _ in 0..seconds {
        wav::render_frames(&shared, &mut writer, sample_rate_hz as usize)?;
        if let Some(id) = controller.timer().armed() {
            controller.tick(id);
        }
    }

    let cycles_completed = controller.cycles_completed();
    controller.stop();
    wav::render_frames(&shared, &mut writer, tail_frames)?;
    writer.finalize()?;

    Ok(RenderReport {
        seconds,
        sample_rate_hz,
        cycles_completed,
    })
}
