//! PranaFlow - guided pranayama breathing in the terminal
//!
//! Each level is a fixed Inhale, Hold, Exhale ratio. While a session runs,
//! an optional binaural tone pair plays and a chime marks every phase change.

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{select, unbounded, Receiver};
use std::cell::RefCell;
use std::io::BufRead;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pranaflow::audio::{AudioBackend, CpalBackend, DisabledBackend, ToneEngine};
use pranaflow::breath::{CycleController, Event, IntervalTimer};
use pranaflow::cli::Args;
use pranaflow::params::{LevelCatalog, ToneConfig};
use pranaflow::session::{self, HostState};
use pranaflow::streak::StreakTracker;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pranaflow=info")),
        )
        .init();

    let args = Args::parse();
    let catalog = args.load_catalog().with_context(|| match &args.levels {
        Some(path) => format!("loading levels from {}", path.display()),
        None => "selecting built-in level".to_string(),
    })?;

    if let Some(seconds) = args.render {
        let report = session::render_session(
            catalog,
            args.level,
            seconds,
            args.master_volume(),
            &args.output,
        )
        .with_context(|| format!("rendering to {}", args.output.display()))?;

        println!(
            "Rendered {}s at {} Hz to {} ({} cycle{} completed)",
            report.seconds,
            report.sample_rate_hz,
            args.output.display(),
            report.cycles_completed,
            if report.cycles_completed == 1 { "" } else { "s" },
        );
        return Ok(());
    }

    run_live(&args, catalog)
}

/// Interactive session: one-second ticks and terminal commands on one thread
fn run_live(args: &Args, catalog: LevelCatalog) -> Result<()> {
    let config = ToneConfig::default();
    config.validate()?;
    let fade_out = Duration::from_secs_f32(config.fade_out_s);
    // Longest tail a sound can ring for after it was stopped or triggered
    let quiet_after = Duration::from_secs_f32(config.fade_out_s.max(config.chime.length_s));

    let backend: Box<dyn AudioBackend> = if args.silent {
        Box::new(DisabledBackend)
    } else {
        Box::new(CpalBackend::new())
    };
    let mut engine = ToneEngine::new(config, backend);
    if !args.silent {
        if let Err(err) = engine.acquire() {
            warn!(%err, "audio output unavailable; continuing without sound");
        }
    }

    let (timer, ticks) = IntervalTimer::every_second();
    let mut controller = CycleController::new(catalog, engine, timer);
    let mut host = HostState {
        volume: args.master_volume(),
    };
    controller.change_level(args.level);
    controller.set_volume(host.volume);
    if args.sound {
        controller.toggle_sound();
    }

    let streak = Rc::new(RefCell::new(StreakTracker::new()));
    let recorder = Rc::clone(&streak);
    controller.subscribe(move |event| {
        if let Event::SessionProgress { .. } = event {
            let today = chrono::Local::now().date_naive();
            recorder.borrow_mut().record_session(today);
        }
    });

    let started = Instant::now();
    let printer = Rc::clone(&streak);
    controller.subscribe(move |event| {
        if let Event::State(snapshot) = event {
            let today = chrono::Local::now().date_naive();
            let days = printer.borrow().current(today);
            println!(
                "{}",
                session::status_with_tip(snapshot, days, started.elapsed())
            );
        }
    });

    println!("\nPranaFlow is running!");
    println!("{}\n", session::HELP);
    println!(
        "{}",
        session::status_with_tip(&controller.snapshot(), 0, Duration::ZERO)
    );

    let commands = spawn_stdin_reader();
    let mut playing = controller.tones().is_playing();
    let mut suspend_at: Option<Instant> = None;
    loop {
        // Idle output goes into its power-saving state once the tails are done
        let idle = match suspend_at {
            Some(at) => crossbeam_channel::at(at),
            None => crossbeam_channel::never(),
        };
        select! {
            recv(ticks) -> tick => match tick {
                Ok(id) => controller.tick(id),
                Err(_) => break,
            },
            recv(idle) -> _ => {
                controller.tones_mut().suspend();
                suspend_at = None;
                debug!("audio output suspended while idle");
            },
            recv(commands) -> line => {
                let Ok(line) = line else {
                    // stdin closed
                    break;
                };
                match session::parse_command(&line) {
                    Some(command) => {
                        if !session::apply(&mut controller, &mut host, command) {
                            break;
                        }
                    }
                    None => println!("{}", session::HELP),
                }
            },
        }

        let now_playing = controller.tones().is_playing();
        if now_playing {
            suspend_at = None;
        } else if playing {
            suspend_at = Some(Instant::now() + quiet_after);
        }
        playing = now_playing;
    }

    // Let the tone fade out before the output closes
    let was_playing = controller.tones().is_playing();
    let cycles = controller.cycles_completed();
    controller.stop();
    if was_playing {
        thread::sleep(fade_out);
    }
    info!(cycles, "session closed");
    Ok(())
}

/// Forward stdin lines to the main loop; the channel disconnects on EOF
fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}
