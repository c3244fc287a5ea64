use pranaflow::audio::{mixer, OfflineBackend, ToneEngine};
use pranaflow::breath::{CycleController, Event, ManualTimer, Phase};
use pranaflow::params::{LevelCatalog, ToneConfig};
use pranaflow::session::render_session;
use std::cell::RefCell;
use std::rc::Rc;

const RATE: u32 = 1_000;

fn engine_controller() -> CycleController<ToneEngine, ManualTimer> {
    let engine = ToneEngine::new(ToneConfig::default(), Box::new(OfflineBackend::new(RATE)));
    CycleController::new(LevelCatalog::default(), engine, ManualTimer::new())
}

fn advance(c: &mut CycleController<ToneEngine, ManualTimer>, seconds: u32) {
    for _ in 0..seconds {
        let id = c.timer().armed().expect("tick source armed");
        c.tick(id);
    }
}

#[test]
fn level_one_session_plays_binaural_pair_and_chimes() {
    let mut c = engine_controller();
    c.toggle_sound();
    c.start();

    let shared = c.tones().mixer();
    let (left, right) = c.tones().continuous_voices().expect("tone pair");
    {
        let m = mixer::lock(&shared);
        assert_eq!(m.sample_rate_hz(), RATE);
        assert_eq!(m.voice_count(), 2);
        let now = m.now();
        assert_eq!(m.voice_frequency_at(left, now).unwrap(), 528.0);
        assert_eq!(m.voice_frequency_at(right, now).unwrap(), 533.0);
        // Fade-in starts from silence
        assert_eq!(m.voice_gain_at(left, now).unwrap(), 0.0);
    }

    advance(&mut c, 4);
    assert_eq!(c.phase(), Phase::Hold);
    {
        let m = mixer::lock(&shared);
        assert_eq!(m.voice_count(), 3);
        assert_eq!(m.sustained_voice_count(), 2);
    }

    // The chime retires after its two seconds
    mixer::lock(&shared).render_stereo(2 * RATE as usize + 1);
    assert_eq!(mixer::lock(&shared).voice_count(), 2);

    c.stop();
    assert!(!c.tones().is_playing());
    mixer::lock(&shared).render_stereo(RATE as usize);
    assert_eq!(mixer::lock(&shared).voice_count(), 0);
}

#[test]
fn sound_toggle_never_stacks_tone_pairs() {
    let mut c = engine_controller();
    c.start();
    let shared = c.tones().mixer();

    for _ in 0..3 {
        c.toggle_sound();
        c.toggle_sound();
    }
    c.toggle_sound();
    assert!(c.sound_enabled());
    assert_eq!(mixer::lock(&shared).sustained_voice_count(), 2);

    // Faded pairs are gone once their fade-out has played
    mixer::lock(&shared).render_stereo(RATE as usize);
    assert_eq!(mixer::lock(&shared).voice_count(), 2);
}

#[test]
fn pause_and_resume_follow_the_tone() {
    let mut c = engine_controller();
    c.toggle_sound();
    c.start();
    advance(&mut c, 2);
    let shared = c.tones().mixer();

    c.pause();
    assert!(!c.tones().is_playing());
    assert_eq!(mixer::lock(&shared).sustained_voice_count(), 0);

    c.resume();
    assert!(c.tones().is_playing());
    assert_eq!((c.phase(), c.time_remaining()), (Phase::Inhale, 2));
    assert_eq!(mixer::lock(&shared).sustained_voice_count(), 2);
}

#[test]
fn first_cycle_reports_progress_once() {
    let mut c = engine_controller();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    c.subscribe(move |event| {
        if let Event::SessionProgress { level_id, cycles_completed } = event {
            sink.borrow_mut().push((*level_id, *cycles_completed));
        }
    });

    c.change_level(2);
    c.start();
    advance(&mut c, 20 * 3);
    assert_eq!(c.cycles_completed(), 3);
    assert_eq!(*events.borrow(), vec![(2, 1)]);
}

#[test]
fn render_session_writes_full_length_wav() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.wav");

    let report = render_session(LevelCatalog::default(), 1, 20, 0.8, &path).unwrap();
    assert_eq!(report.cycles_completed, 1);

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, report.sample_rate_hz);

    // Session plus the final fade-out
    let expected = report.sample_rate_hz * 20 + report.sample_rate_hz / 2;
    assert_eq!(reader.duration(), expected);

    let samples: Vec<f32> = reader.into_samples::<f32>().map(Result::unwrap).collect();
    assert!(samples.iter().all(|s| s.abs() <= 0.5));
    assert!(samples.iter().any(|s| s.abs() > 0.01));
}
