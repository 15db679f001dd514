#![forbid(unsafe_code)]

mod driver;
mod music;
#[cfg(feature = "rodio-backend")]
mod rodio_backend;
mod sample;

pub use driver::{AudioDriver, MusicStream, NullAudio, SoundHandle};
pub use music::MusicPlayer;
#[cfg(feature = "rodio-backend")]
pub use rodio_backend::RodioAudio;
pub use sample::SampleBank;

use std::sync::Arc;
use tessera_game_core::{ErrorReporter, LogReporter};

/// Music and sound effects sharing one driver.
#[derive(Clone)]
pub struct Audio {
    pub music: Arc<MusicPlayer>,
    pub samples: Arc<SampleBank>,
}

impl Audio {
    pub fn new(driver: Arc<dyn AudioDriver>, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            music: MusicPlayer::new(driver.clone(), reporter.clone()),
            samples: Arc::new(SampleBank::new(driver, reporter)),
        }
    }

    pub fn silent() -> Self {
        Self::new(Arc::new(NullAudio), Arc::new(LogReporter))
    }

    pub fn pause(&self) {
        self.music.pause();
        self.samples.pause();
    }

    pub fn resume(&self) {
        self.music.resume();
        self.samples.resume();
    }

    /// Stops music and drops all loaded samples.
    pub fn shutdown(&self) {
        self.music.stop();
        self.samples.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;
    use tessera_game_core::{CollectingReporter, RngStream};

    type Completion = Box<dyn FnOnce() + Send>;

    #[derive(Default)]
    struct FakeDriver {
        opened: Mutex<Vec<String>>,
        completions: Mutex<Vec<Completion>>,
        plays: Arc<Mutex<Vec<(f32, f32, f32)>>>,
    }

    impl FakeDriver {
        fn opened(&self) -> Vec<String> {
            self.opened.lock().unwrap().clone()
        }

        fn finish_current(&self) {
            let callback = self.completions.lock().unwrap().pop();
            if let Some(callback) = callback {
                callback();
            }
        }
    }

    struct FakeStream {
        playing: bool,
        looping: bool,
        driver: Arc<FakeDriver>,
    }

    impl MusicStream for FakeStream {
        fn play(&mut self) {
            self.playing = true;
        }
        fn pause(&mut self) {
            self.playing = false;
        }
        fn stop(&mut self) {
            self.playing = false;
        }
        fn is_playing(&self) -> bool {
            self.playing
        }
        fn set_looping(&mut self, looping: bool) {
            self.looping = looping;
        }
        fn is_looping(&self) -> bool {
            self.looping
        }
        fn set_volume(&mut self, _volume: f32) {}
        fn on_completion(&mut self, callback: Completion) {
            self.driver.completions.lock().unwrap().push(callback);
        }
    }

    struct FakeSound {
        plays: Arc<Mutex<Vec<(f32, f32, f32)>>>,
    }

    impl SoundHandle for FakeSound {
        fn play(&mut self, volume: f32, pitch: f32, pan: f32) -> u64 {
            let mut plays = self.plays.lock().unwrap();
            plays.push((volume, pitch, pan));
            plays.len() as u64
        }
        fn pause(&mut self) {}
        fn resume(&mut self) {}
    }

    // Wraps the fake so streams can point back at it.
    struct SharedFake(Arc<FakeDriver>);

    impl AudioDriver for SharedFake {
        fn open_music(&self, asset: &str) -> anyhow::Result<Box<dyn MusicStream>> {
            if asset.ends_with(".bad") {
                return Err(anyhow!("unsupported codec"));
            }
            self.0.opened.lock().unwrap().push(asset.to_string());
            Ok(Box::new(FakeStream {
                playing: false,
                looping: false,
                driver: self.0.clone(),
            }))
        }

        fn load_sound(&self, asset: &str) -> anyhow::Result<Box<dyn SoundHandle>> {
            if asset.ends_with(".bad") {
                return Err(anyhow!("corrupt sample"));
            }
            Ok(Box::new(FakeSound {
                plays: self.0.plays.clone(),
            }))
        }
    }

    fn setup() -> (Arc<FakeDriver>, Arc<CollectingReporter>, Arc<MusicPlayer>) {
        let fake = Arc::new(FakeDriver::default());
        let reporter = Arc::new(CollectingReporter::new());
        let music = MusicPlayer::with_rng(
            Arc::new(SharedFake(fake.clone())),
            reporter.clone(),
            RngStream::seeded(1),
        );
        (fake, reporter, music)
    }

    #[test]
    fn replaying_same_asset_is_ignored() {
        let (fake, _, music) = setup();
        music.play("theme.ogg", true);
        music.play("theme.ogg", true);
        assert_eq!(fake.opened(), vec!["theme.ogg"]);
        assert!(music.is_playing());
        music.play("other.ogg", false);
        assert_eq!(fake.opened(), vec!["theme.ogg", "other.ogg"]);
    }

    #[test]
    fn playback_failure_is_reported_not_fatal() {
        let (_, reporter, music) = setup();
        music.play("broken.bad", false);
        assert!(!music.is_playing());
        assert_eq!(reporter.len(), 1);
    }

    #[test]
    fn mismatched_track_list_stops() {
        let (_, _, music) = setup();
        music.play("theme.ogg", true);
        music.play_tracks(&["a.ogg", "b.ogg"], &[1.0], false);
        assert!(!music.is_playing());
    }

    #[test]
    fn track_end_advances_on_another_thread() {
        let (fake, _, music) = setup();
        music.play_tracks(&["a.ogg", "b.ogg"], &[1.0, 1.0], false);
        assert_eq!(fake.opened(), vec!["a.ogg"]);
        fake.finish_current();
        let (tx, rx) = mpsc::channel();
        let opened = fake.clone();
        std::thread::spawn(move || {
            for _ in 0..200 {
                if opened.opened().len() >= 2 {
                    let _ = tx.send(opened.opened());
                    return;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        });
        let opened = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        // The queue keeps "b" from the first fill and the refill appends again.
        assert_eq!(opened[1], "b.ogg");
        assert!(music.is_playing());
    }

    #[test]
    fn disable_stops_and_enable_restarts_last() {
        let (fake, _, music) = setup();
        music.play("theme.ogg", true);
        music.set_enabled(false);
        assert!(!music.is_playing());
        music.set_enabled(true);
        assert!(music.is_playing());
        assert_eq!(fake.opened(), vec!["theme.ogg", "theme.ogg"]);
    }

    #[test]
    fn samples_load_in_background_and_play_stereo() {
        let fake = Arc::new(FakeDriver::default());
        let reporter = Arc::new(CollectingReporter::new());
        let bank = SampleBank::new(Arc::new(SharedFake(fake.clone())), reporter.clone());
        let handle = bank.load(&["hit.wav", "gone.bad"]).unwrap();
        handle.join().unwrap();
        assert!(bank.is_loaded("hit.wav"));
        assert!(!bank.is_loaded("gone.bad"));
        assert_eq!(reporter.len(), 1);
        assert!(bank.load(&["hit.wav"]).is_none());

        bank.set_volume(0.5);
        assert!(bank.play_stereo("hit.wav", 0.2, 0.8, 1.0).is_some());
        let plays = fake.plays.lock().unwrap().clone();
        let (volume, pitch, pan) = plays[0];
        assert!((volume - 0.4).abs() < 1e-6);
        assert!((pitch - 1.0).abs() < 1e-6);
        assert!((pan - 0.6).abs() < 1e-6);
        assert!(bank.play("missing.wav", 1.0, 1.0).is_none());
    }

    #[test]
    fn delayed_samples_fire_when_due() {
        let fake = Arc::new(FakeDriver::default());
        let bank = SampleBank::new(
            Arc::new(SharedFake(fake.clone())),
            Arc::new(CollectingReporter::new()),
        );
        bank.load(&["step.wav"]).unwrap().join().unwrap();
        bank.play_delayed("step.wav", 0.5, 1.0, 1.0);
        bank.update(0.3);
        assert_eq!(fake.plays.lock().unwrap().len(), 0);
        bank.update(0.3);
        assert_eq!(fake.plays.lock().unwrap().len(), 1);
        assert_eq!(bank.pending_delayed(), 0);
    }
}
