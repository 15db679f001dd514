use crate::driver::{AudioDriver, SoundHandle};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tessera_game_core::ErrorReporter;

type SoundMap = HashMap<String, Box<dyn SoundHandle>>;

/// Short sound effects, keyed by asset name.
pub struct SampleBank {
    driver: Arc<dyn AudioDriver>,
    reporter: Arc<dyn ErrorReporter>,
    sounds: Arc<Mutex<SoundMap>>,
    delayed: Mutex<Vec<DelayedSound>>,
    enabled: AtomicBool,
    volume: Mutex<f32>,
}

#[derive(Debug, Clone)]
struct DelayedSound {
    id: String,
    delay: f32,
    left: f32,
    right: f32,
    pitch: f32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SampleBank {
    pub fn new(driver: Arc<dyn AudioDriver>, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            driver,
            reporter,
            sounds: Arc::new(Mutex::new(HashMap::new())),
            delayed: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
            volume: Mutex::new(1.0),
        }
    }

    /// Loads the assets that are not loaded yet on a background thread.
    /// Returns `None` when there was nothing to load.
    pub fn load(&self, assets: &[&str]) -> Option<JoinHandle<()>> {
        let to_load: Vec<String> = {
            let sounds = lock(&self.sounds);
            assets
                .iter()
                .filter(|a| !sounds.contains_key(**a))
                .map(|a| a.to_string())
                .collect()
        };
        if to_load.is_empty() {
            return None;
        }
        let driver = self.driver.clone();
        let reporter = self.reporter.clone();
        let sounds = self.sounds.clone();
        Some(thread::spawn(move || {
            for asset in to_load {
                match driver.load_sound(&asset) {
                    Ok(sound) => {
                        lock(&sounds).insert(asset, sound);
                    }
                    Err(err) => reporter.report(&format!("sample {asset}"), &err),
                }
            }
        }))
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        lock(&self.sounds).contains_key(id)
    }

    pub fn unload(&self, id: &str) {
        lock(&self.sounds).remove(id);
    }

    /// Drops every loaded sound and pending delayed effect.
    pub fn reset(&self) {
        lock(&self.sounds).clear();
        lock(&self.delayed).clear();
    }

    pub fn pause(&self) {
        for sound in lock(&self.sounds).values_mut() {
            sound.pause();
        }
    }

    pub fn resume(&self) {
        for sound in lock(&self.sounds).values_mut() {
            sound.resume();
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_volume(&self, volume: f32) {
        *lock(&self.volume) = volume;
    }

    pub fn volume(&self) -> f32 {
        *lock(&self.volume)
    }

    pub fn play(&self, id: &str, volume: f32, pitch: f32) -> Option<u64> {
        self.play_stereo(id, volume, volume, pitch)
    }

    /// Plays at `max(left, right)` panned by `right - left`. Returns `None`
    /// when the sound is not loaded or effects are disabled.
    pub fn play_stereo(&self, id: &str, left: f32, right: f32, pitch: f32) -> Option<u64> {
        if !self.is_enabled() {
            return None;
        }
        let volume = self.volume() * left.max(right);
        lock(&self.sounds)
            .get_mut(id)
            .map(|sound| sound.play(volume, pitch, right - left))
    }

    pub fn play_delayed(&self, id: &str, delay: f32, volume: f32, pitch: f32) {
        self.play_delayed_stereo(id, delay, volume, volume, pitch);
    }

    pub fn play_delayed_stereo(&self, id: &str, delay: f32, left: f32, right: f32, pitch: f32) {
        if delay <= 0.0 {
            self.play_stereo(id, left, right, pitch);
            return;
        }
        lock(&self.delayed).push(DelayedSound {
            id: id.to_string(),
            delay,
            left,
            right,
            pitch,
        });
    }

    pub fn pending_delayed(&self) -> usize {
        lock(&self.delayed).len()
    }

    /// Advances delayed effects by `elapsed` seconds, playing the ones that
    /// came due.
    pub fn update(&self, elapsed: f32) {
        let due: Vec<DelayedSound> = {
            let mut delayed = lock(&self.delayed);
            if delayed.is_empty() {
                return;
            }
            for sfx in delayed.iter_mut() {
                sfx.delay -= elapsed;
            }
            let (due, waiting): (Vec<_>, Vec<_>) = delayed.drain(..).partition(|sfx| sfx.delay <= 0.0);
            *delayed = waiting;
            due
        };
        for sfx in due {
            self.play_stereo(&sfx.id, sfx.left, sfx.right, sfx.pitch);
        }
    }
}
