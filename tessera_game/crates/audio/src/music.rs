use crate::driver::{AudioDriver, MusicStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use tessera_game_core::{ErrorReporter, RngService, RngStream};

/// Background music: either one asset (optionally looping) or a weighted
/// track list that refills its queue whenever a track ends.
pub struct MusicPlayer {
    driver: Arc<dyn AudioDriver>,
    reporter: Arc<dyn ErrorReporter>,
    state: Mutex<MusicState>,
    this: Weak<MusicPlayer>,
}

struct MusicState {
    player: Option<Box<dyn MusicStream>>,
    // Bumped for every started stream so stale completion callbacks are ignored.
    generation: u64,
    last_played: Option<String>,
    looping: bool,
    volume: f32,
    track_map: Vec<(String, f32)>,
    track_queue: Vec<String>,
    shuffle: bool,
    enabled: bool,
    rng: RngStream,
}

impl MusicPlayer {
    pub fn new(driver: Arc<dyn AudioDriver>, reporter: Arc<dyn ErrorReporter>) -> Arc<Self> {
        Self::with_rng(driver, reporter, RngService::from_clock().derive_named("music"))
    }

    pub fn with_rng(
        driver: Arc<dyn AudioDriver>,
        reporter: Arc<dyn ErrorReporter>,
        rng: RngStream,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            driver,
            reporter,
            state: Mutex::new(MusicState {
                player: None,
                generation: 0,
                last_played: None,
                looping: false,
                volume: 1.0,
                track_map: Vec::new(),
                track_queue: Vec::new(),
                shuffle: false,
                enabled: true,
                rng,
            }),
            this: this.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, MusicState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Plays a single asset. Does nothing if that asset is already playing.
    pub fn play(&self, asset: &str, looping: bool) {
        let mut state = self.lock();
        self.play_single(&mut state, asset, looping);
    }

    fn play_single(&self, state: &mut MusicState, asset: &str, looping: bool) {
        if state.is_playing() && state.last_played.as_deref() == Some(asset) {
            return;
        }
        state.stop();
        state.last_played = Some(asset.to_string());
        state.track_map.clear();
        state.looping = looping;
        state.shuffle = false;
        if state.enabled {
            self.start(state, asset, false);
        }
    }

    /// Plays from a weighted track list. Each time the queue is refilled,
    /// every track joins with its own probability. Mismatched or empty input
    /// stops playback.
    pub fn play_tracks(&self, tracks: &[&str], chances: &[f32], shuffle: bool) {
        let mut state = self.lock();
        if tracks.is_empty() || tracks.len() != chances.len() {
            state.stop();
            return;
        }
        let map: Vec<(String, f32)> = tracks
            .iter()
            .zip(chances)
            .map(|(t, c)| (t.to_string(), *c))
            .collect();
        if state.is_playing() && map == state.track_map {
            return;
        }
        state.stop();
        state.last_played = None;
        state.track_map = map;
        self.restart_tracks(&mut state, shuffle);
    }

    fn restart_tracks(&self, state: &mut MusicState, shuffle: bool) {
        state.track_queue.clear();
        state.populate_queue();
        state.looping = false;
        state.shuffle = shuffle;
        if !state.enabled || state.track_queue.is_empty() {
            return;
        }
        let next = state.track_queue.remove(0);
        self.start(state, &next, true);
    }

    fn play_next_track(&self, generation: u64) {
        let mut state = self.lock();
        let current = state.generation == generation && state.player.is_some();
        if state.track_map.is_empty() || !current || state.looping_player() {
            return;
        }
        state.stop();
        state.populate_queue();
        if state.shuffle {
            let MusicState {
                rng, track_queue, ..
            } = &mut *state;
            rng.shuffle(track_queue);
        }
        if !state.enabled || state.track_queue.is_empty() {
            return;
        }
        let next = state.track_queue.remove(0);
        self.start(&mut state, &next, true);
    }

    fn start(&self, state: &mut MusicState, track: &str, advance_on_end: bool) {
        let mut stream = match self.driver.open_music(track) {
            Ok(stream) => stream,
            Err(err) => {
                self.reporter
                    .report(&format!("music {track}"), &err.context("failed to open music"));
                return;
            }
        };
        state.generation += 1;
        stream.set_looping(state.looping);
        stream.set_volume(state.volume);
        stream.play();
        if advance_on_end {
            let generation = state.generation;
            let this = self.this.clone();
            // Preparing the next track off the completion thread keeps the
            // handoff from stalling whoever delivered the callback.
            stream.on_completion(Box::new(move || {
                thread::spawn(move || {
                    if let Some(player) = this.upgrade() {
                        player.play_next_track(generation);
                    }
                });
            }));
        }
        log::debug!("music started: {track}");
        state.player = Some(stream);
    }

    /// Forgets the current selection and stops.
    pub fn end(&self) {
        let mut state = self.lock();
        state.last_played = None;
        state.track_map.clear();
        state.stop();
    }

    pub fn pause(&self) {
        if let Some(player) = self.lock().player.as_mut() {
            player.pause();
        }
    }

    pub fn resume(&self) {
        let mut state = self.lock();
        let looping = state.looping;
        if let Some(player) = state.player.as_mut() {
            player.play();
            player.set_looping(looping);
        }
    }

    pub fn stop(&self) {
        self.lock().stop();
    }

    pub fn set_volume(&self, volume: f32) {
        let mut state = self.lock();
        state.volume = volume;
        if let Some(player) = state.player.as_mut() {
            player.set_volume(volume);
        }
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Disabling stops playback. Enabling restarts the last selection.
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.lock();
        state.enabled = enabled;
        let playing = state.is_playing();
        if playing && !enabled {
            state.stop();
        } else if !playing && enabled {
            if !state.track_map.is_empty() {
                let shuffle = state.shuffle;
                self.restart_tracks(&mut state, shuffle);
            } else if let Some(last) = state.last_played.clone() {
                let looping = state.looping;
                // Clear so the already-playing check cannot short-circuit.
                state.last_played = None;
                self.play_single(&mut state, &last, looping);
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.lock().is_playing()
    }

    pub fn last_played(&self) -> Option<String> {
        self.lock().last_played.clone()
    }
}

impl MusicState {
    fn is_playing(&self) -> bool {
        self.player.as_ref().is_some_and(|p| p.is_playing())
    }

    fn looping_player(&self) -> bool {
        self.player.as_ref().is_some_and(|p| p.is_looping())
    }

    fn stop(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.stop();
        }
    }

    fn populate_queue(&mut self) {
        let MusicState {
            track_map,
            track_queue,
            rng,
            ..
        } = self;
        for (track, chance) in track_map.iter() {
            if rng.unit() < *chance {
                track_queue.push(track.clone());
            }
        }
    }
}
