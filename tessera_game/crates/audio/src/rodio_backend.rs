use crate::driver::{AudioDriver, MusicStream, SoundHandle};
use anyhow::{anyhow, Context};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use tessera_game_core::AssetSource;

/// `AudioDriver` on top of rodio. The output stream itself is not `Send`, so
/// it lives on a parked thread for the lifetime of the process and only the
/// handle is shared.
pub struct RodioAudio {
    handle: OutputStreamHandle,
    assets: Arc<dyn AssetSource>,
}

impl RodioAudio {
    pub fn new(assets: Arc<dyn AssetSource>) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    if tx.send(Ok(handle)).is_ok() {
                        let _stream = stream;
                        loop {
                            thread::park();
                        }
                    }
                }
                Err(err) => {
                    let _ = tx.send(Err(err.to_string()));
                }
            })
            .context("failed to spawn audio output thread")?;
        let handle = rx
            .recv()
            .context("audio output thread exited")?
            .map_err(|e| anyhow!("rodio output stream: {e}"))?;
        Ok(Self { handle, assets })
    }

    fn read(&self, asset: &str) -> anyhow::Result<Arc<Vec<u8>>> {
        let bytes = self
            .assets
            .open(asset)
            .with_context(|| format!("failed to read audio asset {asset}"))?;
        // Decode once so a corrupt file fails at load, not on first play.
        Decoder::new(Cursor::new(bytes.clone()))
            .with_context(|| format!("failed to decode {asset}"))?;
        Ok(Arc::new(bytes))
    }
}

impl AudioDriver for RodioAudio {
    fn open_music(&self, asset: &str) -> anyhow::Result<Box<dyn MusicStream>> {
        let bytes = self.read(asset)?;
        let sink = Sink::try_new(&self.handle).context("failed to create music sink")?;
        sink.pause();
        Ok(Box::new(RodioMusic {
            sink: Arc::new(sink),
            bytes,
            looping: false,
            appended: false,
            stopped: Arc::new(AtomicBool::new(false)),
            completion: None,
        }))
    }

    fn load_sound(&self, asset: &str) -> anyhow::Result<Box<dyn SoundHandle>> {
        let bytes = self.read(asset)?;
        Ok(Box::new(RodioSound {
            handle: self.handle.clone(),
            bytes,
            sinks: Vec::new(),
            next_id: 0,
        }))
    }
}

struct RodioMusic {
    sink: Arc<Sink>,
    bytes: Arc<Vec<u8>>,
    looping: bool,
    appended: bool,
    stopped: Arc<AtomicBool>,
    completion: Option<Box<dyn FnOnce() + Send>>,
}

impl RodioMusic {
    fn append_source(&mut self) {
        let source = match Decoder::new(Cursor::new(self.bytes.as_ref().clone())) {
            Ok(source) => source,
            Err(err) => {
                log::error!("music decode failed: {err}");
                return;
            }
        };
        if self.looping {
            self.sink.append(source.repeat_infinite());
        } else {
            self.sink.append(source);
        }
        self.appended = true;
        if let Some(callback) = self.completion.take() {
            self.watch(callback);
        }
    }

    fn watch(&self, callback: Box<dyn FnOnce() + Send>) {
        let sink = self.sink.clone();
        let stopped = self.stopped.clone();
        thread::spawn(move || {
            sink.sleep_until_end();
            if !stopped.load(Ordering::Acquire) {
                callback();
            }
        });
    }
}

impl MusicStream for RodioMusic {
    fn play(&mut self) {
        if !self.appended {
            self.append_source();
        }
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        self.sink.stop();
    }

    fn is_playing(&self) -> bool {
        self.appended && !self.sink.empty() && !self.sink.is_paused()
    }

    // Takes effect on the next play from a stopped state; rodio cannot toggle
    // repetition of an appended source.
    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume.max(0.0));
    }

    fn on_completion(&mut self, callback: Box<dyn FnOnce() + Send>) {
        if self.appended {
            self.watch(callback);
        } else {
            self.completion = Some(callback);
        }
    }
}

impl Drop for RodioMusic {
    fn drop(&mut self) {
        self.stop();
    }
}

struct RodioSound {
    handle: OutputStreamHandle,
    bytes: Arc<Vec<u8>>,
    sinks: Vec<Sink>,
    next_id: u64,
}

impl SoundHandle for RodioSound {
    // rodio 0.17 has no per-sink balance control, so `pan` is not applied.
    fn play(&mut self, volume: f32, pitch: f32, _pan: f32) -> u64 {
        self.sinks.retain(|s| !s.empty());
        let Ok(source) = Decoder::new(Cursor::new(self.bytes.as_ref().clone())) else {
            return 0;
        };
        let Ok(sink) = Sink::try_new(&self.handle) else {
            return 0;
        };
        sink.set_volume(volume.max(0.0));
        sink.append(source.speed(pitch));
        self.sinks.push(sink);
        self.next_id += 1;
        self.next_id
    }

    fn pause(&mut self) {
        for sink in &self.sinks {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        for sink in &self.sinks {
            sink.play();
        }
    }
}
