/// Decoding and playback backend.
pub trait AudioDriver: Send + Sync {
    /// Opens a streamed music asset. The stream starts stopped.
    fn open_music(&self, asset: &str) -> anyhow::Result<Box<dyn MusicStream>>;

    /// Loads a short sound fully into memory.
    fn load_sound(&self, asset: &str) -> anyhow::Result<Box<dyn SoundHandle>>;
}

pub trait MusicStream: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
    fn set_looping(&mut self, looping: bool);
    fn is_looping(&self) -> bool;
    fn set_volume(&mut self, volume: f32);

    /// Called once when a non-looping stream reaches its end. May be invoked
    /// from a backend thread.
    fn on_completion(&mut self, callback: Box<dyn FnOnce() + Send>);
}

pub trait SoundHandle: Send {
    /// Starts one playback instance and returns its id. `pan` is in
    /// `[-1, 1]`, negative is left.
    fn play(&mut self, volume: f32, pitch: f32, pan: f32) -> u64;
    fn pause(&mut self);
    fn resume(&mut self);
}

/// Driver that accepts every asset and produces no sound.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioDriver for NullAudio {
    fn open_music(&self, _asset: &str) -> anyhow::Result<Box<dyn MusicStream>> {
        Ok(Box::new(SilentStream::default()))
    }

    fn load_sound(&self, _asset: &str) -> anyhow::Result<Box<dyn SoundHandle>> {
        Ok(Box::new(SilentSound::default()))
    }
}

#[derive(Default)]
struct SilentStream {
    playing: bool,
    looping: bool,
}

impl MusicStream for SilentStream {
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
    fn on_completion(&mut self, _callback: Box<dyn FnOnce() + Send>) {}
}

#[derive(Default)]
struct SilentSound {
    next_id: u64,
}

impl SoundHandle for SilentSound {
    fn play(&mut self, _volume: f32, _pitch: f32, _pan: f32) -> u64 {
        self.next_id += 1;
        self.next_id
    }
    fn pause(&mut self) {}
    fn resume(&mut self) {}
}
