use super::{
    AudioError, AudioOutput, CaptureDevice, CaptureError, CaptureSink, OutputConnection,
    SharedVoice, Voice,
};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, Weak,
};

#[derive(Default)]
pub struct FakeOutput {
    resumes: AtomicUsize,
    failing: AtomicBool,
    connects: AtomicUsize,
    disconnects: Arc<AtomicUsize>,
}

impl FakeOutput {
    pub fn failing() -> Self {
        let output = Self::default();
        output.set_failing(true);
        output
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl AudioOutput for FakeOutput {
    fn resume(&self) -> Result<(), AudioError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AudioError::Device("no output device".into()));
        }
        Ok(())
    }

    fn connect(&self, _voice: SharedVoice) -> Result<Box<dyn OutputConnection>, AudioError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection { disconnects: self.disconnects.clone() }))
    }
}

struct FakeConnection {
    disconnects: Arc<AtomicUsize>,
}

impl OutputConnection for FakeConnection {
    fn disconnect(self: Box<Self>) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a fake capture sink saw, kept alive after the sink is gone.
#[derive(Default)]
pub struct CaptureTracker {
    voice: Mutex<Option<Weak<Mutex<Voice>>>>,
    disposed: AtomicBool,
}

impl CaptureTracker {
    pub fn disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn voice_released(&self) -> bool {
        self.voice
            .lock()
            .unwrap()
            .as_ref()
            .map(|weak| weak.upgrade().is_none())
            .unwrap_or(false)
    }
}

#[derive(Default)]
pub struct FakeCapture {
    pub fail_start: bool,
    pub fail_stop: bool,
    pub tracker: Arc<CaptureTracker>,
}

impl CaptureDevice for FakeCapture {
    fn open(&self, voice: SharedVoice) -> Result<Box<dyn CaptureSink>, CaptureError> {
        *self.tracker.voice.lock().unwrap() = Some(Arc::downgrade(&voice));
        Ok(Box::new(FakeSink {
            voice: Some(voice),
            fail_start: self.fail_start,
            fail_stop: self.fail_stop,
            tracker: self.tracker.clone(),
        }))
    }
}

struct FakeSink {
    voice: Option<SharedVoice>,
    fail_start: bool,
    fail_stop: bool,
    tracker: Arc<CaptureTracker>,
}

#[async_trait]
impl CaptureSink for FakeSink {
    async fn start(&mut self) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::Device("recorder refused to start".into()));
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<Vec<u8>, CaptureError> {
        if self.fail_stop {
            return Err(CaptureError::Device("recorder lost its buffer".into()));
        }
        super::encode_wav(&[0.0; 16], 8_000)
    }

    fn dispose(&mut self) {
        self.voice = None;
        self.tracker.disposed.store(true, Ordering::SeqCst);
    }
}
