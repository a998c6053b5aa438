//! Default output device backend built on cpal.
//!
//! Each context owns one output stream, fed from a lock-free SPSC ring
//! buffer. cpal streams are not `Send` on every platform, so the stream lives
//! on a dedicated thread and is driven through a control channel.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};
use std::thread::JoinHandle;

use cpal::{
    SampleFormat,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use parking_lot::Mutex;
use ringbuf::{
    HeapRb,
    traits::{Consumer, Producer, Split},
};
use tracing::{debug, error, warn};

use crate::{
    context::{AudioContext, AudioSink, ContextState},
    error::AudioError,
    hook::AudioContextFactory,
};

const STATE_RUNNING: u8 = 0;
const STATE_SUSPENDED: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Creates one [`CpalContext`] per call on the default output device.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalFactory;

impl AudioContextFactory for CpalFactory {
    fn create(&self) -> Result<Arc<dyn AudioContext>, AudioError> {
        Ok(Arc::new(CpalContext::open()?))
    }
}

enum StreamControl {
    Play,
    Pause,
    Close,
}

struct RingOutput {
    producer: Mutex<ringbuf::HeapProd<f32>>,
}

impl AudioSink for RingOutput {
    fn write(&self, samples: &[f32]) {
        let mut producer = self.producer.lock();
        // Drop the newest samples when full rather than blocking the caller.
        for s in samples {
            if producer.try_push(s.clamp(-1.0, 1.0)).is_err() {
                break;
            }
        }
    }
}

pub struct CpalContext {
    output: Arc<RingOutput>,
    sample_rate: u32,
    channels: u16,
    state: Arc<AtomicU8>,
    control: Sender<StreamControl>,
    thread: Option<JoinHandle<()>>,
}

struct Opened {
    producer: ringbuf::HeapProd<f32>,
    sample_rate: u32,
    channels: u16,
}

impl CpalContext {
    pub fn open() -> Result<Self, AudioError> {
        let (control_tx, control_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);
        let state = Arc::new(AtomicU8::new(STATE_SUSPENDED));
        let state_for_thread = state.clone();

        let thread = std::thread::Builder::new()
            .name("peerpad-audio".into())
            .spawn(move || stream_thread(control_rx, ready_tx, state_for_thread))
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        let opened = ready_rx
            .recv()
            .map_err(|_| AudioError::Backend("audio thread exited during setup".into()))??;

        debug!(
            sample_rate = opened.sample_rate,
            channels = opened.channels,
            "cpal output context opened"
        );

        Ok(Self {
            output: Arc::new(RingOutput {
                producer: Mutex::new(opened.producer),
            }),
            sample_rate: opened.sample_rate,
            channels: opened.channels,
            state,
            control: control_tx,
            thread: Some(thread),
        })
    }

    pub fn suspend(&self) -> Result<(), AudioError> {
        self.control
            .send(StreamControl::Pause)
            .map_err(|_| AudioError::Closed)
    }
}

impl AudioContext for CpalContext {
    fn state(&self) -> ContextState {
        match self.state.load(Ordering::Acquire) {
            STATE_RUNNING => ContextState::Running,
            STATE_SUSPENDED => ContextState::Suspended,
            _ => ContextState::Closed,
        }
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.control
            .send(StreamControl::Play)
            .map_err(|_| AudioError::Closed)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn destination(&self) -> Arc<dyn AudioSink> {
        self.output.clone()
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        let _ = self.control.send(StreamControl::Close);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn stream_thread(
    control: Receiver<StreamControl>,
    ready: Sender<Result<Opened, AudioError>>,
    state: Arc<AtomicU8>,
) {
    let (stream, opened) = match build_stream() {
        Ok(v) => v,
        Err(e) => {
            state.store(STATE_CLOSED, Ordering::Release);
            let _ = ready.send(Err(e));
            return;
        }
    };

    match stream.play() {
        Ok(()) => state.store(STATE_RUNNING, Ordering::Release),
        Err(e) => warn!(error = %e, "output stream created suspended"),
    }
    if ready.send(Ok(opened)).is_err() {
        return;
    }

    for cmd in control {
        match cmd {
            StreamControl::Play => match stream.play() {
                Ok(()) => state.store(STATE_RUNNING, Ordering::Release),
                Err(e) => warn!(error = %e, "failed to resume output stream"),
            },
            StreamControl::Pause => match stream.pause() {
                Ok(()) => state.store(STATE_SUSPENDED, Ordering::Release),
                Err(e) => warn!(error = %e, "failed to pause output stream"),
            },
            StreamControl::Close => break,
        }
    }
    state.store(STATE_CLOSED, Ordering::Release);
}

fn build_stream() -> Result<(cpal::Stream, Opened), AudioError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

    let supported_config = device
        .default_output_config()
        .map_err(|e| AudioError::Backend(e.to_string()))?;

    let sample_format = supported_config.sample_format();
    if sample_format != SampleFormat::F32 {
        return Err(AudioError::Backend(format!(
            "only f32 output format is supported, got {sample_format:?}"
        )));
    }

    let config: cpal::StreamConfig = supported_config.into();
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;
    let frame_width = channels as usize;

    // ~0.2 seconds of interleaved samples.
    let capacity = ((sample_rate as f32 * 0.2 * frame_width as f32).ceil() as usize).max(1);
    let (producer, mut consumer) = HeapRb::<f32>::new(capacity).split();

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _| {
                for sample in data.iter_mut() {
                    *sample = consumer.try_pop().unwrap_or(0.0);
                }
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(|e| AudioError::Backend(e.to_string()))?;

    Ok((
        stream,
        Opened {
            producer,
            sample_rate,
            channels,
        },
    ))
}
