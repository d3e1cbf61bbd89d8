// Audio output using cpal
// The stream lives on its own thread; samples reach it through a ring buffer

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::{HeapRb, traits::{Consumer, Producer, Split}};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AudioError, PlaybackError};

const RING_BUFFER_SIZE: usize = 48000 * 2 / 4; // ~250ms of stereo audio at 48kHz
const WRITE_CHUNK: usize = 4096;

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// State shared between the output thread's callback and writers
struct Shared {
    volume: Mutex<f32>,
    // Samples with a position below this were written before the last
    // clear; the callback drops them unplayed
    discard_until: AtomicU64,
    stream_error: Mutex<Option<String>>,
    // Samples taken off the ring buffer by the callback, played or dropped
    consumed: AtomicU64,
}

impl Shared {
    fn new(volume: f32) -> Self {
        Self {
            volume: Mutex::new(volume.clamp(0.0, 1.0)),
            discard_until: AtomicU64::new(0),
            stream_error: Mutex::new(None),
            consumed: AtomicU64::new(0),
        }
    }
}

struct Writer {
    producer: RingProducer,
    pushed: u64,
}

impl Writer {
    /// Push as much of `samples` as fits. `halted` is checked under the
    /// writer lock, so nothing lands after the clear that follows a halt.
    fn push(&mut self, samples: &[f32], halted: &AtomicBool) -> Result<usize, PlaybackError> {
        if halted.load(Ordering::SeqCst) {
            return Err(PlaybackError::Halted);
        }
        let written = self.producer.push_slice(samples);
        self.pushed += written as u64;
        Ok(written)
    }

    /// Mark everything written so far for dropping
    fn clear(&self, shared: &Shared) {
        shared.discard_until.fetch_max(self.pushed, Ordering::SeqCst);
    }
}

/// Fill one device buffer from the ring, skipping cleared samples first
fn render<T: cpal::SizedSample + cpal::FromSample<f32>>(
    data: &mut [T],
    consumer: &mut RingConsumer,
    shared: &Shared,
) {
    // Only the callback advances `consumed`
    let mut position = shared.consumed.load(Ordering::SeqCst);
    let discard_until = shared.discard_until.load(Ordering::SeqCst);
    while position < discard_until && consumer.try_pop().is_some() {
        position += 1;
    }

    let vol = *shared.volume.lock();
    for sample in data.iter_mut() {
        let value = match consumer.try_pop() {
            Some(v) => {
                position += 1;
                v * vol
            }
            None => 0.0,
        };
        *sample = T::from_sample(value);
    }
    shared.consumed.store(position, Ordering::SeqCst);
}

pub struct AudioOutput {
    writer: Mutex<Writer>,
    shared: Arc<Shared>,
    sample_rate: u32,
    channels: u16,
    // Dropping the sender ends the output thread, which drops the stream
    _shutdown: mpsc::SyncSender<()>,
}

impl AudioOutput {
    /// Open the default output device on a dedicated thread
    pub fn start(volume: f32) -> Result<Self, AudioError> {
        let rb = HeapRb::<f32>::new(RING_BUFFER_SIZE);
        let (producer, consumer) = rb.split();

        let shared = Arc::new(Shared::new(volume));

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(u32, u16), AudioError>>(1);
        let (shutdown_tx, shutdown_rx) = mpsc::sync_channel::<()>(0);
        let thread_shared = Arc::clone(&shared);

        std::thread::Builder::new()
            .name("tablechime-output".into())
            .spawn(move || match Self::open_stream(consumer, thread_shared) {
                Ok((stream, sample_rate, channels)) => {
                    let _ = ready_tx.send(Ok((sample_rate, channels)));
                    // Park until the owning AudioOutput is dropped
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    tracing::debug!("audio output thread stopped");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        let (sample_rate, channels) = ready_rx
            .recv()
            .map_err(|_| AudioError::Stream("output thread exited during startup".into()))??;

        tracing::info!(sample_rate, channels, "audio output ready");

        Ok(Self {
            writer: Mutex::new(Writer { producer, pushed: 0 }),
            shared,
            sample_rate,
            channels,
            _shutdown: shutdown_tx,
        })
    }

    fn open_stream(
        consumer: RingConsumer,
        shared: Arc<Shared>,
    ) -> Result<(Stream, u32, u16), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config.into(), consumer, shared)?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config.into(), consumer, shared)?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config.into(), consumer, shared)?,
            format => return Err(AudioError::UnsupportedFormat(format!("{:?}", format))),
        };

        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;

        Ok((stream, sample_rate, channels))
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut consumer: RingConsumer,
        shared: Arc<Shared>,
    ) -> Result<Stream, AudioError> {
        let error_shared = Arc::clone(&shared);
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    render(data, &mut consumer, &shared);
                },
                move |err| {
                    tracing::warn!("audio output error: {}", err);
                    *error_shared.stream_error.lock() = Some(err.to_string());
                },
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))
    }

    /// Write samples to the output buffer.
    /// Returns the number of samples actually written.
    fn write(&self, samples: &[f32], halted: &AtomicBool) -> Result<usize, PlaybackError> {
        self.writer.lock().push(samples, halted)
    }

    /// Samples written but not yet taken by the device
    fn buffered(&self) -> u64 {
        let pushed = self.writer.lock().pushed;
        pushed.saturating_sub(self.shared.consumed.load(Ordering::SeqCst))
    }

    fn take_stream_error(&self) -> Option<String> {
        self.shared.stream_error.lock().take()
    }

    /// Push a whole clip and wait until the device has consumed it.
    ///
    /// Checks `halted` between chunks; a halted clip returns
    /// `PlaybackError::Halted` without waiting for the buffer to drain.
    pub fn play_blocking(&self, samples: &[f32], halted: &AtomicBool) -> Result<(), PlaybackError> {
        let mut remaining = samples;

        while !remaining.is_empty() {
            if let Some(err) = self.take_stream_error() {
                return Err(PlaybackError::Device(err));
            }
            let chunk = &remaining[..remaining.len().min(WRITE_CHUNK)];
            let written = self.write(chunk, halted)?;
            if written > 0 {
                remaining = &remaining[written..];
            } else {
                std::thread::sleep(Duration::from_millis(1));
            }
        }

        while self.buffered() > 0 {
            if halted.load(Ordering::SeqCst) {
                return Err(PlaybackError::Halted);
            }
            if let Some(err) = self.take_stream_error() {
                return Err(PlaybackError::Device(err));
            }
            std::thread::sleep(Duration::from_millis(2));
        }

        Ok(())
    }

    /// Drop whatever is queued so far. Samples written after this call
    /// still play, even before the device has caught up with the clear.
    pub fn clear(&self) {
        self.writer.lock().clear(&self.shared);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Set the output volume (0.0 to 1.0)
    pub fn set_volume(&self, vol: f32) {
        *self.shared.volume.lock() = vol.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        *self.shared.volume.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(capacity: usize) -> (Writer, RingConsumer, Shared) {
        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
        (Writer { producer, pushed: 0 }, consumer, Shared::new(1.0))
    }

    #[test]
    fn test_clear_keeps_samples_written_after_it() {
        let (mut writer, mut consumer, shared) = ring(1024);
        let go = AtomicBool::new(false);

        writer.push(&[1.0; 300], &go).unwrap();
        writer.clear(&shared);
        // Next clip starts before the device has run
        writer.push(&[0.5; 40], &go).unwrap();

        let mut out = [9.0f32; 64];
        render(&mut out, &mut consumer, &shared);
        assert!(out[..40].iter().all(|&v| v == 0.5));
        assert!(out[40..].iter().all(|&v| v == 0.0));
        assert_eq!(shared.consumed.load(Ordering::SeqCst), writer.pushed);
    }

    #[test]
    fn test_clear_after_partial_playback() {
        let (mut writer, mut consumer, shared) = ring(1024);
        let go = AtomicBool::new(false);

        writer.push(&[1.0; 100], &go).unwrap();
        let mut out = [0.0f32; 30];
        render(&mut out, &mut consumer, &shared);
        assert!(out.iter().all(|&v| v == 1.0));

        writer.clear(&shared);
        writer.push(&[0.25; 10], &go).unwrap();
        render(&mut out, &mut consumer, &shared);
        assert!(out[..10].iter().all(|&v| v == 0.25));
        assert!(out[10..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_halted_writer_pushes_nothing() {
        let (mut writer, mut consumer, shared) = ring(64);
        let halted = AtomicBool::new(true);

        assert_eq!(writer.push(&[1.0; 8], &halted), Err(PlaybackError::Halted));
        assert_eq!(writer.pushed, 0);

        let mut out = [9.0f32; 8];
        render(&mut out, &mut consumer, &shared);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_volume_applies() {
        let (mut writer, mut consumer, shared) = ring(64);
        *shared.volume.lock() = 0.5;
        writer.push(&[1.0; 4], &AtomicBool::new(false)).unwrap();

        let mut out = [0.0f32; 4];
        render(&mut out, &mut consumer, &shared);
        assert_eq!(out, [0.5; 4]);
    }
}
