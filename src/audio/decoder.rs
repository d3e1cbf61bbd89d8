// Clip decoder using Symphonia
// Decodes a whole alert clip to PCM and conforms it to the output format

use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::{AudioBufferRef, AudioPlanes, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use std::fs::File;
use std::path::Path;

use crate::error::AudioError;

const RESAMPLE_CHUNK: usize = 1024;

/// Fully decoded clip, interleaved f32 samples
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl PcmClip {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    /// Convert to the device's channel count and sample rate
    pub fn conform(self, channels: usize, sample_rate: u32) -> Result<PcmClip, AudioError> {
        let mut planar = remap_channels(&self.samples, self.channels, channels);
        if self.sample_rate != sample_rate && self.frames() > 0 {
            planar = resample(planar, self.sample_rate, sample_rate)?;
        }
        Ok(PcmClip {
            samples: interleave(&planar),
            sample_rate,
            channels,
        })
    }
}

/// Streaming decoder over one audio file
pub struct ClipDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
}

impl ClipDecoder {
    /// Open an audio file and prepare for decoding
    pub fn open(path: &Path) -> Result<Self, AudioError> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioError::Probe(e.to_string()))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(AudioError::NoTrack)?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Decode(e.to_string()))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Decode next packet, returns interleaved f32 samples.
    /// Returns None at end of stream.
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>, AudioError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(AudioError::Decode(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => return Ok(Some(audio_buf_to_f32(&decoded))),
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!("skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => return Err(AudioError::Decode(e.to_string())),
            }
        }
    }

    /// Decode everything that is left
    pub fn decode_to_end(mut self) -> Result<PcmClip, AudioError> {
        let mut samples = Vec::new();
        while let Some(chunk) = self.decode_next()? {
            samples.extend_from_slice(&chunk);
        }
        Ok(PcmClip {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }
}

/// Decode `path` and conform it to the given output format
pub fn load_clip(path: &Path, channels: usize, sample_rate: u32) -> Result<PcmClip, AudioError> {
    ClipDecoder::open(path)?
        .decode_to_end()?
        .conform(channels, sample_rate)
}

fn audio_buf_to_f32(buf: &AudioBufferRef) -> Vec<f32> {
    match buf {
        AudioBufferRef::F32(b) => interleave_convert(b.planes(), b.frames(), |s: f32| s),
        AudioBufferRef::F64(b) => interleave_convert(b.planes(), b.frames(), |s: f64| s as f32),
        AudioBufferRef::S8(b) => {
            interleave_convert(b.planes(), b.frames(), |s: i8| s as f32 / 128.0)
        }
        AudioBufferRef::S16(b) => {
            interleave_convert(b.planes(), b.frames(), |s: i16| s as f32 / 32768.0)
        }
        AudioBufferRef::S24(b) => {
            interleave_convert(b.planes(), b.frames(), |s| s.inner() as f32 / 8388608.0)
        }
        AudioBufferRef::S32(b) => {
            interleave_convert(b.planes(), b.frames(), |s: i32| s as f32 / 2147483648.0)
        }
        AudioBufferRef::U8(b) => {
            interleave_convert(b.planes(), b.frames(), |s: u8| (s as f32 - 128.0) / 128.0)
        }
        AudioBufferRef::U16(b) => {
            interleave_convert(b.planes(), b.frames(), |s: u16| (s as f32 - 32768.0) / 32768.0)
        }
        AudioBufferRef::U24(b) => interleave_convert(b.planes(), b.frames(), |s| {
            (s.inner() as f32 - 8388608.0) / 8388608.0
        }),
        AudioBufferRef::U32(b) => interleave_convert(b.planes(), b.frames(), |s: u32| {
            ((s as f64 - 2147483648.0) / 2147483648.0) as f32
        }),
    }
}

fn interleave_convert<T: Sample + Copy, F: Fn(T) -> f32>(
    planes: AudioPlanes<T>,
    frames: usize,
    convert: F,
) -> Vec<f32> {
    let planes = planes.planes();
    if planes.is_empty() || frames == 0 {
        return vec![];
    }

    let mut interleaved = Vec::with_capacity(frames * planes.len());
    for frame in 0..frames {
        for plane in planes.iter() {
            interleaved.push(convert(plane[frame]));
        }
    }
    interleaved
}

/// Split interleaved samples into `out_channels` planes.
/// Mono is duplicated; mono output averages the source channels.
fn remap_channels(samples: &[f32], in_channels: usize, out_channels: usize) -> Vec<Vec<f32>> {
    if in_channels == 0 || out_channels == 0 {
        return vec![Vec::new(); out_channels];
    }
    let frames = samples.len() / in_channels;
    let mut planar = vec![Vec::with_capacity(frames); out_channels];

    for frame in samples.chunks_exact(in_channels) {
        if out_channels == 1 {
            planar[0].push(frame.iter().sum::<f32>() / in_channels as f32);
        } else {
            for (ch, plane) in planar.iter_mut().enumerate() {
                plane.push(frame[ch % in_channels]);
            }
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        for plane in planar {
            out.push(plane[frame]);
        }
    }
    out
}

fn resample(planar: Vec<Vec<f32>>, from: u32, to: u32) -> Result<Vec<Vec<f32>>, AudioError> {
    let channels = planar.len();
    let frames = planar.first().map(Vec::len).unwrap_or(0);
    let mut resampler = FftFixedIn::<f32>::new(from as usize, to as usize, RESAMPLE_CHUNK, 2, channels)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let mut out = vec![Vec::new(); channels];
    let mut append = |block: Vec<Vec<f32>>| {
        for (dst, src) in out.iter_mut().zip(block) {
            dst.extend_from_slice(&src);
        }
    };

    let mut pos = 0;
    while pos + resampler.input_frames_next() <= frames {
        let n = resampler.input_frames_next();
        let block: Vec<&[f32]> = planar.iter().map(|c| &c[pos..pos + n]).collect();
        append(
            resampler
                .process(&block, None)
                .map_err(|e| AudioError::Resample(e.to_string()))?,
        );
        pos += n;
    }
    if pos < frames {
        let block: Vec<&[f32]> = planar.iter().map(|c| &c[pos..]).collect();
        append(
            resampler
                .process_partial(Some(block.as_slice()), None)
                .map_err(|e| AudioError::Resample(e.to_string()))?,
        );
    }
    // Flush the samples still held back by the filter delay
    append(
        resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?,
    );

    let delay = resampler.output_delay();
    let expected = (frames as u64 * to as u64 / from as u64) as usize;
    for plane in out.iter_mut() {
        plane.drain(..delay.min(plane.len()));
        plane.truncate(expected);
    }
    Ok(out)
}
