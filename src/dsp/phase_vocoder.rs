//! Phase vocoder time stretching
//!
//! Short-time Fourier analysis at hop `synthesis_hop * speed`, per-bin phase
//! propagation, and overlap-add resynthesis at `synthesis_hop`. Input is
//! consumed block-wise and output is flushed as soon as it is final, so
//! memory stays bounded by a few analysis frames per channel.
//!
//! For `n` input frames the processor emits exactly `floor(n / speed)`
//! frames.

use std::f32::consts::PI;
use std::sync::Arc;

use num_traits::ToPrimitive;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::stretch::{BlockReader, BlockWriter, TimeStretch};
use crate::engine::buffer::{f32_to_i16, i16_to_f32};
use crate::error::{Result, SpeedcutError};

/// Default analysis/synthesis frame length in samples
pub const DEFAULT_FRAME_LENGTH: usize = 2048;

/// Default synthesis hop (a quarter of the frame)
pub const DEFAULT_SYNTHESIS_HOP: usize = 512;

/// Frames pulled from the reader per read call
const READ_BLOCK_FRAMES: usize = 4096;

/// Overlap-add positions whose squared-window sum is below this are not
/// normalized
const WINDOW_SUM_FLOOR: f32 = 1e-3;

/// Phase vocoder time-stretch processor
#[derive(Debug, Clone)]
pub struct PhaseVocoder {
    channels: usize,
    frame_length: usize,
    synthesis_hop: usize,
}

impl PhaseVocoder {
    /// Create a processor with the default frame length and hop
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            frame_length: DEFAULT_FRAME_LENGTH,
            synthesis_hop: DEFAULT_SYNTHESIS_HOP,
        }
    }

    /// Override the frame length and synthesis hop
    ///
    /// The hop must be at most half the frame length so consecutive frames
    /// overlap.
    pub fn with_frame(mut self, frame_length: usize, synthesis_hop: usize) -> Result<Self> {
        if frame_length < 4 || synthesis_hop == 0 || synthesis_hop > frame_length / 2 {
            return Err(SpeedcutError::stretch(format!(
                "Invalid frame length {} / hop {}",
                frame_length, synthesis_hop
            )));
        }
        self.frame_length = frame_length;
        self.synthesis_hop = synthesis_hop;
        Ok(self)
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn synthesis_hop(&self) -> usize {
        self.synthesis_hop
    }
}

impl TimeStretch for PhaseVocoder {
    fn name(&self) -> &'static str {
        "phase_vocoder"
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn run(
        &self,
        speed: f64,
        reader: &mut dyn BlockReader,
        writer: &mut dyn BlockWriter,
    ) -> Result<usize> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(SpeedcutError::stretch(format!(
                "Speed must be positive and finite, got {}",
                speed
            )));
        }
        if self.channels == 0 {
            return Err(SpeedcutError::UnsupportedChannelLayout {
                expected: 2,
                found: 0,
            });
        }
        for found in [reader.channels(), writer.channels()] {
            if found != self.channels {
                return Err(SpeedcutError::UnsupportedChannelLayout {
                    expected: self.channels,
                    found,
                });
            }
        }

        let mut state = VocoderRun::new(self, speed);
        state.process(reader, writer)
    }
}

/// Hann window of length `n`
fn hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

/// Wrap a phase into [-PI, PI]
#[inline]
fn principal_arg(phase: f32) -> f32 {
    phase - 2.0 * PI * (phase / (2.0 * PI)).round()
}

/// Per-channel analysis and synthesis state
struct ChannelState {
    /// Input samples; index 0 sits at `VocoderRun::input_base`
    input: Vec<f32>,
    /// Overlap-add accumulator; index 0 sits at `VocoderRun::output_base`
    output: Vec<f32>,
    prev_phase: Vec<f32>,
    synth_phase: Vec<f32>,
}

/// State of one `run` call.
///
/// Input and output positions are shifted by half a frame: the input is
/// preceded by `frame_length / 2` virtual zeros, so analysis frame `k`
/// starts at shifted input position `round(k * analysis_hop)` and its
/// synthesis frame at shifted output position `k * synthesis_hop`.
struct VocoderRun {
    channels: usize,
    frame_length: usize,
    half: usize,
    synthesis_hop: usize,
    analysis_hop: f64,
    speed: f64,
    window: Vec<f32>,
    fft_forward: Arc<dyn Fft<f32>>,
    fft_inverse: Arc<dyn Fft<f32>>,
    spectrum: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    phases: Vec<f32>,
    states: Vec<ChannelState>,
    window_sum: Vec<f32>,
    input_base: usize,
    output_base: usize,
    frames_read: usize,
    frames_written: usize,
    eof: bool,
}

impl VocoderRun {
    fn new(config: &PhaseVocoder, speed: f64) -> Self {
        let n = config.frame_length;
        let half = n / 2;
        let bins = n / 2 + 1;
        let mut planner = FftPlanner::new();

        let states = (0..config.channels)
            .map(|_| ChannelState {
                input: vec![0.0; half],
                output: Vec::with_capacity(2 * n),
                prev_phase: vec![0.0; bins],
                synth_phase: vec![0.0; bins],
            })
            .collect();

        Self {
            channels: config.channels,
            frame_length: n,
            half,
            synthesis_hop: config.synthesis_hop,
            analysis_hop: config.synthesis_hop as f64 * speed,
            speed,
            window: hann(n),
            fft_forward: planner.plan_fft_forward(n),
            fft_inverse: planner.plan_fft_inverse(n),
            spectrum: vec![Complex::new(0.0, 0.0); n],
            magnitudes: vec![0.0; bins],
            phases: vec![0.0; bins],
            states,
            window_sum: Vec::with_capacity(2 * n),
            input_base: 0,
            output_base: 0,
            frames_read: 0,
            frames_written: 0,
            eof: false,
        }
    }

    fn process(&mut self, reader: &mut dyn BlockReader, writer: &mut dyn BlockWriter) -> Result<usize> {
        let mut read_block = vec![0i16; READ_BLOCK_FRAMES * self.channels];
        let mut prev_start = 0usize;
        let mut k = 0usize;

        loop {
            let start = self.analysis_start(k);
            self.fill_input(start + self.frame_length, reader, &mut read_block)?;

            if self.eof && k * self.synthesis_hop >= self.output_frames_bound() + self.half {
                break;
            }

            let hop = if k == 0 || start == prev_start {
                self.analysis_hop as f32
            } else {
                (start - prev_start) as f32
            };
            self.process_frame(k, start, hop);
            prev_start = start;

            self.discard_input(self.analysis_start(k + 1));
            let settled = ((k + 1) * self.synthesis_hop).saturating_sub(self.half);
            self.flush(settled.min(self.output_frames_bound()), writer)?;
            k += 1;
        }

        self.flush(self.output_frames_bound(), writer)?;
        Ok(self.frames_written)
    }

    /// Output length implied by the input seen so far; exact once the
    /// reader is exhausted.
    fn output_frames_bound(&self) -> usize {
        (self.frames_read as f64 / self.speed)
            .floor()
            .to_usize()
            .unwrap_or(0)
    }

    fn analysis_start(&self, k: usize) -> usize {
        (k as f64 * self.analysis_hop)
            .round()
            .to_usize()
            .unwrap_or(usize::MAX)
    }

    /// Read until the shifted input covers `until` or the reader runs dry
    fn fill_input(
        &mut self,
        until: usize,
        reader: &mut dyn BlockReader,
        block: &mut [i16],
    ) -> Result<()> {
        while !self.eof && self.input_base + self.states[0].input.len() < until {
            let frames = reader.read(block)?;
            if frames == 0 {
                self.eof = true;
                break;
            }
            if frames * self.channels > block.len() {
                return Err(SpeedcutError::stretch(format!(
                    "Reader returned {} frames for a {}-frame block",
                    frames,
                    block.len() / self.channels
                )));
            }
            for frame in block[..frames * self.channels].chunks_exact(self.channels) {
                for (state, &sample) in self.states.iter_mut().zip(frame) {
                    state.input.push(i16_to_f32(sample));
                }
            }
            self.frames_read += frames;
        }
        Ok(())
    }

    fn discard_input(&mut self, next_start: usize) {
        if next_start <= self.input_base {
            return;
        }
        let buffered = self.states[0].input.len();
        let count = (next_start - self.input_base).min(buffered);
        for state in &mut self.states {
            state.input.drain(..count);
        }
        self.input_base += count;
    }

    fn process_frame(&mut self, k: usize, start: usize, hop: f32) {
        let n = self.frame_length;
        let bins = n / 2 + 1;
        let out_offset = k * self.synthesis_hop - self.output_base;
        let needed = out_offset + n;

        if self.window_sum.len() < needed {
            self.window_sum.resize(needed, 0.0);
        }
        for (i, w) in self.window.iter().enumerate() {
            self.window_sum[out_offset + i] += w * w;
        }

        for state in &mut self.states {
            for i in 0..n {
                let pos = start + i;
                let sample = if pos >= self.input_base {
                    state.input.get(pos - self.input_base).copied().unwrap_or(0.0)
                } else {
                    0.0
                };
                self.spectrum[i] = Complex::new(sample * self.window[i], 0.0);
            }
            self.fft_forward.process(&mut self.spectrum);

            for b in 0..bins {
                self.magnitudes[b] = self.spectrum[b].norm();
                self.phases[b] = self.spectrum[b].arg();
            }

            if k == 0 {
                state.synth_phase.copy_from_slice(&self.phases);
            } else {
                for b in 0..bins {
                    let omega = 2.0 * PI * b as f32 / n as f32;
                    let deviation = principal_arg(self.phases[b] - state.prev_phase[b] - omega * hop);
                    let frequency = omega + deviation / hop;
                    state.synth_phase[b] =
                        principal_arg(state.synth_phase[b] + frequency * self.synthesis_hop as f32);
                }
            }
            state.prev_phase.copy_from_slice(&self.phases);

            for b in 0..bins {
                self.spectrum[b] = Complex::from_polar(self.magnitudes[b], state.synth_phase[b]);
            }
            for b in 1..n - bins + 1 {
                self.spectrum[n - b] = self.spectrum[b].conj();
            }
            self.fft_inverse.process(&mut self.spectrum);

            if state.output.len() < needed {
                state.output.resize(needed, 0.0);
            }
            let scale = 1.0 / n as f32;
            for i in 0..n {
                state.output[out_offset + i] += self.spectrum[i].re * scale * self.window[i];
            }
        }
    }

    /// Emit every output frame before real position `limit`
    fn flush(&mut self, limit: usize, writer: &mut dyn BlockWriter) -> Result<()> {
        if limit <= self.frames_written {
            return Ok(());
        }

        let count = limit - self.frames_written;
        let mut block = Vec::with_capacity(count * self.channels);
        for j in self.frames_written..limit {
            let idx = j + self.half - self.output_base;
            let norm = match self.window_sum.get(idx) {
                Some(&w) if w > WINDOW_SUM_FLOOR => w,
                _ => 1.0,
            };
            for state in &self.states {
                let value = state.output.get(idx).copied().unwrap_or(0.0) / norm;
                block.push(f32_to_i16(value));
            }
        }
        writer.write(&block)?;
        self.frames_written = limit;

        // Keep everything a future frame can still add to
        let keep_from = (limit + self.half).min(self.next_synthesis_start());
        if keep_from > self.output_base {
            let drop = (keep_from - self.output_base).min(self.window_sum.len());
            self.window_sum.drain(..drop);
            for state in &mut self.states {
                let drop = drop.min(state.output.len());
                state.output.drain(..drop);
            }
            self.output_base += drop;
        }
        Ok(())
    }

    /// Shifted output position of the next synthesis frame
    fn next_synthesis_start(&self) -> usize {
        let last = (self.output_base + self.window_sum.len()).saturating_sub(self.frame_length);
        last + self.synthesis_hop
    }
}
