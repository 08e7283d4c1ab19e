//! Bidirectional PCM16 sample-rate conversion using a rubato `FastFixedIn`
//! resampler (spec §4.1 "Sample-rate policy"), adapted from a cpal/f32
//! capture pipeline to the telephony/model PCM16-byte boundary.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::error;

/// Converts 16-bit signed-linear PCM (little-endian) from one fixed sample
/// rate to another, maintaining filter state across calls so consecutive
/// chunks in the same direction are phase-continuous.
pub struct RateConverter {
    /// `None` when src rate == target rate (passthrough).
    resampler: Option<FastFixedIn<f32>>,
    input_buf: Vec<f32>,
    chunk_size: usize,
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    /// `chunk_size` is the input frame count per rubato call; pick it to
    /// match the caller's natural unit (one telephony frame going in, one
    /// model-rate frame going out) so accumulation rarely straddles calls.
    pub fn new(src_rate: u32, target_rate: u32, chunk_size: usize) -> Self {
        if src_rate == target_rate {
            return Self { resampler: None, input_buf: Vec::new(), chunk_size, output_buf: Vec::new() };
        }

        let ratio = target_rate as f64 / src_rate as f64;
        let resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, chunk_size, 1)
            .expect("resampler parameters are always valid for supported telephony rates");

        let max_out = resampler.output_frames_max();
        Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            chunk_size,
            output_buf: vec![vec![0f32; max_out]; 1],
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    /// Resample one buffer of 16-bit signed-linear PCM, little-endian.
    /// May return fewer samples than a full ratio-scaled conversion would
    /// imply: remainders below `chunk_size` are held for the next call.
    pub fn resample(&mut self, pcm: &[u8]) -> Vec<u8> {
        if pcm.len() < 2 {
            return pcm.to_vec();
        }

        let Some(ref mut resampler) = self.resampler else {
            return pcm.to_vec();
        };

        self.input_buf.extend(pcm.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]]) as f32));

        let mut out_samples: Vec<f32> = Vec::new();
        while self.input_buf.len() >= self.chunk_size {
            let input_slice = &self.input_buf[..self.chunk_size];
            match resampler.process_into_buffer(&[input_slice], &mut self.output_buf, None) {
                Ok((_consumed, produced)) => out_samples.extend_from_slice(&self.output_buf[0][..produced]),
                Err(e) => error!("resampler process error: {e}"),
            }
            self.input_buf.drain(..self.chunk_size);
        }

        out_samples.into_iter().flat_map(|s| (s.clamp(-32768.0, 32767.0) as i16).to_le_bytes()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_is_identity() {
        let mut rc = RateConverter::new(8000, 8000, 160);
        assert!(rc.is_passthrough());
        let pcm: Vec<u8> = (0..320u16).flat_map(|i| i.to_le_bytes()).collect();
        assert_eq!(rc.resample(&pcm), pcm);
    }

    #[test]
    fn upsample_8k_to_24k_triples_length_in_steady_state() {
        let mut rc = RateConverter::new(8000, 24000, 160);
        let frame = vec![0u8; 320]; // 160 samples @ 8kHz
        let _ = rc.resample(&frame); // prime the filter
        let out = rc.resample(&frame);
        let expected = 480usize; // 160 samples * 3
        let got_samples = out.len() / 2;
        assert!(
            (got_samples as isize - expected as isize).unsigned_abs() <= 8,
            "got {got_samples} samples, expected ~{expected}"
        );
    }

    #[test]
    fn partial_accumulation_returns_empty() {
        let mut rc = RateConverter::new(8000, 24000, 480);
        let out = rc.resample(&vec![0u8; 200]);
        assert!(out.is_empty());
    }
}
