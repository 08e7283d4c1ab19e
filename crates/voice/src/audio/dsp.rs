//! Small per-frame signal-conditioning helpers used by the input and
//! playout paths (spec §4.1 steps 2 and 3).

const FADE_SAMPLES_MAX: usize = 16; // 2ms @ 8kHz

fn pcm_to_samples(pcm: &[u8]) -> Vec<i32> {
    pcm.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]]) as i32).collect()
}

fn samples_to_pcm(samples: &[i32]) -> Vec<u8> {
    samples.iter().flat_map(|&s| (s.clamp(-32768, 32767) as i16).to_le_bytes()).collect()
}

/// Root-mean-square amplitude of a 16-bit signed-linear PCM buffer.
pub fn rms(pcm: &[u8]) -> i64 {
    let samples = pcm_to_samples(pcm);
    if samples.is_empty() {
        return 0;
    }
    let sum_sq: i64 = samples.iter().map(|&s| (s as i64) * (s as i64)).sum();
    ((sum_sq / samples.len() as i64) as f64).sqrt() as i64
}

/// Replace `pcm` with silence when its RMS falls below `threshold`.
/// `threshold <= 0` disables the gate entirely. Returns whether the gate
/// fired, so callers can track hit counts (spec §4.1 step 2).
pub fn apply_noise_gate(pcm: &[u8], threshold: i32) -> (Vec<u8>, bool) {
    if threshold <= 0 || pcm.is_empty() {
        return (pcm.to_vec(), false);
    }
    if rms(pcm) < threshold as i64 {
        (vec![0u8; pcm.len()], true)
    } else {
        (pcm.to_vec(), false)
    }
}

/// Linear fade-in and/or fade-out over up to 16 samples, to suppress
/// clicks at silence/speech boundaries (spec §4.1 step 3).
pub fn apply_fade(chunk: &[u8], fade_in: bool, fade_out: bool) -> Vec<u8> {
    if !fade_in && !fade_out {
        return chunk.to_vec();
    }

    let mut samples: Vec<f64> = pcm_to_samples(chunk).into_iter().map(|s| s as f64).collect();
    let n = samples.len();
    let fade_len = FADE_SAMPLES_MAX.min(n / 4);
    if fade_len == 0 {
        return chunk.to_vec();
    }

    if fade_in {
        for (i, s) in samples[..fade_len].iter_mut().enumerate() {
            *s *= i as f64 / (fade_len - 1).max(1) as f64;
        }
    }
    if fade_out {
        let start = n - fade_len;
        for (i, s) in samples[start..].iter_mut().enumerate() {
            *s *= 1.0 - (i as f64 / (fade_len - 1).max(1) as f64);
        }
    }

    samples_to_pcm(&samples.into_iter().map(|s| s.round() as i32).collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_gate_silences_low_rms_frame() {
        let quiet = vec![0u8, 0u8, 1u8, 0u8]; // two tiny samples
        let (gated, hit) = apply_noise_gate(&quiet, 50);
        assert!(gated.iter().all(|&b| b == 0));
        assert!(hit);
    }

    #[test]
    fn noise_gate_passes_loud_frame() {
        let loud: Vec<u8> = (0..160i16).flat_map(|_| 20000i16.to_le_bytes()).collect();
        let (gated, hit) = apply_noise_gate(&loud, 50);
        assert_eq!(gated, loud);
        assert!(!hit);
    }

    #[test]
    fn noise_gate_disabled_at_zero_threshold() {
        let quiet = vec![0u8, 0u8];
        let (gated, hit) = apply_noise_gate(&quiet, 0);
        assert_eq!(gated, quiet);
        assert!(!hit);
    }

    #[test]
    fn fade_in_zeroes_first_sample() {
        let full: Vec<u8> = (0..64i16).flat_map(|_| 10000i16.to_le_bytes()).collect();
        let faded = apply_fade(&full, true, false);
        let first = i16::from_le_bytes([faded[0], faded[1]]);
        assert_eq!(first, 0);
    }
}
