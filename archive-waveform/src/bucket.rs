/// Keeps every other multi-channel frame when the source is stereo — a
/// coarse, documented approximation to a true channel average (spec
/// §4.7 step 2).
pub fn downmix_decimate(samples: &[f64], channels: u16) -> Vec<f64> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let frame_len = channels as usize;
    let total_frames = samples.len() / frame_len;
    let mut out = Vec::with_capacity(samples.len() / 2);
    for frame in (0..total_frames).step_by(2) {
        let start = frame * frame_len;
        out.extend_from_slice(&samples[start..start + frame_len]);
    }
    out
}

/// Partitions `samples` (interleaved, `channels`-wide frames) into
/// `size` equal frame buckets and takes the max absolute value in each —
/// spec §4.7 step 3.
pub fn bucket_max_abs(samples: &[f64], channels: u16, size: usize) -> Vec<f64> {
    let frame_len = (channels as usize).max(1);
    let total_frames = samples.len() / frame_len;
    let frames_per_bucket = total_frames / size.max(1);

    (0..size)
        .map(|x| {
            let start = (x * frames_per_bucket * frame_len).min(samples.len());
            let end = (((x + 1) * frames_per_bucket) * frame_len).min(samples.len());
            samples[start..end]
                .iter()
                .fold(0.0_f64, |acc, &v| acc.max(v.abs()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimates_stereo_frames_in_pairs() {
        // 4 stereo frames: (1,2) (3,4) (5,6) (7,8)
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(downmix_decimate(&samples, 2), vec![1.0, 2.0, 5.0, 6.0]);
    }

    #[test]
    fn mono_is_unchanged() {
        let samples = [1.0, 2.0, 3.0];
        assert_eq!(downmix_decimate(&samples, 1), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn buckets_take_max_absolute_value() {
        let samples = [0.1, -0.9, 0.2, 0.05];
        let buckets = bucket_max_abs(&samples, 1, 2);
        assert_eq!(buckets, vec![0.9, 0.2]);
    }
}
