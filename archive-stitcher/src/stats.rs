/// Parses the handful of `sox ... -n stat` measurements the stitcher
/// needs out of its merged stdout/stderr output. Each line looks like
/// `RMS     amplitude:      0.225000`; we match on the label prefix and
/// split on the first `:`, as the Python original did.
fn field(output: &str, label: &str) -> Option<f64> {
    output.lines().find_map(|line| {
        let line = line.trim();
        if !line.starts_with(label) {
            return None;
        }
        line.split(':').nth(1)?.trim().parse::<f64>().ok()
    })
}

pub fn rms_amplitude(output: &str) -> Option<f64> {
    field(output, "RMS")
}

pub fn volume_adjustment(output: &str) -> Option<f64> {
    field(output, "Volume adjustment")
}

pub fn length_seconds(output: &str) -> Option<f64> {
    field(output, "Length (seconds)")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Samples read:      44100
Length (seconds):   1.000000
Scaled by:         2147483647.0
Maximum amplitude: 0.500000
Minimum amplitude: -0.500000
Midline amplitude: 0.000000
Mean    norm:      0.318910
Mean    amplitude: -0.000000
RMS     amplitude: 0.225000
Rough   frequency: 970
Volume adjustment: 2.000
";

    #[test]
    fn parses_known_fields() {
        assert_eq!(rms_amplitude(SAMPLE), Some(0.225000));
        assert_eq!(volume_adjustment(SAMPLE), Some(2.000));
        assert_eq!(length_seconds(SAMPLE), Some(1.000000));
    }
}
