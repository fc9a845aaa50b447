//! Quick statistical look at fetched random bytes.
//!
//! Byte histogram, per-bit balance, and an autocorrelation profile, plus a
//! square "TV static" frame for eyeballing. None of this certifies anything;
//! it is the same sanity check one would plot by hand.

use serde::Serialize;
use std::f64::consts::PI;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Autocorrelation at a single lag.
#[derive(Debug, Clone, Serialize)]
pub struct LagCorrelation {
    pub lag: usize,
    pub correlation: f64,
}

/// Autocorrelation profile across multiple lags.
#[derive(Debug, Clone, Serialize)]
pub struct AutocorrResult {
    pub lags: Vec<LagCorrelation>,
    pub max_abs_correlation: f64,
    pub max_abs_lag: usize,
    /// 95% significance threshold (2/sqrt(n)).
    pub threshold: f64,
    /// Number of lags exceeding the threshold.
    pub violations: usize,
}

/// Per-bit-position balance.
#[derive(Debug, Clone, Serialize)]
pub struct BitBalance {
    /// Fraction of ones for each bit position (0=LSB, 7=MSB).
    pub ones_ratio: [f64; 8],
    /// Mean deviation from 0.5.
    pub overall_bias: f64,
    /// Any bit position deviating > 0.01 from 0.5.
    pub has_significant_bias: bool,
}

/// Counts of each byte value.
#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    /// 256 bins, one per byte value.
    pub counts: Vec<u64>,
    pub mean: f64,
    /// Chi-squared against a flat distribution, 255 degrees of freedom.
    pub chi_squared: f64,
    pub p_value: f64,
}

/// Everything [`summarize`] computes.
#[derive(Debug, Clone, Serialize)]
pub struct ByteSummary {
    pub sample_size: usize,
    pub histogram: Histogram,
    pub bit_balance: BitBalance,
    pub autocorrelation: AutocorrResult,
}

/// Square grayscale frame cut from the sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFrame {
    pub side: usize,
    pub pixels: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Analysis functions
// ---------------------------------------------------------------------------

pub fn histogram(data: &[u8]) -> Histogram {
    let mut counts = vec![0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    if data.is_empty() {
        return Histogram {
            counts,
            mean: 0.0,
            chi_squared: 0.0,
            p_value: 1.0,
        };
    }

    let n = data.len() as f64;
    let mean = data.iter().map(|&b| b as f64).sum::<f64>() / n;
    let expected = n / 256.0;
    let chi_squared: f64 = counts
        .iter()
        .map(|&c| {
            let diff = c as f64 - expected;
            diff * diff / expected
        })
        .sum();

    Histogram {
        counts,
        mean,
        chi_squared,
        p_value: chi_squared_p_value(chi_squared, 255),
    }
}

/// Fraction of ones at each bit position.
pub fn bit_balance(data: &[u8]) -> BitBalance {
    if data.is_empty() {
        return BitBalance {
            ones_ratio: [0.0; 8],
            overall_bias: 0.0,
            has_significant_bias: false,
        };
    }

    let n = data.len() as f64;
    let mut counts = [0u64; 8];
    for &byte in data {
        for (bit, count) in counts.iter_mut().enumerate() {
            if byte & (1 << bit) != 0 {
                *count += 1;
            }
        }
    }

    let mut ones_ratio = [0.0; 8];
    for (i, &c) in counts.iter().enumerate() {
        ones_ratio[i] = c as f64 / n;
    }
    let overall_bias = ones_ratio.iter().map(|&p| (p - 0.5).abs()).sum::<f64>() / 8.0;

    BitBalance {
        ones_ratio,
        overall_bias,
        has_significant_bias: ones_ratio.iter().any(|&p| (p - 0.5).abs() > 0.01),
    }
}

/// Biased autocorrelation for lags 1..=max_lag, normalized so lag 0 is 1.
pub fn autocorrelation_profile(data: &[u8], max_lag: usize) -> AutocorrResult {
    let n = data.len();
    let max_lag = max_lag.min(n / 2);
    if max_lag == 0 {
        return AutocorrResult {
            lags: Vec::new(),
            max_abs_correlation: 0.0,
            max_abs_lag: 0,
            threshold: if n == 0 { 0.0 } else { 2.0 / (n as f64).sqrt() },
            violations: 0,
        };
    }

    let arr: Vec<f64> = data.iter().map(|&b| b as f64).collect();
    let mean: f64 = arr.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = arr.iter().map(|x| x - mean).collect();
    let var: f64 = centered.iter().map(|x| x * x).sum::<f64>() / n as f64;

    let threshold = 2.0 / (n as f64).sqrt();
    let mut lags = Vec::with_capacity(max_lag);
    let mut max_abs = 0.0f64;
    let mut max_abs_lag = 1;
    let mut violations = 0;

    for lag in 1..=max_lag {
        let corr = if var < 1e-10 {
            0.0
        } else {
            let sum: f64 = centered[..n - lag]
                .iter()
                .zip(&centered[lag..])
                .map(|(a, b)| a * b)
                .sum();
            sum / n as f64 / var
        };

        if corr.abs() > max_abs {
            max_abs = corr.abs();
            max_abs_lag = lag;
        }
        if corr.abs() > threshold {
            violations += 1;
        }
        lags.push(LagCorrelation {
            lag,
            correlation: corr,
        });
    }

    AutocorrResult {
        lags,
        max_abs_correlation: max_abs,
        max_abs_lag,
        threshold,
        violations,
    }
}

/// Largest square frame the sample fills; trailing bytes are dropped.
pub fn static_frame(data: &[u8]) -> StaticFrame {
    let side = (data.len() as f64).sqrt().floor() as usize;
    StaticFrame {
        side,
        pixels: data[..side * side].to_vec(),
    }
}

impl StaticFrame {
    /// Binary PGM (P5) image.
    pub fn to_pgm(&self) -> Vec<u8> {
        let mut out = format!("P5\n{} {}\n255\n", self.side, self.side).into_bytes();
        out.extend_from_slice(&self.pixels);
        out
    }
}

/// Run every check over `data`.
pub fn summarize(data: &[u8], max_lag: usize) -> ByteSummary {
    ByteSummary {
        sample_size: data.len(),
        histogram: histogram(data),
        bit_balance: bit_balance(data),
        autocorrelation: autocorrelation_profile(data, max_lag),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Chi-squared p-value, Q(df/2, chi2/2).
///
/// Series expansion below the mean, continued fraction above it.
fn chi_squared_p_value(chi2: f64, df: usize) -> f64 {
    let a = df as f64 / 2.0;
    let x = chi2 / 2.0;

    if x <= 0.0 {
        return 1.0;
    }
    let prefix = (-x + a * x.ln() - ln_gamma(a)).exp();

    if x < a + 1.0 {
        let mut term = 1.0 / a;
        let mut sum = term;
        for n in 1..2000 {
            term *= x / (a + n as f64);
            sum += term;
            if term.abs() < 1e-12 * sum.abs() {
                break;
            }
        }
        return (1.0 - prefix * sum).clamp(0.0, 1.0);
    }

    // Modified Lentz.
    let tiny = 1e-300;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / tiny;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..2000 {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < tiny {
            d = tiny;
        }
        c = b + an / c;
        if c.abs() < tiny {
            c = tiny;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < 1e-12 {
            break;
        }
    }
    (prefix * h).clamp(0.0, 1.0)
}

/// Log gamma function (Lanczos approximation).
fn ln_gamma(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let g = 7.0;
    let c = [
        0.999_999_999_999_809_9,
        676.5203681218851,
        -1259.1392167224028,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507343278686905,
        -0.13857109526572012,
        9.984_369_578_019_572e-6,
        1.5056327351493116e-7,
    ];

    let x = x - 1.0;
    let mut sum = c[0];
    for (i, &coeff) in c[1..].iter().enumerate() {
        sum += coeff / (x + i as f64 + 1.0);
    }
    let t = x + g + 0.5;
    0.5 * (2.0 * PI).ln() + (t.ln() * (x + 0.5)) - t + sum.ln()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn random_data(n: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(n);
        let mut state: u64 = 0xdeadbeef;
        for _ in 0..n {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            data.push((state >> 33) as u8);
        }
        data
    }

    #[test]
    fn test_histogram_counts() {
        let h = histogram(&[0, 0, 7, 255]);
        assert_eq!(h.counts.len(), 256);
        assert_eq!(h.counts[0], 2);
        assert_eq!(h.counts[7], 1);
        assert_eq!(h.counts[255], 1);
        assert_eq!(h.counts.iter().sum::<u64>(), 4);
    }

    #[test]
    fn test_histogram_flat_and_spiked() {
        let flat: Vec<u8> = (0..=255u8).cycle().take(256 * 40).collect();
        let h = histogram(&flat);
        assert_eq!(h.chi_squared, 0.0);
        assert_eq!(h.p_value, 1.0);
        assert!((h.mean - 127.5).abs() < 1e-9);

        let spiked = vec![42u8; 10_000];
        assert!(histogram(&spiked).p_value < 1e-6);
    }

    #[test]
    fn test_p_value_matches_closed_form() {
        // With 2 degrees of freedom Q(1, x/2) = exp(-x/2).
        assert!((chi_squared_p_value(2.0, 2) - (-1.0f64).exp()).abs() < 1e-9);
        assert!((chi_squared_p_value(10.0, 2) - (-5.0f64).exp()).abs() < 1e-9);
        let mid = chi_squared_p_value(255.0, 255);
        assert!(mid > 0.4 && mid < 0.6);
    }

    #[test]
    fn test_bit_balance_random() {
        let result = bit_balance(&random_data(10000));
        for &p in &result.ones_ratio {
            assert!((p - 0.5).abs() < 0.05);
        }
    }

    #[test]
    fn test_bit_balance_all_ones() {
        let result = bit_balance(&[0xFF; 1000]);
        for &p in &result.ones_ratio {
            assert!((p - 1.0).abs() < 0.001);
        }
        assert!(result.has_significant_bias);
    }

    #[test]
    fn test_autocorrelation_random() {
        let result = autocorrelation_profile(&random_data(10000), 100);
        assert_eq!(result.lags.len(), 100);
        assert_eq!(result.lags[0].lag, 1);
        assert!(result.max_abs_correlation < 0.1);
    }

    #[test]
    fn test_autocorrelation_alternating() {
        let data: Vec<u8> = (0..1000).map(|i| if i % 2 == 0 { 200 } else { 50 }).collect();
        let result = autocorrelation_profile(&data, 10);
        assert!(result.lags[0].correlation < -0.9);
        assert!(result.lags[1].correlation > 0.9);
        assert_eq!(result.violations, 10);
    }

    #[test]
    fn test_autocorrelation_short_input() {
        assert!(autocorrelation_profile(&[], 100).lags.is_empty());
        assert_eq!(autocorrelation_profile(&[1, 2, 3, 4], 100).lags.len(), 2);
        let constant = autocorrelation_profile(&[9; 64], 4);
        assert!(constant.lags.iter().all(|l| l.correlation == 0.0));
    }

    #[test]
    fn test_static_frame_near_square() {
        let frame = static_frame(&[1u8; 70]);
        assert_eq!(frame.side, 8);
        assert_eq!(frame.pixels.len(), 64);
        let pgm = frame.to_pgm();
        assert!(pgm.starts_with(b"P5\n8 8\n255\n"));
        assert_eq!(pgm.len(), "P5\n8 8\n255\n".len() + 64);
    }

    #[test]
    fn test_summarize() {
        let data = random_data(4096);
        let summary = summarize(&data, 16);
        assert_eq!(summary.sample_size, 4096);
        assert_eq!(summary.autocorrelation.lags.len(), 16);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["histogram"]["counts"].as_array().unwrap().len(), 256);
    }
}
