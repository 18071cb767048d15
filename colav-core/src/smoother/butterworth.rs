//! Butterworth low-pass design and zero-phase filtering
//!
//! Coefficients are designed once at construction from (order, cutoff,
//! Nyquist): analog prototype poles, low-pass frequency warp, bilinear
//! transform. [`Butterworth::filtfilt`] applies the filter forward and
//! backward with odd-extension padding and steady-state initial conditions,
//! so the smoothed sequence has no phase lag.

use std::f64::consts::PI;

use nalgebra::{Complex, ComplexField, DMatrix, DVector};

/// A designed low-pass filter: numerator `b`, denominator `a` (a[0] = 1) and
/// the steady-state filter state `zi` for a unit-amplitude input.
#[derive(Debug, Clone)]
pub struct Butterworth {
    b: Vec<f64>,
    a: Vec<f64>,
    zi: Vec<f64>,
}

impl Butterworth {
    /// Design a low-pass filter of the given order with cutoff and Nyquist
    /// frequencies in the same unit (their ratio is what matters).
    pub fn lowpass(order: usize, cutoff: f64, nyquist: f64) -> Self {
        let (b, a) = design_lowpass(order, cutoff / nyquist);
        let zi = steady_state(&b, &a);
        Self { b, a, zi }
    }

    /// Transfer-function coefficients (b, a).
    pub fn coefficients(&self) -> (&[f64], &[f64]) {
        (&self.b, &self.a)
    }

    /// Causal direct-form-II-transposed filter with initial state `z`.
    fn lfilter(&self, x: &[f64], mut z: Vec<f64>) -> Vec<f64> {
        let b = &self.b;
        let a = &self.a;
        let m = z.len();
        x.iter()
            .map(|&xi| {
                let y = b[0] * xi + z[0];
                for j in 0..m - 1 {
                    z[j] = b[j + 1] * xi + z[j + 1] - a[j + 1] * y;
                }
                z[m - 1] = b[m] * xi - a[m] * y;
                y
            })
            .collect()
    }

    /// Zero-phase forward-backward filtering. Sequences no longer than the
    /// padding length are returned unfiltered.
    pub fn filtfilt(&self, x: &[f64]) -> Vec<f64> {
        let padlen = 3 * self.a.len().max(self.b.len());
        let n = x.len();
        if n <= padlen {
            return x.to_vec();
        }

        // Odd extension at both ends to suppress edge transients
        let mut ext = Vec::with_capacity(n + 2 * padlen);
        for i in (1..=padlen).rev() {
            ext.push(2.0 * x[0] - x[i]);
        }
        ext.extend_from_slice(x);
        for i in 1..=padlen {
            ext.push(2.0 * x[n - 1] - x[n - 1 - i]);
        }

        let z0: Vec<f64> = self.zi.iter().map(|zi| zi * ext[0]).collect();
        let mut forward = self.lfilter(&ext, z0);

        forward.reverse();
        let z1: Vec<f64> = self.zi.iter().map(|zi| zi * forward[0]).collect();
        let mut backward = self.lfilter(&forward, z1);
        backward.reverse();

        backward[padlen..padlen + n].to_vec()
    }
}

/// Digital low-pass design for normalized cutoff `wn` (1 = Nyquist).
fn design_lowpass(order: usize, wn: f64) -> (Vec<f64>, Vec<f64>) {
    let fs = 2.0;
    let warped = 2.0 * fs * (PI * wn / fs).tan();

    // Analog prototype poles on the unit circle, left half-plane, scaled to
    // the warped cutoff
    let poles: Vec<Complex<f64>> = (0..order)
        .map(|k| {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            Complex::new(0.0, theta).exp() * warped
        })
        .collect();

    // Bilinear transform: poles map to (2fs + p)/(2fs - p), every analog
    // zero at infinity maps to z = -1
    let fs2 = 2.0 * fs;
    let z_poles: Vec<Complex<f64>> = poles
        .iter()
        .map(|&p| (Complex::new(fs2, 0.0) + p) / (Complex::new(fs2, 0.0) - p))
        .collect();

    let mut denom_gain = Complex::new(1.0, 0.0);
    for &p in &poles {
        denom_gain *= Complex::new(fs2, 0.0) - p;
    }
    let gain = warped.powi(order as i32) / denom_gain.re;

    // Numerator gain * (z + 1)^order via Pascal's triangle
    let mut binomial = vec![1.0_f64];
    for _ in 0..order {
        let mut next = vec![1.0; binomial.len() + 1];
        for i in 1..binomial.len() {
            next[i] = binomial[i - 1] + binomial[i];
        }
        binomial = next;
    }
    let b: Vec<f64> = binomial.iter().map(|c| c * gain).collect();
    let a = poly_from_roots(&z_poles);
    (b, a)
}

/// Real polynomial coefficients (descending powers, leading 1) from a
/// conjugate-closed root set.
fn poly_from_roots(roots: &[Complex<f64>]) -> Vec<f64> {
    let mut poly = vec![Complex::new(1.0, 0.0)];
    for &root in roots {
        let mut next = vec![Complex::new(0.0, 0.0); poly.len() + 1];
        for (i, &coeff) in poly.iter().enumerate() {
            next[i] += coeff;
            next[i + 1] -= coeff * root;
        }
        poly = next;
    }
    poly.iter().map(|c| c.re).collect()
}

/// Steady-state filter state for a unit step, from the direct-form-II
/// transposed state equation z = A z + B: solve (I - A^T) zi = B.
fn steady_state(b: &[f64], a: &[f64]) -> Vec<f64> {
    let n = a.len();
    let m = n - 1;

    let mut i_minus_at = DMatrix::<f64>::identity(m, m);
    for j in 0..m {
        i_minus_at[(j, 0)] += a[j + 1] / a[0];
    }
    for i in 0..m - 1 {
        i_minus_at[(i, i + 1)] -= 1.0;
    }

    let rhs = DVector::from_iterator(m, (1..n).map(|i| b[i] - a[i] * b[0]));
    match i_minus_at.lu().solve(&rhs) {
        Some(zi) => zi.iter().copied().collect(),
        None => vec![0.0; m],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> Butterworth {
        // The pipeline's configuration: order 3, cutoff 0.1, Nyquist 0.5
        Butterworth::lowpass(3, 0.1, 0.5)
    }

    #[test]
    fn test_unity_dc_gain() {
        let (b, a) = {
            let f = filter();
            let (b, a) = f.coefficients();
            (b.to_vec(), a.to_vec())
        };
        assert_eq!(b.len(), 4);
        assert_eq!(a.len(), 4);
        assert!((a[0] - 1.0).abs() < 1e-12);
        let dc = b.iter().sum::<f64>() / a.iter().sum::<f64>();
        assert!((dc - 1.0).abs() < 1e-9, "DC gain {}", dc);
    }

    #[test]
    fn test_filter_is_stable() {
        let f = filter();
        let mut impulse = vec![0.0; 200];
        impulse[0] = 1.0;
        let response = f.lfilter(&impulse, vec![0.0; 3]);
        let tail: f64 = response[150..].iter().map(|v| v.abs()).sum();
        assert!(tail < 1e-6, "impulse response did not decay: {}", tail);
    }

    #[test]
    fn test_constant_signal_is_fixed_point() {
        let f = filter();
        let x = vec![42.5; 30];
        let y = f.filtfilt(&x);
        assert_eq!(y.len(), 30);
        for v in y {
            assert!((v - 42.5).abs() < 1e-8);
        }
    }

    #[test]
    fn test_high_frequency_ripple_is_attenuated() {
        let f = filter();
        // Slow ramp plus ripple far above the cutoff
        let x: Vec<f64> = (0..60)
            .map(|i| i as f64 * 0.1 + 0.5 * (i as f64 * 0.8 * PI).sin())
            .collect();
        let y = f.filtfilt(&x);

        let dev = |s: &[f64]| -> f64 {
            s.iter()
                .enumerate()
                .map(|(i, v)| (v - i as f64 * 0.1).powi(2))
                .sum::<f64>()
        };
        assert!(dev(&y) < dev(&x) * 0.25, "ripple not attenuated");
    }

    #[test]
    fn test_short_sequence_passthrough() {
        let f = filter();
        let x = vec![1.0, 2.0, 3.0];
        assert_eq!(f.filtfilt(&x), x);
    }
}
