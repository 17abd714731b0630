//! One-sided magnitude spectrum of a real series.
//!
//! Uses rustfft on a complex buffer with zero imaginary parts and keeps the
//! non-negative frequency bins `0..=n/2`.

use num_complex::Complex;
use rustfft::FftPlanner;

/// Magnitudes `|X_k|` for `k = 0..=n/2`. Empty input gives an empty spectrum.
pub fn magnitude_spectrum(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(signal.len());

    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fft.process(&mut buffer);

    buffer.truncate(signal.len() / 2 + 1);
    buffer.iter().map(|c| c.norm()).collect()
}

/// Largest bin excluding DC, as `(bin, magnitude)`.
pub fn peak_excluding_dc(spectrum: &[f64]) -> Option<(usize, f64)> {
    spectrum
        .iter()
        .copied()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(&b.1))
}
