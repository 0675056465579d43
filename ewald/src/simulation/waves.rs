//! Reciprocal-space part of the Ewald sum
//!
//! Wave vectors are the integer triples inside a sphere of radius `ksize`,
//! scaled per axis by `2π / cycle`. Only one of each `±k` pair is kept: the
//! charge density is real, so its transform is Hermitian and the
//! cosine/sine pairing in [`idft`] accounts for the mirrored half. The
//! `2 / sigma` prefactor in [`scale_waves`] carries the factor of two.
//!
//! The pass runs in three phases over a transient wave set:
//! 1. [`dft`]         body charges -> wave amplitudes (parallel over waves)
//! 2. [`scale_waves`] Gaussian-damped `1/K²` kernel applied in place
//! 3. [`idft`]        amplitudes -> potential and gradient (parallel over bodies)
//!
//! Each phase finishes before the next one starts.

use rayon::prelude::*;

use crate::simulation::params::Parameters;
use crate::simulation::states::{NVec3, NVec4};

/// One reciprocal-space mode
#[derive(Debug, Clone)]
pub struct Wave {
    pub k: NVec3, // integer wave index
    pub real: f64, // real part of the amplitude
    pub imag: f64, // imaginary part of the amplitude
}

/// Enumerate the half-space of wave indices with `l² + m² + n² <= ksize²`.
///
/// - `l` runs over `0..=ksize`
/// - `l == 0` keeps only `m >= 0`
/// - `l == 0 && m == 0` keeps only `n >= 1`, dropping the zero vector
///
/// Amplitudes start at zero.
pub fn init_waves(ksize: u32) -> Vec<Wave> {
    let kmax = ksize as i64;
    let kmaxsq = kmax * kmax;
    let mut waves = Vec::new();

    for l in 0..=kmax {
        let mmin = if l == 0 { 0 } else { -kmax };
        for m in mmin..=kmax {
            let nmin = if l == 0 && m == 0 { 1 } else { -kmax };
            for n in nmin..=kmax {
                if l * l + m * m + n * n <= kmaxsq {
                    waves.push(Wave {
                        k: NVec3::new(l as f64, m as f64, n as f64),
                        real: 0.0,
                        imag: 0.0,
                    });
                }
            }
        }
    }

    waves
}

#[inline]
fn phase(k: &NVec3, source: &NVec4, scale: &NVec3) -> f64 {
    k.component_mul(scale).dot(&source.xyz())
}

/// Forward transform: `real = Σ q cos θ`, `imag = Σ q sin θ` for every wave.
///
/// `sources[b]` is `(x, y, z, q)`. Existing amplitudes are overwritten.
pub fn dft(waves: &mut [Wave], sources: &[NVec4], scale: &NVec3) {
    waves.par_iter_mut().for_each(|wave| {
        let mut real = 0.0;
        let mut imag = 0.0;
        for source in sources {
            let (sin, cos) = phase(&wave.k, source, scale).sin_cos();
            real += source[3] * cos;
            imag += source[3] * sin;
        }
        wave.real = real;
        wave.imag = imag;
    });
}

/// Multiply every amplitude by `2 / (sigma V) · exp(-K² / 4α²) / K²`.
pub fn scale_waves(waves: &mut [Wave], params: &Parameters) {
    let scale = params.scale();
    let coef = 2.0 / params.sigma() / params.volume();
    let coef2 = 1.0 / (4.0 * params.alpha() * params.alpha());

    for wave in waves.iter_mut() {
        let k2 = wave.k.component_mul(&scale).norm_squared(); // never 0, see init_waves
        let factor = coef * (-k2 * coef2).exp() / k2;
        wave.real *= factor;
        wave.imag *= factor;
    }
}

/// Inverse transform: add the wave-space potential and gradient at each
/// source position into the matching target accumulator.
pub fn idft(waves: &[Wave], targets: &mut [NVec4], sources: &[NVec4], scale: &NVec3) {
    debug_assert_eq!(targets.len(), sources.len(), "one target per source body");

    targets
        .par_iter_mut()
        .zip(sources.par_iter())
        .for_each(|(target, source)| {
            let mut trg = NVec4::zeros();
            for wave in waves {
                let (sin, cos) = phase(&wave.k, source, scale).sin_cos();
                let dtmp = wave.real * sin - wave.imag * cos;
                trg[0] += wave.real * cos + wave.imag * sin;
                for d in 0..3 {
                    trg[d + 1] -= dtmp * wave.k[d];
                }
            }
            for d in 0..3 {
                trg[d + 1] *= scale[d];
            }
            *target += trg;
        });
}
