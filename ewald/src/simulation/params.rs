//! Numerical parameters of the Ewald sum
//!
//! `Parameters` holds the settings that fully determine both sums:
//! - wave-vector sphere radius `ksize`,
//! - splitting parameter `alpha` and reciprocal normalization `sigma`,
//! - real-space `cutoff` and periodic box lengths `cycle`
//!
//! The fields are checked once in [`Parameters::new`] and cannot be changed
//! afterwards, so the parallel passes share them by reference.

use std::f64::consts::PI;

use crate::configuration::config::ConfigError;
use crate::simulation::states::NVec3;

/// Reciprocal normalization for a unit Coulomb coupling, `1 / (4π)`
pub const DEFAULT_SIGMA: f64 = 0.25 / PI;

#[derive(Debug, Clone)]
pub struct Parameters {
    ksize: u32, // radius of the wave-vector sphere
    alpha: f64, // real/reciprocal splitting
    sigma: f64, // reciprocal normalization
    cutoff: f64, // real-space truncation radius
    cycle: NVec3, // periodic box lengths
}

impl Parameters {
    pub fn new(ksize: u32, alpha: f64, sigma: f64, cutoff: f64, cycle: NVec3) -> Result<Self, ConfigError> {
        for (axis, &length) in cycle.iter().enumerate() {
            if !(length.is_finite() && length > 0.0) {
                return Err(ConfigError::NonPositiveCycle { axis, value: length });
            }
        }
        for (name, value) in [("alpha", alpha), ("sigma", sigma), ("cutoff", cutoff)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }

        // minimum image must stay unique inside the cutoff sphere
        let limit = 0.5 * cycle.min();
        if cutoff >= limit {
            return Err(ConfigError::CutoffTooLarge { cutoff, limit });
        }

        Ok(Self { ksize, alpha, sigma, cutoff, cycle })
    }

    pub fn ksize(&self) -> u32 {
        self.ksize
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn cycle(&self) -> &NVec3 {
        &self.cycle
    }

    /// Per-axis conversion from integer wave index to wave number, `2π / cycle`
    pub fn scale(&self) -> NVec3 {
        self.cycle.map(|length| 2.0 * PI / length)
    }

    pub fn volume(&self) -> f64 {
        self.cycle.x * self.cycle.y * self.cycle.z
    }

    /// Leaf radius below which a per-leaf periodic offset is exact.
    ///
    /// Two leaves of radius `r` keep `cutoff + 2r` under half the shortest
    /// box length, so the image picked from their centers is the minimum
    /// image of every body pair within the cutoff.
    pub fn max_leaf_radius(&self) -> f64 {
        0.5 * (0.5 * self.cycle.min() - self.cutoff)
    }
}
