//! Configuration types for loading Ewald scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! periodic electrostatics scenario. A scenario consists of:
//!
//! - [`EwaldConfig`]     – summation parameters (waves, splitting, cutoff, box)
//! - [`TreeConfig`]      – leaf capacity of the octree used by the real part
//! - [`BodyConfig`]      – explicit position and charge of each body
//! - [`GeneratorConfig`] – alternatively, a generated body set
//! - [`ScenarioConfig`]  – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//! A rock-salt scenario in a 2x2x2 box:
//!
//! ```yaml
//! ewald:
//!   ksize: 10             # radius of the wave-vector sphere
//!   alpha: 4.0            # splitting parameter
//!   cutoff: 0.9           # real-space cutoff, below half the shortest box side
//!   cycle: [2.0, 2.0, 2.0]
//!   # sigma: 0.0795774715 # optional, defaults to 1/(4π)
//!
//! tree:
//!   ncrit: 8              # max bodies per leaf
//!
//! generator:
//!   kind: rock_salt
//!   cells: 2
//! ```
//!
//! Explicit bodies replace `generator`:
//!
//! ```yaml
//! bodies:
//!   - x: [0.25, 0.5, 0.5]
//!     q: 1.0
//!   - x: [0.75, 0.5, 0.5]
//!     q: -1.0
//! ```

use serde::Deserialize;
use thiserror::Error;

use crate::simulation::params::{Parameters, DEFAULT_SIGMA};
use crate::simulation::states::NVec3;

/// Errors raised while turning configuration into runtime values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cycle length along axis {axis} must be positive and finite, got {value}")]
    NonPositiveCycle { axis: usize, value: f64 },

    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("cutoff {cutoff} must be below half the shortest box side ({limit})")]
    CutoffTooLarge { cutoff: f64, limit: f64 },

    #[error("{what} must have 3 components, got {len}")]
    NotThreeDimensional { what: String, len: usize },

    #[error("ncrit must be at least 1")]
    ZeroNcrit,

    #[error("scenario defines no bodies")]
    NoBodies,
}

fn default_sigma() -> f64 {
    DEFAULT_SIGMA
}

fn default_ncrit() -> usize {
    16
}

/// Summation parameters
#[derive(Deserialize, Debug, Clone)]
pub struct EwaldConfig {
    pub ksize: u32, // waves with |k| <= ksize in units of the fundamental wave number
    pub alpha: f64, // splitting parameter
    #[serde(default = "default_sigma")]
    pub sigma: f64, // reciprocal normalization
    pub cutoff: f64, // real-space truncation radius
    pub cycle: Vec<f64>, // periodic box lengths
}

impl EwaldConfig {
    /// Validate and freeze into runtime [`Parameters`]
    pub fn to_parameters(&self) -> Result<Parameters, ConfigError> {
        let cycle = to_nvec3("cycle", &self.cycle)?;
        Parameters::new(self.ksize, self.alpha, self.sigma, self.cutoff, cycle)
    }
}

/// Octree settings for the real-space traversal
#[derive(Deserialize, Debug, Clone)]
pub struct TreeConfig {
    #[serde(default = "default_ncrit")]
    pub ncrit: usize, // max bodies per leaf cell
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { ncrit: default_ncrit() }
    }
}

/// Configuration for a single body
#[derive(Deserialize, Debug, Clone)]
pub struct BodyConfig {
    pub x: Vec<f64>, // position in simulation units
    pub q: f64, // charge
}

/// Generated body sets
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind")]
pub enum GeneratorConfig {
    #[serde(rename = "rock_salt")] // NaCl lattice, `cells` conventional cells per axis filling the box
    RockSalt { cells: usize },

    #[serde(rename = "cube")] // `n` alternating unit charges scattered uniformly over the box
    Cube { n: usize, seed: u64 },
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug)]
pub struct ScenarioConfig {
    pub ewald: EwaldConfig, // summation parameters
    #[serde(default)]
    pub tree: TreeConfig, // octree leaf capacity
    #[serde(default)]
    pub bodies: Vec<BodyConfig>, // explicit bodies, take precedence over `generator`
    #[serde(default)]
    pub generator: Option<GeneratorConfig>, // generated bodies
}

pub(crate) fn to_nvec3(what: &str, v: &[f64]) -> Result<NVec3, ConfigError> {
    match v {
        [x, y, z] => Ok(NVec3::new(*x, *y, *z)),
        _ => Err(ConfigError::NotThreeDimensional { what: what.to_owned(), len: v.len() }),
    }
}
