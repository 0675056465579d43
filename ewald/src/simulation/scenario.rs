//! Build runnable Ewald scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a runtime bundle
//! containing:
//! - the summation object (`Ewald`) with validated parameters
//! - the body container (explicit or generated)
//! - the octree leaf capacity used by the real part

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::configuration::config::{to_nvec3, ConfigError, GeneratorConfig, ScenarioConfig};
use crate::simulation::ewald::Ewald;
use crate::simulation::states::{Body, NVec3};

pub struct Scenario {
    pub ewald: Ewald,
    pub bodies: Vec<Body>,
    pub ncrit: usize,
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> Result<Self, ConfigError> {
        let params = cfg.ewald.to_parameters()?;

        if cfg.tree.ncrit == 0 {
            return Err(ConfigError::ZeroNcrit);
        }

        // Bodies: explicit list wins over a generator
        let bodies: Vec<Body> = if !cfg.bodies.is_empty() {
            cfg.bodies
                .iter()
                .enumerate()
                .map(|(i, bc)| -> Result<Body, ConfigError> {
                    Ok(Body::new(to_nvec3(&format!("bodies[{i}].x"), &bc.x)?, bc.q))
                })
                .collect::<Result<_, _>>()?
        } else {
            match cfg.generator {
                Some(GeneratorConfig::RockSalt { cells }) => rock_salt(cells, params.cycle()),
                Some(GeneratorConfig::Cube { n, seed }) => random_cube(n, seed, params.cycle()),
                None => Vec::new(),
            }
        };

        if bodies.is_empty() {
            return Err(ConfigError::NoBodies);
        }

        Ok(Self {
            ewald: Ewald::new(params),
            bodies,
            ncrit: cfg.tree.ncrit,
        })
    }
}

/// Rock-salt lattice with `cells` conventional cells per axis filling `cycle`.
///
/// Sites sit on a `2·cells` grid per axis starting at the origin, with charge
/// `(-1)^(i+j+k)`. The set is neutral and has no dipole about the origin.
pub fn rock_salt(cells: usize, cycle: &NVec3) -> Vec<Body> {
    let n = 2 * cells;
    let h = cycle / n as f64;
    let mut bodies = Vec::with_capacity(n * n * n);

    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                let x = NVec3::new(i as f64 * h.x, j as f64 * h.y, k as f64 * h.z);
                let q = if (i + j + k) % 2 == 0 { 1.0 } else { -1.0 };
                bodies.push(Body::new(x, q));
            }
        }
    }

    bodies
}

/// `n` bodies uniformly scattered over the box with alternating unit charges.
///
/// Deterministic for a given `seed`; neutral when `n` is even.
pub fn random_cube(n: usize, seed: u64, cycle: &NVec3) -> Vec<Body> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let x = NVec3::new(
                rng.gen::<f64>() * cycle.x,
                rng.gen::<f64>() * cycle.y,
                rng.gen::<f64>() * cycle.z,
            );
            let q = if i % 2 == 0 { 1.0 } else { -1.0 };
            Body::new(x, q)
        })
        .collect()
}
