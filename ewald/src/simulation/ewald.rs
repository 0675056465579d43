//! Ewald summation over a periodic box
//!
//! [`Ewald`] owns the frozen [`Parameters`] and exposes the passes a driver
//! sequences over a body container:
//!
//! - [`Ewald::init_target`]       clear accumulators and bookkeeping
//! - [`Ewald::real_part`]         erfc-screened near field via tree traversal
//! - [`Ewald::self_term`]         remove the screened self-interaction
//! - [`Ewald::wave_part`]         reciprocal sum via explicit transforms
//! - [`Ewald::get_dipole`] and [`Ewald::dipole_correction`] tin-foil correction
//!
//! All passes add into `Body::trg`. Each one returns only after its parallel
//! loop has joined, so calling them in sequence never lets two passes write
//! the same accumulator concurrently. [`Ewald::evaluate`] runs the whole
//! sequence.

use std::f64::consts::{FRAC_2_SQRT_PI, PI};

use rayon::prelude::*;

use crate::simulation::params::Parameters;
use crate::simulation::real_space::{neighbor, split_leaves};
use crate::simulation::states::{Body, Cell, NVec3, NVec4};
use crate::simulation::timer::{LogTimer, Timer};
use crate::simulation::tree::Octree;
use crate::simulation::waves::{dft, idft, init_waves, scale_waves};

pub struct Ewald {
    params: Parameters,
    timer: Box<dyn Timer + Send + Sync>,
}

impl Ewald {
    /// Summation with the logging timer
    pub fn new(params: Parameters) -> Self {
        Self {
            params,
            timer: Box::new(LogTimer::default()),
        }
    }

    /// Replace the instrumentation hook
    pub fn with_timer(mut self, timer: impl Timer + Send + Sync + 'static) -> Self {
        self.timer = Box::new(timer);
        self
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Real-space sum for every leaf of `cells` against the tree `jcells`.
    ///
    /// `bodies` is the slice `cells` was built over and receives the
    /// contributions; `sources` is the slice behind `jcells` (a snapshot of
    /// `bodies` when both trees are the same). Target leaves are independent
    /// and run in parallel.
    pub fn real_part(&self, bodies: &mut [Body], cells: &[Cell], sources: &[Body], jcells: &[Cell]) {
        self.timer.start("Ewald real part");
        if !jcells.is_empty() {
            let params = &self.params;
            split_leaves(cells, bodies)
                .into_par_iter()
                .for_each(|(ci, targets)| neighbor(ci, targets, 0, jcells, sources, params));
        }
        self.timer.stop("Ewald real part");
    }

    /// Subtract `2/√π · q · α` from every potential
    pub fn self_term(&self, bodies: &mut [Body]) {
        let alpha = self.params.alpha();
        bodies.par_iter_mut().for_each(|b| {
            b.trg[0] -= FRAC_2_SQRT_PI * b.q * alpha;
        });
    }

    /// Reciprocal sum: add the wave-space potential and gradient at each
    /// `sources[b] = (x, y, z, q)` into `targets[b]`.
    ///
    /// The wave set is built, transformed, scaled and dropped inside this
    /// call.
    pub fn wave_part(&self, targets: &mut [NVec4], sources: &[NVec4]) {
        self.timer.start("Ewald wave part");
        let scale = self.params.scale();
        let mut waves = init_waves(self.params.ksize());
        dft(&mut waves, sources, &scale);
        scale_waves(&mut waves, &self.params);
        idft(&waves, targets, sources, &scale);
        log::trace!("wave part: {} waves x {} bodies", waves.len(), sources.len());
        self.timer.stop("Ewald wave part");
    }

    /// [`Ewald::wave_part`] with the bodies as both sources and targets
    pub fn wave_part_bodies(&self, bodies: &mut [Body]) {
        let sources: Vec<NVec4> = bodies.iter().map(Body::source).collect();
        let mut targets = vec![NVec4::zeros(); bodies.len()];
        self.wave_part(&mut targets, &sources);
        for (b, trg) in bodies.iter_mut().zip(&targets) {
            b.trg += trg;
        }
    }

    /// Dipole moment of the bodies about `x0`
    pub fn get_dipole(&self, bodies: &[Body], x0: &NVec3) -> NVec3 {
        bodies.iter().fold(NVec3::zeros(), |dipole, b| dipole + (b.x - x0) * b.q)
    }

    /// Tin-foil boundary correction for a system with net `dipole`.
    ///
    /// `num_bodies` is the global body count, which differs from
    /// `bodies.len()` when the container is one partition of a larger system.
    /// Uncharged bodies only receive the gradient term.
    pub fn dipole_correction(&self, bodies: &mut [Body], dipole: &NVec3, num_bodies: usize, cycle: &NVec3) {
        let coef = 4.0 * PI / (3.0 * cycle.x * cycle.y * cycle.z);
        let potential = coef * dipole.norm_squared() / num_bodies as f64;
        let gradient = dipole * coef;

        bodies.par_iter_mut().for_each(|b| {
            if b.q != 0.0 {
                b.trg[0] -= potential / b.q;
            }
            for d in 0..3 {
                b.trg[d + 1] -= gradient[d];
            }
        });
    }

    /// Clear accumulators and reset bookkeeping before a new pass
    pub fn init_target(&self, bodies: &mut [Body]) {
        for (i, b) in bodies.iter_mut().enumerate() {
            b.trg = NVec4::zeros();
            b.ibody = i;
            b.icell = None;
            b.weight = 1.0;
        }
    }

    /// Full evaluation over a single body container.
    ///
    /// Clears the targets, builds an octree with at most `ncrit` bodies per
    /// leaf and leaf radii below [`Parameters::max_leaf_radius`] (reordering
    /// `bodies`; `ibody` keeps the incoming order), then runs
    /// real part, self term, wave part and the dipole correction about the
    /// origin. Returns the tree used for the real part.
    pub fn evaluate(&self, bodies: &mut [Body], ncrit: usize) -> Octree {
        self.init_target(bodies);
        let tree = Octree::build_bounded(bodies, ncrit, self.params.max_leaf_radius());

        let sources = bodies.to_vec();
        self.real_part(bodies, &tree.cells, &sources, &tree.cells);
        self.self_term(bodies);
        self.wave_part_bodies(bodies);

        let dipole = self.get_dipole(bodies, &NVec3::zeros());
        self.dipole_correction(bodies, &dipole, bodies.len(), self.params.cycle());

        log::info!(
            "ewald: {} bodies, dipole {:.3e}, energy {:.12e}",
            bodies.len(),
            dipole.norm(),
            potential_energy(bodies)
        );
        tree
    }
}

/// Total electrostatic energy `Σ q φ / 2`
pub fn potential_energy(bodies: &[Body]) -> f64 {
    0.5 * bodies.iter().map(|b| b.q * b.trg[0]).sum::<f64>()
}
