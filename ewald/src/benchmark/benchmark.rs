use std::time::Instant;

use crate::simulation::ewald::Ewald;
use crate::simulation::params::{Parameters, DEFAULT_SIGMA};
use crate::simulation::scenario::random_cube;
use crate::simulation::states::NVec3;
use crate::simulation::tree::Octree;

/// Time tree build, real part and wave part for growing body counts
pub fn bench_ewald() {
    // Different system sizes to test
    let ns = [256, 512, 1024, 2048, 4096]; //, 8192, 16384];
    let cycle = NVec3::new(1.0, 1.0, 1.0);

    // alpha * cutoff = 2.8 and ksize 16 keep both truncations below 1e-4
    let params = match Parameters::new(16, 14.0, DEFAULT_SIGMA, 0.2, cycle) {
        Ok(p) => p,
        Err(e) => {
            log::error!("benchmark parameters rejected: {e}");
            return;
        }
    };
    let ewald = Ewald::new(params);

    for n in ns {
        let mut bodies = random_cube(n, 42, &cycle);
        ewald.init_target(&mut bodies);

        // Time tree
        let t0 = Instant::now();
        let tree = Octree::build_bounded(&mut bodies, 4, ewald.params().max_leaf_radius());
        let dt_tree = t0.elapsed().as_secs_f64();

        // Time real part
        let sources = bodies.clone();
        let t1 = Instant::now();
        ewald.real_part(&mut bodies, &tree.cells, &sources, &tree.cells);
        let dt_real = t1.elapsed().as_secs_f64();

        // Time wave part
        let t2 = Instant::now();
        ewald.wave_part_bodies(&mut bodies);
        let dt_wave = t2.elapsed().as_secs_f64();

        println!("N = {n:5}, tree = {dt_tree:8.6} s, real = {dt_real:8.6} s, wave = {dt_wave:8.6} s");
    }
}
