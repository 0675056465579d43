use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

use approx::{assert_abs_diff_eq, assert_relative_eq};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::function::erf::erfc;

use ewald::{init_waves, potential_energy, random_cube, rock_salt};
use ewald::{Body, Ewald, NVec3, NVec4, Octree, Parameters, Timer, DEFAULT_SIGMA};

/// Madelung constant of rock salt referred to the nearest-neighbour distance
const MADELUNG_NACL: f64 = 1.747_564_594_633;

pub fn unit_box() -> NVec3 {
    NVec3::new(1.0, 1.0, 1.0)
}

/// Summation in a unit box with unit Coulomb coupling
pub fn unit_box_ewald(ksize: u32, alpha: f64, cutoff: f64) -> Ewald {
    Ewald::new(Parameters::new(ksize, alpha, DEFAULT_SIGMA, cutoff, unit_box()).unwrap())
}

/// Neutral set of `n` alternating unit charges inside [0.3, 0.7]^3
///
/// Every center-to-center separation stays below half the box, so every
/// tree shape sees the same body pairs.
pub fn central_cluster(n: usize, seed: u64) -> Vec<Body> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let x = NVec3::new(
                0.3 + 0.4 * rng.gen::<f64>(),
                0.3 + 0.4 * rng.gen::<f64>(),
                0.3 + 0.4 * rng.gen::<f64>(),
            );
            Body::new(x, if i % 2 == 0 { 1.0 } else { -1.0 })
        })
        .collect()
}

/// Full evaluation on a copy, returned in input order
pub fn evaluate_sorted(ewald: &Ewald, bodies: &[Body], ncrit: usize) -> Vec<Body> {
    let mut bodies = bodies.to_vec();
    ewald.evaluate(&mut bodies, ncrit);
    bodies.sort_by_key(|b| b.ibody);
    bodies
}

/// Real part only, returned in input order
pub fn real_part_sorted(ewald: &Ewald, bodies: &[Body], ncrit: usize) -> Vec<Body> {
    let mut bodies = bodies.to_vec();
    ewald.init_target(&mut bodies);
    let tree = Octree::build_bounded(&mut bodies, ncrit, ewald.params().max_leaf_radius());
    let sources = bodies.clone();
    ewald.real_part(&mut bodies, &tree.cells, &sources, &tree.cells);
    bodies.sort_by_key(|b| b.ibody);
    bodies
}

// ==================================================================================
// Real-space tests
// ==================================================================================

#[test]
fn real_part_pair_matches_erfc_closed_form() {
    let ewald = unit_box_ewald(1, 5.0, 0.3);
    let bodies = vec![
        Body::new(NVec3::new(0.40, 0.50, 0.50), 1.0),
        Body::new(NVec3::new(0.55, 0.52, 0.47), -2.0),
    ];
    let r = (bodies[0].x - bodies[1].x).norm();

    let out = real_part_sorted(&ewald, &bodies, 1);

    assert_relative_eq!(out[0].potential(), -2.0 * erfc(5.0 * r) / r, max_relative = 1e-12);
    assert_relative_eq!(out[1].potential(), erfc(5.0 * r) / r, max_relative = 1e-12);

    // gradient at body 0 lies along the separation
    let dx = bodies[0].x - bodies[1].x;
    let g = out[0].gradient();
    assert_relative_eq!(g.cross(&dx).norm(), 0.0, epsilon = 1e-9);
}

#[test]
fn real_part_uses_minimum_image_across_the_boundary() {
    let ewald = unit_box_ewald(1, 5.0, 0.3);
    let bodies = vec![
        Body::new(NVec3::new(0.05, 0.5, 0.5), 1.0),
        Body::new(NVec3::new(0.95, 0.5, 0.5), -1.0),
    ];

    let out = real_part_sorted(&ewald, &bodies, 1);

    let expected = erfc(5.0 * 0.1) / 0.1;
    assert_relative_eq!(out[0].potential(), -expected, max_relative = 1e-10);
    assert_relative_eq!(out[1].potential(), expected, max_relative = 1e-10);

    // image of body 1 sits at x = -0.05, attraction pulls body 0 towards -x
    assert!(out[0].gradient().x > 0.0);
    assert_abs_diff_eq!(out[0].gradient().y, 0.0, epsilon = 1e-12);
}

#[test]
fn real_part_ignores_pairs_beyond_cutoff() {
    let ewald = unit_box_ewald(1, 5.0, 0.3);
    let bodies = vec![
        Body::new(NVec3::new(0.30, 0.5, 0.5), 1.0),
        Body::new(NVec3::new(0.65, 0.5, 0.5), 1.0),
    ];

    let out = real_part_sorted(&ewald, &bodies, 1);

    for b in &out {
        assert_eq!(b.trg, NVec4::zeros());
    }
}

// ==================================================================================
// Wave-space tests
// ==================================================================================

#[test]
fn wave_set_is_half_of_the_k_sphere() {
    for ksize in 1..=4i64 {
        let waves = init_waves(ksize as u32);

        let mut full = 0;
        for l in -ksize..=ksize {
            for m in -ksize..=ksize {
                for n in -ksize..=ksize {
                    let k2 = l * l + m * m + n * n;
                    if k2 > 0 && k2 <= ksize * ksize {
                        full += 1;
                    }
                }
            }
        }
        assert_eq!(waves.len() * 2, full, "ksize {ksize}");
        assert!(waves.iter().all(|w| w.k.norm_squared() > 0.0));
    }
    assert_eq!(init_waves(1).len(), 3);
}

#[test]
fn wave_part_adds_on_top_of_existing_targets() {
    let ewald = unit_box_ewald(4, 5.0, 0.3);
    let sources = vec![
        NVec4::new(0.2, 0.3, 0.4, 1.0),
        NVec4::new(0.7, 0.6, 0.5, -1.0),
    ];

    let mut fresh = vec![NVec4::zeros(); 2];
    ewald.wave_part(&mut fresh, &sources);

    let mut seeded = vec![NVec4::new(1.0, 2.0, 3.0, 4.0); 2];
    ewald.wave_part(&mut seeded, &sources);

    for (f, s) in fresh.iter().zip(&seeded) {
        assert_relative_eq!(*s, f + NVec4::new(1.0, 2.0, 3.0, 4.0), epsilon = 1e-12);
    }
    // opposite charges attract: potential at the positive charge is lowered
    assert!(fresh[0][0] < 0.0);
}

// ==================================================================================
// Self-term and dipole tests
// ==================================================================================

#[test]
fn self_term_is_linear_in_charge_and_ignores_position() {
    let alpha = 5.0;
    let ewald = unit_box_ewald(1, alpha, 0.3);
    let mut bodies = vec![
        Body::new(NVec3::new(0.1, 0.2, 0.3), 1.0),
        Body::new(NVec3::new(0.9, 0.8, 0.7), 1.0),
        Body::new(NVec3::new(0.5, 0.5, 0.5), -3.0),
    ];

    ewald.self_term(&mut bodies);

    let unit = 2.0 / PI.sqrt() * alpha;
    assert_relative_eq!(bodies[0].potential(), -unit, max_relative = 1e-15);
    assert_eq!(bodies[0].potential(), bodies[1].potential());
    assert_relative_eq!(bodies[2].potential(), 3.0 * unit, max_relative = 1e-15);
    assert_eq!(bodies[2].gradient(), NVec3::zeros());
}

#[test]
fn dipole_of_symmetric_pair() {
    let ewald = unit_box_ewald(1, 5.0, 0.3);
    let center = NVec3::new(0.5, 0.5, 0.5);
    let d = NVec3::new(0.1, -0.05, 0.02);
    let bodies = vec![Body::new(center + d, 1.0), Body::new(center - d, -1.0)];

    let dipole = ewald.get_dipole(&bodies, &center);

    assert_relative_eq!(dipole, d * 2.0, epsilon = 1e-15);
    // neutral: the reference point does not matter
    assert_relative_eq!(ewald.get_dipole(&bodies, &NVec3::zeros()), d * 2.0, epsilon = 1e-14);
}

#[test]
fn dipole_correction_leaves_no_net_force_on_neutral_pair() {
    let ewald = unit_box_ewald(1, 5.0, 0.3);
    let center = NVec3::new(0.5, 0.5, 0.5);
    let d = NVec3::new(0.1, 0.0, 0.0);
    let mut bodies = vec![Body::new(center + d, 1.0), Body::new(center - d, -1.0)];
    ewald.init_target(&mut bodies);

    let dipole = ewald.get_dipole(&bodies, &center);
    let n = bodies.len();
    ewald.dipole_correction(&mut bodies, &dipole, n, &unit_box());

    let net: NVec3 = bodies.iter().map(|b| b.gradient() * b.q).sum();
    assert_abs_diff_eq!(net.norm(), 0.0, epsilon = 1e-15);

    let coef = 4.0 * PI / 3.0;
    assert_relative_eq!(bodies[0].gradient(), -dipole * coef, epsilon = 1e-15);
    assert_relative_eq!(bodies[0].potential(), -coef * 0.04 / 2.0, max_relative = 1e-12);
    assert_relative_eq!(bodies[1].potential(), coef * 0.04 / 2.0, max_relative = 1e-12);
}

#[test]
fn init_target_resets_accumulators_and_bookkeeping() {
    let ewald = unit_box_ewald(1, 5.0, 0.3);
    let mut bodies = central_cluster(6, 3);
    for b in &mut bodies {
        b.trg = NVec4::new(1.0, 1.0, 1.0, 1.0);
        b.icell = Some(7);
        b.weight = 9.0;
        b.ibody = 42;
    }

    ewald.init_target(&mut bodies);

    for (i, b) in bodies.iter().enumerate() {
        assert_eq!(b.trg, NVec4::zeros());
        assert_eq!(b.ibody, i);
        assert_eq!(b.icell, None);
        assert_eq!(b.weight, 1.0);
    }
}

// ==================================================================================
// Whole-sum tests
// ==================================================================================

#[test]
fn rock_salt_reproduces_madelung_constant() {
    let cycle = NVec3::new(2.0, 2.0, 2.0);
    let ewald = Ewald::new(Parameters::new(10, 4.0, DEFAULT_SIGMA, 0.9, cycle).unwrap());
    let bodies = rock_salt(2, &cycle);

    let out = evaluate_sorted(&ewald, &bodies, 1);

    let r0 = 0.5;
    for b in &out {
        assert_abs_diff_eq!(b.q * b.potential(), -MADELUNG_NACL / r0, epsilon = 1e-4);
        assert_abs_diff_eq!(b.gradient().norm(), 0.0, epsilon = 1e-8);
    }
    assert_relative_eq!(
        potential_energy(&out),
        -0.5 * out.len() as f64 * MADELUNG_NACL / r0,
        max_relative = 1e-4
    );
}

#[test]
fn tree_shape_does_not_change_the_result() {
    let ewald = unit_box_ewald(6, 12.0, 0.25);
    let bodies = central_cluster(80, 11);

    let fine = evaluate_sorted(&ewald, &bodies, 1);
    let coarse = evaluate_sorted(&ewald, &bodies, 8);
    let single = evaluate_sorted(&ewald, &bodies, 80);

    for ((f, c), s) in fine.iter().zip(&coarse).zip(&single) {
        assert_relative_eq!(f.trg, c.trg, epsilon = 1e-9, max_relative = 1e-10);
        assert_relative_eq!(f.trg, s.trg, epsilon = 1e-9, max_relative = 1e-10);
    }
}

#[test]
fn leaf_capacity_does_not_change_the_result_in_a_filled_box() {
    // bodies reach every face, so large leaves straddle the periodic boundary
    let n = 600;
    let ewald = unit_box_ewald(16, 14.0, 0.2);
    let bodies = random_cube(n, 42, &unit_box());

    let fine = real_part_sorted(&ewald, &bodies, 1);
    for ncrit in [16, n] {
        let coarse = real_part_sorted(&ewald, &bodies, ncrit);
        for (f, c) in fine.iter().zip(&coarse) {
            assert_relative_eq!(f.trg, c.trg, epsilon = 1e-9, max_relative = 1e-10);
        }
    }

    let fine = evaluate_sorted(&ewald, &bodies, 1);
    let single = evaluate_sorted(&ewald, &bodies, n);
    for (f, s) in fine.iter().zip(&single) {
        assert_relative_eq!(f.trg, s.trg, epsilon = 1e-9, max_relative = 1e-10);
    }
}

#[test]
fn energy_is_invariant_under_rigid_translation() {
    let ewald = unit_box_ewald(6, 12.0, 0.25);
    let bodies = random_cube(200, 5, &unit_box());
    // pushes most bodies through a face; they are left unwrapped so the
    // neutral set keeps its dipole about the origin
    let shift = NVec3::new(0.37, -0.61, 0.83);
    let moved: Vec<Body> = bodies.iter().map(|b| Body::new(b.x + shift, b.q)).collect();
    assert!(moved.iter().any(|b| (0..3).any(|d| b.x[d] < 0.0 || b.x[d] >= 1.0)));

    let e0 = potential_energy(&evaluate_sorted(&ewald, &bodies, 4));
    let e1 = potential_energy(&evaluate_sorted(&ewald, &moved, 4));

    assert_relative_eq!(e0, e1, max_relative = 1e-9);
}

#[test]
fn gradient_is_the_derivative_of_the_energy() {
    // alpha * cutoff = 5 so the truncated real part is smooth at the cutoff
    let ewald = unit_box_ewald(6, 20.0, 0.25);
    let bodies = central_cluster(40, 9);
    let h = 1e-5;

    let out = evaluate_sorted(&ewald, &bodies, 1);
    let target = 3;
    let analytic = out[target].gradient() * out[target].q;

    for d in 0..3 {
        let mut plus = bodies.clone();
        let mut minus = bodies.clone();
        plus[target].x[d] += h;
        minus[target].x[d] -= h;
        let e_plus = potential_energy(&evaluate_sorted(&ewald, &plus, 1));
        let e_minus = potential_energy(&evaluate_sorted(&ewald, &minus, 1));
        let fd = (e_plus - e_minus) / (2.0 * h);

        assert_relative_eq!(analytic[d], fd, epsilon = 1e-4, max_relative = 1e-5);
    }
}

// ==================================================================================
// Instrumentation
// ==================================================================================

#[derive(Clone, Default)]
struct RecordingTimer {
    events: Arc<Mutex<Vec<String>>>,
}

impl Timer for RecordingTimer {
    fn start(&self, label: &str) {
        self.events.lock().unwrap().push(format!("start {label}"));
    }

    fn stop(&self, label: &str) {
        self.events.lock().unwrap().push(format!("stop {label}"));
    }
}

#[test]
fn timer_hook_brackets_real_and_wave_parts() {
    let timer = RecordingTimer::default();
    let ewald = unit_box_ewald(2, 5.0, 0.3).with_timer(timer.clone());
    let mut bodies = central_cluster(10, 1);

    ewald.evaluate(&mut bodies, 2);

    let events = timer.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start Ewald real part",
            "stop Ewald real part",
            "start Ewald wave part",
            "stop Ewald wave part",
        ]
    );
}
