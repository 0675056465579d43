//! Real-space part of the Ewald sum
//!
//! For every target leaf the source tree is walked from its root. At each
//! source cell the separation between the two cell centers is reduced to
//! its minimum image, which fixes the periodic offset applied to every body
//! pair underneath. Cells whose bounding spheres stay `√3 · cutoff` apart
//! are pruned; surviving leaves get the exact erfc-screened kernel.
//!
//! The offset is fixed per leaf pair. It matches every body pair's own
//! minimum image as long as `cutoff + r_i + r_j` stays below half the box,
//! so dense boxes need small leaves.
//!
//! The kernel only writes to the target side of a pair. Each ordered pair
//! within range is found by the traversal of the target's own leaf.

use std::f64::consts::FRAC_2_SQRT_PI;

use statrs::function::erf::erfc;

use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, Cell, NVec3, NVec4};

/// Reduce `dx` to its minimum image, each axis into `[-cycle/2, cycle/2]`.
pub fn wrap(dx: &mut NVec3, cycle: &NVec3) {
    for d in 0..3 {
        dx[d] -= cycle[d] * (dx[d] / cycle[d]).round();
    }
}

/// Screened pair interaction for separation `dx = x_i - x_j - x_periodic`.
///
/// Returns `(φ, ∇φ)` at body `i` due to charge `qj`, or `None` for a
/// coincident pair or one at or beyond the cutoff.
pub fn ewald_real_kernel(dx: &NVec3, qj: f64, alpha: f64, cutoff2: f64) -> Option<NVec4> {
    let r2 = dx.norm_squared();
    if r2 == 0.0 || r2 >= cutoff2 {
        return None;
    }

    let r2s = r2 * alpha * alpha; // (R alpha)^2
    let rs = r2s.sqrt();
    let inv_rs = rs.recip();
    let inv_r2s = inv_rs * inv_rs;
    let inv_r3s = inv_r2s * inv_rs;
    let erfc_rs = erfc(rs);

    let dtmp = qj * (FRAC_2_SQRT_PI * (-r2s).exp() * inv_r2s + erfc_rs * inv_r3s) * alpha * alpha * alpha;

    Some(NVec4::new(
        qj * erfc_rs * inv_rs * alpha,
        -dx.x * dtmp,
        -dx.y * dtmp,
        -dx.z * dtmp,
    ))
}

/// All pairs between a target leaf's bodies and a source leaf's bodies
pub fn p2p(targets: &mut [Body], sources: &[Body], xperiodic: &NVec3, params: &Parameters) {
    let alpha = params.alpha();
    let cutoff2 = params.cutoff() * params.cutoff();

    for bi in targets.iter_mut() {
        for bj in sources {
            let dx = bi.x - bj.x - xperiodic;
            if let Some(trg) = ewald_real_kernel(&dx, bj.q, alpha, cutoff2) {
                bi.trg += trg;
            }
        }
    }
}

/// Recursive neighbour search from target leaf `ci` into source cell `j`.
///
/// `targets` are the bodies of `ci`; `sources` is the body slice `jcells`
/// was built over. Non-leaf cells that survive the distance test always
/// recurse into their children.
pub fn neighbor(ci: &Cell, targets: &mut [Body], j: usize, jcells: &[Cell], sources: &[Body], params: &Parameters) {
    let cj = &jcells[j];

    let mut dx = ci.x - cj.x;
    wrap(&mut dx, params.cycle());
    let xperiodic = ci.x - cj.x - dx; // offset of the image of cj next to ci
    let r = dx.norm();

    if r - ci.r - cj.r < 3.0_f64.sqrt() * params.cutoff() {
        if cj.is_leaf() {
            p2p(targets, &sources[cj.bodies()], &xperiodic, params);
        }
        for child in cj.children() {
            neighbor(ci, targets, child, jcells, sources, params);
        }
    }
}

/// Pair every leaf of `cells` with its own disjoint run of `bodies`.
///
/// Leaves of a valid tree partition the body slice, so the returned
/// sub-slices can be mutated in parallel. Overlapping leaf ranges are a
/// caller bug and are `debug_assert!`ed.
pub fn split_leaves<'a>(cells: &'a [Cell], bodies: &'a mut [Body]) -> Vec<(&'a Cell, &'a mut [Body])> {
    let mut leaves: Vec<&Cell> = cells.iter().filter(|c| c.is_leaf()).collect();
    leaves.sort_by_key(|c| c.ibody);

    let mut out = Vec::with_capacity(leaves.len());
    let mut rest = bodies;
    let mut offset = 0;

    for cell in leaves {
        debug_assert!(cell.ibody >= offset, "leaf at body {} overlaps a previous leaf", cell.ibody);
        let skip = cell.ibody.saturating_sub(offset);
        let tail = std::mem::take(&mut rest);
        let (_, tail) = tail.split_at_mut(skip);
        let (mine, tail) = tail.split_at_mut(cell.nbody);
        out.push((cell, mine));
        rest = tail;
        offset = cell.ibody + cell.nbody;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_picks_nearest_image() {
        let cycle = NVec3::new(1.0, 2.0, 1.0);
        let mut dx = NVec3::new(0.9, -1.5, 0.2);
        wrap(&mut dx, &cycle);
        assert!((dx.x + 0.1).abs() < 1e-15);
        assert!((dx.y - 0.5).abs() < 1e-15);
        assert!((dx.z - 0.2).abs() < 1e-15);
    }

    #[test]
    fn kernel_skips_self_and_far_pairs() {
        assert!(ewald_real_kernel(&NVec3::zeros(), 1.0, 3.0, 0.25).is_none());
        assert!(ewald_real_kernel(&NVec3::new(0.5, 0.0, 0.0), 1.0, 3.0, 0.25).is_none());
        assert!(ewald_real_kernel(&NVec3::new(0.49, 0.0, 0.0), 1.0, 3.0, 0.25).is_some());
    }

    #[test]
    fn kernel_gradient_matches_finite_difference() {
        let (alpha, q, h) = (2.5, -0.7, 1e-6);
        let dx = NVec3::new(0.21, -0.13, 0.08);
        let trg = ewald_real_kernel(&dx, q, alpha, 1.0).unwrap();
        for d in 0..3 {
            let mut plus = dx;
            let mut minus = dx;
            plus[d] += h;
            minus[d] -= h;
            let fd = (ewald_real_kernel(&plus, q, alpha, 1.0).unwrap()[0]
                - ewald_real_kernel(&minus, q, alpha, 1.0).unwrap()[0])
                / (2.0 * h);
            assert!((trg[d + 1] - fd).abs() < 1e-6, "axis {d}: {} vs {fd}", trg[d + 1]);
        }
    }

    #[test]
    fn split_leaves_hands_out_disjoint_ranges() {
        let leaf = |ibody, nbody| Cell { x: NVec3::zeros(), r: 0.0, ichild: 0, nchild: 0, ibody, nbody };
        let root = Cell { x: NVec3::zeros(), r: 1.0, ichild: 1, nchild: 2, ibody: 0, nbody: 5 };
        let cells = vec![root, leaf(3, 2), leaf(0, 3)];
        let mut bodies: Vec<Body> = (0..5).map(|i| Body::new(NVec3::new(i as f64, 0.0, 0.0), 1.0)).collect();

        let pairs = split_leaves(&cells, &mut bodies);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1.len(), 3);
        assert_eq!(pairs[1].1.len(), 2);
        assert_eq!(pairs[1].1[0].x.x, 3.0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "overlaps a previous leaf")]
    fn split_leaves_rejects_overlapping_ranges() {
        let leaf = |ibody, nbody| Cell { x: NVec3::zeros(), r: 0.0, ichild: 0, nchild: 0, ibody, nbody };
        let cells = vec![leaf(0, 3), leaf(2, 2)];
        let mut bodies: Vec<Body> = (0..5).map(|i| Body::new(NVec3::new(i as f64, 0.0, 0.0), 1.0)).collect();

        split_leaves(&cells, &mut bodies);
    }
}
