//! # Octree (3D)
//!
//! This module builds the flat spatial tree consumed by the real-space
//! traversal. The summation itself only reads the tree; it needs
//!
//! - a cell center and a radius bounding every body below the cell,
//! - a contiguous child range for internal cells,
//! - a contiguous body range for leaves.
//!
//! ## Construction
//!
//! - A global cubic bounding box encloses all bodies.
//! - A cell holding more than `ncrit` bodies is split into its 8 octants;
//!   its bodies are reordered in place so each octant owns a contiguous run.
//!   Empty octants are dropped.
//! - The nodes are laid out breadth-first, so the children of any cell are
//!   adjacent in the final `Vec<Cell>` and the root sits at index 0.
//! - Octants come from the cubic boxes, but a cell's center is the middle of
//!   the box spanned by its own bodies. A leaf with a single body therefore
//!   has radius 0 and its periodic offset is exactly that body's image.
//! - [`Octree::build_bounded`] also splits any cell whose radius reaches
//!   `max_radius`, whatever its body count. The real part passes
//!   [`Parameters::max_leaf_radius`](crate::simulation::params::Parameters::max_leaf_radius)
//!   so that `ncrit` only changes the cost, never the result.

use crate::simulation::states::{Body, Cell, NVec3};

/// Depth at which splitting stops, so coincident bodies end up sharing a leaf
pub const MAX_LEVELS: usize = 21;

/// When a node may stay a leaf
struct Limits {
    ncrit: usize,
    max_radius: f64,
}

/// Intermediate node produced by the recursive partition
struct Node {
    bbox_min: NVec3,
    bbox_max: NVec3,
    ibody: usize,
    nbody: usize,
    children: Vec<usize>, // indices into the node list
}

/// A flat octree built over a body slice.
///
/// The body slice it was built from has been reordered to match the cells'
/// body ranges and each body's `icell` points at its leaf.
pub struct Octree {
    pub cells: Vec<Cell>,
    pub root: usize,
}

impl Octree {
    /// Build an octree over `bodies` with at most `ncrit` bodies per leaf.
    ///
    /// This:
    /// 1. Computes a global cubic bounding box that encloses all bodies.
    /// 2. Recursively partitions the bodies into octants, reordering the
    ///    slice so every cell covers a contiguous range.
    /// 3. Lays the cells out breadth-first with tight centers and radii.
    /// 4. Tags every body with the index of its leaf.
    ///
    /// An empty body slice yields an empty tree. `ncrit == 0` is treated as 1.
    pub fn build(bodies: &mut [Body], ncrit: usize) -> Self {
        Self::build_bounded(bodies, ncrit, f64::INFINITY)
    }

    /// Like [`Octree::build`], but a leaf holding more than one body must
    /// also have a radius below `max_radius`.
    ///
    /// Coincident bodies still share a leaf once [`MAX_LEVELS`] is reached.
    pub fn build_bounded(bodies: &mut [Body], ncrit: usize, max_radius: f64) -> Self {
        if bodies.is_empty() {
            return Self { cells: Vec::new(), root: 0 };
        }

        let limits = Limits { ncrit: ncrit.max(1), max_radius };
        let (bbox_min, bbox_max) = compute_global_bbox(bodies);

        let mut nodes = Vec::new();
        partition(bodies, 0, bodies.len(), bbox_min, bbox_max, 0, &limits, &mut nodes);

        let cells = linearize(&nodes, bodies);
        for (icell, cell) in cells.iter().enumerate().filter(|(_, c)| c.is_leaf()) {
            for b in &mut bodies[cell.bodies()] {
                b.icell = Some(icell);
            }
        }

        log::debug!(
            "octree: {} bodies, {} cells, ncrit {}, max radius {:.3e}",
            bodies.len(),
            cells.len(),
            limits.ncrit,
            limits.max_radius
        );

        Self { cells, root: 0 }
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| c.is_leaf())
    }
}

// helpers ==============================================================================

/// Split `bodies[ibody..ibody + nbody]` below the box `[bbox_min, bbox_max]`.
///
/// Pushes the node for this range, then (unless it fits `limits` or the
/// depth limit is reached) sorts the range by octant and recurses into every
/// non-empty octant. Returns the index of the node just created.
#[allow(clippy::too_many_arguments)]
fn partition(
    bodies: &mut [Body],
    ibody: usize,
    nbody: usize,
    bbox_min: NVec3,
    bbox_max: NVec3,
    level: usize,
    limits: &Limits,
    nodes: &mut Vec<Node>,
) -> usize {
    let node_idx = nodes.len();
    nodes.push(Node {
        bbox_min,
        bbox_max,
        ibody,
        nbody,
        children: Vec::new(),
    });

    if level >= MAX_LEVELS || fits_in_leaf(&bodies[ibody..ibody + nbody], &bbox_min, &bbox_max, limits) {
        return node_idx;
    }

    // stable sort keeps the original order within each octant
    let range = &mut bodies[ibody..ibody + nbody];
    range.sort_by_cached_key(|b| child_index_for_point(&b.x, &bbox_min, &bbox_max));

    let mut counts = [0usize; 8];
    for b in range.iter() {
        counts[child_index_for_point(&b.x, &bbox_min, &bbox_max)] += 1;
    }

    let mut children = Vec::new();
    let mut offset = ibody;
    for (child_idx, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let (cmin, cmax) = child_bbox(&bbox_min, &bbox_max, child_idx);
        children.push(partition(bodies, offset, count, cmin, cmax, level + 1, limits, nodes));
        offset += count;
    }

    nodes[node_idx].children = children;
    node_idx
}

fn fits_in_leaf(members: &[Body], bbox_min: &NVec3, bbox_max: &NVec3, limits: &Limits) -> bool {
    if members.len() > limits.ncrit {
        return false;
    }
    members.len() <= 1 || bounding_sphere(members, bbox_min, bbox_max).1 < limits.max_radius
}

/// Lay the nodes out breadth-first and compute tight centers and radii.
///
/// Processing nodes in queue order and appending each node's children to
/// the queue gives every cell a contiguous child range.
fn linearize(nodes: &[Node], bodies: &[Body]) -> Vec<Cell> {
    let mut order = vec![0usize];
    let mut cells = Vec::with_capacity(nodes.len());

    let mut head = 0;
    while head < order.len() {
        let node = &nodes[order[head]];
        let ichild = order.len();
        order.extend_from_slice(&node.children);

        let members = &bodies[node.ibody..node.ibody + node.nbody];
        let (x, r) = bounding_sphere(members, &node.bbox_min, &node.bbox_max);

        cells.push(Cell {
            x,
            r,
            ichild: if node.children.is_empty() { 0 } else { ichild },
            nchild: node.children.len(),
            ibody: node.ibody,
            nbody: node.nbody,
        });
        head += 1;
    }

    cells
}

/// Center of the box spanned by `members` and the largest distance from it.
///
/// Falls back to the octant box center for an empty member list.
fn bounding_sphere(members: &[Body], bbox_min: &NVec3, bbox_max: &NVec3) -> (NVec3, f64) {
    if members.is_empty() {
        return ((bbox_min + bbox_max) * 0.5, 0.0);
    }

    let mut min = members[0].x;
    let mut max = members[0].x;
    for b in members {
        min = min.inf(&b.x);
        max = max.sup(&b.x);
    }

    let center = (min + max) * 0.5;
    let r = members.iter().map(|b| (b.x - center).norm()).fold(0.0, f64::max);
    (center, r)
}

/// Compute a global cubic bounding box that encloses all bodies.
///
/// Finds the axis-aligned min and max of all positions, then expands the box
/// into a cube around its center using the largest half-extent, so every
/// octant split halves the same length on all axes.
fn compute_global_bbox(bodies: &[Body]) -> (NVec3, NVec3) {
    let mut min = NVec3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
    let mut max = NVec3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);

    for b in bodies {
        min = min.inf(&b.x);
        max = max.sup(&b.x);
    }

    let center = (min + max) * 0.5;
    let max_half = ((max - min) * 0.5).max();
    let half = NVec3::new(max_half, max_half, max_half);

    (center - half, center + half)
}

/// Octant index of a point within a box.
///
/// - Bit 0 (value 1): X axis, set when `p.x >= center.x`
/// - Bit 1 (value 2): Y axis, set when `p.y >= center.y`
/// - Bit 2 (value 4): Z axis, set when `p.z >= center.z`
fn child_index_for_point(p: &NVec3, bbox_min: &NVec3, bbox_max: &NVec3) -> usize {
    let center = (bbox_min + bbox_max) * 0.5;
    let mut idx = 0;

    if p.x >= center.x { idx |= 1; }
    if p.y >= center.y { idx |= 2; }
    if p.z >= center.z { idx |= 4; }

    idx
}

/// Box of octant `child_idx` (same bit layout as [`child_index_for_point`]).
fn child_bbox(parent_min: &NVec3, parent_max: &NVec3, child_idx: usize) -> (NVec3, NVec3) {
    let center = (parent_min + parent_max) * 0.5;

    let mut min = *parent_min;
    let mut max = *parent_max;

    for d in 0..3 {
        if child_idx & (1 << d) == 0 {
            max[d] = center[d];
        } else {
            min[d] = center[d];
        }
    }

    (min, max)
}
