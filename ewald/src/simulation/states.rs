//! Core state types for the Ewald summation.
//!
//! Defines the particle and tree types shared by every pass:
//! - `Body` position, charge and a 4-slot target accumulator
//! - `Cell` one node of a flat spatial tree, read-only to the summation
//!
//! `trg[0]` holds the potential and `trg[1..4]` its gradient.

use std::ops::Range;

use nalgebra::{Vector3, Vector4};
pub type NVec3 = Vector3<f64>;
pub type NVec4 = Vector4<f64>;

#[derive(Debug, Clone)]
pub struct Body {
    pub x: NVec3, // position
    pub q: f64, // charge (source strength)
    pub trg: NVec4, // potential + gradient accumulator
    pub ibody: usize, // original index, stable across tree reordering
    pub icell: Option<usize>, // owning leaf, None until a tree is built
    pub weight: f64, // load-balancing weight
}

impl Body {
    /// New body with a cleared accumulator and no owning cell
    pub fn new(x: NVec3, q: f64) -> Self {
        Self {
            x,
            q,
            trg: NVec4::zeros(),
            ibody: 0,
            icell: None,
            weight: 1.0,
        }
    }

    pub fn potential(&self) -> f64 {
        self.trg[0]
    }

    pub fn gradient(&self) -> NVec3 {
        NVec3::new(self.trg[1], self.trg[2], self.trg[3])
    }

    /// Source vector `(x, y, z, q)` as consumed by the wave transforms
    pub fn source(&self) -> NVec4 {
        NVec4::new(self.x.x, self.x.y, self.x.z, self.q)
    }
}

/// A node of a flat spatial tree
///
/// Children of a cell are stored contiguously at `ichild..ichild + nchild`
/// in the same cell slice; bodies at `ibody..ibody + nbody` in the body
/// slice the tree was built over. Every body of the subtree lies within
/// `r` of `x`.
#[derive(Debug, Clone)]
pub struct Cell {
    pub x: NVec3, // center
    pub r: f64, // bounding radius
    pub ichild: usize, // index of first child
    pub nchild: usize, // number of children, 0 for leaves
    pub ibody: usize, // index of first body
    pub nbody: usize, // number of bodies
}

impl Cell {
    pub fn is_leaf(&self) -> bool {
        self.nchild == 0
    }

    pub fn children(&self) -> Range<usize> {
        self.ichild..self.ichild + self.nchild
    }

    pub fn bodies(&self) -> Range<usize> {
        self.ibody..self.ibody + self.nbody
    }
}
