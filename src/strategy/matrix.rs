//! Fixed-size 2-vector and 2x2 matrix
//!
//! Everything the hedge-ratio filter needs, on the stack. No general
//! linear-algebra dependency.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2(pub [f64; 2]);

impl Vec2 {
    pub const fn new(a: f64, b: f64) -> Self {
        Self([a, b])
    }

    pub fn dot(&self, other: &Vec2) -> f64 {
        self.0[0] * other.0[0] + self.0[1] * other.0[1]
    }

    pub fn scale(&self, k: f64) -> Vec2 {
        Vec2([self.0[0] * k, self.0[1] * k])
    }

    /// Outer product `self · otherᵀ`.
    pub fn outer(&self, other: &Vec2) -> Mat2 {
        Mat2([
            [self.0[0] * other.0[0], self.0[0] * other.0[1]],
            [self.0[1] * other.0[0], self.0[1] * other.0[1]],
        ])
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2([self.0[0] + rhs.0[0], self.0[1] + rhs.0[1]])
    }
}

/// Row-major 2x2 matrix.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Mat2(pub [[f64; 2]; 2]);

impl Mat2 {
    pub const IDENTITY: Mat2 = Mat2([[1.0, 0.0], [0.0, 1.0]]);

    pub const fn diagonal(a: f64, b: f64) -> Self {
        Self([[a, 0.0], [0.0, b]])
    }

    /// Symmetric matrix from its three free entries.
    pub const fn symmetric(a: f64, off: f64, b: f64) -> Self {
        Self([[a, off], [off, b]])
    }

    pub fn transpose(&self) -> Mat2 {
        let m = &self.0;
        Mat2([[m[0][0], m[1][0]], [m[0][1], m[1][1]]])
    }

    pub fn mul_vec(&self, v: &Vec2) -> Vec2 {
        let m = &self.0;
        Vec2([
            m[0][0] * v.0[0] + m[0][1] * v.0[1],
            m[1][0] * v.0[0] + m[1][1] * v.0[1],
        ])
    }

    pub fn scale(&self, k: f64) -> Mat2 {
        let m = &self.0;
        Mat2([[m[0][0] * k, m[0][1] * k], [m[1][0] * k, m[1][1] * k]])
    }

    /// `A · self · Aᵀ`, returned exactly symmetric.
    ///
    /// Only the upper triangle is computed; the lower is mirrored from it.
    pub fn congruence(&self, a: &Mat2) -> Mat2 {
        let ap = *a * *self;
        let at = a.transpose();
        let p00 = ap.0[0][0] * at.0[0][0] + ap.0[0][1] * at.0[1][0];
        let p01 = ap.0[0][0] * at.0[0][1] + ap.0[0][1] * at.0[1][1];
        let p11 = ap.0[1][0] * at.0[0][1] + ap.0[1][1] * at.0[1][1];
        Mat2::symmetric(p00, p01, p11)
    }

    pub fn trace(&self) -> f64 {
        self.0[0][0] + self.0[1][1]
    }

    pub fn determinant(&self) -> f64 {
        self.0[0][0] * self.0[1][1] - self.0[0][1] * self.0[1][0]
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().flatten().all(|v| v.is_finite())
    }

    pub fn is_symmetric(&self, rel_tol: f64) -> bool {
        let scale = self.0[0][0].abs().max(self.0[1][1].abs()).max(f64::MIN_POSITIVE);
        (self.0[0][1] - self.0[1][0]).abs() <= rel_tol * scale
    }

    /// Symmetric positive semi-definite test with a tolerance relative to the
    /// matrix's own scale.
    ///
    /// For a symmetric 2x2 matrix PSD ⇔ both diagonal entries ≥ 0 and det ≥ 0.
    pub fn is_positive_semi_definite(&self, rel_tol: f64) -> bool {
        if !self.is_finite() || !self.is_symmetric(rel_tol) {
            return false;
        }
        let a = self.0[0][0];
        let b = self.0[1][1];
        let scale = a.abs().max(b.abs()).max(f64::MIN_POSITIVE);
        a >= -rel_tol * scale
            && b >= -rel_tol * scale
            && self.determinant() >= -rel_tol * scale * scale
    }
}

impl Add for Mat2 {
    type Output = Mat2;

    fn add(self, rhs: Mat2) -> Mat2 {
        let (a, b) = (&self.0, &rhs.0);
        Mat2([
            [a[0][0] + b[0][0], a[0][1] + b[0][1]],
            [a[1][0] + b[1][0], a[1][1] + b[1][1]],
        ])
    }
}

impl Sub for Mat2 {
    type Output = Mat2;

    fn sub(self, rhs: Mat2) -> Mat2 {
        let (a, b) = (&self.0, &rhs.0);
        Mat2([
            [a[0][0] - b[0][0], a[0][1] - b[0][1]],
            [a[1][0] - b[1][0], a[1][1] - b[1][1]],
        ])
    }
}

impl Mul for Mat2 {
    type Output = Mat2;

    fn mul(self, rhs: Mat2) -> Mat2 {
        let (a, b) = (&self.0, &rhs.0);
        Mat2([
            [
                a[0][0] * b[0][0] + a[0][1] * b[1][0],
                a[0][0] * b[0][1] + a[0][1] * b[1][1],
            ],
            [
                a[1][0] * b[0][0] + a[1][1] * b[1][0],
                a[1][0] * b[0][1] + a[1][1] * b[1][1],
            ],
        ])
    }
}
