//! Planar geometry helpers used by the swather.
//!
//! Everything here is a pure function over point and triangle values.

use serde::{Deserialize, Serialize};

/// Tolerance for point-in-triangle tests and degenerate triangle detection
pub const GEOMETRY_EPSILON: f64 = 1e-9;

/// A grid-coordinate point. `z` is elevation for height triangles and time for time triangles.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Xyz {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Same plan position with a different `z`
    pub const fn with_z(self, z: f64) -> Self {
        Self {
            x: self.x,
            y: self.y,
            z,
        }
    }

    pub fn distance_xy(&self, other: &Xyz) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &Xyz) -> Xyz {
        Xyz::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0, (self.z + other.z) / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Xyz,
    pub b: Xyz,
    pub c: Xyz,
}

impl Triangle {
    pub const fn new(a: Xyz, b: Xyz, c: Xyz) -> Self {
        Self { a, b, c }
    }

    /// Twice the signed plan area (positive when a, b, c run anticlockwise)
    fn signed_double_area(&self) -> f64 {
        (self.b.x - self.a.x) * (self.c.y - self.a.y)
            - (self.c.x - self.a.x) * (self.b.y - self.a.y)
    }

    pub fn area_xy(&self) -> f64 {
        self.signed_double_area().abs() / 2.0
    }

    pub fn is_degenerate(&self) -> bool {
        self.area_xy() <= GEOMETRY_EPSILON
    }

    /// Barycentric weights of (x, y) relative to a, b, c. `None` for a degenerate triangle.
    pub fn barycentric(&self, x: f64, y: f64) -> Option<(f64, f64, f64)> {
        let det = self.signed_double_area();
        if det.abs() <= GEOMETRY_EPSILON {
            return None;
        }
        let wa = ((self.b.x - x) * (self.c.y - y) - (self.c.x - x) * (self.b.y - y)) / det;
        let wb = ((self.c.x - x) * (self.a.y - y) - (self.a.x - x) * (self.c.y - y)) / det;
        Some((wa, wb, 1.0 - wa - wb))
    }

    /// Inclusive point-in-triangle test in plan
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        match self.barycentric(x, y) {
            Some((wa, wb, wc)) => {
                wa >= -GEOMETRY_EPSILON && wb >= -GEOMETRY_EPSILON && wc >= -GEOMETRY_EPSILON
            }
            None => false,
        }
    }

    /// Interpolate `z` at (x, y) on the plane through the three vertices
    pub fn interpolate_z(&self, x: f64, y: f64) -> Option<f64> {
        self.barycentric(x, y).map(|(wa, wb, wc)| wa * self.a.z + wb * self.b.z + wc * self.c.z)
    }
}

/// Axis-aligned plan extent with an elevation range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingWorldExtent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl Default for BoundingWorldExtent {
    fn default() -> Self {
        Self::inverted()
    }
}

impl BoundingWorldExtent {
    /// An empty extent that any included point will replace
    pub const fn inverted() -> Self {
        Self {
            min_x: f64::MAX,
            min_y: f64::MAX,
            max_x: f64::MIN,
            max_y: f64::MIN,
            min_z: f64::MAX,
            max_z: f64::MIN,
        }
    }

    pub fn from_points(points: &[Xyz]) -> Self {
        let mut extent = Self::inverted();
        for point in points {
            extent.include(point);
        }
        extent
    }

    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    pub fn include(&mut self, point: &Xyz) {
        self.min_x = self.min_x.min(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_x = self.max_x.max(point.x);
        self.max_y = self.max_y.max(point.y);
        self.min_z = self.min_z.min(point.z);
        self.max_z = self.max_z.max(point.z);
    }

    pub fn include_extent(&mut self, other: &BoundingWorldExtent) {
        if !other.is_valid() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
        self.min_z = self.min_z.min(other.min_z);
        self.max_z = self.max_z.max(other.max_z);
    }

    pub fn size_x(&self) -> f64 {
        if self.is_valid() {
            self.max_x - self.min_x
        } else {
            0.0
        }
    }

    pub fn size_y(&self) -> f64 {
        if self.is_valid() {
            self.max_y - self.min_y
        } else {
            0.0
        }
    }

    /// Longest plan side
    pub fn largest_plan_dimension(&self) -> f64 {
        self.size_x().max(self.size_y())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> Triangle {
        Triangle::new(Xyz::new(0.0, 0.0, 10.0), Xyz::new(1.0, 0.0, 20.0), Xyz::new(0.0, 1.0, 30.0))
    }

    #[test]
    fn test_contains_is_inclusive_of_edges() {
        let tri = unit_triangle();
        assert!(tri.contains_xy(0.25, 0.25));
        assert!(tri.contains_xy(0.5, 0.5));
        assert!(tri.contains_xy(0.0, 0.0));
        assert!(!tri.contains_xy(0.6, 0.6));
        assert!(!tri.contains_xy(-0.1, 0.2));
    }

    #[test]
    fn test_interpolate_matches_vertices_and_plane() {
        let tri = unit_triangle();
        assert!((tri.interpolate_z(0.0, 0.0).unwrap() - 10.0).abs() < 1e-9);
        assert!((tri.interpolate_z(1.0, 0.0).unwrap() - 20.0).abs() < 1e-9);
        assert!((tri.interpolate_z(0.0, 1.0).unwrap() - 30.0).abs() < 1e-9);
        // z = 10 + 10x + 20y
        assert!((tri.interpolate_z(0.25, 0.5).unwrap() - 22.5).abs() < 1e-9);
    }

    #[test]
    fn test_winding_does_not_matter() {
        let tri = unit_triangle();
        let reversed = Triangle::new(tri.c, tri.b, tri.a);
        assert!(reversed.contains_xy(0.2, 0.2));
        assert!((reversed.interpolate_z(0.25, 0.5).unwrap() - 22.5).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_triangle() {
        let tri = Triangle::new(
            Xyz::new(0.0, 0.0, 0.0),
            Xyz::new(1.0, 1.0, 0.0),
            Xyz::new(2.0, 2.0, 0.0),
        );
        assert!(tri.is_degenerate());
        assert!(!tri.contains_xy(1.0, 1.0));
        assert_eq!(tri.interpolate_z(1.0, 1.0), None);
    }

    #[test]
    fn test_extent() {
        let mut extent = BoundingWorldExtent::inverted();
        assert!(!extent.is_valid());
        assert_eq!(extent.size_x(), 0.0);
        extent.include(&Xyz::new(1.0, 2.0, 3.0));
        extent.include(&Xyz::new(4.0, -2.0, 1.0));
        assert!(extent.is_valid());
        assert_eq!(extent.size_x(), 3.0);
        assert_eq!(extent.size_y(), 4.0);
        assert_eq!(extent.largest_plan_dimension(), 4.0);
    }
}
