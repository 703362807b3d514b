//! Domain geometry and the distance metric.
//!
//! Domains are hyperrectangles of one, two or three dimensions. Every
//! component sees a uniform three-coordinate point API; coordinates along
//! inactive axes are zero.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of active spatial dimensions of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimensionality {
    One,
    Two,
    Three,
}

impl Dimensionality {
    /// Number of active axes.
    pub fn rank(&self) -> usize {
        match self {
            Dimensionality::One => 1,
            Dimensionality::Two => 2,
            Dimensionality::Three => 3,
        }
    }
}

/// A location in the simulation domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    /// The domain origin.
    pub const ORIGIN: Point = Point {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A rectangular simulation domain with a potential-grid resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Extent along x. Always positive.
    pub xdim: f64,
    /// Extent along y. Zero for 1D domains.
    pub ydim: f64,
    /// Extent along z. Zero for 1D and 2D domains.
    pub zdim: f64,
    /// Grid spacing of the discretized potential.
    pub res: f64,
}

impl Domain {
    /// Create a domain, inferring dimensionality from which extents are
    /// positive. The grid resolution defaults to 1/100 of the smallest
    /// active extent.
    pub fn new(xdim: f64, ydim: f64, zdim: f64) -> Result<Self> {
        if xdim <= 0.0 || ydim < 0.0 || zdim < 0.0 || (ydim == 0.0 && zdim > 0.0) {
            return Err(Error::InvalidExtents {
                x: xdim,
                y: ydim,
                z: zdim,
            });
        }
        let smallest = [xdim, ydim, zdim]
            .into_iter()
            .filter(|&d| d > 0.0)
            .fold(f64::INFINITY, f64::min);
        Ok(Self {
            xdim,
            ydim,
            zdim,
            res: smallest / 100.0,
        })
    }

    /// Override the potential-grid resolution.
    pub fn with_res(mut self, res: f64) -> Result<Self> {
        if res <= 0.0 || !res.is_finite() {
            return Err(Error::InvalidResolution(res));
        }
        self.res = res;
        Ok(self)
    }

    pub fn dimensionality(&self) -> Dimensionality {
        if self.ydim == 0.0 && self.zdim == 0.0 {
            Dimensionality::One
        } else if self.zdim == 0.0 {
            Dimensionality::Two
        } else {
            Dimensionality::Three
        }
    }

    /// Whether a point lies inside the domain (inclusive boundaries).
    pub fn contains(&self, p: &Point) -> bool {
        p.x >= 0.0
            && p.x <= self.xdim
            && p.y >= 0.0
            && p.y <= self.ydim
            && p.z >= 0.0
            && p.z <= self.zdim
    }

    /// Shape of the potential grid: `extent/res + 2` cells per active axis
    /// (one padding cell on each side), a single cell on inactive axes.
    pub fn grid_shape(&self) -> (usize, usize, usize) {
        let cells = |extent: f64| {
            if extent > 0.0 {
                (extent / self.res) as usize + 2
            } else {
                1
            }
        };
        (cells(self.xdim), cells(self.ydim), cells(self.zdim))
    }
}

/// Grid index of a coordinate on the full axis of `n` cells, used for
/// electrode (boundary) quantization.
pub fn boundary_index(coord: f64, extent: f64, n: usize) -> usize {
    (coord / extent * (n - 1) as f64).round() as usize
}

/// Grid index of a coordinate mapped onto the interior of an axis of `n`
/// cells, skipping the one-cell padding on each side.
pub fn interior_index(coord: f64, extent: f64, n: usize) -> usize {
    (coord / extent * (n - 3) as f64).round() as usize + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_3d() {
        let a = Point::new(1.0, 2.0, 2.0);
        let b = Point::ORIGIN;
        assert!((a.distance(&b) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_ignores_inactive_axes() {
        // 1D points carry zero y and z, so the metric is plain |dx|
        let a = Point::new(0.25, 0.0, 0.0);
        let b = Point::new(0.75, 0.0, 0.0);
        assert!((a.distance(&b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_dimensionality_inference() {
        assert_eq!(
            Domain::new(1.0, 0.0, 0.0).unwrap().dimensionality(),
            Dimensionality::One
        );
        assert_eq!(
            Domain::new(1.0, 2.0, 0.0).unwrap().dimensionality(),
            Dimensionality::Two
        );
        assert_eq!(
            Domain::new(1.0, 2.0, 3.0).unwrap().dimensionality(),
            Dimensionality::Three
        );
    }

    #[test]
    fn test_invalid_extents() {
        assert!(matches!(
            Domain::new(0.0, 1.0, 0.0),
            Err(Error::InvalidExtents { .. })
        ));
        // z without y is inconsistent
        assert!(matches!(
            Domain::new(1.0, 0.0, 1.0),
            Err(Error::InvalidExtents { .. })
        ));
    }

    #[test]
    fn test_default_resolution() {
        let d = Domain::new(1.0, 4.0, 0.0).unwrap();
        assert!((d.res - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_grid_shape_padding() {
        let d = Domain::new(1.0, 1.0, 0.0).unwrap().with_res(0.1).unwrap();
        assert_eq!(d.grid_shape(), (12, 12, 1));
    }

    #[test]
    fn test_boundary_index_endpoints() {
        // 12-cell axis: coordinate 0 maps to cell 0, the far edge to n-1
        assert_eq!(boundary_index(0.0, 1.0, 12), 0);
        assert_eq!(boundary_index(1.0, 1.0, 12), 11);
        assert_eq!(boundary_index(0.5, 1.0, 12), 6);
    }

    #[test]
    fn test_interior_index_skips_padding() {
        assert_eq!(interior_index(0.0, 1.0, 12), 1);
        assert_eq!(interior_index(1.0, 1.0, 12), 10);
    }
}
