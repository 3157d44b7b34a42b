//! World-grid geometry: snapping, distances, and map bounds
//!
//! The movement resolver snaps arbitrary cartesian coordinates to the
//! center of the nearest grid cell. Square grids round each axis
//! independently; hexagonal grids go through axial/cube coordinates with
//! the standard cube-rounding repair so the `x + y + z = 0` invariant
//! survives component-wise rounding.
//!
//! Everything here is pure and safe for unlimited concurrent use.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A point on the world map, in map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates are real numbers (not NaN or infinite).
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The cell shape of the world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GridKind {
    #[default]
    Square,
    Hex,
}

impl fmt::Display for GridKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Square => write!(f, "square"),
            Self::Hex => write!(f, "hex"),
        }
    }
}

impl FromStr for GridKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "square" => Ok(Self::Square),
            "hex" | "hexagonal" => Ok(Self::Hex),
            other => Err(DomainError::parse(format!("Unknown grid kind: '{}'", other))),
        }
    }
}

/// Process-wide grid configuration, loaded once and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridConfig {
    pub kind: GridKind,
    /// Cell size in map units. For hex grids this is the hex circumradius.
    pub size: f64,
    pub origin: Point,
}

impl GridConfig {
    pub fn new(kind: GridKind, size: f64, origin: Point) -> Result<Self, DomainError> {
        if !(size.is_finite() && size > 0.0) {
            return Err(DomainError::validation(format!(
                "Grid size must be positive, got {}",
                size
            )));
        }
        Ok(Self { kind, size, origin })
    }

    /// Snap a point to the nearest cell center.
    pub fn snap(&self, point: Point) -> Point {
        match self.kind {
            GridKind::Square => self.snap_square(point),
            GridKind::Hex => self.snap_hex(point),
        }
    }

    fn snap_square(&self, point: Point) -> Point {
        let x = ((point.x - self.origin.x) / self.size).round() * self.size + self.origin.x;
        let y = ((point.y - self.origin.y) / self.size).round() * self.size + self.origin.y;
        Point::new(x, y)
    }

    /// Pointy-top hex snap: cartesian -> fractional axial -> rounded cube
    /// -> axial -> cartesian.
    fn snap_hex(&self, point: Point) -> Point {
        let sqrt3 = 3.0_f64.sqrt();
        let px = point.x - self.origin.x;
        let py = point.y - self.origin.y;

        let q = (sqrt3 / 3.0 * px - py / 3.0) / self.size;
        let r = (2.0 / 3.0 * py) / self.size;

        let (q, r) = round_axial(q, r);

        let x = self.size * (sqrt3 * q + sqrt3 / 2.0 * r) + self.origin.x;
        let y = self.size * (3.0 / 2.0 * r) + self.origin.y;
        Point::new(x, y)
    }

    /// Euclidean distance between two optional points.
    ///
    /// `None` when either point is absent, which callers use to mark a
    /// first placement (no prior position to measure from).
    pub fn distance(a: Option<Point>, b: Option<Point>) -> Option<f64> {
        let (a, b) = (a?, b?);
        Some(((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt())
    }
}

/// Round fractional axial coordinates via cube coordinates.
///
/// The cube components are rounded independently, then the component with
/// the largest rounding error is recomputed from the other two so the
/// `x + y + z = 0` invariant holds exactly.
fn round_axial(q: f64, r: f64) -> (f64, f64) {
    let (x, z) = (q, r);
    let y = -x - z;

    let mut rx = x.round();
    let mut ry = y.round();
    let mut rz = z.round();

    let dx = (rx - x).abs();
    let dy = (ry - y).abs();
    let dz = (rz - z).abs();

    if dx > dy && dx > dz {
        rx = -ry - rz;
    } else if dy > dz {
        ry = -rx - rz;
    } else {
        rz = -rx - ry;
    }

    (rx, rz)
}

/// The bounding rectangle of a campaign's world map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl MapBounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Whether a point lies inside the rectangle (edges included).
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.west && point.x <= self.east && point.y >= self.south && point.y <= self.north
    }
}
