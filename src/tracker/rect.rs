//! Pixel-space geometry: the regions handed to tracking capabilities and the
//! points recorded on a target's path.
//!
//! Regions use the TLWH layout (top-left x, top-left y, width, height), which is
//! also the layout of a session creation request.

use std::fmt;
use std::str::FromStr;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other` in pixels.
    #[inline]
    pub fn distance_to(&self, other: &Point) -> f64 {
        nalgebra::distance(&self.as_point2(), &other.as_point2())
    }

    #[inline]
    fn as_point2(&self) -> Point2<f64> {
        Point2::new(self.x as f64, self.y as f64)
    }
}

/// Axis-aligned bounding box in integer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Region {
    /// Top-left x coordinate
    pub x: i32,
    /// Top-left y coordinate
    pub y: i32,
    /// Width of the box
    pub width: i32,
    /// Height of the box
    pub height: i32,
}

impl Region {
    /// Create a Region from top-left coordinates and dimensions (TLWH format).
    #[inline]
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Edges `[x1, y1, x2, y2]` of the box. Computed in `i64` so no region
    /// value can overflow.
    #[inline]
    pub fn to_tlbr(&self) -> [i64; 4] {
        let (x, y) = (self.x as i64, self.y as i64);
        [x, y, x + self.width as i64, y + self.height as i64]
    }

    /// Center of the box, truncated toward zero.
    #[inline]
    pub fn center(&self) -> Point {
        let cx = self.x as f64 + self.width as f64 / 2.0;
        let cy = self.y as f64 + self.height as f64 / 2.0;
        Point::new(cx as i32, cy as i32)
    }

    /// A box with no interior cannot seed a tracker.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Whether the whole box lies inside a `width` x `height` image.
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        let [x1, y1, x2, y2] = self.to_tlbr();
        x1 >= 0 && y1 >= 0 && x2 <= width as i64 && y2 <= height as i64
    }

    /// The same box shifted by `(dx, dy)`, or `None` if a corner would leave
    /// the `i32` range.
    #[inline]
    pub fn translate(&self, dx: i32, dy: i32) -> Option<Self> {
        let [_, _, x2, y2] = self.to_tlbr();
        if x2 + dx as i64 > i32::MAX as i64 || y2 + dy as i64 > i32::MAX as i64 {
            return None;
        }
        Some(Self {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
            ..*self
        })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Parses the `x,y,width,height` form used on the command line.
impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid region `{s}`: {e}"))?;

        match parts.as_slice() {
            [x, y, w, h] => Ok(Region::new(*x, *y, *w, *h)),
            _ => Err(format!(
                "invalid region `{s}`: expected x,y,width,height"
            )),
        }
    }
}
