//! Planar geometry for full-detail links.
//!
//! A full-detail bus models the finite speed of signal propagation: each
//! attached interface sits at a [`Location`] on a plane (meters), and the
//! time a bit takes to travel between two interfaces is their Euclidean
//! distance over the speed of light.

use anyhow::{anyhow, ensure, Context, Result};
use std::{fmt, str::FromStr};

/// Propagation speed of the medium, in meters per second.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// A position on the simulation plane, in meters.
///
/// ```
/// # use ethersim_core::geo::Location;
/// let a = Location::new(0.0, 0.0);
/// let b = Location::new(3.0, 4.0);
/// assert_eq!(a.distance(b), 5.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`, in meters.
    pub fn distance(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Seconds for a signal to travel between the two locations.
pub fn propagation_delay(a: Location, b: Location) -> f64 {
    a.distance(b) / SPEED_OF_LIGHT
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.y)
    }
}

impl FromStr for Location {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        let mut components = s.split(',');
        let x = components
            .next()
            .ok_or_else(|| anyhow!("expected `<x>, <y>'"))?;
        let y = components
            .next()
            .ok_or_else(|| anyhow!("expected `<x>, <y>'"))?;
        ensure!(
            components.next().is_none(),
            "expected a single comma separator"
        );

        let x = x.trim().parse().context("Failed to parse Location x")?;
        let y = y.trim().parse().context("Failed to parse Location y")?;

        Ok(Self { x, y })
    }
}
