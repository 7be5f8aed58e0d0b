//! Ground footprint of a raster's swath
//!
//! The footprint is the convex hull of the port/starboard ground projections of
//! the first and last scanline. It is only used for cheap outlines and culling,
//! so the along-track shape in between is not traced.

use std::cmp::Ordering;

use nalgebra::Vector2;

use crate::algorithms::geodesy::local_offset;
use crate::algorithms::projection::project_slant;
use crate::core::{GeoBounds, Location, Sample, SensorInfo};
use crate::validation::{SonarError, SonarResult};

/// Points closer than this are merged before the hull sweep (meters)
const DUPLICATE_TOLERANCE_M: f64 = 1e-6;

/// Convex ground polygon, counter-clockwise, at least three vertices
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    hull: Vec<Location>,
    bounds: GeoBounds,
}

impl Footprint {
    pub fn hull(&self) -> &[Location] {
        &self.hull
    }

    pub fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    /// Enclosed area in square meters (shoelace over local offsets)
    pub fn area_m2(&self) -> f64 {
        let origin = self.hull[0];
        let local: Vec<Vector2<f64>> = self.hull.iter().map(|p| local_offset(&origin, p)).collect();
        let mut twice_area = 0.0;
        for i in 0..local.len() {
            let a = local[i];
            let b = local[(i + 1) % local.len()];
            twice_area += a.x * b.y - b.x * a.y;
        }
        twice_area.abs() / 2.0
    }
}

/// Footprint of a scanline sequence (uncorrected slant ranges)
pub fn compute_footprint(samples: &[Sample], sensor: &SensorInfo) -> SonarResult<Footprint> {
    let (first, last) = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(SonarError::DegenerateGeometry { distinct_points: 0 }),
    };

    let corners = [
        project_slant(first, sensor.min_range, false),
        project_slant(first, sensor.max_range, false),
        project_slant(last, sensor.min_range, false),
        project_slant(last, sensor.max_range, false),
    ];

    let hull = convex_hull(&corners)?;
    let bounds = GeoBounds::from_points(&hull).ok_or(SonarError::DegenerateGeometry { distinct_points: 0 })?;
    Ok(Footprint { hull, bounds })
}

fn cross(o: &Vector2<f64>, a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull by angle-sorted sweep around the southernmost point.
///
/// Fails with `DegenerateGeometry` when fewer than three non-collinear points
/// remain.
pub fn convex_hull(points: &[Location]) -> SonarResult<Vec<Location>> {
    let pivot_index = points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.latitude
                .partial_cmp(&b.latitude)
                .unwrap_or(Ordering::Equal)
                .then(a.longitude.partial_cmp(&b.longitude).unwrap_or(Ordering::Equal))
        })
        .map(|(i, _)| i)
        .ok_or(SonarError::DegenerateGeometry { distinct_points: 0 })?;
    let pivot = points[pivot_index];

    let mut others: Vec<(Location, Vector2<f64>)> = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        if i == pivot_index {
            continue;
        }
        let local = local_offset(&pivot, p);
        let duplicate = local.norm() < DUPLICATE_TOLERANCE_M
            || others.iter().any(|(_, q)| (q - local).norm() < DUPLICATE_TOLERANCE_M);
        if !duplicate {
            others.push((*p, local));
        }
    }

    others.sort_by(|(_, a), (_, b)| {
        a.y.atan2(a.x)
            .partial_cmp(&b.y.atan2(b.x))
            .unwrap_or(Ordering::Equal)
            .then(a.norm().partial_cmp(&b.norm()).unwrap_or(Ordering::Equal))
    });

    let mut stack: Vec<(Location, Vector2<f64>)> = vec![(pivot, Vector2::zeros())];
    for (p, local) in others {
        while stack.len() >= 2 && cross(&stack[stack.len() - 2].1, &stack[stack.len() - 1].1, &local) <= 0.0 {
            stack.pop();
        }
        stack.push((p, local));
    }

    if stack.len() < 3 {
        return Err(SonarError::DegenerateGeometry { distinct_points: stack.len() });
    }
    Ok(stack.into_iter().map(|(p, _)| p).collect())
}
