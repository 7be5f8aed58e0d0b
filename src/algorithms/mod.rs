//! Geometry and search algorithms

pub mod correlation;
pub mod footprint;
pub mod geodesy;
pub mod projection;

pub use correlation::{find_closest_sample, find_min_column, find_reacquisitions, find_reacquisitions_excluding};
pub use footprint::{compute_footprint, convex_hull, Footprint};
pub use projection::{ground_range, project, project_slant, slant_range};
