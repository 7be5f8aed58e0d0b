//! Target reacquisition search
//!
//! Scans a raster for scanlines that imaged a known point target. Both the
//! cross-track (pixel column) and along-track (sample index) searches are
//! coarse-to-fine integer pattern searches: the finite difference at the
//! current step picks a direction, a move is kept only if it strictly lowers
//! the squared horizontal distance, otherwise the step is halved. They are
//! heuristics that stop within one step of a local minimum, not exact solvers.
//! Ties between the two candidates never move the search, which keeps the selected
//! column/scanline deterministic.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::algorithms::geodesy::horizontal_distance;
use crate::algorithms::projection::project;
use crate::core::{Location, Observation, Raster, Sample, SensorInfo};
use crate::utils::config::CorrelationConfig;

/// Best column found on one scanline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnMatch {
    pub column: u32,
    pub distance_m: f64,
}

/// Best scanline found around a starting index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleMatch {
    pub index: usize,
    pub distance_m: f64,
}

/// Integer pattern search for the minimum of `cost` over `[0, upper]`
fn pattern_search<F>(start: usize, initial_step: usize, upper: usize, max_iterations: usize, mut cost: F) -> (usize, f64)
where
    F: FnMut(usize) -> f64,
{
    let mut position = start.min(upper);
    let mut best = cost(position);
    let mut step = initial_step;
    let mut iterations = 0;

    while step >= 1 && iterations < max_iterations {
        iterations += 1;
        let ahead = (position + step).min(upper);
        let behind = position.saturating_sub(step);
        let cost_ahead = cost(ahead);
        let cost_behind = cost(behind);

        let (candidate, candidate_cost) = if cost_ahead < cost_behind {
            (ahead, cost_ahead)
        } else if cost_behind < cost_ahead {
            (behind, cost_behind)
        } else {
            step /= 2;
            continue;
        };

        if candidate_cost < best {
            position = candidate;
            best = candidate_cost;
        } else {
            // Worse or equal: revert and damp
            step /= 2;
        }
    }

    (position, best)
}

fn squared_distance(a: &Location, b: &Location) -> f64 {
    let d = horizontal_distance(a, b);
    d * d
}

/// Column bounds `(port_end, starboard_start)` of the nadir shadow.
///
/// Columns below `port_end` image port seabed, columns from `starboard_start`
/// on image starboard seabed. Everything in between projects onto the vehicle.
fn shadow_columns(sensor: &SensorInfo, altitude: f64, columns: u32) -> (u32, u32) {
    let per_meter = columns as f64 / sensor.swath_width();
    if !per_meter.is_finite() || per_meter <= 0.0 {
        return (columns, columns);
    }
    let port_end = ((-altitude - sensor.min_range) * per_meter)
        .ceil()
        .clamp(0.0, columns as f64) as u32;
    let starboard_start = (((altitude - sensor.min_range) * per_meter).floor() + 1.0)
        .clamp(port_end as f64, columns as f64) as u32;
    (port_end, starboard_start)
}

/// Column of `sample`'s scanline whose ground projection is closest to `target`.
///
/// Ground range is monotone on each side of the nadir shadow, so the port and
/// starboard columns are searched separately. The shadow itself contributes a
/// single candidate, the column nearest zero range, which wins ties.
pub fn find_min_column(
    sensor: &SensorInfo,
    sample: &Sample,
    target: &Location,
    columns: u32,
    config: &CorrelationConfig,
) -> ColumnMatch {
    let columns = columns.max(1);
    let altitude = if config.slant_corrected {
        sample.pose.altitude_or_zero()
    } else {
        0.0
    };
    let cost = |column: u32| {
        let ground = project(sensor, sample, column as f64, columns, config.slant_corrected);
        squared_distance(&ground, target)
    };

    let (port_end, starboard_start) = shadow_columns(sensor, altitude, columns);
    let mut candidates = Vec::with_capacity(3);
    if port_end < starboard_start {
        let zero = (-sensor.min_range * columns as f64 / sensor.swath_width()).round();
        let column = (zero.max(port_end as f64) as u32).min(starboard_start - 1);
        candidates.push((column, cost(column)));
    }
    for (lo, hi) in [(0, port_end), (starboard_start, columns)] {
        if lo >= hi {
            continue;
        }
        let span = (hi - lo) as usize;
        let (offset, c) = pattern_search(0, span / 2, span - 1, config.max_search_iterations, |k| {
            cost(lo + k as u32)
        });
        candidates.push((lo + offset as u32, c));
    }

    let (column, best) = candidates
        .into_iter()
        .fold((0, f64::INFINITY), |best, c| if c.1 < best.1 { c } else { best });
    ColumnMatch {
        column,
        distance_m: best.sqrt(),
    }
}

/// Scanline near `start` whose projection of `column` is closest to `target`
pub fn find_closest_sample(
    samples: &[Sample],
    sensor: &SensorInfo,
    target: &Location,
    start: usize,
    column: u32,
    columns: u32,
    config: &CorrelationConfig,
) -> SampleMatch {
    if samples.is_empty() {
        return SampleMatch {
            index: 0,
            distance_m: f64::INFINITY,
        };
    }
    let (index, cost) = pattern_search(
        start,
        config.sample_search_step,
        samples.len() - 1,
        config.max_search_iterations,
        |k| {
            let ground = project(sensor, &samples[k], column as f64, columns, config.slant_corrected);
            squared_distance(&ground, target)
        },
    );
    SampleMatch {
        index,
        distance_m: cost.sqrt(),
    }
}

fn is_excluded(timestamp: DateTime<Utc>, exclusions: &[DateTime<Utc>], window: Duration) -> bool {
    let window_ms = window.num_milliseconds();
    exclusions
        .iter()
        .any(|center| (timestamp - *center).num_milliseconds().abs() <= window_ms)
}

fn observation_at(raster: &Raster, sample: &Sample, location: Location) -> Observation {
    let pose = &sample.pose;
    let depth = match (pose.depth, pose.altitude) {
        (Some(d), Some(a)) => d + a,
        (Some(d), None) => d,
        (None, Some(a)) => a,
        (None, None) => 0.0,
    };
    Observation {
        uuid: Uuid::new_v4(),
        latitude: location.latitude,
        longitude: location.longitude,
        depth,
        timestamp: sample.timestamp,
        raster_filename: raster.filename().to_string(),
        system_name: raster.sensor_info().system_name.clone(),
    }
}

/// Search one raster for re-observations of `target`, ignoring scanlines
/// within `exclude_window` of `exclude_around`.
///
/// Each observation is placed where the best column of the best scanline
/// projects, not at `target`, so it records where the raster saw the object.
/// The two lie within `acceptance_threshold_m` of each other.
pub fn find_reacquisitions(
    raster: &Raster,
    target: &Location,
    exclude_around: DateTime<Utc>,
    exclude_window: Duration,
    config: &CorrelationConfig,
) -> Vec<Observation> {
    find_reacquisitions_excluding(raster, target, &[exclude_around], exclude_window, config)
}

/// Like [`find_reacquisitions`] with any number of exclusion centers
pub fn find_reacquisitions_excluding(
    raster: &Raster,
    target: &Location,
    exclude_around: &[DateTime<Utc>],
    exclude_window: Duration,
    config: &CorrelationConfig,
) -> Vec<Observation> {
    let samples = raster.samples();
    let sensor = raster.sensor_info();
    if samples.is_empty() || !sensor.is_valid() {
        warn!(raster = raster.filename(), "skipping raster without samples or valid sensor info");
        return Vec::new();
    }

    let columns = raster.columns().unwrap_or(config.nominal_columns).max(1);
    let mid_column = columns as f64 / 2.0;
    let reach = sensor.max_abs_range();
    let mut exclusions = exclude_around.to_vec();
    let mut observations = Vec::new();

    let mut i = 0;
    while i < samples.len() {
        let sample = &samples[i];
        if is_excluded(sample.timestamp, &exclusions, exclude_window) {
            i += 1;
            continue;
        }

        let mid = project(sensor, sample, mid_column, columns, config.slant_corrected);
        if horizontal_distance(&mid, target) > reach + config.acceptance_threshold_m {
            i += 1;
            continue;
        }

        let coarse = find_min_column(sensor, sample, target, columns, config);
        if coarse.distance_m >= config.acceptance_threshold_m {
            i += 1;
            continue;
        }

        let along = find_closest_sample(samples, sensor, target, i, coarse.column, columns, config);
        let refined = find_min_column(sensor, &samples[along.index], target, columns, config);
        let (index, best) = if refined.distance_m <= coarse.distance_m {
            (along.index, refined)
        } else {
            (i, coarse)
        };

        // The refinement may have walked back into an excluded pass
        if is_excluded(samples[index].timestamp, &exclusions, exclude_window) {
            debug!(raster = raster.filename(), index, "refined scanline falls in exclusion window");
            i += 1;
            continue;
        }

        let ground = project(sensor, &samples[index], best.column as f64, columns, config.slant_corrected);
        debug!(
            raster = raster.filename(),
            index,
            column = best.column,
            distance_m = best.distance_m,
            "target reacquired"
        );
        observations.push(observation_at(raster, &samples[index], ground));
        exclusions.push(samples[index].timestamp);
        i = index.max(i) + config.post_detection_skip.max(1);
    }

    observations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::geodesy::offset_along_bearing;
    use crate::core::{Pose, RasterType};
    use crate::test_utils::{epoch, straight_track, track_samples, ORIGIN};

    fn config() -> CorrelationConfig {
        CorrelationConfig::default()
    }

    fn two_pass_raster() -> Raster {
        let mut samples = track_samples(ORIGIN, 0, epoch(), 200, 0.5, 0.0, Some(5.0));
        let turn = samples[199].pose.location();
        samples.extend(track_samples(
            turn,
            200,
            epoch() + Duration::seconds(300),
            200,
            0.5,
            180.0,
            Some(5.0),
        ));
        let mut sensor = SensorInfo::new(-50.0, 50.0);
        sensor.system_name = "lauv-test".into();
        Raster::new("two_pass.png", RasterType::Image, samples, sensor)
            .unwrap()
            .with_columns(500)
    }

    #[test]
    fn test_pattern_search_quadratic() {
        let (x, cost) = pattern_search(0, 512, 1023, 100, |x| {
            let d = x as f64 - 731.0;
            d * d
        });
        assert_eq!(x, 731);
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn test_pattern_search_zero_step() {
        let (x, _) = pattern_search(3, 0, 10, 100, |x| x as f64);
        assert_eq!(x, 3);
    }

    #[test]
    fn test_min_column_converges_to_nadir() {
        let samples = vec![
            Sample::new(0, epoch(), Pose::new(41.0, -8.0).with_heading(30.0)),
            Sample::new(1, epoch() + Duration::seconds(1), Pose::new(41.00001, -8.0).with_heading(30.0)),
        ];
        let sensor = SensorInfo::new(-50.0, 50.0);
        let target = samples[1].pose.location();
        let result = find_min_column(&sensor, &samples[1], &target, 1000, &config());
        assert_eq!(result.column, 500);
        assert!(result.distance_m < 1e-6);
    }

    #[test]
    fn test_min_column_finds_starboard_target() {
        let raster = straight_track(200, 0.5, 0.0, -50.0, 50.0, Some(5.0));
        let sensor = raster.sensor_info();
        let target = project(sensor, &raster.samples()[100], 400.0, 500, true);
        let result = find_min_column(sensor, &raster.samples()[97], &target, 500, &config());
        assert_eq!(result.column, 400);
        assert!((result.distance_m - 1.5).abs() < 0.05);
    }

    #[test]
    fn test_min_column_just_outside_nadir_shadow() {
        // 8 m altitude: columns 204..=208 lie 2 to 4 m from the vehicle
        for heading in [0.0, 73.0, 180.0, 251.0] {
            let raster = straight_track(300, 0.5, heading, -50.0, 50.0, Some(8.0));
            let sensor = raster.sensor_info();
            let sample = &raster.samples()[150];
            for column in [204, 206, 208, 292, 296] {
                let target = project(sensor, sample, column as f64, 500, true);
                let result = find_min_column(sensor, sample, &target, 500, &config());
                assert_eq!(result.column, column, "heading {} column {}", heading, column);
                assert!(result.distance_m < 1e-6);
            }
        }
    }

    #[test]
    fn test_shadow_columns_bracket_nadir() {
        let sensor = SensorInfo::new(-50.0, 50.0);
        assert_eq!(shadow_columns(&sensor, 0.0, 1000), (500, 501));
        assert_eq!(shadow_columns(&sensor, 8.0, 500), (210, 291));

        // Starboard-only sensor: the shadow starts at column 0
        let starboard = SensorInfo::new(0.0, 50.0);
        assert_eq!(shadow_columns(&starboard, 5.0, 500).0, 0);
    }

    #[test]
    fn test_closest_sample_walks_along_track() {
        let raster = straight_track(200, 0.5, 0.0, -50.0, 50.0, Some(5.0));
        let sensor = raster.sensor_info();
        let target = project(sensor, &raster.samples()[100], 400.0, 500, true);
        let result = find_closest_sample(raster.samples(), sensor, &target, 97, 400, 500, &config());
        assert_eq!(result.index, 100);
        assert!(result.distance_m < 1e-3);
    }

    #[test]
    fn test_injected_target_is_found() {
        let raster = straight_track(200, 0.5, 0.0, -50.0, 50.0, Some(5.0)).with_columns(500);
        let target = project(raster.sensor_info(), &raster.samples()[100], 400.0, 500, true);
        let far_away = epoch() - Duration::hours(1);

        let found = find_reacquisitions(&raster, &target, far_away, Duration::seconds(5), &config());
        assert_eq!(found.len(), 1);
        let obs = &found[0];
        assert!(horizontal_distance(&obs.location(), &target) < 2.0);
        assert_eq!(obs.timestamp, raster.samples()[100].timestamp);
        assert_eq!(obs.raster_filename, "track.png");
        assert_eq!(obs.system_name, "lauv-test");
        assert!((obs.depth - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_observation_placed_at_imaged_ground_point() {
        let raster = straight_track(200, 0.5, 0.0, -50.0, 50.0, Some(5.0)).with_columns(500);
        let sensor = raster.sensor_info();
        // Halfway between the ground points of samples 100 and 101
        let imaged = project(sensor, &raster.samples()[100], 400.0, 500, true);
        let target = offset_along_bearing(&imaged, 0.0, 0.25);

        let found = find_reacquisitions(
            &raster,
            &target,
            epoch() - Duration::hours(1),
            Duration::seconds(5),
            &config(),
        );
        assert_eq!(found.len(), 1);
        let index = raster
            .samples()
            .iter()
            .position(|s| s.timestamp == found[0].timestamp)
            .unwrap();
        let ground = project(sensor, &raster.samples()[index], 400.0, 500, true);
        assert!(horizontal_distance(&found[0].location(), &ground) < 1e-6);
        assert!((horizontal_distance(&found[0].location(), &target) - 0.25).abs() < 0.01);
    }

    #[test]
    fn test_target_next_to_nadir_is_found() {
        let raster = straight_track(300, 0.5, 0.0, -50.0, 50.0, Some(8.0)).with_columns(500);
        let target = project(raster.sensor_info(), &raster.samples()[150], 208.0, 500, true);

        let found = find_reacquisitions(
            &raster,
            &target,
            epoch() - Duration::hours(1),
            Duration::seconds(5),
            &config(),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].timestamp, raster.samples()[150].timestamp);
        assert!(horizontal_distance(&found[0].location(), &target) < 1e-3);
    }

    #[test]
    fn test_target_at_swath_edge_is_found() {
        let raster = straight_track(200, 0.5, 0.0, -50.0, 50.0, None).with_columns(500);
        let sensor = raster.sensor_info();
        for (index, column) in [(100, 0.0), (120, 0.0), (80, 499.0)] {
            let target = project(sensor, &raster.samples()[index], column, 500, true);
            let found = find_reacquisitions(
                &raster,
                &target,
                epoch() - Duration::hours(1),
                Duration::seconds(5),
                &config(),
            );
            assert_eq!(found.len(), 1, "sample {} column {}", index, column);
            assert_eq!(found[0].timestamp, raster.samples()[index].timestamp);
        }
    }

    #[test]
    fn test_seed_pass_is_excluded() {
        let raster = straight_track(200, 0.5, 0.0, -50.0, 50.0, Some(5.0)).with_columns(500);
        let target = project(raster.sensor_info(), &raster.samples()[100], 400.0, 500, true);
        let seed = raster.samples()[100].timestamp;

        let found = find_reacquisitions(&raster, &target, seed, Duration::seconds(5), &config());
        assert!(found.is_empty());
    }

    #[test]
    fn test_second_pass_found_outside_exclusion() {
        let raster = two_pass_raster();
        let target = project(raster.sensor_info(), &raster.samples()[100], 400.0, 500, true);
        let seed = raster.samples()[100].timestamp;
        let window = Duration::seconds(5);

        let found = find_reacquisitions(&raster, &target, seed, window, &config());
        assert!(!found.is_empty());
        for obs in &found {
            assert!(horizontal_distance(&obs.location(), &target) < 2.0);
            assert!((obs.timestamp - seed).num_milliseconds().abs() > window.num_milliseconds());
        }
        assert_eq!(found[0].timestamp, raster.samples()[299].timestamp);
    }

    #[test]
    fn test_distant_target_returns_empty() {
        let raster = straight_track(100, 0.5, 0.0, -50.0, 50.0, None).with_columns(400);
        let target = Location::new(42.0, -9.0);
        let found = find_reacquisitions(&raster, &target, epoch(), Duration::seconds(5), &config());
        assert!(found.is_empty());
    }

    #[test]
    fn test_nominal_columns_used_without_image() {
        let raster = straight_track(200, 0.5, 0.0, -50.0, 50.0, None);
        assert!(raster.columns().is_none());
        let target = project(raster.sensor_info(), &raster.samples()[60], 250.0, 1000, true);
        let found = find_reacquisitions(
            &raster,
            &target,
            epoch() - Duration::hours(1),
            Duration::seconds(5),
            &config(),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].timestamp, raster.samples()[60].timestamp);
    }
}
