//! Rasterizes the area a working edge swept between two epochs.
//!
//! The swept quadrilateral L0 R0 R1 L1 (left/right at epoch start, left/right at epoch end) is
//! split along the L0-R1 diagonal into two height triangles. Two time triangles share the same
//! plan vertices with `z` set to milliseconds since the start of the epoch. A cell receives a
//! pass when its centre lies in either triangle; the first triangle wins on the shared diagonal.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::core::geometry::{BoundingWorldExtent, Triangle, Xyz};
use crate::execution::processor_state::AttributeSeries;
use crate::storage::subgrid_tree::{CellAddress, ServerSubGridTree};

/// Edge positions at the start and end of one epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwathEpoch {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub left_start: Xyz,
    pub right_start: Xyz,
    pub left_end: Xyz,
    pub right_end: Xyz,
}

impl SwathEpoch {
    pub fn elapsed_milliseconds(&self) -> f64 {
        (self.end_time - self.start_time).num_microseconds().unwrap_or(0) as f64 / 1000.0
    }

    pub fn extent(&self) -> BoundingWorldExtent {
        BoundingWorldExtent::from_points(&[
            self.left_start,
            self.right_start,
            self.right_end,
            self.left_end,
        ])
    }

    /// Height triangles (L0, R0, R1) and (L0, R1, L1)
    pub fn height_triangles(&self) -> [Triangle; 2] {
        [
            Triangle::new(self.left_start, self.right_start, self.right_end),
            Triangle::new(self.left_start, self.right_end, self.left_end),
        ]
    }

    /// Same plan vertices as [`Self::height_triangles`], `z` = ms since epoch start
    pub fn time_triangles(&self) -> [Triangle; 2] {
        let elapsed = self.elapsed_milliseconds();
        let l0 = self.left_start.with_z(0.0);
        let r0 = self.right_start.with_z(0.0);
        let r1 = self.right_end.with_z(elapsed);
        let l1 = self.left_end.with_z(elapsed);
        [Triangle::new(l0, r0, r1), Triangle::new(l0, r1, l1)]
    }

    /// Plan speed of the edge midpoint in metres per second
    pub fn machine_speed(&self) -> f64 {
        let seconds = self.elapsed_milliseconds() / 1000.0;
        if seconds <= 0.0 {
            return 0.0;
        }
        let start = self.left_start.midpoint(&self.right_start);
        let end = self.left_end.midpoint(&self.right_end);
        start.distance_xy(&end) / seconds
    }
}

/// Counters from one swath call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwathOutcome {
    pub cell_passes: u64,
    pub epochs: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Swather {
    max_swath_extent: f64,
    machine_index: u16,
}

impl Swather {
    pub fn new(max_swath_extent: f64, machine_index: u16) -> Self {
        Swather {
            max_swath_extent,
            machine_index,
        }
    }

    /// Add a pass to every cell covered by the epoch. Oversized or zero-length epochs produce no
    /// passes and are not counted.
    pub fn swath(
        &self,
        epoch: &SwathEpoch,
        attributes: &AttributeSeries,
        grid: &mut ServerSubGridTree,
    ) -> SwathOutcome {
        let elapsed = epoch.elapsed_milliseconds();
        if elapsed <= 0.0 {
            return SwathOutcome::default();
        }

        let extent = epoch.extent();
        if extent.size_x() > self.max_swath_extent || extent.size_y() > self.max_swath_extent {
            debug!(
                width = extent.size_x(),
                height = extent.size_y(),
                limit = self.max_swath_extent,
                "Swath extent exceeds limit, epoch ignored"
            );
            return SwathOutcome::default();
        }

        let height_triangles = epoch.height_triangles();
        let time_triangles = epoch.time_triangles();
        let speed = epoch.machine_speed();

        let low = grid.cell_address_for(extent.min_x, extent.min_y);
        let high = grid.cell_address_for(extent.max_x, extent.max_y);

        let mut cell_passes = 0;
        for cy in low.y..=high.y {
            for cx in low.x..=high.x {
                let address = CellAddress::new(cx, cy);
                let (x, y) = grid.cell_center(address);
                let Some(index) = height_triangles
                    .iter()
                    .position(|triangle| triangle.contains_xy(x, y))
                else {
                    continue;
                };
                let (Some(height), Some(offset)) = (
                    height_triangles[index].interpolate_z(x, y),
                    time_triangles[index].interpolate_z(x, y),
                ) else {
                    continue;
                };

                let offset_us = (offset.clamp(0.0, elapsed) * 1000.0).round() as i64;
                let time = epoch.start_time + Duration::microseconds(offset_us);
                let pass = attributes.cell_pass_at(time, height as f32, self.machine_index, speed);
                grid.add_pass(address, pass);
                cell_passes += 1;
            }
        }

        SwathOutcome {
            cell_passes,
            epochs: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::processor_state::ProcessorState;
    use chrono::TimeZone;

    fn epoch(length: f64, width: f64) -> SwathEpoch {
        let start = Utc.with_ymd_and_hms(2019, 7, 3, 14, 0, 0).unwrap();
        SwathEpoch {
            start_time: start,
            end_time: start + Duration::seconds(1),
            left_start: Xyz::new(0.0, 0.0, 10.0),
            right_start: Xyz::new(width, 0.0, 10.0),
            left_end: Xyz::new(0.0, length, 12.0),
            right_end: Xyz::new(width, length, 12.0),
        }
    }

    #[test]
    fn test_rectangle_covers_expected_cells() {
        let mut grid = ServerSubGridTree::new(1.0);
        let outcome =
            Swather::new(100.0, 0).swath(&epoch(4.0, 3.0), &AttributeSeries::new(), &mut grid);

        assert_eq!(outcome.cell_passes, 12);
        assert_eq!(outcome.epochs, 1);
        assert_eq!(grid.cell_count(), 12);
        assert_eq!(grid.pass_count(), 12);
    }

    #[test]
    fn test_height_and_time_interpolation() {
        let mut grid = ServerSubGridTree::new(1.0);
        let e = epoch(4.0, 3.0);
        Swather::new(100.0, 0).swath(&e, &AttributeSeries::new(), &mut grid);

        // Centre (1.5, 2.5) is 62.5% of the way along the swath
        let pass = grid.cell(CellAddress::new(1, 2)).unwrap().passes()[0];
        assert!((f64::from(pass.height) - 11.25).abs() < 1e-4);
        assert_eq!(pass.time, e.start_time + Duration::milliseconds(625));
        assert!((pass.machine_speed - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_oversized_extent_is_ignored() {
        let mut grid = ServerSubGridTree::new(1.0);
        let outcome =
            Swather::new(2.0, 0).swath(&epoch(4.0, 1.0), &AttributeSeries::new(), &mut grid);
        assert_eq!(outcome, SwathOutcome::default());
        assert!(grid.is_empty());
    }

    #[test]
    fn test_zero_duration_is_ignored() {
        let mut e = epoch(4.0, 3.0);
        e.end_time = e.start_time;
        let mut grid = ServerSubGridTree::new(1.0);
        let outcome = Swather::new(100.0, 0).swath(&e, &AttributeSeries::new(), &mut grid);
        assert_eq!(outcome, SwathOutcome::default());
    }

    #[test]
    fn test_passes_carry_attributes_at_interpolated_time() {
        let e = epoch(4.0, 1.0);
        let mut state = ProcessorState::new();
        let mut attributes = AttributeSeries::new();
        state.mdp.set_absolute(80);
        attributes.record(e.start_time, &state).unwrap();
        state.mdp.set_absolute(95);
        attributes.record(e.end_time, &state).unwrap();

        let mut grid = ServerSubGridTree::new(1.0);
        Swather::new(100.0, 3).swath(&e, &attributes, &mut grid);

        let pass = grid.cell(CellAddress::new(0, 3)).unwrap().passes()[0];
        assert_eq!(pass.mdp, Some(80));
        assert_eq!(pass.machine_index, 3);
    }
}
