//! Sparse spatial grid of cell passes.
//!
//! World coordinates map to integer cell addresses by `floor(ordinate / cell_size)`. Cells are
//! grouped into 32×32 leaf subgrids held in an arena; a key → arena index map locates them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::geometry::BoundingWorldExtent;
use crate::error::{Error, Result};
use crate::storage::cell_pass::{Cell, CellPass};

/// Cells along each side of a leaf subgrid
pub const SUBGRID_TREE_DIMENSION: i32 = 32;

/// Cells in a leaf subgrid
pub const SUBGRID_CELL_COUNT: usize = (SUBGRID_TREE_DIMENSION * SUBGRID_TREE_DIMENSION) as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub x: i32,
    pub y: i32,
}

impl CellAddress {
    pub fn new(x: i32, y: i32) -> Self {
        CellAddress { x, y }
    }

    pub fn subgrid_key(self) -> SubGridKey {
        SubGridKey {
            x: self.x.div_euclid(SUBGRID_TREE_DIMENSION),
            y: self.y.div_euclid(SUBGRID_TREE_DIMENSION),
        }
    }

    fn offset_in_subgrid(self) -> usize {
        let cx = self.x.rem_euclid(SUBGRID_TREE_DIMENSION);
        let cy = self.y.rem_euclid(SUBGRID_TREE_DIMENSION);
        (cy * SUBGRID_TREE_DIMENSION + cx) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubGridKey {
    pub x: i32,
    pub y: i32,
}

impl SubGridKey {
    fn cell_address(self, offset: usize) -> CellAddress {
        let offset = offset as i32;
        CellAddress {
            x: self.x * SUBGRID_TREE_DIMENSION + offset % SUBGRID_TREE_DIMENSION,
            y: self.y * SUBGRID_TREE_DIMENSION + offset / SUBGRID_TREE_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerLeafSubGrid {
    pub key: SubGridKey,
    cells: Vec<Cell>,
}

impl ServerLeafSubGrid {
    fn new(key: SubGridKey) -> Self {
        ServerLeafSubGrid {
            key,
            cells: vec![Cell::new(); SUBGRID_CELL_COUNT],
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellAddress, &Cell)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(offset, cell)| (self.key.cell_address(offset), cell))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSubGridTree {
    cell_size: f64,
    subgrids: Vec<ServerLeafSubGrid>,
    index: HashMap<SubGridKey, usize>,
}

impl ServerSubGridTree {
    pub fn new(cell_size: f64) -> Self {
        ServerSubGridTree {
            cell_size,
            subgrids: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn cell_address_for(&self, x: f64, y: f64) -> CellAddress {
        CellAddress::new((x / self.cell_size).floor() as i32, (y / self.cell_size).floor() as i32)
    }

    /// World coordinates of the centre of a cell
    pub fn cell_center(&self, address: CellAddress) -> (f64, f64) {
        (
            (f64::from(address.x) + 0.5) * self.cell_size,
            (f64::from(address.y) + 0.5) * self.cell_size,
        )
    }

    fn subgrid_mut(&mut self, key: SubGridKey) -> &mut ServerLeafSubGrid {
        let index = match self.index.get(&key) {
            Some(&index) => index,
            None => {
                let index = self.subgrids.len();
                self.subgrids.push(ServerLeafSubGrid::new(key));
                self.index.insert(key, index);
                index
            }
        };
        &mut self.subgrids[index]
    }

    pub fn add_pass(&mut self, address: CellAddress, pass: CellPass) {
        let offset = address.offset_in_subgrid();
        self.subgrid_mut(address.subgrid_key()).cells[offset].add_pass(pass);
    }

    pub fn cell(&self, address: CellAddress) -> Option<&Cell> {
        let index = *self.index.get(&address.subgrid_key())?;
        let cell = &self.subgrids[index].cells[address.offset_in_subgrid()];
        (!cell.is_empty()).then_some(cell)
    }

    pub fn subgrid_count(&self) -> usize {
        self.subgrids.len()
    }

    pub fn subgrids(&self) -> &[ServerLeafSubGrid] {
        &self.subgrids
    }

    /// All cells holding at least one pass
    pub fn cells(&self) -> impl Iterator<Item = (CellAddress, &Cell)> {
        self.subgrids.iter().flat_map(ServerLeafSubGrid::cells)
    }

    pub fn cell_count(&self) -> usize {
        self.cells().count()
    }

    pub fn pass_count(&self) -> usize {
        self.cells().map(|(_, cell)| cell.pass_count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells().next().is_none()
    }

    /// Plan extent covered by non-empty cells
    pub fn extent(&self) -> BoundingWorldExtent {
        let mut extent = BoundingWorldExtent::inverted();
        for (address, _) in self.cells() {
            let cell_extent = BoundingWorldExtent {
                min_x: f64::from(address.x) * self.cell_size,
                min_y: f64::from(address.y) * self.cell_size,
                max_x: f64::from(address.x + 1) * self.cell_size,
                max_y: f64::from(address.y + 1) * self.cell_size,
                min_z: 0.0,
                max_z: 0.0,
            };
            extent.include_extent(&cell_extent);
        }
        extent
    }

    /// Fails with [`Error::CellSizeMismatch`] unless `source` can be integrated into this grid
    pub fn check_compatible(&self, source: &ServerSubGridTree) -> Result<()> {
        if (source.cell_size - self.cell_size).abs() > f64::EPSILON {
            return Err(Error::CellSizeMismatch {
                target: self.cell_size,
                source_size: source.cell_size,
            });
        }
        Ok(())
    }

    /// Union `source` into this grid. Machine indices in the source passes are rewritten through
    /// `machine_remap`; indices missing from the map are kept.
    pub fn integrate(
        &mut self,
        source: &ServerSubGridTree,
        machine_remap: &HashMap<u16, u16>,
    ) -> Result<usize> {
        self.check_compatible(source)?;

        let mut added = 0;
        for source_subgrid in &source.subgrids {
            let target = self.subgrid_mut(source_subgrid.key);
            for (offset, cell) in source_subgrid.cells.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                added += target.cells[offset]
                    .integrate(cell, |index| machine_remap.get(&index).copied().unwrap_or(index));
            }
        }

        debug!(subgrids = source.subgrids.len(), passes = added, "Integrated grid fragment");
        Ok(added)
    }
}
