//! Precomputed stencil neighbour table
//!
//! The topology in [`crate::topology`] is evaluated once and stored as eleven
//! [`Neighbor`] references per cell, so the stencil sweep never has to branch on the
//! grid boundaries. References are flat indices rather than addresses and are valid for
//! any buffer of length [`NCELLS`]; the same table serves both the current and the next
//! concentration buffer.

use crate::grid::{Cell, NCELLS, NLAT, NLON, NPRES, STENCIL_WIDTH};
use crate::topology::{general_target, pole_redirect, Neighbor, StencilTerm};

/// Eleven stencil references for every grid cell
#[derive(Clone, Debug, PartialEq)]
pub struct NeighborTable {
    entries: Vec<[Neighbor; STENCIL_WIDTH]>,
}

impl NeighborTable {
    /// Build the table for the fixed grid
    ///
    /// Entries are filled by the general rule first. Targets that would fall outside the
    /// grid are left absent, then the pole crossings and the vertical boundaries overwrite
    /// their entries.
    pub fn build() -> Self {
        let mut entries: Vec<[Neighbor; STENCIL_WIDTH]> = (0..NCELLS)
            .map(|index| {
                let mut row = [Neighbor::Absent; STENCIL_WIDTH];
                row[StencilTerm::Centre.position()] = Neighbor::Cell(index as u32);
                row
            })
            .collect();

        for (index, row) in entries.iter_mut().enumerate() {
            let cell = Cell::from_index(index);
            for term in &StencilTerm::ALL[1..] {
                row[term.position()] = match general_target(cell, *term) {
                    Some(target) => Neighbor::of(target),
                    None => Neighbor::Absent,
                };
            }
        }

        Self::fix_poles(&mut entries);
        Self::fix_vertical_boundaries(&mut entries);

        log::debug!("Built stencil neighbour table for {} cells", entries.len());
        Self { entries }
    }

    fn fix_poles(entries: &mut [[Neighbor; STENCIL_WIDTH]]) {
        const POLAR: [(usize, StencilTerm); 6] = [
            (NLAT - 2, StencilTerm::North2),
            (NLAT - 1, StencilTerm::North2),
            (NLAT - 1, StencilTerm::North1),
            (0, StencilTerm::South1),
            (0, StencilTerm::South2),
            (1, StencilTerm::South2),
        ];

        for lon in 0..NLON {
            for level in 0..NPRES {
                for (lat, term) in POLAR {
                    let cell = Cell { lon, lat, level };
                    if let Some(redirect) = pole_redirect(cell, term) {
                        entries[cell.index()][term.position()] = redirect;
                    }
                }
            }
        }
    }

    fn fix_vertical_boundaries(entries: &mut [[Neighbor; STENCIL_WIDTH]]) {
        for lon in 0..NLON {
            for lat in 0..NLAT {
                entries[Cell::new(lon, lat, 0).index()][StencilTerm::Below.position()] =
                    Neighbor::Absent;
                entries[Cell::new(lon, lat, NPRES - 1).index()][StencilTerm::Above.position()] =
                    Neighbor::Absent;
            }
        }
    }

    /// Number of cells covered
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stencil references of the cell at flat index `cell`
    #[inline]
    pub fn neighbors(&self, cell: usize) -> &[Neighbor; STENCIL_WIDTH] {
        &self.entries[cell]
    }

    /// Reference for a single term
    pub fn neighbor(&self, cell: Cell, term: StencilTerm) -> Neighbor {
        self.entries[cell.index()][term.position()]
    }

    /// Values of the eleven stencil terms of `cell`, read from `buffer`
    pub fn gather(&self, cell: usize, buffer: &[f32]) -> [f32; STENCIL_WIDTH] {
        let mut values = [0.0; STENCIL_WIDTH];
        for (value, neighbor) in values.iter_mut().zip(self.entries[cell].iter()) {
            *value = neighbor.value(buffer);
        }
        values
    }

    /// Weighted stencil sum for `cell`, accumulated in term order
    #[inline]
    pub fn weighted_sum(
        &self,
        cell: usize,
        buffer: &[f32],
        weights: &[f32; STENCIL_WIDTH],
    ) -> f32 {
        self.weighted_sum_from(cell, buffer, weights, 0.0)
    }

    /// Add each weighted stencil term of `cell` onto `start`, one term at a time
    #[inline]
    pub fn weighted_sum_from(
        &self,
        cell: usize,
        buffer: &[f32],
        weights: &[f32; STENCIL_WIDTH],
        start: f32,
    ) -> f32 {
        let values = self.gather(cell, buffer);
        let mut sum = start;
        for (value, weight) in values.iter().zip(weights.iter()) {
            sum += value * weight;
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{diametric, neighbor};

    #[test]
    fn covers_every_cell() {
        let table = NeighborTable::build();
        assert_eq!(table.len(), NCELLS);
        assert!(!table.is_empty());
    }

    #[test]
    fn matches_topology_everywhere() {
        let table = NeighborTable::build();
        for cell in Cell::all() {
            for term in StencilTerm::ALL {
                assert_eq!(
                    table.neighbor(cell, term),
                    neighbor(cell, term),
                    "cell {} term {:?}",
                    cell,
                    term
                );
            }
        }
    }

    #[test]
    fn first_term_is_self() {
        let table = NeighborTable::build();
        for index in 0..NCELLS {
            assert_eq!(table.neighbors(index)[0], Neighbor::Cell(index as u32));
        }
    }

    #[test]
    fn east_and_west_reference_each_other() {
        let table = NeighborTable::build();
        for cell in Cell::all() {
            let east = table
                .neighbor(cell, StencilTerm::East1)
                .cell()
                .expect("east neighbour always exists");
            assert_eq!(
                table.neighbor(east, StencilTerm::West1),
                Neighbor::of(cell),
                "cell {}",
                cell
            );

            let east2 = table
                .neighbor(cell, StencilTerm::East2)
                .cell()
                .expect("second east neighbour always exists");
            assert_eq!(table.neighbor(east2, StencilTerm::West2), Neighbor::of(cell));
        }
    }

    #[test]
    fn pole_entries() {
        let table = NeighborTable::build();
        for lon in 0..NLON {
            for level in 0..NPRES {
                let opposite = diametric(lon);
                let north = Cell::new(lon, NLAT - 1, level);
                let south = Cell::new(lon, 0, level);
                assert_eq!(
                    table.neighbor(north, StencilTerm::North1),
                    Neighbor::of(Cell::new(opposite, NLAT - 1, level))
                );
                assert_eq!(table.neighbor(north, StencilTerm::North2), Neighbor::Absent);
                assert_eq!(
                    table.neighbor(Cell::new(lon, NLAT - 2, level), StencilTerm::North2),
                    Neighbor::of(Cell::new(opposite, NLAT - 1, level))
                );
                assert_eq!(
                    table.neighbor(south, StencilTerm::South1),
                    Neighbor::of(Cell::new(opposite, 0, level))
                );
                assert_eq!(table.neighbor(south, StencilTerm::South2), Neighbor::Absent);
                assert_eq!(
                    table.neighbor(Cell::new(lon, 1, level), StencilTerm::South2),
                    Neighbor::of(Cell::new(opposite, 0, level))
                );
            }
        }
    }

    #[test]
    fn absent_counts() {
        let table = NeighborTable::build();
        let absent = (0..NCELLS)
            .flat_map(|c| table.neighbors(c).iter())
            .filter(|n| **n == Neighbor::Absent)
            .count();
        // Two beyond-pole entries and two vertical boundary entries per column/row
        assert_eq!(absent, 2 * NLON * NPRES + 2 * NLON * NLAT);
    }

    #[test]
    fn gather_and_weighted_sum() {
        let table = NeighborTable::build();
        let buffer: Vec<f32> = (0..NCELLS).map(|i| i as f32).collect();
        let top = Cell::new(2, 5, NPRES - 1);

        let values = table.gather(top.index(), &buffer);
        assert_eq!(values[0], top.index() as f32);
        assert_eq!(values[StencilTerm::Above.position()], 0.0);
        assert_eq!(
            values[StencilTerm::Below.position()],
            Cell::new(2, 5, NPRES - 2).index() as f32
        );

        let mut weights = [0.0; STENCIL_WIDTH];
        weights[StencilTerm::East1.position()] = 1.0;
        assert_eq!(
            table.weighted_sum(top.index(), &buffer, &weights),
            Cell::new(3, 5, NPRES - 1).index() as f32
        );
        assert_eq!(
            table.weighted_sum_from(top.index(), &buffer, &weights, 0.5),
            0.5 + Cell::new(3, 5, NPRES - 1).index() as f32
        );
    }
}
