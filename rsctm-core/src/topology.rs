//! Neighbour geometry of the transport stencil
//!
//! Every cell is updated from eleven values: itself, two cells either side in longitude,
//! two cells either side in latitude and one level above and below. This module maps a
//! cell and a [`StencilTerm`] to the cell supplying that term.
//!
//! Three boundary rules apply:
//!
//! - Longitude is periodic, column `NLON - 1` is followed by column 0.
//! - A meridional neighbour that runs one row past a pole crosses over the pole and lands
//!   on the pole row itself in the diametrically opposite column. Running two rows past a
//!   pole gives an absent neighbour.
//! - There is no flux through the surface or the model top, so the level below level 0 and
//!   the level above `NPRES - 1` are absent.
//!
//! Absent neighbours contribute zero to the weighted sum.

use crate::grid::{Cell, NLAT, NLON, NPRES, STENCIL_WIDTH};

/// One term of the 11-point stencil, in coefficient order
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StencilTerm {
    /// The cell itself
    Centre = 0,
    /// Two columns east
    East2 = 1,
    /// One column east
    East1 = 2,
    /// One column west
    West1 = 3,
    /// Two columns west
    West2 = 4,
    /// Two rows north
    North2 = 5,
    /// One row north
    North1 = 6,
    /// One row south
    South1 = 7,
    /// Two rows south
    South2 = 8,
    /// One level down (towards the surface)
    Below = 9,
    /// One level up (towards the model top)
    Above = 10,
}

impl StencilTerm {
    /// All terms in coefficient order
    pub const ALL: [StencilTerm; STENCIL_WIDTH] = [
        StencilTerm::Centre,
        StencilTerm::East2,
        StencilTerm::East1,
        StencilTerm::West1,
        StencilTerm::West2,
        StencilTerm::North2,
        StencilTerm::North1,
        StencilTerm::South1,
        StencilTerm::South2,
        StencilTerm::Below,
        StencilTerm::Above,
    ];

    /// Position of this term in a cell's coefficient block
    #[inline]
    pub fn position(self) -> usize {
        self as usize
    }

    /// Offsets `(d_lon, d_lat, d_level)` of the naive neighbour
    pub fn offset(self) -> (isize, isize, isize) {
        match self {
            StencilTerm::Centre => (0, 0, 0),
            StencilTerm::East2 => (2, 0, 0),
            StencilTerm::East1 => (1, 0, 0),
            StencilTerm::West1 => (-1, 0, 0),
            StencilTerm::West2 => (-2, 0, 0),
            StencilTerm::North2 => (0, 2, 0),
            StencilTerm::North1 => (0, 1, 0),
            StencilTerm::South1 => (0, -1, 0),
            StencilTerm::South2 => (0, -2, 0),
            StencilTerm::Below => (0, 0, -1),
            StencilTerm::Above => (0, 0, 1),
        }
    }
}

/// Source of one stencil term
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Neighbor {
    /// A real cell, by flat index
    Cell(u32),
    /// No such cell; contributes zero
    Absent,
}

impl Neighbor {
    pub fn of(cell: Cell) -> Self {
        Neighbor::Cell(cell.index() as u32)
    }

    /// Value of this neighbour in `buffer`
    #[inline(always)]
    pub fn value(self, buffer: &[f32]) -> f32 {
        match self {
            Neighbor::Cell(index) => buffer[index as usize],
            Neighbor::Absent => 0.0,
        }
    }

    /// The referenced cell, if any
    pub fn cell(self) -> Option<Cell> {
        match self {
            Neighbor::Cell(index) => Some(Cell::from_index(index as usize)),
            Neighbor::Absent => None,
        }
    }
}

/// Shift a longitude column by `delta` with periodic wraparound
#[inline]
pub fn wrap_lon(lon: usize, delta: isize) -> usize {
    (lon as isize + delta).rem_euclid(NLON as isize) as usize
}

/// Column on the opposite side of the pole
#[inline]
pub fn diametric(lon: usize) -> usize {
    (lon + NLON / 2) % NLON
}

/// Neighbour given by the general rule alone
///
/// Longitude wraps, but latitude and level do not. Returns `None` when the naive target
/// leaves the grid, which only happens for the cases covered by [`pole_redirect`] and
/// [`vertical_boundary`].
pub fn general_target(cell: Cell, term: StencilTerm) -> Option<Cell> {
    let (d_lon, d_lat, d_level) = term.offset();
    let lat = cell.lat as isize + d_lat;
    let level = cell.level as isize + d_level;
    if !(0..NLAT as isize).contains(&lat) || !(0..NPRES as isize).contains(&level) {
        return None;
    }
    Some(Cell {
        lon: wrap_lon(cell.lon, d_lon),
        lat: lat as usize,
        level: level as usize,
    })
}

/// Neighbour across a pole, if `term` crosses one from `cell`
pub fn pole_redirect(cell: Cell, term: StencilTerm) -> Option<Neighbor> {
    let (_, d_lat, _) = term.offset();
    if d_lat == 0 {
        return None;
    }
    let target = cell.lat as isize + d_lat;
    let (overshoot, pole_row) = if target >= NLAT as isize {
        (target - (NLAT as isize - 1), NLAT - 1)
    } else if target < 0 {
        (-target, 0)
    } else {
        return None;
    };

    match overshoot {
        1 => Some(Neighbor::of(Cell {
            lon: diametric(cell.lon),
            lat: pole_row,
            level: cell.level,
        })),
        _ => Some(Neighbor::Absent),
    }
}

/// Whether `term` leaves the column through the surface or the model top
pub fn vertical_boundary(cell: Cell, term: StencilTerm) -> bool {
    match term {
        StencilTerm::Below => cell.level == 0,
        StencilTerm::Above => cell.level == NPRES - 1,
        _ => false,
    }
}

/// Exact source of `term` for `cell`, with all boundary rules applied
pub fn neighbor(cell: Cell, term: StencilTerm) -> Neighbor {
    if let Some(redirect) = pole_redirect(cell, term) {
        return redirect;
    }
    if vertical_boundary(cell, term) {
        return Neighbor::Absent;
    }
    match general_target(cell, term) {
        Some(target) => Neighbor::of(target),
        None => Neighbor::Absent,
    }
}
