//! Fixed latitude-longitude-pressure grid
//!
//! The transport grid is a global 10° x 10° mesh with ten pressure levels. Its dimensions
//! are compile-time constants: the coefficient datasets are generated offline for exactly
//! this resolution, so nothing here is configurable at runtime.
//!
//! Cells are addressed either by their logical [`Cell`] coordinate or by a flat index with
//! the pressure level varying fastest, then latitude, then longitude. The flat order is
//! also the order of cells in a monthly coefficient block.
//!
//! ```rust
//! use rsctm_core::grid::{Cell, NCELLS, NLAT, NLON, NPRES};
//!
//! let cell = Cell::new(3, 4, 5);
//! assert_eq!(Cell::from_index(cell.index()), cell);
//! assert_eq!(NCELLS, NLON * NLAT * NPRES);
//! ```

use crate::errors::{RSCTMError, RSCTMResult};
use ndarray::Array3;
use std::fmt;

/// Number of longitude columns (periodic)
pub const NLON: usize = 36;
/// Number of latitude rows, row 0 being the south pole row and `NLAT - 1` the north pole row
pub const NLAT: usize = 18;
/// Number of pressure levels, level 0 at the surface and `NPRES - 1` at the model top
pub const NPRES: usize = 10;
/// Number of terms in the transport stencil, including the cell itself
pub const STENCIL_WIDTH: usize = 11;
/// Total number of grid cells
pub const NCELLS: usize = NLON * NLAT * NPRES;
/// Number of values in one monthly coefficient block
pub const COEFFICIENTS_PER_MONTH: usize = NCELLS * STENCIL_WIDTH;

/// Longitude spacing in degrees
pub const DEGREES_LON: f32 = 10.0;
/// Latitude spacing in degrees
pub const DEGREES_LAT: f32 = 10.0;

/// Transport timestep in seconds
pub const TIMESTEP_SECONDS: f32 = 7200.0;
/// Number of transport steps per day
pub const STEPS_PER_DAY: usize = 12;
/// Days in a model month
pub const DAYS_PER_MONTH: usize = 30;
/// Number of transport steps per model month
pub const STEPS_PER_MONTH: usize = STEPS_PER_DAY * DAYS_PER_MONTH;
/// Number of months (and coefficient blocks) per year
pub const MONTHS_PER_YEAR: usize = 12;

/// Pressure at the centre of each level
/// unit: Pa
pub const PRESSURE_LEVELS: [f32; NPRES] = [10e4, 9e4, 8e4, 7e4, 6e4, 5e4, 4e4, 3e4, 2e4, 1e4];

/// Pressure at the level interfaces, surface first
/// unit: Pa
pub const PRESSURE_BOUNDS: [f32; NPRES + 1] = [
    10e4, 9.5e4, 8.5e4, 7.5e4, 6.5e4, 5.5e4, 4.5e4, 3.5e4, 2.5e4, 1.5e4, 1e4,
];

/// Tracer concentration over the whole grid, indexed `[[lon, lat, level]]`
pub type ConcentrationField = Array3<f32>;

/// Shape every concentration field must have
pub const FIELD_SHAPE: [usize; 3] = [NLON, NLAT, NPRES];

/// Logical coordinate of a grid cell
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    pub lon: usize,
    pub lat: usize,
    pub level: usize,
}

impl Cell {
    /// Create a cell coordinate
    ///
    /// # Panics
    ///
    /// Panics if any component lies outside the grid
    pub fn new(lon: usize, lat: usize, level: usize) -> Self {
        assert!(
            lon < NLON && lat < NLAT && level < NPRES,
            "Cell ({}, {}, {}) lies outside the {}x{}x{} grid",
            lon,
            lat,
            level,
            NLON,
            NLAT,
            NPRES
        );
        Self { lon, lat, level }
    }

    /// Flat index of this cell
    #[inline]
    pub fn index(&self) -> usize {
        (self.lon * NLAT + self.lat) * NPRES + self.level
    }

    /// Inverse of [`Cell::index`]
    #[inline]
    pub fn from_index(index: usize) -> Self {
        debug_assert!(index < NCELLS);
        Self {
            lon: index / (NLAT * NPRES),
            lat: (index / NPRES) % NLAT,
            level: index % NPRES,
        }
    }

    /// Whether the cell lies on one of the two pole rows
    pub fn is_pole_row(&self) -> bool {
        self.lat == 0 || self.lat == NLAT - 1
    }

    /// Iterate over every cell in flat index order
    pub fn all() -> impl Iterator<Item = Cell> {
        (0..NCELLS).map(Cell::from_index)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.lon, self.lat, self.level)
    }
}

/// Longitude of the centre of a column in degrees east
pub fn longitude_centre(lon: usize) -> f32 {
    DEGREES_LON * lon as f32
}

/// Latitude of the centre of a row in degrees north
pub fn latitude_centre(lat: usize) -> f32 {
    -90.0 + 0.5 * DEGREES_LAT + DEGREES_LAT * lat as f32
}

/// Pressure thickness of a level
/// unit: Pa
pub fn layer_thickness(level: usize) -> f32 {
    PRESSURE_BOUNDS[level] - PRESSURE_BOUNDS[level + 1]
}

/// A field of zeros with the grid shape
pub fn zeros_field() -> ConcentrationField {
    Array3::zeros(FIELD_SHAPE)
}

/// A field with every cell set to `value`
pub fn uniform_field(value: f32) -> ConcentrationField {
    Array3::from_elem(FIELD_SHAPE, value)
}

/// Calendar month selecting a coefficient block
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(u8);

const MONTH_NAMES: [&str; MONTHS_PER_YEAR] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

impl Month {
    /// Create a month from its calendar number (1 = January)
    pub fn new(number: u32) -> RSCTMResult<Self> {
        if (1..=MONTHS_PER_YEAR as u32).contains(&number) {
            Ok(Self(number as u8))
        } else {
            Err(RSCTMError::InvalidMonth(number))
        }
    }

    /// Calendar number, 1..=12
    pub fn number(&self) -> u32 {
        self.0 as u32
    }

    /// Zero-based position of this month's block in a yearly dataset
    pub fn index(&self) -> usize {
        self.0 as usize - 1
    }

    pub fn name(&self) -> &'static str {
        MONTH_NAMES[self.index()]
    }

    /// The following month, wrapping December to January
    pub fn next(&self) -> Self {
        Self(self.0 % MONTHS_PER_YEAR as u8 + 1)
    }

    /// All twelve months in calendar order
    pub fn all() -> impl Iterator<Item = Month> {
        (1..=MONTHS_PER_YEAR as u8).map(Month)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (month {})", self.name(), self.0)
    }
}

impl TryFrom<u32> for Month {
    type Error = RSCTMError;

    fn try_from(value: u32) -> RSCTMResult<Self> {
        Month::new(value)
    }
}
