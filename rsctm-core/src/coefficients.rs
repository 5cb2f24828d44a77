//! Monthly stencil coefficients
//!
//! The transport coefficients are produced offline from monthly mean wind fields and are
//! supplied by a [`CoefficientSource`] as one flat block per month: [`STENCIL_WIDTH`]
//! single-precision weights per cell, cells in flat index order (see [`crate::grid`]).
//!
//! A [`CoefficientTable`] holds exactly one complete month. Loading validates the new block
//! before it replaces the old one, so a failed load never leaves a half-updated table.

use crate::errors::{RSCTMError, RSCTMResult};
use crate::grid::{Month, COEFFICIENTS_PER_MONTH, MONTHS_PER_YEAR, NCELLS, STENCIL_WIDTH};
use crate::topology::StencilTerm;

/// Deviation from a unit row sum above which a month is reported as suspicious
const ROW_SUM_WARNING: f32 = 1e-3;

/// Supplier of monthly coefficient blocks
///
/// The storage format behind a source is its own concern; the engine only relies on
/// [`read_month`](Self::read_month) returning [`COEFFICIENTS_PER_MONTH`] values.
pub trait CoefficientSource {
    /// Establish access to the underlying data
    ///
    /// Called exactly once when the transport engine is initialised.
    fn connect(&mut self) -> RSCTMResult<()> {
        Ok(())
    }

    /// Read the complete block for `month`
    fn read_month(&mut self, month: Month) -> RSCTMResult<Vec<f32>>;
}

impl<S: CoefficientSource + ?Sized> CoefficientSource for Box<S> {
    fn connect(&mut self) -> RSCTMResult<()> {
        (**self).connect()
    }

    fn read_month(&mut self, month: Month) -> RSCTMResult<Vec<f32>> {
        (**self).read_month(month)
    }
}

/// Coefficient blocks held in memory
///
/// Months that were never inserted are reported as missing.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
    blocks: [Option<Vec<f32>>; MONTHS_PER_YEAR],
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the same block for every month
    pub fn repeating(values: Vec<f32>) -> Self {
        let mut source = Self::new();
        for month in Month::all() {
            source.insert(month, values.clone());
        }
        source
    }

    /// Split a whole year of consecutive monthly blocks
    pub fn from_year(values: &[f32]) -> RSCTMResult<Self> {
        let expected = COEFFICIENTS_PER_MONTH * MONTHS_PER_YEAR;
        if values.len() != expected {
            return Err(RSCTMError::SourceUnavailable(format!(
                "a year of coefficients needs {} values, got {}",
                expected,
                values.len()
            )));
        }
        let mut source = Self::new();
        for (month, block) in Month::all().zip(values.chunks_exact(COEFFICIENTS_PER_MONTH)) {
            source.insert(month, block.to_vec());
        }
        Ok(source)
    }

    /// Set the block for `month`, replacing any previous one
    pub fn insert(&mut self, month: Month, values: Vec<f32>) {
        self.blocks[month.index()] = Some(values);
    }

    pub fn with_month(mut self, month: Month, values: Vec<f32>) -> Self {
        self.insert(month, values);
        self
    }

    pub fn contains(&self, month: Month) -> bool {
        self.blocks[month.index()].is_some()
    }
}

impl CoefficientSource for InMemorySource {
    fn read_month(&mut self, month: Month) -> RSCTMResult<Vec<f32>> {
        self.blocks[month.index()]
            .clone()
            .ok_or_else(|| RSCTMError::MissingMonth {
                month,
                reason: "no block was provided for this month".to_string(),
            })
    }
}

/// Eleven stencil weights for every grid cell
#[derive(Clone, Debug, PartialEq)]
pub struct CoefficientTable {
    rows: Vec<[f32; STENCIL_WIDTH]>,
}

impl CoefficientTable {
    /// Build a table from a flat block, checking its size and contents
    pub fn from_vec(month: Month, values: Vec<f32>) -> RSCTMResult<Self> {
        if values.len() != COEFFICIENTS_PER_MONTH {
            return Err(RSCTMError::CoefficientSizeMismatch {
                month,
                expected: COEFFICIENTS_PER_MONTH,
                actual: values.len(),
            });
        }
        if let Some(position) = values.iter().position(|v| !v.is_finite()) {
            return Err(RSCTMError::NonFiniteCoefficient {
                month,
                cell: position / STENCIL_WIDTH,
                term: position % STENCIL_WIDTH,
            });
        }

        let rows = values
            .chunks_exact(STENCIL_WIDTH)
            .map(|chunk| {
                let mut row = [0.0; STENCIL_WIDTH];
                row.copy_from_slice(chunk);
                row
            })
            .collect();
        Ok(Self { rows })
    }

    /// Every cell keeps exactly its own value
    pub fn identity() -> Self {
        let mut weights = [0.0; STENCIL_WIDTH];
        weights[StencilTerm::Centre.position()] = 1.0;
        Self::uniform(weights)
    }

    /// The same weights for every cell
    pub fn uniform(weights: [f32; STENCIL_WIDTH]) -> Self {
        Self {
            rows: vec![weights; NCELLS],
        }
    }

    /// Replace the table with `month` from `source`
    ///
    /// On error the current content is left untouched.
    pub fn load<S: CoefficientSource + ?Sized>(
        &mut self,
        source: &mut S,
        month: Month,
    ) -> RSCTMResult<()> {
        *self = Self::read(source, month)?;
        Ok(())
    }

    /// Read and validate `month` from `source`
    pub fn read<S: CoefficientSource + ?Sized>(source: &mut S, month: Month) -> RSCTMResult<Self> {
        let table = Self::from_vec(month, source.read_month(month)?)?;

        let deviation = table.max_row_sum_deviation();
        if deviation > ROW_SUM_WARNING {
            log::warn!(
                "Coefficients for {} do not sum to one per cell (largest deviation {:.2e})",
                month,
                deviation
            );
        } else {
            log::debug!(
                "Coefficients for {} loaded, largest row sum deviation {:.2e}",
                month,
                deviation
            );
        }
        Ok(table)
    }

    /// Weights of the cell at flat index `cell`
    #[inline]
    pub fn weights(&self, cell: usize) -> &[f32; STENCIL_WIDTH] {
        &self.rows[cell]
    }

    /// Flattened copy in the layout of a source block
    pub fn to_vec(&self) -> Vec<f32> {
        self.rows.iter().flatten().copied().collect()
    }

    /// Largest `|sum(weights) - 1|` over all cells
    ///
    /// A uniform field is preserved by the stencil only where the weights sum to one.
    pub fn max_row_sum_deviation(&self) -> f32 {
        self.rows
            .iter()
            .map(|row| (row.iter().sum::<f32>() - 1.0).abs())
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(number: u32) -> Month {
        Month::new(number).unwrap()
    }

    fn ramp_block(offset: f32) -> Vec<f32> {
        (0..COEFFICIENTS_PER_MONTH)
            .map(|i| offset + (i % STENCIL_WIDTH) as f32 * 0.01)
            .collect()
    }

    #[test]
    fn from_vec_rejects_wrong_size() {
        let result = CoefficientTable::from_vec(month(2), vec![0.0; 10]);
        match result {
            Err(RSCTMError::CoefficientSizeMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, COEFFICIENTS_PER_MONTH);
                assert_eq!(actual, 10);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn from_vec_rejects_non_finite() {
        let mut values = vec![0.0; COEFFICIENTS_PER_MONTH];
        values[3 * STENCIL_WIDTH + 4] = f32::NAN;
        match CoefficientTable::from_vec(month(5), values) {
            Err(RSCTMError::NonFiniteCoefficient { cell, term, .. }) => {
                assert_eq!(cell, 3);
                assert_eq!(term, 4);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn rows_follow_flat_layout() {
        let values = ramp_block(0.0);
        let table = CoefficientTable::from_vec(month(1), values.clone()).unwrap();
        assert_eq!(table.to_vec().len(), COEFFICIENTS_PER_MONTH);
        assert_eq!(table.weights(7)[3], values[7 * STENCIL_WIDTH + 3]);
        assert_eq!(table.to_vec(), values);
    }

    #[test]
    fn identity_table() {
        let table = CoefficientTable::identity();
        assert_eq!(table.weights(0)[0], 1.0);
        assert!(table.weights(NCELLS - 1)[1..].iter().all(|w| *w == 0.0));
        assert_eq!(table.max_row_sum_deviation(), 0.0);
    }

    #[test]
    fn load_replaces_content() {
        let mut source = InMemorySource::new()
            .with_month(month(1), ramp_block(0.0))
            .with_month(month(2), ramp_block(0.5));
        let mut table = CoefficientTable::identity();

        table.load(&mut source, month(2)).unwrap();
        assert_eq!(table.to_vec(), ramp_block(0.5));

        table.load(&mut source, month(1)).unwrap();
        assert_eq!(table.to_vec(), ramp_block(0.0));
    }

    #[test]
    fn failed_load_keeps_previous_month() {
        let mut source = InMemorySource::new()
            .with_month(month(1), ramp_block(0.0))
            .with_month(month(2), vec![1.0; 17]);
        let mut table = CoefficientTable::read(&mut source, month(1)).unwrap();

        assert!(table.load(&mut source, month(2)).is_err());
        assert!(matches!(
            table.load(&mut source, month(3)),
            Err(RSCTMError::MissingMonth { .. })
        ));
        assert_eq!(table.to_vec(), ramp_block(0.0));
    }

    #[test]
    fn repeated_load_is_byte_identical() {
        let mut source = InMemorySource::repeating(ramp_block(0.25));
        let mut table = CoefficientTable::identity();
        table.load(&mut source, month(7)).unwrap();
        let first: Vec<u32> = table.to_vec().iter().map(|v| v.to_bits()).collect();
        table.load(&mut source, month(7)).unwrap();
        let second: Vec<u32> = table.to_vec().iter().map(|v| v.to_bits()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn year_of_blocks() {
        let mut values = Vec::with_capacity(COEFFICIENTS_PER_MONTH * MONTHS_PER_YEAR);
        for m in 0..MONTHS_PER_YEAR {
            values.extend(ramp_block(m as f32));
        }
        let mut source = InMemorySource::from_year(&values).unwrap();
        assert!(Month::all().all(|m| source.contains(m)));
        assert_eq!(source.read_month(month(12)).unwrap(), ramp_block(11.0));

        assert!(InMemorySource::from_year(&values[1..]).is_err());
    }

    #[test]
    fn boxed_source() {
        let mut source: Box<dyn CoefficientSource> =
            Box::new(InMemorySource::repeating(ramp_block(0.0)));
        source.connect().unwrap();
        let table = CoefficientTable::read(&mut source, month(4)).unwrap();
        assert_eq!(table.to_vec(), ramp_block(0.0));
    }

    #[test]
    fn row_sum_deviation() {
        let mut weights = [0.0; STENCIL_WIDTH];
        weights[0] = 0.5;
        weights[1] = 0.25;
        let table = CoefficientTable::uniform(weights);
        assert!((table.max_row_sum_deviation() - 0.25).abs() < 1e-6);
    }
}
