//! The 11-point stencil update
//!
//! One transport step is a Jacobi-style sweep: every cell's new value is formed from the
//! old values of its stencil neighbours only, so cells can be processed in any order or in
//! parallel. After the sweep the two pole rows are collapsed to their longitude mean at
//! every level, and finally negative overshoots are clamped to zero.
//!
//! The kernel owns the two working buffers; they are allocated once and reused by every
//! step.

use crate::coefficients::CoefficientTable;
use crate::errors::{RSCTMError, RSCTMResult};
use crate::grid::{Cell, FIELD_SHAPE, NCELLS, NLAT, NLON, NPRES};
use crate::neighbor_table::NeighborTable;
use ndarray::ArrayViewMut3;
use serde::{Deserialize, Serialize};

/// Cells per work item in the parallel sweep (one longitude slab)
#[cfg(feature = "parallel")]
const SWEEP_CHUNK: usize = NLAT * NPRES;

/// How the stencil sum produces the new value
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StencilForm {
    /// The new value is the weighted sum itself
    #[default]
    Weights,
    /// The weighted sum is a tendency added onto the old value
    Increment,
}

/// Kernel settings
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelOptions {
    /// Interpretation of the coefficients
    /// default: weights
    pub form: StencilForm,

    /// Split the sweep across the rayon thread pool
    ///
    /// Ignored unless the `parallel` feature is enabled.
    /// default: true
    pub parallel: bool,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            form: StencilForm::Weights,
            parallel: true,
        }
    }
}

/// Outcome of a single step
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Cells whose new value was negative and has been set to zero
    pub clamped: usize,
}

/// Double-buffered stencil kernel
#[derive(Clone, Debug)]
pub struct StencilKernel {
    options: KernelOptions,
    current: Vec<f32>,
    next: Vec<f32>,
}

impl StencilKernel {
    pub fn new(options: KernelOptions) -> Self {
        Self {
            options,
            current: vec![0.0; NCELLS],
            next: vec![0.0; NCELLS],
        }
    }

    pub fn options(&self) -> &KernelOptions {
        &self.options
    }

    /// Advance `field` by one step in place
    ///
    /// The field may have any memory layout but must have shape `(NLON, NLAT, NPRES)`. On a
    /// shape mismatch the field is left untouched.
    pub fn step(
        &mut self,
        table: &NeighborTable,
        coefficients: &CoefficientTable,
        mut field: ArrayViewMut3<'_, f32>,
    ) -> RSCTMResult<StepStats> {
        if field.shape() != FIELD_SHAPE {
            return Err(RSCTMError::FieldShapeMismatch {
                expected: FIELD_SHAPE,
                actual: field.shape().to_vec(),
            });
        }

        for (buffer, value) in self.current.iter_mut().zip(field.iter()) {
            *buffer = *value;
        }
        self.next.copy_from_slice(&self.current);

        self.sweep(table, coefficients);
        average_pole_rows(&mut self.next);
        let clamped = self.clamp_negative();

        for (value, buffer) in field.iter_mut().zip(self.next.iter()) {
            *value = *buffer;
        }
        Ok(StepStats { clamped })
    }

    fn sweep(&mut self, table: &NeighborTable, coefficients: &CoefficientTable) {
        #[cfg(feature = "parallel")]
        if self.options.parallel {
            self.sweep_parallel(table, coefficients);
            return;
        }

        let form = self.options.form;
        let current = &self.current;
        for (cell, value) in self.next.iter_mut().enumerate() {
            *value = update_cell(table, coefficients, current, cell, *value, form);
        }
    }

    #[cfg(feature = "parallel")]
    fn sweep_parallel(&mut self, table: &NeighborTable, coefficients: &CoefficientTable) {
        use rayon::prelude::*;

        let form = self.options.form;
        let current = &self.current;
        self.next
            .par_chunks_mut(SWEEP_CHUNK)
            .enumerate()
            .for_each(|(chunk, values)| {
                let first = chunk * SWEEP_CHUNK;
                for (offset, value) in values.iter_mut().enumerate() {
                    let cell = first + offset;
                    *value = update_cell(table, coefficients, current, cell, *value, form);
                }
            });
    }

    fn clamp_negative(&mut self) -> usize {
        #[cfg(feature = "parallel")]
        if self.options.parallel {
            use rayon::prelude::*;

            return self
                .next
                .par_chunks_mut(SWEEP_CHUNK)
                .map(clamp_slice)
                .sum();
        }

        clamp_slice(&mut self.next)
    }
}

#[inline(always)]
fn update_cell(
    table: &NeighborTable,
    coefficients: &CoefficientTable,
    current: &[f32],
    cell: usize,
    seeded: f32,
    form: StencilForm,
) -> f32 {
    let weights = coefficients.weights(cell);
    match form {
        StencilForm::Weights => table.weighted_sum(cell, current, weights),
        StencilForm::Increment => table.weighted_sum_from(cell, current, weights, seeded),
    }
}

/// Replace every pole row by its plain longitude mean, level by level
///
/// The divisor is the raw column count; no area weighting is applied.
pub fn average_pole_rows(values: &mut [f32]) {
    for level in 0..NPRES {
        for lat in [0, NLAT - 1] {
            let mut sum = 0.0f32;
            for lon in 0..NLON {
                sum += values[Cell { lon, lat, level }.index()];
            }
            let mean = sum / NLON as f32;
            for lon in 0..NLON {
                values[Cell { lon, lat, level }.index()] = mean;
            }
        }
    }
}

fn clamp_slice(values: &mut [f32]) -> usize {
    let mut clamped = 0;
    for value in values.iter_mut() {
        if *value < 0.0 {
            *value = 0.0;
            clamped += 1;
        }
    }
    clamped
}
