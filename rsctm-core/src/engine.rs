//! Lifecycle of the transport scheme
//!
//! A driver uses three operations:
//!
//! 1. [`TransportEngine::initialize`] builds the neighbour table and connects to the
//!    coefficient source, once per run.
//! 2. [`TransportEngine::load_coefficients`] installs a month and hands back a
//!    [`MonthlyTransport`]. Later months are installed with
//!    [`MonthlyTransport::load_coefficients`].
//! 3. [`MonthlyTransport::advance`] moves a concentration field forward by one step.
//!
//! Advancing is only possible on a [`MonthlyTransport`], which cannot exist before both the
//! setup and a successful month load.
//!
//! ```rust
//! use rsctm_core::coefficients::{CoefficientTable, InMemorySource};
//! use rsctm_core::engine::TransportEngine;
//! use rsctm_core::grid::{uniform_field, Month};
//!
//! let source = InMemorySource::repeating(CoefficientTable::identity().to_vec());
//! let engine = TransportEngine::initialize(source).unwrap();
//! let mut transport = engine.load_coefficients(Month::new(1).unwrap()).unwrap();
//!
//! let mut field = uniform_field(1.5);
//! transport.advance(field.view_mut()).unwrap();
//! assert!(field.iter().all(|v| *v == 1.5));
//! ```

use crate::coefficient_file::BinaryFileSource;
use crate::coefficients::{CoefficientSource, CoefficientTable};
use crate::config::TransportConfig;
use crate::errors::{RSCTMError, RSCTMResult};
use crate::grid::Month;
use crate::kernel::{KernelOptions, StencilKernel, StepStats};
use crate::neighbor_table::NeighborTable;
use ndarray::ArrayViewMut3;

/// Transport setup without coefficients
#[derive(Debug)]
pub struct TransportEngine<S> {
    source: S,
    table: NeighborTable,
    kernel: StencilKernel,
}

impl<S: CoefficientSource> TransportEngine<S> {
    /// Build the neighbour table and connect `source` using default kernel options
    pub fn initialize(source: S) -> RSCTMResult<Self> {
        Self::initialize_with(source, KernelOptions::default())
    }

    /// Build the neighbour table and connect `source`
    ///
    /// A source that cannot be connected is fatal for the run.
    pub fn initialize_with(mut source: S, options: KernelOptions) -> RSCTMResult<Self> {
        source.connect()?;
        let table = NeighborTable::build();
        log::info!(
            "Transport initialised: {} cells, {:?} stencil, parallel sweep {}",
            table.len(),
            options.form,
            options.parallel
        );
        Ok(Self {
            source,
            table,
            kernel: StencilKernel::new(options),
        })
    }

    /// Install the coefficients for `month`
    ///
    /// On failure the engine is handed back inside the [`LoadFailure`], so the neighbour
    /// table and the connected source survive a retry.
    pub fn load_coefficients(
        mut self,
        month: Month,
    ) -> Result<MonthlyTransport<S>, LoadFailure<S>> {
        match CoefficientTable::read(&mut self.source, month) {
            Ok(coefficients) => {
                log::info!("Installed transport coefficients for {}", month);
                Ok(MonthlyTransport {
                    engine: self,
                    coefficients,
                    month,
                })
            }
            Err(error) => Err(LoadFailure {
                engine: self,
                error,
            }),
        }
    }

    pub fn neighbor_table(&self) -> &NeighborTable {
        &self.table
    }

    pub fn options(&self) -> &KernelOptions {
        self.kernel.options()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl TransportEngine<BinaryFileSource> {
    /// Set up a file-backed engine from configuration
    pub fn from_config(config: &TransportConfig) -> RSCTMResult<Self> {
        let source = config.coefficients.source()?;
        Self::initialize_with(source, config.kernel)
    }
}

/// A first coefficient load that failed, with the untouched engine
#[derive(Debug)]
pub struct LoadFailure<S> {
    pub engine: TransportEngine<S>,
    pub error: RSCTMError,
}

impl<S> From<LoadFailure<S>> for RSCTMError {
    fn from(failure: LoadFailure<S>) -> Self {
        failure.error
    }
}

/// Transport with a month of coefficients installed
#[derive(Debug)]
pub struct MonthlyTransport<S> {
    engine: TransportEngine<S>,
    coefficients: CoefficientTable,
    month: Month,
}

impl<S: CoefficientSource> MonthlyTransport<S> {
    /// Replace the installed coefficients with those for `month`
    ///
    /// If loading fails the previous month stays installed.
    pub fn load_coefficients(&mut self, month: Month) -> RSCTMResult<()> {
        self.coefficients.load(&mut self.engine.source, month)?;
        if month == self.month {
            log::debug!("Reloaded transport coefficients for {}", month);
        } else {
            log::info!("Installed transport coefficients for {}", month);
        }
        self.month = month;
        Ok(())
    }

    /// Advance `field` by one transport step in place
    ///
    /// `field` must have shape `(NLON, NLAT, NPRES)`.
    pub fn advance(&mut self, field: ArrayViewMut3<'_, f32>) -> RSCTMResult<StepStats> {
        let stats = self
            .engine
            .kernel
            .step(&self.engine.table, &self.coefficients, field)?;
        if stats.clamped > 0 {
            log::debug!("Clamped {} negative concentrations", stats.clamped);
        }
        Ok(stats)
    }

    /// Month whose coefficients are installed
    pub fn month(&self) -> Month {
        self.month
    }

    pub fn coefficients(&self) -> &CoefficientTable {
        &self.coefficients
    }

    pub fn neighbor_table(&self) -> &NeighborTable {
        &self.engine.table
    }

    pub fn options(&self) -> &KernelOptions {
        self.engine.options()
    }

    /// Drop the installed coefficients and recover the engine
    pub fn into_engine(self) -> TransportEngine<S> {
        self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::InMemorySource;
    use crate::grid::{uniform_field, zeros_field, NLAT, NLON, NPRES, STENCIL_WIDTH};
    use ndarray::ShapeBuilder;

    struct Unreachable;

    impl CoefficientSource for Unreachable {
        fn connect(&mut self) -> RSCTMResult<()> {
            Err(RSCTMError::SourceUnavailable("no route to data".to_string()))
        }

        fn read_month(&mut self, month: Month) -> RSCTMResult<Vec<f32>> {
            Err(RSCTMError::MissingMonth {
                month,
                reason: "unreachable".to_string(),
            })
        }
    }

    fn month(number: u32) -> Month {
        Month::new(number).unwrap()
    }

    fn halving() -> Vec<f32> {
        let mut weights = [0.0; STENCIL_WIDTH];
        weights[0] = 0.5;
        CoefficientTable::uniform(weights).to_vec()
    }

    #[test]
    fn initialize_fails_on_unreachable_source() {
        let result = TransportEngine::initialize(Unreachable);
        assert!(matches!(result, Err(RSCTMError::SourceUnavailable(_))));
    }

    #[test]
    fn failed_first_load_returns_engine() {
        let source = InMemorySource::new().with_month(month(1), halving());
        let engine = TransportEngine::initialize(source).unwrap();

        let failure = match engine.load_coefficients(month(2)) {
            Err(failure) => failure,
            Ok(_) => panic!("month 2 has no coefficients"),
        };
        assert!(matches!(failure.error, RSCTMError::MissingMonth { .. }));

        let mut transport = failure.engine.load_coefficients(month(1)).unwrap();
        let mut field = uniform_field(2.0);
        transport.advance(field.view_mut()).unwrap();
        assert!(field.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn load_failure_converts_to_error() {
        fn first_month(
            engine: TransportEngine<InMemorySource>,
        ) -> RSCTMResult<MonthlyTransport<InMemorySource>> {
            Ok(engine.load_coefficients(month(7))?)
        }

        let engine = TransportEngine::initialize(InMemorySource::new()).unwrap();
        assert!(matches!(
            first_month(engine),
            Err(RSCTMError::MissingMonth { .. })
        ));
    }

    #[test]
    fn month_switch() {
        let source = InMemorySource::new()
            .with_month(month(1), CoefficientTable::identity().to_vec())
            .with_month(month(2), halving());
        let mut transport = TransportEngine::initialize(source)
            .unwrap()
            .load_coefficients(month(1))
            .unwrap();
        assert_eq!(transport.month(), month(1));

        let mut field = uniform_field(8.0);
        transport.advance(field.view_mut()).unwrap();
        assert!(field.iter().all(|v| *v == 8.0));

        transport.load_coefficients(month(2)).unwrap();
        assert_eq!(transport.month(), month(2));
        transport.advance(field.view_mut()).unwrap();
        assert!(field.iter().all(|v| *v == 4.0));
    }

    #[test]
    fn failed_month_switch_keeps_installed_month() {
        let source = InMemorySource::new().with_month(month(1), halving());
        let mut transport = TransportEngine::initialize(source)
            .unwrap()
            .load_coefficients(month(1))
            .unwrap();

        assert!(transport.load_coefficients(month(2)).is_err());
        assert_eq!(transport.month(), month(1));

        let mut field = uniform_field(2.0);
        transport.advance(field.view_mut()).unwrap();
        assert!(field.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn advance_rejects_wrong_shape() {
        let source = InMemorySource::repeating(halving());
        let mut transport = TransportEngine::initialize(source)
            .unwrap()
            .load_coefficients(month(3))
            .unwrap();

        let mut field = ndarray::Array3::<f32>::zeros((NLAT, NLON, NPRES));
        assert!(matches!(
            transport.advance(field.view_mut()),
            Err(RSCTMError::FieldShapeMismatch { .. })
        ));
    }

    #[test]
    fn accepts_fortran_ordered_fields() {
        let source = InMemorySource::repeating(CoefficientTable::identity().to_vec());
        let mut transport = TransportEngine::initialize(source)
            .unwrap()
            .load_coefficients(month(6))
            .unwrap();

        let mut field = ndarray::Array3::<f32>::zeros((NLON, NLAT, NPRES).f());
        field[[3, 5, 7]] = 2.5;
        transport.advance(field.view_mut()).unwrap();
        assert_eq!(field[[3, 5, 7]], 2.5);
        assert_eq!(field.sum(), 2.5);
    }

    #[test]
    fn into_engine_allows_reload() {
        let source = InMemorySource::repeating(halving());
        let engine = TransportEngine::initialize(source)
            .unwrap()
            .load_coefficients(month(4))
            .unwrap()
            .into_engine();
        assert_eq!(engine.neighbor_table().len(), NLON * NLAT * NPRES);

        let mut transport = engine.load_coefficients(month(5)).unwrap();
        let mut field = zeros_field();
        assert_eq!(transport.advance(field.view_mut()).unwrap().clamped, 0);
    }
}
