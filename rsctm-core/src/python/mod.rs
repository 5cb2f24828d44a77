//! Python bindings for the transport engine
//!
//! The typestate of the Rust API cannot be expressed in Python, so [`PyTransport`] tracks
//! its lifecycle at runtime and raises `RuntimeError` for out-of-order calls.

use crate::coefficient_file::{BinaryFileSource, ByteOrder};
use crate::coefficients::{CoefficientSource, InMemorySource};
use crate::engine::{MonthlyTransport, TransportEngine};
use crate::errors::RSCTMError;
use crate::grid::{
    Month, MONTHS_PER_YEAR, NLAT, NLON, NPRES, STENCIL_WIDTH, STEPS_PER_MONTH, TIMESTEP_SECONDS,
};
use crate::kernel::{KernelOptions, StencilForm};
use numpy::{PyReadonlyArray5, PyReadwriteArray3};
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::path::PathBuf;

type DynSource = Box<dyn CoefficientSource + Send>;

impl From<RSCTMError> for PyErr {
    fn from(err: RSCTMError) -> PyErr {
        match err {
            RSCTMError::Io(_) | RSCTMError::SourceUnavailable(_) => {
                PyIOError::new_err(err.to_string())
            }
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

enum State {
    Ready(TransportEngine<DynSource>),
    Active(MonthlyTransport<DynSource>),
    // Placeholder while a load owns the engine
    Loading,
}

fn parse_kernel_options(form: &str, parallel: bool) -> PyResult<KernelOptions> {
    let form = match form {
        "weights" => StencilForm::Weights,
        "increment" => StencilForm::Increment,
        other => {
            return Err(PyValueError::new_err(format!(
                "Unknown stencil form '{}'. Expected 'weights' or 'increment'",
                other
            )))
        }
    };
    Ok(KernelOptions { form, parallel })
}

fn parse_byte_order(name: &str) -> PyResult<ByteOrder> {
    match name {
        "little" => Ok(ByteOrder::Little),
        "big" => Ok(ByteOrder::Big),
        other => Err(PyValueError::new_err(format!(
            "Unknown byte order '{}'. Expected 'little' or 'big'",
            other
        ))),
    }
}

/// Tracer transport on the fixed grid
///
/// Example:
///     transport = Transport.from_file("transport.bin")
///     transport.load_coefficients(1)
///     clamped = transport.advance(field)
#[pyclass]
#[pyo3(name = "Transport")]
pub struct PyTransport {
    state: State,
}

impl PyTransport {
    fn initialize(source: DynSource, options: KernelOptions) -> PyResult<Self> {
        Ok(Self {
            state: State::Ready(TransportEngine::initialize_with(source, options)?),
        })
    }
}

#[pymethods]
impl PyTransport {
    /// Read coefficients from a flat binary file of twelve monthly blocks
    #[staticmethod]
    #[pyo3(signature = (path, byte_order="little", form="weights", parallel=true))]
    fn from_file(path: PathBuf, byte_order: &str, form: &str, parallel: bool) -> PyResult<Self> {
        let source = BinaryFileSource::new(path).with_byte_order(parse_byte_order(byte_order)?);
        Self::initialize(Box::new(source), parse_kernel_options(form, parallel)?)
    }

    /// Use a year of coefficients with shape (12, NLON, NLAT, NPRES, STENCIL_WIDTH)
    #[staticmethod]
    #[pyo3(signature = (coefficients, form="weights", parallel=true))]
    fn from_array(
        coefficients: PyReadonlyArray5<'_, f32>,
        form: &str,
        parallel: bool,
    ) -> PyResult<Self> {
        let values = coefficients.as_array();
        let expected = [MONTHS_PER_YEAR, NLON, NLAT, NPRES, STENCIL_WIDTH];
        if values.shape() != expected {
            return Err(PyValueError::new_err(format!(
                "Coefficients have shape {:?}, expected {:?}",
                values.shape(),
                expected
            )));
        }
        let flat: Vec<f32> = values.iter().copied().collect();
        let source = InMemorySource::from_year(&flat)?;
        Self::initialize(Box::new(source), parse_kernel_options(form, parallel)?)
    }

    /// Install the coefficients for `month` (1-12)
    fn load_coefficients(&mut self, month: u32) -> PyResult<()> {
        let month = Month::new(month)?;
        match std::mem::replace(&mut self.state, State::Loading) {
            State::Ready(engine) => match engine.load_coefficients(month) {
                Ok(transport) => self.state = State::Active(transport),
                Err(failure) => {
                    self.state = State::Ready(failure.engine);
                    return Err(failure.error.into());
                }
            },
            State::Active(mut transport) => {
                let result = transport.load_coefficients(month);
                self.state = State::Active(transport);
                result?;
            }
            State::Loading => {
                return Err(PyRuntimeError::new_err("Transport was interrupted while loading"))
            }
        }
        Ok(())
    }

    /// Advance `field` in place by one step, returning the number of clamped cells
    fn advance(&mut self, mut field: PyReadwriteArray3<'_, f32>) -> PyResult<usize> {
        match &mut self.state {
            State::Active(transport) => Ok(transport.advance(field.as_array_mut())?.clamped),
            State::Ready(_) => Err(PyRuntimeError::new_err(
                "load_coefficients must be called before advance",
            )),
            State::Loading => Err(PyRuntimeError::new_err(
                "Transport was interrupted while loading",
            )),
        }
    }

    /// Installed month, or None before the first load
    #[getter]
    fn month(&self) -> Option<u32> {
        match &self.state {
            State::Active(transport) => Some(transport.month().number()),
            _ => None,
        }
    }

    fn __repr__(&self) -> String {
        match &self.state {
            State::Ready(_) => "Transport(no coefficients)".to_string(),
            State::Active(transport) => format!("Transport({})", transport.month()),
            State::Loading => "Transport(loading)".to_string(),
        }
    }
}

#[pymodule]
pub fn core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTransport>()?;
    m.add("NLON", NLON)?;
    m.add("NLAT", NLAT)?;
    m.add("NPRES", NPRES)?;
    m.add("STENCIL_WIDTH", STENCIL_WIDTH)?;
    m.add("TIMESTEP_SECONDS", TIMESTEP_SECONDS)?;
    m.add("STEPS_PER_MONTH", STEPS_PER_MONTH)?;
    Ok(())
}
