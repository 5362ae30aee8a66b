use ::gxf::writer::aux_xml::write_aux_xml;
use ::gxf::{GeoTiffWriter, GxfDataset, GxfError};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use std::io::Cursor;
use std::path::Path;

#[pymodule]
fn gxf(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyGxfDataset>()?;
    m.add_function(wrap_pyfunction!(open_gxf, m)?)?;
    m.add_function(wrap_pyfunction!(decode_text, m)?)?;
    m.add_function(wrap_pyfunction!(write_geotiff, m)?)?;
    Ok(())
}

#[pyclass(name = "GxfDataset")]
pub struct PyGxfDataset {
    inner: GxfDataset,
}

fn to_py_err(e: GxfError) -> PyErr {
    match e {
        GxfError::Io(e) => PyIOError::new_err(format!("Failed to read GXF: {}", e)),
        other => PyValueError::new_err(format!("Failed to decode GXF: {}", other)),
    }
}

#[pymethods]
impl PyGxfDataset {
    #[getter]
    fn rows(&self) -> usize {
        self.inner.height()
    }

    #[getter]
    fn cols(&self) -> usize {
        self.inner.width()
    }

    #[getter]
    fn shape(&self) -> (usize, usize) {
        (self.inner.height(), self.inner.width())
    }

    /// Row-major, north-up samples.
    #[getter]
    fn values(&self) -> Vec<f32> {
        self.inner.values().to_vec()
    }

    #[getter]
    fn geo_transform(&self) -> [f64; 6] {
        self.inner.geo_transform()
    }

    #[getter]
    fn no_data(&self) -> Option<f64> {
        self.inner.no_data_value()
    }

    #[getter]
    fn checksum(&self) -> u16 {
        self.inner.band_checksum()
    }

    #[getter]
    fn wkt(&self) -> String {
        self.inner.spatial_reference_wkt()
    }

    #[getter]
    fn title(&self) -> Option<String> {
        self.inner.title().map(str::to_string)
    }

    fn __repr__(&self) -> String {
        format!(
            "GxfDataset(rows={}, cols={}, checksum={}, title={:?})",
            self.inner.height(),
            self.inner.width(),
            self.inner.band_checksum(),
            self.inner.title().unwrap_or("")
        )
    }
}

#[pyfunction]
pub fn open_gxf(path: &str) -> PyResult<PyGxfDataset> {
    let inner = ::gxf::open(path).map_err(to_py_err)?;
    Ok(PyGxfDataset { inner })
}

/// Decodes GXF content held in a string.
#[pyfunction]
pub fn decode_text(text: &str) -> PyResult<PyGxfDataset> {
    let inner = ::gxf::decode(Cursor::new(text)).map_err(to_py_err)?;
    Ok(PyGxfDataset { inner })
}

#[pyfunction]
#[pyo3(signature = (dataset, output_path, aux_xml=false))]
pub fn write_geotiff(dataset: &PyGxfDataset, output_path: &str, aux_xml: bool) -> PyResult<()> {
    let path = Path::new(output_path);
    GeoTiffWriter::new()
        .write(&dataset.inner, path)
        .map_err(|e| PyIOError::new_err(format!("Failed to write GeoTIFF: {}", e)))?;
    if aux_xml {
        write_aux_xml(&dataset.inner, path)
            .map_err(|e| PyIOError::new_err(format!("Failed to write aux.xml: {}", e)))?;
    }
    Ok(())
}
