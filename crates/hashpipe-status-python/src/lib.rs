//! Python bindings for hashpipe-status

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use hashpipe_status::{
    Error, Libhashpipe, LibraryLocator, Status, StatusHandle, StatusMap, StatusOptions, Value,
};
use pyo3::exceptions::{PyAttributeError, PyRuntimeError, PyTimeoutError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyLong};

/// Library shared by every status handle, set by `load_shared_hashpipe_lib`
/// or discovered on first use
static LIBHASHPIPE: Mutex<Option<Arc<Libhashpipe>>> = Mutex::new(None);

/// Convert a status error to a Python exception
fn to_py_err(e: Error) -> PyErr {
    match e {
        Error::LockTimeout { .. } => PyTimeoutError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn library() -> PyResult<Arc<Libhashpipe>> {
    let mut slot = LIBHASHPIPE
        .lock()
        .map_err(|_| PyRuntimeError::new_err("library lock poisoned"))?;
    if let Some(lib) = slot.as_ref() {
        return Ok(lib.clone());
    }
    let path = LibraryLocator::from_env().locate().map_err(|_| {
        PyRuntimeError::new_err(
            "libhashpipe.so has not been loaded, set 'HASHPIPE_SO_PATH' or call \
             load_shared_hashpipe_lib before attaching to a status buffer",
        )
    })?;
    let lib = Arc::new(Libhashpipe::load(path).map_err(to_py_err)?);
    *slot = Some(lib.clone());
    Ok(lib)
}

fn value_to_py(py: Python<'_>, value: &Value) -> PyResult<PyObject> {
    Ok(match value {
        Value::Int(i) => i.to_object(py),
        Value::BigInt(digits) => py.get_type::<PyLong>().call1((digits.as_str(),))?.into(),
        Value::Float(f) => f.to_object(py),
        Value::Str(s) => s.to_object(py),
    })
}

fn fill_dict(dict: &PyDict, map: &StatusMap) -> PyResult<()> {
    let py = dict.py();
    for (key, value) in map.iter() {
        dict.set_item(key, value_to_py(py, value)?)?;
    }
    Ok(())
}

fn map_to_dict<'py>(py: Python<'py>, map: &StatusMap) -> PyResult<&'py PyDict> {
    let dict = PyDict::new(py);
    fill_dict(dict, map)?;
    Ok(dict)
}

fn status_to_py(py: Python<'_>, status: Status) -> PyResult<PyObject> {
    match status {
        Status::Schema(view) => {
            let buffer = HashpipeStatusBuffer {
                schema: view.schema().name,
                accessors: view
                    .accessor_names()
                    .filter_map(|name| view.get(name).map(|v| (name, v.clone())))
                    .collect(),
            };
            let obj: PyObject = Py::new(py, buffer)?.into_py(py);
            fill_dict(obj.as_ref(py).downcast::<PyDict>()?, view.map())?;
            Ok(obj)
        }
        Status::Raw(map) => Ok(map_to_dict(py, &map)?.into_py(py)),
    }
}

/// Load libhashpipe from an explicit path
#[pyfunction]
fn load_shared_hashpipe_lib(lib_so_path: PathBuf) -> PyResult<String> {
    let lib = Libhashpipe::load(&lib_so_path).map_err(to_py_err)?;
    let mut slot = LIBHASHPIPE
        .lock()
        .map_err(|_| PyRuntimeError::new_err("library lock poisoned"))?;
    *slot = Some(Arc::new(lib));
    Ok(lib_so_path.display().to_string())
}

/// Python wrapper for StatusHandle
#[pyclass(unsendable)]
struct HashpipeStatusSharedMemoryIPC {
    inner: StatusHandle<Arc<Libhashpipe>>,
}

#[pymethods]
impl HashpipeStatusSharedMemoryIPC {
    #[new]
    #[pyo3(signature = (instance_id, lock_timeout=None))]
    fn new(instance_id: i32, lock_timeout: Option<f64>) -> PyResult<Self> {
        let options = StatusOptions::new().with_lock_timeout_secs(lock_timeout.unwrap_or(0.0));
        let inner = StatusHandle::attach_with(library()?, instance_id, options).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn instance_id(&self) -> i32 {
        self.inner.instance_id()
    }

    #[getter]
    fn shmid(&self) -> i32 {
        self.inner.segment_id()
    }

    /// Parse the buffer: a HashpipeStatusBuffer when the telescope is known,
    /// else a plain dict
    fn parse_buffer(&mut self, py: Python<'_>) -> PyResult<PyObject> {
        let status = self.inner.parse_buffer().map_err(to_py_err)?;
        status_to_py(py, status)
    }

    /// Parse the buffer into a plain dict
    fn parse_dict(&mut self, py: Python<'_>) -> PyResult<PyObject> {
        let map = self.inner.parse().map_err(to_py_err)?;
        Ok(map_to_dict(py, &map)?.into_py(py))
    }
}

/// Status buffer matched to a telescope schema
///
/// A `dict` of the raw keys, with the schema's named accessors available as
/// attributes.
#[pyclass(unsendable, extends = PyDict)]
struct HashpipeStatusBuffer {
    schema: &'static str,
    accessors: Vec<(&'static str, Value)>,
}

#[pymethods]
impl HashpipeStatusBuffer {
    #[getter]
    fn schema(&self) -> &'static str {
        self.schema
    }

    fn __getattr__(&self, py: Python<'_>, name: &str) -> PyResult<PyObject> {
        match self.accessors.iter().find(|(n, _)| *n == name) {
            Some((_, v)) => value_to_py(py, v),
            None => Err(PyAttributeError::new_err(name.to_string())),
        }
    }
}

#[pymodule]
fn hashpipe_status_keyvalues(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(load_shared_hashpipe_lib, m)?)?;
    m.add_class::<HashpipeStatusSharedMemoryIPC>()?;
    m.add_class::<HashpipeStatusBuffer>()?;
    Ok(())
}
