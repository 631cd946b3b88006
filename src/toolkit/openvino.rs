//! OpenVINO C runtime, loaded dynamically.
//!
//! Only the handful of entry points needed to compile an in-memory IR and run
//! synchronous inference are resolved. Every native object is owned by a
//! [`Handle`] that frees it on drop.

use crate::model::TracedModel;
use crate::toolkit::errors::{ToolkitError, ToolkitResult};
use crate::toolkit::ir::IrWriter;
use crate::toolkit::{CompiledModel, ComputeUnits, NeuralRuntime};
use half::f16;
use libloading::Library;
use log::{debug, info};
use std::ffi::{CStr, CString, c_char, c_void};
use std::ops::RangeInclusive;
use std::ptr;
use std::sync::Arc;

type Status = i32;

const STATUS_OK: Status = 0;

// ov_element_type_e
const ELEMENT_F16: u32 = 4;
const ELEMENT_U8: u32 = 14;

/// Release years whose C headers number `ov_element_type_e` as above.
const SUPPORTED_RELEASES: RangeInclusive<u32> = 2023..=2025;

#[repr(C)]
struct OvVersion {
    build_number: *const c_char,
    _description: *const c_char,
}

#[repr(C)]
struct OvShape {
    rank: i64,
    dims: *mut i64,
}

type FreeFn = unsafe extern "C" fn(*mut c_void);

#[cfg(target_os = "linux")]
const LIBRARY_CANDIDATES: &[&str] = &["libopenvino_c.so", "libopenvino_c.so.2500", "libopenvino_c.so.2400"];
#[cfg(target_os = "macos")]
const LIBRARY_CANDIDATES: &[&str] = &["libopenvino_c.dylib"];
#[cfg(target_os = "windows")]
const LIBRARY_CANDIDATES: &[&str] = &["openvino_c.dll"];
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const LIBRARY_CANDIDATES: &[&str] = &[];

/// Resolved entry points. The library stays loaded as long as this lives.
struct Api {
    core_create: unsafe extern "C" fn(*mut *mut c_void) -> Status,
    core_free: FreeFn,
    read_model_from_memory_buffer: unsafe extern "C" fn(
        *const c_void,
        *const c_char,
        usize,
        *const c_void,
        *mut *mut c_void,
    ) -> Status,
    model_free: FreeFn,
    compile_model: unsafe extern "C" fn(
        *const c_void,
        *const c_void,
        *const c_char,
        usize,
        *mut *mut c_void,
        ...
    ) -> Status,
    compiled_model_free: FreeFn,
    create_infer_request: unsafe extern "C" fn(*const c_void, *mut *mut c_void) -> Status,
    infer_request_free: FreeFn,
    tensor_create_from_host_ptr:
        unsafe extern "C" fn(u32, OvShape, *mut c_void, *mut *mut c_void) -> Status,
    tensor_free: FreeFn,
    set_input_tensor: unsafe extern "C" fn(*mut c_void, *const c_void) -> Status,
    infer: unsafe extern "C" fn(*mut c_void) -> Status,
    get_version: unsafe extern "C" fn(*mut OvVersion) -> Status,
    version_free: unsafe extern "C" fn(*mut OvVersion),
    last_err_msg: Option<unsafe extern "C" fn() -> *const c_char>,
    _library: Library,
}

unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> ToolkitResult<T> {
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }.map_err(|source| {
        ToolkitError::MissingSymbol {
            symbol: name.to_string(),
            source,
        }
    })?;
    Ok(*symbol)
}

impl Api {
    fn open(library_override: Option<&str>) -> ToolkitResult<Self> {
        let candidates: Vec<&str> = match library_override {
            Some(path) => vec![path],
            None => LIBRARY_CANDIDATES.to_vec(),
        };

        let mut last_error = None;
        for candidate in &candidates {
            // SAFETY: loading runs the library's initializers; OpenVINO's are
            // safe to run on any thread.
            match unsafe { Library::new(*candidate) } {
                Ok(library) => {
                    debug!("Loaded neural toolkit library '{}'", candidate);
                    return Self::resolve(library);
                }
                Err(source) => {
                    debug!("Could not load '{}': {}", candidate, source);
                    last_error = Some((candidate.to_string(), source));
                }
            }
        }

        match (library_override, last_error) {
            (Some(_), Some((path, source))) => Err(ToolkitError::LibraryLoad { path, source }),
            _ => Err(ToolkitError::LibraryNotFound {
                tried: candidates.join(", "),
            }),
        }
    }

    fn resolve(library: Library) -> ToolkitResult<Self> {
        // SAFETY: each type below mirrors the C prototype of the named symbol.
        unsafe {
            Ok(Self {
                core_create: symbol(&library, "ov_core_create")?,
                core_free: symbol(&library, "ov_core_free")?,
                read_model_from_memory_buffer: symbol(
                    &library,
                    "ov_core_read_model_from_memory_buffer",
                )?,
                model_free: symbol(&library, "ov_model_free")?,
                compile_model: symbol(&library, "ov_core_compile_model")?,
                compiled_model_free: symbol(&library, "ov_compiled_model_free")?,
                create_infer_request: symbol(
                    &library,
                    "ov_compiled_model_create_infer_request",
                )?,
                infer_request_free: symbol(&library, "ov_infer_request_free")?,
                tensor_create_from_host_ptr: symbol(&library, "ov_tensor_create_from_host_ptr")?,
                tensor_free: symbol(&library, "ov_tensor_free")?,
                set_input_tensor: symbol(&library, "ov_infer_request_set_input_tensor")?,
                infer: symbol(&library, "ov_infer_request_infer")?,
                get_version: symbol(&library, "ov_get_openvino_version")?,
                version_free: symbol(&library, "ov_version_free")?,
                last_err_msg: symbol(&library, "ov_get_last_err_msg").ok(),
                _library: library,
            })
        }
    }

    /// Build number of the loaded library, e.g. `2024.4.0-16579-c3152d32c9c`.
    fn build_number(&self) -> ToolkitResult<String> {
        let mut version = OvVersion {
            build_number: ptr::null(),
            _description: ptr::null(),
        };
        let status = unsafe { (self.get_version)(&mut version) };
        self.check("ov_get_openvino_version", status)?;
        let build = if version.build_number.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(version.build_number) }
                .to_string_lossy()
                .into_owned()
        };
        unsafe { (self.version_free)(&mut version) };
        Ok(build)
    }

    fn check(&self, function: &'static str, status: Status) -> ToolkitResult<()> {
        if status == STATUS_OK {
            return Ok(());
        }
        let message = self
            .last_err_msg
            .map(|f| unsafe { f() })
            .filter(|msg| !msg.is_null())
            .map(|msg| unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned())
            .unwrap_or_default();
        Err(ToolkitError::CallFailed {
            function,
            status,
            message,
        })
    }
}

fn release_year(build_number: &str) -> Option<u32> {
    let (year, _) = build_number.split_once('.')?;
    year.parse().ok()
}

/// Refuses releases whose element-type numbering has not been mapped.
fn check_release(build_number: &str) -> ToolkitResult<()> {
    match release_year(build_number) {
        Some(year) if SUPPORTED_RELEASES.contains(&year) => Ok(()),
        _ => Err(ToolkitError::UnsupportedVersion {
            version: build_number.to_string(),
        }),
    }
}

/// Wraps a host buffer in a tensor without copying it.
///
/// The buffer must outlive the returned handle.
fn host_tensor(api: &Arc<Api>, element: u32, dims: &[usize], data: *mut c_void) -> ToolkitResult<Handle> {
    let mut dims: Vec<i64> = dims.iter().map(|&d| d as i64).collect();
    let shape = OvShape {
        rank: dims.len() as i64,
        dims: dims.as_mut_ptr(),
    };
    let mut tensor = ptr::null_mut();
    let status = unsafe { (api.tensor_create_from_host_ptr)(element, shape, data, &mut tensor) };
    api.check("ov_tensor_create_from_host_ptr", status)?;
    Ok(Handle::new(api, tensor, api.tensor_free))
}

/// Owned native object; freed with its matching `*_free` function.
struct Handle {
    ptr: *mut c_void,
    free: FreeFn,
    // Keeps the library mapped until the object is freed.
    _api: Arc<Api>,
}

impl Handle {
    fn new(api: &Arc<Api>, ptr: *mut c_void, free: FreeFn) -> Self {
        Self {
            ptr,
            free,
            _api: Arc::clone(api),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { (self.free)(self.ptr) };
        }
    }
}

// SAFETY: OpenVINO cores and compiled models are thread-safe; infer requests
// and tensors are only touched through `&mut` on the owning model.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

pub struct OpenVinoRuntime {
    core: Handle,
    api: Arc<Api>,
}

impl OpenVinoRuntime {
    /// Loads the runtime from `library_override`, or from the platform's
    /// default library names.
    pub fn load(library_override: Option<&str>) -> ToolkitResult<Self> {
        let api = Arc::new(Api::open(library_override)?);
        let build = api.build_number()?;
        check_release(&build)?;
        info!("Neural toolkit is OpenVINO {}", build);

        let mut core = ptr::null_mut();
        api.check("ov_core_create", unsafe { (api.core_create)(&mut core) })?;
        let core = Handle::new(&api, core, api.core_free);
        Ok(Self { core, api })
    }
}

impl NeuralRuntime for OpenVinoRuntime {
    fn name(&self) -> &str {
        "OpenVINO"
    }

    fn compile(
        &self,
        model: &TracedModel,
        units: ComputeUnits,
    ) -> ToolkitResult<Box<dyn CompiledModel>> {
        let api = &self.api;
        let package = IrWriter::new(model).serialize()?;
        debug!(
            "Serialized graph: {} bytes of XML, {} bytes of weights",
            package.xml.len(),
            package.weights.len()
        );

        let mut weights = package.weights;
        let weights_tensor = host_tensor(
            api,
            ELEMENT_U8,
            &[weights.len()],
            weights.as_mut_ptr().cast(),
        )?;

        let mut graph = ptr::null_mut();
        let status = unsafe {
            (api.read_model_from_memory_buffer)(
                self.core.ptr,
                package.xml.as_ptr().cast(),
                package.xml.len(),
                weights_tensor.ptr,
                &mut graph,
            )
        };
        api.check("ov_core_read_model_from_memory_buffer", status)?;
        let graph = Handle::new(api, graph, api.model_free);

        let device = CString::new(units.device_name()).map_err(|e| ToolkitError::InvalidModel {
            message: e.to_string(),
        })?;
        let mut compiled = ptr::null_mut();
        let status = unsafe {
            (api.compile_model)(self.core.ptr, graph.ptr, device.as_ptr(), 0, &mut compiled)
        };
        api.check("ov_core_compile_model", status)?;
        let compiled = Handle::new(api, compiled, api.compiled_model_free);

        let mut request = ptr::null_mut();
        let status = unsafe { (api.create_infer_request)(compiled.ptr, &mut request) };
        api.check("ov_compiled_model_create_infer_request", status)?;
        let request = Handle::new(api, request, api.infer_request_free);

        let shape = model.spec.input_shape();
        let mut input = vec![f16::ZERO; model.spec.input_len()];
        let input_tensor = host_tensor(api, ELEMENT_F16, &shape, input.as_mut_ptr().cast())?;
        let status = unsafe { (api.set_input_tensor)(request.ptr, input_tensor.ptr) };
        api.check("ov_infer_request_set_input_tensor", status)?;

        info!("Compiled model for {}", units.device_name());

        Ok(Box::new(OpenVinoModel {
            _input_tensor: input_tensor,
            request,
            _compiled: compiled,
            _graph: graph,
            _weights_tensor: weights_tensor,
            input,
            _weights: weights,
            device: units.device_name().to_string(),
            api: Arc::clone(api),
        }))
    }
}

/// Compiled model with its infer request and resident input.
///
/// Fields drop in declaration order: native objects first, then the host
/// buffers they point into.
struct OpenVinoModel {
    _input_tensor: Handle,
    request: Handle,
    _compiled: Handle,
    _graph: Handle,
    _weights_tensor: Handle,
    input: Vec<f16>,
    _weights: Vec<u8>,
    device: String,
    api: Arc<Api>,
}

impl CompiledModel for OpenVinoModel {
    fn device(&self) -> &str {
        &self.device
    }

    fn input_len(&self) -> usize {
        self.input.len()
    }

    fn set_input(&mut self, input: &[f16]) -> ToolkitResult<()> {
        if input.len() != self.input.len() {
            return Err(ToolkitError::InputSizeMismatch {
                expected: self.input.len(),
                actual: input.len(),
            });
        }
        // The input tensor aliases `self.input`.
        self.input.copy_from_slice(input);
        Ok(())
    }

    fn infer(&mut self) -> ToolkitResult<()> {
        let status = unsafe { (self.api.infer)(self.request.ptr) };
        self.api.check("ov_infer_request_infer", status)
    }
}
