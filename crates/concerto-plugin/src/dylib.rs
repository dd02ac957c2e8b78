//! Dynamic-library plugin loader
//!
//! A plugin library exports `concerto_plugin_entry`, returning a pointer to a
//! static [`PluginApi`] table. The host checks the ABI version and the
//! required function pointers before creating an instance.

use crate::error::{LoadStage, PluginLoadError};
use crate::loader::PluginLoader;
use concerto_core::{
    AudioBlock, ParameterInfo, Plugin, PluginDescriptor, PluginError, ProcessError,
};
use concerto_midi::MidiEvent;
use std::ffi::{c_char, c_void, CStr};
use std::path::{Path, PathBuf};

/// ABI revision this host speaks.
pub const CONCERTO_ABI_VERSION: u32 = 1;

/// Symbol every plugin library must export.
pub const ENTRY_SYMBOL: &[u8] = b"concerto_plugin_entry\0";

/// File extensions treated as plugin libraries.
pub const PLUGIN_EXTENSIONS: &[&str] = &["so", "dylib", "dll", "concerto"];

/// Upper bound on channels passed across the ABI.
const MAX_CHANNELS: usize = 32;

#[repr(C)]
pub struct RawPluginInfo {
    pub id: *const c_char,
    pub name: *const c_char,
    pub vendor: *const c_char,
    pub version: *const c_char,
    pub inputs: u32,
    pub outputs: u32,
    pub receives_midi: bool,
    pub latency_samples: u32,
    pub parameter_count: u32,
}

#[repr(C)]
pub struct RawParameterInfo {
    pub id: u32,
    pub name: *const c_char,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct RawMidiEvent {
    pub frame_offset: u32,
    pub data: [u8; 3],
    pub len: u8,
}

pub type EntryFn = unsafe extern "C" fn() -> *const PluginApi;

/// Function table returned by the entry point.
///
/// `deactivate` and `reset` are optional; every other entry is required.
/// `activate` and `process` return 0 on success.
#[repr(C)]
pub struct PluginApi {
    pub abi_version: u32,
    pub info: Option<unsafe extern "C" fn() -> *const RawPluginInfo>,
    pub parameter_info: Option<unsafe extern "C" fn(index: u32, out: *mut RawParameterInfo) -> bool>,
    pub create: Option<unsafe extern "C" fn() -> *mut c_void>,
    pub destroy: Option<unsafe extern "C" fn(instance: *mut c_void)>,
    pub activate:
        Option<unsafe extern "C" fn(instance: *mut c_void, sample_rate: f64, max_frames: u32) -> i32>,
    pub deactivate: Option<unsafe extern "C" fn(instance: *mut c_void)>,
    pub reset: Option<unsafe extern "C" fn(instance: *mut c_void)>,
    #[allow(clippy::type_complexity)]
    pub process: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            inputs: *const *const f32,
            input_channels: u32,
            outputs: *const *mut f32,
            output_channels: u32,
            frames: u32,
            events: *const RawMidiEvent,
            event_count: u32,
        ) -> i32,
    >,
    pub set_parameter: Option<unsafe extern "C" fn(instance: *mut c_void, id: u32, value: f64)>,
}

/// Resolved, non-null function pointers.
#[derive(Clone, Copy)]
struct Vtable {
    destroy: unsafe extern "C" fn(*mut c_void),
    activate: unsafe extern "C" fn(*mut c_void, f64, u32) -> i32,
    deactivate: Option<unsafe extern "C" fn(*mut c_void)>,
    reset: Option<unsafe extern "C" fn(*mut c_void)>,
    #[allow(clippy::type_complexity)]
    process: unsafe extern "C" fn(
        *mut c_void,
        *const *const f32,
        u32,
        *const *mut f32,
        u32,
        u32,
        *const RawMidiEvent,
        u32,
    ) -> i32,
    set_parameter: unsafe extern "C" fn(*mut c_void, u32, f64),
}

/// Loads plugins from shared libraries exporting [`ENTRY_SYMBOL`].
///
/// Loading runs the library's initialisers and entry point in-process.
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

impl DylibLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn is_plugin_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| PLUGIN_EXTENSIONS.contains(&ext))
    }
}

impl PluginLoader for DylibLoader {
    fn name(&self) -> &str {
        "dylib"
    }

    fn can_load(&self, path: &Path) -> bool {
        Self::is_plugin_file(path)
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Plugin>, PluginLoadError> {
        Ok(Box::new(DylibPlugin::load(path)?))
    }
}

fn incompatible(path: &Path, reason: impl Into<String>) -> PluginLoadError {
    PluginLoadError::IncompatibleAbi {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Lossy copy of a possibly-null C string.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn c_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// A plugin instance living in a shared library.
pub struct DylibPlugin {
    instance: *mut c_void,
    vtable: Vtable,
    descriptor: PluginDescriptor,
    path: PathBuf,
    input_ptrs: Vec<*const f32>,
    output_ptrs: Vec<*mut f32>,
    events: Vec<RawMidiEvent>,
    active: bool,
    // Dropped last: the code behind `vtable` lives here.
    _library: Option<libloading::Library>,
}

// SAFETY: the instance pointer is owned exclusively by this value and only
// used through `&mut self`; the host never calls into it from two threads.
unsafe impl Send for DylibPlugin {}

impl DylibPlugin {
    pub fn load(path: &Path) -> Result<Self, PluginLoadError> {
        if !path.exists() {
            return Err(PluginLoadError::FileNotFound(path.to_path_buf()));
        }

        // SAFETY: runs the library's initialisers; trusted by the caller.
        let library = unsafe { libloading::Library::new(path) }
            .map_err(|e| incompatible(path, format!("Failed to open library: {e}")))?;
        Self::from_library(path, library)
    }

    /// Resolves the entry symbol in an already opened library.
    fn from_library(path: &Path, library: libloading::Library) -> Result<Self, PluginLoadError> {
        // SAFETY: symbol type is fixed by the ABI.
        let entry: EntryFn = unsafe { library.get::<EntryFn>(ENTRY_SYMBOL) }
            .map(|symbol| *symbol)
            .map_err(|e| incompatible(path, format!("No concerto_plugin_entry symbol: {e}")))?;

        let api_ptr = unsafe { entry() };
        if api_ptr.is_null() {
            return Err(incompatible(path, "concerto_plugin_entry returned null"));
        }
        // SAFETY: checked non-null; the table is static in the library, which
        // the returned plugin keeps loaded.
        unsafe { Self::from_api(path, &*api_ptr, Some(library)) }
    }

    /// Validates a function table and creates one instance from it.
    ///
    /// # Safety
    /// Every function pointer in `api` must follow the ABI and stay callable
    /// for the life of the returned plugin. `library`, if given, is what keeps
    /// them loaded.
    unsafe fn from_api(
        path: &Path,
        api: &PluginApi,
        library: Option<libloading::Library>,
    ) -> Result<Self, PluginLoadError> {
        if api.abi_version != CONCERTO_ABI_VERSION {
            return Err(incompatible(
                path,
                format!(
                    "ABI version {} (host supports {CONCERTO_ABI_VERSION})",
                    api.abi_version
                ),
            ));
        }

        let missing = |name: &str| incompatible(path, format!("Missing required function `{name}`"));
        let info_fn = api.info.ok_or_else(|| missing("info"))?;
        let create = api.create.ok_or_else(|| missing("create"))?;
        let vtable = Vtable {
            destroy: api.destroy.ok_or_else(|| missing("destroy"))?,
            activate: api.activate.ok_or_else(|| missing("activate"))?,
            deactivate: api.deactivate,
            reset: api.reset,
            process: api.process.ok_or_else(|| missing("process"))?,
            set_parameter: api.set_parameter.ok_or_else(|| missing("set_parameter"))?,
        };

        let info_ptr = info_fn();
        if info_ptr.is_null() {
            return Err(incompatible(path, "info returned null"));
        }
        // Checked non-null; strings are NUL-terminated per the ABI.
        let descriptor = read_descriptor(&*info_ptr, api.parameter_info);

        let instance = create();
        if instance.is_null() {
            return Err(PluginLoadError::InitFailed {
                path: path.to_path_buf(),
                stage: LoadStage::Instantiation,
                reason: "create returned null".to_string(),
            });
        }

        tracing::debug!(
            path = %path.display(),
            id = %descriptor.id,
            parameters = descriptor.parameters.len(),
            "Opened dynamic-library plugin"
        );

        Ok(Self {
            instance,
            vtable,
            descriptor,
            path: path.to_path_buf(),
            input_ptrs: Vec::with_capacity(MAX_CHANNELS),
            output_ptrs: Vec::with_capacity(MAX_CHANNELS),
            events: Vec::new(),
            active: false,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

unsafe fn read_descriptor(
    info: &RawPluginInfo,
    parameter_info: Option<unsafe extern "C" fn(u32, *mut RawParameterInfo) -> bool>,
) -> PluginDescriptor {
    let mut descriptor = PluginDescriptor::new(c_string(info.id), c_string(info.name))
        .vendor(c_string(info.vendor))
        .version(c_string(info.version))
        .audio_io(info.inputs as usize, info.outputs as usize)
        .midi(info.receives_midi)
        .latency(info.latency_samples as usize);

    if let Some(parameter_info) = parameter_info {
        for index in 0..info.parameter_count {
            let mut raw = RawParameterInfo {
                id: 0,
                name: std::ptr::null(),
                min: 0.0,
                max: 1.0,
                default: 0.0,
            };
            if parameter_info(index, &mut raw) {
                descriptor = descriptor.parameter(ParameterInfo::new(
                    raw.id,
                    c_string(raw.name),
                    raw.min,
                    raw.max,
                    raw.default,
                ));
            }
        }
    }
    descriptor
}

impl Plugin for DylibPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn activate(&mut self, sample_rate: f64, max_block_size: usize) -> Result<(), PluginError> {
        let code = unsafe { (self.vtable.activate)(self.instance, sample_rate, max_block_size as u32) };
        if code != 0 {
            return Err(PluginError::Negotiation(format!(
                "{} rejected {sample_rate} Hz / {max_block_size} frames (code {code})",
                self.descriptor.name
            )));
        }
        // Worst case: every queued event lands on this plugin in one block.
        self.events = Vec::with_capacity(concerto_midi::DEFAULT_QUEUE_CAPACITY.max(max_block_size));
        self.active = true;
        Ok(())
    }

    fn process(
        &mut self,
        input: &AudioBlock,
        midi: &[MidiEvent],
        output: &mut AudioBlock,
    ) -> Result<(), ProcessError> {
        if input.channels() > MAX_CHANNELS || output.channels() > MAX_CHANNELS {
            return Err(ProcessError::ChannelMismatch {
                expected: MAX_CHANNELS,
                got: input.channels().max(output.channels()),
            });
        }

        self.input_ptrs.clear();
        self.input_ptrs
            .extend((0..input.channels()).map(|ch| input.channel(ch).as_ptr()));
        self.output_ptrs.clear();
        self.output_ptrs
            .extend(output.channels_mut().map(|plane| plane.as_mut_ptr()));

        self.events.clear();
        for event in midi.iter().take(self.events.capacity()) {
            let (data, len) = event.to_raw();
            if len > 0 {
                self.events.push(RawMidiEvent {
                    frame_offset: event.frame_offset as u32,
                    data,
                    len: len as u8,
                });
            }
        }

        let code = unsafe {
            (self.vtable.process)(
                self.instance,
                self.input_ptrs.as_ptr(),
                self.input_ptrs.len() as u32,
                self.output_ptrs.as_ptr(),
                self.output_ptrs.len() as u32,
                output.frames() as u32,
                self.events.as_ptr(),
                self.events.len() as u32,
            )
        };
        if code == 0 {
            Ok(())
        } else {
            Err(ProcessError::Plugin { code })
        }
    }

    fn set_parameter(&mut self, id: u32, value: f64) {
        unsafe { (self.vtable.set_parameter)(self.instance, id, value) }
    }

    fn deactivate(&mut self) {
        if let (true, Some(deactivate)) = (self.active, self.vtable.deactivate) {
            unsafe { deactivate(self.instance) }
        }
        self.active = false;
    }

    fn reset(&mut self) {
        if let Some(reset) = self.vtable.reset {
            unsafe { reset(self.instance) }
        }
    }
}

impl Drop for DylibPlugin {
    fn drop(&mut self) {
        self.deactivate();
        unsafe { (self.vtable.destroy)(self.instance) }
    }
}
