use std::cell::Cell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use crate::device::{Device, ObjectKind, ShaderId};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Severity};
use crate::error::GpuError;
use crate::source::SourceStore;

/// Reported in place of the compiler's log when the device has nothing to say.
pub const NO_DIAGNOSTIC: &str = "no diagnostic available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// A compiled shader stage with an explicit reference count.
///
/// The handle returned by [`compile_shader`] holds one reference. Attaching the stage to a program
/// takes another one ([`ShaderHandle::retain`]), and every holder gives its reference back with
/// [`ShaderHandle::release`]. The device object is deleted when the last reference is released, so
/// the caller can drop its handle right after attaching and the program keeps the stage alive.
///
/// Not `Clone`; every copy has to go through `retain`.
#[derive(Debug)]
pub struct ShaderHandle {
    id: ShaderId,
    stage: ShaderStage,
    filename: Rc<str>,
    refs: Rc<Cell<u32>>,
}

impl ShaderHandle {
    pub fn id(&self) -> ShaderId { self.id }
    pub fn stage(&self) -> ShaderStage { self.stage }
    pub fn filename(&self) -> &str { &self.filename }
    pub fn ref_count(&self) -> u32 { self.refs.get() }

    /// Takes another reference to the same stage.
    pub fn retain(&self) -> ShaderHandle {
        self.refs.set(self.refs.get() + 1);
        ShaderHandle {
            id: self.id,
            stage: self.stage,
            filename: Rc::clone(&self.filename),
            refs: Rc::clone(&self.refs),
        }
    }

    /// Gives this reference back. Returns `true` if that was the last one and the device object
    /// was deleted.
    pub fn release<D: Device + ?Sized>(self, device: &mut D) -> bool {
        let remaining = self.refs.get().saturating_sub(1);
        self.refs.set(remaining);

        if remaining == 0 {
            device.delete_shader(self.id);
            log::trace!("deleted {} shader {}", self.stage, self.filename);
            true
        } else {
            false
        }
    }
}

/// Turns an info log query into text. `length` is what the device reported before fetching.
pub(crate) fn read_info_log(length: i32, fetch: impl FnOnce(i32) -> String) -> String {
    if length <= 0 {
        return NO_DIAGNOSTIC.to_string();
    }

    let log = fetch(length);
    let log = log.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
    if log.is_empty() {
        NO_DIAGNOSTIC.to_string()
    } else {
        log.to_string()
    }
}

/// Compiles one stage from source text.
///
/// On failure the stage object is deleted again and the compiler log ends up both in the returned
/// error and in `diagnostics`.
pub fn compile_shader<D: Device + ?Sized>(
    device: &mut D,
    stage: ShaderStage,
    filename: &str,
    source: &str,
    diagnostics: &mut Diagnostics,
) -> Result<ShaderHandle, GpuError> {
    let id = device.create_shader(stage)?;
    device.shader_source(id, source);
    device.compile_shader(id);

    if !device.compile_status(id) {
        let length = device.shader_info_log_length(id);
        let log = read_info_log(length, |len| device.shader_info_log(id, len));
        device.delete_shader(id);

        diagnostics.emit(
            Severity::Error,
            DiagnosticKind::CompileFailure { filename: filename.to_string() },
            format!("compilation failed: {}\n{}", filename, log),
        );
        return Err(GpuError::Compile { stage, filename: filename.to_string(), log });
    }

    device.object_label(ObjectKind::Shader, id.id(), filename);
    log::debug!("compiled {} shader {}", stage, filename);

    Ok(ShaderHandle {
        id,
        stage,
        filename: Rc::from(filename),
        refs: Rc::new(Cell::new(1)),
    })
}

/// Reads `path` from `store` and compiles it. A missing file fails before the device is touched.
pub fn load_shader<D: Device + ?Sized, S: SourceStore + ?Sized>(
    device: &mut D,
    store: &S,
    stage: ShaderStage,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<ShaderHandle, GpuError> {
    let source = store.read_text(path)?;
    compile_shader(device, stage, &path.display().to_string(), &source, diagnostics)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::headless::{Call, HeadlessDevice};
    use crate::source::MemoryStore;

    const VERT: &str = "in vec4 a_vertex;\nvoid main() { gl_Position = a_vertex; }\n";

    #[test]
    fn compiles_and_labels() {
        let mut device = HeadlessDevice::new();
        let mut diagnostics = Diagnostics::new();

        let shader =
            compile_shader(&mut device, ShaderStage::Vertex, "t.vert", VERT, &mut diagnostics).unwrap();

        assert_eq!(shader.ref_count(), 1);
        assert_eq!(device.label_of(shader.id().id()), Some("t.vert"));
        assert!(diagnostics.entries().is_empty());
    }

    #[test]
    fn failure_carries_the_compiler_log() {
        let mut device = HeadlessDevice::new();
        let mut diagnostics = Diagnostics::new();
        device.fail_next_compile(Some("0:1(1): error: syntax error, unexpected IDENTIFIER"));

        let err = compile_shader(&mut device, ShaderStage::Fragment, "t.frag", "garbage", &mut diagnostics)
            .unwrap_err();

        match err {
            GpuError::Compile { stage, filename, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert_eq!(filename, "t.frag");
                assert_eq!(log, "0:1(1): error: syntax error, unexpected IDENTIFIER");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(diagnostics.has_errors());
        assert_eq!(device.live_shaders(), 0);
    }

    #[test]
    fn empty_log_becomes_sentinel() {
        let mut device = HeadlessDevice::new();
        let mut diagnostics = Diagnostics::new();
        device.fail_next_compile(None);

        let err = compile_shader(&mut device, ShaderStage::Vertex, "t.vert", VERT, &mut diagnostics)
            .unwrap_err();

        assert!(matches!(err, GpuError::Compile { ref log, .. } if log == NO_DIAGNOSTIC));
        // The log itself is never fetched when the device reports no length.
        assert_eq!(device.count_calls(|c| matches!(c, Call::ShaderInfoLog { .. })), 0);
    }

    #[test]
    fn info_log_length_rules() {
        assert_eq!(read_info_log(0, |_| unreachable!()), NO_DIAGNOSTIC);
        assert_eq!(read_info_log(-1, |_| unreachable!()), NO_DIAGNOSTIC);
        assert_eq!(read_info_log(6, |_| "oops\n\0".to_string()), "oops");
        assert_eq!(read_info_log(1, |_| "\0".to_string()), NO_DIAGNOSTIC);
    }

    #[test]
    fn missing_source_fails_before_device_calls() {
        let mut device = HeadlessDevice::new();
        let mut diagnostics = Diagnostics::new();
        let store = MemoryStore::new();

        let err = load_shader(
            &mut device,
            &store,
            ShaderStage::Vertex,
            Path::new("nope.vert"),
            &mut diagnostics,
        )
        .unwrap_err();

        assert!(matches!(err, GpuError::Io { .. }));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn stage_is_deleted_at_zero_references() {
        let mut device = HeadlessDevice::new();
        let mut diagnostics = Diagnostics::new();
        let shader =
            compile_shader(&mut device, ShaderStage::Vertex, "t.vert", VERT, &mut diagnostics).unwrap();

        let held = shader.retain();
        assert_eq!(held.ref_count(), 2);

        assert!(!shader.release(&mut device));
        assert_eq!(device.live_shaders(), 1);
        assert!(held.release(&mut device));
        assert_eq!(device.live_shaders(), 0);
    }
}
