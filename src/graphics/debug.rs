//! Forwards `GL_KHR_debug` output to the logger.

use gl;
use gl::types::{GLchar, GLenum, GLsizei, GLuint};

use gpu::{Diagnostic, DiagnosticKind, Severity};

use std::ffi::c_void;
use std::ptr::null;
use std::slice;

/// Starts routing driver messages to the logger. Needs a context created with the debug flag.
pub fn install() {
    unsafe {
        gl::Enable(gl::DEBUG_OUTPUT);
        gl::Enable(gl::DEBUG_OUTPUT_SYNCHRONOUS);
        gl::DebugMessageCallback(Some(on_message), null());
    }
}

pub fn source_name(source: GLenum) -> &'static str {
    match source {
        gl::DEBUG_SOURCE_API => "api",
        gl::DEBUG_SOURCE_WINDOW_SYSTEM => "window system",
        gl::DEBUG_SOURCE_SHADER_COMPILER => "shader compiler",
        gl::DEBUG_SOURCE_THIRD_PARTY => "third party",
        gl::DEBUG_SOURCE_APPLICATION => "application",
        _ => "other",
    }
}

pub fn type_name(kind: GLenum) -> &'static str {
    match kind {
        gl::DEBUG_TYPE_ERROR => "error",
        gl::DEBUG_TYPE_DEPRECATED_BEHAVIOR => "deprecated behavior",
        gl::DEBUG_TYPE_UNDEFINED_BEHAVIOR => "undefined behavior",
        gl::DEBUG_TYPE_PORTABILITY => "portability",
        gl::DEBUG_TYPE_PERFORMANCE => "performance",
        gl::DEBUG_TYPE_MARKER => "marker",
        gl::DEBUG_TYPE_PUSH_GROUP => "push group",
        gl::DEBUG_TYPE_POP_GROUP => "pop group",
        _ => "other",
    }
}

/// `None` for notifications, which are too chatty to log.
pub fn severity(severity: GLenum) -> Option<Severity> {
    match severity {
        gl::DEBUG_SEVERITY_HIGH => Some(Severity::Error),
        gl::DEBUG_SEVERITY_MEDIUM | gl::DEBUG_SEVERITY_LOW => Some(Severity::Warning),
        gl::DEBUG_SEVERITY_NOTIFICATION => None,
        _ => Some(Severity::Notice),
    }
}

pub fn decode(source: GLenum, kind: GLenum, id: GLuint, level: GLenum, text: &str) -> Option<Diagnostic> {
    let severity = severity(level)?;
    Some(Diagnostic {
        severity,
        kind: DiagnosticKind::DriverMessage { id },
        message: format!("[{} {} {:#x}] {}", source_name(source), type_name(kind), id, text.trim_end()),
    })
}

extern "system" fn on_message(
    source: GLenum,
    kind: GLenum,
    id: GLuint,
    level: GLenum,
    length: GLsizei,
    message: *const GLchar,
    _user: *mut c_void,
) {
    if message.is_null() || length < 0 {
        return;
    }

    let bytes = unsafe { slice::from_raw_parts(message as *const u8, length as usize) };
    let text = String::from_utf8_lossy(bytes);

    if let Some(diagnostic) = decode(source, kind, id, level, &text) {
        log::log!(target: "gl", diagnostic.severity.level(), "{}", diagnostic.message);
    }
}
