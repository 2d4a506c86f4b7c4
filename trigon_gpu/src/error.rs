use std::path::PathBuf;

use thiserror::Error;

use crate::shader::ShaderStage;

/// Everything that can go wrong while creating GPU resources.
///
/// Unused uniforms and attributes are not errors; they end up in
/// [`Diagnostics`](crate::diagnostics::Diagnostics) instead.
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("could not read shader source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compilation of {stage} shader {filename} failed:\n{log}")]
    Compile {
        stage: ShaderStage,
        filename: String,
        log: String,
    },

    #[error("linking program {program} failed:\n{log}")]
    Link { program: String, log: String },

    #[error("device allocation failed: {0}")]
    Resource(String),

    #[error("{label} is already initialized")]
    AlreadyInitialized { label: String },

    #[error("{what} has not been initialized")]
    Uninitialized { what: String },

    #[error("{label} has been destroyed")]
    Destroyed { label: String },

    #[error("attribute {name} is fed by more than one input")]
    DuplicateInput { name: String },

    #[error("vertex array was configured for program {configured:?}, not {given:?}")]
    ForeignProgram {
        configured: crate::device::ProgramId,
        given: crate::device::ProgramId,
    },

    #[error("vertex array is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: crate::vertex_array::VertexArrayState,
        actual: crate::vertex_array::VertexArrayState,
    },
}

impl GpuError {
    /// Whether the error should stop the program. Shader sources don't change at runtime, so a
    /// failed compile or link is never retried.
    pub fn is_fatal(&self) -> bool {
        match self {
            GpuError::Io { .. } | GpuError::Compile { .. } | GpuError::Link { .. } => true,
            GpuError::Resource(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compile_error_names_stage_and_file() {
        let err = GpuError::Compile {
            stage: ShaderStage::Fragment,
            filename: "hello_triangle.frag".to_string(),
            log: "0:3(1): error: syntax error".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.starts_with("compilation of fragment shader hello_triangle.frag failed"));
        assert!(msg.ends_with("syntax error"));
        assert!(err.is_fatal());
    }

    #[test]
    fn misuse_is_not_fatal() {
        let err = GpuError::ForeignProgram {
            configured: crate::device::ProgramId(3),
            given: crate::device::ProgramId(7),
        };
        assert_eq!(err.to_string(), "vertex array was configured for program ProgramId(3), not ProgramId(7)");
        assert!(!err.is_fatal());
        assert!(!GpuError::Destroyed { label: "colors".to_string() }.is_fatal());
        assert!(!GpuError::DuplicateInput { name: "a_color".to_string() }.is_fatal());
    }

    #[test]
    fn double_init_is_not_fatal() {
        let err = GpuError::AlreadyInitialized { label: "vertices".to_string() };
        assert_eq!(err.to_string(), "vertices is already initialized");
        assert!(!err.is_fatal());
    }
}
