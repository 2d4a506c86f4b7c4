//! Typed GPU resources and the setup sequence needed to draw with them.
//!
//! Nothing in here talks to a windowing system or loads GL function pointers. Every device call
//! goes through the [`Device`](device::Device) trait, so the same buffers, programs and vertex
//! arrays can be driven by a real OpenGL context or by the recording
//! [`HeadlessDevice`](headless::HeadlessDevice).
//!
//! The order matters and is always the same: compile and link a program, resolve the locations it
//! exposes, upload the buffers, then wire the buffers to those locations in a vertex array that is
//! built once and reused every frame.

#[macro_use] extern crate lazy_static;

pub mod error;
pub mod diagnostics;
pub mod device;
pub mod layout;
pub mod buffer;
pub mod source;
pub mod shader;
pub mod program;
pub mod vertex_array;
pub mod registry;
pub mod triangle;
pub mod headless;

pub use buffer::GpuBuffer;
pub use device::Device;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::GpuError;
pub use layout::{AttributeFormat, IndexElement, Rgba8, ScalarType, VertexAttrib};
pub use program::{CompiledProgram, Location, ProgramDescriptor};
pub use shader::{ShaderHandle, ShaderStage};
pub use source::{FileSystemStore, MemoryStore, SourceStore};
pub use vertex_array::{DrawScope, PrimitiveMode, VertexArray, VertexArrayState, VertexInput};
