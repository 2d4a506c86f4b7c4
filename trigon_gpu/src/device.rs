//! The device API surface the core depends on.
//!
//! This mirrors the handful of direct-state-access OpenGL calls the setup sequence needs and
//! nothing more. Handles are opaque ids handed out by the device; the core never does arithmetic on
//! them.

use crate::error::GpuError;
use crate::layout::{AttributeFormat, ScalarType};
use crate::shader::ShaderStage;
use crate::vertex_array::PrimitiveMode;

macro_rules! handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);

            impl $name {
                pub fn id(&self) -> u32 { self.0 }
            }
        )*
    };
}

handle! {
    /// A buffer object in device memory.
    BufferId;
    /// A single compiled stage, before it's linked into a program.
    ShaderId;
    /// A linked program.
    ProgramId;
    /// A vertex array object.
    VertexArrayId;
}

/// Used when attaching debug labels to device objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Buffer,
    Shader,
    Program,
    VertexArray,
}

/// Everything the core needs from a graphics device.
///
/// Implementations must be driven from the thread that owns the device context.
pub trait Device {
    /// Allocates a buffer and uploads `data` into it in one go.
    fn create_buffer(&mut self, data: &[u8]) -> Result<BufferId, GpuError>;
    fn delete_buffer(&mut self, buffer: BufferId);

    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderId, GpuError>;
    fn shader_source(&mut self, shader: ShaderId, source: &str);
    fn compile_shader(&mut self, shader: ShaderId);
    fn compile_status(&mut self, shader: ShaderId) -> bool;
    /// Length of the info log including the terminating nul, or 0 when there is none.
    fn shader_info_log_length(&mut self, shader: ShaderId) -> i32;
    fn shader_info_log(&mut self, shader: ShaderId, length: i32) -> String;
    fn delete_shader(&mut self, shader: ShaderId);

    fn create_program(&mut self) -> Result<ProgramId, GpuError>;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn link_program(&mut self, program: ProgramId);
    fn link_status(&mut self, program: ProgramId) -> bool;
    fn program_info_log_length(&mut self, program: ProgramId) -> i32;
    fn program_info_log(&mut self, program: ProgramId, length: i32) -> String;
    fn delete_program(&mut self, program: ProgramId);

    /// Returns -1 if the program has no active uniform called `name`.
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> i32;
    /// Returns -1 if the program has no active attribute called `name`.
    fn attrib_location(&mut self, program: ProgramId, name: &str) -> i32;

    fn create_vertex_array(&mut self) -> Result<VertexArrayId, GpuError>;
    fn vertex_array_vertex_buffer(
        &mut self,
        vao: VertexArrayId,
        binding: u32,
        buffer: BufferId,
        offset: isize,
        stride: i32,
    );
    fn vertex_array_attrib_format(
        &mut self,
        vao: VertexArrayId,
        location: u32,
        format: AttributeFormat,
        relative_offset: u32,
    );
    fn vertex_array_attrib_binding(&mut self, vao: VertexArrayId, location: u32, binding: u32);
    fn vertex_array_binding_divisor(&mut self, vao: VertexArrayId, binding: u32, divisor: u32);
    fn enable_vertex_array_attrib(&mut self, vao: VertexArrayId, location: u32);
    fn vertex_array_element_buffer(&mut self, vao: VertexArrayId, buffer: BufferId);
    fn delete_vertex_array(&mut self, vao: VertexArrayId);

    fn use_program(&mut self, program: Option<ProgramId>);
    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>);
    fn program_uniform_mat4(&mut self, program: ProgramId, location: i32, value: &[f32; 16]);
    fn draw_elements(&mut self, mode: PrimitiveMode, count: i32, index_type: ScalarType, offset: usize);

    /// Pops the oldest pending error code, 0 when there is none.
    fn get_error(&mut self) -> u32;

    fn object_label(&mut self, kind: ObjectKind, id: u32, label: &str);
}

/// A lost context keeps reporting the same error forever.
const MAX_ERRORS_PER_POLL: usize = 16;

/// Drains pending device errors into `diagnostics`. Returns how many were found.
pub fn poll_device_errors<D: Device + ?Sized>(
    device: &mut D,
    diagnostics: &mut crate::diagnostics::Diagnostics,
) -> usize {
    let mut found = 0;
    while found < MAX_ERRORS_PER_POLL {
        let code = device.get_error();
        if code == 0 {
            break;
        }
        diagnostics.device_error(code);
        found += 1;
    }
    found
}
