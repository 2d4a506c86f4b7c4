use gl;
use gl::types::{GLchar, GLint, GLsizei, GLuint};

use gpu::device::{BufferId, Device, ObjectKind, ProgramId, ShaderId, VertexArrayId};
use gpu::{AttributeFormat, GpuError, PrimitiveMode, ScalarType, ShaderStage};

use std::ffi::c_void;
use std::marker::PhantomData;

use super::utils::*;

/// An OpenGL 4.5 context, driven through direct state access.
///
/// Only usable on the thread where the context is current.
pub struct GlDevice {
    _context: PhantomData<*const ()>,
}

impl GlDevice {
    /// Loads the GL entry points through `loader`. The context they belong to must already be
    /// current on this thread.
    pub fn load_with<F>(loader: F) -> Self
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(loader);
        Self { _context: PhantomData }
    }

    pub fn viewport(&mut self, width: u32, height: u32) {
        unsafe { gl::Viewport(0, 0, width as GLsizei, height as GLsizei) }
    }

    pub fn clear(&mut self, [r, g, b, a]: [f32; 4]) {
        unsafe {
            gl::ClearColor(r, g, b, a);
            gl::Clear(gl::COLOR_BUFFER_BIT);
        }
    }

    fn allocation_failed(what: &str) -> GpuError {
        GpuError::Resource(format!("the driver returned no name for a new {}", what))
    }
}

impl Device for GlDevice {
    fn create_buffer(&mut self, data: &[u8]) -> Result<BufferId, GpuError> {
        let mut id: GLuint = 0;
        let mut size: GLint = 0;
        unsafe {
            gl::CreateBuffers(1, &mut id);
            if id == 0 {
                return Err(Self::allocation_failed("buffer"));
            }

            gl::NamedBufferData(
                id,
                data.len() as isize,
                data.as_ptr() as *const c_void,
                gl::STATIC_DRAW,
            );
            gl::GetNamedBufferParameteriv(id, gl::BUFFER_SIZE, &mut size);
        }

        if size as usize != data.len() {
            unsafe { gl::DeleteBuffers(1, &id) };
            return Err(GpuError::Resource(format!(
                "could not allocate {} bytes of buffer storage",
                data.len()
            )));
        }

        Ok(BufferId(id))
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        unsafe { gl::DeleteBuffers(1, &buffer.0) }
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderId, GpuError> {
        let id = unsafe { gl::CreateShader(shader_stage_enum(stage)) };
        if id == 0 {
            return Err(Self::allocation_failed("shader"));
        }
        Ok(ShaderId(id))
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) {
        let ptr = source.as_ptr() as *const GLchar;
        let len = source.len() as GLint;
        unsafe { gl::ShaderSource(shader.0, 1, &ptr, &len) }
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        unsafe { gl::CompileShader(shader.0) }
    }

    fn compile_status(&mut self, shader: ShaderId) -> bool {
        let mut success: GLint = 0;
        unsafe { gl::GetShaderiv(shader.0, gl::COMPILE_STATUS, &mut success) };
        success != 0
    }

    fn shader_info_log_length(&mut self, shader: ShaderId) -> i32 {
        let mut len: GLint = 0;
        unsafe { gl::GetShaderiv(shader.0, gl::INFO_LOG_LENGTH, &mut len) };
        len
    }

    fn shader_info_log(&mut self, shader: ShaderId, length: i32) -> String {
        let mut buf = info_log_buffer_with_len(length);
        let mut written: GLsizei = 0;
        unsafe {
            gl::GetShaderInfoLog(
                shader.0,
                buf.len() as GLsizei,
                &mut written,
                buf.as_mut_ptr() as *mut GLchar,
            );
        }
        info_log_from_buffer(buf, written)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        unsafe { gl::DeleteShader(shader.0) }
    }

    fn create_program(&mut self) -> Result<ProgramId, GpuError> {
        let id = unsafe { gl::CreateProgram() };
        if id == 0 {
            return Err(Self::allocation_failed("program"));
        }
        Ok(ProgramId(id))
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        unsafe { gl::AttachShader(program.0, shader.0) }
    }

    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        unsafe { gl::DetachShader(program.0, shader.0) }
    }

    fn link_program(&mut self, program: ProgramId) {
        unsafe { gl::LinkProgram(program.0) }
    }

    fn link_status(&mut self, program: ProgramId) -> bool {
        let mut success: GLint = 0;
        unsafe { gl::GetProgramiv(program.0, gl::LINK_STATUS, &mut success) };
        success != 0
    }

    fn program_info_log_length(&mut self, program: ProgramId) -> i32 {
        let mut len: GLint = 0;
        unsafe { gl::GetProgramiv(program.0, gl::INFO_LOG_LENGTH, &mut len) };
        len
    }

    fn program_info_log(&mut self, program: ProgramId, length: i32) -> String {
        let mut buf = info_log_buffer_with_len(length);
        let mut written: GLsizei = 0;
        unsafe {
            gl::GetProgramInfoLog(
                program.0,
                buf.len() as GLsizei,
                &mut written,
                buf.as_mut_ptr() as *mut GLchar,
            );
        }
        info_log_from_buffer(buf, written)
    }

    fn delete_program(&mut self, program: ProgramId) {
        unsafe { gl::DeleteProgram(program.0) }
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> i32 {
        match c_name(name) {
            Some(name) => unsafe { gl::GetUniformLocation(program.0, name.as_ptr()) },
            None => -1,
        }
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> i32 {
        match c_name(name) {
            Some(name) => unsafe { gl::GetAttribLocation(program.0, name.as_ptr()) },
            None => -1,
        }
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayId, GpuError> {
        let mut id: GLuint = 0;
        unsafe { gl::CreateVertexArrays(1, &mut id) };
        if id == 0 {
            return Err(Self::allocation_failed("vertex array"));
        }
        Ok(VertexArrayId(id))
    }

    fn vertex_array_vertex_buffer(
        &mut self,
        vao: VertexArrayId,
        binding: u32,
        buffer: BufferId,
        offset: isize,
        stride: i32,
    ) {
        unsafe { gl::VertexArrayVertexBuffer(vao.0, binding, buffer.0, offset, stride) }
    }

    fn vertex_array_attrib_format(
        &mut self,
        vao: VertexArrayId,
        location: u32,
        format: AttributeFormat,
        relative_offset: u32,
    ) {
        let kind = scalar_type_enum(format.scalar);
        unsafe {
            match format.scalar {
                ScalarType::Double => {
                    gl::VertexArrayAttribLFormat(vao.0, location, format.components, kind, relative_offset)
                }
                // Unnormalized integers stay integers in the shader.
                s if s.is_integer() && !format.normalized => {
                    gl::VertexArrayAttribIFormat(vao.0, location, format.components, kind, relative_offset)
                }
                _ => gl::VertexArrayAttribFormat(
                    vao.0,
                    location,
                    format.components,
                    kind,
                    format.normalized as u8,
                    relative_offset,
                ),
            }
        }
    }

    fn vertex_array_attrib_binding(&mut self, vao: VertexArrayId, location: u32, binding: u32) {
        unsafe { gl::VertexArrayAttribBinding(vao.0, location, binding) }
    }

    fn vertex_array_binding_divisor(&mut self, vao: VertexArrayId, binding: u32, divisor: u32) {
        unsafe { gl::VertexArrayBindingDivisor(vao.0, binding, divisor) }
    }

    fn enable_vertex_array_attrib(&mut self, vao: VertexArrayId, location: u32) {
        unsafe { gl::EnableVertexArrayAttrib(vao.0, location) }
    }

    fn vertex_array_element_buffer(&mut self, vao: VertexArrayId, buffer: BufferId) {
        unsafe { gl::VertexArrayElementBuffer(vao.0, buffer.0) }
    }

    fn delete_vertex_array(&mut self, vao: VertexArrayId) {
        unsafe { gl::DeleteVertexArrays(1, &vao.0) }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        unsafe { gl::UseProgram(program.map_or(0, |p| p.0)) }
    }

    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        unsafe { gl::BindVertexArray(vao.map_or(0, |v| v.0)) }
    }

    fn program_uniform_mat4(&mut self, program: ProgramId, location: i32, value: &[f32; 16]) {
        unsafe { gl::ProgramUniformMatrix4fv(program.0, location, 1, gl::FALSE, value.as_ptr()) }
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: i32, index_type: ScalarType, offset: usize) {
        unsafe {
            gl::DrawElements(
                primitive_mode_enum(mode),
                count,
                scalar_type_enum(index_type),
                offset as *const c_void,
            )
        }
    }

    fn get_error(&mut self) -> u32 {
        unsafe { gl::GetError() }
    }

    fn object_label(&mut self, kind: ObjectKind, id: u32, label: &str) {
        unsafe {
            gl::ObjectLabel(
                object_kind_enum(kind),
                id,
                label.len() as GLsizei,
                label.as_ptr() as *const GLchar,
            )
        }
    }
}

