// NB: the GL types are all aliases for Rust primitives, so only the enums get named here
use gl;
use gl::types::GLenum;

use gpu::device::ObjectKind;
use gpu::{PrimitiveMode, ScalarType, ShaderStage};

use std::ffi::CString;

pub fn scalar_type_enum(scalar: ScalarType) -> GLenum {
    match scalar {
        ScalarType::Byte => gl::BYTE,
        ScalarType::UnsignedByte => gl::UNSIGNED_BYTE,
        ScalarType::Short => gl::SHORT,
        ScalarType::UnsignedShort => gl::UNSIGNED_SHORT,
        ScalarType::Int => gl::INT,
        ScalarType::UnsignedInt => gl::UNSIGNED_INT,
        ScalarType::Float => gl::FLOAT,
        ScalarType::Double => gl::DOUBLE,
    }
}

pub fn primitive_mode_enum(mode: PrimitiveMode) -> GLenum {
    match mode {
        PrimitiveMode::Points => gl::POINTS,
        PrimitiveMode::Lines => gl::LINES,
        PrimitiveMode::LineStrip => gl::LINE_STRIP,
        PrimitiveMode::Triangles => gl::TRIANGLES,
        PrimitiveMode::TriangleStrip => gl::TRIANGLE_STRIP,
        PrimitiveMode::TriangleFan => gl::TRIANGLE_FAN,
    }
}

pub fn shader_stage_enum(stage: ShaderStage) -> GLenum {
    match stage {
        ShaderStage::Vertex => gl::VERTEX_SHADER,
        ShaderStage::Fragment => gl::FRAGMENT_SHADER,
    }
}

/// Identifier namespace for `glObjectLabel`.
pub fn object_kind_enum(kind: ObjectKind) -> GLenum {
    match kind {
        ObjectKind::Buffer => gl::BUFFER,
        ObjectKind::Shader => gl::SHADER,
        ObjectKind::Program => gl::PROGRAM,
        ObjectKind::VertexArray => gl::VERTEX_ARRAY,
    }
}

/// A zeroed buffer big enough for an info log of `len` bytes, nul included.
pub fn info_log_buffer_with_len(len: i32) -> Vec<u8> {
    vec![0u8; len.max(1) as usize]
}

/// Turns what the driver wrote into `buf` into a string, dropping the terminating nul.
pub fn info_log_from_buffer(mut buf: Vec<u8>, written: i32) -> String {
    buf.truncate(written.max(0) as usize);
    if let Some(nul) = buf.iter().position(|&b| b == 0) {
        buf.truncate(nul);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Names with interior nuls can't exist in a shader, so they have no location.
pub fn c_name(name: &str) -> Option<CString> {
    CString::new(name).ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn index_types_match_the_gl_enums() {
        assert_eq!(scalar_type_enum(ScalarType::UnsignedByte), 0x1401);
        assert_eq!(scalar_type_enum(ScalarType::UnsignedShort), 0x1403);
        assert_eq!(scalar_type_enum(ScalarType::UnsignedInt), 0x1405);
        assert_eq!(scalar_type_enum(ScalarType::Float), 0x1406);
    }

    #[test]
    fn triangles_are_triangles() {
        assert_eq!(primitive_mode_enum(PrimitiveMode::Triangles), 0x0004);
        assert_eq!(shader_stage_enum(ShaderStage::Vertex), 0x8B31);
        assert_eq!(shader_stage_enum(ShaderStage::Fragment), 0x8B30);
        assert_eq!(object_kind_enum(ObjectKind::VertexArray), 0x8074);
    }

    #[test]
    fn info_log_stops_at_nul() {
        let mut buf = info_log_buffer_with_len(16);
        assert_eq!(buf.len(), 16);
        buf[..6].copy_from_slice(b"error\0");

        assert_eq!(info_log_from_buffer(buf, 6), "error");
        assert_eq!(info_log_from_buffer(info_log_buffer_with_len(0), 0), "");
    }

    #[test]
    fn names_with_nuls_are_rejected() {
        assert!(c_name("a_vertex").is_some());
        assert!(c_name("a\0vertex").is_none());
    }
}
