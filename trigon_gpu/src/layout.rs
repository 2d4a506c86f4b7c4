//! Compile-time vertex layout metadata.
//!
//! Every type that can live in a vertex buffer implements [`VertexAttrib`], which pins down how the
//! device should read one element of it: how many components, what scalar type each component is,
//! and whether integer components get normalized to `[0, 1]`/`[-1, 1]`. All of it is associated
//! constants, so asking a buffer for its layout never branches at runtime.
//!
//! A type without an implementation can't be put in a [`GpuBuffer`](crate::buffer::GpuBuffer) at
//! all:
//!
//! ```compile_fail
//! let _ = gpu::layout::format_of::<String>();
//! ```
//!
//! ```compile_fail
//! let _ = gpu::GpuBuffer::<String>::new();
//! ```
//!
//! ```
//! let buffer = gpu::GpuBuffer::<glam::Vec4>::new();
//! assert_eq!(buffer.attribute_component_count(), 4);
//! ```

use bytemuck::{Pod, Zeroable};
use glam::{DVec2, DVec3, DVec4, IVec2, IVec3, IVec4, Vec2, Vec3, Vec4};

/// The scalar type of a single attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
    Double,
}

impl ScalarType {
    pub const fn byte_size(self) -> usize {
        match self {
            ScalarType::Byte | ScalarType::UnsignedByte => 1,
            ScalarType::Short | ScalarType::UnsignedShort => 2,
            ScalarType::Int | ScalarType::UnsignedInt | ScalarType::Float => 4,
            ScalarType::Double => 8,
        }
    }

    pub const fn is_integer(self) -> bool {
        !matches!(self, ScalarType::Float | ScalarType::Double)
    }
}

/// How one element of a vertex buffer is read by the vertex stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeFormat {
    pub components: i32,
    pub scalar: ScalarType,
    pub normalized: bool,
}

/// A type with a known vertex attribute layout.
pub trait VertexAttrib: Pod {
    const COMPONENTS: i32;
    const SCALAR: ScalarType;
    const NORMALIZED: bool = false;

    const FORMAT: AttributeFormat = AttributeFormat {
        components: Self::COMPONENTS,
        scalar: Self::SCALAR,
        normalized: Self::NORMALIZED,
    };
}

/// A type that can be used as an index in an element buffer.
pub trait IndexElement: VertexAttrib {
    const INDEX_TYPE: ScalarType;
}

/// Layout of `T`, resolved entirely at compile time.
pub const fn format_of<T: VertexAttrib>() -> AttributeFormat {
    T::FORMAT
}

macro_rules! vertex_attrib {
    ($($ty:ty => $components:expr, $scalar:ident;)*) => {
        $(
            impl VertexAttrib for $ty {
                const COMPONENTS: i32 = $components;
                const SCALAR: ScalarType = ScalarType::$scalar;
            }
        )*
    };
}

vertex_attrib! {
    i8 => 1, Byte;
    u8 => 1, UnsignedByte;
    i16 => 1, Short;
    u16 => 1, UnsignedShort;
    i32 => 1, Int;
    u32 => 1, UnsignedInt;
    f32 => 1, Float;
    f64 => 1, Double;

    [f32; 2] => 2, Float;
    [f32; 3] => 3, Float;
    [f32; 4] => 4, Float;

    Vec2 => 2, Float;
    Vec3 => 3, Float;
    Vec4 => 4, Float;
    IVec2 => 2, Int;
    IVec3 => 3, Int;
    IVec4 => 4, Int;
    DVec2 => 2, Double;
    DVec3 => 3, Double;
    DVec4 => 4, Double;
}

impl IndexElement for u8 {
    const INDEX_TYPE: ScalarType = ScalarType::UnsignedByte;
}

impl IndexElement for u16 {
    const INDEX_TYPE: ScalarType = ScalarType::UnsignedShort;
}

impl IndexElement for u32 {
    const INDEX_TYPE: ScalarType = ScalarType::UnsignedInt;
}

/// An 8-bit-per-channel color, read by the shader as a normalized `vec4`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Rgba8(pub [u8; 4]);

impl VertexAttrib for Rgba8 {
    const COMPONENTS: i32 = 4;
    const SCALAR: ScalarType = ScalarType::UnsignedByte;
    const NORMALIZED: bool = true;
}
