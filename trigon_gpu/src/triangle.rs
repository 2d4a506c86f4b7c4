//! The one thing this crate draws: a colored triangle spinning in front of the camera.

use std::path::PathBuf;

use glam::{Mat4, Vec3, Vec4};

use crate::buffer::GpuBuffer;
use crate::device::{poll_device_errors, Device};
use crate::diagnostics::Diagnostics;
use crate::error::GpuError;
use crate::program::{load_program, CompiledProgram, ProgramDescriptor};
use crate::registry::Registry;
use crate::source::{MemoryStore, SourceStore};
use crate::vertex_array::{PrimitiveMode, VertexArray, VertexInput};

pub const VERTEX_SOURCE: &str = include_str!("../shaders/hello_triangle.vert");
pub const FRAGMENT_SOURCE: &str = include_str!("../shaders/hello_triangle.frag");

pub const UNIFORMS: [&str; 2] = ["modelView", "proj"];
pub const ATTRIBUTES: [&str; 2] = ["a_vertex", "a_color"];

pub const POSITIONS: [Vec4; 3] = [
    Vec4::new(-1.0, -1.0, 0.0, 1.0),
    Vec4::new(1.0, -1.0, 0.0, 1.0),
    Vec4::new(0.0, 1.0, 0.0, 1.0),
];

pub const COLORS: [Vec4; 3] = [
    Vec4::new(1.0, 0.0, 0.0, 1.0),
    Vec4::new(0.0, 1.0, 0.0, 1.0),
    Vec4::new(0.0, 0.0, 1.0, 1.0),
];

pub const INDICES: [u16; 3] = [0, 1, 2];

/// Programs known to this render setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKey {
    HelloTriangle,
}

/// Where the two stages of the triangle program are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("hello_triangle.vert"),
            fragment: PathBuf::from("hello_triangle.frag"),
        }
    }
}

/// The shaders that ship with the crate, under their default paths.
pub fn embedded_sources() -> MemoryStore {
    let paths = ShaderPaths::default();
    MemoryStore::new()
        .with(paths.vertex, VERTEX_SOURCE)
        .with(paths.fragment, FRAGMENT_SOURCE)
}

/// The matrices fed to the triangle program each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMatrices {
    pub model_view: Mat4,
    pub proj: Mat4,
}

/// Camera sits at (0, 1, 5); the triangle is scaled up 3x and spins around Y once every 2π
/// seconds.
pub fn frame_matrices(elapsed_seconds: f32, aspect: f32) -> FrameMatrices {
    let view = Mat4::from_translation(Vec3::new(0.0, 1.0, 5.0)).inverse();
    let model = Mat4::from_rotation_y(elapsed_seconds) * Mat4::from_scale(Vec3::splat(3.0));
    let proj = Mat4::perspective_rh_gl(90f32.to_radians(), aspect, 0.01, 1000.0);

    FrameMatrices { model_view: view * model, proj }
}

pub struct HelloTriangle {
    vertices: GpuBuffer<Vec4>,
    colors: GpuBuffer<Vec4>,
    indices: GpuBuffer<u16>,
    registry: Registry<ProgramKey>,
}

impl HelloTriangle {
    /// Compiles the program, uploads the geometry and wires the two together. Runs once.
    pub fn new<D: Device + ?Sized, S: SourceStore + ?Sized>(
        device: &mut D,
        store: &S,
        paths: &ShaderPaths,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self, GpuError> {
        let program = load_program(
            device,
            store,
            &ProgramDescriptor {
                label: "HelloTriangle",
                vertex: &paths.vertex,
                fragment: &paths.fragment,
                uniforms: &UNIFORMS,
                attributes: &ATTRIBUTES,
            },
            diagnostics,
        )?;

        let mut vertices = GpuBuffer::new();
        let mut colors = GpuBuffer::new();
        let mut indices = GpuBuffer::new();

        let vertex_array = match upload_and_wire(
            device,
            &program,
            &mut vertices,
            &mut colors,
            &mut indices,
            diagnostics,
        ) {
            Ok(vertex_array) => vertex_array,
            Err(e) => {
                // Whatever made it onto the device before the failure goes away again.
                vertices.destroy(device);
                colors.destroy(device);
                indices.destroy(device);
                program.destroy(device);
                return Err(e);
            }
        };

        let mut registry = Registry::new();
        if let Err(e) = registry.insert(device, ProgramKey::HelloTriangle, program, vertex_array) {
            vertices.destroy(device);
            colors.destroy(device);
            indices.destroy(device);
            return Err(e);
        }

        Ok(Self { vertices, colors, indices, registry })
    }

    /// Draws the triangle, then reports whatever errors the device raised while doing so.
    pub fn draw<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        matrices: &FrameMatrices,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), GpuError> {
        let entry = self
            .registry
            .get_mut(ProgramKey::HelloTriangle)
            .ok_or_else(|| GpuError::Uninitialized { what: "HelloTriangle program".to_string() })?;

        {
            let mut scope = entry.vertex_array.bind(device, &entry.program)?;
            scope.set_uniform_mat4(UNIFORMS[0], &matrices.model_view);
            scope.set_uniform_mat4(UNIFORMS[1], &matrices.proj);
            scope.draw(PrimitiveMode::Triangles);
        }

        poll_device_errors(device, diagnostics);
        Ok(())
    }

    pub fn registry(&self) -> &Registry<ProgramKey> {
        &self.registry
    }

    pub fn vertex_array(&self) -> Option<&VertexArray> {
        self.registry.get(ProgramKey::HelloTriangle).map(|e| &e.vertex_array)
    }

    pub fn destroy<D: Device + ?Sized>(mut self, device: &mut D) {
        self.registry.destroy_all(device);
        self.vertices.destroy(device);
        self.colors.destroy(device);
        self.indices.destroy(device);
    }
}

fn upload_and_wire<D: Device + ?Sized>(
    device: &mut D,
    program: &CompiledProgram,
    vertices: &mut GpuBuffer<Vec4>,
    colors: &mut GpuBuffer<Vec4>,
    indices: &mut GpuBuffer<u16>,
    diagnostics: &mut Diagnostics,
) -> Result<VertexArray, GpuError> {
    vertices.upload(device, "vertices", &POSITIONS)?;
    colors.upload(device, "colors", &COLORS)?;
    indices.upload(device, "indices", &INDICES)?;

    VertexArray::build(
        device,
        program,
        &[
            VertexInput::new(ATTRIBUTES[0], &*vertices),
            VertexInput::new(ATTRIBUTES[1], &*colors),
        ],
        indices,
        diagnostics,
    )
}
