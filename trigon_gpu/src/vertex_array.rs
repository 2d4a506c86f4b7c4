//! Wiring buffers to program attributes.
//!
//! A [`VertexArray`] is configured once for a program and a set of buffers and then reused for
//! every draw. Configuring it again, say once per frame, is a bug and is rejected.

use glam::Mat4;

use crate::buffer::{GpuBuffer, VertexSource};
use crate::device::{BufferId, Device, ObjectKind, ProgramId, VertexArrayId};
use crate::diagnostics::Diagnostics;
use crate::error::GpuError;
use crate::layout::{AttributeFormat, IndexElement, ScalarType};
use crate::program::CompiledProgram;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexArrayState {
    Uninitialized,
    Configured,
    /// Active for a draw, see [`DrawScope`].
    Bound,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Pairs an attribute name with the buffer that feeds it.
#[derive(Clone, Copy)]
pub struct VertexInput<'a> {
    pub attribute: &'a str,
    pub source: &'a dyn VertexSource,
}

impl<'a> VertexInput<'a> {
    pub fn new(attribute: &'a str, source: &'a dyn VertexSource) -> Self {
        Self { attribute, source }
    }
}

/// One attribute that ended up bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeBinding {
    pub attribute: String,
    pub location: u32,
    /// Buffer binding slot. Unique per attribute within the vertex array.
    pub binding: u32,
    pub buffer: BufferId,
    pub format: AttributeFormat,
}

#[derive(Debug)]
pub struct VertexArray {
    id: Option<VertexArrayId>,
    program: Option<ProgramId>,
    state: VertexArrayState,
    bindings: Vec<AttributeBinding>,
    skipped: Vec<String>,
    index_buffer: Option<BufferId>,
    index_count: usize,
    index_type: ScalarType,
}

impl VertexArray {
    pub fn new() -> Self {
        Self {
            id: None,
            program: None,
            state: VertexArrayState::Uninitialized,
            bindings: Vec::new(),
            skipped: Vec::new(),
            index_buffer: None,
            index_count: 0,
            index_type: ScalarType::UnsignedShort,
        }
    }

    /// Creates and configures a vertex array in one step.
    pub fn build<D: Device + ?Sized, I: IndexElement>(
        device: &mut D,
        program: &CompiledProgram,
        inputs: &[VertexInput<'_>],
        indices: &GpuBuffer<I>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self, GpuError> {
        let mut vao = Self::new();
        vao.configure(device, program, inputs, indices, diagnostics)?;
        Ok(vao)
    }

    /// Binds every input the program has a location for and sets `indices` as the element source.
    ///
    /// Inputs are bound by their resolved location. Each bound input gets the next free binding
    /// slot, starting at 0, with a divisor of 0 so it advances once per vertex. Inputs without a
    /// location are skipped with a warning; the draw still works, that attribute just reads
    /// whatever default the device provides. Each attribute name may appear in `inputs` only once.
    pub fn configure<D: Device + ?Sized, I: IndexElement>(
        &mut self,
        device: &mut D,
        program: &CompiledProgram,
        inputs: &[VertexInput<'_>],
        indices: &GpuBuffer<I>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), GpuError> {
        self.expect_state(VertexArrayState::Uninitialized)?;

        let index_buffer = indices.id().ok_or_else(|| GpuError::Uninitialized {
            what: format!("index buffer {}", indices.label()),
        })?;

        for (i, input) in inputs.iter().enumerate() {
            if inputs[..i].iter().any(|earlier| earlier.attribute == input.attribute) {
                return Err(GpuError::DuplicateInput { name: input.attribute.to_string() });
            }
        }

        let mut present = Vec::with_capacity(inputs.len());
        let mut skipped = Vec::new();
        for input in inputs {
            match program.attribute(input.attribute).index() {
                Some(location) => {
                    let buffer = input.source.buffer_id().ok_or_else(|| GpuError::Uninitialized {
                        what: format!("vertex buffer {}", input.source.source_label()),
                    })?;
                    present.push((input, location, buffer));
                }
                None => {
                    diagnostics.skipped_binding(program.label(), input.attribute);
                    skipped.push(input.attribute.to_string());
                }
            }
        }

        let vao = device.create_vertex_array()?;
        device.object_label(ObjectKind::VertexArray, vao.id(), program.label());

        for (binding, (input, location, buffer)) in present.into_iter().enumerate() {
            let binding = binding as u32;
            let format = input.source.attribute_format();

            device.vertex_array_vertex_buffer(vao, binding, buffer, 0, input.source.stride());
            device.vertex_array_attrib_format(vao, location, format, 0);
            device.vertex_array_attrib_binding(vao, location, binding);
            device.vertex_array_binding_divisor(vao, binding, 0);
            device.enable_vertex_array_attrib(vao, location);

            log::debug!(
                "{}: attribute {} at location {} reads {} through binding {}",
                program.label(),
                input.attribute,
                location,
                input.source.source_label(),
                binding
            );

            self.bindings.push(AttributeBinding {
                attribute: input.attribute.to_string(),
                location,
                binding,
                buffer,
                format,
            });
        }

        device.vertex_array_element_buffer(vao, index_buffer);

        self.id = Some(vao);
        self.program = Some(program.id());
        self.skipped = skipped;
        self.index_buffer = Some(index_buffer);
        self.index_count = indices.len();
        self.index_type = I::INDEX_TYPE;
        self.state = VertexArrayState::Configured;
        Ok(())
    }

    /// Makes the program and this vertex array current until the returned scope is dropped.
    pub fn bind<'a, D: Device + ?Sized>(
        &'a mut self,
        device: &'a mut D,
        program: &'a CompiledProgram,
    ) -> Result<DrawScope<'a, D>, GpuError> {
        self.expect_state(VertexArrayState::Configured)?;

        // Configured implies an id and a program.
        let id = self.id.ok_or_else(|| GpuError::Uninitialized { what: "vertex array".to_string() })?;
        match self.program {
            Some(configured) if configured != program.id() => {
                return Err(GpuError::ForeignProgram { configured, given: program.id() });
            }
            _ => {}
        }
        device.use_program(Some(program.id()));
        device.bind_vertex_array(Some(id));
        self.state = VertexArrayState::Bound;

        Ok(DrawScope { device, vao: self, program })
    }

    pub fn destroy<D: Device + ?Sized>(&mut self, device: &mut D) {
        if let Some(id) = self.id.take() {
            device.delete_vertex_array(id);
        }
        self.state = VertexArrayState::Destroyed;
    }

    pub fn id(&self) -> Option<VertexArrayId> { self.id }
    pub fn state(&self) -> VertexArrayState { self.state }
    pub fn bindings(&self) -> &[AttributeBinding] { &self.bindings }
    pub fn skipped(&self) -> &[String] { &self.skipped }
    pub fn index_buffer(&self) -> Option<BufferId> { self.index_buffer }
    pub fn index_count(&self) -> usize { self.index_count }
    pub fn index_type(&self) -> ScalarType { self.index_type }

    fn expect_state(&self, expected: VertexArrayState) -> Result<(), GpuError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(GpuError::InvalidState { expected, actual: self.state })
        }
    }
}

impl Default for VertexArray {
    fn default() -> Self {
        Self::new()
    }
}

/// A vertex array and its program, bound for drawing.
///
/// Dropping the scope unbinds both and puts the vertex array back into
/// [`VertexArrayState::Configured`].
pub struct DrawScope<'a, D: Device + ?Sized> {
    device: &'a mut D,
    vao: &'a mut VertexArray,
    program: &'a CompiledProgram,
}

impl<'a, D: Device + ?Sized> DrawScope<'a, D> {
    /// Sets a matrix uniform by name. Does nothing if the program doesn't use it.
    pub fn set_uniform_mat4(&mut self, name: &str, value: &Mat4) {
        let location = self.program.uniform(name);
        if location.is_present() {
            self.device.program_uniform_mat4(self.program.id(), location.0, &value.to_cols_array());
        } else {
            log::trace!("skipping unused uniform {}", name);
        }
    }

    /// Draws every index in the element buffer once.
    pub fn draw(&mut self, mode: PrimitiveMode) {
        self.device.draw_elements(mode, self.vao.index_count as i32, self.vao.index_type, 0);
    }

    pub fn device(&mut self) -> &mut D {
        self.device
    }
}

impl<'a, D: Device + ?Sized> Drop for DrawScope<'a, D> {
    fn drop(&mut self) {
        self.device.bind_vertex_array(None);
        self.device.use_program(None);
        self.vao.state = VertexArrayState::Configured;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::headless::{Call, HeadlessDevice};
    use crate::program::{load_program, ProgramDescriptor};
    use crate::source::MemoryStore;
    use glam::{Vec2, Vec4};
    use std::path::Path;

    const VERT: &str = "\
uniform mat4 proj;
layout(location = 3) in vec4 a_vertex;
layout(location = 5) in vec4 a_color;
void main() { gl_Position = proj * a_vertex; }
";
    const FRAG: &str = "out vec4 color;\nvoid main() { color = vec4(1.0); }\n";

    fn program(device: &mut HeadlessDevice, attributes: &[&str]) -> CompiledProgram {
        let store = MemoryStore::new().with("v", VERT).with("f", FRAG);
        let descriptor = ProgramDescriptor {
            label: "Test",
            vertex: Path::new("v"),
            fragment: Path::new("f"),
            uniforms: &["proj"],
            attributes,
        };
        load_program(device, &store, &descriptor, &mut Diagnostics::new()).unwrap()
    }

    #[test]
    fn binds_by_resolved_location_with_sequential_slots() {
        let mut device = HeadlessDevice::new();
        let mut diagnostics = Diagnostics::new();
        let program = program(&mut device, &["a_vertex", "a_color"]);

        let positions = GpuBuffer::create(&mut device, "positions", &[Vec4::W; 3]).unwrap();
        let colors = GpuBuffer::create(&mut device, "colors", &[Vec4::ONE; 3]).unwrap();
        let indices = GpuBuffer::create(&mut device, "indices", &[0u16, 1, 2]).unwrap();

        let vao = VertexArray::build(
            &mut device,
            &program,
            &[VertexInput::new("a_vertex", &positions), VertexInput::new("a_color", &colors)],
            &indices,
            &mut diagnostics,
        )
        .unwrap();

        let slots: Vec<_> = vao.bindings().iter().map(|b| (b.location, b.binding)).collect();
        assert_eq!(slots, vec![(3, 0), (5, 1)]);

        let id = vao.id().unwrap();
        assert!(device.calls().contains(&Call::VertexBuffer { vao: id, binding: 1, buffer: colors.id().unwrap(), offset: 0, stride: 16 }));
        assert!(device.calls().contains(&Call::AttribBinding { vao: id, location: 5, binding: 1 }));
        assert!(device.calls().contains(&Call::BindingDivisor { vao: id, binding: 1, divisor: 0 }));
        assert!(device.calls().contains(&Call::EnableAttrib { vao: id, location: 3 }));
        assert_eq!(vao.index_type(), ScalarType::UnsignedShort);
        assert_eq!(vao.state(), VertexArrayState::Configured);
    }

    #[test]
    fn missing_attribute_is_skipped_and_the_rest_still_binds() {
        let mut device = HeadlessDevice::new();
        let mut diagnostics = Diagnostics::new();
        let program = program(&mut device, &["a_vertex", "a_uv"]);

        let positions = GpuBuffer::create(&mut device, "positions", &[Vec4::W; 3]).unwrap();
        let uvs = GpuBuffer::create(&mut device, "uvs", &[Vec2::ZERO; 3]).unwrap();
        let indices = GpuBuffer::create(&mut device, "indices", &[0u32, 1, 2]).unwrap();

        let vao = VertexArray::build(
            &mut device,
            &program,
            &[VertexInput::new("a_vertex", &positions), VertexInput::new("a_uv", &uvs)],
            &indices,
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(vao.bindings().len(), 1);
        assert_eq!(vao.bindings()[0].attribute, "a_vertex");
        assert_eq!(vao.skipped(), &["a_uv".to_string()]);
        assert_eq!(
            diagnostics.count(|d| matches!(&d.kind, DiagnosticKind::SkippedBinding { name, .. } if name == "a_uv")),
            1
        );
        assert_eq!(device.count_calls(|c| matches!(c, Call::EnableAttrib { .. })), 1);
        assert_eq!(device.element_buffer_of(vao.id().unwrap()), indices.id());
        assert_eq!(vao.index_type(), ScalarType::UnsignedInt);
    }

    #[test]
    fn uninitialized_buffers_are_rejected_before_device_work() {
        let mut device = HeadlessDevice::new();
        let program = program(&mut device, &["a_vertex"]);
        let indices = GpuBuffer::create(&mut device, "indices", &[0u16]).unwrap();
        let positions = GpuBuffer::<Vec4>::new();
        let before = device.calls().len();

        let err = VertexArray::build(
            &mut device,
            &program,
            &[VertexInput::new("a_vertex", &positions)],
            &indices,
            &mut Diagnostics::new(),
        )
        .unwrap_err();

        assert!(matches!(err, GpuError::Uninitialized { .. }));
        assert_eq!(device.calls().len(), before);
    }

    #[test]
    fn state_machine() {
        let mut device = HeadlessDevice::new();
        let mut diagnostics = Diagnostics::new();
        let program = program(&mut device, &["a_vertex"]);
        let positions = GpuBuffer::create(&mut device, "positions", &[Vec4::W; 3]).unwrap();
        let indices = GpuBuffer::create(&mut device, "indices", &[0u16, 1, 2]).unwrap();
        let inputs = [VertexInput::new("a_vertex", &positions as &dyn VertexSource)];

        let mut vao = VertexArray::new();
        assert_eq!(vao.state(), VertexArrayState::Uninitialized);
        assert!(vao.bind(&mut device, &program).is_err());

        vao.configure(&mut device, &program, &inputs, &indices, &mut diagnostics).unwrap();
        assert_eq!(vao.state(), VertexArrayState::Configured);

        {
            let mut scope = vao.bind(&mut device, &program).unwrap();
            scope.set_uniform_mat4("proj", &Mat4::IDENTITY);
            scope.draw(PrimitiveMode::Triangles);
        }
        assert_eq!(vao.state(), VertexArrayState::Configured);
        assert_eq!(device.current_program(), None);
        assert_eq!(device.current_vertex_array(), None);

        // Configuring is once per vertex array, not once per frame.
        let err = vao.configure(&mut device, &program, &inputs, &indices, &mut diagnostics).unwrap_err();
        assert!(matches!(
            err,
            GpuError::InvalidState { expected: VertexArrayState::Uninitialized, actual: VertexArrayState::Configured }
        ));

        vao.destroy(&mut device);
        assert_eq!(vao.state(), VertexArrayState::Destroyed);
        assert_eq!(device.live_vertex_arrays(), 0);
        assert!(vao.bind(&mut device, &program).is_err());
    }

    #[test]
    fn state_is_bound_inside_the_scope() {
        let mut device = HeadlessDevice::new();
        let program = program(&mut device, &[]);
        let indices = GpuBuffer::create(&mut device, "indices", &[0u8, 1, 2]).unwrap();
        let mut vao = VertexArray::build(&mut device, &program, &[], &indices, &mut Diagnostics::new()).unwrap();

        let scope = vao.bind(&mut device, &program).unwrap();
        assert_eq!(scope.vao.state, VertexArrayState::Bound);
        drop(scope);
        assert_eq!(vao.state(), VertexArrayState::Configured);
    }

    #[test]
    fn repeated_input_is_rejected_before_device_work() {
        let mut device = HeadlessDevice::new();
        let mut diagnostics = Diagnostics::new();
        let program = program(&mut device, &["a_vertex", "a_uv"]);
        let positions = GpuBuffer::create(&mut device, "positions", &[Vec4::W; 3]).unwrap();
        let uvs = GpuBuffer::create(&mut device, "uvs", &[Vec2::ZERO; 3]).unwrap();
        let indices = GpuBuffer::create(&mut device, "indices", &[0u16, 1, 2]).unwrap();
        let before = device.calls().len();

        let mut vao = VertexArray::new();
        let err = vao
            .configure(
                &mut device,
                &program,
                &[
                    VertexInput::new("a_uv", &uvs),
                    VertexInput::new("a_vertex", &positions),
                    VertexInput::new("a_vertex", &positions),
                ],
                &indices,
                &mut diagnostics,
            )
            .unwrap_err();

        assert!(matches!(err, GpuError::DuplicateInput { ref name } if name == "a_vertex"));
        assert_eq!(device.calls().len(), before);
        assert!(diagnostics.entries().is_empty());
        assert_eq!(vao.state(), VertexArrayState::Uninitialized);
        assert!(vao.bindings().is_empty());
    }

    #[test]
    fn binding_with_another_program_is_refused() {
        let mut device = HeadlessDevice::new();
        let first = program(&mut device, &["a_vertex"]);
        let second = program(&mut device, &["a_vertex"]);
        let indices = GpuBuffer::create(&mut device, "indices", &[0u16, 1, 2]).unwrap();
        let mut vao = VertexArray::build(&mut device, &first, &[], &indices, &mut Diagnostics::new()).unwrap();

        let err = vao.bind(&mut device, &second).err().unwrap();
        assert!(matches!(
            err,
            GpuError::ForeignProgram { configured, given } if configured == first.id() && given == second.id()
        ));
        assert_eq!(vao.state(), VertexArrayState::Configured);
        assert_eq!(device.current_program(), None);
        assert_eq!(device.current_vertex_array(), None);

        assert!(vao.bind(&mut device, &first).is_ok());
    }
}
