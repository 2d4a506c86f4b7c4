//! A device that keeps everything in memory and records every call made to it.
//!
//! There is no rasterizer behind it. Shaders "compile" if they have a `main`, and linking reads the
//! `in`/`uniform` declarations out of the source to hand out locations the way a driver would, so
//! the whole setup sequence can run without a GPU. Misusing the API queues the same error codes a
//! GL driver would report from `glGetError`.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::device::{BufferId, Device, ObjectKind, ProgramId, ShaderId, VertexArrayId};
use crate::error::GpuError;
use crate::layout::{AttributeFormat, ScalarType};
use crate::shader::ShaderStage;
use crate::vertex_array::PrimitiveMode;

pub const INVALID_VALUE: u32 = 0x0501;
pub const INVALID_OPERATION: u32 = 0x0502;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateBuffer { id: BufferId, size: usize },
    DeleteBuffer { id: BufferId },
    CreateShader { id: ShaderId, stage: ShaderStage },
    CompileShader { id: ShaderId },
    ShaderInfoLog { id: ShaderId },
    DeleteShader { id: ShaderId },
    CreateProgram,
    AttachShader { program: ProgramId, shader: ShaderId },
    DetachShader { program: ProgramId, shader: ShaderId },
    LinkProgram { program: ProgramId },
    DeleteProgram { program: ProgramId },
    CreateVertexArray { vao: VertexArrayId },
    VertexBuffer { vao: VertexArrayId, binding: u32, buffer: BufferId, offset: isize, stride: i32 },
    AttribFormat { vao: VertexArrayId, location: u32, format: AttributeFormat, relative_offset: u32 },
    AttribBinding { vao: VertexArrayId, location: u32, binding: u32 },
    BindingDivisor { vao: VertexArrayId, binding: u32, divisor: u32 },
    EnableAttrib { vao: VertexArrayId, location: u32 },
    ElementBuffer { vao: VertexArrayId, buffer: BufferId },
    DeleteVertexArray { vao: VertexArrayId },
    UseProgram { program: Option<ProgramId> },
    BindVertexArray { vao: Option<VertexArrayId> },
    UniformMat4 { program: ProgramId, location: i32, value: [f32; 16] },
    DrawElements { mode: PrimitiveMode, count: i32, index_type: ScalarType, offset: usize },
}

/// A draw call together with the state it was issued in.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub mode: PrimitiveMode,
    pub count: i32,
    pub index_type: ScalarType,
    pub program: Option<ProgramId>,
    pub vertex_array: Option<VertexArrayId>,
}

#[derive(Debug)]
struct ShaderRecord {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    attached: Vec<ShaderId>,
    linked: bool,
    log: String,
    uniforms: HashMap<String, i32>,
    attributes: HashMap<String, i32>,
}

#[derive(Debug, Default)]
struct VertexArrayRecord {
    element_buffer: Option<BufferId>,
    enabled: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_id: u32,
    calls: Vec<Call>,
    draws: Vec<DrawRecord>,
    buffers: HashMap<BufferId, Vec<u8>>,
    shaders: HashMap<ShaderId, ShaderRecord>,
    programs: HashMap<ProgramId, ProgramRecord>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayRecord>,
    labels: HashMap<u32, String>,
    errors: VecDeque<u32>,
    current_program: Option<ProgramId>,
    current_vertex_array: Option<VertexArrayId>,
    fail_allocations: bool,
    allocations_left: Option<usize>,
    fail_next_compile: Option<Option<String>>,
    fail_next_link: Option<Option<String>>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every allocation fail until switched off again. Switching off also clears
    /// [`HeadlessDevice::fail_allocations_after`].
    pub fn fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
        if !fail {
            self.allocations_left = None;
        }
    }

    /// Lets the next `count` allocations of any kind succeed and fails every one after that.
    pub fn fail_allocations_after(&mut self, count: usize) {
        self.allocations_left = Some(count);
    }

    /// Makes the next compile fail with `log`, or with an empty log if `None`.
    pub fn fail_next_compile(&mut self, log: Option<&str>) {
        self.fail_next_compile = Some(log.map(str::to_string));
    }

    /// Makes the next link fail with `log`, or with an empty log if `None`.
    pub fn fail_next_link(&mut self, log: Option<&str>) {
        self.fail_next_link = Some(log.map(str::to_string));
    }

    /// Queues an error code as if the driver had raised it.
    pub fn push_error(&mut self, code: u32) {
        self.errors.push_back(code);
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn buffer_data(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(Vec::as_slice)
    }

    pub fn label_of(&self, id: u32) -> Option<&str> {
        self.labels.get(&id).map(String::as_str)
    }

    pub fn element_buffer_of(&self, vao: VertexArrayId) -> Option<BufferId> {
        self.vertex_arrays.get(&vao).and_then(|v| v.element_buffer)
    }

    pub fn enabled_locations(&self, vao: VertexArrayId) -> Vec<u32> {
        self.vertex_arrays.get(&vao).map(|v| v.enabled.clone()).unwrap_or_default()
    }

    pub fn current_program(&self) -> Option<ProgramId> { self.current_program }
    pub fn current_vertex_array(&self) -> Option<VertexArrayId> { self.current_vertex_array }
    pub fn live_buffers(&self) -> usize { self.buffers.len() }
    pub fn live_shaders(&self) -> usize { self.shaders.len() }
    pub fn live_programs(&self) -> usize { self.programs.len() }
    pub fn live_vertex_arrays(&self) -> usize { self.vertex_arrays.len() }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn allocation_fails(&mut self) -> bool {
        if self.fail_allocations {
            return true;
        }
        match self.allocations_left.as_mut() {
            Some(left) if *left == 0 => true,
            Some(left) => {
                *left -= 1;
                false
            }
            None => false,
        }
    }

    fn check_vao(&mut self, vao: VertexArrayId) -> bool {
        if self.vertex_arrays.contains_key(&vao) {
            true
        } else {
            self.errors.push_back(INVALID_OPERATION);
            false
        }
    }
}

/// `in` and `uniform` declarations found in a shader source, in order.
#[derive(Debug, Default, PartialEq)]
struct Declarations {
    inputs: Vec<(String, Option<i32>)>,
    uniforms: Vec<String>,
}

fn scan_declarations(source: &str) -> Declarations {
    let mut found = Declarations::default();

    for line in source.lines() {
        let mut line = line.trim();
        if line.starts_with("//") {
            continue;
        }

        let mut location = None;
        if line.starts_with("layout") {
            let (open, close) = match (line.find('('), line.find(')')) {
                (Some(open), Some(close)) if open < close => (open, close),
                _ => continue,
            };
            location = line[open + 1..close]
                .split(',')
                .filter_map(|q| {
                    let mut kv = q.split('=');
                    match (kv.next().map(str::trim), kv.next().map(str::trim)) {
                        (Some("location"), Some(v)) => v.parse().ok(),
                        _ => None,
                    }
                })
                .next();
            line = line[close + 1..].trim();
        }

        let tokens: Vec<&str> = line
            .trim_end_matches(';')
            .split_whitespace()
            .collect();
        if tokens.len() != 3 {
            continue;
        }
        let name = tokens[2].split('[').next().unwrap_or(tokens[2]).to_string();

        match tokens[0] {
            "in" => found.inputs.push((name, location)),
            "uniform" => found.uniforms.push(name),
            _ => {}
        }
    }

    found
}

impl Device for HeadlessDevice {
    fn create_buffer(&mut self, data: &[u8]) -> Result<BufferId, GpuError> {
        if self.allocation_fails() {
            return Err(GpuError::Resource(format!("cannot allocate {} bytes", data.len())));
        }
        let id = BufferId(self.next());
        self.buffers.insert(id, data.to_vec());
        self.calls.push(Call::CreateBuffer { id, size: data.len() });
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        self.calls.push(Call::DeleteBuffer { id: buffer });
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderId, GpuError> {
        if self.allocation_fails() {
            return Err(GpuError::Resource(format!("cannot create {} shader", stage)));
        }
        let id = ShaderId(self.next());
        self.shaders.insert(
            id,
            ShaderRecord { stage, source: String::new(), compiled: false, log: String::new() },
        );
        self.calls.push(Call::CreateShader { id, stage });
        Ok(id)
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) {
        match self.shaders.get_mut(&shader) {
            Some(record) => record.source = source.to_string(),
            None => self.errors.push_back(INVALID_VALUE),
        }
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        self.calls.push(Call::CompileShader { id: shader });
        let forced = self.fail_next_compile.take();

        let record = match self.shaders.get_mut(&shader) {
            Some(record) => record,
            None => return self.errors.push_back(INVALID_VALUE),
        };

        match forced {
            Some(log) => {
                record.compiled = false;
                record.log = log.unwrap_or_default();
            }
            None if !record.source.contains("main") => {
                record.compiled = false;
                record.log = "0:1(1): error: no function with name 'main'\n".to_string();
            }
            None => {
                record.compiled = true;
                record.log.clear();
            }
        }
    }

    fn compile_status(&mut self, shader: ShaderId) -> bool {
        self.shaders.get(&shader).map_or(false, |s| s.compiled)
    }

    fn shader_info_log_length(&mut self, shader: ShaderId) -> i32 {
        match self.shaders.get(&shader) {
            Some(s) if !s.log.is_empty() => s.log.len() as i32 + 1,
            _ => 0,
        }
    }

    fn shader_info_log(&mut self, shader: ShaderId, length: i32) -> String {
        self.calls.push(Call::ShaderInfoLog { id: shader });
        self.shaders
            .get(&shader)
            .map(|s| s.log.chars().take(length.max(1) as usize - 1).collect())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
        self.calls.push(Call::DeleteShader { id: shader });
    }

    fn create_program(&mut self) -> Result<ProgramId, GpuError> {
        if self.allocation_fails() {
            return Err(GpuError::Resource("cannot create program".to_string()));
        }
        let id = ProgramId(self.next());
        self.programs.insert(id, ProgramRecord::default());
        self.calls.push(Call::CreateProgram);
        Ok(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        self.calls.push(Call::AttachShader { program, shader });
        let known_shader = self.shaders.contains_key(&shader);
        match self.programs.get_mut(&program) {
            Some(record) if known_shader => record.attached.push(shader),
            _ => self.errors.push_back(INVALID_VALUE),
        }
    }

    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        self.calls.push(Call::DetachShader { program, shader });
        if let Some(record) = self.programs.get_mut(&program) {
            record.attached.retain(|&s| s != shader);
        }
    }

    fn link_program(&mut self, program: ProgramId) {
        self.calls.push(Call::LinkProgram { program });
        let forced = self.fail_next_link.take();

        let attached = match self.programs.get(&program) {
            Some(record) => record.attached.clone(),
            None => return self.errors.push_back(INVALID_VALUE),
        };

        let mut vertex = None;
        let mut uniform_names = Vec::new();
        let mut has_fragment = false;
        for id in &attached {
            if let Some(shader) = self.shaders.get(id) {
                let declarations = scan_declarations(&shader.source);
                for name in declarations.uniforms {
                    if !uniform_names.contains(&name) {
                        uniform_names.push(name);
                    }
                }
                match shader.stage {
                    ShaderStage::Vertex => vertex = Some(declarations.inputs),
                    ShaderStage::Fragment => has_fragment = true,
                }
            }
        }

        let record = match self.programs.get_mut(&program) {
            Some(record) => record,
            None => return,
        };
        record.uniforms.clear();
        record.attributes.clear();

        let inputs = match (forced, vertex) {
            (Some(log), _) => {
                record.linked = false;
                record.log = log.unwrap_or_default();
                return;
            }
            (None, None) => {
                record.linked = false;
                record.log = "error: program lacks a vertex shader\n".to_string();
                return;
            }
            (None, Some(_)) if !has_fragment => {
                record.linked = false;
                record.log = "error: program lacks a fragment shader\n".to_string();
                return;
            }
            (None, Some(inputs)) => inputs,
        };

        // Explicit locations first, then the rest fill the lowest free slots in declaration order.
        let mut taken: BTreeMap<i32, String> = BTreeMap::new();
        for (name, location) in &inputs {
            if let Some(location) = location {
                taken.insert(*location, name.clone());
            }
        }
        let mut next = 0;
        for (name, location) in &inputs {
            if location.is_none() {
                while taken.contains_key(&next) {
                    next += 1;
                }
                taken.insert(next, name.clone());
            }
        }

        record.attributes = taken.into_iter().map(|(location, name)| (name, location)).collect();
        record.uniforms = uniform_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, i as i32))
            .collect();
        record.linked = true;
        record.log.clear();
    }

    fn link_status(&mut self, program: ProgramId) -> bool {
        self.programs.get(&program).map_or(false, |p| p.linked)
    }

    fn program_info_log_length(&mut self, program: ProgramId) -> i32 {
        match self.programs.get(&program) {
            Some(p) if !p.log.is_empty() => p.log.len() as i32 + 1,
            _ => 0,
        }
    }

    fn program_info_log(&mut self, program: ProgramId, length: i32) -> String {
        self.programs
            .get(&program)
            .map(|p| p.log.chars().take(length.max(1) as usize - 1).collect())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.calls.push(Call::DeleteProgram { program });
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> i32 {
        match self.programs.get(&program) {
            Some(p) if p.linked => p.uniforms.get(name).copied().unwrap_or(-1),
            _ => {
                self.errors.push_back(INVALID_OPERATION);
                -1
            }
        }
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> i32 {
        match self.programs.get(&program) {
            Some(p) if p.linked => p.attributes.get(name).copied().unwrap_or(-1),
            _ => {
                self.errors.push_back(INVALID_OPERATION);
                -1
            }
        }
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayId, GpuError> {
        if self.allocation_fails() {
            return Err(GpuError::Resource("cannot create vertex array".to_string()));
        }
        let vao = VertexArrayId(self.next());
        self.vertex_arrays.insert(vao, VertexArrayRecord::default());
        self.calls.push(Call::CreateVertexArray { vao });
        Ok(vao)
    }

    fn vertex_array_vertex_buffer(
        &mut self,
        vao: VertexArrayId,
        binding: u32,
        buffer: BufferId,
        offset: isize,
        stride: i32,
    ) {
        self.calls.push(Call::VertexBuffer { vao, binding, buffer, offset, stride });
        if self.check_vao(vao) && !self.buffers.contains_key(&buffer) {
            self.errors.push_back(INVALID_VALUE);
        }
    }

    fn vertex_array_attrib_format(
        &mut self,
        vao: VertexArrayId,
        location: u32,
        format: AttributeFormat,
        relative_offset: u32,
    ) {
        self.calls.push(Call::AttribFormat { vao, location, format, relative_offset });
        self.check_vao(vao);
    }

    fn vertex_array_attrib_binding(&mut self, vao: VertexArrayId, location: u32, binding: u32) {
        self.calls.push(Call::AttribBinding { vao, location, binding });
        self.check_vao(vao);
    }

    fn vertex_array_binding_divisor(&mut self, vao: VertexArrayId, binding: u32, divisor: u32) {
        self.calls.push(Call::BindingDivisor { vao, binding, divisor });
        self.check_vao(vao);
    }

    fn enable_vertex_array_attrib(&mut self, vao: VertexArrayId, location: u32) {
        self.calls.push(Call::EnableAttrib { vao, location });
        if let Some(record) = self.vertex_arrays.get_mut(&vao) {
            record.enabled.push(location);
        } else {
            self.errors.push_back(INVALID_OPERATION);
        }
    }

    fn vertex_array_element_buffer(&mut self, vao: VertexArrayId, buffer: BufferId) {
        self.calls.push(Call::ElementBuffer { vao, buffer });
        let known_buffer = self.buffers.contains_key(&buffer);
        match self.vertex_arrays.get_mut(&vao) {
            Some(record) if known_buffer => record.element_buffer = Some(buffer),
            _ => self.errors.push_back(INVALID_OPERATION),
        }
    }

    fn delete_vertex_array(&mut self, vao: VertexArrayId) {
        self.vertex_arrays.remove(&vao);
        if self.current_vertex_array == Some(vao) {
            self.current_vertex_array = None;
        }
        self.calls.push(Call::DeleteVertexArray { vao });
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.calls.push(Call::UseProgram { program });
        match program {
            Some(id) if !self.programs.get(&id).map_or(false, |p| p.linked) => {
                self.errors.push_back(INVALID_OPERATION)
            }
            _ => self.current_program = program,
        }
    }

    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        self.calls.push(Call::BindVertexArray { vao });
        match vao {
            Some(id) if !self.vertex_arrays.contains_key(&id) => self.errors.push_back(INVALID_OPERATION),
            _ => self.current_vertex_array = vao,
        }
    }

    fn program_uniform_mat4(&mut self, program: ProgramId, location: i32, value: &[f32; 16]) {
        self.calls.push(Call::UniformMat4 { program, location, value: *value });
        match self.programs.get(&program) {
            Some(p) if p.uniforms.values().any(|&l| l == location) => {}
            Some(_) => self.errors.push_back(INVALID_OPERATION),
            None => self.errors.push_back(INVALID_VALUE),
        }
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: i32, index_type: ScalarType, offset: usize) {
        self.calls.push(Call::DrawElements { mode, count, index_type, offset });

        let has_indices = self
            .current_vertex_array
            .and_then(|vao| self.vertex_arrays.get(&vao))
            .map_or(false, |v| v.element_buffer.is_some());
        if self.current_program.is_none() || !has_indices {
            self.errors.push_back(INVALID_OPERATION);
            return;
        }

        self.draws.push(DrawRecord {
            mode,
            count,
            index_type,
            program: self.current_program,
            vertex_array: self.current_vertex_array,
        });
    }

    fn get_error(&mut self) -> u32 {
        self.errors.pop_front().unwrap_or(0)
    }

    fn object_label(&mut self, _kind: ObjectKind, id: u32, label: &str) {
        self.labels.insert(id, label.to_string());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::poll_device_errors;
    use crate::diagnostics::Diagnostics;

    #[test]
    fn scans_inputs_and_uniforms() {
        let found = scan_declarations(
            "#version 450\n\
             // in vec4 commented_out;\n\
             uniform mat4 modelView;\n\
             layout(location = 2) in vec3 a_normal;\n\
             in vec4 a_vertex;\n\
             uniform vec4 palette[4];\n\
             out vec4 v_color;\n",
        );

        assert_eq!(
            found.inputs,
            vec![("a_normal".to_string(), Some(2)), ("a_vertex".to_string(), None)]
        );
        assert_eq!(found.uniforms, vec!["modelView".to_string(), "palette".to_string()]);
    }

    #[test]
    fn implicit_locations_fill_gaps() {
        let mut device = HeadlessDevice::new();
        let vs = device.create_shader(ShaderStage::Vertex).unwrap();
        device.shader_source(vs, "layout(location = 0) in vec4 a;\nin vec4 b;\nin vec4 c;\nvoid main() {}");
        device.compile_shader(vs);
        let fs = device.create_shader(ShaderStage::Fragment).unwrap();
        device.shader_source(fs, "void main() {}");
        device.compile_shader(fs);

        let program = device.create_program().unwrap();
        device.attach_shader(program, vs);
        device.attach_shader(program, fs);
        device.link_program(program);

        assert!(device.link_status(program));
        assert_eq!(device.attrib_location(program, "a"), 0);
        assert_eq!(device.attrib_location(program, "b"), 1);
        assert_eq!(device.attrib_location(program, "c"), 2);
        assert_eq!(device.attrib_location(program, "d"), -1);
    }

    #[test]
    fn drawing_without_state_raises_an_error() {
        let mut device = HeadlessDevice::new();
        let mut diagnostics = Diagnostics::new();

        device.draw_elements(PrimitiveMode::Triangles, 3, ScalarType::UnsignedShort, 0);

        assert!(device.draws().is_empty());
        assert_eq!(poll_device_errors(&mut device, &mut diagnostics), 1);
        assert_eq!(diagnostics.entries()[0].message, "device error 0x0502 (invalid operation)");
        assert_eq!(device.get_error(), 0);
    }

    #[test]
    fn allocations_fail_after_a_budget() {
        let mut device = HeadlessDevice::new();
        device.fail_allocations_after(2);

        assert!(device.create_buffer(&[0]).is_ok());
        assert!(device.create_vertex_array().is_ok());
        assert!(matches!(device.create_program(), Err(GpuError::Resource(_))));
        assert!(matches!(device.create_shader(ShaderStage::Vertex), Err(GpuError::Resource(_))));

        device.fail_allocations(false);
        assert!(device.create_program().is_ok());
    }
}
