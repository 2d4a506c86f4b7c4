use std::fmt;
use std::path::Path;

use crate::device::{Device, ObjectKind, ProgramId};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Severity};
use crate::error::GpuError;
use crate::shader::{load_shader, read_info_log, ShaderHandle, ShaderStage};
use crate::source::SourceStore;

/// A resolved uniform or attribute location.
///
/// -1 means the program doesn't have it, usually because the compiler optimized it away. That is
/// a "don't bind" marker, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location(pub i32);

impl Location {
    pub const NOT_PRESENT: Location = Location(-1);

    pub fn is_present(self) -> bool {
        self.0 >= 0
    }

    /// The location as an index, if present.
    pub fn index(self) -> Option<u32> {
        if self.is_present() { Some(self.0 as u32) } else { None }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to build and which names to look up afterwards.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDescriptor<'a> {
    pub label: &'a str,
    pub vertex: &'a Path,
    pub fragment: &'a Path,
    pub uniforms: &'a [&'a str],
    pub attributes: &'a [&'a str],
}

/// A linked program that still holds references to the stages it was linked from.
#[derive(Debug)]
pub struct ProgramHandle {
    id: ProgramId,
    label: String,
    stages: Vec<ShaderHandle>,
}

impl ProgramHandle {
    pub fn id(&self) -> ProgramId { self.id }
    pub fn label(&self) -> &str { &self.label }

    pub fn stages(&self) -> &[ShaderHandle] {
        &self.stages
    }

    /// Detaches and releases every stage, then deletes the program.
    pub fn destroy<D: Device + ?Sized>(self, device: &mut D) {
        for stage in self.stages {
            device.detach_shader(self.id, stage.id());
            stage.release(device);
        }
        device.delete_program(self.id);
        log::debug!("destroyed program {}", self.label);
    }
}

/// Links `vertex` and `fragment` into a program.
///
/// Both handles are consumed: each stage is attached (the program takes its own reference) and the
/// caller's reference is released right away. Once linked, the stages live exactly as long as the
/// program does.
pub fn link_program<D: Device + ?Sized>(
    device: &mut D,
    label: &str,
    vertex: ShaderHandle,
    fragment: ShaderHandle,
    diagnostics: &mut Diagnostics,
) -> Result<ProgramHandle, GpuError> {
    let id = match device.create_program() {
        Ok(id) => id,
        Err(e) => {
            vertex.release(device);
            fragment.release(device);
            return Err(e);
        }
    };

    let mut stages = Vec::with_capacity(2);
    for shader in [vertex, fragment] {
        device.attach_shader(id, shader.id());
        stages.push(shader.retain());
        shader.release(device);
    }

    device.link_program(id);
    device.object_label(ObjectKind::Program, id.id(), label);

    let handle = ProgramHandle { id, label: label.to_string(), stages };

    if !device.link_status(id) {
        let length = device.program_info_log_length(id);
        let log = read_info_log(length, |len| device.program_info_log(id, len));
        handle.destroy(device);

        diagnostics.emit(
            Severity::Error,
            DiagnosticKind::LinkFailure { program: label.to_string() },
            format!("linking failed: {}\n{}", label, log),
        );
        return Err(GpuError::Link { program: label.to_string(), log });
    }

    log::debug!("linked program {}", label);
    Ok(handle)
}

/// A linked program plus the locations of the names the caller asked for.
#[derive(Debug)]
pub struct CompiledProgram {
    handle: ProgramHandle,
    uniforms: Vec<(String, Location)>,
    attributes: Vec<(String, Location)>,
}

impl CompiledProgram {
    /// Looks up every name in `uniforms` and `attributes`.
    ///
    /// A name the program doesn't have resolves to [`Location::NOT_PRESENT`] and produces exactly
    /// one warning in `diagnostics`. Names listed more than once are looked up once.
    pub fn resolve<D: Device + ?Sized>(
        device: &mut D,
        handle: ProgramHandle,
        uniforms: &[&str],
        attributes: &[&str],
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut resolved_uniforms: Vec<(String, Location)> = Vec::with_capacity(uniforms.len());
        for &name in uniforms {
            if resolved_uniforms.iter().any(|(n, _)| n == name) {
                continue;
            }
            let location = Location(device.uniform_location(handle.id, name));
            if !location.is_present() {
                diagnostics.unused_uniform(&handle.label, name);
            }
            resolved_uniforms.push((name.to_string(), location));
        }

        let mut resolved_attributes: Vec<(String, Location)> = Vec::with_capacity(attributes.len());
        for &name in attributes {
            if resolved_attributes.iter().any(|(n, _)| n == name) {
                continue;
            }
            let location = Location(device.attrib_location(handle.id, name));
            if !location.is_present() {
                diagnostics.unused_attribute(&handle.label, name);
            }
            resolved_attributes.push((name.to_string(), location));
        }

        Self { handle, uniforms: resolved_uniforms, attributes: resolved_attributes }
    }

    pub fn id(&self) -> ProgramId { self.handle.id }
    pub fn label(&self) -> &str { &self.handle.label }
    pub fn handle(&self) -> &ProgramHandle { &self.handle }

    /// Location of a requested uniform. Names that were never requested are also `NOT_PRESENT`.
    pub fn uniform(&self, name: &str) -> Location {
        lookup(&self.uniforms, name)
    }

    pub fn attribute(&self, name: &str) -> Location {
        lookup(&self.attributes, name)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&str, Location)> {
        self.uniforms.iter().map(|(n, l)| (n.as_str(), *l))
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, Location)> {
        self.attributes.iter().map(|(n, l)| (n.as_str(), *l))
    }

    pub fn destroy<D: Device + ?Sized>(self, device: &mut D) {
        self.handle.destroy(device);
    }
}

fn lookup(table: &[(String, Location)], name: &str) -> Location {
    table
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, l)| *l)
        .unwrap_or(Location::NOT_PRESENT)
}

/// Reads, compiles and links both stages, then resolves the descriptor's names.
pub fn load_program<D: Device + ?Sized, S: SourceStore + ?Sized>(
    device: &mut D,
    store: &S,
    descriptor: &ProgramDescriptor<'_>,
    diagnostics: &mut Diagnostics,
) -> Result<CompiledProgram, GpuError> {
    let vertex = load_shader(device, store, ShaderStage::Vertex, descriptor.vertex, diagnostics)?;
    let fragment =
        match load_shader(device, store, ShaderStage::Fragment, descriptor.fragment, diagnostics) {
            Ok(fragment) => fragment,
            Err(e) => {
                vertex.release(device);
                return Err(e);
            }
        };

    let handle = link_program(device, descriptor.label, vertex, fragment, diagnostics)?;
    Ok(CompiledProgram::resolve(
        device,
        handle,
        descriptor.uniforms,
        descriptor.attributes,
        diagnostics,
    ))
}
