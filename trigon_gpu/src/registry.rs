use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::device::Device;
use crate::error::GpuError;
use crate::program::CompiledProgram;
use crate::vertex_array::VertexArray;

/// A program and the vertex array configured for it.
#[derive(Debug)]
pub struct RenderEntry {
    pub program: CompiledProgram,
    pub vertex_array: VertexArray,
}

/// Owns the programs and vertex arrays of one render setup, keyed by a caller-defined id.
///
/// Several registries can live side by side; nothing here is process-wide.
#[derive(Debug)]
pub struct Registry<K> {
    entries: HashMap<K, RenderEntry>,
}

impl<K: Copy + Eq + Hash + Debug> Registry<K> {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Adds an entry. Keys are set once; a second insert under the same key is rejected and the
    /// rejected program and vertex array are freed.
    pub fn insert<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        key: K,
        program: CompiledProgram,
        vertex_array: VertexArray,
    ) -> Result<(), GpuError> {
        if self.entries.contains_key(&key) {
            destroy_entry(device, RenderEntry { program, vertex_array });
            return Err(GpuError::AlreadyInitialized { label: format!("{:?}", key) });
        }
        self.entries.insert(key, RenderEntry { program, vertex_array });
        Ok(())
    }

    pub fn get(&self, key: K) -> Option<&RenderEntry> {
        self.entries.get(&key)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut RenderEntry> {
        self.entries.get_mut(&key)
    }

    pub fn program(&self, key: K) -> Option<&CompiledProgram> {
        self.entries.get(&key).map(|e| &e.program)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes one entry and frees its device objects.
    pub fn remove<D: Device + ?Sized>(&mut self, device: &mut D, key: K) -> bool {
        match self.entries.remove(&key) {
            Some(entry) => {
                destroy_entry(device, entry);
                true
            }
            None => false,
        }
    }

    pub fn destroy_all<D: Device + ?Sized>(&mut self, device: &mut D) {
        for (key, entry) in self.entries.drain() {
            log::debug!("destroying {:?}", key);
            destroy_entry(device, entry);
        }
    }
}

impl<K: Copy + Eq + Hash + Debug> Default for Registry<K> {
    fn default() -> Self {
        Self::new()
    }
}

fn destroy_entry<D: Device + ?Sized>(device: &mut D, mut entry: RenderEntry) {
    entry.vertex_array.destroy(device);
    entry.program.destroy(device);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buffer::GpuBuffer;
    use crate::diagnostics::Diagnostics;
    use crate::headless::HeadlessDevice;
    use crate::program::{load_program, ProgramDescriptor};
    use crate::source::MemoryStore;
    use std::path::Path;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Key {
        Opaque,
        Overlay,
    }

    fn entry(device: &mut HeadlessDevice, label: &str) -> (CompiledProgram, VertexArray) {
        let store = MemoryStore::new()
            .with("v", "in vec4 p;\nvoid main() {}")
            .with("f", "void main() {}");
        let descriptor = ProgramDescriptor {
            label,
            vertex: Path::new("v"),
            fragment: Path::new("f"),
            uniforms: &[],
            attributes: &["p"],
        };
        let mut diagnostics = Diagnostics::new();
        let program = load_program(device, &store, &descriptor, &mut diagnostics).unwrap();
        let indices = GpuBuffer::create(device, "indices", &[0u16]).unwrap();
        let vao = VertexArray::build(device, &program, &[], &indices, &mut diagnostics).unwrap();
        (program, vao)
    }

    #[test]
    fn keys_are_set_once() {
        let mut device = HeadlessDevice::new();
        let mut registry = Registry::new();

        let (program, vao) = entry(&mut device, "opaque");
        registry.insert(&mut device, Key::Opaque, program, vao).unwrap();

        let (program, vao) = entry(&mut device, "opaque again");
        let err = registry.insert(&mut device, Key::Opaque, program, vao).unwrap_err();
        assert_eq!(err.to_string(), "Opaque is already initialized");
        assert_eq!(registry.program(Key::Opaque).unwrap().label(), "opaque");
        assert_eq!(device.live_programs(), 1);
        assert_eq!(device.live_vertex_arrays(), 1);
    }

    #[test]
    fn independent_registries_and_teardown() {
        let mut device = HeadlessDevice::new();
        let mut first = Registry::new();
        let mut second = Registry::new();

        let (program, vao) = entry(&mut device, "a");
        first.insert(&mut device, Key::Opaque, program, vao).unwrap();
        let (program, vao) = entry(&mut device, "b");
        first.insert(&mut device, Key::Overlay, program, vao).unwrap();
        let (program, vao) = entry(&mut device, "c");
        second.insert(&mut device, Key::Opaque, program, vao).unwrap();

        assert_eq!(device.live_programs(), 3);

        assert!(first.remove(&mut device, Key::Overlay));
        assert!(!first.remove(&mut device, Key::Overlay));
        assert_eq!(device.live_programs(), 2);

        first.destroy_all(&mut device);
        assert!(first.is_empty());
        assert_eq!(second.len(), 1);
        assert_eq!(device.live_programs(), 1);
        assert_eq!(device.live_vertex_arrays(), 1);
    }
}
