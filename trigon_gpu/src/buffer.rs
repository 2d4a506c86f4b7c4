use std::marker::PhantomData;
use std::mem::size_of;

use crate::device::{BufferId, Device, ObjectKind};
use crate::error::GpuError;
use crate::layout::{AttributeFormat, ScalarType, VertexAttrib};

/// A buffer that lives in device memory, holding a sequence of `T`.
///
/// Think of it as a `Vec<T>` whose storage is on the graphics card. It is written exactly once: the
/// whole slice is uploaded synchronously when the buffer is initialized, and initializing it a
/// second time is an error rather than a silent re-upload. The layout metadata the vertex stage
/// needs to read `T` comes from [`VertexAttrib`] and costs nothing at runtime.
pub struct GpuBuffer<T> {
    id: Option<BufferId>,
    len: usize,
    label: String,
    destroyed: bool,
    _marker: PhantomData<T>,
}

impl<T: VertexAttrib> GpuBuffer<T> {
    /// An empty handle. Nothing is allocated until [`GpuBuffer::upload`].
    pub fn new() -> Self {
        Self { id: None, len: 0, label: String::new(), destroyed: false, _marker: PhantomData }
    }

    /// Allocates a buffer holding `elements`.
    pub fn create<D: Device + ?Sized>(
        device: &mut D,
        label: &str,
        elements: &[T],
    ) -> Result<Self, GpuError> {
        let mut buffer = Self::new();
        buffer.upload(device, label, elements)?;
        Ok(buffer)
    }

    pub fn upload<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        label: &str,
        elements: &[T],
    ) -> Result<(), GpuError> {
        if self.id.is_some() {
            log::error!("attempted to initialize buffer {} twice", self.label);
            return Err(GpuError::AlreadyInitialized { label: self.label.clone() });
        }
        if self.destroyed {
            log::error!("attempted to reuse destroyed buffer {}", self.label);
            return Err(GpuError::Destroyed { label: self.label.clone() });
        }

        let id = device.create_buffer(bytemuck::cast_slice(elements))?;
        device.object_label(ObjectKind::Buffer, id.id(), label);
        log::debug!(
            "uploaded buffer {} ({} x {} bytes)",
            label,
            elements.len(),
            size_of::<T>()
        );

        self.id = Some(id);
        self.len = elements.len();
        self.label = label.to_string();
        Ok(())
    }

    /// Frees the device allocation. The buffer can't be uploaded to again afterwards.
    pub fn destroy<D: Device + ?Sized>(&mut self, device: &mut D) {
        if let Some(id) = self.id.take() {
            device.delete_buffer(id);
            log::debug!("destroyed buffer {}", self.label);
            self.destroyed = true;
        }
        self.len = 0;
    }

    pub fn id(&self) -> Option<BufferId> { self.id }
    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }
    pub fn is_initialized(&self) -> bool { self.id.is_some() }
    pub fn label(&self) -> &str { &self.label }

    pub fn byte_len(&self) -> usize {
        self.len * size_of::<T>()
    }

    pub fn element_byte_size(&self) -> usize {
        size_of::<T>()
    }

    pub fn attribute_component_count(&self) -> i32 {
        T::COMPONENTS
    }

    pub fn attribute_scalar_type(&self) -> ScalarType {
        T::SCALAR
    }

    pub fn attribute_normalized(&self) -> bool {
        T::NORMALIZED
    }

    pub fn format(&self) -> AttributeFormat {
        T::FORMAT
    }
}

impl<T: VertexAttrib> Default for GpuBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for GpuBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("id", &self.id)
            .field("len", &self.len)
            .field("label", &self.label)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

/// Type-erased view of a vertex buffer, so buffers of different element types can be bound to the
/// same vertex array.
pub trait VertexSource {
    fn buffer_id(&self) -> Option<BufferId>;
    fn stride(&self) -> i32;
    fn attribute_format(&self) -> AttributeFormat;
    fn source_label(&self) -> &str;
}

impl<T: VertexAttrib> VertexSource for GpuBuffer<T> {
    fn buffer_id(&self) -> Option<BufferId> {
        self.id
    }

    fn stride(&self) -> i32 {
        size_of::<T>() as i32
    }

    fn attribute_format(&self) -> AttributeFormat {
        T::FORMAT
    }

    fn source_label(&self) -> &str {
        &self.label
    }
}
