use crate::error::{ParticleSystemError, Result};
use crate::feedback_device::FeedbackDevice;
use crate::particle::{seed_particles, ParticleLayout};

/// Two particle buffers used alternately as pass input and capture target.
///
/// `bindings[0]` reads buffer 0 and writes buffer 1, `bindings[1]` the
/// reverse, so the binding for the current source is always `bindings[source]`.
pub struct FeedbackBuffers<D: FeedbackDevice> {
    buffers: [D::Buffer; 2],
    bindings: [D::Binding; 2],
    source: usize,
}

impl<D: FeedbackDevice> FeedbackBuffers<D> {
    /// Seeds buffer 0 with `capacity` random particles and leaves buffer 1 for
    /// the first pass to fill.
    pub fn new(
        device: &mut D,
        program: &D::Program,
        capacity: u32,
        seed: Option<u64>,
    ) -> Result<Self> {
        // Checked before the seed data is generated on the host.
        let size = ParticleLayout::buffer_size(capacity);
        let max = device.max_buffer_size();
        if size > max {
            return Err(ParticleSystemError::BufferAllocation {
                label: "Tornado particles".to_string(),
                reason: format!("{} bytes exceeds the device limit of {} bytes", size, max),
            });
        }
        let initial = seed_particles(capacity, seed);
        let a = device.create_particle_buffer("Tornado particles A", capacity, Some(&initial))?;
        let b = device.create_particle_buffer("Tornado particles B", capacity, None)?;
        let forward = device.create_binding(program, &a, &b)?;
        let backward = device.create_binding(program, &b, &a)?;
        Ok(FeedbackBuffers {
            buffers: [a, b],
            bindings: [forward, backward],
            source: 0,
        })
    }

    /// Holds the most recently written particle state.
    pub fn source(&self) -> &D::Buffer {
        &self.buffers[self.source]
    }

    pub fn dest(&self) -> &D::Buffer {
        &self.buffers[1 - self.source]
    }

    /// Binding that reads `source()` and writes `dest()`.
    pub fn source_binding(&self) -> &D::Binding {
        &self.bindings[self.source]
    }

    pub fn source_index(&self) -> usize {
        self.source
    }

    pub fn swap(&mut self) {
        self.source = 1 - self.source;
    }
}
