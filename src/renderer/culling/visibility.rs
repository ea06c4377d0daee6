//! Visibility state store
//!
//! Owns the only state that crosses frame boundaries: the per-instance and
//! per-meshlet visibility bitmasks, plus the fixed-capacity command buffers
//! and their atomic counters. The bitmasks are cleared lazily exactly once
//! (first frame after creation) and never again; from then on only the cull
//! shaders mutate them. Counters reset at the start of every cull pass.

use crate::renderer::culling::commands::{
    MESHLET_COUNTER_BYTES, MESHLET_DRAW_BUFFER_BYTES, TASK_COMMAND_BUFFER_BYTES,
    TASK_COUNTER_BYTES,
};

/// Words needed to hold one visibility bit per slot
pub fn bitmask_words(slots: u32) -> u32 {
    (slots + 31) / 32
}

pub struct VisibilityState {
    draw_visibility: wgpu::Buffer,
    meshlet_visibility: wgpu::Buffer,
    task_commands: wgpu::Buffer,
    task_counter: wgpu::Buffer,
    meshlet_draws: wgpu::Buffer,
    meshlet_counter: wgpu::Buffer,

    draw_visibility_cleared: bool,
    meshlet_visibility_cleared: bool,
}

impl VisibilityState {
    pub fn new(device: &wgpu::Device, draw_count: u32, meshlet_visibility_slots: u32) -> Self {
        let bitmask = |label: &str, slots: u32| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: (bitmask_words(slots).max(1) as u64) * 4,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let draw_visibility = bitmask("Draw Visibility Bitmask", draw_count);
        let meshlet_visibility = bitmask("Meshlet Visibility Bitmask", meshlet_visibility_slots);

        let task_commands = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Task Command Buffer"),
            size: TASK_COMMAND_BUFFER_BYTES,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let task_counter = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Task Command Counter"),
            size: TASK_COUNTER_BYTES,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let meshlet_draws = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Meshlet Draw Buffer"),
            size: MESHLET_DRAW_BUFFER_BYTES,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let meshlet_counter = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Meshlet Draw Counter"),
            size: MESHLET_COUNTER_BYTES,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Self {
            draw_visibility,
            meshlet_visibility,
            task_commands,
            task_counter,
            meshlet_draws,
            meshlet_counter,
            draw_visibility_cleared: false,
            meshlet_visibility_cleared: false,
        }
    }

    /// One-shot lazy clear of the persistent bitmasks, recorded into the
    /// first frame's encoder. Re-running is a no-op; the bitmasks are never
    /// cleared again for the lifetime of the state.
    pub fn ensure_cleared(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if !self.draw_visibility_cleared {
            encoder.clear_buffer(&self.draw_visibility, 0, None);
            self.draw_visibility_cleared = true;
        }
        if !self.meshlet_visibility_cleared {
            encoder.clear_buffer(&self.meshlet_visibility, 0, None);
            self.meshlet_visibility_cleared = true;
        }
    }

    /// Zero both atomic counters (and the indirect args behind them) before
    /// a cull pass starts producing.
    pub fn reset_counters(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.task_counter, 0, None);
        encoder.clear_buffer(&self.meshlet_counter, 0, None);
    }

    pub fn draw_visibility(&self) -> &wgpu::Buffer {
        &self.draw_visibility
    }

    pub fn meshlet_visibility(&self) -> &wgpu::Buffer {
        &self.meshlet_visibility
    }

    pub fn task_commands(&self) -> &wgpu::Buffer {
        &self.task_commands
    }

    pub fn task_counter(&self) -> &wgpu::Buffer {
        &self.task_counter
    }

    pub fn meshlet_draws(&self) -> &wgpu::Buffer {
        &self.meshlet_draws
    }

    pub fn meshlet_counter(&self) -> &wgpu::Buffer {
        &self.meshlet_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmask_word_rounding() {
        assert_eq!(bitmask_words(0), 0);
        assert_eq!(bitmask_words(1), 1);
        assert_eq!(bitmask_words(32), 1);
        assert_eq!(bitmask_words(33), 2);
        assert_eq!(bitmask_words(4096), 128);
    }
}
