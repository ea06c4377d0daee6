//! GPU context bootstrap
//!
//! Thin instance/adapter/device setup shared by the binaries and the GPU
//! integration tests, plus a blocking buffer readback used only by
//! diagnostics and tests (the frame loop itself never reads back).

use std::sync::Arc;

use crate::error::{gpu_operation_error, EngineError, EngineResult};

pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    /// Context without a presentation surface (benchmarks, tests).
    pub async fn headless() -> EngineResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        Self::from_instance(instance, None).await
    }

    /// Context plus a surface for the given window.
    pub async fn with_surface(
        window: Arc<winit::window::Window>,
    ) -> EngineResult<(Self, wgpu::Surface<'static>)> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window)
            .map_err(|e| gpu_operation_error("create surface", e))?;
        let context = Self::from_instance(instance, Some(&surface)).await?;
        Ok((context, surface))
    }

    async fn from_instance(
        instance: wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> EngineResult<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(EngineError::AdapterNotFound)?;

        let info = adapter.get_info();
        log::info!("adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Renderer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await?;

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Copy `size` bytes of a COPY_SRC buffer back to the CPU. Blocks on
    /// the device; diagnostics/test use only.
    pub async fn read_buffer(&self, buffer: &wgpu::Buffer, size: u64) -> EngineResult<Vec<u8>> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).ok();
        });
        self.device.poll(wgpu::Maintain::Wait);

        receiver
            .await
            .ok()
            .and_then(|r| r.ok())
            .ok_or(EngineError::BufferMap {
                buffer: "readback staging".to_string(),
            })?;

        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }
}
