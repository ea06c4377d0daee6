//! Per-resolution render targets
//!
//! Gbuffer, depth, and the depth pyramid live exactly as long as one
//! presentation resolution; a resize drops and recreates all of them
//! (including every pyramid mip view) before any pass of the frame encodes.

use crate::constants::frame::GBUFFER_COUNT;
use crate::renderer::pyramid::DepthPyramid;

pub const GBUFFER_FORMATS: [wgpu::TextureFormat; GBUFFER_COUNT] = [
    wgpu::TextureFormat::Rgba8Unorm,
    wgpu::TextureFormat::Rgb10a2Unorm,
];
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct RenderTargets {
    width: u32,
    height: u32,
    gbuffer_views: Vec<wgpu::TextureView>,
    depth_view: wgpu::TextureView,
    pyramid: DepthPyramid,
    // textures kept alive behind the views
    _gbuffer: Vec<wgpu::Texture>,
    _depth: wgpu::Texture,
}

impl RenderTargets {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);

        let mut gbuffer = Vec::with_capacity(GBUFFER_COUNT);
        let mut gbuffer_views = Vec::with_capacity(GBUFFER_COUNT);
        for (i, format) in GBUFFER_FORMATS.iter().enumerate() {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("Gbuffer {}", i)),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: *format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            gbuffer_views.push(texture.create_view(&wgpu::TextureViewDescriptor::default()));
            gbuffer.push(texture);
        }

        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let pyramid = DepthPyramid::new(device, width, height);

        Self {
            width,
            height,
            gbuffer_views,
            depth_view,
            pyramid,
            _gbuffer: gbuffer,
            _depth: depth,
        }
    }

    /// Recreate everything when the presentation size changed. Returns true
    /// if targets were rebuilt (callers must drop stale bind groups).
    pub fn resize_if_needed(&mut self, device: &wgpu::Device, width: u32, height: u32) -> bool {
        if self.width == width.max(1) && self.height == height.max(1) {
            return false;
        }
        log::info!("render targets: resize to {}x{}", width, height);
        *self = Self::new(device, width, height);
        true
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn gbuffer_view(&self, index: usize) -> &wgpu::TextureView {
        &self.gbuffer_views[index]
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    pub fn pyramid(&self) -> &DepthPyramid {
        &self.pyramid
    }
}
