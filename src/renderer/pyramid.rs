//! Depth pyramid builder
//!
//! Hierarchical min-reduction of the depth buffer into an R32Float mip
//! chain used by the occlusion tests. The base level is the largest
//! power-of-two not exceeding the render target, which keeps every
//! reduction step within a 2x2 footprint — the conservativeness the
//! occlusion test relies on. Under reverse-Z the minimum is the farthest
//! depth, so a freshly zero-initialized pyramid occludes nothing.

use crate::constants::frame::MAX_PYRAMID_LEVELS;
use crate::error::EngineResult;
use crate::renderer::pipelines::ShaderPrograms;

/// Largest power of two less than or equal to `v`
pub fn previous_pow2(v: u32) -> u32 {
    debug_assert!(v >= 1);
    let mut r = 1;
    while r * 2 <= v {
        r *= 2;
    }
    r
}

/// Full mip chain length for a base level of `width` x `height`
pub fn mip_levels(width: u32, height: u32) -> u32 {
    (width.max(height) as f32).log2().ceil() as u32 + 1
}

/// Dimensions of pyramid level `level`
pub fn level_dims(base_width: u32, base_height: u32, level: u32) -> (u32, u32) {
    ((base_width >> level).max(1), (base_height >> level).max(1))
}

pub struct DepthPyramid {
    texture: wgpu::Texture,
    /// One single-mip view per level, for storage writes and per-level reads
    mip_views: Vec<wgpu::TextureView>,
    /// Whole-chain view sampled by the cull shaders
    full_view: wgpu::TextureView,
    width: u32,
    height: u32,
    levels: u32,
}

impl DepthPyramid {
    /// Create the pyramid for a render target of the given size.
    pub fn new(device: &wgpu::Device, target_width: u32, target_height: u32) -> Self {
        let width = previous_pow2(target_width.max(1));
        let height = previous_pow2(target_height.max(1));
        let levels = mip_levels(width, height).min(MAX_PYRAMID_LEVELS as u32);

        log::debug!(
            "depth pyramid: {}x{} ({} levels) for target {}x{}",
            width,
            height,
            levels,
            target_width,
            target_height
        );

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Pyramid"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::STORAGE_BINDING,
            view_formats: &[],
        });

        let mut mip_views = Vec::with_capacity(levels as usize);
        for level in 0..levels {
            mip_views.push(texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some(&format!("Depth Pyramid Mip {} View", level)),
                format: Some(wgpu::TextureFormat::R32Float),
                dimension: Some(wgpu::TextureViewDimension::D2),
                aspect: wgpu::TextureAspect::All,
                base_mip_level: level,
                mip_level_count: Some(1),
                base_array_layer: 0,
                array_layer_count: None,
            }));
        }

        let full_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Depth Pyramid Full View"),
            ..Default::default()
        });

        Self {
            texture,
            mip_views,
            full_view,
            width,
            height,
            levels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    pub fn full_view(&self) -> &wgpu::TextureView {
        &self.full_view
    }

    pub fn mip_view(&self, level: u32) -> &wgpu::TextureView {
        &self.mip_views[level as usize]
    }

    /// Record the full reduction chain: one dispatch per level, the first
    /// reading the real depth buffer, each later one reading the level
    /// above it. Ordering between levels is the write→read dependency on
    /// the previous mip.
    pub fn build(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        programs: &ShaderPrograms,
        depth_view: &wgpu::TextureView,
    ) -> EngineResult<()> {
        let first_pipeline = programs.compute("depth-reduce-first")?;
        let mip_pipeline = programs.compute("depth-reduce-mip")?;

        let mut bind_groups = Vec::with_capacity(self.levels as usize);
        for level in 0..self.levels {
            let bind_group = if level == 0 {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Depth Reduce Bind Group (first)"),
                    layout: programs.layout("depth-reduce-first")?,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(depth_view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(self.mip_view(0)),
                        },
                    ],
                })
            } else {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Depth Reduce Bind Group"),
                    layout: programs.layout("depth-reduce-mip")?,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(self.mip_view(level)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(self.mip_view(level - 1)),
                        },
                    ],
                })
            };
            bind_groups.push(bind_group);
        }

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Depth Pyramid Pass"),
            timestamp_writes: None,
        });

        for level in 0..self.levels {
            let (w, h) = level_dims(self.width, self.height, level);
            pass.set_pipeline(if level == 0 { first_pipeline } else { mip_pipeline });
            pass.set_bind_group(0, &bind_groups[level as usize], &[]);
            pass.dispatch_workgroups((w + 7) / 8, (h + 7) / 8, 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_pow2_values() {
        assert_eq!(previous_pow2(1), 1);
        assert_eq!(previous_pow2(2), 2);
        assert_eq!(previous_pow2(3), 2);
        assert_eq!(previous_pow2(600), 512);
        assert_eq!(previous_pow2(800), 512);
        assert_eq!(previous_pow2(1024), 1024);
        assert_eq!(previous_pow2(1080), 1024);
        assert_eq!(previous_pow2(1920), 1024);
        assert_eq!(previous_pow2(3840), 2048);
    }

    #[test]
    fn level_count_covers_full_chain() {
        assert_eq!(mip_levels(1024, 512), 11);
        assert_eq!(mip_levels(512, 512), 10);
        assert_eq!(mip_levels(1, 1), 1);
    }

    #[test]
    fn level_dims_halve_and_clamp() {
        assert_eq!(level_dims(1024, 512, 0), (1024, 512));
        assert_eq!(level_dims(1024, 512, 1), (512, 256));
        assert_eq!(level_dims(1024, 512, 9), (2, 1));
        assert_eq!(level_dims(1024, 512, 10), (1, 1));
    }

    #[test]
    fn resize_scenario_dimensions() {
        // shrinking 1920x1080 -> 800x600 must rebuild at previous_pow2 dims
        let (w0, h0) = (previous_pow2(1920), previous_pow2(1080));
        assert_eq!((w0, h0), (1024, 1024));
        let (w1, h1) = (previous_pow2(800), previous_pow2(600));
        assert_eq!((w1, h1), (512, 512));
        assert_eq!(mip_levels(w1, h1), 10);
    }
}
