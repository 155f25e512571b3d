//! wgpu rendering of a filter chain.
//!
//! Every pass is a fullscreen triangle drawn into an `Rgba8Unorm` texture
//! while sampling the previous pass's output. Two textures are swapped
//! between passes; the base image is uploaded once and the final texture is
//! read back once. Bindings follow [`crate::core::gpu`].

use crate::chain::FilterChain;
use crate::core::buffer::PixelBuffer;
use crate::core::gpu::{GpuError, GpuProgram};
use crate::execution::cache::{CacheStats, ProgramCache, DEFAULT_CAPACITY};
use log::{debug, info, trace};
use std::borrow::Cow;
use wgpu::util::DeviceExt;

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A compiled program variant.
struct CompiledProgram {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
}

/// Renders filter chains on a wgpu device.
pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    sampler: wgpu::Sampler,
    programs: ProgramCache<CompiledProgram>,
    adapter_name: String,
    max_dimension: u32,
}

impl GpuRenderer {
    /// Open the default adapter, blocking until the device is ready.
    pub fn new() -> Result<Self, GpuError> {
        Self::with_cache_capacity(DEFAULT_CAPACITY)
    }

    /// Like [`new`](Self::new) with a custom compiled-program cache size.
    pub fn with_cache_capacity(capacity: usize) -> Result<Self, GpuError> {
        pollster::block_on(Self::new_async(capacity))
    }

    /// Open the default adapter.
    pub async fn new_async(capacity: usize) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let adapter_name = adapter.get_info().name;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("prisma_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| GpuError::DeviceRequest(e.to_string()))?;

        let max_dimension = device.limits().max_texture_dimension_2d;
        info!(
            "GPU renderer on '{}' (max texture {}px)",
            adapter_name, max_dimension
        );

        // Nearest + clamp-to-edge reproduces the CPU path's coordinate clamping.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("prisma_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            device,
            queue,
            sampler,
            programs: ProgramCache::new(capacity),
            adapter_name,
            max_dimension,
        })
    }

    /// Name reported by the adapter.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Compiled-program cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.programs.stats()
    }

    /// Render `chain` over `base`.
    ///
    /// Neutral entries are skipped. Returns the output and the number of
    /// passes drawn.
    pub fn render(
        &mut self,
        chain: &FilterChain,
        base: &PixelBuffer,
    ) -> Result<(PixelBuffer, usize), GpuError> {
        let programs: Vec<GpuProgram> = chain
            .iter()
            .filter(|(_, f)| !f.is_neutral())
            .flat_map(|(name, f)| {
                trace!("Collecting programs for '{}' ({})", name, f.metadata().id);
                f.programs()
            })
            .collect();

        if programs.is_empty() {
            return Ok((base.clone(), 0));
        }

        let (width, height) = base.dimensions();
        if width > self.max_dimension || height > self.max_dimension {
            return Err(GpuError::TextureTooLarge {
                width,
                height,
                max: self.max_dimension,
            });
        }

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let textures = [
            self.create_texture("prisma_ping", extent),
            self.create_texture("prisma_pong", extent),
        ];
        let views = [
            textures[0].create_view(&wgpu::TextureViewDescriptor::default()),
            textures[1].create_view(&wgpu::TextureViewDescriptor::default()),
        ];

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &textures[0],
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            base.data(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            extent,
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("prisma_chain"),
            });

        let mut current = 0;
        for program in &programs {
            let target = 1 - current;
            self.encode_pass(
                &mut encoder,
                program,
                &views[current],
                &views[target],
                width,
                height,
            )?;
            current = target;
        }

        let output = self.read_back(encoder, &textures[current], extent)?;
        debug!(
            "GPU rendered {} passes over {}x{}",
            programs.len(),
            width,
            height
        );
        Ok((output, programs.len()))
    }

    fn create_texture(&self, label: &str, extent: wgpu::Extent3d) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    fn encode_pass(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        program: &GpuProgram,
        source: &wgpu::TextureView,
        target: &wgpu::TextureView,
        width: u32,
        height: u32,
    ) -> Result<(), GpuError> {
        let device = &self.device;
        let compiled = self
            .programs
            .get_or_try_insert(program.key(), || compile(device, program))?;

        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("prisma_params"),
            contents: &program.uniform_bytes(width, height),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let table = program.table().map(|table| {
            // Zero-sized storage bindings are invalid.
            let mut values = table.values.clone();
            if values.is_empty() {
                values.push(0.0);
            }
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("prisma_table"),
                contents: bytemuck::cast_slice(&values),
                usage: wgpu::BufferUsages::STORAGE,
            })
        });

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(source),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: uniforms.as_entire_binding(),
            },
        ];
        if let Some(buffer) = &table {
            entries.push(wgpu::BindGroupEntry {
                binding: 3,
                resource: buffer.as_entire_binding(),
            });
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.key()),
            layout: &compiled.layout,
            entries: &entries,
        });

        trace!("Encoding pass '{}'", program.key());
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(program.key()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&compiled.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    fn read_back(
        &self,
        mut encoder: wgpu::CommandEncoder,
        texture: &wgpu::Texture,
        extent: wgpu::Extent3d,
    ) -> Result<PixelBuffer, GpuError> {
        let (width, height) = (extent.width, extent.height);
        let unpadded = 4 * width;
        let padded = padded_bytes_per_row(width);

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("prisma_readback"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            extent,
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| GpuError::Readback(e.to_string()))?
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        let mut data = Vec::with_capacity((unpadded * height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded as usize) {
                data.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        staging.unmap();

        PixelBuffer::from_raw(width, height, data).map_err(|e| GpuError::Readback(e.to_string()))
    }
}

impl std::fmt::Debug for GpuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuRenderer")
            .field("adapter", &self.adapter_name)
            .field("max_dimension", &self.max_dimension)
            .field("cached_programs", &self.programs.len())
            .finish()
    }
}

/// Row pitch for texture-to-buffer copies.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (4 * width).div_ceil(align) * align
}

fn compile(device: &wgpu::Device, program: &GpuProgram) -> Result<CompiledProgram, GpuError> {
    debug!("Compiling program '{}'", program.key());
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(program.key()),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(program.source())),
    });

    let mut layout_entries = vec![
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
    ];
    if program.table().is_some() {
        layout_entries.push(wgpu::BindGroupLayoutEntry {
            binding: 3,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(program.key()),
        entries: &layout_entries,
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(program.key()),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(program.key()),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: TEXTURE_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(GpuError::Pipeline {
            key: program.key().to_string(),
            message: error.to_string(),
        }),
        None => Ok(CompiledProgram { pipeline, layout }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }
}
