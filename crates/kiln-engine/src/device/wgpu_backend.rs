//! [`GraphicsBackend`] on top of wgpu.
//!
//! wgpu has no immediate-mode draw calls, so draws are recorded and replayed
//! into a single render pass when something forces ordering:
//! - an upload or texture write touching a resource a recorded draw reads
//! - a fence, mipmap generation or resource destruction
//! - the end of the frame
//!
//! Persistent mapping is emulated with a CPU mirror per buffer. Ranges written
//! through `write_mapped` are pushed with `Queue::write_buffer` just before the
//! draw that reads them is recorded. Fences are flags flipped by
//! `Queue::on_submitted_work_done` and observed by polling the device.
//!
//! Programs must expose `vs_main`/`fs_main` and use this binding layout:
//! - group 0, binding 0: viewport uniform (`vec2<f32>` size, padded to 16 bytes)
//! - group 1, binding 0: `texture_2d<f32>` bound to unit 0
//! - group 1, binding 1: filtering sampler

use std::any::Any;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};

use crate::coords::{ColorRgba, Viewport};
use crate::error::RenderError;

use super::backend::{
    BufferDesc, BufferHandle, BufferKind, DrawPhase, FenceHandle, FenceStatus, GraphicsBackend,
    PixelRect, ProgramDesc, ProgramHandle, TextureDesc, TextureHandle,
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ViewportUniform {
    size: [f32; 2],
    _pad: [f32; 2],
}

fn premul_alpha_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: component, alpha: component }
}

struct ProgramSlot {
    opaque: wgpu::RenderPipeline,
    translucent: wgpu::RenderPipeline,
}

impl ProgramSlot {
    fn pipeline(&self, phase: DrawPhase) -> &wgpu::RenderPipeline {
        match phase {
            DrawPhase::Opaque => &self.opaque,
            DrawPhase::Translucent => &self.translucent,
        }
    }
}

struct BufferSlot {
    buffer: wgpu::Buffer,
    /// CPU copy for persistent buffers.
    mirror: Option<Vec<u8>>,
    pending: Option<Range<u64>>,
}

struct TextureSlot {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    mip_level_count: u32,
}

struct DepthTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

struct RecordedDraw {
    program: ProgramHandle,
    phase: DrawPhase,
    texture: TextureHandle,
    vertex: BufferHandle,
    index: BufferHandle,
    indices: Range<u32>,
}

#[derive(Debug, Copy, Clone)]
struct Bindings {
    program: Option<ProgramHandle>,
    texture: Option<TextureHandle>,
    vertex: Option<BufferHandle>,
    index: Option<BufferHandle>,
    phase: DrawPhase,
}

struct MipBlit {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl MipBlit {
    fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kiln mip blit shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mip_blit.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln mip blit bgl"),
            entries: &texture_layout_entries(),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kiln mip blit layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("kiln mip blit pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TEXTURE_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kiln mip blit sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self { pipeline, layout, sampler }
    }
}

fn texture_layout_entries() -> [wgpu::BindGroupLayoutEntry; 2] {
    [
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
    ]
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,

    target: Option<wgpu::TextureView>,
    depth: Option<DepthTarget>,
    warned_no_target: bool,

    viewport_buffer: wgpu::Buffer,
    viewport_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    mip_blit: Option<MipBlit>,

    next_id: u32,
    programs: HashMap<u32, ProgramSlot>,
    buffers: HashMap<u32, BufferSlot>,
    textures: HashMap<u32, TextureSlot>,
    fences: HashMap<u32, Arc<AtomicBool>>,

    bound: Bindings,
    recorded: Vec<RecordedDraw>,
    pending_clear: Option<wgpu::Color>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, target_format: wgpu::TextureFormat) -> Self {
        let viewport_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln viewport bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(size_of::<ViewportUniform>() as u64),
                },
                count: None,
            }],
        });

        let viewport_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kiln viewport ubo"),
            size: size_of::<ViewportUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let viewport_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln viewport bg"),
            layout: &viewport_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln texture bgl"),
            entries: &texture_layout_entries(),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kiln program layout"),
            bind_group_layouts: &[&viewport_layout, &texture_layout],
            immediate_size: 0,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kiln texture sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        Self {
            device,
            queue,
            target_format,
            target: None,
            depth: None,
            warned_no_target: false,
            viewport_buffer,
            viewport_bind_group,
            texture_layout,
            pipeline_layout,
            sampler,
            mip_blit: None,
            next_id: 1,
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            fences: HashMap::new(),
            bound: Bindings {
                program: None,
                texture: None,
                vertex: None,
                index: None,
                phase: DrawPhase::Opaque,
            },
            recorded: Vec::new(),
            pending_clear: None,
        }
    }

    /// Sets the colour target for the next frame.
    ///
    /// `physical` sizes the depth buffer; `viewport` is the logical space the
    /// vertex positions are expressed in.
    pub fn set_target(&mut self, view: wgpu::TextureView, physical: (u32, u32), viewport: Viewport) {
        self.flush_recorded();
        self.target = Some(view);

        if self.depth.as_ref().map(|d| d.size) != Some(physical) {
            self.depth = Some(self.create_depth(physical));
        }

        let uniform = ViewportUniform {
            size: [viewport.width.max(1.0), viewport.height.max(1.0)],
            _pad: [0.0; 2],
        };
        self.queue
            .write_buffer(&self.viewport_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    fn create_depth(&self, (width, height): (u32, u32)) -> DepthTarget {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kiln depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        DepthTarget { _texture: texture, view, size: (width, height) }
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn create_pipeline(
        &self,
        module: &wgpu::ShaderModule,
        desc: &ProgramDesc<'_>,
        phase: DrawPhase,
    ) -> wgpu::RenderPipeline {
        let blend = match phase {
            DrawPhase::Opaque => None,
            DrawPhase::Translucent => Some(premul_alpha_blend()),
        };

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: desc.vertex_stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: desc.attributes,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.target_format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: phase == DrawPhase::Opaque,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }

    fn reads_buffer(&self, buffer: BufferHandle) -> bool {
        self.recorded
            .iter()
            .any(|d| d.vertex == buffer || d.index == buffer)
    }

    fn reads_texture(&self, texture: TextureHandle) -> bool {
        self.recorded.iter().any(|d| d.texture == texture)
    }

    fn push_mapped(&mut self, buffer: BufferHandle) {
        let Some(slot) = self.buffers.get_mut(&buffer.raw()) else {
            return;
        };
        let (Some(mirror), Some(range)) = (slot.mirror.as_ref(), slot.pending.take()) else {
            return;
        };
        let bytes = &mirror[range.start as usize..range.end as usize];
        self.queue.write_buffer(&slot.buffer, range.start, bytes);
    }

    /// Replays recorded draws into one render pass and submits it.
    fn flush_recorded(&mut self) {
        if self.recorded.is_empty() && self.pending_clear.is_none() {
            return;
        }

        let (Some(target), Some(depth)) = (self.target.as_ref(), self.depth.as_ref()) else {
            if !self.warned_no_target {
                log::warn!("no render target set; dropping {} draws", self.recorded.len());
                self.warned_no_target = true;
            }
            self.recorded.clear();
            self.pending_clear = None;
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kiln draw encoder"),
            });

        {
            let (color_load, depth_load) = match self.pending_clear {
                Some(color) => (wgpu::LoadOp::Clear(color), wgpu::LoadOp::Clear(1.0)),
                None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
            };

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kiln draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_bind_group(0, &self.viewport_bind_group, &[]);

            for draw in &self.recorded {
                let (Some(program), Some(texture), Some(vertex), Some(index)) = (
                    self.programs.get(&draw.program.raw()),
                    self.textures.get(&draw.texture.raw()),
                    self.buffers.get(&draw.vertex.raw()),
                    self.buffers.get(&draw.index.raw()),
                ) else {
                    continue;
                };

                pass.set_pipeline(program.pipeline(draw.phase));
                pass.set_bind_group(1, &texture.bind_group, &[]);
                pass.set_vertex_buffer(0, vertex.buffer.slice(..));
                pass.set_index_buffer(index.buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(draw.indices.clone(), 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.recorded.clear();
        self.pending_clear = None;
    }
}

impl GraphicsBackend for WgpuBackend {
    /// Validation failures are reported through the device's uncaptured-error
    /// handler.
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, RenderError> {
        if desc.vertex_stride == 0 || desc.attributes.is_empty() {
            return Err(RenderError::Program {
                label: desc.label.to_string(),
                message: "program declares no vertex layout".to_string(),
            });
        }

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });

        let slot = ProgramSlot {
            opaque: self.create_pipeline(&module, desc, DrawPhase::Opaque),
            translucent: self.create_pipeline(&module, desc, DrawPhase::Translucent),
        };

        let id = self.alloc();
        self.programs.insert(id, slot);
        log::debug!("created program `{}` as #{id}", desc.label);
        Ok(ProgramHandle::from_raw(id))
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.recorded.iter().any(|d| d.program == program) {
            self.flush_recorded();
        }
        self.programs.remove(&program.raw());
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferHandle {
        let kind = match desc.kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let size = desc.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size,
            usage: kind | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let id = self.alloc();
        self.buffers.insert(
            id,
            BufferSlot {
                buffer,
                mirror: desc.persistent.then(|| vec![0; size as usize]),
                pending: None,
            },
        );
        BufferHandle::from_raw(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.reads_buffer(buffer) {
            self.flush_recorded();
        }
        self.buffers.remove(&buffer.raw());
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, offset: u64, bytes: &[u8]) {
        if self.reads_buffer(buffer) {
            self.flush_recorded();
        }
        if let Some(slot) = self.buffers.get(&buffer.raw()) {
            self.queue.write_buffer(&slot.buffer, offset, bytes);
        }
    }

    fn write_mapped(&mut self, buffer: BufferHandle, offset: u64, bytes: &[u8]) {
        let Some(slot) = self.buffers.get_mut(&buffer.raw()) else {
            return;
        };
        let Some(mirror) = slot.mirror.as_mut() else {
            log::warn!("write_mapped on non-persistent buffer {buffer:?}");
            return;
        };

        let end = offset + bytes.len() as u64;
        mirror[offset as usize..end as usize].copy_from_slice(bytes);
        slot.pending = Some(match slot.pending.take() {
            Some(r) => r.start.min(offset)..r.end.max(end),
            None => offset..end,
        });
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureHandle {
        let max_levels = 32 - desc.width.max(desc.height).max(1).leading_zeros();
        let mip_level_count = (desc.mip_levels + 1).min(max_levels);

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(desc.label),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let id = self.alloc();
        self.textures.insert(id, TextureSlot { texture, bind_group, mip_level_count });
        TextureHandle::from_raw(id)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.reads_texture(texture) {
            self.flush_recorded();
        }
        self.textures.remove(&texture.raw());
    }

    fn write_texture(&mut self, texture: TextureHandle, region: PixelRect, rgba: &[u8]) {
        if self.reads_texture(texture) {
            self.flush_recorded();
        }
        let Some(slot) = self.textures.get(&texture.raw()) else {
            return;
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &slot.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: region.x, y: region.y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(region.width * 4),
                rows_per_image: Some(region.height),
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn generate_mipmaps(&mut self, texture: TextureHandle) {
        if self.reads_texture(texture) {
            self.flush_recorded();
        }
        if self.mip_blit.is_none() {
            self.mip_blit = Some(MipBlit::new(&self.device));
        }
        let (Some(blit), Some(slot)) = (self.mip_blit.as_ref(), self.textures.get(&texture.raw()))
        else {
            return;
        };
        if slot.mip_level_count <= 1 {
            return;
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kiln mip encoder"),
            });

        let level_view = |level: u32| {
            slot.texture.create_view(&wgpu::TextureViewDescriptor {
                base_mip_level: level,
                mip_level_count: Some(1),
                ..Default::default()
            })
        };

        for level in 1..slot.mip_level_count {
            let source = level_view(level - 1);
            let dest = level_view(level);

            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("kiln mip blit bg"),
                layout: &blit.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&source),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&blit.sampler),
                    },
                ],
            });

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kiln mip blit pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &dest,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&blit.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.bound.program = Some(program);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        if unit == 0 {
            self.bound.texture = Some(texture);
        } else {
            log::trace!("texture unit {unit} is not sampled by the wgpu backend");
        }
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle, _stride: u64) {
        self.bound.vertex = Some(buffer);
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle) {
        self.bound.index = Some(buffer);
    }

    fn set_phase(&mut self, phase: DrawPhase) {
        self.bound.phase = phase;
    }

    fn draw_indexed(&mut self, first_index: u32, index_count: u32) {
        let Bindings { program, texture, vertex, index, phase } = self.bound;
        let (Some(program), Some(texture), Some(vertex), Some(index)) =
            (program, texture, vertex, index)
        else {
            log::warn!("draw_indexed with incomplete bindings: {:?}", self.bound);
            return;
        };

        self.push_mapped(vertex);
        self.recorded.push(RecordedDraw {
            program,
            phase,
            texture,
            vertex,
            index,
            indices: first_index..first_index + index_count,
        });
    }

    fn insert_fence(&mut self) -> FenceHandle {
        self.flush_recorded();

        let flag = Arc::new(AtomicBool::new(false));
        let signal = Arc::clone(&flag);
        self.queue
            .on_submitted_work_done(move || signal.store(true, Ordering::Release));

        let id = self.alloc();
        self.fences.insert(id, flag);
        FenceHandle::from_raw(id)
    }

    fn client_wait(&mut self, fence: FenceHandle, timeout: Duration) -> FenceStatus {
        let Some(flag) = self.fences.get(&fence.raw()) else {
            return FenceStatus::Signalled;
        };

        let deadline = Instant::now() + timeout;
        loop {
            if flag.load(Ordering::Acquire) {
                return FenceStatus::Signalled;
            }
            let _ = self.device.poll(wgpu::PollType::Poll);
            if flag.load(Ordering::Acquire) {
                return FenceStatus::Signalled;
            }
            if Instant::now() >= deadline {
                return FenceStatus::TimedOut;
            }
            std::thread::yield_now();
        }
    }

    fn delete_fence(&mut self, fence: FenceHandle) {
        self.fences.remove(&fence.raw());
    }

    fn begin_frame(&mut self, clear: ColorRgba) {
        self.pending_clear = Some(clear.to_wgpu());
    }

    fn end_frame(&mut self) {
        self.flush_recorded();
        self.target = None;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
