//! Game of Life on a compute device.
//!
//! The two generation buffers live on the GPU. Two bind groups are built up
//! front, one per direction (`buf_1 -> buf_2` and `buf_2 -> buf_1`), and
//! `flipped_bufs` picks the one to dispatch. Every step is submitted on its
//! own, so step `n + 1` never starts reading before step `n` has finished
//! writing.

use bytemuck::{Pod, Zeroable};
use futures_intrusive::channel::shared::oneshot_channel;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, Buffer, BufferDescriptor, BufferUsages, CommandEncoderDescriptor,
    ComputePipeline, Device, Instance, PipelineLayoutDescriptor, Queue, ShaderStages,
    util::{BufferInitDescriptor, DeviceExt},
};

use crate::{
    grid::{Generation, GridError, GridSize},
    sim::{LifeEngine, Seeding},
};

/// Workgroup edge length, must match `@workgroup_size` in `shader.wgsl`.
const WORKGROUP_SIZE: u32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    #[error("adapter {0} does not support compute shaders")]
    NoComputeShaders(String),
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    #[error("buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),
    #[error("buffer mapping callback was dropped")]
    MapCancelled,
    #[error("{size} grid exceeds device limits: {limit}")]
    GridTooLarge { size: GridSize, limit: &'static str },
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct GridUniform {
    width: u32,
    height: u32,
    _padding: [u32; 2],
}

pub struct GpuLife {
    buf_1: Buffer,
    buf_2: Buffer,
    cells_bg: BindGroup,
    cells_bg_rev: BindGroup,
    size_bind_group: BindGroup,
    flipped_bufs: bool,
    steps: u64,
    pipeline: ComputePipeline,
    queue: Queue,
    device: Device,
    size: GridSize,
}

impl GpuLife {
    /// Request a device, upload `start` into the first buffer and zero the second.
    pub async fn create(start: &Generation) -> Result<Self, GpuError> {
        let size = start.size();
        let instance = Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await?;
        let info = adapter.get_info();
        log::info!("Using adapter: {} ({:?})", info.name, info.backend);

        let downlevel_caps = adapter.get_downlevel_capabilities();
        if !downlevel_caps
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(GpuError::NoComputeShaders(info.name));
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lifesim device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await?;
        check_limits(size, &device.limits())?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("life step shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("./shader.wgsl").into()),
        });

        let buf_1 = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("cells buffer 1"),
            contents: bytemuck::cast_slice(&widen(start.cells())),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
        });
        let buf_2 = device.create_buffer(&BufferDescriptor {
            label: Some("cells buffer 2"),
            size: buf_1.size(),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let cells_bg_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("cells bind group layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let cells_bg = device.create_bind_group(&BindGroupDescriptor {
            label: Some("cells bind group (buf1 -> buf2)"),
            layout: &cells_bg_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: buf_1.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: buf_2.as_entire_binding(),
                },
            ],
        });
        let cells_bg_rev = device.create_bind_group(&BindGroupDescriptor {
            label: Some("cells bind group (buf2 -> buf1)"),
            layout: &cells_bg_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: buf_2.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: buf_1.as_entire_binding(),
                },
            ],
        });

        let size_bg_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("grid size bind group layout"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let size_buf = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("grid size buffer"),
            contents: bytemuck::bytes_of(&GridUniform {
                width: size.width() as u32,
                height: size.height() as u32,
                _padding: [0; 2],
            }),
            usage: BufferUsages::UNIFORM,
        });
        let size_bg = device.create_bind_group(&BindGroupDescriptor {
            label: Some("grid size bind group"),
            layout: &size_bg_layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: size_buf.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("life pipeline layout"),
            bind_group_layouts: &[&cells_bg_layout, &size_bg_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("life compute pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            buf_1,
            buf_2,
            cells_bg,
            cells_bg_rev,
            size_bind_group: size_bg,
            flipped_bufs: false,
            steps: 0,
            pipeline,
            queue,
            device,
            size,
        })
    }

    fn current_buffer(&self) -> &Buffer {
        if self.flipped_bufs {
            &self.buf_2
        } else {
            &self.buf_1
        }
    }

    /// Copy the current buffer back to the host.
    pub fn read_back(&self) -> Result<Vec<u8>, GpuError> {
        let staging = self.device.create_buffer(&BufferDescriptor {
            label: Some("snapshot staging buffer"),
            size: self.buf_1.size(),
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("snapshot encoder"),
            });
        encoder.copy_buffer_to_buffer(self.current_buffer(), 0, &staging, 0, self.buf_1.size());
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        self.device.poll(wgpu::PollType::wait_indefinitely())?;
        pollster::block_on(rx.receive()).ok_or(GpuError::MapCancelled)??;

        let cells = {
            let view = slice.get_mapped_range();
            let cells: &[u32] = bytemuck::cast_slice(&view[..]);
            cells.iter().map(|&c| c as u8).collect()
        };
        staging.unmap();
        Ok(cells)
    }
}

impl LifeEngine for GpuLife {
    fn size(&self) -> GridSize {
        self.size
    }

    fn steps(&self) -> u64 {
        self.steps
    }

    fn step(&mut self) {
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("life step encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("life step compute pass"),
                ..Default::default()
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(
                0,
                if self.flipped_bufs {
                    &self.cells_bg_rev
                } else {
                    &self.cells_bg
                },
                &[],
            );
            pass.set_bind_group(1, &self.size_bind_group, &[]);
            pass.dispatch_workgroups(
                (self.size.width() as u32).div_ceil(WORKGROUP_SIZE),
                (self.size.height() as u32).div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.flipped_bufs = !self.flipped_bufs;
        self.steps += 1;
    }

    fn reset(&mut self, seeding: &Seeding, rng: &mut fastrand::Rng) -> Result<(), GridError> {
        let cells = seeding.generate(self.size, rng)?;
        let live = cells.iter().filter(|&&c| c == 1).count();
        self.queue
            .write_buffer(&self.buf_1, 0, bytemuck::cast_slice(&widen(&cells)));
        self.queue.write_buffer(
            &self.buf_2,
            0,
            bytemuck::cast_slice(&vec![0u32; self.size.len()]),
        );
        self.flipped_bufs = false;
        self.steps = 0;
        log::info!("gpu engine reset ({live} live cells)");
        Ok(())
    }

    fn snapshot(&self) -> anyhow::Result<Generation> {
        let cells = self.read_back()?;
        Ok(Generation::from_cells(self.size, cells)?)
    }

    fn backend_name(&self) -> &'static str {
        "gpu"
    }
}

/// Reject grids whose buffers or dispatch would fail device validation.
fn check_limits(size: GridSize, limits: &wgpu::Limits) -> Result<(), GpuError> {
    let bytes = size.len() as u64 * size_of::<u32>() as u64;
    let too_large = |limit| Err(GpuError::GridTooLarge { size, limit });
    if bytes > limits.max_buffer_size {
        return too_large("max_buffer_size");
    }
    if bytes > u64::from(limits.max_storage_buffer_binding_size) {
        return too_large("max_storage_buffer_binding_size");
    }
    let groups_x = (size.width() as u32).div_ceil(WORKGROUP_SIZE);
    let groups_y = (size.height() as u32).div_ceil(WORKGROUP_SIZE);
    if groups_x.max(groups_y) > limits.max_compute_workgroups_per_dimension {
        return too_large("max_compute_workgroups_per_dimension");
    }
    Ok(())
}

fn widen(cells: &[u8]) -> Vec<u32> {
    cells.iter().map(|&c| c as u32).collect()
}
