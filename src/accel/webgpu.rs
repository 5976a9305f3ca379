//! wgpu-backed accelerator.
//!
//! The adapter, device, queue and compiled add pipeline are created once at
//! probe time; each timed call only allocates buffers and dispatches.

use super::{Accelerator, AcceleratorError};
use crate::schema::DeviceInfo;
use log::debug;
use std::num::NonZeroU64;
use std::time::{Duration, Instant};

const WORKGROUP_SIZE: u32 = 256;

// The dispatch may be split over two dimensions when the group count exceeds
// the per-dimension limit, so the flat index folds in `gid.y`.
const ADD_SHADER: &str = r#"
@group(0) @binding(0)
var<storage, read> a: array<f32>;
@group(0) @binding(1)
var<storage, read> b: array<f32>;
@group(0) @binding(2)
var<storage, read_write> out: array<f32>;

@compute @workgroup_size(256)
fn add(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let i = gid.x + gid.y * groups.x * 256u;
    if (i >= arrayLength(&a)) {
        return;
    }
    out[i] = a[i] + b[i];
}
"#;

pub struct WgpuAccelerator {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<f32>() as u64),
        },
        count: None,
    }
}

/// (x, y) workgroup grid covering `total_groups` within the per-dimension limit.
fn split_workgroups(total_groups: u32, limit: u32) -> (u32, u32) {
    if total_groups <= limit {
        (total_groups, 1)
    } else {
        (limit, total_groups.div_ceil(limit))
    }
}

/// PCI vendor name for the vendor ids wgpu reports most often.
fn vendor_name(vendor: u32) -> Option<&'static str> {
    match vendor {
        0x10de => Some("NVIDIA"),
        0x1002 => Some("AMD"),
        0x8086 => Some("Intel"),
        0x106b => Some("Apple"),
        0x5143 => Some("Qualcomm"),
        0x13b5 => Some("ARM"),
        _ => None,
    }
}

/// Name for adapters that report none, built from the PCI ids.
fn fallback_device_name(vendor: u32, device: u32) -> String {
    match vendor_name(vendor) {
        Some(v) => format!("{v} GPU 0x{device:04x}"),
        None => format!("GPU 0x{vendor:04x}:0x{device:04x}"),
    }
}

impl WgpuAccelerator {
    /// Picks the high-performance adapter and compiles the add pipeline.
    ///
    /// Software adapters (llvmpipe, WARP) are rejected.
    pub fn new() -> Result<Self, AcceleratorError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            ..Default::default()
        }))
        .map_err(|e| AcceleratorError::Init(format!("no suitable GPU adapter: {e}")))?;

        let info = adapter.get_info();
        debug!("wgpu adapter: {} ({:?}, {:?})", info.name, info.backend, info.device_type);
        if info.device_type == wgpu::DeviceType::Cpu {
            return Err(AcceleratorError::Init(format!(
                "only a software adapter is available ({})",
                info.name
            )));
        }
        if !adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(AcceleratorError::Init(format!(
                "adapter {} does not support compute shaders",
                info.name
            )));
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("vector_add_device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| AcceleratorError::Init(format!("failed to create GPU device: {e}")))?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("vector_add_shader"),
            source: wgpu::ShaderSource::Wgsl(ADD_SHADER.into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vector_add_layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("vector_add_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("vector_add_pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("add"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        Ok(Self {
            adapter,
            device,
            queue,
            layout,
            pipeline,
        })
    }

    fn storage_buffer(&self, label: &str, len: usize, copy_dst: bool) -> wgpu::Buffer {
        let mut usage = wgpu::BufferUsages::STORAGE;
        if copy_dst {
            usage |= wgpu::BufferUsages::COPY_DST;
        }
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (len * std::mem::size_of::<f32>()) as u64,
            usage,
            mapped_at_creation: false,
        })
    }

    fn synchronize(&self) -> Result<(), AcceleratorError> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|e| AcceleratorError::Execution(format!("device synchronization failed: {e}")))
    }

    fn adapter_info(&self) -> DeviceInfo {
        let info = self.adapter.get_info();
        let name = if info.name.trim().is_empty() {
            fallback_device_name(info.vendor, info.device)
        } else {
            info.name.clone()
        };
        DeviceInfo {
            name,
            // wgpu does not expose total device memory.
            memory_bytes: None,
            runtime_version: Some(format!("{:?} {}", info.backend, info.driver_info)),
            library_version: Some(info.driver),
        }
    }
}

impl Accelerator for WgpuAccelerator {
    fn device_info(&self) -> Result<DeviceInfo, AcceleratorError> {
        let adapter = self.adapter_info();

        #[cfg(feature = "nvml")]
        {
            match super::nvml::query(0) {
                Ok(direct) => return Ok(direct.merged_over(adapter)),
                Err(e) => debug!("NVML query failed, using adapter info: {e}"),
            }
        }

        Ok(adapter)
    }

    fn timed_add(&self, a: &[f32], b: &[f32]) -> Result<Duration, AcceleratorError> {
        if a.len() != b.len() {
            return Err(AcceleratorError::Execution(format!(
                "operand lengths differ ({} vs {})",
                a.len(),
                b.len()
            )));
        }
        if a.is_empty() {
            return Err(AcceleratorError::Execution("empty operands".into()));
        }
        let limits = self.device.limits();
        let bytes = (a.len() * std::mem::size_of::<f32>()) as u64;
        if bytes > limits.max_storage_buffer_binding_size as u64 || bytes > limits.max_buffer_size {
            return Err(AcceleratorError::Execution(format!(
                "{} elements exceed the device's storage buffer limit",
                a.len()
            )));
        }

        let buf_a = self.storage_buffer("vector_add_a", a.len(), true);
        let buf_b = self.storage_buffer("vector_add_b", b.len(), true);
        let buf_out = self.storage_buffer("vector_add_out", a.len(), false);
        self.queue.write_buffer(&buf_a, 0, bytemuck::cast_slice(a));
        self.queue.write_buffer(&buf_b, 0, bytemuck::cast_slice(b));
        // Flush the uploads so the timed region covers the kernel only.
        self.queue.submit(std::iter::empty());
        self.synchronize()?;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("vector_add_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buf_a.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buf_b.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buf_out.as_entire_binding(),
                },
            ],
        });

        let total_groups = (a.len() as u32).div_ceil(WORKGROUP_SIZE);
        let (groups_x, groups_y) =
            split_workgroups(total_groups, limits.max_compute_workgroups_per_dimension);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("vector_add_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("vector_add_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        let commands = encoder.finish();

        let start = Instant::now();
        self.queue.submit([commands]);
        self.synchronize()?;
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_device_name() {
        assert_eq!(fallback_device_name(0x10de, 0x2786), "NVIDIA GPU 0x2786");
        assert_eq!(fallback_device_name(0x1234, 0x5), "GPU 0x1234:0x0005");
    }

    #[test]
    fn test_split_workgroups_within_limit() {
        assert_eq!(split_workgroups(10, 65_535), (10, 1));
    }

    #[test]
    fn test_split_workgroups_covers_large_dispatch() {
        // 10M elements at 256 per group.
        let total = 10_000_000u32.div_ceil(WORKGROUP_SIZE);
        let (x, y) = split_workgroups(total, 65_535);
        assert_eq!(x, 65_535);
        assert!(x as u64 * y as u64 >= total as u64);
    }
}
