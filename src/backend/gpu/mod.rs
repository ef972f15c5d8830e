//! Device-memory kernel backend over CubeCL CUDA.
//!
//! Mirrors the CPU backend operation for operation: flat f64 buffers are
//! uploaded per call, one kernel launch performs the dense work, and the
//! result is read back. The solver's orchestration (the alternating loop,
//! termination logic) stays on the host.

pub mod kernels;

use cubecl::client::ComputeClient;
use cubecl::cuda::{CudaDevice, CudaRuntime};
use cubecl::prelude::*;

use super::SinkhornKernels;
use crate::cost::CostMatrix;
use kernels::{
    col_potential_kernel, pairwise_sq_dist_kernel, resolve_positions_kernel,
    row_marginal_error_kernel, row_potential_kernel,
};

/// Type alias for the CUDA compute client.
type CudaClient = ComputeClient<<CudaRuntime as Runtime>::Server>;

/// Threads per cube for the 1-D launches.
const CUBE_DIM: u32 = 256;

/// Check if CUDA is available on this system.
pub fn is_cuda_available() -> bool {
    // Try to create a device - if it fails, CUDA is not available.
    std::panic::catch_unwind(|| {
        let _device = CudaDevice::new(0);
    })
    .is_ok()
}

/// CUDA backend. Holds the device and compute client for the lifetime of
/// the solver; all buffers are per-call.
pub struct GpuKernels {
    /// CUDA device (kept alive for the backend lifetime).
    #[allow(dead_code)]
    device: CudaDevice,
    /// Compute client for kernel execution.
    client: CudaClient,
}

impl GpuKernels {
    /// Create a backend on the default CUDA device.
    pub fn new() -> Self {
        Self::with_device_id(0)
    }

    /// Create a backend on a specific CUDA device.
    pub fn with_device_id(device_id: usize) -> Self {
        let device = CudaDevice::new(device_id);
        let client = CudaRuntime::client(&device);
        Self { device, client }
    }

    fn cube_count(items: usize) -> CubeCount {
        CubeCount::Static(items.div_ceil(CUBE_DIM as usize) as u32, 1, 1)
    }
}

fn flatten_points(points: &[[f64; 3]]) -> Vec<f64> {
    points.iter().flat_map(|p| p.iter().copied()).collect()
}

impl SinkhornKernels for GpuKernels {
    fn cost_matrix(&self, source: &[[f64; 3]], target: &[[f64; 3]]) -> CostMatrix {
        let n = source.len();
        let m = target.len();

        let source_gpu = self.client.create(f64::as_bytes(&flatten_points(source)));
        let target_gpu = self.client.create(f64::as_bytes(&flatten_points(target)));
        let cost_gpu = self.client.empty(n * m * std::mem::size_of::<f64>());

        unsafe {
            pairwise_sq_dist_kernel::launch_unchecked::<f64, CudaRuntime>(
                &self.client,
                Self::cube_count(n * m),
                CubeDim::new(CUBE_DIM, 1, 1),
                ArrayArg::from_raw_parts::<f64>(&source_gpu, n * 3, 1),
                ArrayArg::from_raw_parts::<f64>(&target_gpu, m * 3, 1),
                ScalarArg::new(n as u32),
                ScalarArg::new(m as u32),
                ArrayArg::from_raw_parts::<f64>(&cost_gpu, n * m, 1),
            );
        }

        let cost_bytes = self.client.read_one(cost_gpu);
        CostMatrix::from_vec(f64::from_bytes(&cost_bytes).to_vec(), n, m)
    }

    fn update_row_potential(
        &self,
        cost: &CostMatrix,
        g: &[f64],
        log_nu: &[f64],
        epsilon: f64,
        f: &mut [f64],
    ) {
        let n = cost.rows();
        let m = cost.cols();

        let cost_gpu = self.client.create(f64::as_bytes(cost.as_slice()));
        let g_gpu = self.client.create(f64::as_bytes(g));
        let log_nu_gpu = self.client.create(f64::as_bytes(log_nu));
        let f_gpu = self.client.empty(n * std::mem::size_of::<f64>());

        unsafe {
            row_potential_kernel::launch_unchecked::<f64, CudaRuntime>(
                &self.client,
                Self::cube_count(n),
                CubeDim::new(CUBE_DIM, 1, 1),
                ArrayArg::from_raw_parts::<f64>(&cost_gpu, n * m, 1),
                ArrayArg::from_raw_parts::<f64>(&g_gpu, m, 1),
                ArrayArg::from_raw_parts::<f64>(&log_nu_gpu, m, 1),
                ScalarArg::new(epsilon),
                ScalarArg::new(n as u32),
                ScalarArg::new(m as u32),
                ArrayArg::from_raw_parts::<f64>(&f_gpu, n, 1),
            );
        }

        let f_bytes = self.client.read_one(f_gpu);
        f.copy_from_slice(f64::from_bytes(&f_bytes));
    }

    fn update_col_potential(
        &self,
        cost: &CostMatrix,
        f: &[f64],
        log_mu: &[f64],
        epsilon: f64,
        g: &mut [f64],
    ) {
        let n = cost.rows();
        let m = cost.cols();

        let cost_gpu = self.client.create(f64::as_bytes(cost.as_slice()));
        let f_gpu = self.client.create(f64::as_bytes(f));
        let log_mu_gpu = self.client.create(f64::as_bytes(log_mu));
        let g_gpu = self.client.empty(m * std::mem::size_of::<f64>());

        unsafe {
            col_potential_kernel::launch_unchecked::<f64, CudaRuntime>(
                &self.client,
                Self::cube_count(m),
                CubeDim::new(CUBE_DIM, 1, 1),
                ArrayArg::from_raw_parts::<f64>(&cost_gpu, n * m, 1),
                ArrayArg::from_raw_parts::<f64>(&f_gpu, n, 1),
                ArrayArg::from_raw_parts::<f64>(&log_mu_gpu, n, 1),
                ScalarArg::new(epsilon),
                ScalarArg::new(n as u32),
                ScalarArg::new(m as u32),
                ArrayArg::from_raw_parts::<f64>(&g_gpu, m, 1),
            );
        }

        let g_bytes = self.client.read_one(g_gpu);
        g.copy_from_slice(f64::from_bytes(&g_bytes));
    }

    fn row_marginal_error(
        &self,
        cost: &CostMatrix,
        f: &[f64],
        g: &[f64],
        mu: &[f64],
        log_nu: &[f64],
        epsilon: f64,
    ) -> f64 {
        let n = cost.rows();
        let m = cost.cols();

        let cost_gpu = self.client.create(f64::as_bytes(cost.as_slice()));
        let f_gpu = self.client.create(f64::as_bytes(f));
        let g_gpu = self.client.create(f64::as_bytes(g));
        let log_nu_gpu = self.client.create(f64::as_bytes(log_nu));
        let mu_gpu = self.client.create(f64::as_bytes(mu));
        let errors_gpu = self.client.empty(n * std::mem::size_of::<f64>());

        unsafe {
            row_marginal_error_kernel::launch_unchecked::<f64, CudaRuntime>(
                &self.client,
                Self::cube_count(n),
                CubeDim::new(CUBE_DIM, 1, 1),
                ArrayArg::from_raw_parts::<f64>(&cost_gpu, n * m, 1),
                ArrayArg::from_raw_parts::<f64>(&f_gpu, n, 1),
                ArrayArg::from_raw_parts::<f64>(&g_gpu, m, 1),
                ArrayArg::from_raw_parts::<f64>(&log_nu_gpu, m, 1),
                ArrayArg::from_raw_parts::<f64>(&mu_gpu, n, 1),
                ScalarArg::new(epsilon),
                ScalarArg::new(n as u32),
                ScalarArg::new(m as u32),
                ArrayArg::from_raw_parts::<f64>(&errors_gpu, n, 1),
            );
        }

        // Final reduction on the host: n values, not worth a second kernel.
        let error_bytes = self.client.read_one(errors_gpu);
        f64::from_bytes(&error_bytes).iter().sum()
    }

    fn resolve_positions(
        &self,
        cost: &CostMatrix,
        f: &[f64],
        g: &[f64],
        log_nu: &[f64],
        epsilon: f64,
        target: &[[f64; 3]],
    ) -> Vec<[f64; 3]> {
        let n = cost.rows();
        let m = cost.cols();

        let cost_gpu = self.client.create(f64::as_bytes(cost.as_slice()));
        let f_gpu = self.client.create(f64::as_bytes(f));
        let g_gpu = self.client.create(f64::as_bytes(g));
        let log_nu_gpu = self.client.create(f64::as_bytes(log_nu));
        let target_gpu = self.client.create(f64::as_bytes(&flatten_points(target)));
        let positions_gpu = self.client.empty(n * 3 * std::mem::size_of::<f64>());

        unsafe {
            resolve_positions_kernel::launch_unchecked::<f64, CudaRuntime>(
                &self.client,
                Self::cube_count(n),
                CubeDim::new(CUBE_DIM, 1, 1),
                ArrayArg::from_raw_parts::<f64>(&cost_gpu, n * m, 1),
                ArrayArg::from_raw_parts::<f64>(&f_gpu, n, 1),
                ArrayArg::from_raw_parts::<f64>(&g_gpu, m, 1),
                ArrayArg::from_raw_parts::<f64>(&log_nu_gpu, m, 1),
                ArrayArg::from_raw_parts::<f64>(&target_gpu, m * 3, 1),
                ScalarArg::new(epsilon),
                ScalarArg::new(n as u32),
                ScalarArg::new(m as u32),
                ArrayArg::from_raw_parts::<f64>(&positions_gpu, n * 3, 1),
            );
        }

        let position_bytes = self.client.read_one(positions_gpu);
        f64::from_bytes(&position_bytes)
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect()
    }
}
