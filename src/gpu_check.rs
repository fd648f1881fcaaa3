//! Device error checks around wgpu calls.
//!
//! `capture` is used during construction, where any error is fatal. The
//! per-frame pair `push_frame_scope`/`check_frame_errors` only does work in
//! debug builds; release builds skip the round trip.

use log::error;

/// Runs `f` inside validation and out-of-memory error scopes and returns the
/// first captured error as a message.
pub fn capture<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> Result<T, String> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = futures::executor::block_on(device.pop_error_scope());
    let out_of_memory = futures::executor::block_on(device.pop_error_scope());
    match validation.or(out_of_memory) {
        None => Ok(value),
        Some(e) => Err(e.to_string()),
    }
}

#[cfg(debug_assertions)]
pub fn push_frame_scope(device: &wgpu::Device) {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
}

#[cfg(not(debug_assertions))]
pub fn push_frame_scope(_device: &wgpu::Device) {}

#[cfg(debug_assertions)]
pub fn check_frame_errors(device: &wgpu::Device, context: &str) {
    if let Some(e) = futures::executor::block_on(device.pop_error_scope()) {
        error!("Device error during {}: {}", context, e);
    }
}

#[cfg(not(debug_assertions))]
pub fn check_frame_errors(_device: &wgpu::Device, _context: &str) {}

/// Routes errors raised outside any scope to the log instead of panicking.
pub fn log_uncaptured_errors(device: &wgpu::Device) {
    device.on_uncaptured_error(Box::new(|e| {
        error!("Uncaptured device error: {}", e);
    }));
}
