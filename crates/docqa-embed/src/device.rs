use candle_core::Device;

/// Maps `embedding.device` to a candle device, falling back to CPU when the
/// accelerator is unavailable or this build lacks its feature.
pub fn select_device(preference: &str) -> Device {
    let pref = preference.trim().to_ascii_lowercase();
    let accelerated = match pref.as_str() {
        "cpu" => return Device::Cpu,
        "cuda" => Device::new_cuda(0),
        "metal" | "mps" => Device::new_metal(0),
        "gpu" => Device::new_cuda(0).or_else(|_| Device::new_metal(0)),
        other => {
            tracing::warn!(device = other, "unknown embedding device, using CPU");
            return Device::Cpu;
        }
    };
    match accelerated {
        Ok(dev) => {
            tracing::info!(device = %pref, "embedding device ready");
            dev
        }
        Err(e) => {
            tracing::warn!(device = %pref, error = %e, "accelerator unavailable, using CPU");
            Device::Cpu
        }
    }
}
