use log::{error, info, warn};

use tornado::feedback_device::FeedbackDevice;
use tornado::fps_estimator::FpsEstimator;
use tornado::headless::HeadlessDevice;
use tornado::params::{self, TornadoParams};
use tornado::particle_system::ParticleSystem;
use tornado::shader_utils::EmbeddedShaders;
use tornado::wgpu_device::WgpuDevice;

gflags::define! {
    --config: &str = ""
}
gflags::define! {
    --frames: u64 = 600
}
gflags::define! {
    --fps: f64 = 60.0
}
gflags::define! {
    --headless = false
}
gflags::define! {
    --log_filter: &str = "warn,tornado=info"
}
gflags::define! {
    -h, --help = false
}

fn load_params() -> TornadoParams {
    if CONFIG.flag.is_empty() {
        return params::get_config_from_default_file();
    }
    match params::read_config_from_file(CONFIG.flag) {
        Ok(params) => params,
        Err(e) => {
            error!("Failed to parse config file({}): {:?}", CONFIG.flag, e);
            params::get_config_from_default_file()
        }
    }
}

fn run<D: FeedbackDevice>(mut system: ParticleSystem<D>, frames: u64, fps: f64) {
    let mut fps_estimator = FpsEstimator::new(fps);
    let mut elapsed = 0.0;
    // The first step uses the nominal frame time rather than startup latency.
    let mut dt = fps_estimator.iteration_duration.as_secs_f64();
    for frame in 0..frames {
        system.update(dt);
        elapsed += dt;
        if frame % 60 == 59 {
            let center = system.center_of_tornado();
            info!(
                "frame {} t={:.2}s center=({:.2}, {:.2}, {:.2}) active={}",
                frame + 1,
                elapsed,
                center.x,
                center.y,
                center.z,
                system.num_active_particles()
            );
        }
        dt = fps_estimator.tick().as_secs_f64();
    }
    info!("Finished after {} updates", system.frames());
}

fn main() -> anyhow::Result<()> {
    gflags::parse();
    if HELP.flag {
        gflags::print_help_and_exit(0);
    }
    scrub_log::init_with_filter_string(LOG_FILTER.flag)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {:?}", e))?;

    let params = load_params();
    info!("Config: {:?}", params);

    if !HEADLESS.flag {
        match WgpuDevice::request_headless() {
            Ok(device) => {
                let system = ParticleSystem::new(device, &EmbeddedShaders, &params)?;
                run(system, FRAMES.flag, FPS.flag);
                return Ok(());
            }
            Err(e) => warn!("No GPU available ({}), falling back to the host device", e),
        }
    }
    let system = ParticleSystem::new(HeadlessDevice::new(), &EmbeddedShaders, &params)?;
    run(system, FRAMES.flag, FPS.flag);
    Ok(())
}
