//! nearsightd - NearSight Assistance Kernel daemon
//!
//! This daemon:
//! 1. Loads deployment configuration (file + environment overrides)
//! 2. Builds the analysis engine (detector, depth, and narrator oracles)
//! 3. Serves the analyze API over HTTP until interrupted

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nearsight_kernel::api::{ApiConfig, ApiServer};
use nearsight_kernel::{AssistConfig, Engine};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = AssistConfig::load()?;
    let engine = Engine::from_config(&cfg)?;

    let api_config = ApiConfig {
        addr: cfg.api_addr.clone(),
    };
    let api_handle = ApiServer::new(api_config, engine).spawn()?;
    log::info!("analyze api listening on {}", api_handle.addr);
    log::info!(
        "fov={} depth_scale={} narrator={}",
        cfg.camera.horizontal_fov_degrees,
        cfg.fusion.depth_scale_cm,
        cfg.narrator
            .as_ref()
            .map(|n| n.url.as_str())
            .unwrap_or("(static fallback)")
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = running.clone();
    ctrlc::set_handler(move || {
        running_handler.store(false, Ordering::SeqCst);
    })?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    log::info!("shutting down");
    api_handle.stop()?;
    Ok(())
}
