use std::path::{Path, PathBuf};

use anyhow::Result;
use bottle_engine::core::{Renderer, ShaderSet};
use bottle_engine::device::GpuInit;
use bottle_engine::event::{Event, EventBus, EventKind};
use bottle_engine::logging::{LoggingConfig, init_logging};
use bottle_engine::window::{PlatformWindow, WindowConfig};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let mut window = PlatformWindow::new(WindowConfig {
        title: "Bottle triangle".to_string(),
        ..WindowConfig::default()
    })?;

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let dir = shader_dir(std::env::args_os().nth(1).map(PathBuf::from), exe_dir.as_deref());
    log::info!("loading shaders from {}", dir.display());
    let shaders = ShaderSet::in_dir(dir);
    let mut renderer = Renderer::bring_up(&window, &GpuInit::default(), &shaders)?;

    let mut bus = EventBus::new();
    bus.subscribe(EventKind::CloseRequested, |_| log::info!("close requested"));
    bus.subscribe(EventKind::KeyPressed, |e| {
        if let Event::KeyPressed(key) = e {
            log::debug!("key pressed: {key:?}");
        }
    });
    bus.subscribe(EventKind::FrameSkipped, |e| log::warn!("{e:?}"));

    let summary = renderer.run(&mut window, &mut bus)?;
    log::info!("exiting after {} frames", summary.presented);
    Ok(())
}

/// Shader directory: the first argument if given, else `shaders/` next to the
/// executable when it holds `vert.spv`, else this crate's `shaders/`.
fn shader_dir(arg: Option<PathBuf>, exe_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = arg {
        return dir;
    }
    if let Some(dir) = exe_dir.map(|d| d.join("shaders")) {
        if dir.join("vert.spv").is_file() {
            return dir;
        }
    }
    Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders")
}
