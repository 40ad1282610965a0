use std::cell::RefCell;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

use stratus_bake::config::{self, SceneFile};
use stratus_bake::host::{CliHost, LoopScheduler};
use stratus_bake::report;
use stratus_render::{GpuContext, SkyContext};
use stratus_session::{
    GpuSessionBackend, RenderSessionController, SessionMode, SessionRegistry, StartOutcome,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut scene_path: Option<PathBuf> = None;
    let mut report_path: Option<PathBuf> = None;
    let mut mode = SessionMode::Bake;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scene" => {
                i += 1;
                scene_path = args.get(i).map(PathBuf::from);
            }
            "--report" => {
                i += 1;
                report_path = args.get(i).map(PathBuf::from);
            }
            "--animation" => mode = SessionMode::Animation,
            "--help" | "-h" => {
                eprintln!("Usage: stratus-bake [OPTIONS]");
                eprintln!("  --scene <path>    RON scene file (default: built-in scene)");
                eprintln!("  --animation       Render the scene's frame range as a sequence");
                eprintln!("  --report <path>   Save per-frame timings as JSON");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let (scene_name, file) = match &scene_path {
        Some(path) => match config::load_scene(path) {
            Ok(file) => (path.display().to_string(), file),
            Err(e) => {
                log::error!("{e}");
                process::exit(1);
            }
        },
        None => ("default".to_string(), SceneFile::default()),
    };

    log::info!("Initializing GPU...");
    let gpu = match GpuContext::headless() {
        Ok(gpu) => gpu,
        Err(e) => {
            log::error!("{e}");
            process::exit(1);
        }
    };
    let adapter = gpu.adapter_name.clone();
    // No window, so the composite format only has to be valid
    let context = Rc::new(RefCell::new(SkyContext::new(
        gpu,
        wgpu::TextureFormat::Rgba8Unorm,
    )));

    let mut controller = RenderSessionController::new(
        mode,
        GpuSessionBackend::new(context.clone()),
        SessionRegistry::new(),
    );
    let mut scheduler = LoopScheduler::new();
    let mut host = CliHost::new(file.render.output.clone());

    match controller.start(file.scene, &file.render, &mut scheduler, &mut host) {
        Ok(StartOutcome::Started) => {}
        Ok(StartOutcome::AlreadyRunning) => {
            log::warn!("A {:?} session is already running", mode);
            return;
        }
        Err(_) => process::exit(1),
    }

    let mut last_percent = 0;
    while scheduler.is_active() {
        let outcome = controller.tick(&mut scheduler, &mut host);
        if outcome.error.is_some() {
            process::exit(1);
        }
        let percent = (outcome.progress * 100.0) as u32;
        if percent / 10 > last_percent / 10 {
            log::info!("{}%", percent);
        }
        last_percent = percent;
    }
    context.borrow_mut().teardown();

    let mode_name = match mode {
        SessionMode::Animation => "animation",
        _ => "bake",
    };
    let timing =
        report::TimingReport::from_timings(&scene_name, mode_name, &adapter, controller.timings());
    println!("\n## Stratus Timing\n");
    println!("{}", report::format_markdown(&timing));

    if let Some(ref path) = report_path {
        match report::save_report(path, &timing) {
            Ok(()) => log::info!("Saved timing report to {}", path.display()),
            Err(e) => {
                log::error!("Failed to save timing report: {e}");
                process::exit(1);
            }
        }
    }
}
