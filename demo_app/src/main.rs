//! Quad demo
//!
//! Draws a rotating textured quad. Pass an image path to texture the quad
//! with it; otherwise a generated checkerboard is used. Settings are read
//! from `demo.toml` when present. Escape quits.

use quasar_render::config::{Config, ShaderConfig};
use quasar_render::prelude::*;

struct QuadDemo {
    texture_path: Option<String>,
    elapsed: f32,
    exit_requested: bool,
}

impl QuadDemo {
    fn load_texture(&self) -> TextureData {
        if let Some(path) = &self.texture_path {
            match TextureData::from_file(path) {
                Ok(texture) => return texture,
                Err(e) => log::warn!("Could not load {}: {}, using checkerboard", path, e),
            }
        }
        TextureData::checkerboard(256, 32, [230, 230, 230, 255], [40, 90, 200, 255])
    }
}

impl Application for QuadDemo {
    fn initialize(&mut self, renderer: &mut Renderer) -> Result<(), EngineError> {
        renderer.upload_mesh(&MeshData::quad())?;
        renderer.upload_texture(&self.load_texture())?;
        Ok(())
    }

    fn update(&mut self, delta_time: f32) {
        self.elapsed += delta_time;
    }

    fn handle_event(&mut self, event: &Event) -> bool {
        if let Event::KeyPressed { key } = event {
            if *key == glfw::Key::Escape as i32 {
                self.exit_requested = true;
                return true;
            }
        }
        false
    }

    fn should_exit(&self) -> bool {
        self.exit_requested
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = EngineConfig::load_or_default("demo.toml")?;
    if config.renderer.application_name == EngineConfig::default().renderer.application_name {
        config.renderer.application_name = "Quad Demo".to_string();
        config.window.title = "Quasar - Quad Demo".to_string();
    }
    config.renderer = config
        .renderer
        .with_shaders(ShaderConfig::with_path_resolution("quad.vert.spv", "quad.frag.spv"));

    let mut engine = Engine::with_config(config)?;
    engine.events_mut().subscribe(EventKind::Resized, |event: &Event| {
        if let Event::Resized { width, height } = event {
            log::info!("Window resized to {}x{}", width, height);
        }
        false
    });

    let mut app = QuadDemo {
        texture_path: std::env::args().nth(1),
        elapsed: 0.0,
        exit_requested: false,
    };
    engine.run(&mut app)?;

    let renderer = engine.renderer_mut();
    let stats = renderer.stats();
    log::info!(
        "Presented {} frames in {:.1}s across {} swapchain rebuilds",
        stats.frames_presented,
        app.elapsed,
        stats.recreations
    );
    Ok(())
}
