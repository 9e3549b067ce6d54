//! Shadow demo application
//!
//! Builds a small scene (a floor, a few cubes, a skybox) lit by a
//! directional, an omni and a spot light, then runs a fixed number of frames
//! on the headless backend and reports what each frame submitted.
//!
//! Usage: `shadow_demo [config.toml|config.ron]`

use std::cell::RefCell;
use std::rc::Rc;

use rust_lighting::config::ConfigError;
use rust_lighting::foundation::logging;
use rust_lighting::prelude::*;

const FRAMES: usize = 120;
const SHADOW_RESOLUTION: i32 = 1024;
const SKYBOX_PATH: &str = "assets/skybox.png";

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

struct ShadowDemo {
    backend: SharedBackend,
    headless: Rc<RefCell<HeadlessBackend>>,
    lighting: LightingContext,
    floor: Model,
    cubes: Vec<(Model, Vec3)>,
    skybox: Option<Skybox>,
    time: f32,
}

impl ShadowDemo {
    fn new(config: &LightingConfig) -> Result<Self, DemoError> {
        log::info!("Creating shadow demo with {} light slots", config.light_count);

        let headless = Rc::new(RefCell::new(HeadlessBackend::new().with_screen_size(1280, 720)));
        headless.borrow_mut().register_image(SKYBOX_PATH, 1024, 768);
        let backend: SharedBackend = headless.clone();

        let lighting = LightingContext::builder(config.light_count).with_config(config).build(backend.clone())?;

        let floor_material = Material::default()
            .with_albedo(Color::rgb(180, 180, 170))
            .with_map(MaterialMapIndex::Roughness, MaterialMap::default().with_value(0.8));
        let floor = Model::from_mesh(Mesh::plane(20.0, 20.0).upload(&backend)?, floor_material);

        let mut cubes = Vec::new();
        for (i, color) in [Color::rgb(200, 60, 50), Color::rgb(60, 160, 80), Color::rgb(50, 90, 200)].into_iter().enumerate() {
            let material = Material::default()
                .with_albedo(color)
                .with_map(MaterialMapIndex::Metalness, MaterialMap::default().with_value(0.2 * i as f32))
                .with_map(MaterialMapIndex::Roughness, MaterialMap::default().with_value(0.4));
            let model = Model::from_mesh(Mesh::cube(1.0).upload(&backend)?, material);
            cubes.push((model, Vec3::new(i as f32 * 3.0 - 3.0, 0.5, 0.0)));
        }

        Ok(Self { backend, headless, lighting, floor, cubes, skybox: None, time: 0.0 })
    }

    fn initialize(&mut self) {
        log::info!("Initializing lights...");
        let lighting = &mut self.lighting;

        lighting.set_ambient_color(Color::rgb(25, 25, 30));
        lighting.set_view_position_xyz(0.0, 6.0, 12.0);

        lighting.set_light_type(0, LightType::Directional);
        lighting.set_light_xyz(0, LightProperty::Position, 6.0, 10.0, 6.0);
        lighting.set_light_target(0, 0.0, 0.0, 0.0);
        lighting.set_light_value(0, LightProperty::Energy, 0.6);
        lighting.use_light(0, true);
        lighting.enable_shadow(0, SHADOW_RESOLUTION);

        lighting.set_light_type(1, LightType::Omni);
        lighting.set_light_xyz(1, LightProperty::Position, -2.0, 3.0, 2.0);
        lighting.set_light_color(1, Color::rgb(255, 210, 160));
        lighting.set_light_xyz(1, LightProperty::AttenuationClq, 1.0, 0.09, 0.032);
        lighting.use_light(1, true);
        lighting.enable_shadow(1, SHADOW_RESOLUTION / 2);

        lighting.set_light_type(2, LightType::Spot);
        lighting.set_light_xyz(2, LightProperty::Position, 0.0, 6.0, 4.0);
        lighting.set_light_target(2, 0.0, 0.0, 0.0);
        lighting.set_spot_cone(2, 15.0, 25.0);
        lighting.set_light_value(2, LightProperty::Size, 0.2);
        lighting.use_light(2, true);
        lighting.enable_shadow(2, SHADOW_RESOLUTION);

        match self.lighting.load_skybox(SKYBOX_PATH) {
            Ok(skybox) => {
                self.lighting.use_map(MaterialMapIndex::Cubemap, true);
                self.lighting.use_map(MaterialMapIndex::Irradiance, true);
                self.skybox = Some(skybox);
            }
            Err(e) => log::warn!("Skybox unavailable, continuing without it: {e}"),
        }
    }

    fn update(&mut self, delta_time: f32) {
        self.time += delta_time;
        // Sweep the spot light around the scene
        self.lighting.rotate_light_y(2, 45.0 * delta_time);
        self.lighting.translate_light(1, (self.time * 2.0).sin() * delta_time, 0.0, 0.0);
    }

    fn render(&self) {
        let Self { lighting, floor, cubes, .. } = self;

        for light in 0..lighting.light_count() {
            if !lighting.is_light_used(light) || !lighting.is_shadow_enabled(light) {
                continue;
            }
            lighting.update_shadow_map(
                light,
                Some(&mut |caster: &mut ShadowCaster<'_>| {
                    caster.cast_model(floor, Vec3::zeros(), 1.0);
                    for (cube, position) in cubes {
                        caster.cast_model(cube, *position, 1.0);
                    }
                }),
            );
        }

        if let Some(skybox) = &self.skybox {
            lighting.draw_skybox(skybox);
        }
        lighting.draw_model(floor, Vec3::zeros(), 1.0, Color::WHITE);
        for (cube, position) in cubes {
            lighting.draw_model_ex(cube, *position, Vec3::y(), self.time * 30.0, Vec3::repeat(1.0), Color::WHITE);
        }
    }

    fn run(&mut self) {
        self.initialize();

        let delta_time = 1.0 / 60.0;
        for frame in 0..FRAMES {
            self.headless.borrow_mut().clear_recording();
            self.update(delta_time);
            self.render();

            if frame % 30 == 0 {
                let headless = self.headless.borrow();
                log::info!(
                    "Frame {frame}: {} draw calls, {} uniform uploads, {} live textures",
                    headless.draw_calls().len(),
                    headless.total_uploads(),
                    headless.live_texture_count()
                );
            }
        }

        log::debug!("Backend handle count at shutdown: {}", Rc::strong_count(&self.backend));
    }
}

fn main() -> Result<(), DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => LightingConfig::load_from_file(path)?,
        None => LightingConfig::default(),
    };
    logging::init(&config.log_level);

    log::info!("Starting shadow demo");
    let mut demo = ShadowDemo::new(&config)?;
    demo.run();
    log::info!("Shadow demo finished successfully");
    Ok(())
}
