use std::sync::Arc;

use glam::{Vec2, Vec3};
use gpu_particles::core::{apply_key, validate_assets};
use gpu_particles::config::AssetConfig;
use gpu_particles::platform::KeyCode;
use gpu_particles::render::headless::{HeadlessBackend, ResourceKind};
use gpu_particles::render::material::Material;
use gpu_particles::render::particles::kernel::{simulate, SimulationParams, MIN_SPAWN_SPEED};
use gpu_particles::render::particles::{
    Particle, ParticleKernel, ParticlePool, ParticleShaders, ParticleSystem,
    ParticleSystemDescriptor, SIMULATE_ENTRY_POINT,
};
use gpu_particles::render::shader::{Shader, ShaderProgram, ShaderStage};
use gpu_particles::render::texture::Texture;
use proptest::prelude::*;

const SIMULATE: &str = include_str!("../assets/shaders/simulate.wgsl");
const BILLBOARD: &str = include_str!("../assets/shaders/billboard.wgsl");
const PARTICLE: &str = include_str!("../assets/shaders/particle.wgsl");

fn particle_system(
    backend: &mut HeadlessBackend,
    capacity: u32,
) -> anyhow::Result<ParticleSystem<HeadlessBackend>> {
    backend.register_kernel(SIMULATE_ENTRY_POINT, Box::new(ParticleKernel::new()));
    let texture = Texture::from_rgba8(backend, "white", 1, 1, &[255; 4])?;
    let shaders = ParticleShaders::from_sources(SIMULATE, BILLBOARD, PARTICLE)?;
    Ok(ParticleSystem::new(
        backend,
        ParticleSystemDescriptor { capacity, shaders },
        texture,
    )?)
}

#[test]
fn test_full_cycle_restores_ages() -> anyhow::Result<()> {
    let mut backend = HeadlessBackend::new();
    let mut system = particle_system(&mut backend, 100)?;
    system.lifetime = 1.0;

    system.update(&mut backend, 1.0);

    let particles: Vec<Particle> = backend.read_buffer(system.buffer());
    for (i, particle) in particles.iter().enumerate() {
        let original = i as f32 / 100.0;
        assert!(
            (particle.age - original).abs() < 1e-6,
            "particle {}: {} vs {}",
            i,
            particle.age,
            original
        );
    }
    Ok(())
}

#[test]
fn test_every_particle_recycled_within_lifetime() -> anyhow::Result<()> {
    let mut backend = HeadlessBackend::new();
    let mut system = particle_system(&mut backend, 64)?;
    system.lifetime = 2.0;
    system.position = Vec3::new(0.0, 0.0, -0.5);

    for _ in 0..21 {
        system.update(&mut backend, 0.1);
        let particles: Vec<Particle> = backend.read_buffer(system.buffer());
        assert!(particles.iter().all(|p| (0.0..1.0).contains(&p.age)));
    }

    // 初始速度为零，重生后竖直速度至少为 MIN_SPAWN_SPEED
    let particles: Vec<Particle> = backend.read_buffer(system.buffer());
    assert!(particles.iter().all(|p| p.velocity[1] >= MIN_SPAWN_SPEED));
    Ok(())
}

#[test]
fn test_burn_rate_from_lifetime() -> anyhow::Result<()> {
    let mut backend = HeadlessBackend::new();
    let mut system = particle_system(&mut backend, 8)?;
    system.lifetime = 2.0;
    assert_eq!(system.burn_rate(), 0.5);

    system.update(&mut backend, 0.1);
    assert_eq!(system.simulate_material().float("burnRate"), Some(0.5));

    system.lifetime = 0.0005;
    system.update(&mut backend, 0.1);
    assert_eq!(
        system.simulate_material().float("burnRate"),
        Some(1.0 / 0.0005)
    );
    let particles: Vec<Particle> = backend.read_buffer(system.buffer());
    assert!(particles.iter().all(|p| (0.0..1.0).contains(&p.age)));
    Ok(())
}

#[test]
fn test_missing_uniform_leaves_table_empty() -> anyhow::Result<()> {
    let mut backend = HeadlessBackend::new();
    let shader = Shader::from_source("simulate.wgsl", ShaderStage::Compute, SIMULATE)?;
    let program = ShaderProgram::new(&mut backend, "Simulate", vec![shader])?;
    let mut material = Material::new(program);

    assert!(!material.set_float("particleSize", 1.0));
    assert_eq!(material.float_count(), 0);

    assert!(material.set_float("dt", 0.5));
    assert!(!material.set_float("doesNotExist", 2.0));
    assert_eq!(material.float("dt"), Some(0.5));
    assert_eq!(material.float_count(), 1);
    Ok(())
}

#[test]
fn test_keyboard_controls() -> anyhow::Result<()> {
    let mut backend = HeadlessBackend::new();
    let mut system = particle_system(&mut backend, 8)?;
    let size = system.particle_size;

    apply_key(KeyCode::T, &mut system);
    apply_key(KeyCode::G, &mut system);
    assert_eq!(system.particle_size, size);

    for _ in 0..3 {
        apply_key(KeyCode::R, &mut system);
    }
    assert_eq!(system.acceleration.y, 3.0);

    system.draw(&mut backend);
    assert_eq!(system.material().vec2("particleSize"), Some(Vec2::new(100.0, 100.0)));
    Ok(())
}

#[test]
fn test_texture_replacement_releases_old_texture() -> anyhow::Result<()> {
    let mut backend = HeadlessBackend::new();
    let counters = backend.counters();
    let mut system = particle_system(&mut backend, 8)?;
    assert_eq!(counters.live(ResourceKind::Texture), 1);

    let replacement = Texture::from_rgba8(&mut backend, "red", 1, 1, &[255, 0, 0, 255])?;
    assert!(system
        .material_mut()
        .set_texture("tex", Arc::clone(&replacement)));
    assert_eq!(Arc::strong_count(&replacement), 2);
    assert_eq!(counters.released(ResourceKind::Texture), 1);

    drop(system);
    assert_eq!(Arc::strong_count(&replacement), 1);
    assert_eq!(counters.live(ResourceKind::Buffer), 0);
    assert_eq!(counters.live(ResourceKind::Program), 0);

    drop(replacement);
    assert_eq!(counters.live(ResourceKind::Texture), 0);
    assert_eq!(counters.released(ResourceKind::Texture), 2);
    Ok(())
}

#[test]
fn test_bundled_assets_load() -> anyhow::Result<()> {
    let assets = AssetConfig {
        root: std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets"),
        ..AssetConfig::default()
    };
    validate_assets(&assets)?;

    let mut backend = HeadlessBackend::new();
    let shaders = ParticleShaders::load(&assets)?;
    let texture = Texture::load(&mut backend, assets.texture_path())?;
    let system = ParticleSystem::new(
        &mut backend,
        ParticleSystemDescriptor {
            capacity: 32,
            shaders,
        },
        texture,
    )?;
    assert_eq!(system.capacity(), 32);
    Ok(())
}

proptest! {
    #[test]
    fn prop_ages_stay_in_unit_range(
        lifetime in 0.01f32..10.0,
        dt in 0.0f32..0.5,
        steps in 1usize..40,
        capacity in 1u32..64,
    ) {
        let mut particles = ParticlePool::new(capacity).particles().to_vec();
        let params = SimulationParams {
            dt,
            burn_rate: 1.0 / lifetime,
            base_position: Vec3::new(0.0, 0.0, -0.5),
            acceleration: Vec3::new(0.0, -1.0, 0.0),
        };
        for _ in 0..steps {
            simulate(&mut particles, &params);
            for particle in &particles {
                prop_assert!((0.0..1.0).contains(&particle.age));
                prop_assert!(particle.position.iter().all(|v| v.is_finite()));
            }
        }
    }
}
