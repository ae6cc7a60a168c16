fn main() {
    if let Err(e) = gpu_particles::core::Engine::run() {
        eprintln!("Engine failed to start: {}", e);
        std::process::exit(1);
    }
}
