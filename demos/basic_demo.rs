//! Basic demonstration of the skirmish simulation.
//!
//! Run with: cargo run --example basic_demo
//! Set `RUST_LOG=debug` to see every dispatched command.

use std::thread;

use glam::Vec2;
use skirmish_sim::render_bridge::{snapshot_to_flatbuffer, ITEM_STRIDE};
use skirmish_sim::{EntityType, GameCommand, SimWorld, TileMap};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
}

fn main() {
    init_tracing();

    let mut sim = SimWorld::with_map(TileMap::demo(100, 100, 50.0));

    // Blue squad north of the moat, red squad and its barracks further east
    for i in 0..10 {
        let pos = Vec2::new(1500.0 + (i % 5) as f32 * 70.0, 1200.0 + (i / 5) as f32 * 70.0);
        sim.spawn(EntityType::Infantry, pos, 0);
    }
    for i in 0..6 {
        let pos = Vec2::new(3200.0 + (i % 3) as f32 * 70.0, 1800.0 + (i / 3) as f32 * 70.0);
        sim.spawn(EntityType::Infantry, pos, 1);
    }
    sim.spawn(EntityType::Barracks, Vec2::new(3600.0, 1000.0), 1);

    // The UI would normally live on its own thread and only see the bridge
    let ui = sim.bridge().clone();
    thread::spawn(move || {
        ui.update_mouse_position(Vec2::new(1600.0, 1250.0));
        ui.send_command(GameCommand::Select {
            start: Vec2::new(1400.0, 1100.0),
            end: Vec2::new(1900.0, 1400.0),
            additive: false,
        });
    })
    .join()
    .expect("ui thread panicked");
    sim.tick();

    sim.bridge().send_command(GameCommand::Navigate {
        target: Vec2::new(3250.0, 1850.0),
    });

    info!("Running 20 seconds of simulation");
    for second in 1..=20 {
        sim.step(1.0);
        let snapshot = sim.snapshot();
        let alive = |team: u32| {
            snapshot
                .items
                .iter()
                .filter(|item| item.team == team && !item.is_building && !item.dying)
                .count()
        };
        info!(
            second,
            tick = sim.current_tick(),
            blue = alive(0),
            red = alive(1),
            "Battle status"
        );
    }

    let snapshot = sim.snapshot();
    let buffer = snapshot_to_flatbuffer(&snapshot);
    info!(
        items = snapshot.items.len(),
        floats = buffer.len(),
        stride = ITEM_STRIDE,
        "Final render buffer"
    );
    sim.profiler().log_summary();

    match snapshot.to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!(error = %err, "Failed to serialize snapshot"),
    }
}
