use glam::Vec2;
use roomcollide::*;
use std::time::Instant;

fn lcg(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    *seed
}

fn unit(seed: &mut u32) -> f32 {
    lcg(seed) as f32 / u32::MAX as f32
}

fn main() {
    env_logger::init();

    let n = 5_000usize; // number of entities
    let frames = 30;
    for cell in [32.0f32, 64.0, 128.0, 1024.0] {
        let cfg = RoomConfig::new(1024.0, 1024.0).with_cell_size(cell, cell);
        let Ok(mut room) = Room::new(cfg, NoMasks) else {
            eprintln!("bad cell size {cell}");
            continue;
        };

        let mut seed = 1u32;
        let mut ids = Vec::with_capacity(n);
        for i in 0..n {
            let pos = Vec2::new(unit(&mut seed) * 1024.0, unit(&mut seed) * 1024.0);
            let mode = if i % 3 == 0 { CollisionMode::Ellipse } else { CollisionMode::Rectangle };
            ids.push(room.add(
                Entity::new(pos, Rect::new(0.0, 0.0, 6.0, 6.0))
                    .with_mode(mode)
                    .with_checks_collisions(i % 2 == 0),
            ));
        }

        let mut move_time = 0.0f64;
        let mut resolve_time = 0.0f64;
        let mut events = 0usize;
        for _ in 0..frames {
            let t0 = Instant::now();
            for &id in &ids {
                let step = Vec2::new(unit(&mut seed) * 4.0 - 2.0, unit(&mut seed) * 4.0 - 2.0);
                room.modify(id, |e| e.position += step);
            }
            move_time += t0.elapsed().as_secs_f64() * 1000.0;

            let t1 = Instant::now();
            room.resolve_collisions(Filter::Any);
            resolve_time += t1.elapsed().as_secs_f64() * 1000.0;
            events += room.drain_events().len();
            room.finish_frame();
        }

        let stats = room.grid().stats();
        println!(
            "N={} cell={} grid={}x{} occupied={} void={} move={:.3}ms/frame resolve={:.3}ms/frame events={}",
            n,
            cell,
            stats.columns,
            stats.rows,
            stats.occupied_cells,
            stats.void_entities,
            move_time / frames as f64,
            resolve_time / frames as f64,
            events
        );
    }
}
