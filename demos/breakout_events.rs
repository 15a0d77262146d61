use glam::Vec2;
use roomcollide::*;

const WALL: ClassId = ClassId(1);
const BRICK: ClassId = ClassId(2);

fn main() {
    env_logger::init();

    let cfg = RoomConfig::new(320.0, 240.0).with_cell_size(32.0, 32.0);
    let mut room = match Room::new(cfg, NoMasks) {
        Ok(room) => room,
        Err(err) => {
            eprintln!("bad room config: {err}");
            return;
        }
    };

    let ball = room.add(
        Entity::new(Vec2::new(150.0, 200.0), Rect::new(-4.0, -4.0, 8.0, 8.0))
            .with_mode(CollisionMode::Ellipse)
            .with_checks_collisions(true)
            .with_user_key(1),
    );
    room.add(Entity::new(Vec2::new(0.0, 0.0), Rect::new(0.0, 0.0, 8.0, 240.0)).with_class(WALL));
    room.add(Entity::new(Vec2::new(312.0, 0.0), Rect::new(0.0, 0.0, 8.0, 240.0)).with_class(WALL));
    room.add(Entity::new(Vec2::new(0.0, 0.0), Rect::new(0.0, 0.0, 320.0, 8.0)).with_class(WALL));
    for i in 0..8 {
        room.add(
            Entity::new(Vec2::new(32.0 + i as f32 * 32.0, 40.0), Rect::new(0.0, 0.0, 30.0, 12.0))
                .with_class(BRICK)
                .with_user_key(100 + i),
        );
    }
    println!("room: {} entities, {:?}", room.len(), room.grid().stats());

    let mut velocity = Vec2::new(3.0, -4.0);
    for frame in 0..200 {
        let Some(pos) = room.get(ball).map(|e| e.position + velocity) else {
            break;
        };
        room.set_position(ball, pos);
        room.resolve_collisions(Filter::Any);

        for ev in room.drain_events() {
            if ev.entity != ball {
                continue;
            }
            // Bounce off the side we came from
            if ev.direction.x != 0 {
                velocity.x = -velocity.x;
            }
            if ev.direction.y != 0 {
                velocity.y = -velocity.y;
            }
            let class = room.get(ev.other).and_then(|e| e.class);
            println!(
                "frame {frame}: ball hit {:?} (key {:?}) from ({}, {})",
                class, ev.other_key, ev.direction.x, ev.direction.y
            );
            if class == Some(BRICK) {
                room.remove(ev.other);
            }
        }
        room.finish_frame();

        if pos.y > 260.0 {
            println!("frame {frame}: ball lost");
            break;
        }
    }

    let bricks = room.entities().filter(|(_, e)| e.class == Some(BRICK)).count();
    println!("bricks left: {bricks}");
}
