use glam::Vec2;
use roomcollide::*;

fn main() {
    env_logger::init();

    // A 16x16 "ring" sprite: solid border, hollow inside
    let ring = Mask::from_fn(16, 16, |x, y| x < 2 || y < 2 || x >= 14 || y >= 14);
    let mut sprites = SpriteMasks::new();
    sprites.insert(SpriteKey(1), 0, ring);

    let mut room = match Room::new(RoomConfig::new(256.0, 256.0).with_cell_size(64.0, 64.0), sprites) {
        Ok(room) => room,
        Err(err) => {
            eprintln!("bad room config: {err}");
            return;
        }
    };

    let visual = VisualFrame {
        sprite: SpriteKey(1),
        frame: 0,
        width: 16,
        height: 16,
        origin: Vec2::new(8.0, 8.0),
        transform: Transform { xscale: 2.0, yscale: 2.0, rotation: 45.0 },
    };
    let ring_id = room.add(
        Entity::new(Vec2::new(128.0, 128.0), Rect::new(-8.0, -8.0, 16.0, 16.0))
            .with_mode(CollisionMode::Precise)
            .with_visual(visual),
    );
    let boxed = room.add(Entity::new(Vec2::new(20.0, 20.0), Rect::new(0.0, 0.0, 24.0, 24.0)));
    println!("ring={ring_id:?} box={boxed:?} footprint={:?}", room.get(ring_id).map(|e| e.footprint()));

    let center = room.collide_circle(Vec2::new(128.0, 128.0), 4.0, Filter::Any);
    println!("circle at the ring's hollow center: {center:?}");

    let rim = room.collide_rectangle(Rect::new(100.0, 124.0, 8.0, 8.0), Filter::Any);
    println!("rectangle on the ring's rim: {rim:?}");

    let line = room.collide_line(Vec2::new(0.0, 0.0), Vec2::new(200.0, 200.0), Filter::Any);
    println!("diagonal line: {line:?}");

    let hypothetical = room.collision(boxed, Filter::Any, Some(Vec2::new(100.0, 100.0)));
    println!("box moved next to the ring would hit: {hypothetical:?}");

    println!("cached masks: {}", room.masks().len());
    room.invalidate_sprite(SpriteKey(1));
    println!("after sprite invalidation: {}", room.masks().len());
}
