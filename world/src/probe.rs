//! First-hit sphere casts against tank bodies and static obstacles.

use tank_arena_core::{Probe, ProbeHit, Vec3};

use crate::{World, BODY_RADIUS};

/// Read-only collision service bound to a world snapshot.
#[derive(Clone, Copy, Debug)]
pub struct ArenaProbe<'a> {
    world: &'a World,
}

impl<'a> ArenaProbe<'a> {
    pub(crate) fn new(world: &'a World) -> Self {
        Self { world }
    }
}

impl Probe for ArenaProbe<'_> {
    fn cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        radius: f32,
        max_distance: f32,
    ) -> Option<ProbeHit> {
        let direction = direction.try_normalize()?;
        if max_distance.is_nan() || max_distance <= 0.0 {
            return None;
        }

        let mut nearest: Option<(f32, ProbeHit)> = None;
        let mut consider = |distance: f32, hit: ProbeHit| {
            if nearest.map_or(true, |(current, _)| distance < current) {
                nearest = Some((distance, hit));
            }
        };

        for combatant in self.world.combatants.iter().filter(|entry| entry.is_alive()) {
            let center = combatant.body_center();
            let reach = BODY_RADIUS + radius;
            if overlaps(origin, center, reach) {
                continue;
            }
            if let Some(distance) = sweep_sphere(origin, direction, max_distance, center, reach) {
                consider(distance, ProbeHit::Combatant(combatant.id));
            }
        }

        for (index, obstacle) in self.world.layout.obstacles.iter().enumerate() {
            let reach = obstacle.radius + radius;
            if overlaps(origin, obstacle.center, reach) {
                continue;
            }
            if let Some(distance) =
                sweep_sphere(origin, direction, max_distance, obstacle.center, reach)
            {
                consider(distance, ProbeHit::Obstacle(index));
            }
        }

        nearest.map(|(_, hit)| hit)
    }
}

fn overlaps(point: Vec3, center: Vec3, radius: f32) -> bool {
    (point - center).length_squared() <= radius * radius
}

/// Distance along the unit `direction` at which a ray from `origin` first
/// touches the sphere, if that happens within `max_distance`.
///
/// Rays starting inside the sphere never report a hit.
pub(crate) fn sweep_sphere(
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    center: Vec3,
    radius: f32,
) -> Option<f32> {
    let offset = origin - center;
    let c = offset.length_squared() - radius * radius;
    if c <= 0.0 {
        return None;
    }
    let b = offset.dot(direction);
    if b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let distance = -b - discriminant.sqrt();
    (distance >= 0.0 && distance <= max_distance).then_some(distance)
}
