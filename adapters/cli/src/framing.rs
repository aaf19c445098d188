use tank_arena_core::{CombatantId, Pose, Vec3};
use tank_arena_system_episode::Framing;
use tracing::debug;

/// Smallest half-width the camera is allowed to shrink to.
const MIN_HALF_WIDTH: f32 = 10.0;
/// Margin kept around the outermost tank.
const PADDING: f32 = 4.0;

/// Region of the arena a camera should cover.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Shot {
    pub(crate) center: Vec3,
    pub(crate) half_width: f32,
}

/// Computes the ground-plane square enclosing every pose.
pub(crate) fn shot(poses: &[(CombatantId, Pose)]) -> Option<Shot> {
    let (_, first) = poses.first()?;
    let (min, max) = poses.iter().fold(
        (first.position, first.position),
        |(min, max), (_, pose)| (min.min(pose.position), max.max(pose.position)),
    );
    let center = (min + max) * 0.5;
    let extent = (max - min) * 0.5;
    Some(Shot {
        center: Vec3::new(center.x, 0.0, center.z),
        half_width: (extent.x.max(extent.z) + PADDING).max(MIN_HALF_WIDTH),
    })
}

/// Camera stand-in that reports the framed region through the log.
#[derive(Debug, Default)]
pub(crate) struct LogFraming;

impl Framing for LogFraming {
    fn frame(&mut self, poses: &[(CombatantId, Pose)]) {
        if let Some(shot) = shot(poses) {
            debug!(
                x = shot.center.x,
                z = shot.center.z,
                half_width = shot.half_width,
                tanks = poses.len(),
                "camera framed arena"
            );
        }
    }
}
