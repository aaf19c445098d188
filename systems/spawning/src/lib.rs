#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Randomised spawn placement inside rectangular regions.
//!
//! Sampling is a pure function of the region and the caller's generator, so
//! replaying the same seed reproduces the same sequence of poses.

use rand::Rng;
use tank_arena_core::{Pose, SpawnRegion, Vec3};

/// Maximum deviation of a sampled heading from the region's own yaw.
pub const YAW_JITTER_DEGREES: f32 = 45.0;

/// Samples a pose uniformly inside `region`.
///
/// The position is drawn in the region's local frame on the floor plane and
/// then rotated by the region's yaw and translated to its centre. The heading
/// lies within [`YAW_JITTER_DEGREES`] of the region's yaw, wrapped into
/// `[0, 360)`.
pub fn sample_pose<R: Rng + ?Sized>(region: &SpawnRegion, rng: &mut R) -> Pose {
    let half_x = sanitize_extent(region.half_x);
    let half_z = sanitize_extent(region.half_z);
    let local = Vec3::new(
        rng.gen_range(-half_x..=half_x),
        0.0,
        rng.gen_range(-half_z..=half_z),
    );
    let position = region.pose.position + region.pose.rotate(local);
    let jitter = rng.gen_range(-YAW_JITTER_DEGREES..=YAW_JITTER_DEGREES);

    Pose::new(position, wrap_degrees(region.pose.yaw_degrees + jitter))
}

/// Expresses a world-space position in the region's local frame.
#[must_use]
pub fn to_local(region: &SpawnRegion, position: Vec3) -> Vec3 {
    let inverse = Pose::new(Vec3::ZERO, -region.pose.yaw_degrees);
    inverse.rotate(position - region.pose.position)
}

fn sanitize_extent(extent: f32) -> f32 {
    if extent.is_finite() {
        extent.abs()
    } else {
        0.0
    }
}

fn wrap_degrees(value: f32) -> f32 {
    let wrapped = value.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
