//! Granular physics engine for the hourglass.
//!
//! Owns the grain set and converges the number of fallen grains toward
//! `floor(playback time)`, one neck crossing per elapsed second. A physics
//! step is an ordered pipeline: integrate → release → advance falling →
//! wall collision → pairwise collision → settle classification → hard clamp.
//! Each stage is a separate function and independently testable.

use std::collections::HashMap;

use glam::Vec2;
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    glass::{
        Chamber, GlassGeometry, BOUNCE_DAMPING, CHAMBER_HEIGHT, COLLISION_PASSES, FRICTION,
        GRAVITY, IMPACT_WAKE_RADII, NECK_SEED_SPEED, SETTLE_FRAMES, SETTLE_SPEED_BOTTOM,
        SETTLE_SPEED_TOP, WAKE_IMPACT_SPEED, WALL_SLIDE_DAMPING,
    },
    grain::{Grain, GrainState},
};

// -------------------------------------------------------------------------------------------------

/// Restitution for collisions between two fast grains.
const ELASTIC_RESTITUTION: f32 = 0.8;
/// Restitution for grazing contacts between slow grains.
const SLIDE_RESTITUTION: f32 = 0.1;
/// Nudge applied to a slow grain resting against a settled one.
const SLIDE_NUDGE: f32 = 0.02;
/// A wall counts as floor when its normal opposes gravity at least this much.
const FLOOR_NORMAL_ALIGNMENT: f32 = -0.3;
/// Vertical spacing between packed grain rows, in grain radii.
const PACK_ROW_SPACING: f32 = 1.75;
/// Horizontal pitch between packed grains, in grain radii.
const PACK_COLUMN_PITCH: f32 = 2.1;

// -------------------------------------------------------------------------------------------------

/// Static per-chamber fill fractions for the reduced-motion render mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticFill {
    pub top: f32,
    pub bottom: f32,
}

// -------------------------------------------------------------------------------------------------

/// The granular simulation: one grain per second of track duration, split
/// between the two chambers according to elapsed playback time.
pub struct GrainEngine {
    geometry: GlassGeometry,
    grains: Vec<Grain>,
    total: usize,
    fallen: usize,
    rng: SmallRng,
}

impl GrainEngine {
    /// Create an engine for a track of the given duration in seconds. The
    /// total grain count is `floor(duration)`; durations below one second
    /// (or unknown ones) yield a valid no-op engine with zero grains.
    pub fn new(duration_seconds: f64) -> Self {
        let total = if duration_seconds.is_finite() && duration_seconds > 0.0 {
            duration_seconds.floor() as usize
        } else {
            0
        };
        let geometry = GlassGeometry::for_grain_count(total);
        let mut rng = SmallRng::from_os_rng();
        let mut grains = Vec::with_capacity(total);
        for position in pack_positions(&geometry, Chamber::Top, total, &mut rng) {
            grains.push(Grain::settled_at(position, geometry.grain_radius, Chamber::Top));
        }
        Self {
            geometry,
            grains,
            total,
            fallen: 0,
            rng,
        }
    }

    pub fn geometry(&self) -> &GlassGeometry {
        &self.geometry
    }

    pub fn grains(&self) -> &[Grain] {
        &self.grains
    }

    pub fn total_grains(&self) -> usize {
        self.total
    }

    /// Number of grains the release policy has sent through the neck.
    pub fn fallen(&self) -> usize {
        self.fallen
    }

    /// Grains resting in (or free within) the bottom chamber.
    pub fn bottom_count(&self) -> usize {
        self.grains
            .iter()
            .filter(|g| g.chamber == Chamber::Bottom && g.state != GrainState::Falling)
            .count()
    }

    /// Grains currently falling down through the neck.
    pub fn falling_count(&self) -> usize {
        self.grains
            .iter()
            .filter(|g| g.state == GrainState::Falling && g.chamber == Chamber::Top)
            .count()
    }

    /// One physics step. `playback_time` is the authoritative forward time in
    /// seconds, `rotation_angle` the glass rotation in degrees.
    pub fn update(&mut self, dt: f32, playback_time: f64, rotation_angle: f32) {
        if self.total == 0 || dt <= 0.0 {
            return;
        }
        let dt = dt.min(0.05);
        let gravity = gravity_vector(rotation_angle);
        self.integrate(dt, gravity);
        self.release(playback_time);
        self.advance_falling();
        self.collide_walls(gravity);
        self.collide_pairs();
        self.classify_settled();
        self.clamp_all();
    }

    /// Instantly reassign grains between chambers so the bottom chamber holds
    /// exactly `clamp(floor(target_time), 0, total)` grains, all settled with
    /// zero velocity. Used on manual seeks, bypassing the release policy.
    pub fn redistribute(&mut self, target_time: f64) {
        if self.total == 0 {
            return;
        }
        let target = clamp_target(target_time, self.total);
        let bottom = pack_positions(&self.geometry, Chamber::Bottom, target, &mut self.rng);
        let top = pack_positions(&self.geometry, Chamber::Top, self.total - target, &mut self.rng);
        let radius = self.geometry.grain_radius;
        for (grain, position) in self.grains.iter_mut().zip(
            bottom
                .into_iter()
                .map(|p| (p, Chamber::Bottom))
                .chain(top.into_iter().map(|p| (p, Chamber::Top))),
        ) {
            *grain = Grain::settled_at(position.0, radius, position.1);
        }
        self.fallen = target;
    }

    /// Fill levels for the reduced-motion mode, which draws a static fill in
    /// each chamber instead of running the simulation.
    pub fn static_fill(progress: f32) -> StaticFill {
        let progress = progress.clamp(0.0, 1.0);
        StaticFill {
            top: 1.0 - progress,
            bottom: progress,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // pipeline stages

    /// Advance all moving grains under gravity and friction.
    fn integrate(&mut self, dt: f32, gravity: Vec2) {
        let retain = FRICTION.powf(dt * 60.0);
        for grain in &mut self.grains {
            if grain.state == GrainState::Settled {
                continue;
            }
            grain.velocity += gravity * dt;
            grain.velocity *= retain;
            grain.position += grain.velocity * dt;
        }
    }

    /// Converge the fallen counter toward `floor(playback_time)`, releasing at
    /// most one grain through the neck per step.
    fn release(&mut self, playback_time: f64) {
        let target = clamp_target(playback_time, self.total);
        if self.fallen < target {
            self.release_through_neck(Chamber::Top);
        } else if self.fallen > target {
            self.release_through_neck(Chamber::Bottom);
        }
    }

    /// Send the best grain of `from` through the neck: the one closest to the
    /// neck entry, preferring grains near the center axis. Settled grains go
    /// first; with none at rest the best free grain goes instead, so a pile
    /// that is still collapsing never holds the release back. Waking every
    /// other settled grain of the chamber lets the pile re-collapse toward the
    /// neck.
    fn release_through_neck(&mut self, from: Chamber) {
        let best = self
            .best_release_candidate(from, GrainState::Settled)
            .or_else(|| self.best_release_candidate(from, GrainState::Free));
        let Some(index) = best else {
            // everything left is already mid-fall, retry next step
            return;
        };
        let radius = self.geometry.grain_radius;
        let sign = from.y_sign();
        {
            let grain = &mut self.grains[index];
            grain.state = GrainState::Falling;
            grain.position = Vec2::new(0.0, radius * sign);
            grain.velocity = Vec2::new(0.0, -NECK_SEED_SPEED * sign);
            grain.on_floor = false;
            grain.rest_frames = 0;
        }
        match from {
            Chamber::Top => self.fallen += 1,
            Chamber::Bottom => self.fallen -= 1,
        }
        for (i, grain) in self.grains.iter_mut().enumerate() {
            if i != index && grain.chamber == from {
                grain.wake();
            }
        }
    }

    /// Index of the `from` chamber grain in `state` with the lowest neck score.
    fn best_release_candidate(&self, from: Chamber, state: GrainState) -> Option<usize> {
        self.grains
            .iter()
            .enumerate()
            .filter(|(_, g)| g.chamber == from && g.state == state)
            .min_by(|(_, a), (_, b)| {
                neck_score(a.position)
                    .partial_cmp(&neck_score(b.position))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(index, _)| index)
    }

    /// Hand falling grains over to the far chamber once they cross the neck's
    /// boundary plane, waking nearby settled grains to simulate the impact.
    fn advance_falling(&mut self) {
        let cross_distance = self.geometry.grain_radius;
        let mut landed = Vec::new();
        for (index, grain) in self.grains.iter_mut().enumerate() {
            if grain.state != GrainState::Falling {
                continue;
            }
            let crossed = match grain.chamber {
                Chamber::Top => grain.position.y <= -cross_distance,
                Chamber::Bottom => grain.position.y >= cross_distance,
            };
            if crossed {
                grain.chamber = grain.chamber.other();
                grain.state = GrainState::Free;
                landed.push((index, grain.chamber, grain.position));
            }
        }
        let wake_radius = self.geometry.grain_radius * IMPACT_WAKE_RADII;
        for (landed_index, chamber, position) in landed {
            for (i, grain) in self.grains.iter_mut().enumerate() {
                if i != landed_index
                    && grain.chamber == chamber
                    && grain.state == GrainState::Settled
                    && grain.position.distance_squared(position) <= wake_radius * wake_radius
                {
                    grain.wake();
                }
            }
        }
    }

    /// Clamp free grains against the sloped walls and the apex/base planes,
    /// bleeding off energy via the normal/tangential velocity split.
    fn collide_walls(&mut self, gravity: Vec2) {
        let gravity_dir = gravity.normalize_or_zero();
        let geometry = self.geometry;
        for grain in &mut self.grains {
            if grain.state != GrainState::Free {
                continue;
            }
            grain.on_floor = false;
            let radius = grain.radius;
            let sign = grain.chamber.y_sign();

            for side in [-1.0, 1.0] {
                let distance = geometry.wall_distance(grain.chamber, side, grain.position);
                if distance < radius {
                    let normal = geometry.wall_normal(grain.chamber, side);
                    collide_plane(grain, normal, radius - distance, gravity_dir);
                }
            }
            // apex plane: the neck is closed for everything but Falling grains
            let y_local = grain.position.y * sign;
            if y_local < radius {
                collide_plane(grain, Vec2::new(0.0, sign), radius - y_local, gravity_dir);
            }
            // base plane
            if y_local > CHAMBER_HEIGHT - radius {
                let penetration = y_local - (CHAMBER_HEIGHT - radius);
                collide_plane(grain, Vec2::new(0.0, -sign), penetration, gravity_dir);
            }
        }
    }

    /// Narrow-phase pairwise collision over same-chamber grains, several
    /// positional passes with a y/x bucket broad phase. Candidate pairs are
    /// gathered per pass, then resolved against fresh positions.
    fn collide_pairs(&mut self) {
        let cell_size = (self.geometry.grain_radius * 2.0).max(1e-4);
        let mut buckets: HashMap<(i32, i32), Vec<usize>> = HashMap::new();
        let mut candidates: Vec<(usize, usize)> = Vec::new();
        for _ in 0..COLLISION_PASSES {
            buckets.clear();
            for (index, grain) in self.grains.iter().enumerate() {
                if grain.state == GrainState::Falling {
                    continue;
                }
                buckets
                    .entry(bucket_key(grain.position, cell_size))
                    .or_default()
                    .push(index);
            }
            candidates.clear();
            for (index, grain) in self.grains.iter().enumerate() {
                if grain.state == GrainState::Falling {
                    continue;
                }
                let (cx, cy) = bucket_key(grain.position, cell_size);
                for nx in cx - 1..=cx + 1 {
                    for ny in cy - 1..=cy + 1 {
                        let Some(neighbors) = buckets.get(&(nx, ny)) else {
                            continue;
                        };
                        for &other in neighbors {
                            if other > index {
                                candidates.push((index, other));
                            }
                        }
                    }
                }
            }
            for &(first, second) in &candidates {
                self.resolve_pair(first, second);
            }
        }
    }

    /// Resolve one potentially overlapping pair. `first < second`.
    fn resolve_pair(&mut self, first: usize, second: usize) {
        let (head, tail) = self.grains.split_at_mut(second);
        let a = &mut head[first];
        let b = &mut tail[0];
        if a.chamber != b.chamber {
            return;
        }
        let delta = b.position - a.position;
        let min_distance = a.radius + b.radius;
        let distance_squared = delta.length_squared();
        if distance_squared >= min_distance * min_distance || distance_squared < 1e-12 {
            return;
        }
        let distance = distance_squared.sqrt();
        let normal = delta / distance;
        let overlap = min_distance - distance;
        let relative = (b.velocity - a.velocity).dot(normal);

        match (a.state == GrainState::Settled, b.state == GrainState::Settled) {
            (false, false) => {
                a.position -= normal * (overlap * 0.5);
                b.position += normal * (overlap * 0.5);
                if relative < 0.0 {
                    let fast = a.speed().max(b.speed()) > WAKE_IMPACT_SPEED;
                    let restitution = if fast {
                        ELASTIC_RESTITUTION
                    } else {
                        SLIDE_RESTITUTION
                    };
                    let impulse = -(1.0 + restitution) * 0.5 * relative;
                    a.velocity -= normal * impulse;
                    b.velocity += normal * impulse;
                }
                // resting on a grounded neighbor counts as grounded
                if a.on_floor || b.on_floor {
                    a.on_floor = true;
                    b.on_floor = true;
                }
            }
            (true, false) => {
                if b.speed() > WAKE_IMPACT_SPEED {
                    a.wake();
                    let impulse = -(1.0 + BOUNCE_DAMPING) * 0.5 * relative.min(0.0);
                    a.velocity -= normal * impulse;
                    b.velocity += normal * impulse;
                    b.position += normal * (overlap * 0.5);
                    a.position -= normal * (overlap * 0.5);
                } else {
                    // the settled side stays put, the slow one slides off
                    b.position += normal * overlap;
                    b.velocity += normal * SLIDE_NUDGE;
                    b.on_floor = true;
                }
            }
            (false, true) => {
                if a.speed() > WAKE_IMPACT_SPEED {
                    b.wake();
                    let impulse = -(1.0 + BOUNCE_DAMPING) * 0.5 * relative.min(0.0);
                    a.velocity -= normal * impulse;
                    b.velocity += normal * impulse;
                    a.position -= normal * (overlap * 0.5);
                    b.position += normal * (overlap * 0.5);
                } else {
                    a.position -= normal * overlap;
                    a.velocity -= normal * SLIDE_NUDGE;
                    a.on_floor = true;
                }
            }
            (true, true) => {
                // overlap between two piles, separate without waking anyone
                a.position -= normal * (overlap * 0.5);
                b.position += normal * (overlap * 0.5);
            }
        }
    }

    /// A free grain settles once it rested on the floor below the chamber's
    /// speed threshold for several consecutive frames.
    fn classify_settled(&mut self) {
        for grain in &mut self.grains {
            if grain.state != GrainState::Free {
                continue;
            }
            let threshold = match grain.chamber {
                Chamber::Top => SETTLE_SPEED_TOP,
                Chamber::Bottom => SETTLE_SPEED_BOTTOM,
            };
            if grain.on_floor && grain.speed() < threshold {
                grain.rest_frames += 1;
                if grain.rest_frames >= SETTLE_FRAMES {
                    grain.state = GrainState::Settled;
                    grain.velocity = Vec2::ZERO;
                }
            } else {
                grain.rest_frames = 0;
            }
        }
    }

    /// Numerical safety net: hard-clip every non-falling grain back inside its
    /// chamber polygon.
    fn clamp_all(&mut self) {
        let geometry = self.geometry;
        for grain in &mut self.grains {
            if grain.state == GrainState::Falling {
                continue;
            }
            grain.position = geometry.clamp_inside(grain.chamber, grain.position, grain.radius);
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Project "down" through the glass rotation: tilting the glass tilts gravity.
fn gravity_vector(rotation_angle: f32) -> Vec2 {
    let radians = rotation_angle.to_radians();
    Vec2::new(radians.sin(), -radians.cos()) * GRAVITY
}

/// Release candidate score: closest to the neck wins, central grains preferred.
fn neck_score(position: Vec2) -> f32 {
    position.x.abs() + 0.5 * position.y.abs()
}

fn clamp_target(time: f64, total: usize) -> usize {
    if !time.is_finite() || time <= 0.0 {
        return 0;
    }
    (time.floor() as usize).min(total)
}

fn bucket_key(position: Vec2, cell_size: f32) -> (i32, i32) {
    (
        (position.x / cell_size).floor() as i32,
        (position.y / cell_size).floor() as i32,
    )
}

/// Plane collision response: push out along the normal and bleed off energy
/// via the tangential/normal velocity split.
fn collide_plane(grain: &mut Grain, normal: Vec2, penetration: f32, gravity_dir: Vec2) {
    grain.position += normal * penetration;
    let normal_speed = grain.velocity.dot(normal);
    if normal_speed < 0.0 {
        let tangent = grain.velocity - normal * normal_speed;
        grain.velocity = tangent * WALL_SLIDE_DAMPING - normal * normal_speed * BOUNCE_DAMPING;
    }
    if normal.dot(gravity_dir) < FLOOR_NORMAL_ALIGNMENT {
        grain.on_floor = true;
    }
}

/// Pack `count` resting positions into a chamber, filling rows from the floor
/// upward with a bit of jitter so piles do not look artificial.
fn pack_positions(
    geometry: &GlassGeometry,
    chamber: Chamber,
    count: usize,
    rng: &mut SmallRng,
) -> Vec<Vec2> {
    let mut positions = Vec::with_capacity(count);
    if count == 0 {
        return positions;
    }
    let radius = geometry.grain_radius;
    let row_spacing = radius * PACK_ROW_SPACING;
    let pitch = radius * PACK_COLUMN_PITCH;

    // the top chamber floor is the apex plane, the bottom chamber floor its base
    let mut row = 0usize;
    while positions.len() < count {
        let y_local = radius + row as f32 * row_spacing;
        if y_local > CHAMBER_HEIGHT - radius {
            break;
        }
        let y = match chamber {
            Chamber::Top => y_local,
            Chamber::Bottom => -CHAMBER_HEIGHT + y_local,
        };
        let usable_half_width = (geometry.half_width_at(y) - radius).max(0.0);
        let columns = ((usable_half_width * 2.0 / pitch).floor() as usize).max(1);
        for column in 0..columns {
            if positions.len() >= count {
                break;
            }
            let x = if columns == 1 {
                0.0
            } else {
                -usable_half_width + pitch * 0.5 + column as f32 * pitch
            };
            let jitter = Vec2::new(
                rng.random_range(-0.25..0.25) * radius,
                rng.random_range(-0.15..0.15) * radius,
            );
            let position =
                geometry.clamp_inside(chamber, Vec2::new(x, y) + jitter, radius);
            positions.push(position);
        }
        row += 1;
    }
    // overflow from pathological packing lands at random heights instead
    while positions.len() < count {
        let y_local = rng.random_range(radius..CHAMBER_HEIGHT - radius);
        let y = y_local * chamber.y_sign();
        let half = (geometry.half_width_at(y) - radius).max(0.0);
        let x = rng.random_range(-1.0..1.0) * half;
        positions.push(geometry.clamp_inside(chamber, Vec2::new(x, y), radius));
    }
    positions
}

// -------------------------------------------------------------------------------------------------
