use bevy::prelude::*;
use rand::Rng;

use crate::config::ParticleConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub pos: Vec3,
    pub vel: Vec3,
    pub acc: Vec3,
}

/// Fixed-size cloud of points drifting inside the cube `[-bound, bound]^3`.
#[derive(Clone, Debug)]
pub struct ParticleField {
    pub particles: Vec<Particle>,
    pub bound: f32,
    pub velocity_spread: f32,
    pub acceleration_spread: f32,
    /// Set whenever positions change; cleared once the mesh is re-uploaded.
    pub dirty: bool,
}

fn centred<R: Rng + ?Sized>(rng: &mut R, spread: f32) -> f32 {
    (rng.gen::<f32>() - 0.5) * spread
}

impl ParticleField {
    pub fn new<R: Rng + ?Sized>(config: &ParticleConfig, rng: &mut R) -> Self {
        let mut field = Self {
            particles: Vec::with_capacity(config.count),
            bound: config.bound,
            velocity_spread: config.velocity_spread,
            acceleration_spread: config.acceleration_spread,
            dirty: true,
        };
        for _ in 0..config.count {
            let p = field.spawn(rng);
            field.particles.push(p);
        }
        field
    }

    fn spawn<R: Rng + ?Sized>(&self, rng: &mut R) -> Particle {
        let mut p = Particle {
            pos: Vec3::ZERO,
            vel: Vec3::ZERO,
            acc: Vec3::ZERO,
        };
        for axis in 0..3 {
            p.pos[axis] = rng.gen_range(-self.bound..=self.bound);
            p.vel[axis] = centred(rng, self.velocity_spread);
            p.acc[axis] = centred(rng, self.acceleration_spread);
        }
        p
    }

    /// Re-randomizes every particle in place, keeping the count.
    pub fn reseed<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in 0..self.particles.len() {
            self.particles[i] = self.spawn(rng);
        }
        self.dirty = true;
    }

    /// One kinematics step: v += a, p += v, then any axis that left the cube
    /// gets a fresh position and velocity on that axis only. Acceleration is
    /// never resampled.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let bound = self.bound;
        let spread = self.velocity_spread;
        for p in &mut self.particles {
            p.vel += p.acc;
            p.pos += p.vel;

            for axis in 0..3 {
                if p.pos[axis] > bound || p.pos[axis] < -bound {
                    p.pos[axis] = rng.gen_range(-bound..=bound);
                    p.vel[axis] = centred(rng, spread);
                }
            }
        }
        self.dirty = true;
    }

    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.particles.iter().map(|p| p.pos.to_array()).collect()
    }
}
