// src/game/wander.rs
// Pause/seek state machine shared by every ambient species.
// Species only differ by the `WanderParams` row they were spawned with.

use rand::Rng;
use std::time::Duration;
use tracing::trace;

use super::entity_state::{AmbientActor, GroundPoint, WanderParams, WanderState, WorldBounds};

/// Distance under which a seeking actor counts as arrived
pub const ARRIVAL_THRESHOLD: f32 = 0.5;

/// Draw the time at which a pause that starts at `now` ends
pub fn draw_resume_at<R: Rng>(params: &WanderParams, now: Duration, rng: &mut R) -> Duration {
    let secs = if params.pause_max_secs > params.pause_min_secs {
        rng.gen_range(params.pause_min_secs..params.pause_max_secs)
    } else {
        params.pause_min_secs
    };
    now + Duration::try_from_secs_f32(secs.max(0.0)).unwrap_or(Duration::ZERO)
}

/// Pick a target within `wander_radius` of `from` on each axis, clamped into the world
pub fn draw_target<R: Rng>(params: &WanderParams, from: GroundPoint, bounds: &WorldBounds, rng: &mut R) -> GroundPoint {
    let radius = params.wander_radius.abs();
    if radius == 0.0 {
        return bounds.clamp(from);
    }
    let dx = rng.gen_range(-radius..=radius);
    let dz = rng.gen_range(-radius..=radius);
    bounds.clamp(GroundPoint::new(from.x + dx, from.z + dz))
}

/// Runs the wander state machine for one actor per tick
#[derive(Debug, Clone, Copy)]
pub struct WanderBehavior {
    pub bounds: WorldBounds,
}

impl WanderBehavior {
    pub fn new(bounds: WorldBounds) -> Self {
        Self { bounds }
    }

    pub fn step<R: Rng>(&self, actor: &mut AmbientActor, now: Duration, rng: &mut R) {
        let params = actor.params;

        match actor.state {
            WanderState::Paused { resume_at } => {
                if now > resume_at {
                    let target = draw_target(&params, actor.position.ground(), &self.bounds, rng);
                    trace!(
                        actor_id = actor.id,
                        species = %actor.species,
                        target_x = target.x,
                        target_z = target.z,
                        "Actor resumed wandering"
                    );
                    actor.state = WanderState::Seeking { target };
                }
            }
            WanderState::Seeking { target } => {
                let dx = target.x - actor.position.x;
                let dz = target.z - actor.position.z;
                let distance = (dx * dx + dz * dz).sqrt();

                if distance < ARRIVAL_THRESHOLD {
                    actor.phase = 0.0;
                    actor.position.y = params.base_y;
                    actor.state = WanderState::Paused {
                        resume_at: draw_resume_at(&params, now, rng),
                    };
                    trace!(actor_id = actor.id, species = %actor.species, "Actor paused");
                    return;
                }

                actor.position.x += dx / distance * params.speed;
                actor.position.z += dz / distance * params.speed;
                actor.facing = dx.atan2(dz);

                actor.phase += params.phase_increment;
                actor.position.y = params.base_y + actor.phase.sin().abs() * params.bob_amplitude;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::kinds::SpeciesTable;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn bunny_params() -> WanderParams {
        SpeciesTable::default().get("Bunny").unwrap().wander
    }

    fn bunny_at(x: f32, z: f32, state: WanderState) -> AmbientActor {
        let mut actor = AmbientActor::new(0, "Bunny".to_string(), GroundPoint::new(x, z), bunny_params(), Duration::ZERO, 0xFFFFFF);
        actor.state = state;
        actor
    }

    #[test]
    fn test_paused_actor_holds_until_resume_time() {
        let behavior = WanderBehavior::new(WorldBounds::symmetric(9.0));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut bunny = bunny_at(1.0, 1.0, WanderState::Paused { resume_at: Duration::from_secs(2) });

        behavior.step(&mut bunny, Duration::from_secs(1), &mut rng);
        assert!(bunny.state.is_paused());
        behavior.step(&mut bunny, Duration::from_secs(2), &mut rng);
        assert!(bunny.state.is_paused(), "resume needs strictly later time");
        assert_eq!(bunny.position.ground(), GroundPoint::new(1.0, 1.0));

        behavior.step(&mut bunny, Duration::from_millis(2001), &mut rng);
        assert!(matches!(bunny.state, WanderState::Seeking { .. }));
    }

    #[test]
    fn test_new_target_is_within_radius_and_bounds() {
        let bounds = WorldBounds::symmetric(9.0);
        let behavior = WanderBehavior::new(bounds);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let params = bunny_params();

        for i in 0..500 {
            let x = (i % 19) as f32 - 9.0;
            let mut bunny = bunny_at(x, -x, WanderState::Paused { resume_at: Duration::ZERO });
            behavior.step(&mut bunny, Duration::from_millis(1), &mut rng);

            let WanderState::Seeking { target } = bunny.state else {
                panic!("expected seeking, got {:?}", bunny.state);
            };
            assert!(bounds.contains(&target));
            assert!((target.x - x).abs() <= params.wander_radius);
            assert!((target.z + x).abs() <= params.wander_radius);
        }
    }

    #[test]
    fn test_seeking_moves_at_species_speed_and_hops() {
        let behavior = WanderBehavior::new(WorldBounds::symmetric(9.0));
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let params = bunny_params();
        let mut bunny = bunny_at(0.0, 0.0, WanderState::Seeking { target: GroundPoint::new(5.0, 0.0) });

        behavior.step(&mut bunny, Duration::from_secs(1), &mut rng);

        assert!((bunny.position.x - params.speed).abs() < 1e-6);
        assert!(bunny.position.z.abs() < 1e-6);
        assert!((bunny.facing - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!((bunny.phase - params.phase_increment).abs() < 1e-6);
        let expected_y = params.base_y + params.phase_increment.sin().abs() * params.bob_amplitude;
        assert!((bunny.position.y - expected_y).abs() < 1e-6);
    }

    #[test]
    fn test_arrival_pauses_and_resets_animation() {
        let behavior = WanderBehavior::new(WorldBounds::symmetric(9.0));
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let params = bunny_params();
        let mut bunny = bunny_at(0.0, 0.0, WanderState::Seeking { target: GroundPoint::new(0.3, 0.2) });
        bunny.phase = 4.0;
        bunny.position.y = 0.55;

        let now = Duration::from_secs(10);
        behavior.step(&mut bunny, now, &mut rng);

        let WanderState::Paused { resume_at } = bunny.state else {
            panic!("expected paused");
        };
        assert_eq!(bunny.phase, 0.0);
        assert_eq!(bunny.position.y, params.base_y);
        assert!(resume_at >= now + Duration::from_secs_f32(params.pause_min_secs));
        assert!(resume_at <= now + Duration::from_secs_f32(params.pause_max_secs));
    }

    #[test]
    fn test_cycle_seeks_then_pauses_on_arrival() {
        let bounds = WorldBounds::symmetric(9.0);
        let behavior = WanderBehavior::new(bounds);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut bunny = bunny_at(2.0, 2.0, WanderState::Paused { resume_at: Duration::ZERO });

        let frame = Duration::from_millis(16);
        let mut now = frame;
        let mut saw_seek = false;
        let mut saw_second_pause = false;

        for _ in 0..20_000 {
            behavior.step(&mut bunny, now, &mut rng);
            match bunny.state {
                WanderState::Seeking { .. } => saw_seek = true,
                WanderState::Paused { resume_at } if saw_seek && resume_at > now - frame => {
                    saw_second_pause = true;
                }
                _ => {}
            }
            assert!(bounds.contains(&bunny.position.ground()));
            if saw_second_pause {
                break;
            }
            now += frame;
        }

        assert!(saw_seek);
        assert!(saw_second_pause);
    }

    #[test]
    fn test_rooster_uses_its_own_row() {
        let species = SpeciesTable::default();
        let rooster = species.get("Rooster").unwrap().wander;
        let behavior = WanderBehavior::new(WorldBounds::symmetric(9.0));
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut actor = AmbientActor::new(
            1,
            "Rooster".to_string(),
            GroundPoint::new(0.0, 0.0),
            rooster,
            Duration::ZERO,
            0,
        );
        actor.state = WanderState::Seeking { target: GroundPoint::new(0.0, 8.0) };

        behavior.step(&mut actor, Duration::from_secs(1), &mut rng);
        assert!((actor.position.z - rooster.speed).abs() < 1e-6);
        assert!(actor.position.y - rooster.base_y <= rooster.bob_amplitude + 1e-6);
    }
}
