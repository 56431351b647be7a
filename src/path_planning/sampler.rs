//! Goal / local / uniform sampler
//!
//! One `StdRng` per planner. A draw `u ~ U(0, 1)` picks the mode:
//! goal when `u < p_goal`, local when `u < p_goal + p_local`, uniform
//! otherwise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::common::{SampleBounds, State};
use crate::path_planning::config::PlannerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Goal,
    Local,
    Uniform,
}

pub struct Sampler {
    rng: StdRng,
    goal: State,
    bounds: SampleBounds,
    p_goal: f64,
    p_local: f64,
    local_radius: [f64; 2],
}

impl Sampler {
    /// `seed == 0` seeds from the OS once
    pub fn new(
        goal: State,
        bounds: SampleBounds,
        p_goal: f64,
        p_local: f64,
        local_radius: [f64; 2],
        seed: u64,
    ) -> Self {
        let rng = if seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(seed)
        };
        Sampler {
            rng,
            goal,
            bounds,
            p_goal,
            p_local,
            local_radius,
        }
    }

    pub fn from_config(config: &PlannerConfig, goal: State) -> Self {
        Self::new(
            goal,
            config.sample_bounds.clone(),
            config.p_goal,
            config.p_local,
            config.local_radius,
            config.seed,
        )
    }

    pub fn goal(&self) -> &State {
        &self.goal
    }

    /// Pick the mode of the next sample
    fn choose_kind(&mut self) -> SampleKind {
        let u: f64 = self.rng.gen();
        if u < self.p_goal {
            SampleKind::Goal
        } else if u < self.p_goal + self.p_local {
            SampleKind::Local
        } else {
            SampleKind::Uniform
        }
    }

    /// Draw the next sample. `reference` picks the state to perturb and is
    /// only called for local samples; it may use the sampler's generator.
    pub fn sample<F>(&mut self, reference: F) -> (SampleKind, State)
    where
        F: FnOnce(&mut Sampler) -> State,
    {
        let kind = self.choose_kind();
        let state = match kind {
            SampleKind::Goal => self.goal.clone(),
            SampleKind::Local => {
                let around = reference(self);
                self.sample_local(&around)
            }
            SampleKind::Uniform => self.sample_uniform(),
        };
        (kind, state)
    }

    /// Independent uniform draw per dimension inside the bounds
    fn sample_uniform(&mut self) -> State {
        let rng = &mut self.rng;
        State::from_iterator(
            self.bounds.dim(),
            self.bounds
                .lower
                .iter()
                .zip(self.bounds.upper.iter())
                .map(|(&lo, &hi)| rng.gen_range(lo..=hi)),
        )
    }

    /// Perturb `reference` along a uniform direction by a magnitude in
    /// `[r_min, r_max]`, then clamp into the bounds
    fn sample_local(&mut self, reference: &State) -> State {
        let dim = reference.len();
        let direction = loop {
            let v = State::from_iterator(
                dim,
                (0..dim).map(|_| self.rng.sample::<f64, _>(StandardNormal)),
            );
            let norm = v.norm();
            if norm > 1e-12 {
                break v / norm;
            }
        };
        let [r_min, r_max] = self.local_radius;
        let magnitude = self.rng.gen_range(r_min..=r_max);

        let mut sample = reference + direction * magnitude;
        if self.bounds.dim() == dim {
            self.bounds.clamp(&mut sample);
        }
        sample
    }

    /// Uniform index in `0..len`, used to pick a local reference node
    pub fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            0
        } else {
            self.rng.gen_range(0..len)
        }
    }
}
