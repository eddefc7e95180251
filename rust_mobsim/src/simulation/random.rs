use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Returns a seeded generator for one entity. Collaborators that need stochastic behavior
/// (plan selection, demand sampling) derive their generator from the run's base seed and a
/// stable entity hash, never from a process-wide singleton, so that reruns reproduce.
/// Nothing inside the tick loop draws random numbers.
pub fn get_rnd<H: Hash>(base_seed: u64, entity: H) -> SmallRng {
    let mut hasher = DefaultHasher::new();
    entity.hash(&mut hasher);
    base_seed.hash(&mut hasher);
    SmallRng::seed_from_u64(hasher.finish())
}
