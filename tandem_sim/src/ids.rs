//! Deterministic remote ids for simulation.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::{Builder, Uuid};

/// Derives remote object ids from the master seed.
///
/// Ids are:
/// - Deterministic: same seed and name always produce the same id
/// - Unique: different names get different ids
/// - Isolated: the order in which objects are created does not matter
#[derive(Debug, Clone, Copy)]
pub struct DeterministicIds {
    /// Master seed
    master_seed: u64,
}

impl DeterministicIds {
    /// Creates an id source with the given master seed.
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Returns the UUID for a named object.
    ///
    /// Seeded by `master_seed * golden ratio + fnv1a(name)`.
    pub fn uuid_for(&self, name: &str) -> Uuid {
        let seed = self
            .master_seed
            .wrapping_mul(0x9e3779b97f4a7c15)
            .wrapping_add(fnv1a(name));

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        Builder::from_random_bytes(bytes).into_uuid()
    }

    /// Returns a short instance id such as `i-1a2b3c4d5e6f`.
    pub fn instance_id(&self, name: &str) -> String {
        format!("i-{}", &self.uuid_for(name).simple().to_string()[..12])
    }

    /// Returns an image id for a data-source read.
    pub fn image_id(&self, name: &str) -> String {
        format!("img-{}", &self.uuid_for(name).simple().to_string()[..8])
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}
