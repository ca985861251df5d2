//! Random perfect matching of participants into two-firm markets.

use lab_core::{Pairing, ParticipantId};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

/// Pairings produced for one game.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assignment {
    pub pairings: Vec<Pairing>,
    /// Leftover participant of an odd roster, scored through a residual pairing.
    pub residual: Option<ParticipantId>,
}

/// Seeded shuffler that forms the pairings.
#[derive(Clone, Debug)]
pub struct PairingAssigner {
    rng: ChaCha8Rng,
}

impl PairingAssigner {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Shuffle `ids` and pop them two at a time.
    ///
    /// With an odd count the last participant is matched against a uniformly
    /// chosen participant that is already paired, in a pairing flagged as
    /// residual. A single participant cannot be paired and is left out.
    pub fn assign(&mut self, ids: &[ParticipantId]) -> Assignment {
        let mut pool = ids.to_vec();
        pool.shuffle(&mut self.rng);

        let mut pairings = Vec::with_capacity(pool.len() / 2 + 1);
        while pool.len() >= 2 {
            let (Some(a), Some(b)) = (pool.pop(), pool.pop()) else {
                break;
            };
            pairings.push(Pairing::new(a, b));
        }

        let mut residual = None;
        if let Some(leftover) = pool.pop() {
            let placed: Vec<ParticipantId> = pairings
                .iter()
                .flat_map(|p| [p.first.clone(), p.second.clone()])
                .collect();
            match placed.choose(&mut self.rng) {
                Some(absorbing) => {
                    info!(%leftover, %absorbing, "odd roster, adding residual pairing");
                    pairings.push(Pairing::residual(leftover.clone(), absorbing.clone()));
                    residual = Some(leftover);
                }
                None => warn!(%leftover, "only one participant, nobody to pair with"),
            }
        }

        Assignment { pairings, residual }
    }
}
