//! Session identifier allocation

use rand::Rng;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Result, RouterError};
use crate::registry::SessionRegistry;

/// Number of random candidates tried before giving up
pub const MAX_ATTEMPTS: usize = 3;

/// Largest session number; ids are drawn from `1..=MAX_SESSION_NR`
pub const MAX_SESSION_NR: u32 = 0xFF_FFFE;

/// Source of session number candidates
pub trait CandidateSource: Send + Sync {
    /// Next number to try, in `1..=MAX_SESSION_NR`
    fn next_candidate(&self) -> u32;
}

/// Uniformly random candidates
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCandidates;

impl CandidateSource for RandomCandidates {
    fn next_candidate(&self) -> u32 {
        rand::rng().random_range(1..=MAX_SESSION_NR)
    }
}

/// Allocates free session ids from a 24-bit space.
///
/// Each candidate is claimed with an atomic insert-if-absent, so two
/// concurrent callers can never both receive the same id.
pub struct IdentifierAllocator {
    sessions: Arc<SessionRegistry>,
    candidates: Arc<dyn CandidateSource>,
}

impl IdentifierAllocator {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self::with_candidates(sessions, Arc::new(RandomCandidates))
    }

    pub fn with_candidates(
        sessions: Arc<SessionRegistry>,
        candidates: Arc<dyn CandidateSource>,
    ) -> Self {
        Self {
            sessions,
            candidates,
        }
    }

    /// Claim a free session id drawn from the candidate source
    pub fn allocate(&self, now: Instant) -> Result<String> {
        let candidates = (0..MAX_ATTEMPTS).map(|_| self.candidates.next_candidate());
        self.allocate_from(candidates, now)
    }

    /// Claim the first free id among `candidates`, trying at most
    /// [`MAX_ATTEMPTS`] of them
    pub fn allocate_from<I>(&self, candidates: I, now: Instant) -> Result<String>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut attempts = 0;
        for nr in candidates.into_iter().take(MAX_ATTEMPTS) {
            attempts += 1;
            let id = format_id(nr);
            if self.sessions.insert_if_absent(&id, now) {
                return Ok(id);
            }
        }
        Err(RouterError::Overloaded {
            attempts,
            sessions: self.sessions.len(),
        })
    }
}

/// Six lower-case hex digits
pub fn format_id(nr: u32) -> String {
    format!("{:06x}", nr)
}
