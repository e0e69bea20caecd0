use chrono::Utc;
use skylane_core::random::RandomSource;
use skylane_core::repository::BookingStore;
use skylane_core::EngineResult;
use tracing::warn;
use uuid::Uuid;

/// Characters a PNR may contain. Upper-case alphanumerics only, the way
/// airline record locators read.
pub const PNR_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const DEFAULT_LENGTH: usize = 6;
const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// Draws record locators and checks them against the durable store until a
/// free one turns up. If the candidate space looks exhausted the allocator
/// falls back to a longer high-entropy code instead of failing the booking.
#[derive(Debug, Clone)]
pub struct PnrAllocator {
    length: usize,
    max_attempts: u32,
}

impl Default for PnrAllocator {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PnrAllocator {
    pub fn new(length: usize, max_attempts: u32) -> Self {
        Self {
            length,
            max_attempts,
        }
    }

    fn candidate(&self, rng: &mut dyn RandomSource) -> String {
        (0..self.length)
            .map(|_| {
                let idx = rng.pick_in(0, PNR_ALPHABET.len() as u32 - 1) as usize;
                PNR_ALPHABET[idx] as char
            })
            .collect()
    }

    fn fallback(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string()[..4].to_uppercase();
        format!("PNR{}{}", Utc::now().timestamp(), suffix)
    }

    pub async fn allocate(
        &self,
        store: &dyn BookingStore,
        rng: &mut dyn RandomSource,
    ) -> EngineResult<String> {
        for _ in 0..self.max_attempts {
            let pnr = self.candidate(rng);
            if !store.pnr_exists(&pnr).await? {
                return Ok(pnr);
            }
        }
        let fallback = self.fallback();
        warn!(
            attempts = self.max_attempts,
            %fallback,
            "pnr candidates exhausted, using high-entropy fallback"
        );
        Ok(fallback)
    }
}
