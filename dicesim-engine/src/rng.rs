//! Random sources used by trial aggregation.
use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use sha2::Sha256;

/// Counting wrapper for RNG streams providing instrumentation.
///
/// The draw count exposes how much extra sampling rerolls caused.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<SmallRng> {
    /// Stream seeded deterministically from `seed`.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::wrap(SmallRng::seed_from_u64(seed))
    }

    /// Stream seeded from operating-system entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::wrap(SmallRng::from_entropy())
    }
}

impl<R: rand::RngCore> CountingRng<R> {
    /// Wrap an existing source, starting the draw count at zero.
    pub const fn wrap(rng: R) -> Self {
        Self { rng, draws: 0 }
    }

    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: rand::RngCore> rand::RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

/// Derive an independent stream seed from a run seed and a domain tag.
#[must_use]
pub fn derive_stream_seed(run_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&run_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}

/// Seed for the `index`-th worker of a parallel run.
#[must_use]
pub fn worker_stream_seed(run_seed: u64, index: usize) -> u64 {
    derive_stream_seed(run_seed, format!("worker-{index}").as_bytes())
}
