use hmac::{Hmac, Mac};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::symbols::{Catalog, REEL_COUNT};

// Reel draws come from an injected source so spins can be replayed.
// Provably-fair mode: server_seed (secret) + client_seed + nonce + reel -> HMAC-SHA256 -> floats in [0,1)

pub type HmacSha256 = Hmac<Sha256>;

/// Per-reel stream of catalog indices.
pub trait SymbolSource: Send + 'static {
    /// Cosmetic draw shown while the reel spins.
    fn tick_index(&mut self, len: usize) -> usize;
    /// The draw that settles the reel.
    fn final_index(&mut self, len: usize) -> usize;
}

/// Hands out one [`SymbolSource`] per reel for every accepted spin.
pub trait ReelRng: Send + 'static {
    type Source: SymbolSource;

    fn reel_sources(&mut self) -> [Self::Source; REEL_COUNT];

    /// Data needed to re-derive the most recent spin, if this source supports it.
    fn proof(&self) -> Option<FairnessProof> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FairnessProof {
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
}

fn float_to_index(f: f64, len: usize) -> usize {
    ((f * len as f64).floor() as usize) % len
}

// ---------------------------------------------------------------------------
// OS entropy

/// Default source: independent OS-seeded generators per reel.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntropyRng;

pub struct EntropySource(StdRng);

impl SymbolSource for EntropySource {
    fn tick_index(&mut self, len: usize) -> usize {
        self.0.gen_range(0..len)
    }

    fn final_index(&mut self, len: usize) -> usize {
        self.0.gen_range(0..len)
    }
}

impl ReelRng for EntropyRng {
    type Source = EntropySource;

    fn reel_sources(&mut self) -> [EntropySource; REEL_COUNT] {
        std::array::from_fn(|_| EntropySource(StdRng::from_entropy()))
    }
}

// ---------------------------------------------------------------------------
// Provably fair

pub fn derive_hash_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Endless stream of floats in [0,1) read from successive 4-byte chunks.
/// When the buffer runs dry it is replaced by its own SHA-256 digest.
pub struct FloatStream {
    buffer: Vec<u8>,
    pos: usize,
}

impl FloatStream {
    pub fn new(seed_bytes: &[u8]) -> Self {
        Self {
            buffer: seed_bytes.to_vec(),
            pos: 0,
        }
    }

    pub fn next_float(&mut self) -> f64 {
        if self.pos + 4 > self.buffer.len() {
            self.buffer = Sha256::digest(&self.buffer).to_vec();
            self.pos = 0;
        }
        let chunk = &self.buffer[self.pos..self.pos + 4];
        let v = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        self.pos += 4;
        (v as f64) / (u32::MAX as f64 + 1.0)
    }
}

pub fn derive_floats(hmac_bytes: &[u8], count: usize) -> Vec<f64> {
    let mut stream = FloatStream::new(hmac_bytes);
    (0..count).map(|_| stream.next_float()).collect()
}

fn hmac_bytes(server_seed: &str, msg: &str) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(server_seed.as_bytes()).expect("HMAC accepts any key length");
    mac.update(msg.as_bytes());
    let res = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&res);
    out
}

/// Seeded generator whose every draw can be recomputed once the server seed is revealed.
pub struct ProvablyFairRng {
    pub server_seed: String, // secret
    pub client_seed: String,
    pub nonce: u64, // nonce of the last spin, 0 before the first
}

impl ProvablyFairRng {
    pub fn new(server_seed: impl Into<String>, client_seed: impl Into<String>, nonce: u64) -> Self {
        Self {
            server_seed: server_seed.into(),
            client_seed: client_seed.into(),
            nonce,
        }
    }

    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }

    fn source_for(&self, nonce: u64, reel: usize) -> FairSource {
        let prefix = format!("{}:{}:{}", self.client_seed, nonce, reel);
        let final_bytes = hmac_bytes(&self.server_seed, &format!("{prefix}:final"));
        let tick_bytes = hmac_bytes(&self.server_seed, &format!("{prefix}:tick"));
        FairSource {
            final_float: FloatStream::new(&final_bytes).next_float(),
            ticks: FloatStream::new(&tick_bytes),
        }
    }

    /// Catalog indices the three reels settle on for `nonce`.
    pub fn final_indices(&self, nonce: u64, len: usize) -> [usize; REEL_COUNT] {
        std::array::from_fn(|reel| float_to_index(self.source_for(nonce, reel).final_float, len))
    }
}

pub struct FairSource {
    final_float: f64,
    ticks: FloatStream,
}

impl SymbolSource for FairSource {
    fn tick_index(&mut self, len: usize) -> usize {
        float_to_index(self.ticks.next_float(), len)
    }

    fn final_index(&mut self, len: usize) -> usize {
        float_to_index(self.final_float, len)
    }
}

impl ReelRng for ProvablyFairRng {
    type Source = FairSource;

    fn reel_sources(&mut self) -> [FairSource; REEL_COUNT] {
        self.nonce += 1;
        let nonce = self.nonce;
        std::array::from_fn(|reel| self.source_for(nonce, reel))
    }

    fn proof(&self) -> Option<FairnessProof> {
        Some(FairnessProof {
            server_seed_hash: self.server_seed_hash_hex(),
            client_seed: self.client_seed.clone(),
            nonce: self.nonce,
        })
    }
}

/// Check that the named symbols are what the seeds produce for `nonce`.
pub fn verify_spin(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    catalog: &Catalog,
    expected_names: &[String],
) -> bool {
    let rng = ProvablyFairRng::new(server_seed, client_seed, nonce);
    let actual: Vec<&str> = rng
        .final_indices(nonce, catalog.len())
        .iter()
        .map(|&i| catalog.at(i).name.as_str())
        .collect();
    actual == expected_names
}

// ---------------------------------------------------------------------------
// Fixed

/// Every reel always shows the same catalog index. Used to script outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedReels(pub [usize; REEL_COUNT]);

#[derive(Debug, Clone, Copy)]
pub struct FixedSource(pub usize);

impl SymbolSource for FixedSource {
    fn tick_index(&mut self, len: usize) -> usize {
        self.0 % len
    }

    fn final_index(&mut self, len: usize) -> usize {
        self.0 % len
    }
}

impl ReelRng for FixedReels {
    type Source = FixedSource;

    fn reel_sources(&mut self) -> [FixedSource; REEL_COUNT] {
        self.0.map(FixedSource)
    }
}
