//! Workload generators for hit-rate benchmarks.
//!
//! Key streams are deterministic per seed so runs are comparable.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use refcache::item::Item;
use refcache::policy::refcount::RefcountCache;
use refcache::traits::Finalizer;

#[derive(Debug, Clone, Copy)]
pub enum Workload {
    /// Uniform random keys in `[0, universe)`.
    Uniform,
    /// Hot/cold split with a configurable hot fraction and hot access probability.
    Hotset { hot_fraction: f64, hot_prob: f64 },
    /// Sequential scan in `[0, universe)`.
    Scan,
    /// Zipfian distribution; `theta` 0.0 is uniform, 0.99 highly skewed.
    Zipfian { theta: f64 },
}

#[derive(Debug, Clone, Copy)]
pub struct WorkloadSpec {
    pub universe: u64,
    pub workload: Workload,
    pub seed: u64,
}

impl WorkloadSpec {
    pub fn generator(self) -> WorkloadGenerator {
        WorkloadGenerator::new(self.universe, self.workload, self.seed)
    }
}

#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    universe: u64,
    workload: Workload,
    rng: StdRng,
    scan_pos: u64,
    zipfian: Option<ZipfianState>,
}

impl WorkloadGenerator {
    pub fn new(universe: u64, workload: Workload, seed: u64) -> Self {
        let universe = universe.max(1);
        let zipfian = match workload {
            Workload::Zipfian { theta } => Some(ZipfianState::new(universe, theta)),
            _ => None,
        };
        Self {
            universe,
            workload,
            rng: StdRng::seed_from_u64(seed),
            scan_pos: 0,
            zipfian,
        }
    }

    pub fn next_key(&mut self) -> u64 {
        match (self.workload, &self.zipfian) {
            (Workload::Zipfian { .. }, Some(zipf)) => zipf.sample(self.rng.gen::<f64>()),
            (Workload::Hotset { hot_fraction, hot_prob }, _) => {
                let hot_size = ((self.universe as f64) * hot_fraction.clamp(0.0, 1.0)).round() as u64;
                let hot_size = hot_size.clamp(1, self.universe);
                if self.rng.gen_bool(hot_prob.clamp(0.0, 1.0)) || hot_size == self.universe {
                    self.rng.gen_range(0..hot_size)
                } else {
                    self.rng.gen_range(hot_size..self.universe)
                }
            },
            (Workload::Scan, _) => {
                let key = self.scan_pos;
                self.scan_pos = (self.scan_pos + 1) % self.universe;
                key
            },
            _ => self.rng.gen_range(0..self.universe),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HitRate {
    pub hits: u64,
    pub misses: u64,
    /// Misses whose insert found every entry pinned.
    pub rejected: u64,
}

impl HitRate {
    pub fn hit_rate(self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Run a hit-rate workload against a cache.
///
/// Each access is a fetch, or an insert on miss, followed by a release. Every
/// `dirty_every`-th access marks the item dirty before releasing it.
pub fn run_hit_rate<F>(
    cache: &mut RefcountCache<Item<u64, u64>, F>,
    generator: &mut WorkloadGenerator,
    operations: usize,
    dirty_every: usize,
) -> HitRate
where
    F: Finalizer<Item<u64, u64>>,
{
    let mut rate = HitRate::default();

    for op in 0..operations {
        let key = generator.next_key();
        let dirty = dirty_every > 0 && op % dirty_every == 0;
        if let Some(item) = cache.fetch(&key) {
            rate.hits += 1;
            if dirty {
                item.mark_dirty();
            }
        } else {
            rate.misses += 1;
            let mut item = Item::new(key, key);
            item.set_dirty(dirty);
            if let Err(err) = cache.insert(item) {
                rate.rejected += 1;
                let _ = cache.release_owned(err.into_item());
                continue;
            }
        }
        let _ = cache.release(&key);
    }

    rate
}

/// Zipfian sampling by inverse CDF (YCSB algorithm), zeta precomputed.
#[derive(Debug, Clone)]
struct ZipfianState {
    n: u64,
    theta: f64,
    zeta_n: f64,
    alpha: f64,
    eta: f64,
}

impl ZipfianState {
    fn new(n: u64, theta: f64) -> Self {
        let theta = theta.clamp(0.0, 0.9999);
        let zeta_2 = Self::zeta(2, theta);
        let zeta_n = Self::zeta(n, theta);
        let alpha = 1.0 / (1.0 - theta);
        let eta = (1.0 - (2.0 / n as f64).powf(1.0 - theta)) / (1.0 - zeta_2 / zeta_n);

        Self {
            n,
            theta,
            zeta_n,
            alpha,
            eta,
        }
    }

    fn zeta(n: u64, theta: f64) -> f64 {
        (1..=n).map(|i| 1.0 / (i as f64).powf(theta)).sum()
    }

    fn sample(&self, u: f64) -> u64 {
        let uz = u * self.zeta_n;
        if uz < 1.0 {
            return 0;
        }
        if uz < 1.0 + 0.5_f64.powf(self.theta) {
            return 1;
        }
        let spread = (self.n as f64) * (self.eta * u - self.eta + 1.0).powf(self.alpha);
        (spread as u64).min(self.n - 1)
    }
}
