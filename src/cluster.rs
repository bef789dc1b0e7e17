//! Seeded k-means over small feature matrices.
//!
//! Lloyd iterations from a k-means++ start, restarted `n_init` times; the
//! run with the lowest inertia wins. The same seed and input always give
//! the same labels.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

const DEFAULT_N_INIT: usize = 10;
const DEFAULT_MAX_ITER: usize = 300;
const TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    n_init: usize,
    max_iter: usize,
    seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering<const D: usize> {
    /// Cluster index per input point
    pub labels: Vec<usize>,
    pub centroids: Vec<[f64; D]>,
    pub inertia: f64,
}

fn distance_sq<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest<const D: usize>(point: &[f64; D], centroids: &[[f64; D]]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, distance_sq(point, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            n_init: DEFAULT_N_INIT,
            max_iter: DEFAULT_MAX_ITER,
            seed,
        }
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    /// Cluster `points`. `k` is capped at the number of points.
    pub fn fit<const D: usize>(&self, points: &[[f64; D]]) -> Clustering<D> {
        let k = self.k.min(points.len());
        if k == 0 {
            return Clustering {
                labels: vec![0; points.len()],
                centroids: Vec::new(),
                inertia: 0.0,
            };
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<Clustering<D>> = None;
        for run in 0..self.n_init {
            let centroids = plus_plus_init(points, k, &mut rng);
            let result = self.lloyd(points, centroids);
            debug!("k-means run {} inertia {:.4}", run, result.inertia);
            if best.as_ref().map_or(true, |b| result.inertia < b.inertia) {
                best = Some(result);
            }
        }
        best.unwrap_or_else(|| Clustering {
            labels: vec![0; points.len()],
            centroids: Vec::new(),
            inertia: 0.0,
        })
    }

    fn lloyd<const D: usize>(&self, points: &[[f64; D]], mut centroids: Vec<[f64; D]>) -> Clustering<D> {
        let mut labels = vec![0usize; points.len()];
        for _ in 0..self.max_iter {
            for (label, point) in labels.iter_mut().zip(points) {
                *label = nearest(point, &centroids).0;
            }

            let mut sums = vec![[0.0f64; D]; centroids.len()];
            let mut counts = vec![0usize; centroids.len()];
            for (label, point) in labels.iter().zip(points) {
                counts[*label] += 1;
                for (s, v) in sums[*label].iter_mut().zip(point) {
                    *s += v;
                }
            }

            let mut shift = 0.0;
            for (i, centroid) in centroids.iter_mut().enumerate() {
                // An empty cluster keeps its previous centroid.
                if counts[i] == 0 {
                    continue;
                }
                let mut updated = sums[i];
                for v in updated.iter_mut() {
                    *v /= counts[i] as f64;
                }
                shift += distance_sq(centroid, &updated);
                *centroid = updated;
            }
            if shift <= TOLERANCE {
                break;
            }
        }

        let mut inertia = 0.0;
        for (label, point) in labels.iter_mut().zip(points) {
            let (idx, dist) = nearest(point, &centroids);
            *label = idx;
            inertia += dist;
        }
        Clustering {
            labels,
            centroids,
            inertia,
        }
    }
}

/// k-means++ seeding: each next centroid is drawn with probability
/// proportional to its squared distance from the nearest chosen one.
fn plus_plus_init<const D: usize>(points: &[[f64; D]], k: usize, rng: &mut StdRng) -> Vec<[f64; D]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);

    while centroids.len() < k {
        let weights: Vec<f64> = points.iter().map(|p| nearest(p, &centroids).1).collect();
        let total: f64 = weights.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        } else {
            rng.gen_range(0..points.len())
        };
        centroids.push(points[next]);
    }
    centroids
}
