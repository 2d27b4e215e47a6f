use nalgebra::Vector3;
use tracing::trace_span;

const MAX_BINS_PER_AXIS: usize = 64;

/// Uniform Cartesian binning of a fixed point set for fixed-radius queries.
///
/// Bins are at least as wide as the build cutoff, so every neighbor of a query
/// point lies in the 27 bins around it.
pub(crate) struct CellList {
    origin: Vector3<f64>,
    width: f64,
    bins: [usize; 3],
    /// starts[b]..starts[b + 1] indexes `members` for bin `b`.
    starts: Vec<usize>,
    members: Vec<usize>,
}

impl CellList {
    pub fn build(points: &[Vector3<f64>], cutoff: f64) -> Self {
        let _span = trace_span!("CellList::build", n_points = points.len()).entered();
        if points.is_empty() {
            return Self {
                origin: Vector3::zeros(),
                width: 1.0,
                bins: [1, 1, 1],
                starts: vec![0, 0],
                members: Vec::new(),
            };
        }

        let (lo, hi) = points.iter().fold(
            (Vector3::repeat(f64::INFINITY), Vector3::repeat(f64::NEG_INFINITY)),
            |(lo, hi), p| (lo.inf(p), hi.sup(p)),
        );
        let extent = hi - lo;
        let width = cutoff
            .max(extent.max() / MAX_BINS_PER_AXIS as f64)
            .max(f64::MIN_POSITIVE);
        let bins = [0, 1, 2].map(|a| {
            ((extent[a] / width).floor() as usize + 1).clamp(1, MAX_BINS_PER_AXIS)
        });

        let mut list = Self {
            origin: lo,
            width,
            bins,
            starts: Vec::new(),
            members: Vec::new(),
        };

        let total = bins.iter().product::<usize>();
        let linear: Vec<usize> = points
            .iter()
            .map(|p| list.linear(list.bin_of(p)))
            .collect();

        let mut counts = vec![0usize; total];
        for &b in &linear {
            counts[b] += 1;
        }
        let mut starts = vec![0usize; total + 1];
        for b in 0..total {
            starts[b + 1] = starts[b] + counts[b];
        }

        let mut fill = starts.clone();
        let mut members = vec![0usize; points.len()];
        for (index, &b) in linear.iter().enumerate() {
            members[fill[b]] = index;
            fill[b] += 1;
        }

        list.starts = starts;
        list.members = members;
        list
    }

    #[inline]
    fn bin_of(&self, p: &Vector3<f64>) -> [usize; 3] {
        [0, 1, 2].map(|a| {
            let b = ((p[a] - self.origin[a]) / self.width).floor().max(0.0) as usize;
            b.min(self.bins[a] - 1)
        })
    }

    #[inline]
    fn linear(&self, b: [usize; 3]) -> usize {
        b[0] + self.bins[0] * (b[1] + self.bins[1] * b[2])
    }

    /// Calls `visit(index, distance)` for every point strictly closer than `cutoff` to `centre`.
    ///
    /// `points` must be the slice the list was built from, and `cutoff` must not
    /// exceed the build cutoff.
    pub fn query<F>(&self, points: &[Vector3<f64>], centre: &Vector3<f64>, cutoff: f64, mut visit: F)
    where
        F: FnMut(usize, f64),
    {
        let mut ranges = [(0usize, 0usize); 3];
        for (a, range) in ranges.iter_mut().enumerate() {
            let b = ((centre[a] - self.origin[a]) / self.width).floor() as i64;
            let lo = (b - 1).max(0);
            let hi = (b + 1).min(self.bins[a] as i64 - 1);
            if lo > hi {
                return;
            }
            *range = (lo as usize, hi as usize);
        }

        for bz in ranges[2].0..=ranges[2].1 {
            for by in ranges[1].0..=ranges[1].1 {
                for bx in ranges[0].0..=ranges[0].1 {
                    let b = self.linear([bx, by, bz]);
                    for &j in &self.members[self.starts[b]..self.starts[b + 1]] {
                        let d = (points[j] - centre).norm();
                        if d < cutoff {
                            visit(j, d);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_points(seed: u64, n: usize, span: f64) -> Vec<Vector3<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                Vector3::new(
                    rng.gen_range(-span..span),
                    rng.gen_range(-span..span),
                    rng.gen_range(0.0..span),
                )
            })
            .collect()
    }

    #[test]
    fn query_matches_brute_force() {
        let points = random_points(11, 400, 10.0);
        let cutoff = 1.7;
        let list = CellList::build(&points, cutoff);

        for centre in points.iter().step_by(7) {
            let mut found = Vec::new();
            list.query(&points, centre, cutoff, |j, _| found.push(j));
            found.sort_unstable();

            let expected: Vec<usize> = points
                .iter()
                .enumerate()
                .filter(|(_, p)| (*p - centre).norm() < cutoff)
                .map(|(j, _)| j)
                .collect();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn query_excludes_points_exactly_at_cutoff() {
        let points = vec![Vector3::zeros(), Vector3::new(2.0, 0.0, 0.0)];
        let list = CellList::build(&points, 2.0);
        let mut found = Vec::new();
        list.query(&points, &points[0], 2.0, |j, d| found.push((j, d)));
        assert_eq!(found, vec![(0, 0.0)]);
    }

    #[test]
    fn query_outside_the_grid_finds_nothing() {
        let points = random_points(5, 20, 1.0);
        let list = CellList::build(&points, 0.5);
        let mut hits = 0;
        list.query(&points, &Vector3::new(100.0, 0.0, 0.0), 0.5, |_, _| hits += 1);
        assert_eq!(hits, 0);
    }

    #[test]
    fn empty_point_set_is_queryable() {
        let list = CellList::build(&[], 1.0);
        let mut hits = 0;
        list.query(&[], &Vector3::zeros(), 1.0, |_, _| hits += 1);
        assert_eq!(hits, 0);
    }
}
