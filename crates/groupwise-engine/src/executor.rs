//! Bulk data-parallel primitives the groupers and kernels are written against.
//!
//! Every primitive runs to completion before it returns. The serial and parallel backends
//! produce identical results; only the scheduling differs.

use std::cmp::Ordering;
use std::ops::Range;

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use rayon::prelude::*;

/// Inputs shorter than this run serially even in parallel mode.
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
const PARALLEL_THRESHOLD: usize = 1 << 12;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    Serial,
    /// Use the crate-local rayon pool when the `parallel` feature is enabled and a pool could be
    /// started; serial otherwise.
    #[default]
    Parallel,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Executor {
    mode: ExecutionMode,
}

impl Executor {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    pub fn serial() -> Self {
        Self::new(ExecutionMode::Serial)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
    fn pool(&self, len: usize) -> Option<&'static rayon::ThreadPool> {
        if self.mode == ExecutionMode::Serial || len < PARALLEL_THRESHOLD {
            return None;
        }
        crate::parallel::rayon_pool()
    }

    /// `out[i] = f(i)` for `i` in `0..len`.
    pub fn tabulate<T, F>(&self, len: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
        if let Some(pool) = self.pool(len) {
            return pool.install(|| (0..len).into_par_iter().map(&f).collect());
        }
        (0..len).map(f).collect()
    }

    /// `out[i] = src[indices[i]]`.
    pub fn gather<T>(&self, src: &[T], indices: &[u32]) -> Vec<T>
    where
        T: Copy + Send + Sync,
    {
        self.tabulate(indices.len(), |i| src[indices[i] as usize])
    }

    /// `out[indices[i]] = src[i]`. Indices are expected to be distinct.
    pub fn scatter<T: Copy>(&self, src: &[T], indices: &[u32], out: &mut [T]) {
        debug_assert_eq!(src.len(), indices.len());
        for (value, &idx) in src.iter().zip(indices) {
            out[idx as usize] = *value;
        }
    }

    /// Running sum including the current element. Wraps on overflow.
    pub fn inclusive_scan(&self, input: &[u32]) -> Vec<u32> {
        #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
        if let Some(pool) = self.pool(input.len()) {
            return pool.install(|| par_inclusive_scan(input, pool.current_num_threads()));
        }
        let mut acc = 0u32;
        input
            .iter()
            .map(|&v| {
                acc = acc.wrapping_add(v);
                acc
            })
            .collect()
    }

    /// Offsets form of a prefix sum: `out[0] = 0`, `out[i + 1] = out[i] + input[i]`, so the
    /// result has `input.len() + 1` entries.
    pub fn exclusive_scan(&self, input: &[u32]) -> Vec<u32> {
        let mut out = Vec::with_capacity(input.len() + 1);
        out.push(0);
        out.extend(self.inclusive_scan(input));
        out
    }

    /// Stable sort of row indices under `cmp`.
    pub fn stable_sort_by<F>(&self, indices: &mut [u32], cmp: F)
    where
        F: Fn(&u32, &u32) -> Ordering + Sync,
    {
        #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
        if let Some(pool) = self.pool(indices.len()) {
            pool.install(|| indices.par_sort_by(&cmp));
            return;
        }
        indices.sort_by(cmp);
    }

    /// Number of occurrences of each id in `0..num_ids`; ids outside that range are skipped.
    pub fn histogram(&self, ids: &[u32], num_ids: usize) -> Vec<u32> {
        let count = |mut counts: Vec<u32>, chunk: &[u32]| {
            for &id in chunk {
                if let Some(slot) = counts.get_mut(id as usize) {
                    *slot += 1;
                }
            }
            counts
        };

        #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
        if let Some(pool) = self.pool(ids.len()) {
            let chunk = chunk_len(ids.len(), pool.current_num_threads());
            return pool.install(|| {
                ids.par_chunks(chunk)
                    .fold(|| vec![0u32; num_ids], |acc, c| count(acc, c))
                    .reduce(
                        || vec![0u32; num_ids],
                        |mut a, b| {
                            for (x, y) in a.iter_mut().zip(b) {
                                *x += y;
                            }
                            a
                        },
                    )
            });
        }
        count(vec![0u32; num_ids], ids)
    }

    /// Reduce-by-key over contiguous segments: `out[s] = f(s, offsets[s]..offsets[s + 1])`.
    pub fn reduce_segments<R, F>(&self, offsets: &[u32], f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize, Range<usize>) -> R + Sync + Send,
    {
        let segments = offsets.len().saturating_sub(1);
        self.tabulate(segments, |s| {
            f(s, offsets[s] as usize..offsets[s + 1] as usize)
        })
    }
}

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn chunk_len(len: usize, threads: usize) -> usize {
    len.div_ceil(threads.max(1) * 4).max(1024)
}

/// Three-phase scan: per-chunk totals, a serial scan over the totals, then each chunk re-scanned
/// from its carry-in.
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn par_inclusive_scan(input: &[u32], threads: usize) -> Vec<u32> {
    let chunk = chunk_len(input.len(), threads);
    let totals: Vec<u32> = input
        .par_chunks(chunk)
        .map(|c| c.iter().fold(0u32, |acc, &v| acc.wrapping_add(v)))
        .collect();

    let mut carry = 0u32;
    let carries: Vec<u32> = totals
        .iter()
        .map(|&t| {
            let start = carry;
            carry = carry.wrapping_add(t);
            start
        })
        .collect();

    let mut out = vec![0u32; input.len()];
    out.par_chunks_mut(chunk)
        .zip(input.par_chunks(chunk))
        .zip(carries.par_iter())
        .for_each(|((dst, src), &start)| {
            let mut acc = start;
            for (d, &s) in dst.iter_mut().zip(src) {
                acc = acc.wrapping_add(s);
                *d = acc;
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both() -> [Executor; 2] {
        [Executor::serial(), Executor::new(ExecutionMode::Parallel)]
    }

    #[test]
    fn scans_agree_across_modes() {
        let input: Vec<u32> = (0..50_000u32).map(|i| i % 7).collect();
        let expected: Vec<u32> = input
            .iter()
            .scan(0u32, |acc, &v| {
                *acc += v;
                Some(*acc)
            })
            .collect();
        for exec in both() {
            assert_eq!(exec.inclusive_scan(&input), expected);
            let offsets = exec.exclusive_scan(&input);
            assert_eq!(offsets.len(), input.len() + 1);
            assert_eq!(offsets[0], 0);
            assert_eq!(&offsets[1..], &expected[..]);
        }
    }

    #[test]
    fn empty_inputs() {
        for exec in both() {
            assert!(exec.inclusive_scan(&[]).is_empty());
            assert_eq!(exec.exclusive_scan(&[]), vec![0]);
            assert!(exec.reduce_segments(&[0], |_, r| r.len()).is_empty());
            assert!(exec.reduce_segments(&[], |_, r| r.len()).is_empty());
            assert_eq!(exec.histogram(&[], 3), vec![0, 0, 0]);
        }
    }

    #[test]
    fn stable_sort_keeps_ties_in_input_order() {
        let keys: Vec<u32> = (0..20_000u32).map(|i| (i * 7919) % 13).collect();
        for exec in both() {
            let mut idx: Vec<u32> = (0..keys.len() as u32).collect();
            exec.stable_sort_by(&mut idx, |&a, &b| keys[a as usize].cmp(&keys[b as usize]));
            for w in idx.windows(2) {
                let (a, b) = (w[0] as usize, w[1] as usize);
                assert!(keys[a] < keys[b] || (keys[a] == keys[b] && a < b));
            }
        }
    }

    #[test]
    fn histogram_skips_out_of_range_ids() {
        let ids: Vec<u32> = (0..10_000u32)
            .map(|i| if i % 10 == 0 { u32::MAX } else { i % 3 })
            .collect();
        let expected = Executor::serial().histogram(&ids, 3);
        assert_eq!(expected.iter().sum::<u32>(), 9_000);
        assert_eq!(Executor::new(ExecutionMode::Parallel).histogram(&ids, 3), expected);
    }

    #[test]
    fn gather_scatter_round_trip_a_permutation() {
        let src: Vec<u32> = (100..110).collect();
        let perm: Vec<u32> = vec![3, 0, 9, 1, 8, 2, 7, 4, 6, 5];
        for exec in both() {
            let gathered = exec.gather(&src, &perm);
            let mut back = vec![0u32; src.len()];
            exec.scatter(&gathered, &perm, &mut back);
            assert_eq!(back, src);
        }
    }
}
