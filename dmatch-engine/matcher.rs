use dmatch_core::{
    build_thread_pool, DescriptorData, DescriptorSet, Match, MatchSet, MatcherKind, MetricFamily,
    SelectionStrategy,
};
use log::{debug, info};
use rayon::prelude::*;
use std::time::Instant;

use crate::brute_force::{BruteForce, CandidateSearch};
use crate::config::MatcherConfig;
use crate::distance::{Euclidean, Hamming, Metric};
use crate::error::{ConfigError, MatchError, MatchResult};
use crate::kdtree::{ForestParams, KdForest};
use crate::types::{MatchReport, Neighbor};

/// Match every source descriptor against the reference set.
///
/// This is a pure function of its arguments: indices and any approximate
/// index live only for the duration of the call. All configuration and
/// input checks run before the first distance is computed.
///
/// # Errors
/// * [`MatchError::EmptyInput`] if either set has no rows.
/// * [`MatchError::Configuration`] for invalid options, descriptor families
///   that differ from each other or from `config.metric`, or unequal row lengths.
pub fn match_descriptors(
    source: &DescriptorSet,
    reference: &DescriptorSet,
    config: &MatcherConfig,
) -> MatchResult<MatchSet> {
    Ok(match_with_report(source, reference, config)?.matches)
}

/// Same as [`match_descriptors`], also returning k, query count and timing.
pub fn match_with_report(
    source: &DescriptorSet,
    reference: &DescriptorSet,
    config: &MatcherConfig,
) -> MatchResult<MatchReport> {
    config.validate()?;
    validate_inputs(source, reference, config.metric)?;

    let start = Instant::now();
    let run = || dispatch(source, reference, config);
    let matches = match config.threads {
        Some(n) => build_thread_pool(n)?.install(run)?,
        None => run()?,
    };

    let report = MatchReport {
        matches: MatchSet::new(matches),
        k: config.effective_k(),
        queried: source.len(),
        elapsed: start.elapsed(),
    };
    debug!(
        "{} matching ({}, cross_check={}) on {} workers with k={} n={} matches in {:.2} ms, discarded {:.1} %",
        config.matcher,
        config.selector,
        config.cross_check,
        config.worker_threads(),
        report.k,
        report.matches.len(),
        report.elapsed_ms(),
        report.discarded_fraction() * 100.0
    );
    Ok(report)
}

/// Fail-fast checks on the two descriptor sets.
pub fn validate_inputs(
    source: &DescriptorSet,
    reference: &DescriptorSet,
    metric: MetricFamily,
) -> MatchResult<()> {
    if source.is_empty() {
        return Err(MatchError::EmptyInput("source"));
    }
    if reference.is_empty() {
        return Err(MatchError::EmptyInput("reference"));
    }
    if source.family() != reference.family() {
        return Err(ConfigError::FamilyMismatch {
            source_family: source.family(),
            reference: reference.family(),
        }
        .into());
    }
    if source.family() != metric {
        return Err(ConfigError::MetricMismatch {
            configured: metric,
            actual: source.family(),
        }
        .into());
    }
    if source.row_len() != reference.row_len() {
        return Err(ConfigError::RowLengthMismatch {
            source_len: source.row_len(),
            reference: reference.row_len(),
        }
        .into());
    }
    Ok(())
}

fn dispatch(
    source: &DescriptorSet,
    reference: &DescriptorSet,
    config: &MatcherConfig,
) -> MatchResult<Vec<Match>> {
    let row_len = source.row_len();
    match config.matcher {
        MatcherKind::BruteForce => match (source.data(), reference.data()) {
            (DescriptorData::Binary(s), DescriptorData::Binary(r)) => {
                Ok(select(s.as_slice(), r.as_slice(), row_len, config, BruteForce::<Hamming>::new))
            }
            (DescriptorData::Continuous(s), DescriptorData::Continuous(r)) => {
                Ok(select(s.as_slice(), r.as_slice(), row_len, config, BruteForce::<Euclidean>::new))
            }
            _ => Err(ConfigError::FamilyMismatch {
                source_family: source.family(),
                reference: reference.family(),
            }
            .into()),
        },
        MatcherKind::ApproximateIndex => {
            if source.family() == MetricFamily::Binary {
                info!(
                    "approximate index works on continuous vectors; widening {} source and {} reference binary descriptors ({} bytes each) to f32, distances are L2 over byte values",
                    source.len(),
                    reference.len(),
                    row_len
                );
            }
            let s = source.widened_values();
            let r = reference.widened_values();
            let params = ForestParams::from(config.index);
            Ok(select(&s[..], &r[..], row_len, config, |data, len| {
                KdForest::build(data, len, params)
            }))
        }
    }
}

/// Run the configured selection strategy with the reference searcher produced by `build`.
///
/// The mutual nearest neighbour check always queries the source set
/// exhaustively, whatever searcher answers the forward queries, so a kept
/// pair `(i, j)` has `i` as the exact nearest source of reference `j`.
fn select<'a, T, S, F>(
    source: &'a [T],
    reference: &'a [T],
    row_len: usize,
    config: &MatcherConfig,
    build: F,
) -> Vec<Match>
where
    T: Sync,
    S: CandidateSearch<T>,
    F: Fn(&'a [T], usize) -> S,
{
    let k = config.effective_k();
    let forward = build(reference, row_len);
    let n = source.len() / row_len;

    let matches = per_source(n, config.parallel, |i| {
        let candidates = forward.knn(row(source, row_len, i), k);
        pick::<S::Kernel>(i, &candidates, config)
    });

    if config.selector != SelectionStrategy::SingleNearest || !config.cross_check {
        return matches;
    }

    let reverse = BruteForce::<S::Kernel>::new(source, row_len);
    let is_mutual = |m: &Match| {
        reverse
            .knn(row(reference, row_len, m.reference_idx), 1)
            .first()
            .is_some_and(|back| back.index == m.source_idx)
    };
    if config.parallel {
        matches.into_par_iter().filter(is_mutual).collect()
    } else {
        matches.into_iter().filter(is_mutual).collect()
    }
}

/// Apply `f` to every source index; results stay in ascending index order.
fn per_source<R, F>(n: usize, parallel: bool, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(usize) -> Option<R> + Sync + Send,
{
    if parallel {
        (0..n).into_par_iter().filter_map(f).collect()
    } else {
        (0..n).filter_map(f).collect()
    }
}

fn pick<M: Metric>(
    source_idx: usize,
    candidates: &[Neighbor<M::Dist>],
    config: &MatcherConfig,
) -> Option<Match> {
    let to_match = |n: &Neighbor<M::Dist>| Match {
        source_idx,
        reference_idx: n.index,
        distance: M::wrap(n.distance),
    };
    match config.selector {
        SelectionStrategy::SingleNearest => candidates.first().map(to_match),
        SelectionStrategy::KNearestRatio if config.effective_k() == 1 => {
            candidates.first().map(to_match)
        }
        SelectionStrategy::KNearestRatio => match candidates {
            [best, second, ..] if M::ratio(best.distance, second.distance) < config.ratio => {
                Some(to_match(best))
            }
            // Ambiguous, or fewer than two candidates to compare
            _ => None,
        },
    }
}

#[inline]
fn row<T>(data: &[T], row_len: usize, idx: usize) -> &[T] {
    &data[idx * row_len..(idx + 1) * row_len]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MatcherBuilder;
    use dmatch_core::Distance;
    use proptest::prelude::*;

    fn binary(rows: &[&[u8]]) -> DescriptorSet {
        DescriptorSet::binary_from_rows(rows).unwrap()
    }

    fn continuous(rows: &[&[f32]]) -> DescriptorSet {
        DescriptorSet::continuous_from_rows(rows).unwrap()
    }

    fn config(metric: MetricFamily) -> MatcherConfig {
        MatcherConfig::new(metric)
    }

    fn knn_config(metric: MetricFamily) -> MatcherConfig {
        MatcherBuilder::new(metric)
            .selector(SelectionStrategy::KNearestRatio)
            .to_config()
    }

    fn pairs(set: &MatchSet) -> Vec<(usize, usize)> {
        set.iter().map(|m| (m.source_idx, m.reference_idx)).collect()
    }

    #[test]
    fn test_hand_computed_hamming_matrix() {
        // Hamming distances (rows: source, cols: reference)
        //        r0  r1  r2
        //   s0 [  1,  8,  3 ]
        //   s1 [  4,  3,  6 ]
        //   s2 [  4,  5,  0 ]
        let source = binary(&[&[0b0000_0001], &[0b0111_1000], &[0b0000_1111]]);
        let reference = binary(&[&[0b0000_0000], &[0b1111_1110], &[0b0000_1111]]);

        let result = match_descriptors(&source, &reference, &config(MetricFamily::Binary)).unwrap();
        assert_eq!(
            result.into_vec(),
            vec![
                Match { source_idx: 0, reference_idx: 0, distance: Distance::Hamming(1) },
                Match { source_idx: 1, reference_idx: 1, distance: Distance::Hamming(3) },
                Match { source_idx: 2, reference_idx: 2, distance: Distance::Hamming(0) },
            ]
        );
    }

    #[test]
    fn test_ties_prefer_lowest_reference_index() {
        let source = binary(&[&[0b0000_0011]]);
        let reference = binary(&[&[0b0000_0111], &[0b0000_0001], &[0b0000_0010]]);
        let result = match_descriptors(&source, &reference, &config(MetricFamily::Binary)).unwrap();
        assert_eq!(pairs(&result), vec![(0, 0)]);
    }

    #[test]
    fn test_ratio_test_boundaries() {
        // d0 = 4, d1 = 6 → 0.667 < 0.8 kept; d0 = 5, d1 = 6 → 0.833 dropped
        let source = continuous(&[&[0.0, 0.0], &[100.0, 0.0]]);
        let reference = continuous(&[&[4.0, 0.0], &[0.0, 6.0], &[105.0, 0.0], &[100.0, 6.0]]);
        let result = match_descriptors(&source, &reference, &knn_config(MetricFamily::Continuous)).unwrap();
        assert_eq!(pairs(&result), vec![(0, 0)]);
        assert_eq!(result.as_slice()[0].distance, Distance::Euclidean(4.0));
    }

    #[test]
    fn test_ratio_zero_distances_rejected() {
        // Two exact duplicates in the reference: 0 / 0 is ambiguous
        let source = binary(&[&[7]]);
        let reference = binary(&[&[7], &[7]]);
        let result = match_descriptors(&source, &reference, &knn_config(MetricFamily::Binary)).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_knn_with_single_reference_drops_everything() {
        let source = binary(&[&[1], &[2], &[3]]);
        let reference = binary(&[&[1]]);
        let report = match_with_report(&source, &reference, &knn_config(MetricFamily::Binary)).unwrap();
        assert!(report.matches.is_empty());
        assert_eq!(report.queried, 3);
        assert_eq!(report.discarded_fraction(), 1.0);
    }

    #[test]
    fn test_knn_cross_check_keeps_one_per_source() {
        let source = binary(&[&[1], &[2], &[3], &[200]]);
        let reference = binary(&[&[1], &[1]]);
        let cfg = MatcherBuilder::new(MetricFamily::Binary)
            .selector(SelectionStrategy::KNearestRatio)
            .cross_check(true)
            .to_config();
        let report = match_with_report(&source, &reference, &cfg).unwrap();
        assert_eq!(report.k, 1);
        assert_eq!(pairs(&report.matches), vec![(0, 0), (1, 0), (2, 0), (3, 0)]);
    }

    #[test]
    fn test_cross_check_requires_mutual_nearest() {
        // s0 and s1 both prefer r0, but r0 prefers s1
        let source = continuous(&[&[0.0], &[9.0], &[50.0]]);
        let reference = continuous(&[&[10.0], &[49.0]]);

        let plain = match_descriptors(&source, &reference, &config(MetricFamily::Continuous)).unwrap();
        assert_eq!(pairs(&plain), vec![(0, 0), (1, 0), (2, 1)]);

        let cfg = MatcherConfig::exact_preset(MetricFamily::Continuous);
        let mutual = match_descriptors(&source, &reference, &cfg).unwrap();
        assert_eq!(pairs(&mutual), vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn test_empty_inputs() {
        let full = binary(&[&[1]]);
        let empty = DescriptorSet::empty(MetricFamily::Binary);
        let cfg = config(MetricFamily::Binary);
        assert!(matches!(
            match_descriptors(&empty, &full, &cfg),
            Err(MatchError::EmptyInput("source"))
        ));
        assert!(matches!(
            match_descriptors(&full, &empty, &cfg),
            Err(MatchError::EmptyInput("reference"))
        ));
    }

    #[test]
    fn test_family_mismatch() {
        let b = binary(&[&[1, 2]]);
        let c = continuous(&[&[1.0, 2.0]]);
        let result = match_descriptors(&b, &c, &config(MetricFamily::Binary));
        assert!(matches!(
            result,
            Err(MatchError::Configuration(ConfigError::FamilyMismatch { .. }))
        ));
    }

    #[test]
    fn test_metric_mismatch() {
        let b = binary(&[&[1, 2]]);
        let result = match_descriptors(&b, &b, &config(MetricFamily::Continuous));
        assert!(matches!(
            result,
            Err(MatchError::Configuration(ConfigError::MetricMismatch { .. }))
        ));
    }

    #[test]
    fn test_row_length_mismatch() {
        let a = binary(&[&[1, 2]]);
        let b = binary(&[&[1, 2, 3]]);
        let result = match_descriptors(&a, &b, &config(MetricFamily::Binary));
        assert!(matches!(
            result,
            Err(MatchError::Configuration(ConfigError::RowLengthMismatch { source_len: 2, reference: 3 }))
        ));
    }

    #[test]
    fn test_invalid_config_rejected_before_matching() {
        let a = binary(&[&[1]]);
        let mut cfg = config(MetricFamily::Binary);
        cfg.ratio = 0.0;
        assert!(matches!(
            match_descriptors(&a, &a, &cfg),
            Err(MatchError::Configuration(ConfigError::InvalidRatio(_)))
        ));
    }

    #[test]
    fn test_approximate_widens_binary_descriptors() {
        let source = binary(&[&[10, 10], &[200, 200]]);
        let reference = binary(&[&[200, 201], &[10, 12], &[120, 120]]);
        let cfg = MatcherBuilder::new(MetricFamily::Binary)
            .matcher(MatcherKind::ApproximateIndex)
            .to_config();
        let result = match_descriptors(&source, &reference, &cfg).unwrap();
        assert_eq!(pairs(&result), vec![(0, 1), (1, 0)]);
        // L2 over widened byte values, not Hamming
        assert_eq!(result.as_slice()[0].distance, Distance::Euclidean(2.0));
        assert_eq!(result.as_slice()[1].distance, Distance::Euclidean(1.0));
    }

    #[test]
    fn test_approximate_cross_check() {
        let source = continuous(&[&[0.0], &[9.0], &[50.0]]);
        let reference = continuous(&[&[10.0], &[49.0]]);
        let cfg = MatcherBuilder::new(MetricFamily::Continuous)
            .matcher(MatcherKind::ApproximateIndex)
            .cross_check(true)
            .to_config();
        let result = match_descriptors(&source, &reference, &cfg).unwrap();
        assert_eq!(pairs(&result), vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn test_dedicated_thread_pool() {
        let source = binary(&[&[1], &[2], &[3]]);
        let reference = binary(&[&[3], &[2], &[1]]);
        let cfg = MatcherBuilder::new(MetricFamily::Binary).threads(2).to_config();
        let result = match_descriptors(&source, &reference, &cfg).unwrap();
        assert_eq!(pairs(&result), vec![(0, 2), (1, 1), (2, 0)]);
    }

    fn random_rows(rng: &mut rand::rngs::StdRng, n: usize, dim: usize) -> Vec<Vec<f32>> {
        use rand::Rng;
        (0..n).map(|_| (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect()).collect()
    }

    /// Index of the exact nearest row to `query`, lowest index on ties.
    fn nearest_row(rows: &[Vec<f32>], query: &[f32]) -> usize {
        let mut best = 0;
        let mut best_d = f32::INFINITY;
        for (i, r) in rows.iter().enumerate() {
            let d = crate::distance::l2_distance(r, query);
            if d < best_d {
                best = i;
                best_d = d;
            }
        }
        best
    }

    fn approximate_cross_check() -> MatcherConfig {
        MatcherBuilder::new(MetricFamily::Continuous)
            .matcher(MatcherKind::ApproximateIndex)
            .cross_check(true)
            .to_config()
    }

    #[test]
    fn test_approximate_cross_check_is_exactly_mutual() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let src = random_rows(&mut rng, 600, 32);
        let refs = random_rows(&mut rng, 600, 32);
        let source = DescriptorSet::continuous_from_rows(&src).unwrap();
        let reference = DescriptorSet::continuous_from_rows(&refs).unwrap();

        let result = match_descriptors(&source, &reference, &approximate_cross_check()).unwrap();
        assert!(!result.is_empty());
        let violations = result
            .iter()
            .filter(|m| nearest_row(&src, &refs[m.reference_idx]) != m.source_idx)
            .count();
        assert_eq!(violations, 0);
    }

    fn binary_rows(max_rows: usize) -> impl Strategy<Value = Vec<[u8; 4]>> {
        prop::collection::vec(any::<[u8; 4]>(), 1..max_rows)
    }

    fn set_of(rows: &[[u8; 4]]) -> DescriptorSet {
        DescriptorSet::binary_from_rows(rows).unwrap()
    }

    fn hamming_of(a: &[u8; 4], b: &[u8; 4]) -> u32 {
        crate::distance::hamming_distance(a, b)
    }

    proptest! {
        #[test]
        fn prop_source_indices_strictly_ascending(src in binary_rows(40), refs in binary_rows(40), knn in any::<bool>()) {
            let mut cfg = config(MetricFamily::Binary);
            if knn {
                cfg.selector = SelectionStrategy::KNearestRatio;
            }
            let result = match_descriptors(&set_of(&src), &set_of(&refs), &cfg).unwrap();
            for w in result.as_slice().windows(2) {
                prop_assert!(w[0].source_idx < w[1].source_idx);
            }
            for m in &result {
                prop_assert!(m.source_idx < src.len());
                prop_assert!(m.reference_idx < refs.len());
            }
        }

        #[test]
        fn prop_nearest_is_row_minimum(src in binary_rows(30), refs in binary_rows(30)) {
            let result = match_descriptors(&set_of(&src), &set_of(&refs), &config(MetricFamily::Binary)).unwrap();
            prop_assert_eq!(result.len(), src.len());
            for m in &result {
                let d = hamming_of(&src[m.source_idx], &refs[m.reference_idx]);
                prop_assert_eq!(m.distance, Distance::Hamming(d));
                for (j, r) in refs.iter().enumerate() {
                    let other = hamming_of(&src[m.source_idx], r);
                    prop_assert!(d < other || (d == other && m.reference_idx <= j));
                }
            }
        }

        #[test]
        fn prop_cross_check_is_mutual(src in binary_rows(30), refs in binary_rows(30)) {
            let cfg = MatcherConfig::exact_preset(MetricFamily::Binary);
            let result = match_descriptors(&set_of(&src), &set_of(&refs), &cfg).unwrap();
            for m in &result {
                let d = hamming_of(&src[m.source_idx], &refs[m.reference_idx]);
                for (i, s) in src.iter().enumerate() {
                    let other = hamming_of(s, &refs[m.reference_idx]);
                    prop_assert!(d < other || (d == other && m.source_idx <= i));
                }
            }
        }

        #[test]
        fn prop_ratio_test_exact(src in binary_rows(30), refs in binary_rows(30)) {
            let result = match_descriptors(&set_of(&src), &set_of(&refs), &knn_config(MetricFamily::Binary)).unwrap();
            for (i, s) in src.iter().enumerate() {
                let mut ds: Vec<u32> = refs.iter().map(|r| hamming_of(s, r)).collect();
                ds.sort_unstable();
                let expected = ds.len() >= 2 && (ds[0] as f32 / ds[1] as f32) < 0.8;
                prop_assert_eq!(result.for_source(i).is_some(), expected);
            }
        }

        #[test]
        fn prop_knn_cross_check_one_per_source(src in binary_rows(30), refs in binary_rows(30)) {
            let cfg = MatcherBuilder::new(MetricFamily::Binary)
                .selector(SelectionStrategy::KNearestRatio)
                .cross_check(true)
                .to_config();
            let result = match_descriptors(&set_of(&src), &set_of(&refs), &cfg).unwrap();
            let plain = match_descriptors(&set_of(&src), &set_of(&refs), &config(MetricFamily::Binary)).unwrap();
            prop_assert_eq!(result, plain);
        }

        #[test]
        fn prop_parallel_matches_sequential(src in binary_rows(60), refs in binary_rows(60), knn in any::<bool>(), cross in any::<bool>()) {
            let mut cfg = config(MetricFamily::Binary);
            cfg.cross_check = cross;
            if knn {
                cfg.selector = SelectionStrategy::KNearestRatio;
            }
            let mut seq = cfg.clone();
            seq.parallel = false;
            let a = match_descriptors(&set_of(&src), &set_of(&refs), &cfg).unwrap();
            let b = match_descriptors(&set_of(&src), &set_of(&refs), &seq).unwrap();
            let c = match_descriptors(&set_of(&src), &set_of(&refs), &cfg).unwrap();
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(&a, &c);
        }

        #[test]
        fn prop_approximate_is_deterministic(rows in prop::collection::vec(prop::collection::vec(0.0f32..100.0, 6), 2..50)) {
            let set = DescriptorSet::continuous_from_rows(&rows).unwrap();
            let cfg = MatcherConfig::approximate_preset(MetricFamily::Continuous);
            let a = match_descriptors(&set, &set, &cfg).unwrap();
            let b = match_descriptors(&set, &set, &cfg).unwrap();
            prop_assert_eq!(a, b);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_approximate_cross_check_is_mutual(seed in any::<u64>(), n in 200usize..400, dim in 4usize..24) {
            use rand::SeedableRng;
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            let src = random_rows(&mut rng, n, dim);
            let refs = random_rows(&mut rng, n, dim);
            let source = DescriptorSet::continuous_from_rows(&src).unwrap();
            let reference = DescriptorSet::continuous_from_rows(&refs).unwrap();

            let result = match_descriptors(&source, &reference, &approximate_cross_check()).unwrap();
            for m in &result {
                prop_assert_eq!(nearest_row(&src, &refs[m.reference_idx]), m.source_idx);
            }
        }
    }
}
