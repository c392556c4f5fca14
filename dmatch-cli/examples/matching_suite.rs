use dmatch_cli::{MatchSession, run_suite};
use dmatch_engine::{CoreError, DescriptorSet, Keypoint, MatcherBuilder, MatcherConfig, MetricFamily};
use dmatch_store::FeatureDump;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Synthetic ORB-style image pair: every reference descriptor is a source
/// descriptor with a few flipped bits, shuffled, plus unrelated distractors.
fn synthetic_pair(n: usize, distractors: usize, seed: u64) -> Result<(FeatureDump, FeatureDump, Vec<usize>), CoreError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let source: Vec<[u8; 32]> = (0..n).map(|_| rng.r#gen()).collect();

    let mut order: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        order.swap(i, rng.gen_range(0..=i));
    }
    let mut reference: Vec<[u8; 32]> = order
        .iter()
        .map(|&i| {
            let mut row = source[i];
            for _ in 0..rng.gen_range(0..12) {
                let bit = rng.gen_range(0..256);
                row[bit / 8] ^= 1 << (bit % 8);
            }
            row
        })
        .collect();
    reference.extend((0..distractors).map(|_| rng.r#gen::<[u8; 32]>()));

    // truth[i] = reference row holding the noisy copy of source row i
    let mut truth = vec![0; n];
    for (j, &i) in order.iter().enumerate() {
        truth[i] = j;
    }

    let kps = |count: usize, rng: &mut StdRng| {
        (0..count)
            .map(|_| Keypoint::new(rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)))
            .collect::<Vec<_>>()
    };
    let src_kps = kps(source.len(), &mut rng);
    let ref_kps = kps(reference.len(), &mut rng);

    Ok((
        FeatureDump::new(src_kps, DescriptorSet::binary_from_rows(&source)?),
        FeatureDump::new(ref_kps, DescriptorSet::binary_from_rows(&reference)?),
        truth,
    ))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Descriptor Matching Suite");
    println!("=========================\n");

    let (source, reference, truth) = synthetic_pair(2000, 500, 7)?;
    println!(
        "Source: {} descriptors, reference: {} descriptors\n",
        source.len(),
        reference.len()
    );

    // Demo 1: one configured session
    let session = MatchSession::from_builder(MatcherBuilder::new(MetricFamily::Binary).preset_ratio_test())?;
    let report = session.match_dumps(&source, &reference)?;
    let correct = report
        .matches
        .iter()
        .filter(|m| truth[m.source_idx] == m.reference_idx)
        .count();
    println!("{}", session.config().summary());
    println!(
        "  {} matches, {} correct, {:.1} % discarded, {:.2} ms\n",
        report.matches.len(),
        correct,
        report.discarded_fraction() * 100.0,
        report.elapsed_ms()
    );

    // Demo 2: sweep every combination
    for run in run_suite(&source, &reference, &MatcherConfig::new(MetricFamily::Binary)) {
        match &run.outcome {
            Ok(report) => {
                let correct = report
                    .matches
                    .iter()
                    .filter(|m| truth[m.source_idx] == m.reference_idx)
                    .count();
                println!(
                    "  {:<40} {:>5} matches {:>5} correct {:>8.2} ms",
                    run.label(),
                    report.matches.len(),
                    correct,
                    report.elapsed_ms()
                );
            }
            Err(e) => println!("  {:<40} failed: {}", run.label(), e),
        }
    }

    Ok(())
}
