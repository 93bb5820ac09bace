//! Stratified train/test partitioning.
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{PipelineError, Result};

/// Disjoint, exhaustive row index sets. Both lists are sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partition row indices so that each side keeps the label ratio of the
/// full data.
///
/// The test side receives `ceil(n * test_fraction)` rows, shared out between
/// the classes by largest remainder. Each class is shuffled with its own
/// stream derived from `seed`.
pub fn stratified_split(labels: &[u8], test_fraction: f64, seed: u64) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::Config(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &label) in labels.iter().enumerate() {
        match label {
            0 | 1 => by_class[label as usize].push(i),
            other => {
                return Err(PipelineError::InputSchema(format!(
                    "label {} at row {} is not binary",
                    other,
                    i + 1
                )))
            }
        }
    }
    for (label, members) in by_class.iter().enumerate() {
        if members.len() < 2 {
            return Err(PipelineError::InsufficientSamples {
                label: label as u8,
                count: members.len(),
                required: 2,
            });
        }
    }

    let n = labels.len();
    let n_test = ((n as f64) * test_fraction - 1e-9).ceil() as usize;
    let quotas = apportion(n_test, [by_class[0].len(), by_class[1].len()]);

    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (label, (members, quota)) in by_class.iter_mut().zip(quotas).enumerate() {
        let count = members.len();
        if quota == 0 || quota == count {
            let required = if quota == 0 {
                (1.0 / test_fraction).ceil() as usize
            } else {
                (1.0 / (1.0 - test_fraction)).ceil() as usize
            };
            return Err(PipelineError::InsufficientSamples {
                label: label as u8,
                count,
                required: required.max(count + 1),
            });
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(label as u64));
        members.shuffle(&mut rng);
        test.extend_from_slice(&members[..quota]);
        train.extend_from_slice(&members[quota..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    log::debug!(
        "Stratified split: {} train / {} test rows (seed {})",
        train.len(),
        test.len(),
        seed
    );
    Ok(Split { train, test })
}

/// Largest remainder apportionment of `total` over the class sizes.
fn apportion(total: usize, sizes: [usize; 2]) -> [usize; 2] {
    let n: usize = sizes.iter().sum();
    let mut quotas = [0usize; 2];
    let mut remainders = [0usize; 2];
    for c in 0..2 {
        let exact = total * sizes[c];
        quotas[c] = exact / n;
        remainders[c] = exact % n;
    }
    let mut left = total - quotas.iter().sum::<usize>();
    let mut order = [0usize, 1];
    // Larger remainder first; the lower label wins a tie.
    order.sort_by(|&a, &b| remainders[b].cmp(&remainders[a]).then(a.cmp(&b)));
    for &c in order.iter() {
        if left == 0 {
            break;
        }
        quotas[c] += 1;
        left -= 1;
    }
    quotas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize, every: usize) -> Vec<u8> {
        (0..n).map(|i| u8::from(i % every == 0)).collect()
    }

    fn positive_rate(labels: &[u8], idx: &[usize]) -> f64 {
        idx.iter().filter(|&&i| labels[i] == 1).count() as f64 / idx.len() as f64
    }

    #[test]
    fn split_is_disjoint_exhaustive_and_sized() {
        let y = labels(1000, 7);
        let split = stratified_split(&y, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 200);
        assert_eq!(split.train.len(), 800);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn split_preserves_label_ratio() {
        let y = labels(1000, 9);
        let full = y.iter().filter(|&&v| v == 1).count() as f64 / y.len() as f64;
        let split = stratified_split(&y, 0.2, 7).unwrap();
        assert!((positive_rate(&y, &split.train) - full).abs() < 0.01);
        assert!((positive_rate(&y, &split.test) - full).abs() < 0.01);
    }

    #[test]
    fn split_is_deterministic_by_seed() {
        let y = labels(300, 4);
        let a = stratified_split(&y, 0.2, 11).unwrap();
        let b = stratified_split(&y, 0.2, 11).unwrap();
        let c = stratified_split(&y, 0.2, 12).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.test, c.test);
    }

    #[test]
    fn single_member_class_is_rejected() {
        let mut y = vec![0u8; 50];
        y[3] = 1;
        match stratified_split(&y, 0.2, 1) {
            Err(PipelineError::InsufficientSamples { label, count, .. }) => {
                assert_eq!(label, 1);
                assert_eq!(count, 1);
            }
            other => panic!("expected InsufficientSamples, got {:?}", other),
        }
    }

    #[test]
    fn class_without_test_rows_is_rejected() {
        let mut y = vec![0u8; 100];
        y[0] = 1;
        y[1] = 1;
        assert!(matches!(
            stratified_split(&y, 0.1, 1),
            Err(PipelineError::InsufficientSamples { label: 1, .. })
        ));
    }

    #[test]
    fn apportion_uses_largest_remainder() {
        assert_eq!(apportion(3, [5, 5]), [2, 1]);
        assert_eq!(apportion(200, [857, 143]), [171, 29]);
    }
}
