use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Sample indices of a train/validation/test partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified split: every class is shuffled with the seeded RNG and cut
/// proportionally, so each partition keeps the class balance of the whole.
pub fn stratified_split(
    labels: &[usize],
    val_fraction: f64,
    test_fraction: f64,
    seed: u64,
) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let classes = labels.iter().copied().max().map(|m| m + 1).unwrap_or(0);
    let mut split = Split::default();

    for class in 0..classes {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter_map(|(idx, &label)| (label == class).then_some(idx))
            .collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(&mut rng);

        let n = members.len();
        let n_test = portion(n, test_fraction);
        let n_val = portion(n - n_test, val_fraction / (1.0 - test_fraction).max(f64::EPSILON));
        split.test.extend_from_slice(&members[..n_test]);
        split.val.extend_from_slice(&members[n_test..n_test + n_val]);
        split.train.extend_from_slice(&members[n_test + n_val..]);
    }

    split.train.sort_unstable();
    split.val.sort_unstable();
    split.test.sort_unstable();
    split
}

// Never takes the last sample of a class away from training.
fn portion(n: usize, fraction: f64) -> usize {
    if n < 2 {
        return 0;
    }
    ((n as f64 * fraction).round() as usize).min(n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_every_index_once() {
        let labels: Vec<usize> = (0..200).map(|i| i % 4).collect();
        let split = stratified_split(&labels, 0.1, 0.1, 42);
        let mut all: Vec<usize> = split
            .train
            .iter()
            .chain(&split.val)
            .chain(&split.test)
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..200).collect::<Vec<_>>());
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.val.len(), 20);
    }

    #[test]
    fn keeps_class_proportions() {
        let labels: Vec<usize> = (0..100).map(|i| usize::from(i >= 80)).collect();
        let split = stratified_split(&labels, 0.0, 0.2, 1);
        let minority = split.test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(minority, 4);
        assert_eq!(split.test.len(), 20);
    }

    #[test]
    fn is_deterministic_for_a_seed() {
        let labels: Vec<usize> = (0..50).map(|i| i % 3).collect();
        assert_eq!(
            stratified_split(&labels, 0.2, 0.2, 9),
            stratified_split(&labels, 0.2, 0.2, 9)
        );
    }

    #[test]
    fn singleton_classes_stay_in_training() {
        let split = stratified_split(&[0, 1, 1, 1], 0.3, 0.3, 5);
        assert!(split.train.contains(&0));
    }
}
