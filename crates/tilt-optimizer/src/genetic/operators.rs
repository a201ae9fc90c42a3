//! Variation operators on normalized tilt vectors

use crate::config::SearchMode;
use rand::Rng;

/// Uniform crossover
///
/// With probability `crossover_rate` every gene is swapped between the two
/// children with probability one half; otherwise the children are copies of
/// their parents.
pub fn uniform_crossover<R: Rng + ?Sized>(
    rng: &mut R,
    first: &[f64],
    second: &[f64],
    crossover_rate: f64,
) -> (Vec<f64>, Vec<f64>) {
    let mut left = first.to_vec();
    let mut right = second.to_vec();

    if rng.gen_bool(crossover_rate.clamp(0.0, 1.0)) {
        for (a, b) in left.iter_mut().zip(right.iter_mut()) {
            if rng.gen_bool(0.5) {
                std::mem::swap(a, b);
            }
        }
    }

    (left, right)
}

/// Mutate each gene with probability `mutation_rate`
///
/// Global mode redraws the gene uniformly from [0, 1]; local mode perturbs
/// it within ±radius. Genes always stay in [0, 1].
pub fn mutate<R: Rng + ?Sized>(
    rng: &mut R,
    genes: &mut [f64],
    mutation_rate: f64,
    search: SearchMode,
) -> usize {
    let rate = mutation_rate.clamp(0.0, 1.0);
    let mut mutated = 0;

    for gene in genes.iter_mut() {
        if !rng.gen_bool(rate) {
            continue;
        }
        *gene = match search {
            SearchMode::GlobalUniform => rng.gen::<f64>(),
            SearchMode::LocalRadius { radius } => *gene + rng.gen_range(-radius..=radius),
        }
        .clamp(0.0, 1.0);
        mutated += 1;
    }

    mutated
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_no_crossover_copies_parents() {
        let mut rng = StdRng::seed_from_u64(1);
        let (a, b) = uniform_crossover(&mut rng, &[0.1, 0.2], &[0.8, 0.9], 0.0);
        assert_eq!(a, vec![0.1, 0.2]);
        assert_eq!(b, vec![0.8, 0.9]);
    }

    #[test]
    fn test_crossover_preserves_genes_per_locus() {
        let mut rng = StdRng::seed_from_u64(2);
        let first = [0.1, 0.2, 0.3, 0.4];
        let second = [0.6, 0.7, 0.8, 0.9];
        let (a, b) = uniform_crossover(&mut rng, &first, &second, 1.0);
        for i in 0..4 {
            let mut pair = [a[i], b[i]];
            pair.sort_by(|x, y| x.partial_cmp(y).unwrap());
            assert_eq!(pair, [first[i], second[i]]);
        }
    }

    #[test]
    fn test_zero_rate_never_mutates() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut genes = vec![0.3, 0.6];
        assert_eq!(mutate(&mut rng, &mut genes, 0.0, SearchMode::GlobalUniform), 0);
        assert_eq!(genes, vec![0.3, 0.6]);
    }

    #[test]
    fn test_local_mutation_is_bounded() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut genes = vec![0.5; 50];
        let mutated = mutate(&mut rng, &mut genes, 1.0, SearchMode::LocalRadius { radius: 0.05 });
        assert_eq!(mutated, 50);
        assert!(genes.iter().all(|g| (g - 0.5).abs() <= 0.05 + 1e-12));
    }

    proptest! {
        #[test]
        fn prop_operators_stay_in_unit_range(
            seed in any::<u64>(),
            genes in proptest::collection::vec(0.0f64..=1.0, 1..8),
            radius in 0.01f64..=1.0,
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let other: Vec<f64> = genes.iter().map(|g| 1.0 - g).collect();
            let (mut a, mut b) = uniform_crossover(&mut rng, &genes, &other, 0.9);
            mutate(&mut rng, &mut a, 0.5, SearchMode::GlobalUniform);
            mutate(&mut rng, &mut b, 0.5, SearchMode::LocalRadius { radius });
            prop_assert!(a.iter().chain(b.iter()).all(|g| (0.0..=1.0).contains(g)));
        }
    }
}
