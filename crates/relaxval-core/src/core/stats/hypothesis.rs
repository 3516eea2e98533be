use super::special::{chi_square_sf, normal_sf};
use serde::Serialize;

/// Largest smaller sample for which the exact Mann-Whitney distribution is used.
const MANN_WHITNEY_EXACT_LIMIT: usize = 8;
/// Largest `n1 * n2` for which the exact Mann-Whitney distribution is used.
const MANN_WHITNEY_EXACT_CELLS: usize = 100_000;
/// Largest number of non-zero differences for which the exact signed-rank distribution is used.
const WILCOXON_EXACT_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// Ranks starting at 1, with tied values sharing their average rank.
///
/// Also returns the size of every tie group with more than one member.
pub fn average_ranks(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut ties = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        if end - start > 1 {
            ties.push(end - start);
        }
        start = end;
    }
    (ranks, ties)
}

fn tie_sum(ties: &[usize]) -> f64 {
    ties.iter()
        .map(|&t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum()
}

/// Number of orderings of `m` and `n` items for each value of U, for U in `0..=m*n`.
///
/// These are the coefficients of the Gaussian binomial `[m+n choose m]`, built as the
/// product of `(1 - q^(n+k)) / (1 - q^k)` for `k = 1..=m` on a series cut at degree `m*n`.
fn mann_whitney_counts(m: usize, n: usize) -> Vec<f64> {
    let (m, n) = (m.min(n), m.max(n));
    let len = m * n + 1;
    let mut coeffs = vec![0i128; len];
    coeffs[0] = 1;
    for k in 1..=m {
        for u in (n + k..len).rev() {
            coeffs[u] -= coeffs[u - n - k];
        }
        for u in k..len {
            coeffs[u] += coeffs[u - k];
        }
    }
    coeffs.into_iter().map(|c| c as f64).collect()
}

fn mann_whitney_exact(n1: usize, n2: usize, tied: bool) -> bool {
    !tied && n1.min(n2) <= MANN_WHITNEY_EXACT_LIMIT && n1 * n2 <= MANN_WHITNEY_EXACT_CELLS
}

/// Two-sided Mann-Whitney U test; the statistic is U for the first sample.
///
/// Uses the exact distribution when the smaller sample has at most eight values,
/// `n1 * n2` stays within `MANN_WHITNEY_EXACT_CELLS` and there are no ties, and
/// the tie-corrected normal approximation with
/// continuity correction otherwise.
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> Option<TestResult> {
    let (n1, n2) = (x.len(), y.len());
    if n1 == 0 || n2 == 0 {
        return None;
    }
    let combined: Vec<f64> = x.iter().chain(y).copied().collect();
    let (ranks, ties) = average_ranks(&combined);
    let r1: f64 = ranks[..n1].iter().sum();
    let (f1, f2) = (n1 as f64, n2 as f64);
    let u1 = r1 - f1 * (f1 + 1.0) / 2.0;
    let u2 = f1 * f2 - u1;
    let u_max = u1.max(u2);

    let p_value = if mann_whitney_exact(n1, n2, !ties.is_empty()) {
        let counts = mann_whitney_counts(n1, n2);
        let total: f64 = counts.iter().sum();
        let threshold = u_max.round() as usize;
        let upper: f64 = counts.iter().skip(threshold).sum();
        (2.0 * upper / total).min(1.0)
    } else {
        let n = f1 + f2;
        let mu = f1 * f2 / 2.0;
        let variance = f1 * f2 / 12.0 * ((n + 1.0) - tie_sum(&ties) / (n * (n - 1.0)));
        if variance <= 0.0 {
            return Some(TestResult {
                statistic: u1,
                p_value: 1.0,
            });
        }
        let z = (u_max - mu - 0.5) / variance.sqrt();
        (2.0 * normal_sf(z)).min(1.0)
    };

    Some(TestResult {
        statistic: u1,
        p_value,
    })
}

/// Number of subsets of `{1..n}` for each possible rank sum.
fn signed_rank_counts(n: usize) -> Vec<f64> {
    let max_sum = n * (n + 1) / 2;
    let mut counts = vec![0.0; max_sum + 1];
    counts[0] = 1.0;
    for k in 1..=n {
        for s in (k..=max_sum).rev() {
            counts[s] += counts[s - k];
        }
    }
    counts
}

/// Two-sided Wilcoxon signed-rank test on paired samples.
///
/// Zero differences are dropped. The statistic is the smaller of the positive and
/// negative rank sums.
pub fn wilcoxon_signed_rank(x: &[f64], y: &[f64]) -> Option<TestResult> {
    if x.len() != y.len() {
        return None;
    }
    let diffs: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(a, b)| a - b)
        .filter(|d| *d != 0.0)
        .collect();
    let n = diffs.len();
    if n == 0 {
        return None;
    }

    let abs: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    let (ranks, ties) = average_ranks(&abs);
    let r_plus: f64 = diffs
        .iter()
        .zip(&ranks)
        .filter(|(d, _)| **d > 0.0)
        .map(|(_, r)| r)
        .sum();
    let nf = n as f64;
    let r_minus = nf * (nf + 1.0) / 2.0 - r_plus;
    let statistic = r_plus.min(r_minus);

    let p_value = if n <= WILCOXON_EXACT_LIMIT && ties.is_empty() {
        let counts = signed_rank_counts(n);
        let total = 2f64.powi(n as i32);
        let lower: f64 = counts.iter().take(statistic.round() as usize + 1).sum();
        (2.0 * lower / total).min(1.0)
    } else {
        let mean = nf * (nf + 1.0) / 4.0;
        let variance = nf * (nf + 1.0) * (2.0 * nf + 1.0) / 24.0 - tie_sum(&ties) / 48.0;
        if variance <= 0.0 {
            1.0
        } else {
            let z = (statistic - mean) / variance.sqrt();
            (2.0 * normal_sf(z.abs())).min(1.0)
        }
    };

    Some(TestResult { statistic, p_value })
}

/// Kruskal-Wallis H test with tie correction.
///
/// Needs at least two non-empty groups and some variation in the pooled values.
pub fn kruskal_wallis(groups: &[&[f64]]) -> Option<TestResult> {
    let groups: Vec<&[f64]> = groups.iter().copied().filter(|g| !g.is_empty()).collect();
    if groups.len() < 2 {
        return None;
    }
    let pooled: Vec<f64> = groups.iter().flat_map(|g| g.iter().copied()).collect();
    let n = pooled.len() as f64;
    let (ranks, ties) = average_ranks(&pooled);

    let mut offset = 0;
    let mut sum_sq = 0.0;
    for group in &groups {
        let rank_sum: f64 = ranks[offset..offset + group.len()].iter().sum();
        sum_sq += rank_sum * rank_sum / group.len() as f64;
        offset += group.len();
    }

    let h = 12.0 / (n * (n + 1.0)) * sum_sq - 3.0 * (n + 1.0);
    let correction = 1.0 - tie_sum(&ties) / (n * n * n - n);
    if correction <= 0.0 {
        return None;
    }
    let h = h / correction;
    Some(TestResult {
        statistic: h,
        p_value: chi_square_sf(h, (groups.len() - 1) as f64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn average_ranks_share_ties() {
        let (ranks, ties) = average_ranks(&[10.0, 20.0, 20.0, 5.0, 20.0]);
        assert_eq!(ranks, vec![2.0, 4.0, 4.0, 1.0, 4.0]);
        assert_eq!(ties, vec![3]);
    }

    #[test]
    fn mann_whitney_exact_for_small_untied_samples() {
        let result = mann_whitney_u(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
        assert!(close(result.statistic, 0.0));
        assert!(close(result.p_value, 0.1));

        let result = mann_whitney_u(&[1.0, 4.0], &[2.0, 3.0]).unwrap();
        assert!(close(result.statistic, 2.0));
        assert!(close(result.p_value, 1.0));
    }

    #[test]
    fn mann_whitney_counts_sum_to_binomial() {
        let counts = mann_whitney_counts(3, 4);
        assert_eq!(counts.len(), 13);
        assert!(close(counts.iter().sum::<f64>(), 35.0));
        assert!(close(counts[0], 1.0));
        assert!(close(counts[12], 1.0));
    }

    #[test]
    fn mann_whitney_counts_match_small_tables() {
        assert_eq!(mann_whitney_counts(2, 2), vec![1.0, 1.0, 2.0, 1.0, 1.0]);
        assert_eq!(mann_whitney_counts(3, 4), mann_whitney_counts(4, 3));
    }

    #[test]
    fn mann_whitney_counts_stay_linear_for_unbalanced_samples() {
        let counts = mann_whitney_counts(8, 10_000);
        assert_eq!(counts.len(), 80_001);
        let binomial: f64 = (1..=8).map(|k| (10_000 + k) as f64 / k as f64).product();
        let total: f64 = counts.iter().sum();
        assert!((total / binomial - 1.0).abs() < 1e-9);
        assert!(counts.iter().all(|&c| c >= 1.0));
    }

    #[test]
    fn mann_whitney_exact_branch_is_bounded() {
        assert!(mann_whitney_exact(8, 12_500, false));
        assert!(!mann_whitney_exact(8, 12_501, false));
        assert!(!mann_whitney_exact(3, 4, true));
        assert!(!mann_whitney_exact(9, 9, false));
    }

    #[test]
    fn mann_whitney_normal_approximation_with_ties() {
        let x = [1.0, 2.0, 2.0, 3.0];
        let y = [2.0, 4.0, 5.0, 6.0, 7.0];
        let result = mann_whitney_u(&x, &y).unwrap();
        assert!(close(result.statistic, 2.0));
        assert!((result.p_value - 0.061_689_165_980_924_5).abs() < 1e-6);
    }

    #[test]
    fn wilcoxon_exact_distribution() {
        let base = [10.0, 10.0, 10.0, 10.0, 10.0];
        let all_up = wilcoxon_signed_rank(&[11.0, 12.0, 13.0, 14.0, 15.0], &base).unwrap();
        assert!(close(all_up.statistic, 0.0));
        assert!(close(all_up.p_value, 0.0625));

        let mixed = wilcoxon_signed_rank(&[11.0, 8.0, 13.0, 14.0, 15.0], &base).unwrap();
        assert!(close(mixed.statistic, 2.0));
        assert!(close(mixed.p_value, 0.1875));
    }

    #[test]
    fn wilcoxon_drops_zero_differences() {
        assert!(wilcoxon_signed_rank(&[1.0, 2.0], &[1.0, 2.0]).is_none());
        let result = wilcoxon_signed_rank(&[1.0, 3.0], &[1.0, 2.0]).unwrap();
        assert!(close(result.statistic, 0.0));
        assert!(close(result.p_value, 1.0));
    }

    #[test]
    fn kruskal_wallis_separated_groups() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        let c = [7.0, 8.0, 9.0];
        let result = kruskal_wallis(&[&a, &b, &c]).unwrap();
        assert!(close(result.statistic, 7.2));
        assert!((result.p_value - 0.027_323_722_447_292_56).abs() < 1e-9);
    }

    #[test]
    fn kruskal_wallis_needs_two_groups_and_variation() {
        assert!(kruskal_wallis(&[&[1.0, 2.0], &[]]).is_none());
        assert!(kruskal_wallis(&[&[1.0, 1.0], &[1.0]]).is_none());
    }
}
