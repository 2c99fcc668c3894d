pub fn factorial(n: u64) -> f64 {
    (1..=n).fold(1.0, |acc, k| acc * k as f64)
}

/// `C(n, k)`, zero when `k > n`.
pub fn binomial(n: u64, k: u64) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Number of ordered arrangements of `k` out of `n`, `n! / (n-k)!`.
pub fn arrangements(n: u64, k: u64) -> f64 {
    if k > n {
        return 0.0;
    }
    ((n - k + 1)..=n).fold(1.0, |acc, i| acc * i as f64)
}

/// Advances `indices` (a strictly increasing `k`-subset of `0..n`) to the
/// next subset in lexicographic order. Returns `false` after the last one.
pub fn next_combination(indices: &mut [usize], n: usize) -> bool {
    let k = indices.len();
    let Some(i) = (0..k).rev().find(|&i| indices[i] < n - k + i) else {
        return false;
    };
    indices[i] += 1;
    for j in (i + 1)..k {
        indices[j] = indices[j - 1] + 1;
    }
    true
}

/// Rearranges `items` into the next lexicographic permutation. Returns
/// `false` (leaving `items` sorted ascending) after the last one.
pub fn next_permutation<T: Ord>(items: &mut [T]) -> bool {
    let n = items.len();
    if n < 2 {
        return false;
    }
    let Some(i) = (0..n - 1).rev().find(|&i| items[i] < items[i + 1]) else {
        items.reverse();
        return false;
    };
    let j = (i + 1..n).rev().find(|&j| items[j] > items[i]).unwrap_or(i + 1);
    items.swap(i, j);
    items[i + 1..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(5, 2), 10.0);
        assert_eq!(binomial(5, 0), 1.0);
        assert_eq!(binomial(3, 4), 0.0);
    }

    #[test]
    fn test_arrangements() {
        assert_eq!(arrangements(5, 2), 20.0);
        assert_eq!(arrangements(4, 4), factorial(4));
    }

    #[test]
    fn test_combinations_are_enumerated_in_order() {
        let mut c = vec![0, 1];
        let mut seen = vec![c.clone()];
        while next_combination(&mut c, 4) {
            seen.push(c.clone());
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(seen.last(), Some(&vec![2, 3]));
    }

    #[test]
    fn test_permutations_are_enumerated_in_order() {
        let mut p = vec![1, 2, 3];
        let mut count = 1;
        while next_permutation(&mut p) {
            count += 1;
        }
        assert_eq!(count, 6);
        assert_eq!(p, vec![1, 2, 3]);
    }
}
