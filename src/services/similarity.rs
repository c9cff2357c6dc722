//! Sequence similarity ratio.
//!
//! Mirrors the classic `SequenceMatcher.ratio()` definition: twice the number
//! of matched characters over the combined length, where matches come from
//! recursively taking the longest common block. Sequences of 200+ characters
//! get the "popular element" heuristic: characters occurring more than
//! `len / 100 + 1` times are not used to seed matches, only to extend them.

use std::collections::HashMap;

/// Case-insensitive similarity in `[0, 1]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    ratio(&a, &b)
}

fn ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matches = Matcher::new(a, b).matched_chars();
    2.0 * matches as f64 / total as f64
}

struct Matcher<'a> {
    a: &'a [char],
    b: &'a [char],
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> Matcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }

        let n = b.len();
        if n >= 200 {
            let limit = n / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= limit);
        }

        Self { a, b, b2j }
    }

    /// Longest matching block in `a[alo..ahi]` / `b[blo..bhi]` as `(i, j, size)`.
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = next;
        }

        // Popular characters never seed a match but still extend one.
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }

    fn matched_chars(&self) -> usize {
        let mut total = 0;
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            total += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_is_one() {
        assert_eq!(similarity("O relatório foi entregue.", "O relatório foi entregue."), 1.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(similarity("Hello World", "hello world"), 1.0);
    }

    #[test]
    fn test_known_ratio() {
        assert!((similarity("abcd", "bcde") - 0.75).abs() < 1e-12);
        assert!((similarity("abc", "xyz")).abs() < 1e-12);
        assert_eq!(similarity("abc", ""), 0.0);
    }

    #[test]
    fn test_small_edit_below_threshold() {
        let original = "Os dados foi coletados em campo.";
        let corrected = "Os dados foram coletados em campo.";
        let ratio = similarity(original, corrected);
        assert!(ratio < 0.999);
        assert!(ratio > 0.9);
    }

    #[test]
    fn test_long_identical_with_popular_chars() {
        let text = "a".repeat(250);
        assert_eq!(similarity(&text, &text), 1.0);
    }

    #[test]
    fn test_popular_chars_do_not_seed_matches() {
        // Every character of b is popular, and the first characters differ,
        // so nothing seeds a match.
        let a = format!("x{}", "a".repeat(250));
        let b = "a".repeat(250);
        assert_eq!(similarity(&a, &b), 0.0);
    }
}
