//! Edit distance and the fuzzy word test built on it.

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;

/// Classic Levenshtein distance over chars; insert, delete and substitute each cost 1.
///
/// `matrix[i][j]` holds the distance between the first `i` chars of `b` and the first `j`
/// chars of `a`.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut matrix = vec![vec![0usize; a.len() + 1]; b.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=a.len() {
        matrix[0][j] = j;
    }
    for i in 1..=b.len() {
        for j in 1..=a.len() {
            matrix[i][j] = if b[i - 1] == a[j - 1] {
                matrix[i - 1][j - 1]
            } else {
                1 + matrix[i - 1][j - 1].min(matrix[i][j - 1]).min(matrix[i - 1][j])
            };
        }
    }
    matrix[b.len()][a.len()]
}

/// `1 - distance / max(len)`; zero when either side is empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// True when any whitespace-separated word of `text` is at least `threshold` similar to `term`.
pub fn fuzzy_match(term: &str, text: &str, threshold: f64) -> bool {
    if term.is_empty() {
        return false;
    }
    text.split_whitespace().any(|word| similarity(term, word) >= threshold)
}
