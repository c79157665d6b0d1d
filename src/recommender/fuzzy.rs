//! Levenshtein based string similarity (`strsim`) used to resolve free-text
//! titles against the catalog.

/// Lowercases, turns anything that is not alphanumeric into a space and
/// collapses runs of whitespace.
pub fn normalize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity in [0, 100] of two whole strings.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    100.0 * strsim::normalized_levenshtein(a, b)
}

/// Best [`ratio`] of the shorter string against every equally long window of
/// the longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let window_len = shorter.chars().count();
    if window_len == 0 {
        return 0.0;
    }

    let longer: Vec<char> = longer.chars().collect();
    let mut best: f64 = 0.0;
    for window in longer.windows(window_len) {
        let window: String = window.iter().collect();
        best = best.max(ratio(shorter, &window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Weighted similarity score in [0, 100] between a query and a candidate
/// title. Combines the plain ratio with word-order-insensitive and substring
/// variants, scaling the latter down when lengths differ a lot.
pub fn title_score(query: &str, candidate: &str) -> u8 {
    let query = normalize(query);
    let candidate = normalize(candidate);
    if query.is_empty() || candidate.is_empty() {
        return 0;
    }

    let query_len = query.chars().count() as f64;
    let candidate_len = candidate.chars().count() as f64;
    let length_ratio = query_len.max(candidate_len) / query_len.min(candidate_len);

    let base = ratio(&query, &candidate);
    let sorted_query = sorted_tokens(&query);
    let sorted_candidate = sorted_tokens(&candidate);

    let score = if length_ratio < 1.5 {
        base.max(ratio(&sorted_query, &sorted_candidate) * 0.95)
    } else {
        let partial_scale = if length_ratio < 8.0 { 0.9 } else { 0.6 };
        base.max(partial_ratio(&query, &candidate) * partial_scale)
            .max(partial_ratio(&sorted_query, &sorted_candidate) * 0.95 * partial_scale)
    };

    score.round().clamp(0.0, 100.0) as u8
}

/// Index and score of the candidate scoring highest against `query`.
/// On ties the earliest candidate wins.
pub fn best_match<'a, I>(query: &str, candidates: I) -> Option<(usize, u8)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, u8)> = None;
    for (index, candidate) in candidates.into_iter().enumerate() {
        let score = title_score(query, candidate);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
        if score == 100 {
            break;
        }
    }
    best
}
