//! History weight math.
//!
//! The compressor needs a boundary between the "old" portion of a
//! conversation (summarized away) and the "recent" tail (retained
//! verbatim). The boundary is chosen by cumulative serialized weight, a
//! stable proxy for each entry's contribution to the provider's token
//! budget.

use quill_core::{Content, Error, Result, Role};

/// Serialized size of one history entry, the default weight proxy.
///
/// A proxy, not a tokenizer: the production token counter may disagree.
/// Callers that need a different notion of weight use
/// [`find_split_index_with`].
#[must_use]
pub fn serialized_weight(content: &Content) -> usize {
    serde_json::to_string(content).map_or(0, |s| s.len())
}

/// Index of the first entry whose cumulative weight reaches
/// `fraction` of the total, using the serialized-size weigher.
pub fn find_split_index(history: &[Content], fraction: f64) -> Result<usize> {
    find_split_index_with(history, fraction, serialized_weight)
}

/// As [`find_split_index`], with a caller-supplied weigher.
///
/// Returns the smallest `i` such that the weights of `history[0..=i]`
/// sum to at least `fraction * total`. Zero-weight entries advance the
/// index without contributing to the sum. Empty and single-entry
/// histories both split at 0.
#[expect(
    clippy::cast_precision_loss,
    reason = "serialized sizes are far below 2^52"
)]
pub fn find_split_index_with(
    history: &[Content],
    fraction: f64,
    weigh: impl Fn(&Content) -> usize,
) -> Result<usize> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(Error::InvalidArgument(
            "fraction must be strictly between 0 and 1".to_string(),
        ));
    }
    if history.is_empty() {
        return Ok(0);
    }

    let weights: Vec<f64> = history.iter().map(|c| weigh(c) as f64).collect();
    let total: f64 = weights.iter().sum();
    let target = total * fraction;

    let mut cumulative = 0.0;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if cumulative >= target {
            return Ok(index);
        }
    }

    // Floating-point guard; the last entry always reaches the target.
    Ok(history.len() - 1)
}

/// Summary numbers for a conversation history.
#[derive(Debug, Clone)]
pub struct HistoryStats {
    pub total_entries: usize,
    pub user_entries: usize,
    pub model_entries: usize,
    pub serialized_bytes: usize,
    pub estimated_tokens: usize,
}

/// Compute [`HistoryStats`] for display and logging.
#[must_use]
pub fn history_stats(history: &[Content]) -> HistoryStats {
    let serialized_bytes: usize = history.iter().map(serialized_weight).sum();
    let user_entries = history.iter().filter(|c| c.role == Role::User).count();
    let model_entries = history.iter().filter(|c| c.role == Role::Model).count();

    HistoryStats {
        total_entries: history.len(),
        user_entries,
        model_entries,
        serialized_bytes,
        estimated_tokens: serialized_bytes / 4, // Rough estimate: 4 chars per token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{Blob, Part};

    fn make_history(count: usize) -> Vec<Content> {
        (0..count)
            .map(|i| {
                if i % 2 == 0 {
                    Content::user_text(format!("Message {i}: {}", "x".repeat(10 * (i + 1))))
                } else {
                    Content::model_text(format!("Reply {i}: {}", "y".repeat(5 * (i + 1))))
                }
            })
            .collect()
    }

    #[expect(clippy::cast_precision_loss, reason = "test weights are tiny")]
    fn prefix_weight(history: &[Content], end_inclusive: usize) -> f64 {
        history[..=end_inclusive]
            .iter()
            .map(|c| serialized_weight(c) as f64)
            .sum()
    }

    #[test]
    #[expect(clippy::cast_precision_loss, reason = "test weights are tiny")]
    fn split_satisfies_cumulative_weight_bounds() {
        let history = make_history(12);
        let total: f64 = history.iter().map(|c| serialized_weight(c) as f64).sum();

        for fraction in [0.05, 0.1, 0.25, 0.5, 0.7, 0.9, 0.99] {
            let index = find_split_index(&history, fraction).unwrap();
            let target = total * fraction;

            assert!(
                prefix_weight(&history, index) >= target,
                "fraction {fraction}: inclusive prefix must reach target"
            );
            if index > 0 {
                assert!(
                    prefix_weight(&history, index - 1) < target,
                    "fraction {fraction}: index must be the smallest that reaches target"
                );
            }
        }
    }

    #[test]
    fn out_of_range_fractions_fail() {
        let history = make_history(3);
        for fraction in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            let err = find_split_index(&history, fraction).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
        }
    }

    #[test]
    fn empty_history_splits_at_zero() {
        assert_eq!(find_split_index(&[], 0.5).unwrap(), 0);
    }

    #[test]
    fn single_entry_splits_at_zero() {
        let history = vec![Content::user_text("only one")];
        assert_eq!(find_split_index(&history, 0.5).unwrap(), 0);
        assert_eq!(find_split_index(&history, 0.99).unwrap(), 0);
    }

    #[test]
    fn zero_weight_entries_advance_the_index() {
        let history = vec![
            Content::user_text("aaaaa"),
            Content::new(Role::User, vec![]),
            Content::model_text("bbbbb"),
        ];
        // Weigh only text; the middle entry weighs nothing but still
        // occupies an index position.
        let weigh = |c: &Content| c.text().len();
        let index = find_split_index_with(&history, 0.6, weigh).unwrap();
        assert_eq!(index, 2);
    }

    #[test]
    fn non_text_parts_still_count_as_entries() {
        let history = vec![
            Content::user_text("hello"),
            Content::new(
                Role::User,
                vec![Part {
                    inline_data: Some(Blob {
                        mime_type: "image/png".to_string(),
                        data: "aGVsbG8=".to_string(),
                    }),
                    ..Part::default()
                }],
            ),
            Content::model_text("world"),
        ];
        let index = find_split_index(&history, 0.9).unwrap();
        assert_eq!(index, 2);
    }

    #[test]
    fn stats_count_roles_and_bytes() {
        let history = make_history(10);
        let stats = history_stats(&history);
        assert_eq!(stats.total_entries, 10);
        assert_eq!(stats.user_entries, 5);
        assert_eq!(stats.model_entries, 5);
        assert!(stats.serialized_bytes > 0);
        assert!(stats.estimated_tokens > 0);
    }
}
