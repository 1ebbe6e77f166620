use super::Taxonomy;
use crate::util::normalize_text;

/// Most labels [`Taxonomy::classify`] will return.
pub const MAX_LABELS: usize = 3;

/// Share of the top score a runner-up needs to be kept.
const THRESHOLD_RATIO: f64 = 0.6;

impl Taxonomy {
    /// Scores `text` against every category.
    ///
    /// Only categories with a non-zero score are returned, ordered by score
    /// descending; ties keep table order.
    pub fn scores(&self, text: &str) -> Vec<(&str, usize)> {
        let folded = normalize_text(text);

        let mut scores: Vec<(&str, usize)> = self
            .taxa()
            .iter()
            .filter_map(|taxon| {
                let score: usize = taxon.keywords.iter().map(|k| k.count_in(&folded)).sum();
                (score > 0).then_some((taxon.name.as_str(), score))
            })
            .collect();

        // Stable: equal scores stay in table order
        scores.sort_by(|a, b| b.1.cmp(&a.1));
        scores
    }

    /// Derives up to [`MAX_LABELS`] category names for `text`.
    ///
    /// Every category scoring at least `max(1, round(0.6 * top))` is kept, so
    /// a strong winner suppresses incidental matches while close runners-up
    /// survive. An empty result means nothing matched; callers apply
    /// [`Taxonomy::fallback_label`].
    ///
    /// ```
    /// use feedmix::taxonomy::Taxonomy;
    ///
    /// let taxonomy = Taxonomy::from_json(r#"{"categories": [
    ///     {"name": "Sports", "keywords": ["football"]},
    ///     {"name": "Finance", "keywords": ["stock"]}
    /// ]}"#).unwrap();
    ///
    /// let labels = taxonomy.classify("football football football football football stock");
    /// assert_eq!(labels, vec!["Sports"]);
    /// ```
    pub fn classify(&self, text: &str) -> Vec<&str> {
        let scores = self.scores(text);
        let Some(&(_, top)) = scores.first() else {
            return Vec::new();
        };

        let threshold = ((top as f64 * THRESHOLD_RATIO).round() as usize).max(1);

        scores
            .into_iter()
            .filter(|(_, score)| *score >= threshold)
            .take(MAX_LABELS)
            .map(|(name, _)| name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn taxonomy() -> Taxonomy {
        Taxonomy::from_json(
            r#"{"categories": [
                {"name": "Sports", "keywords": ["football", "fútbol", "goal"]},
                {"name": "Finance", "keywords": ["stock", "market"]},
                {"name": "Tech", "keywords": ["software", "/\\bchips?\\b/"]},
                {"name": "Science", "keywords": ["research"]},
                {"name": "Health", "keywords": ["hospital"]}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_dominant_category_suppresses_weak_match() {
        let taxonomy = taxonomy();
        let text = "football ".repeat(5) + "stock";
        assert_eq!(taxonomy.classify(&text), vec!["Sports"]);
    }

    #[test]
    fn test_close_runner_up_is_kept() {
        let taxonomy = taxonomy();
        // Sports 5, Finance 3: threshold round(3.0) = 3
        let text = "football ".repeat(5) + "stock market stock";
        assert_eq!(taxonomy.classify(&text), vec!["Sports", "Finance"]);
    }

    #[test]
    fn test_at_most_three_labels() {
        let taxonomy = taxonomy();
        let text = "football stock software research hospital";
        assert_eq!(
            taxonomy.classify(text),
            vec!["Sports", "Finance", "Tech"]
        );
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(taxonomy().classify("knitting patterns for winter").is_empty());
        assert!(taxonomy().classify("").is_empty());
    }

    #[test]
    fn test_literal_keywords_match_whole_words_only() {
        let taxonomy = taxonomy();
        assert!(taxonomy.classify("stockholm goalkeeper").is_empty());
        assert_eq!(taxonomy.classify("Stock!"), vec!["Finance"]);
    }

    #[test]
    fn test_accents_and_case_are_folded() {
        let taxonomy = taxonomy();
        assert_eq!(taxonomy.classify("FUTBOL y Fútbol"), vec!["Sports"]);
        assert_eq!(taxonomy.scores("FUTBOL y Fútbol"), vec![("Sports", 2)]);
    }

    #[test]
    fn test_pattern_keywords_use_their_own_regex() {
        let taxonomy = taxonomy();
        assert_eq!(taxonomy.scores("new chip, more chips"), vec![("Tech", 2)]);
    }

    proptest! {
        #[test]
        fn prop_classify_is_idempotent(text in ".{0,200}") {
            let taxonomy = taxonomy();
            prop_assert_eq!(taxonomy.classify(&text), taxonomy.classify(&text));
        }

        #[test]
        fn prop_classify_never_exceeds_cap(words in proptest::collection::vec(
            prop_oneof![
                Just("football"), Just("stock"), Just("software"),
                Just("research"), Just("hospital"), Just("filler")
            ],
            0..40,
        )) {
            let taxonomy = taxonomy();
            let labels = taxonomy.classify(&words.join(" "));
            prop_assert!(labels.len() <= MAX_LABELS);
        }
    }
}
