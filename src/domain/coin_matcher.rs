//! Coin Matcher
//!
//! Maps free text (a tweet) to the trading pair it talks about.
//!
//! Matching is a plain case-insensitive substring scan over the configured
//! keywords, in table order. The first keyword found wins; there is no
//! longest-match resolution, so "dogecoin" and "doge" configured for different
//! pairs resolve to whichever was declared first.

/// Keyword -> trading pair table, immutable after load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedPairs {
    /// (lower-cased keyword, pair) in declaration order
    entries: Vec<(String, String)>,
}

impl TrackedPairs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (pair, "kw1, kw2, ...") rows as they appear in the config file.
    pub fn from_config_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut table = Self::new();
        for (pair, keywords) in rows {
            for keyword in keywords.split(',') {
                table = table.with_keyword(keyword, pair);
            }
        }
        table
    }

    /// Add a keyword for a pair. Blank keywords are ignored; a keyword that is
    /// already tracked keeps its first pair.
    pub fn with_keyword(mut self, keyword: &str, pair: &str) -> Self {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() || self.entries.iter().any(|(k, _)| *k == keyword) {
            return self;
        }
        self.entries.push((keyword, pair.trim().to_string()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct pairs, in declaration order.
    pub fn pairs(&self) -> Vec<&str> {
        let mut pairs: Vec<&str> = Vec::new();
        for (_, pair) in &self.entries {
            if !pairs.contains(&pair.as_str()) {
                pairs.push(pair);
            }
        }
        pairs
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, p)| (k.as_str(), p.as_str()))
    }
}

/// Resolves text to at most one tracked pair.
#[derive(Debug, Clone)]
pub struct CoinMatcher {
    pairs: TrackedPairs,
}

impl CoinMatcher {
    pub fn new(pairs: TrackedPairs) -> Self {
        Self { pairs }
    }

    /// Pair of the first keyword contained in `text`, if any.
    pub fn find_pair(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.pairs
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, pair)| pair)
    }

    /// True if any tracked keyword appears in `text`.
    pub fn mentions_coin(&self, text: &str) -> bool {
        self.find_pair(text).is_some()
    }

    pub fn tracked(&self) -> &TrackedPairs {
        &self.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> CoinMatcher {
        CoinMatcher::new(TrackedPairs::from_config_rows([
            ("DOGEUSDT", "doge, dogecoin"),
            ("BTCUSDT", "bitcoin, btc"),
        ]))
    }

    #[test]
    fn test_case_insensitive_match() {
        let m = matcher();
        assert_eq!(m.find_pair("Going to the moon with DOGE"), Some("DOGEUSDT"));
        assert_eq!(m.find_pair("BiTcOiN is the future"), Some("BTCUSDT"));
    }

    #[test]
    fn test_no_match() {
        let m = matcher();
        assert_eq!(m.find_pair("Rockets are cool"), None);
        assert!(!m.mentions_coin(""));
    }

    #[test]
    fn test_first_match_wins_not_longest() {
        let m = CoinMatcher::new(
            TrackedPairs::new()
                .with_keyword("doge", "DOGEUSDT")
                .with_keyword("dogecoin", "DOGEBUSD"),
        );
        // "dogecoin" is longer, but "doge" was declared first
        assert_eq!(m.find_pair("dogecoin!"), Some("DOGEUSDT"));
    }

    #[test]
    fn test_table_order_decides_between_pairs() {
        let m = matcher();
        assert_eq!(m.find_pair("btc or doge?"), Some("DOGEUSDT"));
    }

    #[test]
    fn test_substring_semantics() {
        let m = matcher();
        // substring match, not word match
        assert_eq!(m.find_pair("#dogearmy"), Some("DOGEUSDT"));
    }

    #[test]
    fn test_config_rows_trim_and_dedupe() {
        let table = TrackedPairs::from_config_rows([
            ("DOGEUSDT", " Doge ,  , dogecoin"),
            ("SHIBUSDT", "doge, shib"),
        ]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.pairs(), vec!["DOGEUSDT", "SHIBUSDT"]);
        let keywords: Vec<&str> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keywords, vec!["doge", "dogecoin", "shib"]);
    }

    #[test]
    fn test_match_implies_keyword_substring() {
        let m = matcher();
        for text in ["I like BTC", "nothing here", "DogeCoin", "bit coin"] {
            if let Some(pair) = m.find_pair(text) {
                let lowered = text.to_lowercase();
                assert!(m
                    .tracked()
                    .iter()
                    .any(|(k, p)| p == pair && lowered.contains(k)));
            }
        }
    }
}
