use crate::normalize::TokenNormalizer;

const PAIR_SEPARATOR: char = '/';

impl TokenNormalizer {
    /// Canonical `TOKEN0/TOKEN1` spelling of a pair, preserving side order.
    /// Strings that are not exactly two non-empty sides come back trimmed and
    /// uppercased but otherwise untouched, so they simply never match.
    pub fn normalize_pair(&self, raw: &str) -> String {
        if raw.is_empty() {
            return raw.to_string();
        }

        match self.split_pair(raw) {
            Some((token0, token1)) => format!("{}{}{}", token0, PAIR_SEPARATOR, token1),
            None => raw.trim().to_uppercase(),
        }
    }

    /// Normalized `(token0, token1)` of a pair string, `None` when malformed
    pub fn split_pair(&self, raw: &str) -> Option<(String, String)> {
        let mut sides = raw.split(PAIR_SEPARATOR);
        let left = sides.next()?;
        let right = sides.next()?;
        if sides.next().is_some() {
            return None;
        }

        let token0 = self.normalize(left);
        let token1 = self.normalize(right);
        if token0.is_empty() || token1.is_empty() {
            return None;
        }

        Some((token0, token1))
    }
}
