use log::warn;
use std::collections::HashMap;

/// Wrapped, staked and bridged variants mapped to their base asset.
/// Keys are uppercase with any trailing `0` suffix already removed.
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[
    // Bitcoin
    ("WBTC", "BTC"),
    ("CBBTC", "BTC"),
    ("XBTC", "BTC"),
    ("TBTC", "BTC"),
    // Ether
    ("WETH", "ETH"),
    ("WHETH", "ETH"),
    ("STETH", "ETH"),
    ("WSTETH", "ETH"),
    ("CBETH", "ETH"),
    // Solana
    ("WSOL", "SOL"),
    // Dollar stables
    ("USDC.E", "USDC"),
    ("USDBC", "USDC"),
    ("USDT.E", "USDT"),
    // OCR transpositions
    ("JPL", "JLP"),
];

/// Canonicalizes token symbols against an alias table
#[derive(Debug, Clone)]
pub struct TokenNormalizer {
    aliases: HashMap<String, String>,
}

impl Default for TokenNormalizer {
    fn default() -> Self {
        Self::with_aliases(DEFAULT_ALIASES.iter().map(|(from, to)| (*from, *to)))
    }
}

impl TokenNormalizer {
    /// Normalizer with no aliases at all
    pub fn empty() -> Self {
        Self { aliases: HashMap::new() }
    }

    /// Build a normalizer from `(variant, canonical)` entries
    pub fn with_aliases<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut normalizer = Self::empty();
        normalizer.extend(entries);
        normalizer
    }

    /// Add or override alias entries. Both sides are cleaned the same way
    /// input symbols are, so entries can be written in any case.
    ///
    /// Targets are resolved through the table before they are stored, so
    /// every stored target is itself canonical and a single lookup is enough.
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (from, to) in entries {
            let from = clean_symbol(from.as_ref());
            let to = clean_symbol(to.as_ref());
            if from.is_empty() || to.is_empty() {
                continue;
            }

            if to == from {
                self.aliases.remove(&from);
                continue;
            }

            let target = self.aliases.get(&to).cloned().unwrap_or(to);
            if target == from {
                warn!("Alias chain for {} loops back to itself, keeping {} canonical", from, from);
                self.aliases.remove(&from);
                continue;
            }

            // entries that ended at `from` now continue on to `target`
            for canonical in self.aliases.values_mut() {
                if *canonical == from {
                    *canonical = target.clone();
                }
            }
            self.aliases.insert(from, target);
        }
    }

    /// Number of alias entries
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Canonical symbol for `raw`. Unknown symbols pass through cleaned.
    pub fn normalize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return raw.to_string();
        }

        let cleaned = clean_symbol(raw);
        match self.aliases.get(&cleaned) {
            Some(canonical) => canonical.clone(),
            None => cleaned,
        }
    }
}

/// Trim, uppercase and drop the UI's trailing `0` suffix (`USDC0` -> `USDC`)
fn clean_symbol(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .trim_end_matches(|c: char| c == '0' || c.is_whitespace())
        .to_string()
}
