mod pair;
mod token;

pub use token::TokenNormalizer;
pub use token::DEFAULT_ALIASES;

use once_cell::sync::OnceCell;

static NORMALIZER: OnceCell<TokenNormalizer> = OnceCell::new();

/// Process-wide normalizer used for key generation. Falls back to the
/// default alias table when nothing was installed.
pub fn normalizer() -> &'static TokenNormalizer {
    NORMALIZER.get_or_init(TokenNormalizer::default)
}

/// Install a configured normalizer. Must happen before the first key is
/// generated; returns `false` if one was already in use.
pub fn install_normalizer(normalizer: TokenNormalizer) -> bool {
    NORMALIZER.set(normalizer).is_ok()
}

/// Canonical symbol for a raw token string
pub fn normalize_token(raw: &str) -> String {
    normalizer().normalize(raw)
}

/// Canonical `TOKEN0/TOKEN1` spelling of a raw pair string
pub fn normalize_pair(raw: &str) -> String {
    normalizer().normalize_pair(raw)
}

/// Normalized sides of a raw pair string, `None` when malformed
pub fn split_pair(raw: &str) -> Option<(String, String)> {
    normalizer().split_pair(raw)
}
