mod convert;
mod format;

pub use convert::parse_number_text;
pub use format::format_optional;
pub use format::format_usd;
