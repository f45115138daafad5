mod parse;

pub use parse::parse_response;
pub use parse::VisionParseError;

/// Prompt sent with the screenshot. The model is asked to report which
/// position is expanded, never to confirm a pair chosen by the caller; the
/// matcher alone decides where the answer belongs.
pub const DISCOVERY_PROMPT: &str = "\
The screenshot shows a table of concentrated liquidity positions. At most one \
row may be expanded to show its token breakdown.

If no row is expanded, answer exactly: {\"expanded\": false}

Otherwise read the expanded row and answer with JSON only:
{
  \"expanded\": true,
  \"pair\": \"TOKEN0/TOKEN1 exactly as shown in the expanded row\",
  \"token0Amount\": <amount of the first token>,
  \"token1Amount\": <amount of the second token>,
  \"token0Percentage\": <share of the first token in percent>,
  \"token1Percentage\": <share of the second token in percent>
}

Report the pair you actually see expanded. Use null for any value you cannot read.";
