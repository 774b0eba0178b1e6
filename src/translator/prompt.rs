//! Prompt template and rough size heuristics
use tracing::warn;

/// Inputs larger than this many estimated tokens risk a truncated translation
pub const LARGE_INPUT_TOKENS: usize = 6000;
/// How close to `max_tokens` the output may come before we warn
pub const OUTPUT_HEADROOM_TOKENS: usize = 500;
pub const MAX_LINE_DRIFT: usize = 5;

/// Stand-in for the instruction block when estimating prompt size
const PROMPT_OVERHEAD_SAMPLE: &str = "Translate the following English text...";

const PROMPT_HEADER: &str = "Translate the following English text to grammatically perfect Finnish, \
preserving all markdown formatting (e.g. ## headers, \\n line breaks, **bold**, lists - etc).

CRITICAL RULES:
- Do NOT translate code, slugs, markdown syntax, URLs, or HTML
- Preserve ALL formatting exactly as shown
- Use the English text for context before re-writing
- Write as if you were a Finnish native speaker
- For business content: Use professional tone suitable for Finnish B2B market
- Maintain SEO-friendly language for Finnish searches
- IMPORTANT: Translate the COMPLETE text, do not truncate or summarize

English text:
";

const PROMPT_FOOTER: &str = "

Finnish translation:";

pub fn build_prompt(text: &str) -> String {
    let mut prompt = String::with_capacity(PROMPT_HEADER.len() + text.len() + PROMPT_FOOTER.len());
    prompt.push_str(PROMPT_HEADER);
    prompt.push_str(text);
    prompt.push_str(PROMPT_FOOTER);
    prompt
}

/// Roughly one token per four characters
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

/// Log warnings about an input that may not translate completely.
/// Returns the estimated prompt size in tokens.
pub fn check_input(text: &str) -> usize {
    let total = estimate_tokens(text) + estimate_tokens(PROMPT_OVERHEAD_SAMPLE);
    if total > LARGE_INPUT_TOKENS {
        warn!(
            "Large text detected ({} tokens), translation may be truncated",
            total
        );
    }
    total
}

/// Log warnings when a translation looks truncated. Returns true if anything looked off.
pub fn check_output(input: &str, output: &str, max_tokens: u32) -> bool {
    let mut suspicious = false;
    let output_tokens = estimate_tokens(output);
    let limit = (max_tokens as usize).saturating_sub(OUTPUT_HEADROOM_TOKENS);
    if output_tokens >= limit {
        warn!(
            "Output near token limit ({} of {}), translation may be truncated",
            output_tokens, max_tokens
        );
        suspicious = true;
    }
    let (input_lines, output_lines) = (line_count(input), line_count(output));
    if input_lines.abs_diff(output_lines) > MAX_LINE_DRIFT {
        warn!(
            "Line count mismatch: input {} lines, output {} lines",
            input_lines, output_lines
        );
        suspicious = true;
    }
    suspicious
}
