// Prompt constants for section text generation.
// The tag format here must stay in step with generation::tags.

use serde_json::Value;

/// System prompt describing the tag-annotated output format.
pub const SECTION_SYSTEM: &str = "You are an experienced report writer. \
    Write clear, warm, well-structured prose for one section of a longer printed report. \
    Format your answer ONLY with these markers: \
    [HEADING]...[END] for a heading, [SUBHEADING]...[END] for a sub-heading, \
    and [CONTENT]...[END] around body text. \
    Inside [CONTENT], start each bullet item on its own line with '- ' \
    and wrap emphasised words in **double asterisks**. \
    Never nest markers. Do NOT use markdown headings, tables or code fences. \
    Do NOT include explanations or apologies.";

/// Section prompt template. Replace `{title}`, `{instructions}` and `{context}` before sending.
pub const SECTION_PROMPT_TEMPLATE: &str = r#"Write the report section titled "{title}".

{instructions}

Use the following data as the only source of facts for this section. Do not invent values that are not present.

DATA:
{context}

Keep the section between 250 and 600 words. Prefer one [SUBHEADING] per theme, each followed by a [CONTENT] block of short bullet items."#;

/// Builds the user prompt for one section.
pub fn build_section_prompt(title: &str, instructions: &str, context: &Value) -> String {
    let context = if context.is_null() {
        "(none)".to_string()
    } else {
        serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string())
    };
    SECTION_PROMPT_TEMPLATE
        .replace("{title}", title)
        .replace("{instructions}", instructions.trim())
        .replace("{context}", &context)
}
