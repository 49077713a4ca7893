// Section text pipeline: prompt building, fetching with retry, and parsing
// the tag-annotated output into content blocks.
// All generation calls go through llm_client::TextGenerator.

pub mod fetch;
pub mod handlers;
pub mod prompts;
pub mod tags;
