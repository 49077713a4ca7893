pub mod content;
pub mod report;
