use serde::{Deserialize, Serialize};

use crate::assets::AssetRef;

/// Atomic styled text run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub bold: bool,
}

impl TextSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

/// One typed unit of narrative content, in the order it is drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ContentBlock {
    Heading(String),
    Subheading(String),
    BulletItem(Vec<TextSpan>),
    Paragraph(String),
}

impl ContentBlock {
    /// True when the block has no renderable characters and must be skipped.
    pub fn is_blank(&self) -> bool {
        match self {
            ContentBlock::Heading(text)
            | ContentBlock::Subheading(text)
            | ContentBlock::Paragraph(text) => text.trim().is_empty(),
            ContentBlock::BulletItem(spans) => spans.iter().all(|s| s.text.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnAlign {
    #[default]
    Left,
    Right,
}

/// Tabular data drawn by the table renderer. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    #[serde(default)]
    pub caption: Option<String>,
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    /// Missing entries default to left alignment.
    #[serde(default)]
    pub column_align: Vec<ColumnAlign>,
    /// Optional cap on data rows per page, on top of the overflow test.
    #[serde(default)]
    pub rows_per_page: Option<usize>,
}

impl TableSpec {
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
            .max(1)
    }

    pub fn align(&self, column: usize) -> ColumnAlign {
        self.column_align.get(column).copied().unwrap_or_default()
    }
}

/// A chart or illustration to embed below a section title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    pub source: AssetRef,
    pub max_width: f32,
    pub max_height: f32,
}
