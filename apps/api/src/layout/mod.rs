// Paginated composition engine.
// Renderers share one PageWriter; the cursor enforces the overflow invariant,
// the chrome decorates every page break, and the registry feeds the TOC.
// Everything here is synchronous: callers run it inside tokio::task::spawn_blocking.

pub mod blocks;
pub mod chrome;
pub mod cursor;
pub mod font_metrics;
pub mod image;
pub mod surface;
pub mod table;
pub mod text;
pub mod toc;

// Re-export the public API consumed by the render pipeline and handlers.
pub use chrome::Chrome;
pub use cursor::{PageCursor, PageKind, PageWriter};
pub use font_metrics::{default_page_config, FontStyle, PageConfig};
pub use surface::{DecodedImage, RecordingSurface, Surface, SurfaceError};
pub use toc::{SectionRegistry, TocRow};

use surface::Color;

pub const INK: Color = [0.12, 0.12, 0.16];
pub const MUTED: Color = [0.45, 0.45, 0.50];
pub const RULE: Color = [0.62, 0.55, 0.40];
pub const ACCENT: Color = [0.29, 0.20, 0.45];
pub const BAND: Color = [0.94, 0.92, 0.97];
pub const WHITE: Color = [1.0, 1.0, 1.0];
