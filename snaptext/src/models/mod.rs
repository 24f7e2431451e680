mod screenshot;

pub use screenshot::{ExtractionResult, NewScreenshot, ScreenshotRecord, StoreStats};
