pub mod browser;
pub mod markdown;
pub mod traits;
pub mod types;

pub use browser::BrowserFetcher;
pub use traits::PageFetcher;
pub use types::{FetchRequest, RenderWait};
