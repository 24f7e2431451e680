mod backends;
mod connection;
mod schema;
mod traits;

pub use backends::LibSqlStore;
pub use connection::Database;
pub use traits::{is_valid_record_id, ScreenshotStore};
