mod source;
mod store;

pub use source::{default_sources, validate_amount, validate_source, CaffeineSource};
pub use store::HistoryStore;
