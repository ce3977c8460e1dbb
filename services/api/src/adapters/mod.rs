pub mod db;
pub mod feed;
pub mod memory;

pub use db::DbAdapter;
pub use feed::{Change, ChangeFeed};
pub use memory::InMemoryStore;
