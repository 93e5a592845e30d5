pub mod bulk;
pub mod search;

pub use bulk::*;
pub use search::*;
