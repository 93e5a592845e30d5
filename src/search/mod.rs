//! Fluent query sessions over a search backend
//!
//! A [`QuerySession`] accumulates required and optional clauses, sorting,
//! field collapsing and a deadline, then runs exactly one terminal operation:
//!
//! - **search**: paginated bool query with sort and collapse
//! - **delete**: remove one document
//! - **bulk**: batch of index, update and delete operations
//! - **save**: create or fully replace one document
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              QuerySession                        │
//! ├─────────────────────────────────────────────────┤
//! │  - add_required()   - add_optional()            │
//! │  - set_sort()       - set_geo_distance_sort()   │
//! │  - set_collapse()   - set_timeout()             │
//! └─────────────────────────────────────────────────┘
//!                      │ compile()
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │              CompiledQuery                       │
//! ├─────────────────────────────────────────────────┤
//! │  - BoolQuery (must / should)                     │
//! │  - Sort, Collapse, Pagination                    │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │              SearchBackend                       │
//! ├─────────────────────────────────────────────────┤
//! │  - HttpBackend (cached, ping-checked)            │
//! │  - InMemoryBackend                               │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use es_query_session::config::EsConfig;
//! use es_query_session::search::{DistanceUnit, OptionalOptions, QuerySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EsConfig::load()?;
//!
//!     let response = QuerySession::connect(&config)
//!         .await?
//!         .add_required("city", vec!["Shenzhen"])
//!         .add_required("shop_id", vec![1, 2, 3])
//!         .add_optional("brand", "acme", OptionalOptions::weighted(2.0))
//!         .set_geo_distance_sort("location", "22.54,114.06", DistanceUnit::Kilometers, true)?
//!         .set_collapse("cheapest", "shop_id", 2)
//!         .search("products", 1, 20)
//!         .await?;
//!
//!     println!("Found {} hits", response.total_hits);
//!     Ok(())
//! }
//! ```

mod collapse;
mod pagination;
mod predicate;
mod query;
mod session;
mod sort;

pub use collapse::{CollapseSpec, InnerHit};
pub use pagination::{Pagination, DEFAULT_PAGE_SIZE};
pub use predicate::Predicate;
pub use query::{BoolQuery, CompiledQuery};
pub use session::{OptionalOptions, QuerySession};
pub use sort::{DistanceUnit, GeoPoint, SortOrder, SortSpec};
