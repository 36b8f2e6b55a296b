//! # Forest Index
//!
//! A typed, persistable approximate nearest neighbor index.
//!
//! This library provides:
//! - A generic index over caller identifiers (`AnnoyIndex`)
//! - Angular, Euclidean, Manhattan and Hamming metrics
//! - A random-projection forest engine behind the `Engine` trait
//! - A directory format with pluggable identifier codecs
//!
//! ## Example
//!
//! ```rust
//! use forest_index::{AnnoyIndex, BuildOptions, IdentifiedVector, Metric, ParseCodec};
//!
//! let items = vec![
//!     IdentifiedVector::new(10, vec![1.0, 1.0]),
//!     IdentifiedVector::new(11, vec![2.0, 1.0]),
//!     IdentifiedVector::new(12, vec![2.0, 2.0]),
//! ];
//! let index: AnnoyIndex<i32> =
//!     AnnoyIndex::build(items, &BuildOptions::new(10, Metric::Euclidean)).unwrap();
//!
//! let nearest = index.query_by_identifier(&10, 2, None).unwrap().unwrap();
//! assert_eq!(nearest[0].id, 10);
//! assert_eq!(nearest[1].id, 11);
//!
//! let dir = std::env::temp_dir().join("forest-index-doctest");
//! index.save(&dir, &ParseCodec::<i32>::new()).unwrap();
//! let reloaded: AnnoyIndex<i32> = AnnoyIndex::load(&dir, &ParseCodec::<i32>::new()).unwrap();
//! assert_eq!(reloaded.identifiers(), index.identifiers());
//! # std::fs::remove_dir_all(&dir).ok();
//! ```

pub mod engine;
pub mod error;
pub mod forest;
pub mod index;
pub mod metric;
pub mod persistence;
pub mod vector;

pub use engine::{Engine, EngineHandle};
pub use error::{AnnoyError, Result};
pub use forest::{Forest, ForestParams};
pub use index::{AnnoyIndex, BuildOptions, Neighbor};
pub use metric::Metric;
pub use persistence::{IdentifierCodec, JsonCodec, ParseCodec, StringCodec};
pub use vector::IdentifiedVector;
