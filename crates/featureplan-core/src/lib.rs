//! # featureplan Core Library
//!
//! Definitions of features and the tables they live in, and the engine that
//! resolves them into a fully typed, fully keyed plan.
//!
//! Computation is delegated to a processor and storage to sinks; this crate
//! only describes *what* to compute and checks that the description holds
//! together.
//!
//! ## Key Components
//!
//! - **TableDescriptor**: a source, a feature view or a sink
//! - **FeatureView**: resolves a source and a list of features into a typed,
//!   keyed table
//! - **Feature / Transform**: named derivation rules (expression, window
//!   aggregations, join)
//! - **expr**: the expression language and its type evaluator
//! - **Errors**: strongly-typed error handling
//!
//! ## Example Usage
//!
//! ```rust
//! use featureplan_core::prelude::*;
//! use std::sync::Arc;
//!
//! let clicks = Source::kafka(
//!     "clicks",
//!     "localhost:9092",
//!     "clicks",
//!     "json",
//!     Schema::builder()
//!         .column("user_id", DataType::Int64)
//!         .column("price", DataType::Float32)
//!         .build(),
//! )
//! .with_keys(&["user_id"]);
//!
//! let view = FeatureView::builder("click_features")
//!     .source(clicks)
//!     .feature(Feature::expression("price_cents", "price * 100"))
//!     .build()?;
//!
//! let table = Arc::new(TableDescriptor::from(view));
//! assert!(!table.is_bounded()?);
//! assert!(table.get_bounded_view()?.is_bounded()?);
//! # Ok::<(), featureplan_core::Error>(())
//! ```

// Re-export commonly used types for convenience
pub use aggregation::AggFunc;
pub use error::{Error, Result};
pub use feature::Feature;
pub use feature_view::{derive_feature_dtype, FeatureView, FeatureViewBuilder};
pub use sink::{BlackHoleSink, FileSystemSink, KafkaSink, MySqlSink, PrintSink, Sink};
pub use source::Source;
pub use sync::recover_mutex;
pub use table::{FeatureRef, TableDescriptor, TableRef};
pub use transform::{
    ExpressionTransform, JoinTransform, OverWindowTransform, SlidingWindowTransform, Transform,
};
pub use types::{DataType, Field, Schema};

mod aggregation;
mod error;
pub mod expr;
mod feature;
mod feature_view;
mod sink;
mod source;
mod sync;
mod table;
mod transform;
mod types;

// Prelude module - commonly used imports
// Users can do `use featureplan_core::prelude::*` to get everything they need
pub mod prelude {
    pub use crate::aggregation::AggFunc;
    pub use crate::error::{Error, Result};
    pub use crate::feature::Feature;
    pub use crate::feature_view::FeatureView;
    pub use crate::sink::Sink;
    pub use crate::source::Source;
    pub use crate::table::{FeatureRef, TableDescriptor, TableRef};
    pub use crate::transform::{OverWindowTransform, SlidingWindowTransform, Transform};
    pub use crate::types::{DataType, Schema};
}
