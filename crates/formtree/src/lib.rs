//! formtree — a schema-driven CRUD form engine.
//!
//! ## Crate layout
//! - `core`: field trees, relationship resolution, async search,
//!   conditional visibility, the apply pipeline, and action dispatch.
//!
//! The `prelude` module mirrors the surface a host application uses to
//! declare resources and drive submissions.

pub use formtree_core as core;

pub use formtree_core::error::EngineError;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::core::{
        action::{HttpMethod, Surface},
        config::EngineConfig,
        routing::{Endpoints, Router},
        search::{AsyncSearchService, SearchRequest},
        storage::BlobStorage,
        store::RecordStore,
        translate::Translator,
        visibility,
        wire::AsyncCallback,
    };
}
