//! Core engine for formtree: typed field trees, relationship resolution,
//! async option search, conditional visibility, the apply pipeline, and the
//! action-dispatch surface, plus the ergonomics exported via the `prelude`.
#![warn(unreachable_pub)]

pub mod action;
pub mod apply;
pub mod config;
pub mod context;
pub mod error;
pub mod field;
pub mod record;
pub mod routing;
pub mod search;
pub mod storage;
pub mod store;
pub mod translate;
pub mod tree;
pub mod value;
pub mod visibility;
pub mod wire;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, stores, routers, or wire helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        action::ActionButton,
        apply::ApplyPipeline,
        context::FormContext,
        field::{
            Field, FieldKind,
            file::FileSettings,
            relation::{MorphMap, Relationship, SearchSource},
            select::SelectOptions,
        },
        record::{Record, Related},
        tree::{FieldId, FieldTree},
        value::Value,
    };
}
