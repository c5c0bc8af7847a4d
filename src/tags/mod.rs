//! Rewriting of the tag groups handed over by the document-assembly stage.
//!
//! Each submodule covers one policy so it can be tested on its own: element rewriting
//! (inline, async, defer, module), resource hints, and custom attributes. The pipeline
//! controller runs them in that order.

pub mod custom;
pub mod elements;
pub mod hints;

pub use custom::apply_custom_attributes;
pub use elements::{escape_inline_script, rewrite_elements};
pub use hints::ResourceHintGenerator;
