//! Timeline Module
//!
//! The timeline owns item identity. The subtitle model is a secondary index keyed by
//! time and reports every id/start change back through [`SubtitleRegistry`].

mod registry;

pub use registry::{SubtitleRegistry, TimelineRegistry};
