//! DDL script generation and export.
//!
//! [`generate`] turns a metadata subtree into an ordered statement list for
//! one target dialect; [`export_scripts`] streams that list through a
//! [`ScriptExporter`].

pub mod context;
pub mod exporter;
pub mod generator;
pub mod render;
pub mod sequence;

pub use context::{GroupScriptsBy, ObjectKind, ScriptContext, ScriptKind};
pub use exporter::{
    export_scripts, CompositeExporter, FileExporter, ScriptExporter, StdoutExporter,
};
pub use generator::{generate, GeneratedScripts, GenerationScope};
pub use sequence::{non_referenced_sequence_scripts, SequenceCoverage};
