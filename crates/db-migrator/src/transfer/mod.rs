//! Typed row transfer between live connections and external formats.

pub mod binary;
pub mod codec;
pub mod csv;
pub mod file;
pub mod format;
pub mod handle;
pub mod runner;
pub mod unit;

pub use codec::{CodecRegistry, ValueCodec};
pub use file::{table_file, FileRowSink, FileRowSource};
pub use format::{FormatCodec, FormatOptions, FormatRegistry, RowCodec, RowResult};
pub use handle::{bind_input, ValueHandle};
pub use runner::{run_units, ReportedError, TransferOptions, TransferReport};
pub use unit::{
    run_unit, CommitPolicy, ErrorPolicy, RowSink, RowSource, TransferUnit, UnitReport, UnitStatus,
};
