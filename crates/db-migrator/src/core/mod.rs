//! Core model shared by every subsystem: type descriptors, identifiers,
//! the metadata graph, its persisted document form and row values.

pub mod document;
pub mod identifier;
pub mod metadata;
pub mod types;
pub mod value;

pub use document::SchemaDocument;
pub use identifier::{IdentifierCase, IdentifierNormalizer, IdentifierQuoting};
pub use metadata::{
    Catalog, Column, Database, DatabaseInfo, ForeignKey, Index, PrimaryKey, ReferenceAction,
    Schema, Sequence, SequenceKey, Table, TableEntry, TableRef, TableType,
};
pub use types::{codes, JdbcType, JdbcTypeDesc, SizeSpec};
pub use value::{Row, Value};
