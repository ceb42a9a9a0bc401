//! Settings shared by one script generation pass.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::metadata::{Column, DatabaseInfo, Sequence, Table};
use crate::dialect::Dialect;
use crate::error::Result;

/// Kinds of schema objects a pass can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Table,
    PrimaryKey,
    Index,
    ForeignKey,
    Sequence,
    View,
    Check,
}

impl ObjectKind {
    pub fn all() -> Vec<ObjectKind> {
        vec![
            ObjectKind::Table,
            ObjectKind::PrimaryKey,
            ObjectKind::Index,
            ObjectKind::ForeignKey,
            ObjectKind::Sequence,
            ObjectKind::View,
            ObjectKind::Check,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    Drop,
    Create,
}

/// How statements of one table are grouped in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupScriptsBy {
    /// Each table followed by its indexes.
    #[default]
    Table,
    /// All tables, then all indexes.
    MetaDataType,
}

/// Target dialect and options of a generation pass.
#[derive(Debug, Clone)]
pub struct ScriptContext<'a> {
    pub dialect: &'a Dialect,
    /// Dialect the metadata was read with, used for alias resolution.
    pub source: Option<&'a Dialect>,
    pub source_info: Option<DatabaseInfo>,
    pub object_kinds: HashSet<ObjectKind>,
    pub script_kinds: HashSet<ScriptKind>,
    pub group_scripts_by: GroupScriptsBy,
    /// Catalog every generated name is qualified with.
    pub target_catalog: Option<String>,
    /// Schema every generated name is qualified with.
    pub target_schema: Option<String>,
}

impl<'a> ScriptContext<'a> {
    /// Create and drop every object kind, grouped by table, unqualified.
    pub fn new(dialect: &'a Dialect) -> Self {
        Self {
            dialect,
            source: None,
            source_info: None,
            object_kinds: ObjectKind::all().into_iter().collect(),
            script_kinds: [ScriptKind::Drop, ScriptKind::Create].into_iter().collect(),
            group_scripts_by: GroupScriptsBy::default(),
            target_catalog: None,
            target_schema: None,
        }
    }

    pub fn with_source(mut self, source: Option<&'a Dialect>, info: Option<DatabaseInfo>) -> Self {
        self.source = source;
        self.source_info = info;
        self
    }

    pub fn with_object_kinds(mut self, kinds: impl IntoIterator<Item = ObjectKind>) -> Self {
        self.object_kinds = kinds.into_iter().collect();
        self
    }

    pub fn with_script_kinds(mut self, kinds: impl IntoIterator<Item = ScriptKind>) -> Self {
        self.script_kinds = kinds.into_iter().collect();
        self
    }

    pub fn with_group_scripts_by(mut self, group: GroupScriptsBy) -> Self {
        self.group_scripts_by = group;
        self
    }

    pub fn with_target(mut self, catalog: Option<String>, schema: Option<String>) -> Self {
        self.target_catalog = catalog;
        self.target_schema = schema;
        self
    }

    pub fn includes(&self, kind: ObjectKind) -> bool {
        self.object_kinds.contains(&kind)
    }

    pub fn drops(&self) -> bool {
        self.script_kinds.contains(&ScriptKind::Drop)
    }

    pub fn creates(&self) -> bool {
        self.script_kinds.contains(&ScriptKind::Create)
    }

    /// Name qualified with the target catalog and schema, if configured.
    pub fn qualify(&self, name: &str) -> String {
        self.dialect.qualify(
            self.target_catalog.as_deref(),
            self.target_schema.as_deref(),
            name,
        )
    }

    pub fn table_name(&self, table: &Table) -> String {
        self.qualify(&table.name)
    }

    pub fn sequence_name(&self, sequence: &Sequence) -> String {
        self.qualify(&sequence.name)
    }

    pub fn column_type(&self, table: &Table, column: &Column) -> Result<String> {
        self.dialect
            .column_type_name(self.source, self.source_info.as_ref(), &table.name, column)
    }
}
