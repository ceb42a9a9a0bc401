//! Dependency-ordered DDL for a subset of the metadata model.
//!
//! A pass collects the tables, views and sequences under its root, orders
//! tables so that referenced tables come first, then renders drops followed
//! by creates. Failures of a single object are collected and the pass moves
//! on to its siblings.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::core::metadata::{Database, Sequence, TableEntry, TableRef};
use crate::dialect::DropObject;
use crate::error::{MigrateError, Result};

use super::context::{GroupScriptsBy, ObjectKind, ScriptContext};
use super::render;
use super::sequence::{non_referenced_sequence_scripts, sequence_scripts, SequenceCoverage};

/// Root object of one generation pass.
#[derive(Debug, Clone, Copy)]
pub enum GenerationScope<'a> {
    Database,
    Schema {
        catalog: Option<&'a str>,
        schema: Option<&'a str>,
    },
    Table(&'a TableRef),
}

/// Statements in execution order plus the errors collected on the way.
#[derive(Debug, Default)]
pub struct GeneratedScripts {
    pub statements: Vec<String>,
    pub errors: Vec<MigrateError>,
}

impl GeneratedScripts {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

struct Collected<'d> {
    tables: Vec<TableEntry<'d>>,
    views: Vec<TableEntry<'d>>,
    sequences: Vec<&'d Sequence>,
}

fn collect<'d>(database: &'d Database, scope: GenerationScope<'_>) -> Result<Collected<'d>> {
    let entries: Vec<TableEntry<'d>> = match scope {
        GenerationScope::Database => database.tables().collect(),
        GenerationScope::Schema { catalog, schema } => {
            if database.schema(catalog, schema).is_none() {
                return Err(MigrateError::Metadata(format!(
                    "Schema {} not found",
                    schema.unwrap_or("<default>")
                )));
            }
            database
                .tables()
                .filter(|e| same_part(e.catalog, catalog) && same_part(e.schema, schema))
                .collect()
        }
        GenerationScope::Table(table_ref) => {
            let entry = database.find_table(table_ref).ok_or_else(|| {
                MigrateError::Metadata(format!("Table {} not found", table_ref))
            })?;
            vec![entry]
        }
    };

    // Sequences of every namespace the root touches.
    let mut namespaces: Vec<(Option<&str>, Option<&str>)> = Vec::new();
    match scope {
        GenerationScope::Database => {
            for catalog in database.catalogs() {
                for schema in catalog.schemas() {
                    namespaces.push((catalog.name.as_deref(), schema.name.as_deref()));
                }
            }
        }
        GenerationScope::Schema { catalog, schema } => namespaces.push((catalog, schema)),
        GenerationScope::Table(_) => {
            namespaces.extend(entries.iter().map(|e| (e.catalog, e.schema)));
        }
    }
    let sequences = namespaces
        .into_iter()
        .filter_map(|(catalog, schema)| database.schema(catalog, schema))
        .flat_map(|schema| schema.sequences().iter())
        .collect();

    let (views, tables): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.table.is_view());
    Ok(Collected {
        tables,
        views,
        sequences,
    })
}

fn same_part(actual: Option<&str>, expected: Option<&str>) -> bool {
    match (actual, expected) {
        (Some(a), Some(e)) => a.eq_ignore_ascii_case(e),
        (None, None) => true,
        _ => false,
    }
}

/// Order tables so that every table follows the tables its foreign keys
/// reference. Declaration order is kept otherwise, and cycles are broken at
/// the edge that closes them.
fn order_tables<'d>(tables: &[TableEntry<'d>]) -> Vec<TableEntry<'d>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Visiting,
        Done,
    }

    fn visit<'d>(
        idx: usize,
        tables: &[TableEntry<'d>],
        marks: &mut [Mark],
        ordered: &mut Vec<TableEntry<'d>>,
    ) {
        if marks[idx] != Mark::New {
            return;
        }
        marks[idx] = Mark::Visiting;
        let table = tables[idx];
        for fk in table.table.foreign_keys() {
            let target = tables.iter().position(|t| {
                fk.primary_table.matches(t.catalog, t.schema, &t.table.name)
            });
            match target {
                Some(target) if target != idx => {
                    if marks[target] == Mark::Visiting {
                        debug!(
                            "Foreign key cycle between {} and {}",
                            table.table_ref(),
                            fk.primary_table
                        );
                    }
                    visit(target, tables, marks, ordered);
                }
                _ => {}
            }
        }
        marks[idx] = Mark::Done;
        ordered.push(table);
    }

    let mut marks = vec![Mark::New; tables.len()];
    let mut ordered = Vec::with_capacity(tables.len());
    for idx in 0..tables.len() {
        visit(idx, tables, &mut marks, &mut ordered);
    }
    ordered
}

/// Generate drop and create statements for `scope` under `ctx`.
pub fn generate(
    ctx: &ScriptContext<'_>,
    database: &Database,
    scope: GenerationScope<'_>,
) -> Result<GeneratedScripts> {
    let collected = collect(database, scope)?;
    let tables = order_tables(&collected.tables);
    info!(
        "Generating {} scripts: {} tables, {} views, {} sequences",
        ctx.dialect.name(),
        tables.len(),
        collected.views.len(),
        collected.sequences.len()
    );

    let mut out = GeneratedScripts::default();
    if ctx.drops() {
        drop_phase(ctx, &tables, &collected.views, &mut out);
    }
    if ctx.creates() {
        create_phase(ctx, &tables, &collected, &mut out);
    } else if ctx.includes(ObjectKind::Sequence) {
        // Sequences named by identity columns still need their drops.
        if named_sequences(ctx) {
            let mut coverage = SequenceCoverage::new();
            for entry in &tables {
                for sequence in coverage.cover_table(entry.table) {
                    out.statements.extend(sequence_scripts(ctx, sequence));
                }
            }
        }
        let all = collected.tables.iter().map(|e| e.table);
        match non_referenced_sequence_scripts(ctx, collected.sequences.iter().copied(), all) {
            Ok(statements) => out.statements.extend(statements),
            Err(e) => out.errors.push(e),
        }
    }

    if out.has_errors() {
        warn!(
            "Generated {} statements with {} errors",
            out.statements.len(),
            out.errors.len()
        );
    } else {
        info!("Generated {} statements", out.statements.len());
    }
    Ok(out)
}

fn drop_phase(
    ctx: &ScriptContext<'_>,
    tables: &[TableEntry<'_>],
    views: &[TableEntry<'_>],
    out: &mut GeneratedScripts,
) {
    let dialect = ctx.dialect;
    if ctx.includes(ObjectKind::View) {
        for view in views.iter().rev() {
            out.statements.push(dialect.drop_statement(
                DropObject::View,
                &ctx.table_name(view.table),
                false,
            ));
        }
    }
    if !ctx.includes(ObjectKind::Table) {
        return;
    }
    if dialect.drop_constraints() && ctx.includes(ObjectKind::ForeignKey) {
        for entry in tables {
            let qualified = ctx.table_name(entry.table);
            for fk in entry.table.foreign_keys() {
                if let Some(name) = &fk.name {
                    out.statements.push(dialect.drop_foreign_key(&qualified, name));
                }
            }
        }
    }
    for entry in tables.iter().rev() {
        out.statements.push(dialect.drop_statement(
            DropObject::Table,
            &ctx.table_name(entry.table),
            true,
        ));
    }
}

/// Whether identity columns name their sequence, which then has to be
/// scripted alongside the table.
fn named_sequences(ctx: &ScriptContext<'_>) -> bool {
    ctx.dialect.syntax().identity_names_sequence
        && ctx.dialect.supports_sequences()
        && ctx.includes(ObjectKind::Sequence)
}

fn create_phase(
    ctx: &ScriptContext<'_>,
    tables: &[TableEntry<'_>],
    collected: &Collected<'_>,
    out: &mut GeneratedScripts,
) {
    let dialect = ctx.dialect;
    let named_sequences = named_sequences(ctx);
    let mut coverage = SequenceCoverage::new();
    let mut failed: HashSet<String> = HashSet::new();
    let mut deferred_indexes = Vec::new();

    for entry in tables {
        let table = entry.table;
        let first_refs = coverage.cover_table(table);
        if named_sequences {
            for sequence in first_refs {
                out.statements.extend(sequence_scripts(ctx, sequence));
            }
        }
        if !ctx.includes(ObjectKind::Table) {
            continue;
        }

        let created = render::create_table(ctx, table, |column| {
            column
                .sequence
                .as_ref()
                .filter(|_| named_sequences)
                .map(|seq| ctx.sequence_name(seq))
        });
        match created {
            Ok(sql) => {
                debug!("Scripted table {}", entry.table_ref());
                out.statements.push(sql);
                out.statements.extend(render::comment_statements(ctx, table));
            }
            Err(e) => {
                warn!("Skipping table {}: {}", entry.table_ref(), e);
                failed.insert(table_key(&entry.table_ref()));
                out.errors.push(e);
                continue;
            }
        }

        if ctx.includes(ObjectKind::Index) && !dialect.supports_index_in_create_table() {
            let indexes = table
                .indexes()
                .iter()
                .map(|index| render::create_index(ctx, table, index));
            match ctx.group_scripts_by {
                GroupScriptsBy::Table => out.statements.extend(indexes),
                GroupScriptsBy::MetaDataType => deferred_indexes.extend(indexes),
            }
        }
    }
    out.statements.append(&mut deferred_indexes);

    if ctx.includes(ObjectKind::Table) && ctx.includes(ObjectKind::ForeignKey) {
        foreign_key_pass(ctx, tables, &failed, out);
    }

    if ctx.includes(ObjectKind::View) {
        for view in &collected.views {
            match render::create_view(ctx, view.table) {
                Ok(sql) => out.statements.push(sql),
                Err(e) => {
                    warn!("Skipping view {}: {}", view.table_ref(), e);
                    out.errors.push(e);
                }
            }
        }
    }

    if ctx.includes(ObjectKind::Sequence) {
        let all = collected.tables.iter().map(|e| e.table);
        match non_referenced_sequence_scripts(ctx, collected.sequences.iter().copied(), all) {
            Ok(statements) => out.statements.extend(statements),
            Err(e) => out.errors.push(e),
        }
    }
}

fn table_key(table: &TableRef) -> String {
    table.to_string().to_lowercase()
}

/// `ALTER TABLE ... ADD FOREIGN KEY` for every table of this pass. A key
/// whose referenced table is not part of the pass is a script error.
fn foreign_key_pass(
    ctx: &ScriptContext<'_>,
    tables: &[TableEntry<'_>],
    failed: &HashSet<String>,
    out: &mut GeneratedScripts,
) {
    for entry in tables {
        if failed.contains(&table_key(&entry.table_ref())) {
            continue;
        }
        for fk in entry.table.foreign_keys() {
            let target = tables
                .iter()
                .find(|t| fk.primary_table.matches(t.catalog, t.schema, &t.table.name));
            let Some(target) = target else {
                out.errors.push(MigrateError::script(
                    entry.table_ref().to_string(),
                    format!(
                        "foreign key {} references {}, which is not generated in this pass",
                        fk.name.as_deref().unwrap_or("<unnamed>"),
                        fk.primary_table
                    ),
                ));
                continue;
            };
            if failed.contains(&table_key(&target.table_ref())) {
                warn!(
                    "Skipping foreign key on {}: referenced table {} was not created",
                    entry.table_ref(),
                    target.table_ref()
                );
                continue;
            }
            out.statements.push(render::add_foreign_key(ctx, entry.table, fk));
        }
    }
}
