//! Sequence deduplication within one generation pass.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::core::metadata::{Sequence, SequenceKey, Table};
use crate::dialect::DropObject;
use crate::error::Result;

use super::context::ScriptContext;

/// Sequences already referenced by a column visited in this pass.
#[derive(Debug, Default)]
pub struct SequenceCoverage {
    covered: HashSet<SequenceKey>,
}

impl SequenceCoverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every sequence referenced by the table's columns.
    ///
    /// Returns the sequences this table is the first to reference.
    pub fn cover_table<'t>(&mut self, table: &'t Table) -> Vec<&'t Sequence> {
        table
            .sequences()
            .filter(|seq| self.covered.insert(seq.key()))
            .collect()
    }

    pub fn is_covered(&self, sequence: &Sequence) -> bool {
        self.covered.contains(&sequence.key())
    }

    /// Sequences not referenced by any covered table, deduplicated by key in
    /// their original order.
    pub fn uncovered<'s>(
        &self,
        sequences: impl IntoIterator<Item = &'s Sequence>,
    ) -> Vec<&'s Sequence> {
        let mut seen = HashSet::new();
        sequences
            .into_iter()
            .filter(|seq| !self.is_covered(seq) && seen.insert(seq.key()))
            .collect()
    }
}

/// Drop and create statements for one sequence, per the requested script kinds.
pub fn sequence_scripts(ctx: &ScriptContext<'_>, sequence: &Sequence) -> Vec<String> {
    let qualified = ctx.sequence_name(sequence);
    let mut statements = Vec::with_capacity(2);
    if ctx.drops() {
        statements.push(ctx.dialect.drop_statement(DropObject::Sequence, &qualified, false));
    }
    if ctx.creates() {
        statements.push(ctx.dialect.create_sequence(&qualified, sequence));
    }
    statements
}

/// Scripts for the sequences of a generation root that no column of `tables`
/// references.
pub fn non_referenced_sequence_scripts<'a>(
    ctx: &ScriptContext<'_>,
    sequences: impl IntoIterator<Item = &'a Sequence>,
    tables: impl IntoIterator<Item = &'a Table>,
) -> Result<Vec<String>> {
    let mut coverage = SequenceCoverage::new();
    for table in tables {
        coverage.cover_table(table);
    }
    let uncovered = coverage.uncovered(sequences);
    if uncovered.is_empty() {
        return Ok(Vec::new());
    }
    if !ctx.dialect.supports_sequences() {
        warn!(
            "{} does not support sequences, skipping {} sequence(s)",
            ctx.dialect.name(),
            uncovered.len()
        );
        return Ok(Vec::new());
    }
    let mut statements = Vec::with_capacity(uncovered.len() * 2);
    for sequence in uncovered {
        debug!("Scripting sequence {}", sequence.name);
        statements.extend(sequence_scripts(ctx, sequence));
    }
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifier::IdentifierQuoting;
    use crate::core::metadata::{Column, Database, DatabaseInfo};
    use crate::core::types::codes;
    use crate::dialect::{vendors, Dialect};
    use crate::script::context::ScriptKind;

    fn postgres() -> Dialect {
        vendors::postgres(DatabaseInfo::new("PostgreSQL")).with_quoting(IdentifierQuoting::Always)
    }

    fn id_column(sequence: Option<Sequence>) -> Column {
        let column = Column::new("id", codes::INTEGER, "INTEGER");
        match sequence {
            Some(seq) => column.with_sequence(seq),
            None => column,
        }
    }

    #[test]
    fn test_table_with_unreferenced_schema_sequence() {
        let dialect = postgres();
        let ctx = ScriptContext::new(&dialect);
        let mut database = Database::new(None);
        let schema = database.schema_mut(None, Some("s3"));
        let seq1 = Sequence::new("seq1")
            .in_schema(None, Some("s3"))
            .owned_by("t1", "c1");
        let seq2 = Sequence::new("seq2").in_schema(None, Some("s3"));
        schema.add_sequence(seq1.clone());
        schema.add_sequence(seq2);
        let table = schema.add_table(Table::new("t1")).unwrap();
        table.add_column(id_column(Some(seq1))).unwrap();

        let schema = database.schema(None, Some("s3")).unwrap();
        let t1 = schema.table("t1").unwrap();
        let scripts =
            non_referenced_sequence_scripts(&ctx, schema.sequences(), std::iter::once(t1)).unwrap();
        assert_eq!(
            scripts,
            vec![
                "DROP SEQUENCE IF EXISTS \"seq2\"".to_string(),
                "CREATE SEQUENCE \"seq2\" NO MINVALUE NO MAXVALUE NO CYCLE".to_string(),
            ]
        );
    }

    #[test]
    fn test_table_referencing_its_only_sequence() {
        let dialect = postgres();
        let ctx = ScriptContext::new(&dialect);
        let seq3 = Sequence::new("seq3");
        let mut table = Table::new("t2");
        table.add_column(id_column(Some(seq3.clone()))).unwrap();

        let sequences = [seq3];
        let scripts =
            non_referenced_sequence_scripts(&ctx, sequences.iter(), std::iter::once(&table))
                .unwrap();
        assert!(scripts.is_empty());
    }

    #[test]
    fn test_schema_level_passes() {
        let dialect = postgres();
        let ctx = ScriptContext::new(&dialect);
        let mut database = Database::new(None);

        let schema1 = database.schema_mut(None, Some("schema1"));
        let seq1 = Sequence::new("seq1").in_schema(None, Some("schema1"));
        schema1.add_sequence(seq1.clone());
        schema1.add_sequence(Sequence::new("seq2").in_schema(None, Some("schema1")));
        schema1
            .add_table(Table::new("t1"))
            .unwrap()
            .add_column(id_column(Some(seq1)))
            .unwrap();

        let schema2 = database.schema_mut(None, Some("schema2"));
        schema2
            .add_table(Table::new("t2"))
            .unwrap()
            .add_column(id_column(None))
            .unwrap();
        schema2.add_sequence(Sequence::new("seq3").in_schema(None, Some("schema2")));
        schema2.add_sequence(Sequence::new("seq4").in_schema(None, Some("schema2")));

        // seq5 is owned by schema2 but listed under schema3 as well.
        let seq5 = Sequence::new("seq5").in_schema(None, Some("schema2"));
        let schema3 = database.schema_mut(None, Some("schema3"));
        schema3.add_sequence(seq5.clone());
        schema3
            .add_table(Table::new("t3"))
            .unwrap()
            .add_column(id_column(Some(seq5)))
            .unwrap();

        let run = |name: &str| {
            let schema = database.schema(None, Some(name)).unwrap();
            non_referenced_sequence_scripts(&ctx, schema.sequences(), schema.tables()).unwrap()
        };

        assert_eq!(
            run("schema1"),
            vec![
                "DROP SEQUENCE IF EXISTS \"seq2\"".to_string(),
                "CREATE SEQUENCE \"seq2\" NO MINVALUE NO MAXVALUE NO CYCLE".to_string(),
            ]
        );
        assert_eq!(
            run("schema2"),
            vec![
                "DROP SEQUENCE IF EXISTS \"seq3\"".to_string(),
                "CREATE SEQUENCE \"seq3\" NO MINVALUE NO MAXVALUE NO CYCLE".to_string(),
                "DROP SEQUENCE IF EXISTS \"seq4\"".to_string(),
                "CREATE SEQUENCE \"seq4\" NO MINVALUE NO MAXVALUE NO CYCLE".to_string(),
            ]
        );
        assert!(run("schema3").is_empty());
    }

    #[test]
    fn test_same_name_in_different_schemas_is_distinct() {
        let a = Sequence::new("seq").in_schema(None, Some("a"));
        let b = Sequence::new("seq").in_schema(None, Some("b"));
        let mut table = Table::new("t");
        table.add_column(id_column(Some(a.clone()))).unwrap();

        let mut coverage = SequenceCoverage::new();
        assert_eq!(coverage.cover_table(&table).len(), 1);
        assert!(coverage.cover_table(&table).is_empty());
        let uncovered = coverage.uncovered([&a, &b, &b]);
        assert_eq!(uncovered, vec![&b]);
    }

    #[test]
    fn test_unsupported_sequences_are_skipped() {
        let dialect = vendors::mysql(DatabaseInfo::new("MySQL"));
        let ctx = ScriptContext::new(&dialect);
        let sequences = [Sequence::new("orphan")];
        let tables: [Table; 0] = [];
        let scripts = non_referenced_sequence_scripts(&ctx, sequences.iter(), tables.iter()).unwrap();
        assert!(scripts.is_empty());
    }

    #[test]
    fn test_create_only() {
        let dialect = postgres();
        let ctx = ScriptContext::new(&dialect).with_script_kinds([ScriptKind::Create]);
        let mut seq = Sequence::new("orders_seq");
        seq.start_with = Some(100);
        assert_eq!(
            sequence_scripts(&ctx, &seq),
            vec!["CREATE SEQUENCE \"orders_seq\" START WITH 100 NO MINVALUE NO MAXVALUE NO CYCLE"]
        );
    }
}
