//! Statement renderers for one object at a time.

use crate::core::identifier::validate_check_constraint;
use crate::core::metadata::{Column, ForeignKey, Index, Table};
use crate::error::{MigrateError, Result};

use super::context::{ObjectKind, ScriptContext};

fn column_list(ctx: &ScriptContext<'_>, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| ctx.dialect.identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Column definition inside `CREATE TABLE`.
pub fn column_definition(
    ctx: &ScriptContext<'_>,
    table: &Table,
    column: &Column,
    sequence_name: Option<&str>,
) -> Result<String> {
    let dialect = ctx.dialect;
    let mut def = format!(
        "{} {}",
        dialect.identifier(&column.name),
        ctx.column_type(table, column)?
    );

    let identity = column.is_identity();
    if identity {
        def.push(' ');
        def.push_str(&dialect.identity_column_string(sequence_name));
    }

    if !column.nullable {
        def.push_str(" NOT NULL");
    } else if !dialect.null_column_string().is_empty() {
        def.push(' ');
        def.push_str(dialect.null_column_string());
    }

    if !identity {
        if let Some(default) = column
            .default_value
            .as_deref()
            .and_then(|d| dialect.default_value(column.type_code, d))
        {
            def.push_str(&format!(" DEFAULT {}", default));
        }
    }

    if let Some(comment) = column.comment.as_deref().and_then(|c| dialect.column_comment(c)) {
        def.push(' ');
        def.push_str(&comment);
    }
    Ok(def)
}

/// `CREATE TABLE` with inline primary key and check constraints.
///
/// `sequence_name` gives the rendered name of a column's backing sequence,
/// for dialects that name it in the identity clause.
pub fn create_table(
    ctx: &ScriptContext<'_>,
    table: &Table,
    sequence_name: impl Fn(&Column) -> Option<String>,
) -> Result<String> {
    let dialect = ctx.dialect;
    let mut parts = Vec::with_capacity(table.columns().len() + 2);
    for column in table.columns() {
        let seq = sequence_name(column);
        parts.push(column_definition(ctx, table, column, seq.as_deref())?);
    }

    if ctx.includes(ObjectKind::PrimaryKey) {
        if let Some(pk) = table.primary_key().filter(|pk| !pk.columns.is_empty()) {
            let constraint = match &pk.name {
                Some(name) => format!("CONSTRAINT {} ", dialect.identifier(name)),
                None => String::new(),
            };
            parts.push(format!(
                "{}PRIMARY KEY ({})",
                constraint,
                column_list(ctx, &pk.columns)
            ));
        }
    }

    if ctx.includes(ObjectKind::Check) && dialect.supports_table_check() {
        for check in table.checks() {
            validate_check_constraint(check)
                .map_err(|e| MigrateError::script(&table.name, e.to_string()))?;
            parts.push(dialect.table_check(check));
        }
    }

    if ctx.includes(ObjectKind::Index) && dialect.supports_index_in_create_table() {
        for index in table.indexes() {
            let keyword = if index.unique { "UNIQUE INDEX" } else { "INDEX" };
            parts.push(format!(
                "{} {} ({})",
                keyword,
                dialect.identifier(&index.name),
                column_list(ctx, &index.columns)
            ));
        }
    }

    let mut sql = format!("CREATE TABLE {} (", ctx.table_name(table));
    sql.push_str(&parts.join(", "));
    sql.push(')');
    if let Some(comment) = table.comment.as_deref().and_then(|c| dialect.table_comment(c)) {
        sql.push(' ');
        sql.push_str(&comment);
    }
    Ok(sql)
}

/// `COMMENT ON` statements for dialects without inline comments.
pub fn comment_statements(ctx: &ScriptContext<'_>, table: &Table) -> Vec<String> {
    let qualified = ctx.table_name(table);
    let mut statements = Vec::new();
    if let Some(sql) = table
        .comment
        .as_deref()
        .and_then(|c| ctx.dialect.comment_statement(&qualified, None, c))
    {
        statements.push(sql);
    }
    for column in table.columns() {
        if let Some(sql) = column
            .comment
            .as_deref()
            .and_then(|c| ctx.dialect.comment_statement(&qualified, Some(&column.name), c))
        {
            statements.push(sql);
        }
    }
    statements
}

pub fn create_index(ctx: &ScriptContext<'_>, table: &Table, index: &Index) -> String {
    let unique = if index.unique && ctx.dialect.supports_unique() {
        "UNIQUE "
    } else {
        ""
    };
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        unique,
        ctx.dialect.identifier(&index.name),
        ctx.table_name(table),
        column_list(ctx, &index.columns)
    )
}

pub fn add_foreign_key(ctx: &ScriptContext<'_>, table: &Table, fk: &ForeignKey) -> String {
    let dialect = ctx.dialect;
    let mut sql = format!("ALTER TABLE {} ADD ", ctx.table_name(table));
    if let Some(name) = &fk.name {
        sql.push_str(&format!("CONSTRAINT {} ", dialect.identifier(name)));
    }
    sql.push_str(&format!(
        "FOREIGN KEY ({}) REFERENCES {} ({})",
        column_list(ctx, &fk.foreign_columns),
        ctx.qualify(&fk.primary_table.table),
        column_list(ctx, &fk.primary_columns)
    ));
    if let Some(action) = dialect.delete_action(fk.on_delete) {
        sql.push(' ');
        sql.push_str(&action);
    }
    if let Some(action) = dialect.update_action(fk.on_update) {
        sql.push(' ');
        sql.push_str(&action);
    }
    sql
}

pub fn create_view(ctx: &ScriptContext<'_>, view: &Table) -> Result<String> {
    let definition = view
        .definition
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| MigrateError::script(&view.name, "view has no definition"))?;
    Ok(format!(
        "CREATE VIEW {} AS {}",
        ctx.table_name(view),
        definition.trim_end_matches(';')
    ))
}
