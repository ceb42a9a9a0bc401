//! PostgreSQL connections: pooling, schema introspection, row sources and
//! sinks, and script execution.

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::core::metadata::{
    Column, Database, DatabaseInfo, ForeignKey, Index, PrimaryKey, ReferenceAction, Sequence,
    Table, TableRef,
};
use crate::core::types::{codes, JdbcTypeDesc};
use crate::core::value::{Row, Value};
use crate::dialect::{Dialect, InsertKind, TypeRegistry};
use crate::error::{MigrateError, Result};
use crate::script::ScriptExporter;
use crate::transfer::{RowSink, RowSource, ValueCodec, ValueHandle};

use super::tls::make_tls_connect;

/// Product name reported for every PostgreSQL server.
pub const PRODUCT_NAME: &str = "PostgreSQL";

const CURSOR_NAME: &str = "migrate_cursor";

/// Rows per multi-row `INSERT`.
const ROWS_PER_STATEMENT: usize = 500;

/// Bind parameters the wire protocol allows in one statement.
const MAX_PARAMETERS: usize = u16::MAX as usize;

/// Pooled connections to one PostgreSQL database.
#[derive(Clone)]
pub struct PgConnection {
    pool: Pool,
    schema: String,
    describe: String,
}

impl PgConnection {
    /// Build a pool of at most `max_conns` connections and test it.
    pub async fn connect(config: &ConnectionConfig, max_conns: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.application_name("db-migrator");

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let describe = config.describe();

        let pool = match make_tls_connect(config.ssl_mode)? {
            None => {
                warn!("PostgreSQL TLS is disabled for {}", describe);
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr).max_size(max_conns.max(1)).build()
            }
            Some(tls) => {
                let mgr = Manager::from_config(pg_config, tls, mgr_config);
                Pool::builder(mgr).max_size(max_conns.max(1)).build()
            }
        }
        .map_err(|e| MigrateError::connectivity(e, format!("creating pool for {}", describe)))?;

        let connection = Self {
            pool,
            schema: config.schema.clone(),
            describe,
        };
        connection.test_connection().await?;
        info!("Connected to PostgreSQL: {}", connection.describe);
        Ok(connection)
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn describe(&self) -> &str {
        &self.describe
    }

    async fn client(&self, context: &str) -> Result<Object> {
        self.pool.get().await.map_err(|e| {
            MigrateError::connectivity(e, format!("{} on {}", context, self.describe))
        })
    }

    pub async fn test_connection(&self) -> Result<()> {
        let client = self.client("testing connection").await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    /// Product and version of the server.
    pub async fn database_info(&self) -> Result<DatabaseInfo> {
        let client = self.client("reading server version").await?;
        let row = client.query_one("SHOW server_version", &[]).await?;
        let version: String = row.get(0);
        Ok(parse_server_version(&version))
    }

    /// Read tables, views and sequences of the connection's schema.
    ///
    /// Vendor type names are mapped through `registry`'s native names; an
    /// unknown name is kept under the `OTHER` code.
    pub async fn introspect(
        &self,
        registry: &TypeRegistry,
        include: impl Fn(&str) -> bool,
    ) -> Result<Database> {
        let info = self.database_info().await?;
        let mut database = Database::new(Some(info));
        let sequences = self.load_sequences().await?;
        let schema_name = self.schema.clone();
        let schema = database.schema_mut(None, Some(&schema_name));
        for sequence in &sequences {
            schema.add_sequence(sequence.clone());
        }

        let client = self.client("listing tables").await?;
        let query = r#"
            SELECT t.table_name, t.table_type, v.view_definition,
                   obj_description(c.oid, 'pg_class')
            FROM information_schema.tables t
            JOIN pg_catalog.pg_namespace n ON n.nspname = t.table_schema
            JOIN pg_catalog.pg_class c ON c.relname = t.table_name AND c.relnamespace = n.oid
            LEFT JOIN information_schema.views v
              ON v.table_schema = t.table_schema AND v.table_name = t.table_name
            WHERE t.table_schema = $1
              AND t.table_type IN ('BASE TABLE', 'VIEW')
            ORDER BY t.table_type, t.table_name
        "#;
        let rows = client.query(query, &[&self.schema]).await?;
        drop(client);

        for row in rows {
            let name: String = row.get(0);
            if !include(&name) {
                debug!("Skipping {} (not included)", name);
                continue;
            }
            let table_type: String = row.get(1);
            let mut table = if table_type == "VIEW" {
                let definition: Option<String> = row.get(2);
                Table::view(&name, definition.unwrap_or_default().trim())
            } else {
                Table::new(&name)
            };
            table.comment = row.get(3);

            self.load_columns(&mut table, registry, &sequences).await?;
            if !table.is_view() {
                self.load_primary_key(&mut table).await?;
                self.load_indexes(&mut table).await?;
                self.load_foreign_keys(&mut table).await?;
                self.load_check_constraints(&mut table).await?;
            }
            schema.add_table(table)?;
        }

        info!(
            "Captured {} tables and {} sequences from schema '{}'",
            schema.tables().len(),
            schema.sequences().len(),
            self.schema
        );
        database.validate()?;
        Ok(database)
    }

    /// Sequences of the schema, excluding the internal ones behind identity
    /// columns.
    async fn load_sequences(&self) -> Result<Vec<Sequence>> {
        let client = self.client("loading sequences").await?;
        let query = r#"
            SELECT s.sequencename, s.start_value, s.increment_by, s.min_value,
                   s.max_value, s.cycle, s.cache_size, t.relname, a.attname
            FROM pg_catalog.pg_sequences s
            JOIN pg_catalog.pg_namespace n ON n.nspname = s.schemaname
            JOIN pg_catalog.pg_class c ON c.relname = s.sequencename AND c.relnamespace = n.oid
            LEFT JOIN pg_catalog.pg_depend d
              ON d.objid = c.oid
             AND d.classid = 'pg_catalog.pg_class'::regclass
             AND d.refclassid = 'pg_catalog.pg_class'::regclass
             AND d.deptype IN ('a', 'i')
            LEFT JOIN pg_catalog.pg_class t ON t.oid = d.refobjid
            LEFT JOIN pg_catalog.pg_attribute a
              ON a.attrelid = d.refobjid AND a.attnum = d.refobjsubid
            WHERE s.schemaname = $1
              AND (d.deptype IS NULL OR d.deptype = 'a')
            ORDER BY s.sequencename
        "#;
        let rows = client.query(query, &[&self.schema]).await?;

        let sequences: Vec<Sequence> = rows
            .iter()
            .map(|row| {
                let mut sequence = Sequence::new(row.get::<_, String>(0))
                    .in_schema(None, Some(&self.schema));
                sequence.start_with = row.get(1);
                sequence.increment_by = row.get(2);
                sequence.min_value = row.get(3);
                sequence.max_value = row.get(4);
                sequence.cycle = row.get(5);
                sequence.cache = row.get(6);
                let owner: (Option<String>, Option<String>) = (row.get(7), row.get(8));
                if let (Some(table), Some(column)) = owner {
                    sequence = sequence.owned_by(&table, &column);
                }
                sequence
            })
            .collect();

        debug!("Loaded {} sequences", sequences.len());
        Ok(sequences)
    }

    async fn load_columns(
        &self,
        table: &mut Table,
        registry: &TypeRegistry,
        sequences: &[Sequence],
    ) -> Result<()> {
        let client = self.client("loading columns").await?;
        let query = r#"
            SELECT
                c.column_name,
                c.udt_name,
                COALESCE(c.character_maximum_length, 0)::int4,
                COALESCE(c.numeric_precision, 0)::int4,
                COALESCE(c.numeric_scale, 0)::int4,
                c.is_nullable = 'YES',
                c.column_default,
                COALESCE(a.attidentity IN ('a', 'd'), false),
                c.ordinal_position::int4,
                col_description(a.attrelid, a.attnum)
            FROM information_schema.columns c
            JOIN pg_catalog.pg_namespace n ON n.nspname = c.table_schema
            JOIN pg_catalog.pg_class t ON t.relname = c.table_name AND t.relnamespace = n.oid
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attname = c.column_name
            WHERE c.table_schema = $1 AND c.table_name = $2
            ORDER BY c.ordinal_position
        "#;
        let rows = client.query(query, &[&self.schema, &table.name]).await?;

        for row in rows {
            let udt_name: String = row.get(1);
            let desc = native_desc(registry, &udt_name);
            let mut column = Column::new(
                row.get::<_, String>(0),
                desc.type_code,
                desc.type_name.unwrap_or_else(|| udt_name.to_uppercase()),
            );
            let length: i32 = row.get(2);
            if length > 0 {
                column.size = Some(length as u64);
            }
            if matches!(column.type_code, codes::NUMERIC | codes::DECIMAL) {
                let precision: i32 = row.get(3);
                if precision > 0 {
                    column.precision = Some(precision as u32);
                    column.scale = Some(row.get(4));
                }
            }
            column.nullable = row.get(5);
            column.auto_increment = row.get(7);
            column.position = row.get::<_, i32>(8) as u32;
            column.comment = row.get(9);

            let default_value: Option<String> = row.get(6);
            match default_value.as_deref().and_then(nextval_sequence) {
                Some(name) => {
                    match sequences.iter().find(|s| s.name.eq_ignore_ascii_case(name)) {
                        Some(sequence) => column.sequence = Some(sequence.clone()),
                        None => column.default_value = default_value.clone(),
                    }
                }
                None if !column.auto_increment => column.default_value = default_value,
                None => {}
            }
            table.add_column(column)?;
        }

        debug!("Loaded {} columns for {}", table.columns().len(), table.name);
        Ok(())
    }

    async fn load_primary_key(&self, table: &mut Table) -> Result<()> {
        let client = self.client("loading primary key").await?;
        let query = r#"
            SELECT c.conname,
                   array_agg(a.attname ORDER BY array_position(c.conkey, a.attnum))
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(c.conkey)
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'p'
            GROUP BY c.conname
        "#;
        if let Some(row) = client
            .query_opt(query, &[&self.schema, &table.name])
            .await?
        {
            table.set_primary_key(PrimaryKey {
                name: row.get(0),
                columns: row.get(1),
            })?;
        }
        Ok(())
    }

    async fn load_indexes(&self, table: &mut Table) -> Result<()> {
        let client = self.client("loading indexes").await?;
        // Expression indexes have a zero in indkey and no attribute to join.
        let query = r#"
            SELECT
                i.relname,
                ix.indisunique,
                array_agg(a.attname ORDER BY array_position(ix.indkey, a.attnum))
            FROM pg_catalog.pg_index ix
            JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
            JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE n.nspname = $1
              AND t.relname = $2
              AND NOT ix.indisprimary
              AND NOT (0 = ANY(ix.indkey::int2[]))
            GROUP BY i.relname, ix.indisunique
            ORDER BY i.relname
        "#;
        let rows = client.query(query, &[&self.schema, &table.name]).await?;
        for row in rows {
            table.add_index(Index {
                name: row.get(0),
                unique: row.get(1),
                columns: row.get(2),
            })?;
        }
        debug!("Loaded {} indexes for {}", table.indexes().len(), table.name);
        Ok(())
    }

    async fn load_foreign_keys(&self, table: &mut Table) -> Result<()> {
        let client = self.client("loading foreign keys").await?;
        let query = r#"
            SELECT
                c.conname,
                rn.nspname,
                rt.relname,
                array_agg(a.attname ORDER BY k.ord),
                array_agg(ra.attname ORDER BY k.ord),
                CASE c.confdeltype
                    WHEN 'r' THEN 'RESTRICT'
                    WHEN 'c' THEN 'CASCADE'
                    WHEN 'n' THEN 'SET_NULL'
                    WHEN 'd' THEN 'SET_DEFAULT'
                    ELSE 'NO_ACTION'
                END,
                CASE c.confupdtype
                    WHEN 'r' THEN 'RESTRICT'
                    WHEN 'c' THEN 'CASCADE'
                    WHEN 'n' THEN 'SET_NULL'
                    WHEN 'd' THEN 'SET_DEFAULT'
                    ELSE 'NO_ACTION'
                END
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
            JOIN pg_catalog.pg_namespace rn ON rn.oid = rt.relnamespace
            CROSS JOIN LATERAL unnest(c.conkey, c.confkey) WITH ORDINALITY AS k(col, refcol, ord)
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.col
            JOIN pg_catalog.pg_attribute ra ON ra.attrelid = rt.oid AND ra.attnum = k.refcol
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'f'
            GROUP BY c.conname, rn.nspname, rt.relname, c.confdeltype, c.confupdtype
            ORDER BY c.conname
        "#;
        let rows = client.query(query, &[&self.schema, &table.name]).await?;
        for row in rows {
            let ref_schema: String = row.get(1);
            let ref_table: String = row.get(2);
            let columns: Vec<String> = row.get(3);
            let ref_columns: Vec<String> = row.get(4);

            let mut fk = ForeignKey::new(TableRef::new(None, Some(&ref_schema), &ref_table))
                .named(row.get::<_, String>(0));
            for (foreign, primary) in columns.iter().zip(&ref_columns) {
                fk = fk.reference(primary, foreign);
            }
            fk.on_delete = action(row.get(5));
            fk.on_update = action(row.get(6));
            table.add_foreign_key(fk)?;
        }
        debug!(
            "Loaded {} foreign keys for {}",
            table.foreign_keys().len(),
            table.name
        );
        Ok(())
    }

    async fn load_check_constraints(&self, table: &mut Table) -> Result<()> {
        let client = self.client("loading check constraints").await?;
        let query = r#"
            SELECT pg_get_expr(c.conbin, c.conrelid)
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'c'
            ORDER BY c.conname
        "#;
        let rows = client.query(query, &[&self.schema, &table.name]).await?;
        for row in rows {
            let expression: String = row.get(0);
            table.add_check(expression);
        }
        Ok(())
    }

    /// Cursor over every row of `table`, decoded per handle.
    ///
    /// The connection is taken from the pool when the source is opened.
    pub fn row_source(
        &self,
        table: &Table,
        handles: Vec<ValueHandle>,
        fetch_size: usize,
        session_sql: Option<String>,
    ) -> PgRowSource {
        PgRowSource {
            pool: self.pool.clone(),
            table: table.name.clone(),
            query: select_query(&self.schema, &table.name, &handles),
            handles,
            fetch_size: fetch_size.max(1),
            session_sql,
            client: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Batched parameterized inserts into `table`, one transaction per commit.
    pub fn row_sink(
        &self,
        table: &Table,
        dialect: Arc<Dialect>,
        kind: InsertKind,
        session_sql: Option<String>,
    ) -> PgRowSink {
        PgRowSink {
            pool: self.pool.clone(),
            qualified: dialect.qualify(None, Some(&self.schema), &table.name),
            columns: table.columns().iter().map(|c| c.name.clone()).collect(),
            primary_key: table
                .primary_key()
                .map(|pk| pk.columns.clone())
                .unwrap_or_default(),
            dialect,
            kind,
            session_sql,
            client: None,
            pending: Vec::new(),
        }
    }

    /// Exporter executing each statement on this connection.
    pub fn exporter(&self) -> ConnectionExporter {
        ConnectionExporter {
            pool: self.pool.clone(),
            describe: self.describe.clone(),
            client: None,
            executed: 0,
        }
    }
}

/// Rows of one table read through a server-side cursor.
pub struct PgRowSource {
    pool: Pool,
    table: String,
    query: String,
    handles: Vec<ValueHandle>,
    fetch_size: usize,
    session_sql: Option<String>,
    client: Option<Object>,
    buffer: VecDeque<tokio_postgres::Row>,
    exhausted: bool,
}

impl PgRowSource {
    /// Decode one fetched row; the unit attaches the row ordinal.
    fn decode(&self, row: &tokio_postgres::Row) -> Result<Row> {
        self.handles
            .iter()
            .enumerate()
            .map(|(idx, handle)| {
                read_value(row, idx, handle.codec).map_err(|e| MigrateError::ValueTransfer {
                    table: self.table.clone(),
                    row: None,
                    column: Some(handle.column.clone()),
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl RowSource for PgRowSource {
    async fn open(&mut self) -> Result<()> {
        let client = self.pool.get().await.map_err(|e| {
            MigrateError::connectivity(e, format!("opening cursor for {}", self.table))
        })?;
        if let Some(sql) = &self.session_sql {
            client.batch_execute(sql).await?;
        }
        client
            .batch_execute(&format!(
                "BEGIN READ ONLY; DECLARE {} NO SCROLL CURSOR FOR {}",
                CURSOR_NAME, self.query
            ))
            .await?;
        debug!("{}: {}", self.table, self.query);
        self.client = Some(client);
        Ok(())
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.buffer.is_empty() && !self.exhausted {
            let client = self.client.as_ref().ok_or_else(|| {
                MigrateError::connectivity("cursor is not open", self.table.clone())
            })?;
            let rows = client
                .query(
                    &format!("FETCH {} FROM {}", self.fetch_size, CURSOR_NAME),
                    &[],
                )
                .await?;
            self.exhausted = rows.len() < self.fetch_size;
            self.buffer.extend(rows);
        }
        match self.buffer.pop_front() {
            Some(row) => self.decode(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.buffer.clear();
        if let Some(client) = self.client.take() {
            // Read-only work; rolling back also recovers an aborted transaction.
            client.batch_execute("ROLLBACK").await?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("postgres table {}", self.table)
    }
}

/// Rows of one table written as multi-row inserts with bound parameters.
pub struct PgRowSink {
    pool: Pool,
    qualified: String,
    columns: Vec<String>,
    primary_key: Vec<String>,
    dialect: Arc<Dialect>,
    kind: InsertKind,
    session_sql: Option<String>,
    client: Option<Object>,
    pending: Vec<Row>,
}

#[async_trait]
impl RowSink for PgRowSink {
    async fn open(&mut self) -> Result<()> {
        let client = self.pool.get().await.map_err(|e| {
            MigrateError::connectivity(e, format!("opening {} for writing", self.qualified))
        })?;
        if let Some(sql) = &self.session_sql {
            client.batch_execute(sql).await?;
        }
        self.client = Some(client);
        Ok(())
    }

    async fn write_row(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(MigrateError::transfer(
                self.qualified.clone(),
                format!("expected {} values, got {}", self.columns.len(), row.len()),
            ));
        }
        self.pending.push(row);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let client = self.client.as_mut().ok_or_else(|| {
            MigrateError::connectivity("sink is not open", self.qualified.clone())
        })?;
        let tx = client.transaction().await?;
        if self.columns.is_empty() {
            let sql = self.dialect.parameterized_insert(
                &self.qualified,
                &self.columns,
                &self.primary_key,
                0,
                self.kind,
            )?;
            for _ in &self.pending {
                tx.execute(sql.as_str(), &[]).await?;
            }
        } else {
            for chunk in self.pending.chunks(rows_per_statement(self.columns.len())) {
                let sql = self.dialect.parameterized_insert(
                    &self.qualified,
                    &self.columns,
                    &self.primary_key,
                    chunk.len(),
                    self.kind,
                )?;
                let values: Vec<PgParam<'_>> = chunk.iter().flatten().map(PgParam).collect();
                let params: Vec<&(dyn ToSql + Sync)> =
                    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
                tx.execute(sql.as_str(), &params).await?;
            }
        }
        tx.commit().await?;
        debug!("{}: committed {} rows", self.qualified, self.pending.len());
        self.pending.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            debug!(
                "{}: discarding {} uncommitted rows",
                self.qualified,
                self.pending.len()
            );
            self.pending.clear();
        }
        self.client = None;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("postgres table {}", self.qualified)
    }
}

/// Rows per statement, keeping the bind count under the protocol limit.
fn rows_per_statement(width: usize) -> usize {
    (MAX_PARAMETERS / width.max(1)).clamp(1, ROWS_PER_STATEMENT)
}

type BoxError = Box<dyn std::error::Error + Sync + Send>;

/// A [`Value`] bound as a statement parameter, encoded in binary for the
/// parameter type the server reports.
#[derive(Debug)]
struct PgParam<'a>(&'a Value);

fn is_text_type(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME)
}

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => match *ty {
                Type::INT2 | Type::INT4 | Type::INT8 => {
                    PgParam(&Value::Int(i64::from(*b))).to_sql(ty, out)
                }
                _ if is_text_type(ty) => b.to_string().to_sql(ty, out),
                _ => b.to_sql(ty, out),
            },
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                Type::BOOL => (*i != 0).to_sql(ty, out),
                _ if is_text_type(ty) => i.to_string().to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::NUMERIC => Decimal::try_from(*f)?.to_sql(ty, out),
                _ if is_text_type(ty) => f.to_string().to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            Value::Decimal(d) => match *ty {
                Type::FLOAT4 | Type::FLOAT8 => {
                    let f = d.to_f64().ok_or("decimal out of float range")?;
                    PgParam(&Value::Float(f)).to_sql(ty, out)
                }
                Type::INT2 | Type::INT4 | Type::INT8 if d.fract().is_zero() => {
                    let i = d.to_i64().ok_or("decimal out of bigint range")?;
                    PgParam(&Value::Int(i)).to_sql(ty, out)
                }
                _ if is_text_type(ty) => d.to_string().to_sql(ty, out),
                _ => d.to_sql(ty, out),
            },
            // Text-like types (json, xml, enum labels) share the UTF-8 wire form;
            // jsonb adds a version byte.
            Value::Text(s) => {
                if *ty == Type::JSONB {
                    out.put_u8(1);
                }
                out.extend_from_slice(s.as_bytes());
                Ok(IsNull::No)
            }
            Value::Bytes(b) => b.as_slice().to_sql(ty, out),
            Value::Uuid(u) if is_text_type(ty) => u.to_string().to_sql(ty, out),
            Value::Uuid(u) => u.to_sql(ty, out),
            Value::Date(d) => d.to_sql(ty, out),
            Value::Time(t) => t.to_sql(ty, out),
            Value::Timestamp(ts) => match *ty {
                Type::TIMESTAMPTZ => ts.and_utc().to_sql(ty, out),
                Type::DATE => ts.date().to_sql(ty, out),
                _ => ts.to_sql(ty, out),
            },
            Value::TimestampTz(ts) => match *ty {
                Type::TIMESTAMP => ts.naive_local().to_sql(ty, out),
                _ => ts.to_sql(ty, out),
            },
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Runs generated statements against a live target.
pub struct ConnectionExporter {
    pool: Pool,
    describe: String,
    client: Option<Object>,
    executed: usize,
}

#[async_trait]
impl ScriptExporter for ConnectionExporter {
    async fn open(&mut self) -> Result<()> {
        let client = self.pool.get().await.map_err(|e| {
            MigrateError::connectivity(e, format!("executing scripts on {}", self.describe))
        })?;
        self.client = Some(client);
        Ok(())
    }

    async fn write(&mut self, statement: &str) -> Result<()> {
        let client = self.client.as_ref().ok_or_else(|| {
            MigrateError::connectivity("exporter is not open", self.describe.clone())
        })?;
        client.batch_execute(statement).await.map_err(|e| {
            MigrateError::connectivity(e, format!("executing: {}", statement))
        })?;
        self.executed += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.client.take().is_some() {
            info!("Executed {} statements on {}", self.executed, self.describe);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("connection {}", self.describe)
    }
}

fn native_desc(registry: &TypeRegistry, udt_name: &str) -> JdbcTypeDesc {
    registry
        .native_type(udt_name)
        .cloned()
        .unwrap_or_else(|| JdbcTypeDesc::new(codes::OTHER, udt_name))
}

fn action(value: String) -> ReferenceAction {
    ReferenceAction::parse(&value).unwrap_or_default()
}

/// `16.2 (Debian 16.2-1)` → PostgreSQL 16.2
fn parse_server_version(version: &str) -> DatabaseInfo {
    let number = version.split_whitespace().next().unwrap_or_default();
    let mut parts = number
        .split(|c: char| !c.is_ascii_digit())
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u32>().ok());
    let info = match (parts.next().flatten(), parts.next().flatten()) {
        (Some(major), minor) => {
            DatabaseInfo::new(PRODUCT_NAME).with_version(major, minor.unwrap_or(0))
        }
        (None, _) => DatabaseInfo::new(PRODUCT_NAME),
    };
    DatabaseInfo {
        product_version: Some(version.to_string()),
        ..info
    }
}

/// Sequence named by a `nextval('...'::regclass)` default.
fn nextval_sequence(default_value: &str) -> Option<&str> {
    let rest = default_value.trim().strip_prefix("nextval('")?;
    let name = &rest[..rest.find('\'')?];
    let name = name.rsplit('.').next().unwrap_or(name);
    Some(name.trim_matches('"'))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Server-side cast giving each codec exactly one wire type.
fn cast_for(codec: ValueCodec) -> &'static str {
    match codec {
        ValueCodec::Bool => "bool",
        ValueCodec::Int => "int8",
        ValueCodec::Float => "float8",
        ValueCodec::Decimal => "numeric",
        ValueCodec::Text => "text",
        ValueCodec::Bytes => "bytea",
        ValueCodec::Uuid => "uuid",
        ValueCodec::Date => "date",
        ValueCodec::Time => "time",
        ValueCodec::Timestamp => "timestamp",
        ValueCodec::TimestampTz => "timestamptz",
    }
}

fn select_query(schema: &str, table: &str, handles: &[ValueHandle]) -> String {
    let columns: Vec<String> = handles
        .iter()
        .map(|h| format!("{}::{}", quote_ident(&h.column), cast_for(h.codec)))
        .collect();
    let list = if columns.is_empty() {
        "1".to_string()
    } else {
        columns.join(", ")
    };
    format!(
        "SELECT {} FROM {}.{}",
        list,
        quote_ident(schema),
        quote_ident(table)
    )
}

fn read_value(
    row: &tokio_postgres::Row,
    idx: usize,
    codec: ValueCodec,
) -> std::result::Result<Value, tokio_postgres::Error> {
    fn map<T>(value: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
        value.map(f).unwrap_or(Value::Null)
    }
    Ok(match codec {
        ValueCodec::Bool => map(row.try_get::<_, Option<bool>>(idx)?, Value::Bool),
        ValueCodec::Int => map(row.try_get::<_, Option<i64>>(idx)?, Value::Int),
        ValueCodec::Float => map(row.try_get::<_, Option<f64>>(idx)?, Value::Float),
        ValueCodec::Decimal => map(row.try_get::<_, Option<Decimal>>(idx)?, Value::Decimal),
        ValueCodec::Text => map(row.try_get::<_, Option<String>>(idx)?, Value::Text),
        ValueCodec::Bytes => map(row.try_get::<_, Option<Vec<u8>>>(idx)?, Value::Bytes),
        ValueCodec::Uuid => map(row.try_get::<_, Option<Uuid>>(idx)?, Value::Uuid),
        ValueCodec::Date => map(row.try_get::<_, Option<NaiveDate>>(idx)?, Value::Date),
        ValueCodec::Time => map(row.try_get::<_, Option<NaiveTime>>(idx)?, Value::Time),
        ValueCodec::Timestamp => {
            map(row.try_get::<_, Option<NaiveDateTime>>(idx)?, Value::Timestamp)
        }
        ValueCodec::TimestampTz => map(
            row.try_get::<_, Option<DateTime<FixedOffset>>>(idx)?,
            Value::TimestampTz,
        ),
    })
}
