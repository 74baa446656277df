//! Auxiliary `information_schema` connection used to resolve column
//! metadata and to probe whether the server that wrote a binlog had
//! `binlog_checksum=CRC32` enabled (spec.md section 4.4).

use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, Row};

use crate::errors::MetadataError;
use crate::schema::ColumnDescriptor;

/// MySQL error codes that mean "the connection died out from under us" --
/// transient from the resolver's point of view, worth one reconnect/retry.
const MYSQL_EXPECTED_ERROR_CODES: [u16; 2] = [2013, 2006];

/// Connection parameters for the auxiliary metadata connection. Mirrors
/// `ctl_connection_settings` from spec.md section 6.
#[derive(Debug, Clone)]
pub struct MetadataSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub charset: String,
}

impl MetadataSettings {
    pub fn new<S: Into<String>>(host: S, user: S) -> Self {
        MetadataSettings {
            host: host.into(),
            port: 3306,
            user: user.into(),
            password: None,
            // the original reader defaults ctl_connection_settings to
            // utf8mb4 when the caller doesn't specify a charset
            charset: "utf8mb4".to_owned(),
        }
    }

    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Resolves table column metadata and probes checksum configuration
/// against a single, lazily-established `information_schema` connection.
///
/// Ownership: exclusive to one reader (spec.md section 5); not `Clone`,
/// not shared across walkers.
pub struct MetadataResolver {
    settings: MetadataSettings,
    conn: Option<Conn>,
    ignore_virtual_columns: bool,
}

impl MetadataResolver {
    pub fn new(settings: MetadataSettings, ignore_virtual_columns: bool) -> Self {
        MetadataResolver {
            settings,
            conn: None,
            ignore_virtual_columns,
        }
    }

    fn connect(&mut self) -> Result<(), MetadataError> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(self.settings.host.clone()))
            .tcp_port(self.settings.port)
            .user(Some(self.settings.user.clone()))
            .pass(self.settings.password.clone())
            .db_name(Some("information_schema".to_owned()))
            .init(vec![format!("SET NAMES '{}'", self.settings.charset)]);
        self.conn = Some(Conn::new(opts)?);
        Ok(())
    }

    fn ensure_connected(&mut self) -> Result<(), MetadataError> {
        if self.conn.is_none() {
            self.connect()?;
        }
        Ok(())
    }

    /// Best-effort capability probe: true iff `BINLOG_CHECKSUM` exists and
    /// is not `NONE`. Any error is swallowed and reported as `false`
    /// (spec.md section 4.4) -- this is not a hard dependency.
    pub fn checksum_enabled(&mut self) -> bool {
        match self.try_checksum_enabled() {
            Ok(v) => v,
            Err(e) => {
                log::warn!("could not probe BINLOG_CHECKSUM, assuming disabled: {}", e);
                false
            }
        }
    }

    fn try_checksum_enabled(&mut self) -> Result<bool, MetadataError> {
        self.ensure_connected()?;
        let conn = self.conn.as_mut().expect("just connected");
        let row: Option<Row> = conn.query_first("SHOW GLOBAL VARIABLES LIKE 'BINLOG_CHECKSUM'")?;
        match row {
            None => Ok(false),
            Some(mut row) => {
                let value: Option<String> = row.take("Value");
                Ok(value.map(|v| v != "NONE").unwrap_or(false))
            }
        }
    }

    /// Fetch ordered column descriptors for `schema.table` from
    /// `information_schema.columns`, retrying once on a transient
    /// connection-loss error (spec.md section 4.4 / section 7).
    pub fn get_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>, MetadataError> {
        for attempt in 0..2 {
            self.ensure_connected()?;
            match self.query_columns(schema, table) {
                Ok(cols) => return Ok(cols),
                Err(MetadataError::Mysql(mysql::Error::MySqlError(ref e)))
                    if attempt == 0 && MYSQL_EXPECTED_ERROR_CODES.contains(&e.code) =>
                {
                    log::warn!(
                        "ctl connection lost (code {}) fetching columns for {}.{}, reconnecting",
                        e.code,
                        schema,
                        table
                    );
                    self.conn = None;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("loop always returns on the second attempt");
    }

    fn query_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>, MetadataError> {
        let conn = self.conn.as_mut().expect("ensure_connected was called");
        let sql = if self.ignore_virtual_columns {
            "SELECT COLUMN_NAME, COLLATION_NAME, CHARACTER_SET_NAME, COLUMN_COMMENT, \
             COLUMN_TYPE, COLUMN_KEY, ORDINAL_POSITION \
             FROM information_schema.columns \
             WHERE EXTRA != 'VIRTUAL GENERATED' AND table_schema = :schema AND table_name = :table \
             ORDER BY ORDINAL_POSITION"
        } else {
            "SELECT COLUMN_NAME, COLLATION_NAME, CHARACTER_SET_NAME, COLUMN_COMMENT, \
             COLUMN_TYPE, COLUMN_KEY, ORDINAL_POSITION \
             FROM information_schema.columns \
             WHERE table_schema = :schema AND table_name = :table \
             ORDER BY ORDINAL_POSITION"
        };
        let rows: Vec<Row> = conn.exec(
            sql,
            mysql::params! {
                "schema" => schema,
                "table" => table,
            },
        )?;
        Ok(rows
            .into_iter()
            .map(|mut row| {
                let name: Option<String> = row.take("COLUMN_NAME");
                let collation: Option<String> = row.take("COLLATION_NAME");
                let charset: Option<String> = row.take("CHARACTER_SET_NAME");
                let comment: Option<String> = row.take("COLUMN_COMMENT");
                let type_text: Option<String> = row.take("COLUMN_TYPE");
                let key_role: Option<String> = row.take("COLUMN_KEY");
                let ordinal: i64 = row.take("ORDINAL_POSITION").unwrap_or_default();
                // the real column_type gets patched in by the caller, which knows
                // the wire type from the matching TABLE_MAP event; this placeholder
                // is replaced in TableSchema::merge_resolved
                ColumnDescriptor {
                    ordinal: ordinal as usize,
                    column_type: crate::column_types::ColumnType::Null,
                    name,
                    collation,
                    charset,
                    comment,
                    type_text,
                    key_role: key_role.filter(|k| !k.is_empty()),
                }
            })
            .collect())
    }

    /// Release the connection. Safe to call more than once.
    pub fn close(&mut self) {
        self.conn = None;
    }
}
