use crate::column_types;

/// Errors raised while decoding a JSON (JSONB) column value.
#[derive(Debug, thiserror::Error)]
pub enum JsonbParseError {
    #[error("invalid type byte: {0}")]
    InvalidTypeByte(u8),
    #[error("invalid type literal byte: {0}")]
    InvalidLiteral(u16),
    #[error("error parsing opaque column in json record")]
    OpaqueColumnParseError {
        #[source]
        inner: Box<ColumnParseError>,
    },
    #[error("io error reading jsonb value")]
    Io(#[from] std::io::Error),
}

impl From<ColumnParseError> for JsonbParseError {
    fn from(e: ColumnParseError) -> Self {
        JsonbParseError::OpaqueColumnParseError { inner: Box::new(e) }
    }
}

/// Errors raised while decoding a single column value against its wire type.
#[derive(Debug, thiserror::Error)]
pub enum ColumnParseError {
    #[error("unimplemented column type: {column_type:?}")]
    UnimplementedTypeError {
        column_type: column_types::ColumnType,
    },
    #[error("error parsing JSON column")]
    JsonError(#[from] JsonbParseError),
    #[error("io error reading column value")]
    Io(#[from] std::io::Error),
    #[error("error parsing packed decimal")]
    Decimal(#[from] bigdecimal::ParseBigDecimalError),
}

/// Errors raised while reading one event frame (header + body) from a file.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("could not open binlog file")]
    OpenError(#[source] std::io::Error),
    #[error("binlog file did not start with the expected magic bytes: {0:?}")]
    BadMagic([u8; 4]),
    #[error("event declared a size smaller than the common header: {0}")]
    EventSizeTooSmall(u32),
    #[error("io error reading frame")]
    Io(#[from] std::io::Error),
}

/// Errors raised while interpreting a frame's body into a [`crate::event::DecodedEvent`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("error parsing column data")]
    Column(#[from] ColumnParseError),
    #[error("io error decoding event body")]
    Io(#[from] std::io::Error),
    #[error("invalid uuid in GTID event")]
    Uuid(#[from] uuid::Error),
    #[error(
        "row event referenced table_id {table_id} which has no known schema \
         (no TABLE_MAP seen for it since the last ROTATE)"
    )]
    TableMetadataUnavailable { table_id: u64 },
    #[error("the first record in the binlog did not decode to a known event type")]
    BadFirstRecord,
    #[error("unsupported binlog_version (only version 4 is supported): {0}")]
    UnsupportedBinlogVersion(u16),
}

/// Errors raised talking to the auxiliary `information_schema` connection.
/// There is no `NotConfigured` variant: the reader represents "no metadata
/// connection" as `Option<MetadataResolver>` being `None` at a higher layer,
/// so this type only needs to cover errors from an actually-established one.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("mysql error talking to ctl connection")]
    Mysql(#[from] mysql::Error),
}

/// Errors surfaced by the top-level reader (frame + decode + metadata errors,
/// wrapped with enough context to know which file was being read).
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("error reading binlog frame")]
    Frame(#[from] FrameError),
    #[error("error decoding binlog event")]
    Decode(#[from] DecodeError),
    #[error("error resolving table metadata")]
    Metadata(#[from] MetadataError),
}
