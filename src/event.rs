//! Interprets a raw event frame into a typed [`DecodedEvent`], using the
//! current [`TableMapRegistry`] to resolve row images (spec.md section 4.2).

use std::io::{self, Cursor, Read, Seek};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use serde_derive::Serialize;
use uuid::Uuid;

use crate::bit_set::BitSet;
use crate::column_types::ColumnType;
use crate::errors::{ColumnParseError, DecodeError};
use crate::frame::{EventFrame, FrameHeader};
use crate::packet_helpers::*;
use crate::schema::{TableMapRegistry, TableSchema};
use crate::tell::Tell;
use crate::value::MySQLValue;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeCode {
    Unknown,
    StartEventV3,
    QueryEvent,
    StopEvent,
    RotateEvent,
    IntvarEvent,
    LoadEvent,
    SlaveEvent,
    CreateFileEvent,
    AppendBlockEvent,
    ExecLoadEvent,
    DeleteFileEvent,
    NewLoadEvent,
    RandEvent,
    UserVarEvent,
    FormatDescriptionEvent,
    XidEvent,
    BeginLoadQueryEvent,
    ExecuteLoadQueryEvent,
    TableMapEvent,
    PreGaWriteRowsEvent,
    PreGaUpdateRowsEvent,
    PreGaDeleteRowsEvent,
    WriteRowsEventV1,
    UpdateRowsEventV1,
    DeleteRowsEventV1,
    IncidentEvent,
    HeartbeatLogEvent,
    IgnorableLogEvent,
    RowsQueryLogEvent,
    WriteRowsEventV2,
    UpdateRowsEventV2,
    DeleteRowsEventV2,
    GtidLogEvent,
    AnonymousGtidLogEvent,
    PreviousGtidsLogEvent,
    OtherUnknown(u8),
}

impl TypeCode {
    pub(crate) fn from_byte(b: u8) -> Self {
        match b {
            0 => TypeCode::Unknown,
            1 => TypeCode::StartEventV3,
            2 => TypeCode::QueryEvent,
            3 => TypeCode::StopEvent,
            4 => TypeCode::RotateEvent,
            5 => TypeCode::IntvarEvent,
            6 => TypeCode::LoadEvent,
            7 => TypeCode::SlaveEvent,
            8 => TypeCode::CreateFileEvent,
            9 => TypeCode::AppendBlockEvent,
            10 => TypeCode::ExecLoadEvent,
            11 => TypeCode::DeleteFileEvent,
            12 => TypeCode::NewLoadEvent,
            13 => TypeCode::RandEvent,
            14 => TypeCode::UserVarEvent,
            15 => TypeCode::FormatDescriptionEvent,
            16 => TypeCode::XidEvent,
            17 => TypeCode::BeginLoadQueryEvent,
            18 => TypeCode::ExecuteLoadQueryEvent,
            19 => TypeCode::TableMapEvent,
            20 => TypeCode::PreGaWriteRowsEvent,
            21 => TypeCode::PreGaUpdateRowsEvent,
            22 => TypeCode::PreGaDeleteRowsEvent,
            23 => TypeCode::WriteRowsEventV1,
            24 => TypeCode::UpdateRowsEventV1,
            25 => TypeCode::DeleteRowsEventV1,
            26 => TypeCode::IncidentEvent,
            27 => TypeCode::HeartbeatLogEvent,
            28 => TypeCode::IgnorableLogEvent,
            29 => TypeCode::RowsQueryLogEvent,
            30 => TypeCode::WriteRowsEventV2,
            31 => TypeCode::UpdateRowsEventV2,
            32 => TypeCode::DeleteRowsEventV2,
            33 => TypeCode::GtidLogEvent,
            34 => TypeCode::AnonymousGtidLogEvent,
            35 => TypeCode::PreviousGtidsLogEvent,
            i => TypeCode::OtherUnknown(i),
        }
    }

    /// True for the handful of event classes that must always be decoded in
    /// full regardless of the caller's requested event set, because later
    /// events and position tracking depend on them (spec.md section 4.2/4.5).
    pub fn always_decoded(self) -> bool {
        matches!(self, TypeCode::TableMapEvent | TypeCode::RotateEvent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChecksumAlgorithm {
    None,
    Crc32,
    Other(u8),
}

impl From<u8> for ChecksumAlgorithm {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => ChecksumAlgorithm::None,
            0x01 => ChecksumAlgorithm::Crc32,
            other => ChecksumAlgorithm::Other(other),
        }
    }
}

/// Fields common to every decoded event, lifted from the common header.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EventHeader {
    pub timestamp: u32,
    pub server_id: u32,
    /// End log position: the offset immediately after this event.
    pub log_pos: u32,
    pub flags: u16,
}

impl EventHeader {
    fn from_frame(header: &FrameHeader) -> Self {
        EventHeader {
            timestamp: header.timestamp,
            server_id: header.server_id,
            log_pos: header.log_pos,
            flags: header.flags,
        }
    }
}

pub type RowData = Vec<Option<MySQLValue>>;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RowEvent {
    NewRow {
        cols: RowData,
    },
    DeletedRow {
        cols: RowData,
    },
    UpdatedRow {
        before_cols: RowData,
        after_cols: RowData,
    },
}

impl RowEvent {
    pub fn cols(&self) -> Option<&RowData> {
        match self {
            RowEvent::NewRow { cols } => Some(cols),
            RowEvent::DeletedRow { cols } => Some(cols),
            RowEvent::UpdatedRow { .. } => None,
        }
    }
}

/// Why a row event could not be matched to a known schema, carried by
/// [`DecodedEvent::NotImplemented`] instead of raising `TableMetadataUnavailable`
/// when `fail_on_table_metadata_unavailable` is false.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NotImplementedReason {
    /// A row event referenced a `table_id` with no `TABLE_MAP` seen for it
    /// since the last rotation.
    UnknownTableSchema { table_id: u64 },
    /// The event's type code is not one this decoder interprets.
    UnsupportedEventType { type_code: u8 },
}

/// One decoded binlog event, tagged by class (spec.md section 3).
#[derive(Debug, Serialize)]
#[serde(tag = "event_type")]
pub enum DecodedEvent {
    Query {
        header: EventHeader,
        thread_id: u32,
        exec_time: u32,
        error_code: i16,
        schema: String,
        query: String,
    },
    Rotate {
        header: EventHeader,
        next_file_name: String,
        position: u64,
    },
    FormatDescription {
        header: EventHeader,
        binlog_version: u16,
        server_version: String,
        create_timestamp: u32,
        common_header_len: u8,
        checksum_algorithm: ChecksumAlgorithm,
    },
    Xid {
        header: EventHeader,
        xid: u64,
    },
    Gtid {
        header: EventHeader,
        flags: u8,
        uuid: Uuid,
        coordinate: u64,
        last_committed: Option<u64>,
        sequence_number: Option<u64>,
    },
    Stop {
        header: EventHeader,
    },
    BeginLoadQuery {
        header: EventHeader,
        file_id: u32,
        block_data: Vec<u8>,
    },
    ExecuteLoadQuery {
        header: EventHeader,
        thread_id: u32,
        exec_time: u32,
        error_code: i16,
        schema: String,
        query: String,
        file_id: u32,
        start_pos: u32,
        end_pos: u32,
    },
    WriteRows {
        header: EventHeader,
        table_id: u64,
        rows: Vec<RowEvent>,
    },
    UpdateRows {
        header: EventHeader,
        table_id: u64,
        rows: Vec<RowEvent>,
    },
    DeleteRows {
        header: EventHeader,
        table_id: u64,
        rows: Vec<RowEvent>,
    },
    TableMap {
        header: EventHeader,
        table_id: u64,
        schema_name: String,
        table_name: String,
        columns: Vec<ColumnType>,
    },
    Heartbeat {
        header: EventHeader,
        log_file_name: String,
    },
    NotImplemented {
        header: EventHeader,
        type_code: u8,
        reason: NotImplementedReason,
    },
}

impl DecodedEvent {
    pub fn header(&self) -> &EventHeader {
        match self {
            DecodedEvent::Query { header, .. }
            | DecodedEvent::Rotate { header, .. }
            | DecodedEvent::FormatDescription { header, .. }
            | DecodedEvent::Xid { header, .. }
            | DecodedEvent::Gtid { header, .. }
            | DecodedEvent::Stop { header, .. }
            | DecodedEvent::BeginLoadQuery { header, .. }
            | DecodedEvent::ExecuteLoadQuery { header, .. }
            | DecodedEvent::WriteRows { header, .. }
            | DecodedEvent::UpdateRows { header, .. }
            | DecodedEvent::DeleteRows { header, .. }
            | DecodedEvent::TableMap { header, .. }
            | DecodedEvent::Heartbeat { header, .. }
            | DecodedEvent::NotImplemented { header, .. } => header,
        }
    }

    pub fn log_pos(&self) -> u32 {
        self.header().log_pos
    }

    pub fn timestamp(&self) -> u32 {
        self.header().timestamp
    }

    pub fn table_id(&self) -> Option<u64> {
        match self {
            DecodedEvent::WriteRows { table_id, .. }
            | DecodedEvent::UpdateRows { table_id, .. }
            | DecodedEvent::DeleteRows { table_id, .. }
            | DecodedEvent::TableMap { table_id, .. } => Some(*table_id),
            _ => None,
        }
    }
}

fn parse_one_row<R: Read + Seek>(
    mut cursor: &mut R,
    this_table: &TableSchema,
    present_bitmask: &BitSet,
) -> Result<RowData, ColumnParseError> {
    let num_set_columns = present_bitmask.bits_set();
    let null_bitmask_size = (num_set_columns + 7) >> 3;
    let mut row = Vec::with_capacity(this_table.columns.len());
    let null_bitmask = BitSet::from_slice(
        num_set_columns,
        &read_nbytes(&mut cursor, null_bitmask_size)?,
    )
    .unwrap();
    let mut null_index = 0;
    for (i, column) in this_table.columns.iter().enumerate() {
        if !present_bitmask.is_set(i) {
            row.push(None);
            continue;
        }
        let is_null = null_bitmask.is_set(null_index);
        let val = if is_null {
            MySQLValue::Null
        } else {
            column.column_type.read_value(&mut cursor)?
        };
        row.push(Some(val));
        null_index += 1;
    }
    Ok(row)
}

struct RowsEvent {
    table_id: u64,
    rows: Vec<RowEvent>,
}

fn parse_rows_event<R: Read + Seek>(
    type_code: TypeCode,
    data_len: usize,
    mut cursor: &mut R,
    registry: &TableMapRegistry,
    fail_on_table_metadata_unavailable: bool,
) -> Result<RowsEvent, DecodeError> {
    let mut table_id_buf = [0u8; 8];
    cursor.read_exact(&mut table_id_buf[0..6])?;
    let table_id = LittleEndian::read_u64(&table_id_buf);
    // two-byte reserved value
    cursor.seek(io::SeekFrom::Current(2))?;
    match type_code {
        TypeCode::WriteRowsEventV2 | TypeCode::UpdateRowsEventV2 | TypeCode::DeleteRowsEventV2 => {
            let _ = cursor.read_i16::<LittleEndian>()?;
        }
        _ => {}
    }
    let num_columns = read_variable_length_integer(&mut cursor)? as usize;
    let bitmask_size = (num_columns + 7) >> 3;
    let before_column_bitmask =
        BitSet::from_slice(num_columns, &read_nbytes(&mut cursor, bitmask_size)?).unwrap();
    let after_column_bitmask = match type_code {
        TypeCode::UpdateRowsEventV1 | TypeCode::UpdateRowsEventV2 => {
            Some(BitSet::from_slice(num_columns, &read_nbytes(&mut cursor, bitmask_size)?).unwrap())
        }
        _ => None,
    };

    let this_table = match registry.get(table_id) {
        Some(t) => t,
        None => {
            if fail_on_table_metadata_unavailable {
                return Err(DecodeError::TableMetadataUnavailable { table_id });
            }
            return Ok(RowsEvent {
                table_id,
                rows: Vec::new(),
            });
        }
    };

    let mut rows = Vec::with_capacity(1);
    loop {
        let pos = cursor.tell()? as usize;
        if data_len.saturating_sub(pos) < 1 {
            break;
        }
        match type_code {
            TypeCode::WriteRowsEventV1 | TypeCode::WriteRowsEventV2 => {
                rows.push(RowEvent::NewRow {
                    cols: parse_one_row(&mut cursor, this_table, &before_column_bitmask)?,
                });
            }
            TypeCode::UpdateRowsEventV1 | TypeCode::UpdateRowsEventV2 => {
                rows.push(RowEvent::UpdatedRow {
                    before_cols: parse_one_row(&mut cursor, this_table, &before_column_bitmask)?,
                    after_cols: parse_one_row(
                        &mut cursor,
                        this_table,
                        after_column_bitmask.as_ref().unwrap(),
                    )?,
                })
            }
            TypeCode::DeleteRowsEventV1 | TypeCode::DeleteRowsEventV2 => {
                rows.push(RowEvent::DeletedRow {
                    cols: parse_one_row(&mut cursor, this_table, &before_column_bitmask)?,
                });
            }
            _ => unreachable!("parse_rows_event called with non-rows type code"),
        }
    }
    Ok(RowsEvent { table_id, rows })
}

fn parse_table_map(data: &[u8]) -> Result<(u64, String, String, Vec<ColumnType>), DecodeError> {
    let mut cursor = Cursor::new(data);
    let mut table_id_buf = [0u8; 8];
    cursor.read_exact(&mut table_id_buf[0..6])?;
    let table_id = LittleEndian::read_u64(&table_id_buf);
    cursor.seek(io::SeekFrom::Current(2))?;
    let schema_name = read_one_byte_length_prefixed_string(&mut cursor)?;
    cursor.seek(io::SeekFrom::Current(1))?;
    let table_name = read_one_byte_length_prefixed_string(&mut cursor)?;
    cursor.seek(io::SeekFrom::Current(1))?;
    let column_count = read_variable_length_integer(&mut cursor)? as usize;
    let mut columns = Vec::with_capacity(column_count);
    for _ in 0..column_count {
        let column_type = ColumnType::from_byte(cursor.read_u8()?);
        columns.push(column_type);
    }
    let _metadata_length = read_variable_length_integer(&mut cursor)? as usize;
    let final_columns = columns
        .into_iter()
        .map(|c| c.read_metadata(&mut cursor))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((table_id, schema_name, table_name, final_columns))
}

/// Decode one raw frame into a typed event.
///
/// `registry` reflects the state *before* this frame is applied; callers
/// (the Reader Driver) are responsible for calling `registry.put(...)` for a
/// decoded `TableMap` and `registry.clear()` for a decoded `Rotate`, per
/// spec.md section 4.6.
pub fn decode(
    frame: &EventFrame,
    registry: &TableMapRegistry,
    fail_on_table_metadata_unavailable: bool,
) -> Result<DecodedEvent, DecodeError> {
    let type_code = TypeCode::from_byte(frame.header.type_code);
    let header = EventHeader::from_frame(&frame.header);
    let data = &frame.body[..];
    let mut cursor = Cursor::new(data);

    Ok(match type_code {
        TypeCode::FormatDescriptionEvent => {
            let binlog_version = cursor.read_u16::<LittleEndian>()?;
            if binlog_version != 4 {
                return Err(DecodeError::UnsupportedBinlogVersion(binlog_version));
            }
            let mut server_version_buf = [0u8; 50];
            cursor.read_exact(&mut server_version_buf)?;
            let server_version = String::from_utf8_lossy(
                server_version_buf
                    .split(|c| *c == 0x00)
                    .next()
                    .unwrap_or(&[]),
            )
            .into_owned();
            let create_timestamp = cursor.read_u32::<LittleEndian>()?;
            let common_header_len = cursor.read_u8()?;
            let event_types = data.len().saturating_sub(2 + 50 + 4 + 1 + 1);
            let mut event_sizes_tables = vec![0u8; event_types];
            cursor.read_exact(&mut event_sizes_tables)?;
            let checksum_algo = ChecksumAlgorithm::from(cursor.read_u8()?);
            DecodedEvent::FormatDescription {
                header,
                binlog_version,
                server_version,
                create_timestamp,
                common_header_len,
                checksum_algorithm: checksum_algo,
            }
        }
        TypeCode::RotateEvent => {
            let position = cursor.read_u64::<LittleEndian>()?;
            let mut next_file_name = String::new();
            cursor.read_to_string(&mut next_file_name)?;
            DecodedEvent::Rotate {
                header,
                next_file_name,
                position,
            }
        }
        TypeCode::StopEvent => DecodedEvent::Stop { header },
        TypeCode::XidEvent => {
            let xid = cursor.read_u64::<LittleEndian>()?;
            DecodedEvent::Xid { header, xid }
        }
        TypeCode::GtidLogEvent | TypeCode::AnonymousGtidLogEvent => {
            let flags = cursor.read_u8()?;
            let mut uuid_buf = [0u8; 16];
            cursor.read_exact(&mut uuid_buf)?;
            let uuid = Uuid::from_slice(&uuid_buf)?;
            let coordinate = cursor.read_u64::<LittleEndian>()?;
            let (last_committed, sequence_number) = match cursor.read_u8() {
                Ok(0x02) => {
                    let last_committed = cursor.read_u64::<LittleEndian>()?;
                    let sequence_number = cursor.read_u64::<LittleEndian>()?;
                    (Some(last_committed), Some(sequence_number))
                }
                _ => (None, None),
            };
            DecodedEvent::Gtid {
                header,
                flags,
                uuid,
                coordinate,
                last_committed,
                sequence_number,
            }
        }
        TypeCode::QueryEvent => {
            let thread_id = cursor.read_u32::<LittleEndian>()?;
            let exec_time = cursor.read_u32::<LittleEndian>()?;
            let schema_len = cursor.read_u8()?;
            let error_code = cursor.read_i16::<LittleEndian>()?;
            let _status_vars = read_two_byte_length_prefixed_bytes(&mut cursor)?;
            let schema =
                String::from_utf8_lossy(&read_nbytes(&mut cursor, schema_len)?).into_owned();
            cursor.seek(io::SeekFrom::Current(1))?;
            let mut statement = String::new();
            cursor.read_to_string(&mut statement)?;
            DecodedEvent::Query {
                header,
                thread_id,
                exec_time,
                error_code,
                schema,
                query: statement,
            }
        }
        TypeCode::BeginLoadQueryEvent => {
            let file_id = cursor.read_u32::<LittleEndian>()?;
            let mut block_data = Vec::new();
            cursor.read_to_end(&mut block_data)?;
            DecodedEvent::BeginLoadQuery {
                header,
                file_id,
                block_data,
            }
        }
        TypeCode::ExecuteLoadQueryEvent => {
            let thread_id = cursor.read_u32::<LittleEndian>()?;
            let exec_time = cursor.read_u32::<LittleEndian>()?;
            let schema_len = cursor.read_u8()?;
            let error_code = cursor.read_i16::<LittleEndian>()?;
            let _status_vars_len = cursor.read_u16::<LittleEndian>()?;
            let file_id = cursor.read_u32::<LittleEndian>()?;
            let start_pos = cursor.read_u32::<LittleEndian>()?;
            let end_pos = cursor.read_u32::<LittleEndian>()?;
            let _dup_handling_flags = cursor.read_u8()?;
            let _status_vars = read_nbytes(&mut cursor, _status_vars_len)?;
            let schema =
                String::from_utf8_lossy(&read_nbytes(&mut cursor, schema_len)?).into_owned();
            cursor.seek(io::SeekFrom::Current(1))?;
            let mut statement = String::new();
            cursor.read_to_string(&mut statement)?;
            DecodedEvent::ExecuteLoadQuery {
                header,
                thread_id,
                exec_time,
                error_code,
                schema,
                query: statement,
                file_id,
                start_pos,
                end_pos,
            }
        }
        TypeCode::TableMapEvent => {
            let (table_id, schema_name, table_name, columns) = parse_table_map(data)?;
            DecodedEvent::TableMap {
                header,
                table_id,
                schema_name,
                table_name,
                columns,
            }
        }
        TypeCode::WriteRowsEventV1 | TypeCode::WriteRowsEventV2 => {
            let ev = parse_rows_event(
                type_code,
                data.len(),
                &mut cursor,
                registry,
                fail_on_table_metadata_unavailable,
            )?;
            if registry.get(ev.table_id).is_none() && !fail_on_table_metadata_unavailable {
                DecodedEvent::NotImplemented {
                    header,
                    type_code: frame.header.type_code,
                    reason: NotImplementedReason::UnknownTableSchema {
                        table_id: ev.table_id,
                    },
                }
            } else {
                DecodedEvent::WriteRows {
                    header,
                    table_id: ev.table_id,
                    rows: ev.rows,
                }
            }
        }
        TypeCode::UpdateRowsEventV1 | TypeCode::UpdateRowsEventV2 => {
            let ev = parse_rows_event(
                type_code,
                data.len(),
                &mut cursor,
                registry,
                fail_on_table_metadata_unavailable,
            )?;
            if registry.get(ev.table_id).is_none() && !fail_on_table_metadata_unavailable {
                DecodedEvent::NotImplemented {
                    header,
                    type_code: frame.header.type_code,
                    reason: NotImplementedReason::UnknownTableSchema {
                        table_id: ev.table_id,
                    },
                }
            } else {
                DecodedEvent::UpdateRows {
                    header,
                    table_id: ev.table_id,
                    rows: ev.rows,
                }
            }
        }
        TypeCode::DeleteRowsEventV1 | TypeCode::DeleteRowsEventV2 => {
            let ev = parse_rows_event(
                type_code,
                data.len(),
                &mut cursor,
                registry,
                fail_on_table_metadata_unavailable,
            )?;
            if registry.get(ev.table_id).is_none() && !fail_on_table_metadata_unavailable {
                DecodedEvent::NotImplemented {
                    header,
                    type_code: frame.header.type_code,
                    reason: NotImplementedReason::UnknownTableSchema {
                        table_id: ev.table_id,
                    },
                }
            } else {
                DecodedEvent::DeleteRows {
                    header,
                    table_id: ev.table_id,
                    rows: ev.rows,
                }
            }
        }
        TypeCode::HeartbeatLogEvent => {
            let mut log_file_name = String::new();
            cursor.read_to_string(&mut log_file_name)?;
            DecodedEvent::Heartbeat {
                header,
                log_file_name,
            }
        }
        TypeCode::OtherUnknown(code) => DecodedEvent::NotImplemented {
            header,
            type_code: code,
            reason: NotImplementedReason::UnsupportedEventType { type_code: code },
        },
        _ => DecodedEvent::NotImplemented {
            header,
            type_code: frame.header.type_code,
            reason: NotImplementedReason::UnsupportedEventType {
                type_code: frame.header.type_code,
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameHeader;

    fn frame(type_code: u8, body: Vec<u8>) -> EventFrame {
        EventFrame {
            header: FrameHeader {
                timestamp: 1_600_000_000,
                type_code,
                server_id: 1,
                event_size: (19 + body.len()) as u32,
                log_pos: 1000,
                flags: 0,
            },
            body,
            offset: 4,
        }
    }

    #[test]
    fn decodes_format_description_event() {
        let mut body = Vec::new();
        body.extend_from_slice(&4u16.to_le_bytes()); // binlog_version
        body.extend_from_slice(&[0u8; 50]); // server_version
        body.extend_from_slice(&0u32.to_le_bytes()); // create_timestamp
        body.push(19); // common_header_len
        body.extend_from_slice(&[1, 2, 3, 4, 5]); // post-header-length table (N=5)
        body.push(1); // checksum_algorithm = CRC32
        let f = frame(15, body);
        let registry = TableMapRegistry::new();
        let decoded = decode(&f, &registry, true).unwrap();
        match decoded {
            DecodedEvent::FormatDescription {
                common_header_len,
                checksum_algorithm,
                ..
            } => {
                assert_eq!(common_header_len, 19);
                assert_eq!(checksum_algorithm, ChecksumAlgorithm::Crc32);
            }
            other => panic!("expected FormatDescription, got {:?}", other),
        }
    }

    #[test]
    fn decodes_stop_event() {
        let f = frame(3, Vec::new());
        let registry = TableMapRegistry::new();
        let decoded = decode(&f, &registry, true).unwrap();
        assert!(matches!(decoded, DecodedEvent::Stop { .. }));
        assert_eq!(decoded.log_pos(), 1000);
    }

    #[test]
    fn decodes_xid_event() {
        let mut body = Vec::new();
        body.extend_from_slice(&42u64.to_le_bytes());
        let f = frame(16, body);
        let registry = TableMapRegistry::new();
        let decoded = decode(&f, &registry, true).unwrap();
        assert!(matches!(decoded, DecodedEvent::Xid { xid: 42, .. }));
    }

    #[test]
    fn decodes_rotate_event() {
        let mut body = Vec::new();
        body.extend_from_slice(&4u64.to_le_bytes());
        body.extend_from_slice(b"bin-log.000002");
        let f = frame(4, body);
        let registry = TableMapRegistry::new();
        let decoded = decode(&f, &registry, true).unwrap();
        match decoded {
            DecodedEvent::Rotate {
                next_file_name,
                position,
                ..
            } => {
                assert_eq!(next_file_name, "bin-log.000002");
                assert_eq!(position, 4);
            }
            other => panic!("expected Rotate, got {:?}", other),
        }
    }

    #[test]
    fn unknown_type_code_is_not_implemented() {
        let f = frame(250, vec![1, 2, 3]);
        let registry = TableMapRegistry::new();
        let decoded = decode(&f, &registry, true).unwrap();
        assert!(matches!(
            decoded,
            DecodedEvent::NotImplemented {
                reason: NotImplementedReason::UnsupportedEventType { type_code: 250 },
                ..
            }
        ));
    }

    #[test]
    fn unknown_table_id_is_strict_error_when_configured() {
        let mut body = Vec::new();
        body.extend_from_slice(&[7, 0, 0, 0, 0, 0]); // table_id = 7
        body.extend_from_slice(&[0, 0]); // reserved
        body.extend_from_slice(&[0, 0]); // v2 extra-row-info length
        body.push(0); // num_columns = 0
        let f = frame(30, body); // WriteRowsEventV2
        let registry = TableMapRegistry::new();
        let result = decode(&f, &registry, true);
        assert!(matches!(
            result,
            Err(DecodeError::TableMetadataUnavailable { table_id: 7 })
        ));
    }
}
