//! The `NotOpened -> Reading -> EndOfFile` state machine that turns one
//! binlog file into a filtered stream of [`DecodedEvent`]s (spec.md section
//! 4.6).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::{DecodeError, ReaderError};
use crate::event::{self, DecodedEvent, TypeCode};
use crate::filter::{class_for_type_code, within_position_range, EventFilter};
use crate::metadata::MetadataResolver;
use crate::schema::{ColumnDescriptor, TableMapRegistry, TableSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    NotOpened,
    Reading,
    EndOfFile,
}

/// Per-file tunables a [`ReaderDriver`] needs; `crate::ReaderOptions`
/// builds one of these per file for the walker.
pub struct DriverOptions {
    pub start_pos: u32,
    pub stop_pos: Option<u32>,
    pub skip_to_timestamp: Option<u32>,
    pub fail_on_table_metadata_unavailable: bool,
    pub freeze_schema: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        DriverOptions {
            start_pos: 4,
            stop_pos: None,
            skip_to_timestamp: None,
            fail_on_table_metadata_unavailable: false,
            freeze_schema: false,
        }
    }
}

/// Drives one binlog file from open to end-of-file, applying the filter
/// pipeline and keeping the table map registry in sync.
pub struct ReaderDriver {
    state: DriverState,
    file_path: PathBuf,
    frame_reader: Option<crate::frame::FrameReader>,
    registry: TableMapRegistry,
    metadata: Option<MetadataResolver>,
    filter: EventFilter,
    options: DriverOptions,
    resolved_cache: HashMap<(String, String), Vec<ColumnDescriptor>>,
    current_file_name: String,
    current_log_pos: u64,
    /// The first frame read from the file, peeked once in `ensure_open` to
    /// validate it decodes to a known event, then handed back to
    /// `next_event`'s normal loop on its first iteration.
    pending_frame: Option<crate::frame::EventFrame>,
}

impl ReaderDriver {
    pub fn new<P: AsRef<Path>>(
        file_path: P,
        metadata: Option<MetadataResolver>,
        filter: EventFilter,
        options: DriverOptions,
    ) -> Self {
        let file_path = file_path.as_ref().to_owned();
        let current_file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ReaderDriver {
            state: DriverState::NotOpened,
            file_path,
            frame_reader: None,
            registry: TableMapRegistry::new(),
            metadata,
            filter,
            options,
            resolved_cache: HashMap::new(),
            current_file_name,
            current_log_pos: 0,
            pending_frame: None,
        }
    }

    /// The file and position observable after the most recently emitted
    /// event, per spec.md section 4.7 / the Multi-file Walker's needs.
    pub fn current_position(&self) -> (&str, u64) {
        (&self.current_file_name, self.current_log_pos)
    }

    fn ensure_open(&mut self) -> Result<(), ReaderError> {
        if self.state != DriverState::NotOpened {
            return Ok(());
        }
        let checksummed = match self.metadata.as_mut() {
            Some(resolver) => resolver.checksum_enabled(),
            None => false,
        };
        let mut reader = crate::frame::FrameReader::open(&self.file_path, checksummed)?;
        // well-formed files begin with a record the decoder recognizes
        // (spec.md section 3); a file that opens into garbage is rejected
        // up front rather than surfacing confusing downstream NotImplemented
        // events one at a time.
        if let Some(frame) = reader.next_frame()? {
            let decoded = event::decode(&frame, &self.registry, false)?;
            if matches!(decoded, DecodedEvent::NotImplemented { .. }) {
                return Err(ReaderError::Decode(DecodeError::BadFirstRecord));
            }
            self.pending_frame = Some(frame);
        }
        self.frame_reader = Some(reader);
        self.state = DriverState::Reading;
        Ok(())
    }

    fn resolve_table_schema(
        &mut self,
        schema_name: &str,
        table_name: &str,
        mut table: TableSchema,
    ) -> TableSchema {
        let resolver = match self.metadata.as_mut() {
            Some(r) => r,
            None => return table,
        };
        let key = (schema_name.to_owned(), table_name.to_owned());
        if self.options.freeze_schema {
            if let Some(cached) = self.resolved_cache.get(&key) {
                table.merge_resolved(cached.clone());
                return table;
            }
        }
        match resolver.get_columns(schema_name, table_name) {
            Ok(cols) => {
                table.merge_resolved(cols.clone());
                self.resolved_cache.insert(key, cols);
            }
            Err(e) => {
                log::warn!(
                    "could not resolve column metadata for {}.{}: {}",
                    schema_name,
                    table_name,
                    e
                );
            }
        }
        table
    }

    fn schema_table_name(&self, decoded: &DecodedEvent) -> (Option<String>, Option<String>) {
        match decoded {
            DecodedEvent::Query { schema, .. } => (Some(schema.clone()), None),
            DecodedEvent::TableMap {
                schema_name,
                table_name,
                ..
            } => (Some(schema_name.clone()), Some(table_name.clone())),
            DecodedEvent::WriteRows { table_id, .. }
            | DecodedEvent::UpdateRows { table_id, .. }
            | DecodedEvent::DeleteRows { table_id, .. } => match self.registry.get(*table_id) {
                Some(t) => (Some(t.schema_name.clone()), Some(t.table_name.clone())),
                None => (None, None),
            },
            _ => (None, None),
        }
    }

    /// Pull the next filtered event, or `Ok(None)` at end of file / once
    /// `stop_pos` has been reached.
    pub fn next_event(&mut self) -> Result<Option<DecodedEvent>, ReaderError> {
        self.ensure_open()?;
        if self.state == DriverState::EndOfFile {
            return Ok(None);
        }
        loop {
            let frame = match self.pending_frame.take() {
                Some(f) => f,
                None => match self.frame_reader.as_mut().unwrap().next_frame()? {
                    Some(f) => f,
                    None => {
                        self.state = DriverState::EndOfFile;
                        return Ok(None);
                    }
                },
            };

            let type_code = TypeCode::from_byte(frame.header.type_code);
            if !self.filter.allowed_in_packet(class_for_type_code(type_code)) {
                continue;
            }

            let decoded = event::decode(
                &frame,
                &self.registry,
                self.options.fail_on_table_metadata_unavailable,
            )?;
            let log_pos = decoded.log_pos();

            if !within_position_range(log_pos, 0, self.options.stop_pos) {
                self.state = DriverState::EndOfFile;
                return Ok(None);
            }
            let start_drop = !within_position_range(log_pos, self.options.start_pos, None);

            match &decoded {
                DecodedEvent::Rotate {
                    next_file_name,
                    position,
                    ..
                } => {
                    self.current_file_name = next_file_name.clone();
                    self.current_log_pos = *position;
                    self.registry.clear();
                }
                _ => {
                    if log_pos != 0 {
                        self.current_log_pos = u64::from(log_pos);
                    }
                }
            }

            let timestamp_drop = self
                .options
                .skip_to_timestamp
                .map_or(false, |t| decoded.timestamp() < t);

            if let DecodedEvent::TableMap {
                table_id,
                schema_name,
                table_name,
                columns,
                ..
            } = &decoded
            {
                let table = TableSchema::from_wire_columns(
                    schema_name.clone(),
                    table_name.clone(),
                    columns.clone(),
                );
                let table = self.resolve_table_schema(schema_name, table_name, table);
                self.registry.put(*table_id, table);
            }

            if start_drop || timestamp_drop {
                continue;
            }
            if !self.filter.allowed_for_emission(decoded.class()) {
                continue;
            }

            let (schema_name, table_name) = self.schema_table_name(&decoded);
            if let Some(s) = &schema_name {
                if !self.filter.schema_allowed(s) {
                    continue;
                }
            }
            if let Some(t) = &table_name {
                if !self.filter.table_allowed(t) {
                    continue;
                }
            }

            return Ok(Some(decoded));
        }
    }

    /// Release the file handle and metadata connection. Safe to call more
    /// than once and from any state (spec.md section 5).
    pub fn close(&mut self) {
        self.frame_reader = None;
        self.pending_frame = None;
        if let Some(resolver) = self.metadata.as_mut() {
            resolver.close();
        }
        self.state = DriverState::EndOfFile;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_event(buf: &mut Vec<u8>, type_code: u8, log_pos: u32, body: &[u8]) {
        let event_size = (19 + body.len()) as u32;
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.push(type_code);
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&event_size.to_le_bytes());
        buf.extend_from_slice(&log_pos.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(body);
    }

    fn build_file(path: &Path) {
        let mut buf = vec![0xfe, b'b', b'i', b'n'];
        // a couple of Stop events at increasing positions
        write_event(&mut buf, 3, 120, &[]);
        write_event(&mut buf, 3, 260, &[]);
        write_event(&mut buf, 3, 540, &[]);
        write_event(&mut buf, 3, 800, &[]);
        std::fs::write(path, buf).unwrap();
    }

    #[test]
    fn start_pos_gate_drops_earlier_events() {
        let path = std::env::temp_dir().join("mysql_binlog_reader_test_driver_start.bin");
        build_file(&path);
        let mut driver = ReaderDriver::new(
            &path,
            None,
            EventFilter::default(),
            DriverOptions {
                start_pos: 500,
                ..DriverOptions::default()
            },
        );
        let mut positions = Vec::new();
        while let Some(e) = driver.next_event().unwrap() {
            positions.push(e.log_pos());
        }
        assert_eq!(positions, vec![540, 800]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn stop_pos_terminates_before_reaching_it() {
        let path = std::env::temp_dir().join("mysql_binlog_reader_test_driver_stop.bin");
        build_file(&path);
        let mut driver = ReaderDriver::new(
            &path,
            None,
            EventFilter::default(),
            DriverOptions {
                stop_pos: Some(540),
                ..DriverOptions::default()
            },
        );
        let mut positions = Vec::new();
        while let Some(e) = driver.next_event().unwrap() {
            positions.push(e.log_pos());
        }
        assert_eq!(positions, vec![120, 260]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn bad_first_record_is_rejected_up_front() {
        let path = std::env::temp_dir().join("mysql_binlog_reader_test_driver_bad_first.bin");
        let mut buf = vec![0xfe, b'b', b'i', b'n'];
        write_event(&mut buf, 250, 50, &[1, 2, 3]); // unsupported type code
        std::fs::write(&path, buf).unwrap();
        let mut driver =
            ReaderDriver::new(&path, None, EventFilter::default(), DriverOptions::default());
        let result = driver.next_event();
        assert!(matches!(
            result,
            Err(ReaderError::Decode(DecodeError::BadFirstRecord))
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn empty_file_yields_no_events() {
        let path = std::env::temp_dir().join("mysql_binlog_reader_test_driver_empty.bin");
        std::fs::write(&path, [0xfe, b'b', b'i', b'n']).unwrap();
        let mut driver = ReaderDriver::new(&path, None, EventFilter::default(), DriverOptions::default());
        assert!(driver.next_event().unwrap().is_none());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rotation_clears_registry_then_row_event_is_not_implemented_under_permissive_policy() {
        let path = std::env::temp_dir().join("mysql_binlog_reader_test_driver_rotate.bin");
        let mut buf = vec![0xfe, b'b', b'i', b'n'];
        // TABLE_MAP(id=7, schema=a, table=t, 0 columns)
        let mut table_map_body = Vec::new();
        table_map_body.extend_from_slice(&[7, 0, 0, 0, 0, 0]);
        table_map_body.extend_from_slice(&[0, 0]);
        table_map_body.push(1); // schema name len
        table_map_body.push(b'a');
        table_map_body.push(0);
        table_map_body.push(1); // table name len
        table_map_body.push(b't');
        table_map_body.push(0);
        table_map_body.push(0); // column count = 0
        table_map_body.push(0); // metadata length = 0
        // no columns -> no null bitmap bytes since (0+7)>>3 == 0
        write_event(&mut buf, 19, 100, &table_map_body);

        // WRITE_ROWS(id=7, 0 columns present)
        let mut write_rows_body = Vec::new();
        write_rows_body.extend_from_slice(&[7, 0, 0, 0, 0, 0]);
        write_rows_body.extend_from_slice(&[0, 0]);
        write_rows_body.extend_from_slice(&[0, 0]); // v2 extra length
        write_rows_body.push(0); // num columns = 0
        write_event(&mut buf, 30, 200, &write_rows_body);

        // ROTATE to a new file at position 4
        let mut rotate_body = Vec::new();
        rotate_body.extend_from_slice(&4u64.to_le_bytes());
        rotate_body.extend_from_slice(b"bin-log.000002");
        write_event(&mut buf, 4, 300, &rotate_body);

        // WRITE_ROWS(id=7) again, after the rotation cleared the registry
        write_event(&mut buf, 30, 400, &write_rows_body);

        std::fs::write(&path, buf).unwrap();

        let mut driver = ReaderDriver::new(
            &path,
            None,
            EventFilter::new(None, &[], false, None, &[], None, &[]),
            DriverOptions {
                fail_on_table_metadata_unavailable: false,
                ..DriverOptions::default()
            },
        );
        let mut classes = Vec::new();
        while let Some(e) = driver.next_event().unwrap() {
            classes.push(e.class());
        }
        use crate::filter::EventClass;
        assert_eq!(
            classes,
            vec![
                EventClass::TableMap,
                EventClass::WriteRows,
                EventClass::Rotate,
                EventClass::NotImplemented,
            ]
        );
        std::fs::remove_file(&path).ok();
    }
}
