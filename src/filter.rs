//! Event-class allow-lists and the position/timestamp/table predicates
//! applied to the decoded event stream (spec.md section 4.5).

use std::collections::HashSet;

/// A coarse event class used for the allowed-event-set filter. Collapses
/// the version-suffixed row-event type codes (`WriteRowsEventV1`/`V2`, ...)
/// into one class, matching how callers actually reason about event
/// filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    Query,
    Rotate,
    FormatDescription,
    Xid,
    Gtid,
    Stop,
    BeginLoadQuery,
    ExecuteLoadQuery,
    WriteRows,
    UpdateRows,
    DeleteRows,
    TableMap,
    Heartbeat,
    NotImplemented,
}

/// Every class the decoder can produce, matching the original reader's
/// default `only_events` allow-list (spec.md's supplemented features, B.2).
pub const ALL_EVENT_CLASSES: &[EventClass] = &[
    EventClass::Query,
    EventClass::Rotate,
    EventClass::Stop,
    EventClass::FormatDescription,
    EventClass::Xid,
    EventClass::Gtid,
    EventClass::BeginLoadQuery,
    EventClass::ExecuteLoadQuery,
    EventClass::UpdateRows,
    EventClass::WriteRows,
    EventClass::DeleteRows,
    EventClass::TableMap,
    EventClass::Heartbeat,
    EventClass::NotImplemented,
];

use crate::event::{DecodedEvent, NotImplementedReason, TypeCode};

/// Map a raw type code to its coarse class without decoding the event body,
/// so the packet-level filter (spec.md section 4.5, step 1) can drop
/// unwanted frames cheaply.
pub fn class_for_type_code(type_code: TypeCode) -> EventClass {
    match type_code {
        TypeCode::QueryEvent => EventClass::Query,
        TypeCode::RotateEvent => EventClass::Rotate,
        TypeCode::FormatDescriptionEvent => EventClass::FormatDescription,
        TypeCode::XidEvent => EventClass::Xid,
        TypeCode::GtidLogEvent | TypeCode::AnonymousGtidLogEvent => EventClass::Gtid,
        TypeCode::StopEvent => EventClass::Stop,
        TypeCode::BeginLoadQueryEvent => EventClass::BeginLoadQuery,
        TypeCode::ExecuteLoadQueryEvent => EventClass::ExecuteLoadQuery,
        TypeCode::WriteRowsEventV1 | TypeCode::WriteRowsEventV2 => EventClass::WriteRows,
        TypeCode::UpdateRowsEventV1 | TypeCode::UpdateRowsEventV2 => EventClass::UpdateRows,
        TypeCode::DeleteRowsEventV1 | TypeCode::DeleteRowsEventV2 => EventClass::DeleteRows,
        TypeCode::TableMapEvent => EventClass::TableMap,
        TypeCode::HeartbeatLogEvent => EventClass::Heartbeat,
        _ => EventClass::NotImplemented,
    }
}

impl DecodedEvent {
    pub fn class(&self) -> EventClass {
        match self {
            DecodedEvent::Query { .. } => EventClass::Query,
            DecodedEvent::Rotate { .. } => EventClass::Rotate,
            DecodedEvent::FormatDescription { .. } => EventClass::FormatDescription,
            DecodedEvent::Xid { .. } => EventClass::Xid,
            DecodedEvent::Gtid { .. } => EventClass::Gtid,
            DecodedEvent::Stop { .. } => EventClass::Stop,
            DecodedEvent::BeginLoadQuery { .. } => EventClass::BeginLoadQuery,
            DecodedEvent::ExecuteLoadQuery { .. } => EventClass::ExecuteLoadQuery,
            DecodedEvent::WriteRows { .. } => EventClass::WriteRows,
            DecodedEvent::UpdateRows { .. } => EventClass::UpdateRows,
            DecodedEvent::DeleteRows { .. } => EventClass::DeleteRows,
            DecodedEvent::TableMap { .. } => EventClass::TableMap,
            DecodedEvent::Heartbeat { .. } => EventClass::Heartbeat,
            DecodedEvent::NotImplemented { .. } => EventClass::NotImplemented,
        }
    }
}

/// The fully-resolved set of event classes the caller wants to see,
/// built from `only_events`/`ignored_events`/`filter_non_implemented_events`
/// the same way the original reader built its `_allowed_event_list`.
#[derive(Debug, Clone)]
pub struct EventFilter {
    allowed: HashSet<EventClass>,
    only_tables: Option<HashSet<String>>,
    ignored_tables: HashSet<String>,
    only_schemas: Option<HashSet<String>>,
    ignored_schemas: HashSet<String>,
}

impl EventFilter {
    pub fn new(
        only_events: Option<&[EventClass]>,
        ignored_events: &[EventClass],
        filter_non_implemented_events: bool,
        only_tables: Option<&[String]>,
        ignored_tables: &[String],
        only_schemas: Option<&[String]>,
        ignored_schemas: &[String],
    ) -> Self {
        let mut allowed: HashSet<EventClass> = match only_events {
            Some(classes) => classes.iter().copied().collect(),
            None => ALL_EVENT_CLASSES.iter().copied().collect(),
        };
        if filter_non_implemented_events {
            allowed.remove(&EventClass::NotImplemented);
        }
        for ignored in ignored_events {
            allowed.remove(ignored);
        }
        EventFilter {
            allowed,
            only_tables: only_tables.map(|t| t.iter().cloned().collect()),
            ignored_tables: ignored_tables.iter().cloned().collect(),
            only_schemas: only_schemas.map(|s| s.iter().cloned().collect()),
            ignored_schemas: ignored_schemas.iter().cloned().collect(),
        }
    }

    /// The packet-level set is always a superset of `{TableMap, Rotate}`,
    /// since later events and position tracking depend on them regardless
    /// of what the caller asked to see (spec.md section 4.5, step 1).
    pub fn allowed_in_packet(&self, class: EventClass) -> bool {
        matches!(class, EventClass::TableMap | EventClass::Rotate) || self.allowed.contains(&class)
    }

    /// The final, user-facing allowed set (spec.md section 4.5, step 5):
    /// unlike `allowed_in_packet`, this does *not* force `TableMap`/`Rotate`
    /// through if the caller excluded them.
    pub fn allowed_for_emission(&self, class: EventClass) -> bool {
        self.allowed.contains(&class)
    }

    pub fn schema_allowed(&self, schema: &str) -> bool {
        if let Some(only) = &self.only_schemas {
            if !only.contains(schema) {
                return false;
            }
        }
        !self.ignored_schemas.contains(schema)
    }

    pub fn table_allowed(&self, table: &str) -> bool {
        if let Some(only) = &self.only_tables {
            if !only.contains(table) {
                return false;
            }
        }
        !self.ignored_tables.contains(table)
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        EventFilter::new(None, &[], true, None, &[], None, &[])
    }
}

/// True if `log_pos` is within `[start_pos, stop_pos)`. `log_pos == 0`
/// (some synthetic events) is never gated by position, per spec.md
/// section 4.6's tie-break rule: the driver is responsible for not
/// advancing `current_log_pos` on those, but the position *filter* still
/// needs to let them through rather than drop them outright.
pub fn within_position_range(log_pos: u32, start_pos: u32, stop_pos: Option<u32>) -> bool {
    if log_pos == 0 {
        return true;
    }
    if log_pos < start_pos {
        return false;
    }
    if let Some(stop) = stop_pos {
        if log_pos >= stop {
            return false;
        }
    }
    true
}

pub fn not_implemented_reason(event: &DecodedEvent) -> Option<&NotImplementedReason> {
    match event {
        DecodedEvent::NotImplemented { reason, .. } => Some(reason),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_everything_but_not_implemented() {
        let f = EventFilter::default();
        assert!(f.allowed_for_emission(EventClass::Query));
        assert!(!f.allowed_for_emission(EventClass::NotImplemented));
    }

    #[test]
    fn table_map_and_rotate_always_allowed_in_packet() {
        let f = EventFilter::new(Some(&[EventClass::Query]), &[], true, None, &[], None, &[]);
        assert!(!f.allowed_for_emission(EventClass::TableMap));
        assert!(f.allowed_in_packet(EventClass::TableMap));
        assert!(f.allowed_in_packet(EventClass::Rotate));
    }

    #[test]
    fn ignored_events_removed_from_default_set() {
        let f = EventFilter::new(None, &[EventClass::Heartbeat], true, None, &[], None, &[]);
        assert!(!f.allowed_for_emission(EventClass::Heartbeat));
        assert!(f.allowed_for_emission(EventClass::Query));
    }

    #[test]
    fn position_range_respects_bounds() {
        assert!(!within_position_range(120, 500, None));
        assert!(within_position_range(540, 500, None));
        assert!(within_position_range(120, 0, Some(540)));
        assert!(!within_position_range(540, 0, Some(540)));
        assert!(within_position_range(0, 500, Some(540)));
    }

    #[test]
    fn schema_and_table_allow_lists() {
        let f = EventFilter::new(
            None,
            &[],
            true,
            Some(&["orders".to_owned()]),
            &[],
            None,
            &["information_schema".to_owned()],
        );
        assert!(f.table_allowed("orders"));
        assert!(!f.table_allowed("users"));
        assert!(!f.schema_allowed("information_schema"));
        assert!(f.schema_allowed("shop"));
    }
}
