//! Resolved table schemas and the `table_id -> schema` registry that the
//! reader keeps in sync with `TABLE_MAP` events.

use std::collections::BTreeMap;

use serde_derive::Serialize;

use crate::column_types::ColumnType;

/// One column of a [`TableSchema`], merging the wire column type carried by
/// a `TABLE_MAP` event with the text metadata the Metadata Resolver pulls
/// from `information_schema.columns`, when available.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnDescriptor {
    /// 1-based position in the table, matching `ORDINAL_POSITION`.
    pub ordinal: usize,
    /// Wire-level type used to decode this column's bytes out of row events.
    pub column_type: ColumnType,
    /// `COLUMN_NAME`, if resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `COLLATION_NAME`, if resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// `CHARACTER_SET_NAME`, if resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    /// `COLUMN_COMMENT`, if resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// `COLUMN_TYPE`, the human-readable SQL type text, if resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_text: Option<String>,
    /// `COLUMN_KEY` ('PRI', 'UNI', 'MUL', or empty), if resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_role: Option<String>,
}

impl ColumnDescriptor {
    /// Build a descriptor that carries only the wire type, for the case
    /// where no Metadata Resolver is configured (or it couldn't resolve
    /// this table): every `TABLE_MAP` event carries enough type information
    /// to decode most column types on its own.
    pub(crate) fn from_wire_type(ordinal: usize, column_type: ColumnType) -> Self {
        ColumnDescriptor {
            ordinal,
            column_type,
            name: None,
            collation: None,
            charset: None,
            comment: None,
            type_text: None,
            key_role: None,
        }
    }

    pub fn is_primary_key(&self) -> bool {
        self.key_role.as_deref() == Some("PRI")
    }
}

/// Ordered column descriptors for one table, as pinned at the moment a
/// `TABLE_MAP` event was decoded.
///
/// Invariant: ordinal positions are contiguous starting at 1 and `columns`
/// is sorted by ordinal (spec.md section 3, TableSchema).
#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub schema_name: String,
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    /// Build a schema from the wire column type vector carried by a
    /// `TABLE_MAP` event, with no resolved metadata.
    pub(crate) fn from_wire_columns(
        schema_name: String,
        table_name: String,
        column_types: Vec<ColumnType>,
    ) -> Self {
        let columns = column_types
            .into_iter()
            .enumerate()
            .map(|(i, ct)| ColumnDescriptor::from_wire_type(i + 1, ct))
            .collect();
        TableSchema {
            schema_name,
            table_name,
            columns,
        }
    }

    /// Merge resolved `information_schema` metadata into a schema built
    /// from wire column types, matching by ordinal position. Columns with
    /// no corresponding resolved descriptor keep only their wire type.
    pub(crate) fn merge_resolved(&mut self, resolved: Vec<ColumnDescriptor>) {
        let mut by_ordinal: BTreeMap<usize, ColumnDescriptor> =
            resolved.into_iter().map(|c| (c.ordinal, c)).collect();
        for column in &mut self.columns {
            if let Some(r) = by_ordinal.remove(&column.ordinal) {
                column.name = r.name;
                column.collation = r.collation;
                column.charset = r.charset;
                column.comment = r.comment;
                column.type_text = r.type_text;
                column.key_role = r.key_role;
            }
        }
    }
}

/// `table_id -> TableSchema` map, populated by `TABLE_MAP` events and
/// cleared on every `ROTATE` (spec.md section 4.3).
#[derive(Debug, Default)]
pub struct TableMapRegistry {
    inner: BTreeMap<u64, TableSchema>,
}

impl TableMapRegistry {
    pub fn new() -> Self {
        TableMapRegistry {
            inner: BTreeMap::new(),
        }
    }

    pub fn put(&mut self, table_id: u64, schema: TableSchema) {
        self.inner.insert(table_id, schema);
    }

    pub fn get(&self, table_id: u64) -> Option<&TableSchema> {
        self.inner.get(&table_id)
    }

    pub fn get_mut(&mut self, table_id: u64) -> Option<&mut TableSchema> {
        self.inner.get_mut(&table_id)
    }

    /// Invoked on every `ROTATE`: MySQL reuses table ids across server
    /// restarts, and a rotation is the only upper bound on id reuse the
    /// format guarantees, so every rotation invalidates the whole map.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(name: &str) -> TableSchema {
        TableSchema::from_wire_columns(
            "db".to_owned(),
            name.to_owned(),
            vec![ColumnType::Long, ColumnType::VarChar(255)],
        )
    }

    #[test]
    fn put_get_roundtrip() {
        let mut reg = TableMapRegistry::new();
        assert!(reg.get(7).is_none());
        reg.put(7, schema("t"));
        assert_eq!(reg.get(7).unwrap().table_name, "t");
    }

    #[test]
    fn clear_empties_registry() {
        let mut reg = TableMapRegistry::new();
        reg.put(1, schema("a"));
        reg.put(2, schema("b"));
        assert!(!reg.is_empty());
        reg.clear();
        assert!(reg.is_empty());
        assert!(reg.get(1).is_none());
    }

    #[test]
    fn merge_resolved_matches_by_ordinal() {
        let mut s = schema("t");
        s.merge_resolved(vec![ColumnDescriptor {
            ordinal: 1,
            column_type: ColumnType::Long,
            name: Some("id".to_owned()),
            collation: None,
            charset: None,
            comment: None,
            type_text: Some("int(11)".to_owned()),
            key_role: Some("PRI".to_owned()),
        }]);
        assert_eq!(s.columns[0].name.as_deref(), Some("id"));
        assert!(s.columns[0].is_primary_key());
        assert!(s.columns[1].name.is_none());
    }
}
