use redb::TableDefinition;

/// Object metadata: object key -> ObjectMeta (msgpack)
pub const OBJECT_META: TableDefinition<&str, &[u8]> = TableDefinition::new("object_meta");
