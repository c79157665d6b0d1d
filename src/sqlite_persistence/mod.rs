mod versioned_schema;

pub use versioned_schema::{
    open_versioned, Column, ForeignKey, ForeignKeyOnChange, SchemaOrigin, SqlType, Table,
    VersionedSchema, BASE_DB_VERSION,
};
