//! Protocol constants.

/// Size of the frame length field on the wire.
pub const SIZE_OF_FRAME_LENGTH_FIELD: usize = 4;

/// Size of the fixed request header (request id + op code).
pub const SIZE_OF_REQUEST_HEADER: usize = 8 + 4;

/// Size of the fixed response header (request id + flags).
pub const SIZE_OF_RESPONSE_HEADER: usize = 8 + 4;

/// Response flag: the payload carries a server error instead of a result.
pub const RESPONSE_FLAG_ERROR: i32 = 0x1;

/// Response flag: a newer schema version exists for the addressed table;
/// the payload begins with the latest version.
pub const RESPONSE_FLAG_SCHEMA_UPDATED: i32 = 0x2;

/// Transaction marker meaning autocommit (no explicit transaction).
pub const TX_AUTOCOMMIT: i64 = -1;

/// Schema version sentinel meaning "no schema": for responses, no record
/// was found; for schema-fetch requests, the latest version is wanted.
pub const SCHEMA_VERSION_NONE: i32 = -1;

/// Table id sentinel meaning "no such table".
pub const TABLE_ID_NONE: i32 = -1;

/// Server error group for table and schema errors.
pub const ERR_GROUP_TABLE: i16 = 2;

/// Error code within [`ERR_GROUP_TABLE`]: the table no longer exists.
pub const ERR_CODE_TABLE_NOT_FOUND: i16 = 1;

/// Error code within [`ERR_GROUP_TABLE`]: the requested schema version is
/// unknown to the cluster.
pub const ERR_CODE_UNKNOWN_SCHEMA_VERSION: i16 = 2;
