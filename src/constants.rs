/// Extension of rule files, read as `<name>.bernard`.
pub const CONFIG_EXTENSION: &str = "bernard";
/// Container extension.
pub const ARCHIVE_EXTENSION: &str = "tar";
/// Suffix appended to the container extension when compression is on.
pub const COMPRESSED_SUFFIX: &str = "gz";
/// Sentinel extension for files without one.
pub const NO_EXTENSION: &str = "none";
