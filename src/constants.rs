//! Shared constants for placement identifiers, preference scoping, and the journal format.

/// Separator between a root portlet id and its instance suffix.
pub const INSTANCE_SEPARATOR: &str = "_INSTANCE_";
/// Separator between a root portlet id and the owning user id.
pub const USER_SEPARATOR: &str = "_USER_";

/// Owner id used for preferences that are not bound to a specific user.
pub const PREFS_OWNER_ID_DEFAULT: u64 = 0;

/// Group key carried by the administrative control-panel pseudo-site.
pub const CONTROL_PANEL_GROUP_KEY: &str = "Control Panel";

/// Preference key holding the article shown by a web content display placement.
pub const ARTICLE_ID_PREFERENCE: &str = "articleId";

/// Rows or layouts fetched per batch during a scan.
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 100;

/// Journal appends tolerated before an automatic compaction.
pub const DEFAULT_COMPACT_AFTER: u64 = 10_000;

/// Journal file magic.
pub const JOURNAL_MAGIC: [u8; 4] = *b"PIX1";
/// Journal format version.
pub const JOURNAL_VERSION: u16 = 0x0100;
/// Size of the journal file header: magic, version, reserved.
pub const JOURNAL_HEADER_SIZE: usize = 16;
