// Cache layout
pub const CACHE_DIR: &str = "cache";
pub const CACHE_FILE_NAME: &str = "discoverability_cache";
pub const MATRIX_FILE_NAME: &str = ".matrix";
pub const CORPUS_FILE_NAME: &str = ".corpus";
pub const VECTORIZER_FILE_NAME: &str = ".vectorizer";

// Configuration
pub const SECTIONS_PATH: &str = "config/.sections";

// External tools
pub const FORMATTER_PROGRAM: &str = "groff";
/// `-P-c` keeps grotty on overstrike output instead of SGR escapes.
pub const FORMATTER_ARGS: [&str; 3] = ["-Tascii", "-P-c", "-man"];
pub const MANPATH_PROGRAM: &str = "manpath";
/// Seconds one formatter run may take before it is killed.
pub const FORMATTER_TIMEOUT_SECS: u64 = 60;
/// How often a running formatter is checked for exit.
pub const FORMATTER_POLL_MILLIS: u64 = 5;

// Name resolution
/// Compression suffixes accepted after the section number.
pub const COMPRESSION_SUFFIXES: [&str; 2] = ["gz", "bz2"];
/// Minimum dot-separated tokens in a compressed page's file name.
pub const MIN_COMPRESSED_NAME_TOKENS: usize = 3;

// Compression magic
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
pub const BZIP2_MAGIC: [u8; 2] = *b"BZ";

// Search behaviour
/// Titles printed by the search command.
pub const DEFAULT_RESULT_COUNT: usize = 19;

/// Environment variable overriding the log filter of both binaries.
pub const LOG_ENV: &str = "DISCOVERABILITY_LOG";
