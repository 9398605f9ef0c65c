// -
// Namespace

/// Path of the namespace root
pub(crate) const ROOT_PATH: &str = "/";

/// Path separator
pub(crate) const PATH_SEPARATOR: char = '/';

/// Digits used for the zero-padded sequential suffix
pub(crate) const SEQUENCE_DIGITS: usize = 10;

// -
// Protected creation

/// Prefix marking a node created through the protected-create protocol
pub const PROTECTED_PREFIX: &str = "_c_";

/// Separator between the protection token and the requested node name
pub(crate) const PROTECTED_SEPARATOR: char = '-';

/// Length of the protection token
pub(crate) const PROTECTION_TOKEN_LEN: usize = 21;

/// Alphabet of the protection token (no separator characters)
pub(crate) const PROTECTION_TOKEN_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

// -
// Snapshot

/// Format version written at the head of every store snapshot
pub(crate) const SNAPSHOT_FORMAT_VERSION: u32 = 1;
