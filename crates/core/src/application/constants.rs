// Application constants (no magic values)

/// Pipeline that prints every non-loopback interface address, one per line
///
/// Must stay byte-for-byte identical.
pub const IP_DISCOVERY_COMMAND: &str = "ip a | grep 'inet' | grep -v '127.0.0.1' | cut -d: -f2 | awk '{ print $2 }' | cut -f1 -d\"/\"";

/// Whole probe result when the channel fails
/// Starts with `#` so a hosts file line built from it is a comment
pub const NOT_UP_SENTINEL: &str = "# NOT-UP";

/// Hosts file marker for machines that answered with no address
pub const UNKNOWN_MARKER: &str = "# UNKNOWN";

/// First line of the managed hosts block
pub const HOSTS_BLOCK_BEGIN: &str = "# BEGIN guestctl";

/// Last line of the managed hosts block
pub const HOSTS_BLOCK_END: &str = "# END guestctl";
