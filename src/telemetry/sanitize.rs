//! Log sanitization for client-supplied values.

/// Longest prefix of an untrusted value that is ever written to a log line
pub const MAX_LOGGED_CHARS: usize = 50;

/// Make a client-supplied value safe to log: control characters become `_`
/// and the result is cut to [`MAX_LOGGED_CHARS`] characters.
pub fn sanitize_for_log(input: &str) -> String {
    input
        .chars()
        .take(MAX_LOGGED_CHARS)
        .map(|c| if c.is_control() { '_' } else { c })
        .collect()
}
