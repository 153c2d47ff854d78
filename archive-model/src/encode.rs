/// Encodes a session id into the short, URL-safe token used to derive
/// stable archive filenames (`archive/{encoded}-...`).
///
/// This is a pure function of the integer: same input always yields the
/// same output, with no padding or sign handling beyond what `u64` allows.
/// Encoding `42` yields `"2A"`, matching `archive/2A-1.mp3` etc. in the
/// worked examples.
pub fn encode_session_id(session_id: i64) -> String {
    format!("{:X}", session_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_known_values() {
        assert_eq!(encode_session_id(42), "2A");
        assert_eq!(encode_session_id(0), "0");
        assert_eq!(encode_session_id(255), "FF");
    }

    #[test]
    fn is_a_pure_function() {
        assert_eq!(encode_session_id(987654), encode_session_id(987654));
    }
}
