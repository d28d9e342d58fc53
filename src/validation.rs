/// Number of characters every captcha on the target site carries.
pub const EXPECTED_LEN: usize = 4;

/// Drop everything that is not an ASCII letter or digit.
pub fn clean_text(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Exactly four ASCII alphanumeric characters.
///
/// Only decides whether the enhanced pass runs; a miss is never an error.
pub fn is_valid_result(text: &str) -> bool {
    text.len() == EXPECTED_LEN && text.chars().all(|c| c.is_ascii_alphanumeric())
}
