//! Address redaction for logs and error context.

/// Mask a recipient address for display.
///
/// Keeps up to three leading and trailing characters (a quarter of the
/// address each, rounded down) and replaces the rest with `*`. Addresses of
/// four characters or fewer are masked entirely.
///
/// ```
/// use sms_guard::mask_address;
///
/// assert_eq!(mask_address("+1555000111"), "+1*******11");
/// assert_eq!(mask_address("1234"), "****");
/// ```
pub fn mask_address(address: &str) -> String {
    let chars: Vec<char> = address.trim().chars().collect();
    let len = chars.len();
    if len <= 4 {
        return "*".repeat(len);
    }

    let keep = (len / 4).min(3);
    let mut masked = String::with_capacity(len);
    masked.extend(&chars[..keep]);
    masked.extend(std::iter::repeat('*').take(len - 2 * keep));
    masked.extend(&chars[len - keep..]);
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_number() {
        assert_eq!(mask_address("13800138000"), "13*******00");
    }

    #[test]
    fn test_long_address_keeps_three() {
        assert_eq!(mask_address("alice@example.com"), "ali***********com");
    }

    #[test]
    fn test_short_addresses_fully_masked() {
        assert_eq!(mask_address(""), "");
        assert_eq!(mask_address("12"), "**");
        assert_eq!(mask_address("12345"), "1***5");
    }

    #[test]
    fn test_whitespace_trimmed() {
        assert_eq!(mask_address("  13800138000 "), mask_address("13800138000"));
    }

    #[test]
    fn test_multibyte_characters() {
        let masked = mask_address("用户用户用户用户");
        assert_eq!(masked.chars().count(), 8);
        assert!(masked.contains('*'));
    }
}
