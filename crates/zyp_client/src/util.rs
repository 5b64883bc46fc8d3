//! Display helpers for member phone identifiers.

/// Progressive North-American phone formatting, suitable for rendering as
/// the user types. Anything with non-digit characters (beyond a leading
/// `+`) is returned untouched.
pub fn format_phone(tel: &str) -> String {
    if tel.is_empty() {
        return String::new();
    }
    let value = tel.trim().trim_start_matches('+');
    if value.chars().any(|c| !c.is_ascii_digit()) {
        return tel.to_string();
    }

    if value.len() <= 3 {
        return format!("({value}");
    }
    let (city, number) = value.split_at(3);
    let number = if number.len() > 3 {
        format!("{}-{}", &number[..3], &number[3..number.len().min(7)])
    } else {
        number.to_string()
    };
    format!("({city}) {number}").trim().to_string()
}

/// Reduce a formatted phone number to bare digits, dropping a leading
/// country code when present.
pub fn strip_phone(phone: &str) -> String {
    let digits: String = phone
        .chars()
        .filter(|c| !matches!(c, '+' | '(' | ')' | '-' | ' '))
        .collect();
    if digits.len() == 11 {
        digits[1..].to_string()
    } else {
        digits
    }
}

pub fn strip_spaces(key: &str) -> String {
    key.chars().filter(|c| *c != ' ').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_progressively() {
        assert_eq!(format_phone(""), "");
        assert_eq!(format_phone("55"), "(55");
        assert_eq!(format_phone("555"), "(555");
        assert_eq!(format_phone("555123"), "(555) 123");
        assert_eq!(format_phone("5551234567"), "(555) 123-4567");
    }

    #[test]
    fn non_digits_pass_through() {
        assert_eq!(format_phone("+1 555"), "+1 555");
        assert_eq!(format_phone("ext. 42"), "ext. 42");
    }

    #[test]
    fn strips_formatting_and_country_code() {
        assert_eq!(strip_phone("(555) 123-4567"), "5551234567");
        assert_eq!(strip_phone("+1 (555) 123-4567"), "5551234567");
    }

    #[test]
    fn strips_spaces_only() {
        assert_eq!(strip_spaces("AB CD EF"), "ABCDEF");
    }
}
