/// Validate a candidate order number against the Luhn mod-10 checksum.
///
/// Walking right to left, every second digit is doubled and digit sums above
/// nine are reduced by nine; the number is valid when the total is congruent
/// to zero mod 10. Only ASCII digits are accepted; any other byte (including
/// non-ASCII Unicode digits) and the empty string yield `false`.
pub fn valid_luhn(number: &str) -> bool {
    if number.is_empty() {
        return false;
    }

    let mut sum = 0u32;
    let mut double = false;
    for b in number.bytes().rev() {
        if !b.is_ascii_digit() {
            return false;
        }
        let mut digit = u32::from(b - b'0');
        if double {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        double = !double;
    }
    sum % 10 == 0
}
