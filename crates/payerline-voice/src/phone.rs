//! Phone number normalization for the provider's international format.

/// Normalize a US phone number to the provider's `+`-prefixed format.
///
/// Spaces and dashes are stripped, then: a bare 10-digit number gets `+1`,
/// an 11-digit number already starting with the country code gets `+`, and
/// anything else passes through unchanged.
pub fn normalize_phone(phone: &str) -> String {
    let phone: String = phone.trim().chars().filter(|c| *c != ' ' && *c != '-').collect();
    if !phone.starts_with('+') {
        if phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit()) {
            return format!("+1{phone}");
        }
        if phone.len() == 11
            && phone.starts_with('1')
            && phone.bytes().all(|b| b.is_ascii_digit())
        {
            return format!("+{phone}");
        }
    }
    phone
}
