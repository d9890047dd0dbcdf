//! Patient queue token formatting.

/// Prefix carried by tokens issued to emergency registrations.
pub const EMERGENCY_PREFIX: &str = "E-";

/// Format a queue token: `{code}-{seq:03}`, prefixed with `E-` for emergencies.
///
/// Sequence numbers wider than three digits are printed in full.
pub fn format_token_number(code: &str, seq: u64, emergency: bool) -> String {
    let base = format!("{code}-{seq:03}");
    if emergency {
        format!("{EMERGENCY_PREFIX}{base}")
    } else {
        base
    }
}

/// Token prefix for a department: its code, or the first three characters of
/// its name uppercased when the code is empty.
pub fn department_prefix(code: &str, name: &str) -> String {
    let code = code.trim();
    if code.is_empty() {
        name.trim().chars().take(3).collect::<String>().to_uppercase()
    } else {
        code.to_string()
    }
}
