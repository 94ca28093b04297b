use std::borrow::Cow;

use unicode_normalization::UnicodeNormalization;

/// Decode a response body as UTF-8, falling back to ISO-8859-1.
///
/// The fallback never fails: bytes in the C1 control range (0x80-0x9F) have no
/// printable Latin-1 mapping and are replaced with U+FFFD.
pub fn decode_body(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(err) => {
            tracing::debug!("UTF-8 decode failed ({}), falling back to ISO-8859-1", err);
            Cow::Owned(decode_latin1(bytes))
        }
    }
}

/// Decode ISO-8859-1; C1 control bytes become U+FFFD
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => char::REPLACEMENT_CHARACTER,
            _ => char::from(b),
        })
        .collect()
}

/// Decode HTML character references, trim, and normalize to NFC.
///
/// References follow HTML5 rules: legacy entities without a trailing
/// semicolon are expanded and numeric references in 0x80-0x9F map through
/// Windows-1252.
pub fn sanitize_text(raw: &str) -> String {
    let decoded = htmlize::unescape(raw);
    decoded.trim().nfc().collect()
}

/// Check whether text contains characters from the Arabic script blocks
/// (Arabic, Arabic Supplement, Arabic Extended-A)
pub fn contains_arabic(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}')
    })
}

/// Format a duration in seconds as a clock string: "M:SS" or "H:MM:SS"
pub fn format_clock_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' => c,
            _ => '_',
        })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

/// Generate a unique filename with timestamp
pub fn generate_unique_filename(base_name: &str, extension: &str) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let random_suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();

    format!(
        "{}_{}_{}.{}",
        sanitize_filename(base_name),
        timestamp,
        random_suffix,
        extension
    )
}

/// Mask a secret for display, keeping only its last four characters
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}
