//! Log sanitization
//!
//! Identifiers and emails are truncated before they reach the logs so that
//! operations stay debuggable without exposing who took part in which escrow.

// ============================================================================
// ID Sanitization
// ============================================================================

/// Sanitize a UUID for logs
///
/// Format: "abc12345...90ef" (first 8 + last 4 chars)
pub fn sanitize_uuid(uuid: &uuid::Uuid) -> String {
    let uuid_str = uuid.to_string();
    format!("{}...{}", &uuid_str[..8], &uuid_str[uuid_str.len() - 4..])
}

/// Sanitize a transaction, participant or user id for logs
pub fn sanitize_id(id: &str) -> String {
    if let Ok(uuid) = uuid::Uuid::parse_str(id) {
        sanitize_uuid(&uuid)
    } else if id.is_ascii() && id.len() >= 12 {
        format!("{}...{}", &id[..8], &id[id.len() - 4..])
    } else {
        "[invalid_id]".to_string()
    }
}

// ============================================================================
// Email Sanitization
// ============================================================================

/// Sanitize an email for logs
///
/// Format: "j***@example.com". The domain is kept since it rarely identifies
/// a person on its own and helps spot typos in invitations.
pub fn sanitize_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        _ => "[invalid_email]".to_string(),
    }
}

/// Sanitize an optional email, logging absence explicitly
pub fn sanitize_opt_email(email: Option<&str>) -> String {
    email.map(sanitize_email).unwrap_or_else(|| "[none]".to_string())
}
