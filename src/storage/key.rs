use uuid::Uuid;

use crate::db::truncate_chars;

/// Longest sanitized filename kept in an object key.
pub const MAX_NAME_CHARS: usize = 140;
/// Base-name length kept when an over-long name is shortened around its extension.
pub const TRUNCATED_BASE_CHARS: usize = 120;

/// Basename, trimmed, capped at `MAX_NAME_CHARS` with the extension preserved.
pub fn safe_filename(original_name: &str) -> String {
    let base = original_name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if base.is_empty() {
        return "file".to_string();
    }
    if base.chars().count() <= MAX_NAME_CHARS {
        return base.to_string();
    }

    let shortened = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let mut name = truncate_chars(stem, TRUNCATED_BASE_CHARS);
            if !ext.is_empty() {
                name.push('.');
                name.push_str(ext);
            }
            name
        }
        _ => truncate_chars(base, MAX_NAME_CHARS),
    };

    truncate_chars(&shortened, MAX_NAME_CHARS)
}

/// Namespace for a user's upload into one conversation.
pub fn upload_prefix(owner_id: &str, conversation_id: &str) -> String {
    format!("uploads/{}/{}/", owner_id, conversation_id)
}

/// A fresh, never-reused object key: `{prefix}{random hex}-{safe name}`.
pub fn mint_key(original_name: &str, namespace_prefix: &str) -> String {
    let prefix = namespace_prefix.trim_start_matches('/');
    let separator = if prefix.is_empty() || prefix.ends_with('/') { "" } else { "/" };

    format!(
        "{}{}{}-{}",
        prefix,
        separator,
        Uuid::new_v4().simple(),
        safe_filename(original_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_are_trimmed_only() {
        assert_eq!(safe_filename("  report.pdf "), "report.pdf");
        assert_eq!(safe_filename(""), "file");
        assert_eq!(safe_filename("C:\\docs\\scan.pdf"), "scan.pdf");
    }

    #[test]
    fn long_names_keep_extension() {
        let name = format!("{}.pdf", "a".repeat(200));
        let safe = safe_filename(&name);
        assert_eq!(safe, format!("{}.pdf", "a".repeat(120)));
        assert!(safe.chars().count() <= MAX_NAME_CHARS);
    }

    #[test]
    fn long_names_without_extension_are_cut() {
        let safe = safe_filename(&"b".repeat(300));
        assert_eq!(safe.chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn long_multibyte_names_count_characters() {
        let name = format!("{}.pdf", "가".repeat(150));
        let safe = safe_filename(&name);
        assert_eq!(safe.chars().count(), 124);
        assert!(safe.ends_with(".pdf"));
    }

    #[test]
    fn minted_keys_are_unique_and_prefixed() {
        let name = format!("{}.pdf", "a".repeat(200));
        let first = mint_key(&name, "uploads/u1/c1/");
        let second = mint_key(&name, "uploads/u1/c1/");
        assert_ne!(first, second);

        let rest = first.strip_prefix("uploads/u1/c1/").unwrap();
        let (token, file) = rest.split_once('-').unwrap();
        assert_eq!(token.len(), 32);
        assert!(file.ends_with(".pdf"));
        assert!(file.chars().count() <= MAX_NAME_CHARS);
    }

    #[test]
    fn prefix_gets_separator() {
        let key = mint_key("a.pdf", "/uploads");
        assert!(key.starts_with("uploads/"));
        assert!(key.ends_with("-a.pdf"));
    }
}
