//! Materialized department path helpers
//!
//! A department path is the ancestor names joined by `->`, ending with the
//! department's own name. All scope decisions are string-prefix checks.

use sea_orm::sea_query::LikeExpr;

/// Path separator
pub const SEPARATOR: &str = "->";

/// Deepest allowed department level
pub const MAX_LEVEL: i32 = 10;

/// Path of a child named `name` under `parent` (root when `None`)
pub fn child_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{}{}{}", parent, SEPARATOR, name),
        None => name.to_string(),
    }
}

/// Level implied by a path: separator count plus one
pub fn level_of(path: &str) -> i32 {
    path.matches(SEPARATOR).count() as i32 + 1
}

/// Last segment of a path
pub fn leaf_name(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}

/// `path` lies strictly below `ancestor`
pub fn is_descendant(ancestor: &str, path: &str) -> bool {
    !ancestor.is_empty()
        && path.len() > ancestor.len() + SEPARATOR.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(SEPARATOR)
}

/// `path` equals `ancestor` or lies below it
pub fn is_same_or_descendant(ancestor: &str, path: &str) -> bool {
    !ancestor.is_empty() && (path == ancestor || is_descendant(ancestor, path))
}

/// Replace the `old_prefix` of `path` with `new_prefix`
///
/// Returns `None` when `path` is neither `old_prefix` nor below it.
pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if path == old_prefix {
        Some(new_prefix.to_string())
    } else if is_descendant(old_prefix, path) {
        Some(format!("{}{}", new_prefix, &path[old_prefix.len()..]))
    } else {
        None
    }
}

/// LIKE pattern matching every path strictly below `ancestor`
///
/// `%`, `_` and `\` in the ancestor are escaped so they match literally.
pub fn descendant_pattern(ancestor: &str) -> LikeExpr {
    let mut escaped = String::with_capacity(ancestor.len() + 4);
    for c in ancestor.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push_str(SEPARATOR);
    escaped.push('%');
    LikeExpr::new(escaped).escape('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_path_and_level() {
        assert_eq!(child_path(None, "Sales"), "Sales");
        assert_eq!(child_path(Some("Sales"), "East"), "Sales->East");
        assert_eq!(level_of("Sales"), 1);
        assert_eq!(level_of("HQ->Sales->East"), 3);
        assert_eq!(leaf_name("HQ->Sales->East"), "East");
        assert_eq!(leaf_name("HQ"), "HQ");
    }

    #[test]
    fn test_descendant_checks() {
        assert!(is_descendant("Sales", "Sales->East"));
        assert!(is_descendant("Sales", "Sales->East->Shop 1"));
        assert!(!is_descendant("Sales", "Sales"));
        assert!(!is_descendant("Sales", "Sales-Global->East"));
        assert!(!is_descendant("Sales", "SalesOps->East"));
        assert!(!is_descendant("", "Sales"));
        assert!(is_same_or_descendant("Sales", "Sales"));
        assert!(!is_same_or_descendant("Sales->East", "Sales"));
        assert!(!is_same_or_descendant("", ""));
    }

    #[test]
    fn test_rebase() {
        assert_eq!(
            rebase("Sales->East", "Sales", "Sales-Global").as_deref(),
            Some("Sales-Global->East")
        );
        assert_eq!(rebase("Sales", "Sales", "HQ->Sales").as_deref(), Some("HQ->Sales"));
        assert_eq!(rebase("Salesforce", "Sales", "X"), None);
    }
}
