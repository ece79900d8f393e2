//! Domain services
//!
//! Handlers stay thin; every rule about departments, scopes, balances and
//! approvals lives here. Multi-row writes run inside one transaction.

pub mod access;
pub mod department;
pub mod finance;
pub mod ledger;
pub mod role;
pub mod user;

use serde::{Deserialize, Deserializer};

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Random upper-case alphanumeric token of `len` characters (max 32)
pub fn random_token(len: usize) -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    raw[..len.min(raw.len())].to_string()
}

/// Attempts made before giving up on a unique generated code
pub const CODE_ATTEMPTS: usize = 8;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

/// Paging parameters shared by list endpoints
#[derive(Debug, Clone, Copy)]
pub struct PageQuery {
    pub page: u64,
    pub page_size: u64,
}

impl PageQuery {
    /// From optional query parameters of a filtered list endpoint
    pub fn new(page: Option<u64>, page_size: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }

    /// Zero-based page index for sea-orm paginators
    pub fn index(&self) -> u64 {
        self.page.max(1) - 1
    }

    pub fn size(&self) -> u64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

/// One page of results plus totals
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        parent_id: Option<Option<i64>>,
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.parent_id, None);
        let null: Patch = serde_json::from_str(r#"{"parent_id": null}"#).unwrap();
        assert_eq!(null.parent_id, Some(None));
        let set: Patch = serde_json::from_str(r#"{"parent_id": 7}"#).unwrap();
        assert_eq!(set.parent_id, Some(Some(7)));
    }

    #[test]
    fn test_random_token() {
        let token = random_token(8);
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_page_query_clamps() {
        let q = PageQuery { page: 0, page_size: 1000 };
        assert_eq!(q.index(), 0);
        assert_eq!(q.size(), 100);

        let q = PageQuery::new(None, None);
        assert_eq!((q.page, q.size()), (1, 20));
    }
}
