//! Limit/offset handling for list queries

/// Page size used when a filter does not set one
pub const DEFAULT_LIMIT: i64 = 100;

/// Largest page a single query may return
pub const MAX_LIMIT: i64 = 1000;

/// Sanitized LIMIT/OFFSET pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitOffset {
    pub limit: i64,
    pub offset: i64,
}

/// Clamp requested limit/offset into valid bounds
///
/// # Examples
/// ```
/// use wtf_dial::pagination::{limit_offset, DEFAULT_LIMIT, MAX_LIMIT};
///
/// let p = limit_offset(None, None);
/// assert_eq!(p.limit, DEFAULT_LIMIT);
/// assert_eq!(p.offset, 0);
///
/// let p = limit_offset(Some(5000), Some(-3));
/// assert_eq!(p.limit, MAX_LIMIT);
/// assert_eq!(p.offset, 0);
/// ```
pub fn limit_offset(limit: Option<i64>, offset: Option<i64>) -> LimitOffset {
    let limit = match limit {
        Some(n) if n > 0 => n.min(MAX_LIMIT),
        _ => DEFAULT_LIMIT,
    };
    let offset = offset.unwrap_or(0).max(0);

    LimitOffset { limit, offset }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_values_pass_through() {
        assert_eq!(
            limit_offset(Some(20), Some(40)),
            LimitOffset { limit: 20, offset: 40 }
        );
    }

    #[test]
    fn test_zero_limit_uses_default() {
        assert_eq!(limit_offset(Some(0), None).limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_limit_capped() {
        assert_eq!(limit_offset(Some(MAX_LIMIT + 1), None).limit, MAX_LIMIT);
    }
}
