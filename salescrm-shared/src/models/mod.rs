/// Database models for SalesCRM
///
/// Each model owns its table(s): row structs deriving `sqlx::FromRow`,
/// camelCase request structs deriving `validator::Validate`, and async CRUD
/// functions that always take the tenant id. Models with an owner column
/// implement [`crate::auth::scope::Owned`] and their `list` functions take
/// an optional owner filter produced by [`crate::auth::scope::Scope::owner_filter`].
///
/// # Example
///
/// ```no_run
/// use salescrm_shared::models::account::{Account, AccountFilter};
/// use salescrm_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(tenant_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let (accounts, total) =
///     Account::list(&pool, tenant_id, &AccountFilter::default(), None, 20, 0).await?;
/// println!("{} of {} accounts", accounts.len(), total);
/// # Ok(())
/// # }
/// ```

pub mod account;
pub mod activity_log;
pub mod calendar_event;
pub mod contact;
pub mod dashboard;
pub mod deal;
pub mod email;
pub mod lead;
pub mod master_data;
pub mod notification;
pub mod partner;
pub mod product;
pub mod quote;
pub mod role_permission;
pub mod sales_entry;
pub mod task;
pub mod tenant;
pub mod user;

/// `%term%` for ILIKE searches; blank input means no search
///
/// `%`, `_` and `\` in the term match literally (backslash is the
/// default LIKE escape in PostgreSQL).
pub(crate) fn like_pattern(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut pattern = String::with_capacity(s.len() + 2);
            pattern.push('%');
            for c in s.chars() {
                if matches!(c, '%' | '_' | '\\') {
                    pattern.push('\\');
                }
                pattern.push(c);
            }
            pattern.push('%');
            pattern
        })
}

/// Rounds to cents
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `quantity × unit_price × (1 − discount%/100)`, rounded to cents
pub fn line_total(quantity: f64, unit_price: f64, discount_percent: f64) -> f64 {
    round_money(quantity * unit_price * (1.0 - discount_percent / 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern(&Some(" acme ".to_string())), Some("%acme%".to_string()));
        assert_eq!(like_pattern(&Some("   ".to_string())), None);
        assert_eq!(like_pattern(&None), None);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(&Some("50%".to_string())), Some("%50\\%%".to_string()));
        assert_eq!(like_pattern(&Some("a_b".to_string())), Some("%a\\_b%".to_string()));
        assert_eq!(like_pattern(&Some("c:\\tmp".to_string())), Some("%c:\\\\tmp%".to_string()));
    }

    #[test]
    fn test_money_rounding() {
        assert_eq!(round_money(10.005_1), 10.01);
        assert_eq!(round_money(3.333), 3.33);
        assert_eq!(line_total(3.0, 19.99, 0.0), 59.97);
        assert_eq!(line_total(2.0, 100.0, 15.0), 170.0);
        assert_eq!(line_total(0.0, 100.0, 0.0), 0.0);
    }
}
