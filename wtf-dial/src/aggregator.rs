//! Dial value aggregation
//!
//! A dial's value is the mean of its membership values, rounded half away
//! from zero (1.5 → 2, 2.5 → 3, -1.5 → -2). A dial with no members has
//! value 0.

use crate::db::{dials, memberships};
use crate::tx::Tx;
use wtf_common::{DialId, Result};

/// Old and new value of one recompute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recompute {
    pub dial_id: DialId,
    pub old_value: i64,
    pub new_value: i64,
}

impl Recompute {
    /// Whether the stored value needs updating
    pub fn changed(&self) -> bool {
        self.old_value != self.new_value
    }
}

/// Rounded mean of `values`; 0 for an empty slice
///
/// Computed in integer arithmetic so large sums never lose precision.
pub fn aggregate(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }

    let sum: i128 = values.iter().map(|&v| v as i128).sum();
    let n = values.len() as i128;

    // round(sum / n) with ties away from zero == floor((2|sum| + n) / 2n) * sign
    let magnitude = (2 * sum.abs() + n) / (2 * n);
    let rounded = if sum < 0 { -magnitude } else { magnitude };

    // The mean lies between min and max of the inputs, so it fits in i64.
    rounded as i64
}

/// Recompute a dial's value from its current memberships
///
/// Reads the stored value under the dial row lock. Returns `None` if the dial
/// does not exist. Never writes the value.
pub async fn recompute(tx: &mut Tx, dial_id: DialId) -> Result<Option<Recompute>> {
    let Some(locked) = dials::lock_dial(tx, dial_id).await? else {
        return Ok(None);
    };

    let values = memberships::list_member_values(tx, dial_id).await?;
    let new_value = aggregate(&values);

    tracing::trace!(
        dial_id,
        members = values.len(),
        old_value = locked.value,
        new_value,
        "Recomputed dial value"
    );

    Ok(Some(Recompute {
        dial_id,
        old_value: locked.value,
        new_value,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::dials::create_dial;
    use crate::db::memberships::upsert_membership;
    use crate::db::test_support::TestDb;

    #[test]
    fn test_mean_of_members() {
        assert_eq!(aggregate(&[10, 20, 30]), 20);
    }

    #[test]
    fn test_no_members_is_zero() {
        assert_eq!(aggregate(&[]), 0);
    }

    #[test]
    fn test_ties_round_away_from_zero() {
        assert_eq!(aggregate(&[1, 2]), 2);
        assert_eq!(aggregate(&[2, 3]), 3);
        assert_eq!(aggregate(&[-1, -2]), -2);
        assert_eq!(aggregate(&[0, 1]), 1);
    }

    #[test]
    fn test_non_ties_round_to_nearest() {
        // 4/3 = 1.33 → 1, 5/3 = 1.67 → 2
        assert_eq!(aggregate(&[1, 1, 2]), 1);
        assert_eq!(aggregate(&[1, 2, 2]), 2);
        assert_eq!(aggregate(&[-1, -2, -2]), -2);
    }

    #[test]
    fn test_matches_float_round_semantics() {
        let samples: &[&[i64]] = &[&[0, 100, 33], &[7, 8], &[99, 100, 100, 0], &[-5, 4]];
        for values in samples {
            let mean = values.iter().sum::<i64>() as f64 / values.len() as f64;
            assert_eq!(aggregate(values), mean.round() as i64, "values = {:?}", values);
        }
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        assert_eq!(aggregate(&[i64::MAX, i64::MAX]), i64::MAX);
        assert_eq!(aggregate(&[i64::MIN, i64::MIN]), i64::MIN);
    }

    #[tokio::test]
    async fn test_recompute_missing_dial_is_none() {
        let db = TestDb::new().await;
        let mut tx = db.begin().await;
        assert!(recompute(&mut tx, 404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recompute_reports_change_without_writing() {
        let db = TestDb::new().await;
        let mut tx = db.begin().await;
        let dial = create_dial(&mut tx, 1, "Team").await.unwrap();
        upsert_membership(&mut tx, dial.id, 1, 10).await.unwrap();
        upsert_membership(&mut tx, dial.id, 2, 21).await.unwrap();

        let result = recompute(&mut tx, dial.id).await.unwrap().unwrap();
        assert_eq!(result.old_value, 0);
        assert_eq!(result.new_value, 16);
        assert!(result.changed());

        let again = recompute(&mut tx, dial.id).await.unwrap().unwrap();
        assert_eq!(again.old_value, 0, "recompute must not store the value");
    }
}
