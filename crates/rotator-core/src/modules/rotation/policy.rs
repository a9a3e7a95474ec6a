//! Pure rotation decisions over account snapshots.

use rotator_types::{AccountStatus, CloudAccount};

/// Absent or empty quota counts as depleted, as does any model below `switch_threshold`.
pub fn is_depleted(account: &CloudAccount, switch_threshold: f64) -> bool {
    match &account.quota {
        Some(quota) if !quota.is_empty() => quota.any_below_threshold(switch_threshold),
        _ => true,
    }
}

/// Whether the active account must be rotated away from.
pub fn needs_rotation(account: &CloudAccount, switch_threshold: f64) -> bool {
    account.status == AccountStatus::RateLimited || is_depleted(account, switch_threshold)
}

/// Healthy candidate with the highest mean quota, excluding `current_id`.
/// Ties go to the account listed first.
pub fn find_best_account<'a>(
    accounts: &'a [CloudAccount],
    current_id: Option<&str>,
    switch_threshold: f64,
) -> Option<&'a CloudAccount> {
    accounts
        .iter()
        .filter(|a| Some(a.id.as_str()) != current_id)
        .filter(|a| a.status == AccountStatus::Active)
        .filter(|a| !is_depleted(a, switch_threshold))
        .fold(None, |best: Option<&'a CloudAccount>, candidate| match best {
            Some(best) if candidate.average_quota().total_cmp(&best.average_quota()).is_le() => {
                Some(best)
            },
            _ => Some(candidate),
        })
}

/// Average quota sits in the warning band `[switch, warning)`.
pub fn in_warning_band(average: f64, switch_threshold: f64, warning_threshold: f64) -> bool {
    average >= switch_threshold && average < warning_threshold
}
