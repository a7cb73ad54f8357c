//! Scorecard staleness: a service is stale when the check suite it was scored
//! against differs from the one currently published. Wall-clock age plays no part.

use serde::Serialize;

use crate::models::Service;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StalenessInfo {
    pub is_stale: bool,
    pub message: String,
    pub service_hash: String,
    pub current_hash: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StalenessStats {
    pub total: usize,
    pub stale: usize,
    pub up_to_date: usize,
    pub percentage: u32,
}

/// An unknown current fingerprint is never evidence of staleness. A service
/// with no recorded fingerprint is stale once the current one is known.
pub fn is_stale(service: &Service, current: Option<&str>) -> bool {
    match current {
        Some(current) if !current.is_empty() => service.checks_hash.as_deref() != Some(current),
        _ => false,
    }
}

pub fn staleness_info(service: &Service, current: Option<&str>) -> StalenessInfo {
    let stale = is_stale(service, current);
    StalenessInfo {
        is_stale: stale,
        message: if stale {
            "Score may be outdated (checks have been updated)".to_string()
        } else {
            "Score is current".to_string()
        },
        service_hash: service
            .checks_hash
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        current_hash: current
            .filter(|c| !c.is_empty())
            .unwrap_or("unknown")
            .to_string(),
    }
}

pub fn filter_stale<'a>(services: &'a [Service], current: Option<&str>) -> Vec<&'a Service> {
    services.iter().filter(|s| is_stale(s, current)).collect()
}

pub fn staleness_stats(services: &[Service], current: Option<&str>) -> StalenessStats {
    let total = services.len();
    let stale = services.iter().filter(|s| is_stale(s, current)).count();
    StalenessStats {
        total,
        stale,
        up_to_date: total - stale,
        percentage: percent(stale, total),
    }
}

/// Stale services that are installed; only those can be re-scored in place.
pub fn count_stale_installed(services: &[Service], current: Option<&str>) -> usize {
    services
        .iter()
        .filter(|s| s.installed && is_stale(s, current))
        .count()
}

pub(crate) fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}
