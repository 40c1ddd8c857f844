//! Upstream API access: resilient client, season resolution, event discovery
//! and identity checks.

pub mod cache;
pub mod client;
pub mod events;
pub mod identity;
pub mod rate_limiter;
pub mod seasons;

pub use client::{ApiClient, FetchError, HttpTransport};
pub use rate_limiter::RateLimiter;

use chrono::NaiveDate;

use crate::types::ApiPathVariant;

/// Build season list URL
/// URL: {base}/tournament/{tid}/seasons
pub fn seasons_url(base: &str, variant: ApiPathVariant, tournament_id: i64) -> String {
    format!("{}/{}/{}/seasons", base, variant.as_path(), tournament_id)
}

/// Build season events URL
/// URL: {base}/tournament/{tid}/season/{sid}/events
pub fn season_events_url(
    base: &str,
    variant: ApiPathVariant,
    tournament_id: i64,
    season_id: i64,
) -> String {
    format!(
        "{}/{}/{}/season/{}/events",
        base,
        variant.as_path(),
        tournament_id,
        season_id
    )
}

/// Build daily schedule URL
/// URL: {base}/sport/{sport}/scheduled-events/YYYY-MM-DD
pub fn scheduled_events_url(base: &str, sport: &str, day: NaiveDate) -> String {
    format!(
        "{}/sport/{}/scheduled-events/{}",
        base,
        sport,
        day.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://api.sofascore.com/api/v1";

    #[test]
    fn test_seasons_url() {
        assert_eq!(
            seasons_url(BASE, ApiPathVariant::Tournament, 8),
            "https://api.sofascore.com/api/v1/tournament/8/seasons"
        );
        assert_eq!(
            seasons_url(BASE, ApiPathVariant::UniqueTournament, 7),
            "https://api.sofascore.com/api/v1/unique-tournament/7/seasons"
        );
    }

    #[test]
    fn test_season_events_url() {
        assert_eq!(
            season_events_url(BASE, ApiPathVariant::UniqueTournament, 7, 76953),
            "https://api.sofascore.com/api/v1/unique-tournament/7/season/76953/events"
        );
    }

    #[test]
    fn test_scheduled_events_url() {
        let day = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(
            scheduled_events_url(BASE, "football", day),
            "https://api.sofascore.com/api/v1/sport/football/scheduled-events/2025-07-01"
        );
    }
}
