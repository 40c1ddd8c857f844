//! Domain types: competition definitions, upstream event payloads and
//! persisted index rows.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Status code the upstream uses for a match with a final result
pub const FINISHED_STATUS_CODE: i64 = 100;

/// Sentinel home team id on rows rebuilt without API metadata
pub const PLACEHOLDER_HOME_TEAM_ID: i64 = -1;
/// Sentinel away team id on rows rebuilt without API metadata
pub const PLACEHOLDER_AWAY_TEAM_ID: i64 = -2;
/// Sentinel kickoff (2021-01-01T00:00:00Z) on rows rebuilt without API metadata
pub const PLACEHOLDER_MATCH_DATE: i64 = 1_609_459_200;

/// Which upstream path family addresses a tournament
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiPathVariant {
    #[default]
    Tournament,
    UniqueTournament,
}

impl ApiPathVariant {
    pub fn as_path(&self) -> &'static str {
        match self {
            ApiPathVariant::Tournament => "tournament",
            ApiPathVariant::UniqueTournament => "unique-tournament",
        }
    }
}

impl fmt::Display for ApiPathVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_path())
    }
}

/// One competition as written in the competitions file
#[derive(Debug, Clone, Deserialize)]
pub struct CompetitionEntry {
    pub tournament_id: i64,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub realm: Option<String>,
    #[serde(default, alias = "api_path")]
    pub api_path_variant: Option<ApiPathVariant>,
    #[serde(default, alias = "expected_tournament_slugs")]
    pub allowed_slug_aliases: Vec<String>,
    /// Season ids pinned by hand for tournaments whose season list is blocked
    #[serde(default)]
    pub pinned_seasons: BTreeMap<String, i64>,
}

/// Immutable description of a competition to crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitionSpec {
    pub tournament_id: i64,
    pub slug: String,
    pub realm: String,
    pub api_path_variant: ApiPathVariant,
    pub allowed_slug_aliases: BTreeSet<String>,
    pub pinned_seasons: BTreeMap<String, i64>,
}

impl CompetitionSpec {
    /// Build the spec for the competition stored under `key`
    pub fn from_entry(key: &str, entry: CompetitionEntry) -> Self {
        let slug = entry
            .slug
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| key.to_string());

        Self {
            tournament_id: entry.tournament_id,
            slug,
            realm: entry.realm.unwrap_or_else(|| "club".to_string()),
            api_path_variant: entry.api_path_variant.unwrap_or_default(),
            allowed_slug_aliases: entry
                .allowed_slug_aliases
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            pinned_seasons: entry.pinned_seasons,
        }
    }

    /// Canonical slug plus every configured alias
    pub fn allowed_slugs(&self) -> BTreeSet<String> {
        let mut slugs = self.allowed_slug_aliases.clone();
        slugs.insert(self.slug.clone());
        slugs
    }
}

// ==================== Upstream payloads ====================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTournament {
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSeasonRef {
    #[serde(default)]
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTeam {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStatus {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRoundInfo {
    #[serde(default)]
    pub round: Option<i64>,
}

/// Event as returned by the season-events and scheduled-events endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub id: i64,
    #[serde(default)]
    pub tournament: Option<RawTournament>,
    #[serde(default)]
    pub season: Option<RawSeasonRef>,
    #[serde(default)]
    pub home_team: Option<RawTeam>,
    #[serde(default)]
    pub away_team: Option<RawTeam>,
    #[serde(default)]
    pub start_timestamp: Option<i64>,
    #[serde(default)]
    pub status: Option<RawStatus>,
    #[serde(default)]
    pub round_info: Option<RawRoundInfo>,
}

impl RawEvent {
    pub fn status_code(&self) -> Option<i64> {
        self.status.as_ref().and_then(|s| s.code)
    }

    pub fn is_finished(&self) -> bool {
        self.status_code() == Some(FINISHED_STATUS_CODE)
    }

    /// Reported tournament slug, trimmed; empty when absent
    pub fn tournament_slug(&self) -> &str {
        self.tournament
            .as_ref()
            .and_then(|t| t.slug.as_deref())
            .map(str::trim)
            .unwrap_or("")
    }

    pub fn season_id(&self) -> Option<i64> {
        self.season.as_ref().and_then(|s| s.id)
    }
}

/// Body of the season-events and scheduled-events endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsPage {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// Daily schedule body with events left undecoded.
///
/// The schedule mixes every tournament of the day; one foreign event with an
/// odd shape must not cost the whole day.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulePage {
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSeason {
    pub id: i64,
    #[serde(default)]
    pub year: Option<String>,
}

/// Body of the season-list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeasonsPage {
    #[serde(default)]
    pub seasons: Vec<RawSeason>,
}

// ==================== Persisted index ====================

/// Column order of the persisted index
pub const INDEX_COLUMNS: [&str; 12] = [
    "match_id",
    "season",
    "realm",
    "competition_slug",
    "home_team_id",
    "home_team_name",
    "away_team_id",
    "away_team_name",
    "match_date",
    "round",
    "status_code",
    "status_type",
];

/// One row of the match index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(deserialize_with = "match_id_string")]
    pub match_id: String,
    pub season: String,
    pub realm: String,
    pub competition_slug: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub home_team_id: Option<i64>,
    #[serde(default)]
    pub home_team_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub away_team_id: Option<i64>,
    #[serde(default)]
    pub away_team_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub match_date: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub round: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub status_code: Option<i64>,
    #[serde(default)]
    pub status_type: Option<String>,
}

impl MatchRecord {
    /// Convert an accepted upstream event into an index row
    pub fn from_event(event: &RawEvent, season: &str, realm: &str, slug: &str) -> Self {
        let home = event.home_team.clone().unwrap_or_default();
        let away = event.away_team.clone().unwrap_or_default();
        let status = event.status.clone().unwrap_or_default();

        Self {
            match_id: event.id.to_string(),
            season: season.to_string(),
            realm: realm.to_string(),
            competition_slug: slug.to_string(),
            home_team_id: home.id,
            home_team_name: home.name,
            away_team_id: away.id,
            away_team_name: away.name,
            match_date: event.start_timestamp,
            round: event.round_info.as_ref().and_then(|r| r.round),
            status_code: status.code,
            status_type: status.kind,
        }
    }

    /// Whether this row carries sentinel values instead of API metadata
    pub fn is_placeholder(&self) -> bool {
        self.home_team_id == Some(PLACEHOLDER_HOME_TEAM_ID)
            || self.away_team_id == Some(PLACEHOLDER_AWAY_TEAM_ID)
            || self.match_date == Some(PLACEHOLDER_MATCH_DATE)
    }

    pub fn key(&self) -> String {
        normalize_match_id(&self.match_id)
    }
}

/// Canonical string form of a match id.
///
/// Ids that went through a float column come back as `"123.0"`; those
/// collapse to `"123"` so keys compare equal across storage round-trips.
pub fn normalize_match_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return v.to_string();
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 => {
            format!("{}", v as i64)
        }
        _ => trimmed.to_string(),
    }
}

fn parse_lenient_i64(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
        _ => None,
    }
}

/// Accepts `12`, `"12"`, `"12.0"` and empty cells
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_lenient_i64))
}

fn match_id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(normalize_match_id(&raw))
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    /// Finished event with full metadata
    pub fn event(id: i64, slug: &str, season_id: i64) -> RawEvent {
        event_with_status(id, slug, season_id, FINISHED_STATUS_CODE, "finished")
    }

    pub fn event_with_status(
        id: i64,
        slug: &str,
        season_id: i64,
        code: i64,
        kind: &str,
    ) -> RawEvent {
        RawEvent {
            id,
            tournament: Some(RawTournament {
                slug: Some(slug.to_string()),
            }),
            season: Some(RawSeasonRef { id: Some(season_id) }),
            home_team: Some(RawTeam {
                id: Some(2817),
                name: Some("Barcelona".to_string()),
            }),
            away_team: Some(RawTeam {
                id: Some(2829),
                name: Some("Real Madrid".to_string()),
            }),
            start_timestamp: Some(1_700_000_000 + id),
            status: Some(RawStatus {
                code: Some(code),
                kind: Some(kind.to_string()),
            }),
            round_info: Some(RawRoundInfo { round: Some(12) }),
        }
    }

    pub fn record(match_id: &str) -> MatchRecord {
        MatchRecord {
            match_id: match_id.to_string(),
            season: "2024-25".to_string(),
            realm: "club".to_string(),
            competition_slug: "laliga".to_string(),
            home_team_id: Some(2817),
            home_team_name: Some("Barcelona".to_string()),
            away_team_id: Some(2829),
            away_team_name: Some("Real Madrid".to_string()),
            match_date: Some(1_700_000_000),
            round: Some(12),
            status_code: Some(FINISHED_STATUS_CODE),
            status_type: Some("finished".to_string()),
        }
    }

    pub fn placeholder(match_id: &str) -> MatchRecord {
        MatchRecord {
            home_team_id: Some(PLACEHOLDER_HOME_TEAM_ID),
            home_team_name: None,
            away_team_id: Some(PLACEHOLDER_AWAY_TEAM_ID),
            away_team_name: None,
            match_date: Some(PLACEHOLDER_MATCH_DATE),
            round: None,
            ..record(match_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_normalize_match_id() {
        assert_eq!(normalize_match_id("12345"), "12345");
        assert_eq!(normalize_match_id("12345.0"), "12345");
        assert_eq!(normalize_match_id(" 12345 "), "12345");
        assert_eq!(normalize_match_id("abc"), "abc");
        assert_eq!(normalize_match_id("007"), "7");
        assert_eq!(normalize_match_id("+42"), "42");
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(placeholder("1").is_placeholder());
        assert!(!record("1").is_placeholder());

        // Any one sentinel is enough
        let only_date = MatchRecord {
            match_date: Some(PLACEHOLDER_MATCH_DATE),
            ..record("1")
        };
        assert!(only_date.is_placeholder());
    }

    #[test]
    fn test_record_from_event() {
        let e = event(42, "laliga", 61643);
        let row = MatchRecord::from_event(&e, "2024-25", "club", "spain-laliga");

        assert_eq!(row.match_id, "42");
        assert_eq!(row.competition_slug, "spain-laliga");
        assert_eq!(row.home_team_name.as_deref(), Some("Barcelona"));
        assert_eq!(row.round, Some(12));
        assert_eq!(row.status_code, Some(FINISHED_STATUS_CODE));
        assert_eq!(row.status_type.as_deref(), Some("finished"));
    }

    #[test]
    fn test_raw_event_tolerates_missing_objects() {
        let e: RawEvent = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(e.tournament_slug(), "");
        assert_eq!(e.season_id(), None);
        assert!(!e.is_finished());
    }

    #[test]
    fn test_raw_event_camel_case() {
        let json = r#"{
            "id": 11,
            "tournament": {"id": 8, "slug": " laliga "},
            "season": {"id": 61643},
            "homeTeam": {"id": 1, "name": "A"},
            "awayTeam": {"id": 2, "name": "B"},
            "startTimestamp": 1700000000,
            "status": {"code": 100, "type": "finished"},
            "roundInfo": {"round": 3}
        }"#;
        let e: RawEvent = serde_json::from_str(json).unwrap();

        assert_eq!(e.tournament_slug(), "laliga");
        assert_eq!(e.season_id(), Some(61643));
        assert!(e.is_finished());
        assert_eq!(e.round_info.unwrap().round, Some(3));
    }

    #[test]
    fn test_competition_defaults() {
        let entry = CompetitionEntry {
            tournament_id: 8,
            slug: None,
            realm: None,
            api_path_variant: None,
            allowed_slug_aliases: vec![" laliga ".to_string(), "".to_string()],
            pinned_seasons: BTreeMap::new(),
        };
        let spec = CompetitionSpec::from_entry("spain-laliga", entry);

        assert_eq!(spec.slug, "spain-laliga");
        assert_eq!(spec.realm, "club");
        assert_eq!(spec.api_path_variant, ApiPathVariant::Tournament);

        let allowed = spec.allowed_slugs();
        assert!(allowed.contains("spain-laliga"));
        assert!(allowed.contains("laliga"));
        assert_eq!(allowed.len(), 2);
    }
}
