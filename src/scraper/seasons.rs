//! Season label resolution.
//!
//! Maps labels like `2024-25` to upstream season ids. Sources are consulted
//! in order and the first one that knows a label wins:
//!
//! 1. ids pinned in the competition config
//! 2. an out-of-band `<slug>_seasons.json` mapping (e.g. harvested from a browser session)
//! 3. the upstream season list, through a TTL cache
//!
//! Resolution never fails as a whole; labels nobody knows come back unresolved.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use super::cache::{Cache, CacheCategory};
use super::client::{ApiClient, FetchError};
use super::seasons_url;
use crate::types::{CompetitionSpec, SeasonsPage};

/// Where a season id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonSource {
    Pinned,
    Harvested,
    Cached,
    Live,
}

impl fmt::Display for SeasonSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeasonSource::Pinned => "pinned",
            SeasonSource::Harvested => "harvested",
            SeasonSource::Cached => "cached",
            SeasonSource::Live => "live",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSeason {
    pub label: String,
    pub season_id: i64,
    pub source: SeasonSource,
}

/// Outcome of resolving a set of labels; either side may be empty
#[derive(Debug, Clone, Default)]
pub struct SeasonResolution {
    /// In the order the labels were requested
    pub resolved: Vec<ResolvedSeason>,
    pub unresolved: Vec<String>,
}

#[cfg(test)]
impl SeasonResolution {
    pub fn season_id(&self, label: &str) -> Option<i64> {
        self.resolved
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.season_id)
    }
}

/// Resolves season labels through the tiered sources
#[derive(Clone)]
pub struct SeasonResolver {
    client: ApiClient,
    cache: Cache,
    seasons_dir: PathBuf,
}

impl SeasonResolver {
    pub fn new(client: ApiClient, cache: Cache, seasons_dir: PathBuf) -> Self {
        Self {
            client,
            cache,
            seasons_dir,
        }
    }

    /// Resolve `labels` for `spec`
    pub async fn resolve(&self, spec: &CompetitionSpec, labels: &[String]) -> SeasonResolution {
        let mut seen = HashSet::new();
        let requested: Vec<&String> = labels.iter().filter(|l| seen.insert(l.as_str())).collect();

        let mut found: BTreeMap<String, (i64, SeasonSource)> = BTreeMap::new();
        let pending = |found: &BTreeMap<String, (i64, SeasonSource)>| -> Vec<String> {
            requested
                .iter()
                .filter(|l| !found.contains_key(l.as_str()))
                .map(|l| l.to_string())
                .collect()
        };

        // Tier 1: pinned in config
        for label in pending(&found) {
            if let Some(id) = spec.pinned_seasons.get(&label) {
                found.insert(label, (*id, SeasonSource::Pinned));
            }
        }

        // Tier 2: out-of-band mapping file
        if !pending(&found).is_empty() {
            let path = harvested_path(&self.seasons_dir, &spec.slug);
            if let Some(mapping) = load_harvested(&path) {
                for label in pending(&found) {
                    if let Some(id) = mapping.get(&label) {
                        found.insert(label, (*id, SeasonSource::Harvested));
                    }
                }
            }
        }

        // Tier 3: upstream season list, cached first
        if !pending(&found).is_empty() {
            let key = cache_key(spec);
            if let Some(hit) = self
                .cache
                .get::<BTreeMap<String, i64>>(CacheCategory::SeasonList, &key)
            {
                debug!(
                    "Using cached season list for {} ({}h old)",
                    spec.slug,
                    hit.age.num_hours()
                );
                for label in pending(&found) {
                    if let Some(id) = hit.data.get(&label) {
                        found.insert(label, (*id, SeasonSource::Cached));
                    }
                }
            }
        }

        if !pending(&found).is_empty() {
            match self.fetch_live(spec).await {
                Ok(mapping) => {
                    if let Err(e) =
                        self.cache
                            .set(CacheCategory::SeasonList, &cache_key(spec), &mapping)
                    {
                        warn!("Failed to cache season list for {}: {}", spec.slug, e);
                    }
                    for label in pending(&found) {
                        if let Some(id) = mapping.get(&label) {
                            found.insert(label, (*id, SeasonSource::Live));
                        }
                    }
                }
                Err(e) => {
                    warn!("Season list unavailable for {}: {}", spec.slug, e);
                    if let Some(advice) = e.advice() {
                        warn!("{}", advice);
                    }
                }
            }
        }

        let unresolved = pending(&found);
        let resolved = requested
            .iter()
            .filter_map(|label| {
                found.get(label.as_str()).map(|(id, source)| ResolvedSeason {
                    label: label.to_string(),
                    season_id: *id,
                    source: *source,
                })
            })
            .collect();

        SeasonResolution {
            resolved,
            unresolved,
        }
    }

    /// Fetch the full label → id mapping from the season-list endpoint
    pub async fn fetch_live(
        &self,
        spec: &CompetitionSpec,
    ) -> Result<BTreeMap<String, i64>, FetchError> {
        let url = seasons_url(
            self.client.base_url(),
            spec.api_path_variant,
            spec.tournament_id,
        );
        let page: SeasonsPage = self.client.fetch(&url).await?;

        let mapping: BTreeMap<String, i64> = page
            .seasons
            .iter()
            .filter_map(|s| {
                let label = normalize_season_year(s.year.as_deref()?)?;
                Some((label, s.id))
            })
            .collect();

        info!(
            "Fetched {} seasons for {} from the API",
            mapping.len(),
            spec.slug
        );
        Ok(mapping)
    }
}

fn cache_key(spec: &CompetitionSpec) -> String {
    format!("{}-{}", spec.api_path_variant.as_path(), spec.tournament_id)
}

/// Location of the out-of-band mapping for a slug
pub fn harvested_path(dir: &Path, slug: &str) -> PathBuf {
    dir.join(format!("{}_seasons.json", slug.replace('-', "_")))
}

/// Read a `{label: id}` JSON object; ids may be numbers or numeric strings
fn load_harvested(path: &Path) -> Option<BTreeMap<String, i64>> {
    let content = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Ignoring unreadable season mapping {}: {}", path.display(), e);
            return None;
        }
    };
    let Some(object) = value.as_object() else {
        warn!("Ignoring season mapping {}: not a JSON object", path.display());
        return None;
    };

    let mapping = object
        .iter()
        .filter_map(|(label, id)| {
            let id = match id {
                serde_json::Value::Number(n) => n.as_i64(),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }?;
            Some((label.clone(), id))
        })
        .collect();
    Some(mapping)
}

/// Normalize an upstream season `year` into a `YYYY-YY` label.
///
/// `"22/23"` → `"2022-23"`, `"2022/2023"` → `"2022-23"`, and a single calendar
/// year `"2024"` → `"2023-24"` (the season ending in that year).
pub fn normalize_season_year(year: &str) -> Option<String> {
    static SPLIT: OnceLock<Regex> = OnceLock::new();
    static SINGLE: OnceLock<Regex> = OnceLock::new();

    let year = year.trim();
    let split = SPLIT.get_or_init(|| Regex::new(r"^(\d{2}|\d{4})/(\d{2}|\d{4})$").unwrap());
    let single = SINGLE.get_or_init(|| Regex::new(r"^\d{4}$").unwrap());

    if let Some(caps) = split.captures(year) {
        let start: i32 = caps[1].parse().ok()?;
        let start = if start < 100 { 2000 + start } else { start };
        let end: i32 = caps[2].parse().ok()?;
        return Some(format!("{}-{:02}", start, end % 100));
    }

    if single.is_match(year) {
        let end: i32 = year.parse().ok()?;
        return Some(format!("{}-{:02}", end - 1, end % 100));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::testing::RecordingSleeper;
    use crate::scraper::client::testing::{client_with, ScriptedTransport, CHALLENGE_BODY};
    use crate::types::ApiPathVariant;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    const SEASONS_URL: &str = "https://api.test/v1/tournament/8/seasons";
    const SEASONS_BODY: &str = r#"{"seasons": [
        {"id": 77559, "year": "25/26"},
        {"id": 61643, "year": "24/25"},
        {"id": 52376, "year": "23/24"},
        {"id": 1, "year": ""}
    ]}"#;

    fn spec() -> CompetitionSpec {
        CompetitionSpec {
            tournament_id: 8,
            slug: "spain-laliga".to_string(),
            realm: "club".to_string(),
            api_path_variant: ApiPathVariant::Tournament,
            allowed_slug_aliases: BTreeSet::new(),
            pinned_seasons: BTreeMap::new(),
        }
    }

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    struct Fixture {
        transport: Arc<ScriptedTransport>,
        resolver: SeasonResolver,
        dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let client = client_with(transport.clone(), Arc::new(RecordingSleeper::default()));
        let resolver = SeasonResolver::new(
            client,
            Cache::new(dir.path().join("cache")),
            dir.path().to_path_buf(),
        );
        Fixture {
            transport,
            resolver,
            dir,
        }
    }

    #[test]
    fn test_normalize_season_year() {
        assert_eq!(normalize_season_year("22/23").as_deref(), Some("2022-23"));
        assert_eq!(normalize_season_year("99/00").as_deref(), Some("2099-00"));
        assert_eq!(normalize_season_year("2022/2023").as_deref(), Some("2022-23"));
        assert_eq!(normalize_season_year("2024").as_deref(), Some("2023-24"));
        assert_eq!(normalize_season_year("Season 1"), None);
        assert_eq!(normalize_season_year(""), None);
    }

    #[tokio::test]
    async fn test_pinned_tier_skips_network() {
        let f = fixture();
        let mut spec = spec();
        spec.pinned_seasons.insert("2022-23".to_string(), 42409);

        let resolution = f.resolver.resolve(&spec, &labels(&["2022-23"])).await;

        assert_eq!(resolution.season_id("2022-23"), Some(42409));
        assert_eq!(resolution.resolved[0].source, SeasonSource::Pinned);
        assert!(f.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_harvested_file_tier() {
        let f = fixture();
        std::fs::write(
            f.dir.path().join("spain_laliga_seasons.json"),
            r#"{"2023-24": "52376", "2024-25": 61643}"#,
        )
        .unwrap();

        let resolution = f
            .resolver
            .resolve(&spec(), &labels(&["2023-24", "2024-25"]))
            .await;

        assert_eq!(resolution.season_id("2023-24"), Some(52376));
        assert_eq!(resolution.season_id("2024-25"), Some(61643));
        assert!(resolution
            .resolved
            .iter()
            .all(|s| s.source == SeasonSource::Harvested));
        assert!(f.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_live_tier_and_cache() {
        let f = fixture();
        f.transport.push(SEASONS_URL, 200, SEASONS_BODY);

        let first = f.resolver.resolve(&spec(), &labels(&["2024-25"])).await;
        assert_eq!(first.season_id("2024-25"), Some(61643));
        assert_eq!(first.resolved[0].source, SeasonSource::Live);
        assert!(f
            .dir
            .path()
            .join("cache")
            .join("season_list")
            .join("tournament-8.json")
            .exists());

        let second = f.resolver.resolve(&spec(), &labels(&["2025-26"])).await;
        assert_eq!(second.season_id("2025-26"), Some(77559));
        assert_eq!(second.resolved[0].source, SeasonSource::Cached);
        assert_eq!(f.transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_first_tier_wins_per_label() {
        let f = fixture();
        let mut spec = spec();
        spec.pinned_seasons.insert("2024-25".to_string(), 999);
        f.transport.push(SEASONS_URL, 200, SEASONS_BODY);

        let resolution = f
            .resolver
            .resolve(&spec, &labels(&["2024-25", "2023-24"]))
            .await;

        assert_eq!(resolution.season_id("2024-25"), Some(999));
        assert_eq!(resolution.season_id("2023-24"), Some(52376));
        assert_eq!(resolution.resolved[1].source, SeasonSource::Live);
    }

    #[tokio::test]
    async fn test_partial_resolution() {
        let f = fixture();
        f.transport.push(SEASONS_URL, 200, SEASONS_BODY);

        let resolution = f
            .resolver
            .resolve(&spec(), &labels(&["2022-23", "2023-24", "2024-25", "2025-26"]))
            .await;

        assert_eq!(resolution.resolved.len(), 3);
        assert_eq!(resolution.unresolved, labels(&["2022-23"]));
        let order: Vec<&str> = resolution.resolved.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(order, vec!["2023-24", "2024-25", "2025-26"]);
    }

    #[tokio::test]
    async fn test_live_failure_leaves_labels_unresolved() {
        let f = fixture();
        let mut spec = spec();
        spec.pinned_seasons.insert("2022-23".to_string(), 42409);
        for _ in 0..4 {
            f.transport.push(SEASONS_URL, 403, CHALLENGE_BODY);
        }

        let resolution = f
            .resolver
            .resolve(&spec, &labels(&["2022-23", "2023-24"]))
            .await;

        assert_eq!(resolution.season_id("2022-23"), Some(42409));
        assert_eq!(resolution.unresolved, labels(&["2023-24"]));
    }

    #[tokio::test]
    async fn test_duplicate_labels_collapse() {
        let f = fixture();
        let mut spec = spec();
        spec.pinned_seasons.insert("2022-23".to_string(), 42409);

        let resolution = f
            .resolver
            .resolve(&spec, &labels(&["2022-23", "2022-23"]))
            .await;
        assert_eq!(resolution.resolved.len(), 1);
    }

    #[test]
    fn test_unreadable_harvested_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = harvested_path(dir.path(), "germany-bundesliga");
        assert!(path.ends_with("germany_bundesliga_seasons.json"));

        std::fs::write(&path, "not json").unwrap();
        assert!(load_harvested(&path).is_none());

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(load_harvested(&path).is_none());
    }
}
