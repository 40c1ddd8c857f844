//! Discovery run for one competition.
//!
//! Per season: resolve id → fetch season events → (404: date scan) →
//! identity check → index rows. A season that fails is reported and skipped;
//! its siblings still run.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::scraper::cache::Cache;
use crate::scraper::events::{season_window, DateScanFallback, EventFetcher, FetchOutcome};
use crate::scraper::identity::{IdentitySummary, IdentityValidator};
use crate::scraper::seasons::{SeasonResolution, SeasonResolver, SeasonSource};
use crate::scraper::{ApiClient, FetchError};
use crate::types::{CompetitionSpec, MatchRecord, RawEvent};

/// Which strategy produced a season's events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SeasonEvents,
    DateScan,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::SeasonEvents => f.pad("season events"),
            Strategy::DateScan => f.pad("date scan"),
        }
    }
}

/// A season that produced rows
#[derive(Debug, Clone)]
pub struct SeasonReport {
    pub label: String,
    pub season_id: i64,
    pub source: SeasonSource,
    pub strategy: Strategy,
    /// Finished events returned by the strategy
    pub finished: usize,
    /// Rows that passed identity checks and were new to this run
    pub accepted: usize,
    /// Date scan stopped early on repeated challenges
    pub incomplete: bool,
}

#[derive(Debug)]
pub enum SkipReason {
    Fetch(FetchError),
    NoSeasonWindow,
    /// An earlier season hit a persistent challenge and the run was halted
    Halted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Fetch(e) => write!(f, "{}", e),
            SkipReason::NoSeasonWindow => {
                f.write_str("season events 404 and no scannable date window for this label")
            }
            SkipReason::Halted => f.write_str("run halted after a persistent challenge"),
        }
    }
}

#[derive(Debug)]
pub struct SkippedSeason {
    pub label: String,
    pub season_id: i64,
    pub reason: SkipReason,
}

/// Everything a run found and everything it could not do
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub competition: String,
    pub seasons: Vec<SeasonReport>,
    pub skipped: Vec<SkippedSeason>,
    pub unresolved: Vec<String>,
    pub identity: IdentitySummary,
    pub records: Vec<MatchRecord>,
}

impl DiscoveryReport {
    /// Whether any season was lost to an anti-bot challenge
    pub fn hit_challenge(&self) -> bool {
        self.seasons.iter().any(|s| s.incomplete)
            || self
                .skipped
                .iter()
                .any(|s| matches!(&s.reason, SkipReason::Fetch(e) if e.is_challenge()))
    }
}

/// Settings for a discovery run
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub sport: String,
    pub seasons_dir: PathBuf,
    pub max_consecutive_challenges: u32,
    pub abort_on_challenge: bool,
}

/// Runs discovery for one competition at a time
pub struct Discoverer {
    resolver: SeasonResolver,
    fetcher: EventFetcher,
    fallback: DateScanFallback,
    abort_on_challenge: bool,
}

impl Discoverer {
    pub fn new(client: ApiClient, cache: Cache, options: DiscoverOptions) -> Self {
        Self {
            resolver: SeasonResolver::new(client.clone(), cache, options.seasons_dir),
            fetcher: EventFetcher::new(client.clone()),
            fallback: DateScanFallback::new(
                client,
                &options.sport,
                options.max_consecutive_challenges,
            ),
            abort_on_challenge: options.abort_on_challenge,
        }
    }

    /// Discover finished matches of `spec` for `labels`.
    ///
    /// Fails only when none of the labels resolves to a season id.
    pub async fn run(
        &self,
        spec: &CompetitionSpec,
        labels: &[String],
        today: NaiveDate,
    ) -> Result<DiscoveryReport> {
        let SeasonResolution {
            resolved,
            unresolved,
        } = self.resolver.resolve(spec, labels).await;

        if !unresolved.is_empty() {
            warn!("Unresolved seasons for {}: {:?}", spec.slug, unresolved);
        }
        if resolved.is_empty() {
            bail!(
                "no season of {} could be resolved (requested: {})",
                spec.slug,
                labels.join(", ")
            );
        }

        info!(
            "Discovering {} for seasons {:?}",
            spec.slug,
            resolved.iter().map(|s| s.label.as_str()).collect::<Vec<_>>()
        );

        let validator = IdentityValidator::new(spec.allowed_slugs());
        let mut report = DiscoveryReport {
            competition: spec.slug.clone(),
            unresolved,
            ..Default::default()
        };
        let mut discovered: HashSet<i64> = HashSet::new();
        let mut halted = false;

        for season in resolved {
            if halted {
                report.skipped.push(SkippedSeason {
                    label: season.label,
                    season_id: season.season_id,
                    reason: SkipReason::Halted,
                });
                continue;
            }

            let (strategy, events, incomplete) =
                match self.fetcher.fetch(spec, season.season_id).await {
                    FetchOutcome::Success(events) => (Strategy::SeasonEvents, events, false),
                    FetchOutcome::NotFoundNeedsFallback => {
                        info!(
                            "Season events 404 for {} {}; falling back to date scan",
                            spec.slug, season.label
                        );
                        let Some(window) = season_window(&season.label, today) else {
                            report.skipped.push(SkippedSeason {
                                label: season.label,
                                season_id: season.season_id,
                                reason: SkipReason::NoSeasonWindow,
                            });
                            continue;
                        };
                        let scan = self
                            .fallback
                            .scan(validator.allowed_slugs(), season.season_id, window)
                            .await;
                        info!(
                            "Date scan for {} {}: {} days requested, {} failed",
                            spec.slug, season.label, scan.days_scanned, scan.days_failed
                        );
                        (Strategy::DateScan, scan.events, scan.abandoned)
                    }
                    FetchOutcome::Failed(e) => {
                        warn!("Skipping {} {}: {}", spec.slug, season.label, e);
                        halted = e.is_challenge() && self.abort_on_challenge;
                        report.skipped.push(SkippedSeason {
                            label: season.label,
                            season_id: season.season_id,
                            reason: SkipReason::Fetch(e),
                        });
                        continue;
                    }
                };

            let finished = events.len();
            let accepted = self.accept_events(
                spec,
                &season.label,
                season.season_id,
                events,
                &validator,
                &mut discovered,
                &mut report,
            );

            info!(
                "{} {}: {} finished, {} accepted via {}{}",
                spec.slug,
                season.label,
                finished,
                accepted,
                strategy,
                if incomplete { " (incomplete)" } else { "" }
            );

            if incomplete && self.abort_on_challenge {
                halted = true;
            }

            report.seasons.push(SeasonReport {
                label: season.label,
                season_id: season.season_id,
                source: season.source,
                strategy,
                finished,
                accepted,
                incomplete,
            });
        }

        if report.identity.rejected() > 0 {
            warn!(
                "{} of {} events rejected by identity checks for {}",
                report.identity.rejected(),
                report.identity.checked,
                spec.slug
            );
        }

        Ok(report)
    }

    /// Validate events and append the accepted ones as rows; returns how many
    /// were added
    #[allow(clippy::too_many_arguments)]
    fn accept_events(
        &self,
        spec: &CompetitionSpec,
        label: &str,
        season_id: i64,
        events: Vec<RawEvent>,
        validator: &IdentityValidator,
        discovered: &mut HashSet<i64>,
        report: &mut DiscoveryReport,
    ) -> usize {
        let mut accepted = 0;
        for event in events.iter().filter(|e| e.is_finished()) {
            let verdict = validator.accept(event, season_id);
            report.identity.record(event, verdict);
            if verdict.is_ok() && discovered.insert(event.id) {
                report
                    .records
                    .push(MatchRecord::from_event(event, label, &spec.realm, &spec.slug));
                accepted += 1;
            }
        }
        accepted
    }
}
