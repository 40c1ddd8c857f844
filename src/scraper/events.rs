//! Event discovery strategies.
//!
//! The primary path asks the season-events endpoint for everything in one
//! request. Some tournaments 404 there even though their matches show up in
//! the global daily schedule, so a 404 switches to scanning the season
//! window day by day.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use super::client::{ApiClient, FetchError};
use super::{scheduled_events_url, season_events_url};
use crate::types::{CompetitionSpec, EventsPage, RawEvent, SchedulePage};

/// Result of the primary fetch; the fallback decision branches on this
#[derive(Debug)]
pub enum FetchOutcome {
    /// Finished events only
    Success(Vec<RawEvent>),
    NotFoundNeedsFallback,
    Failed(FetchError),
}

/// Primary strategy: one request per (competition, season)
#[derive(Clone)]
pub struct EventFetcher {
    client: ApiClient,
}

impl EventFetcher {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, spec: &CompetitionSpec, season_id: i64) -> FetchOutcome {
        let url = season_events_url(
            self.client.base_url(),
            spec.api_path_variant,
            spec.tournament_id,
            season_id,
        );

        match self.client.fetch::<EventsPage>(&url).await {
            Ok(page) => {
                let total = page.events.len();
                let finished: Vec<RawEvent> =
                    page.events.into_iter().filter(RawEvent::is_finished).collect();
                debug!(
                    "{} season {}: {} events, {} finished",
                    spec.slug,
                    season_id,
                    total,
                    finished.len()
                );
                FetchOutcome::Success(finished)
            }
            Err(e) if e.is_not_found() => FetchOutcome::NotFoundNeedsFallback,
            Err(e) => FetchOutcome::Failed(e),
        }
    }
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window for a `YYYY-YY` (or `YYYY-YYYY`) label: July 1st of the first
    /// year through June 30th of the next. Labels whose end year is not the
    /// year after the start have no window.
    pub fn for_season(label: &str) -> Option<Self> {
        static LABEL: OnceLock<Regex> = OnceLock::new();
        let re = LABEL.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2}|\d{4})$").unwrap());

        let caps = re.captures(label.trim())?;
        let start_year: i32 = caps[1].parse().ok()?;
        let end_raw: i32 = caps[2].parse().ok()?;
        let end_year = start_year + 1;
        // Two-digit ends compare modulo 100 so "1999-00" rolls over the century
        let matches = if caps[2].len() == 2 {
            end_raw == end_year % 100
        } else {
            end_raw == end_year
        };
        if !matches {
            return None;
        }

        Some(Self {
            start: NaiveDate::from_ymd_opt(start_year, 7, 1)?,
            end: NaiveDate::from_ymd_opt(end_year, 6, 30)?,
        })
    }

    /// Drop days after `today`; they cannot hold finished matches
    pub fn clamp_to(self, today: NaiveDate) -> Option<Self> {
        let end = self.end.min(today);
        (end >= self.start).then_some(Self {
            start: self.start,
            end,
        })
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start
            .iter_days()
            .take_while(move |d| *d <= self.end)
    }

    pub fn len(&self) -> usize {
        ((self.end - self.start).num_days() + 1).max(0) as usize
    }
}

/// What a date scan produced
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Finished, prefiltered, deduplicated events
    pub events: Vec<RawEvent>,
    pub days_scanned: usize,
    pub days_failed: usize,
    /// Circuit breaker tripped before the window was exhausted
    pub abandoned: bool,
}

/// Fallback strategy: walk the daily schedule and keep the target's events
#[derive(Clone)]
pub struct DateScanFallback {
    client: ApiClient,
    sport: String,
    max_consecutive_challenges: u32,
}

impl DateScanFallback {
    pub fn new(client: ApiClient, sport: &str, max_consecutive_challenges: u32) -> Self {
        Self {
            client,
            sport: sport.to_string(),
            max_consecutive_challenges: max_consecutive_challenges.max(1),
        }
    }

    /// Scan every day of `window`.
    ///
    /// Events are kept only if finished, reported under one of
    /// `allowed_slugs` and tagged with `season_id`. Identity validation still
    /// runs on the result.
    pub async fn scan(
        &self,
        allowed_slugs: &BTreeSet<String>,
        season_id: i64,
        window: DateWindow,
    ) -> ScanReport {
        let mut report = ScanReport::default();
        let mut seen: HashSet<i64> = HashSet::new();
        let mut consecutive_challenges = 0u32;

        info!(
            "Scanning {} days ({} .. {}) for season {}",
            window.len(),
            window.start,
            window.end,
            season_id
        );

        for day in window.days() {
            let url = scheduled_events_url(self.client.base_url(), &self.sport, day);
            report.days_scanned += 1;

            let page = match self.client.fetch::<SchedulePage>(&url).await {
                Ok(page) => {
                    consecutive_challenges = 0;
                    page
                }
                Err(e) => {
                    report.days_failed += 1;
                    if e.is_challenge() {
                        consecutive_challenges += 1;
                        if consecutive_challenges >= self.max_consecutive_challenges {
                            warn!(
                                "Abandoning date scan for season {} after {} consecutive challenges (at {})",
                                season_id, consecutive_challenges, day
                            );
                            report.abandoned = true;
                            break;
                        }
                    } else {
                        warn!("Skipping {} of the date scan: {}", day, e);
                    }
                    continue;
                }
            };

            let mut kept = 0usize;
            let mut malformed = 0usize;
            for value in page.events {
                let event = match serde_json::from_value::<RawEvent>(value) {
                    Ok(event) => event,
                    Err(_) => {
                        malformed += 1;
                        continue;
                    }
                };
                if !allowed_slugs.contains(event.tournament_slug()) {
                    continue;
                }
                if event.season_id() != Some(season_id) {
                    continue;
                }
                // A postponed fixture can reappear finished on a later day
                if !event.is_finished() || !seen.insert(event.id) {
                    continue;
                }
                kept += 1;
                report.events.push(event);
            }
            debug!("{}: kept {} events", day, kept);
            if malformed > 0 {
                debug!("{}: ignored {} undecodable events", day, malformed);
            }

            if day.day() == 1 {
                info!(
                    "Date scan at {}: {} events so far",
                    day,
                    report.events.len()
                );
            }
        }

        report
    }
}

/// Convenience for callers that only have a label
pub fn season_window(label: &str, today: NaiveDate) -> Option<DateWindow> {
    DateWindow::for_season(label)?.clamp_to(today)
}
