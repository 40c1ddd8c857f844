//! Tournament identity checks.
//!
//! Upstream tournament ids and slugs are not unique enough to trust on their
//! own, and the daily schedule can surface lookalike tournaments. Every event
//! is checked against the allowed slug set and the expected season id.
//!
//! This does not detect swapped home/away teams, nor a correct slug paired
//! with a wrong season beyond the season id comparison.

use std::collections::BTreeSet;
use std::fmt;

use crate::types::RawEvent;

/// Why an event was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    SlugMismatch,
    SeasonMismatch,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::SlugMismatch => f.write_str("slug_mismatch"),
            Rejection::SeasonMismatch => f.write_str("season_mismatch"),
        }
    }
}

/// Accepts events that belong to one competition
#[derive(Debug, Clone)]
pub struct IdentityValidator {
    allowed_slugs: BTreeSet<String>,
}

impl IdentityValidator {
    pub fn new(allowed_slugs: BTreeSet<String>) -> Self {
        Self { allowed_slugs }
    }

    pub fn allowed_slugs(&self) -> &BTreeSet<String> {
        &self.allowed_slugs
    }

    /// Check `event` against the allowed slugs and `expected_season_id`.
    ///
    /// The slug is checked first, so an event wrong on both counts is a
    /// slug mismatch.
    pub fn accept(&self, event: &RawEvent, expected_season_id: i64) -> Result<(), Rejection> {
        if !self.allowed_slugs.contains(event.tournament_slug()) {
            return Err(Rejection::SlugMismatch);
        }
        if event.season_id() != Some(expected_season_id) {
            return Err(Rejection::SeasonMismatch);
        }
        Ok(())
    }
}

/// Running totals of identity decisions across a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySummary {
    pub checked: usize,
    pub accepted: usize,
    pub slug_mismatch: usize,
    pub season_mismatch: usize,
    /// Slugs seen on rejected events; candidates for the alias list
    pub unexpected_slugs: BTreeSet<String>,
}

impl IdentitySummary {
    pub fn record(&mut self, event: &RawEvent, verdict: Result<(), Rejection>) {
        self.checked += 1;
        match verdict {
            Ok(()) => self.accepted += 1,
            Err(Rejection::SlugMismatch) => {
                self.slug_mismatch += 1;
                let slug = event.tournament_slug();
                if !slug.is_empty() {
                    self.unexpected_slugs.insert(slug.to_string());
                }
            }
            Err(Rejection::SeasonMismatch) => self.season_mismatch += 1,
        }
    }

    pub fn rejected(&self) -> usize {
        self.slug_mismatch + self.season_mismatch
    }
}

impl fmt::Display for IdentitySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted={}, rejected_slug_mismatch={}, rejected_season_mismatch={}",
            self.accepted, self.slug_mismatch, self.season_mismatch
        )?;
        if !self.unexpected_slugs.is_empty() {
            let slugs: Vec<&str> = self.unexpected_slugs.iter().map(String::as_str).collect();
            write!(f, "; add to allowed_slug_aliases if legitimate: {}", slugs.join(", "))?;
        }
        Ok(())
    }
}
