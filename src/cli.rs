//! CLI commands for matchdex.
//!
//! `discover` runs the full pipeline and writes the index; `seasons` only
//! resolves labels; `competitions` lists what the competitions file defines.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{find_competition, load_competitions, AppConfig};
use crate::discover::{DiscoverOptions, Discoverer, DiscoveryReport};
use crate::scraper::cache::Cache;
use crate::scraper::seasons::SeasonResolver;
use crate::scraper::{ApiClient, HttpTransport, RateLimiter};
use crate::storage::{CommitSummary, MatchIndexRepository};
use crate::types::CompetitionSpec;

#[derive(Parser)]
#[command(name = "matchdex")]
#[command(version, about = "Discover finished football matches into a local index", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover finished matches of a competition and merge them into the index
    Discover {
        /// Competition key or slug from the competitions file
        #[arg(value_name = "COMPETITION")]
        competition: String,

        /// Season labels (e.g. 2024-25); defaults to discovery.default_seasons
        #[arg(short, long, num_args = 1..)]
        seasons: Vec<String>,

        /// Minimum seconds between requests
        #[arg(short, long)]
        delay: Option<f64>,

        /// Index CSV override
        #[arg(short, long)]
        index_path: Option<PathBuf>,
    },

    /// Resolve season labels to upstream ids without fetching events
    Seasons {
        #[arg(value_name = "COMPETITION")]
        competition: String,

        #[arg(short, long, num_args = 1..)]
        seasons: Vec<String>,
    },

    /// List configured competitions
    Competitions,
}

fn load_spec(config: &AppConfig, name: &str) -> anyhow::Result<CompetitionSpec> {
    let competitions = load_competitions(Path::new(&config.paths.competitions_file))?;
    find_competition(&competitions, name).cloned().with_context(|| {
        let known: Vec<&str> = competitions.keys().map(String::as_str).collect();
        format!(
            "unknown competition '{}' (known: {})",
            name,
            known.join(", ")
        )
    })
}

fn build_client(config: &AppConfig) -> anyhow::Result<ApiClient> {
    // Flags are applied after load, so check again
    config.validate()?;
    let transport = HttpTransport::new(
        &config.api,
        Duration::from_secs_f64(config.http.timeout_secs),
    )?;
    Ok(ApiClient::new(
        &config.api.base_url,
        Arc::new(transport),
        config.backoff.to_backoff(),
        RateLimiter::new(config.discovery.delay_secs),
    ))
}

fn season_labels(config: &AppConfig, seasons: Vec<String>) -> Vec<String> {
    if seasons.is_empty() {
        config.discovery.default_seasons.clone()
    } else {
        seasons
    }
}

/// Run discovery for one competition and write the index.
pub async fn run_discover(
    competition: String,
    seasons: Vec<String>,
    delay: Option<f64>,
    index_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;

    if let Some(d) = delay {
        config.discovery.delay_secs = d;
    }
    if let Some(path) = index_path {
        config.paths.index_path = path.to_string_lossy().to_string();
    }

    let spec = load_spec(&config, &competition)?;
    let labels = season_labels(&config, seasons);

    let discoverer = Discoverer::new(
        build_client(&config)?,
        Cache::new(PathBuf::from(&config.paths.cache_dir)),
        DiscoverOptions {
            sport: config.api.sport.clone(),
            seasons_dir: PathBuf::from(&config.paths.seasons_dir),
            max_consecutive_challenges: config.discovery.max_consecutive_challenges,
            abort_on_challenge: config.discovery.abort_on_challenge,
        },
    );

    let today = chrono::Local::now().date_naive();
    let mut report = discoverer.run(&spec, &labels, today).await?;

    let repo = MatchIndexRepository::new(&config.paths.index_path);
    match commit_report(&mut report, &repo) {
        Ok(summary) => {
            print_report(&report, Some((&summary, repo.path().display().to_string())));
            Ok(())
        }
        Err(e) => {
            print_report(&report, None);
            Err(e)
        }
    }
}

/// Merge the run's rows into the index, unless no season completed.
///
/// Skipped seasons alone do not fail the run; a run where every resolved
/// season was skipped leaves the index untouched and fails.
fn commit_report(
    report: &mut DiscoveryReport,
    repo: &MatchIndexRepository,
) -> anyhow::Result<CommitSummary> {
    if report.seasons.is_empty() {
        anyhow::bail!(
            "no season of {} completed; the index was left untouched",
            report.competition
        );
    }
    repo.commit(std::mem::take(&mut report.records))
}

/// Print the label → id mapping for a competition.
pub async fn run_seasons(competition: String, seasons: Vec<String>) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let spec = load_spec(&config, &competition)?;
    let labels = season_labels(&config, seasons);

    let resolver = SeasonResolver::new(
        build_client(&config)?,
        Cache::new(PathBuf::from(&config.paths.cache_dir)),
        PathBuf::from(&config.paths.seasons_dir),
    );
    let resolution = resolver.resolve(&spec, &labels).await;

    println!("{} (tournament {})", spec.slug, spec.tournament_id);
    for season in &resolution.resolved {
        println!(
            "  {:<9} {:>8}  ({})",
            season.label, season.season_id, season.source
        );
    }
    for label in &resolution.unresolved {
        println!("  {:<9} {:>8}", label, "-");
    }

    if resolution.resolved.is_empty() {
        anyhow::bail!("no season of {} could be resolved", spec.slug);
    }
    Ok(())
}

/// Print every configured competition.
pub fn run_competitions() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let competitions = load_competitions(Path::new(&config.paths.competitions_file))?;

    for (key, spec) in &competitions {
        let aliases: Vec<&str> = spec
            .allowed_slug_aliases
            .iter()
            .map(String::as_str)
            .collect();
        let pinned: Vec<&str> = spec.pinned_seasons.keys().map(String::as_str).collect();
        println!(
            "{:<28} {:>6}  {:<17} {:<13}",
            key, spec.tournament_id, spec.api_path_variant, spec.realm
        );
        if !aliases.is_empty() {
            println!("    aliases: {}", aliases.join(", "));
        }
        if !pinned.is_empty() {
            println!("    pinned:  {}", pinned.join(", "));
        }
    }
    Ok(())
}

/// Print a discovery report in table format.
fn print_report(report: &DiscoveryReport, commit: Option<(&CommitSummary, String)>) {
    println!("=== {} ===", report.competition);

    for s in &report.seasons {
        println!(
            "  {:<9} season {:>7} ({:<9}) via {:<13} finished {:>4}  accepted {:>4}{}",
            s.label,
            s.season_id,
            s.source,
            s.strategy,
            s.finished,
            s.accepted,
            if s.incomplete { "  INCOMPLETE" } else { "" }
        );
    }

    if !report.skipped.is_empty() {
        println!();
        println!("Skipped seasons:");
        for s in &report.skipped {
            println!("  {:<9} season {:>7}: {}", s.label, s.season_id, s.reason);
        }
    }

    if !report.unresolved.is_empty() {
        println!();
        println!("Unresolved labels: {}", report.unresolved.join(", "));
    }

    println!();
    println!("Identity: {}", report.identity);

    if let Some((summary, path)) = commit {
        if summary.counts.is_noop() {
            println!("Index {}: unchanged, {} total", path, summary.total);
        } else {
            println!(
                "Index {}: {} new, {} upgraded, {} total",
                path, summary.counts.added, summary.counts.updated, summary.total
            );
        }
    }

    if report.hit_challenge() {
        println!();
        println!(
            "Blocked by an anti-bot challenge: wait 15-30 minutes before rerunning, \
             or switch network/VPN or harvest a browser session."
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::{SeasonReport, SkipReason, SkippedSeason, Strategy};
    use crate::scraper::seasons::SeasonSource;
    use crate::types::fixtures::record;

    fn skipped(label: &str) -> SkippedSeason {
        SkippedSeason {
            label: label.to_string(),
            season_id: 100,
            reason: SkipReason::Halted,
        }
    }

    fn completed(label: &str) -> SeasonReport {
        SeasonReport {
            label: label.to_string(),
            season_id: 101,
            source: SeasonSource::Pinned,
            strategy: Strategy::SeasonEvents,
            finished: 1,
            accepted: 1,
            incomplete: false,
        }
    }

    #[test]
    fn test_nothing_completed_leaves_index_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MatchIndexRepository::new(dir.path().join("matches.csv"));
        repo.save(&[record("1")]).unwrap();
        let before = std::fs::read_to_string(repo.path()).unwrap();

        let mut report = DiscoveryReport {
            competition: "spain-laliga".to_string(),
            skipped: vec![skipped("2023-24"), skipped("2024-25")],
            records: vec![record("2")],
            ..Default::default()
        };

        let err = commit_report(&mut report, &repo).unwrap_err();
        assert!(err.to_string().contains("left untouched"));
        assert_eq!(std::fs::read_to_string(repo.path()).unwrap(), before);
    }

    #[test]
    fn test_partial_run_commits() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MatchIndexRepository::new(dir.path().join("matches.csv"));
        repo.save(&[record("1")]).unwrap();

        let mut report = DiscoveryReport {
            competition: "spain-laliga".to_string(),
            seasons: vec![completed("2024-25")],
            skipped: vec![skipped("2023-24")],
            records: vec![record("1"), record("2")],
            ..Default::default()
        };

        let summary = commit_report(&mut report, &repo).unwrap();
        assert_eq!(summary.counts.added, 1);
        assert_eq!(summary.total, 2);
        assert!(report.records.is_empty());
        assert_eq!(repo.load().unwrap().len(), 2);
    }

    #[test]
    fn test_build_client_rejects_infinite_delay() {
        let mut config = AppConfig::default();
        config.discovery.delay_secs = f64::INFINITY;
        assert!(build_client(&config).is_err());
    }

    #[test]
    fn test_parse_discover() {
        let cli = Cli::try_parse_from([
            "matchdex",
            "discover",
            "spain-laliga",
            "--seasons",
            "2023-24",
            "2024-25",
            "--delay",
            "1.5",
        ])
        .unwrap();

        match cli.command {
            Commands::Discover {
                competition,
                seasons,
                delay,
                index_path,
            } => {
                assert_eq!(competition, "spain-laliga");
                assert_eq!(seasons, vec!["2023-24", "2024-25"]);
                assert_eq!(delay, Some(1.5));
                assert!(index_path.is_none());
            }
            _ => panic!("expected discover"),
        }
    }

    #[test]
    fn test_default_seasons_when_none_given() {
        let config = AppConfig::default();
        assert_eq!(season_labels(&config, vec![]).len(), 4);
        assert_eq!(
            season_labels(&config, vec!["2019-20".to_string()]),
            vec!["2019-20"]
        );
    }

    #[test]
    fn test_discover_requires_competition() {
        assert!(Cli::try_parse_from(["matchdex", "discover"]).is_err());
    }
}
