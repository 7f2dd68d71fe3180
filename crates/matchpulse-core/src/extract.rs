//! Record extraction and normalization.
//!
//! Every field is read through an ordered chain of selectors or attribute
//! names; the first hit wins. Missing strings become `None`, missing counts
//! become zero. Match records without both team names are dropped.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;
use url::Url;

use crate::error::AppError;
use crate::models::{MatchEvent, RankedTeam, Team};
use crate::snapshot::{Node, Snapshot};

/// Selector and attribute chains, primary first.
pub mod selectors {
    pub const MATCH_CONTAINERS: &[&str] = &[".match-wrapper", ".liveMatch-container, .upcomingMatch"];
    pub const MATCH_BODY: &[&str] = &[".match"];
    pub const DATE_SECTION: &[&str] = &[".match-day", ".matches-list-section"];
    pub const DATE_HEADLINE: &[&str] = &[".standard-headline", ".matches-list-headline"];

    pub const MATCH_ID: &[&str] = &["data-match-id", "data-matchid"];
    pub const EVENT_ID: &[&str] = &["data-event-id", "data-eventid"];
    pub const EVENT_TYPE: &[&str] = &["data-eventtype", "data-event-type"];
    pub const REGION: &[&str] = &["data-region"];
    pub const LAN: &[&str] = &["lan", "data-lan"];
    pub const LIVE: &[&str] = &["live", "data-live"];
    pub const PINNED: &[&str] = &["data-pinned"];
    pub const STARS: &[&str] = &["data-stars"];
    pub const TEAM1_ID: &[&str] = &["team1", "data-team1"];
    pub const TEAM2_ID: &[&str] = &["team2", "data-team2"];
    pub const LIVE_CLASSES: &[&str] = &["liveMatch-container", "live-match"];

    pub const MATCH_LINK: &[&str] = &["a[href*=\"/matches/\"]", "a.match-top"];
    pub const MATCH_TIME: &[&str] = &[".match-time", ".matchTime"];
    pub const UNIX_TIME: &[&str] = &["data-unix"];
    pub const TIME_FORMAT: &[&str] = &["data-time-format"];
    pub const MATCH_META: &[&str] = &[".match-meta", ".matchMeta"];
    pub const MATCH_STAGE: &[&str] = &[".match-stage"];
    pub const MATCH_EVENT: &[&str] = &[".match-event", ".matchEventName"];
    pub const EVENT_HEADLINE: &[&str] = &["data-event-headline"];
    pub const ANALYTICS_LINK: &[&str] = &[".match-analytics-btn"];

    pub const TEAM1: &[&str] = &[".team1", ".match-team.team1"];
    pub const TEAM2: &[&str] = &[".team2", ".match-team.team2"];
    pub const TEAM_NAME: &[&str] = &[".match-teamname", ".matchTeamName"];
    pub const TEAM_LOGO: &[&str] = &[".match-team-logo", ".matchTeamLogo"];
    pub const LOGO_SRC: &[&str] = &["src", "data-src"];

    pub const RANKED_TEAMS: &[&str] = &[".ranked-team", ".ranking-team"];
    pub const RANK_POINTS: &[&str] = &[".points"];
    pub const RANK_CHANGE: &[&str] = &[".change"];
    pub const RANK_TEAM_NAME: &[&str] = &[".teamLine .name", ".name"];
    pub const RANK_PROFILE_LINK: &[&str] = &[".more .moreLink[href^=\"/team/\"]", "a[href^=\"/team/\"]"];
    pub const RANK_LOGO: &[&str] = &[".ranking-header .team-logo img", ".team-logo img"];
}

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid date regex"));
static CLOCK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("valid clock regex"));
static MATCH_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/matches/(\d+)").expect("valid match id regex"));

/// Which slice of the match list a collector keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchVariant {
    /// Only non-live matches starting within the poll window.
    #[default]
    Imminent,
    /// Everything on the page.
    All,
}

/// Extracts [`MatchEvent`]s from a schedule page.
///
/// Displayed clock times are interpreted in `tz`, the zone the source
/// renders its schedule in.
#[derive(Debug, Clone)]
pub struct MatchExtractor<Tz: TimeZone> {
    base_url: Url,
    tz: Tz,
}

impl<Tz: TimeZone> MatchExtractor<Tz> {
    pub fn new(base_url: &str, tz: Tz) -> Result<Self, AppError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            tz,
        })
    }

    /// Extract every resolvable record, skipping ones that fail to parse.
    pub fn extract<S: Snapshot>(&self, snapshot: &S) -> Vec<MatchEvent> {
        let containers = snapshot.select_first_non_empty(selectors::MATCH_CONTAINERS);
        let total = containers.len();
        let mut records = Vec::with_capacity(total);

        for (index, container) in containers.iter().enumerate() {
            match self.parse_record(container) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {
                    tracing::debug!(index, "Dropping match record without both team names");
                }
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping unparseable match record");
                }
            }
        }

        tracing::debug!(total, kept = records.len(), "Extracted match records");
        records
    }

    /// Normalize one container. `Ok(None)` means the record is incomplete.
    pub fn parse_record<N: Node>(&self, container: &N) -> Result<Option<MatchEvent>, AppError> {
        let body = container.find_any(selectors::MATCH_BODY);
        let body = body.as_ref();

        let team1 = parse_match_team(
            find_in(body, container, selectors::TEAM1).as_ref(),
            container.attr_any(selectors::TEAM1_ID),
            &self.base_url,
        );
        let team2 = parse_match_team(
            find_in(body, container, selectors::TEAM2).as_ref(),
            container.attr_any(selectors::TEAM2_ID),
            &self.base_url,
        );
        if team1.name.is_none() || team2.name.is_none() {
            return Ok(None);
        }

        let link = find_in(body, container, selectors::MATCH_LINK).and_then(|a| a.attr("href"));
        let match_id = container.attr_any(selectors::MATCH_ID).or_else(|| {
            link.as_deref()
                .and_then(|href| MATCH_ID_PATTERN.captures(href))
                .map(|c| c[1].to_string())
        });

        let section = container.closest_any(selectors::DATE_SECTION);
        let section_headline = section
            .as_ref()
            .and_then(|s| s.find_any(selectors::DATE_HEADLINE))
            .and_then(|h| h.trimmed_text());

        let time_el = find_in(body, container, selectors::MATCH_TIME);
        let scheduled_time = resolve_scheduled_time(
            time_el.as_ref().and_then(|t| t.attr_any(selectors::UNIX_TIME)),
            section_headline.as_deref(),
            time_el.as_ref().and_then(|t| t.trimmed_text()).as_deref(),
            &self.tz,
        )?;

        let is_live = flag(container, selectors::LIVE)
            || selectors::LIVE_CLASSES.iter().any(|c| container.has_class(c));

        let stage = find_in(body, container, selectors::MATCH_STAGE).and_then(|s| {
            let classes: Vec<String> = s
                .classes()
                .into_iter()
                .filter(|c| c != "match-stage")
                .collect();
            (!classes.is_empty()).then(|| classes.join(" "))
        });

        let event_name = find_in(body, container, selectors::MATCH_EVENT)
            .and_then(|e| e.attr_any(selectors::EVENT_HEADLINE).or_else(|| e.trimmed_text()))
            .or(section_headline)
            .unwrap_or_default();

        Ok(Some(MatchEvent {
            match_id,
            event_id: container.attr_any(selectors::EVENT_ID),
            event_type: container.attr_any(selectors::EVENT_TYPE),
            region: container.attr_any(selectors::REGION),
            is_lan: flag(container, selectors::LAN),
            is_live,
            is_pinned: flag(container, selectors::PINNED),
            stars: count(container.attr_any(selectors::STARS).as_deref()),
            scheduled_time,
            time_format: time_el
                .as_ref()
                .and_then(|t| t.attr_any(selectors::TIME_FORMAT)),
            format: find_in(body, container, selectors::MATCH_META).and_then(|m| m.trimmed_text()),
            stage,
            match_url: link.as_deref().and_then(|h| resolve_url(&self.base_url, h)),
            analytics_url: find_in(body, container, selectors::ANALYTICS_LINK)
                .and_then(|a| a.attr("href"))
                .and_then(|h| resolve_url(&self.base_url, &h)),
            team1,
            team2,
            event_name,
            raw_snapshot: container.outer_html(),
        }))
    }
}

/// Extracts [`RankedTeam`]s from the ranking page.
#[derive(Debug, Clone)]
pub struct RankingExtractor {
    base_url: Url,
}

impl RankingExtractor {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Rank is the row's position on the page; no rank attribute is read.
    pub fn extract<S: Snapshot>(&self, snapshot: &S) -> Vec<RankedTeam> {
        let rows = snapshot.select_first_non_empty(selectors::RANKED_TEAMS);
        let teams: Vec<RankedTeam> = rows
            .iter()
            .enumerate()
            .map(|(index, row)| self.parse_row(row, index as u32 + 1))
            .collect();
        tracing::debug!(count = teams.len(), "Extracted ranked teams");
        teams
    }

    pub fn parse_row<N: Node>(&self, row: &N, rank: u32) -> RankedTeam {
        let points = row
            .find_any(selectors::RANK_POINTS)
            .map(|p| p.text())
            .map(|t| t.chars().filter(char::is_ascii_digit).collect::<String>())
            .and_then(|digits| digits.parse().ok())
            .unwrap_or(0);

        let change_el = row.find_any(selectors::RANK_CHANGE);
        let change = change_el
            .as_ref()
            .and_then(|c| leading_int(c.text().trim()))
            .unwrap_or(0);
        let is_new = change_el.as_ref().is_some_and(|c| c.has_class("new"));

        let id = row
            .find_any(selectors::RANK_PROFILE_LINK)
            .and_then(|a| a.attr("href"))
            .and_then(|href| href.split('/').nth(2).map(str::to_string))
            .filter(|id| !id.is_empty());

        let logo = row.find_any(selectors::RANK_LOGO);

        RankedTeam {
            team: Team {
                id,
                name: row
                    .find_any(selectors::RANK_TEAM_NAME)
                    .and_then(|n| n.trimmed_text()),
                logo: logo
                    .as_ref()
                    .and_then(|l| l.attr_any(selectors::LOGO_SRC))
                    .and_then(|src| resolve_url(&self.base_url, &src)),
                logo_alt: logo.as_ref().and_then(|l| l.attr_any(&["alt"])),
                title: logo.as_ref().and_then(|l| l.attr_any(&["title"])),
            },
            rank,
            points,
            change,
            is_new,
        }
    }
}

/// Keep non-live records starting within `(now, now + window]`.
///
/// A window reaching past the representable range has no upper bound.
pub fn within_horizon(records: Vec<MatchEvent>, now: DateTime<Utc>, window: Duration) -> Vec<MatchEvent> {
    let horizon = chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| now.checked_add_signed(w));
    records
        .into_iter()
        .filter(|r| !r.is_live)
        .filter(|r| {
            r.scheduled_time
                .is_some_and(|t| t > now && horizon.is_none_or(|h| t <= h))
        })
        .collect()
}

/// Reject poll windows that cannot be added to the current time.
pub fn validate_poll_window(window: Duration) -> Result<(), AppError> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| Utc::now().checked_add_signed(w))
        .map(|_| ())
        .ok_or_else(|| {
            AppError::ConfigError(format!(
                "Poll window of {} ms is out of range",
                window.as_millis()
            ))
        })
}

/// Resolve a record's start instant.
///
/// An embedded epoch-millisecond value wins. Otherwise the `YYYY-MM-DD`
/// found in the date section header is combined with the displayed `HH:MM`
/// in `tz`. The displayed time alone never yields an instant.
pub fn resolve_scheduled_time<Tz: TimeZone>(
    unix_millis: Option<String>,
    section_header: Option<&str>,
    clock_text: Option<&str>,
    tz: &Tz,
) -> Result<Option<DateTime<Utc>>, AppError> {
    if let Some(raw) = unix_millis {
        let millis: i64 = raw
            .parse()
            .map_err(|_| AppError::ExtractionError(format!("Invalid data-unix value '{raw}'")))?;
        if millis <= 0 {
            return Err(AppError::ExtractionError(format!(
                "Non-positive data-unix value '{raw}'"
            )));
        }
        return DateTime::from_timestamp_millis(millis)
            .map(Some)
            .ok_or_else(|| AppError::ExtractionError(format!("Out-of-range data-unix '{raw}'")));
    }

    let date = section_header
        .and_then(|h| DATE_PATTERN.captures(h))
        .and_then(|c| {
            NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)
        });
    let time = clock_text
        .and_then(|t| CLOCK_PATTERN.captures(t))
        .and_then(|c| NaiveTime::from_hms_opt(c[1].parse().ok()?, c[2].parse().ok()?, 0));

    let (Some(date), Some(time)) = (date, time) else {
        return Ok(None);
    };

    Ok(tz
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc)))
}

fn parse_base_url(base_url: &str) -> Result<Url, AppError> {
    Url::parse(base_url)
        .map_err(|e| AppError::ConfigError(format!("Invalid source base URL '{base_url}': {e}")))
}

fn parse_match_team<N: Node>(side: Option<&N>, id: Option<String>, base_url: &Url) -> Team {
    let logo = side.and_then(|s| s.find_any(selectors::TEAM_LOGO));
    Team {
        id,
        name: side
            .and_then(|s| s.find_any(selectors::TEAM_NAME))
            .and_then(|n| n.trimmed_text()),
        logo: logo
            .as_ref()
            .and_then(|l| l.attr_any(selectors::LOGO_SRC))
            .and_then(|src| resolve_url(base_url, &src)),
        logo_alt: logo.as_ref().and_then(|l| l.attr_any(&["alt"])),
        title: logo.as_ref().and_then(|l| l.attr_any(&["title"])),
    }
}

/// Look inside the match body first, then the whole container.
fn find_in<N: Node>(body: Option<&N>, container: &N, chain: &[&str]) -> Option<N> {
    body.and_then(|b| b.find_any(chain))
        .or_else(|| container.find_any(chain))
}

fn flag<N: Node>(node: &N, names: &[&str]) -> bool {
    node.attr_any(names).is_some_and(|v| v == "true")
}

fn count(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(String::from)
}

/// Signed integer prefix of `text` (`"+3"` → 3, `"-12 pts"` → -12, `"-"` → None).
fn leading_int(text: &str) -> Option<i32> {
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '+' || c == '-'))))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..end].parse().ok()
}
