use chrono::{FixedOffset, TimeZone, Utc};
use matchpulse_client::HtmlSnapshot;
use matchpulse_core::extract::{MatchExtractor, RankingExtractor};

use crate::integration::common::{MATCHES_HTML, RANKINGS_HTML};

const BASE: &str = "https://www.hltv.org";

#[test]
fn match_page_yields_complete_records_only() {
    let snapshot = HtmlSnapshot::parse(MATCHES_HTML);
    let records = MatchExtractor::new(BASE, Utc).unwrap().extract(&snapshot);

    let ids: Vec<_> = records.iter().map(|r| r.match_id.as_deref()).collect();
    assert_eq!(ids, [Some("2372001"), Some("2372002"), Some("2372005")]);
}

#[test]
fn embedded_timestamp_and_fields_are_normalized() {
    let snapshot = HtmlSnapshot::parse(MATCHES_HTML);
    let records = MatchExtractor::new(BASE, Utc).unwrap().extract(&snapshot);
    let m = &records[0];

    assert_eq!(
        m.scheduled_time,
        Some(Utc.with_ymd_and_hms(2024, 5, 11, 14, 0, 0).unwrap())
    );
    assert_eq!(m.event_id.as_deref(), Some("7148"));
    assert_eq!(m.event_type.as_deref(), Some("MAJOR"));
    assert_eq!(m.region.as_deref(), Some("Europe"));
    assert!(m.is_lan);
    assert!(!m.is_live);
    assert!(m.is_pinned);
    assert_eq!(m.stars, 1);
    assert_eq!(m.time_format.as_deref(), Some("HH:mm"));
    assert_eq!(m.format.as_deref(), Some("bo3"));
    assert_eq!(m.stage.as_deref(), Some("playoffs"));
    assert_eq!(m.event_name, "PGL Major Copenhagen 2024");
    assert_eq!(
        m.match_url.as_deref(),
        Some("https://www.hltv.org/matches/2372001/faze-vs-vitality-pgl-major-copenhagen-2024")
    );
    assert_eq!(
        m.analytics_url.as_deref(),
        Some("https://www.hltv.org/betting/analytics/2372001/faze-vs-vitality")
    );

    assert_eq!(m.team1.id.as_deref(), Some("6667"));
    assert_eq!(m.team1.name.as_deref(), Some("FaZe"));
    assert_eq!(
        m.team1.logo.as_deref(),
        Some("https://www.hltv.org/img/static/team/logo/6667")
    );
    assert_eq!(m.team1.title.as_deref(), Some("FaZe Clan"));
    assert_eq!(
        m.team2.logo.as_deref(),
        Some("https://img-cdn.hltv.org/teamlogo/vitality.svg")
    );
    assert!(m.raw_snapshot.contains("data-match-id=\"2372001\""));
}

#[test]
fn displayed_time_is_attached_to_its_section_date() {
    let snapshot = HtmlSnapshot::parse(MATCHES_HTML);

    let utc = MatchExtractor::new(BASE, Utc).unwrap().extract(&snapshot);
    assert_eq!(
        utc[1].scheduled_time,
        Some(Utc.with_ymd_and_hms(2024, 5, 11, 18, 30, 0).unwrap())
    );
    assert_eq!(utc[1].event_name, "Saturday - 2024-05-11");
    assert_eq!(utc[1].stars, 0);
    assert!(!utc[1].is_lan);

    let cest = FixedOffset::east_opt(2 * 3600).unwrap();
    let local = MatchExtractor::new(BASE, cest).unwrap().extract(&snapshot);
    assert_eq!(
        local[1].scheduled_time,
        Some(Utc.with_ymd_and_hms(2024, 5, 11, 16, 30, 0).unwrap())
    );
}

#[test]
fn live_match_without_time_stays_unscheduled() {
    let snapshot = HtmlSnapshot::parse(MATCHES_HTML);
    let records = MatchExtractor::new(BASE, Utc).unwrap().extract(&snapshot);
    let live = &records[2];

    assert!(live.is_live);
    assert!(live.scheduled_time.is_none());
    assert_eq!(live.stars, 2);
    assert_eq!(live.event_name, "Sunday - 2024-05-12");
    assert_eq!(live.team1.name.as_deref(), Some("Heroic"));
}

#[test]
fn ranking_page_ranks_by_position() {
    let snapshot = HtmlSnapshot::parse(RANKINGS_HTML);
    let teams = RankingExtractor::new(BASE).unwrap().extract(&snapshot);

    assert_eq!(teams.len(), 3);
    assert_eq!(
        teams.iter().map(|t| t.rank).collect::<Vec<_>>(),
        [1, 2, 3]
    );

    let faze = &teams[0];
    assert_eq!(faze.team.id.as_deref(), Some("6667"));
    assert_eq!(faze.team.name.as_deref(), Some("FaZe"));
    assert_eq!(faze.points, 983);
    assert_eq!(faze.change, 1);
    assert!(!faze.is_new);
    assert_eq!(
        faze.team.logo.as_deref(),
        Some("https://img-cdn.hltv.org/teamlogo/faze.svg")
    );
    assert_eq!(faze.team.logo_alt.as_deref(), Some("FaZe"));

    // Rank comes from order, not from the larger points total.
    let vitality = &teams[1];
    assert_eq!(vitality.points, 1012);
    assert_eq!(vitality.change, -1);
    assert_eq!(
        vitality.team.logo.as_deref(),
        Some("https://www.hltv.org/img/static/team/logo/9565")
    );

    let unnamed = &teams[2];
    assert!(unnamed.team.name.is_none());
    assert!(unnamed.team.id.is_none());
    assert_eq!(unnamed.points, 0);
    assert_eq!(unnamed.change, 0);
    assert!(unnamed.is_new);
}
