//! Free-text → numeric code resolution.
//!
//! Every keyword heuristic lives in a ranked rule table below. Tables are scanned
//! top to bottom and the first hit wins, so a rule's position is its precedence.

use tracing::debug;

use crate::state::LeagueTable;
use crate::types::{QueryTerms, Timeframe};

/// League IDs as the Overtime API numbers them.
pub mod league_ids {
    pub const NCAA_FOOTBALL: i64 = 1;
    pub const NFL: i64 = 2;
    pub const MLB: i64 = 3;
    pub const NBA: i64 = 4;
    pub const NCAA_BASKETBALL: i64 = 5;
    pub const NHL: i64 = 6;
    pub const UFC: i64 = 7;
    pub const MLS: i64 = 10;
    pub const EPL: i64 = 11;
    pub const LIGUE_1: i64 = 12;
    pub const BUNDESLIGA: i64 = 13;
    pub const LA_LIGA: i64 = 14;
    pub const SERIE_A: i64 = 15;
    pub const UEFA_CHAMPIONS: i64 = 16;
}

pub mod sport_ids {
    pub const FOOTBALL: i64 = 2;
    pub const BASEBALL: i64 = 3;
    pub const BASKETBALL: i64 = 4;
    pub const SOCCER: i64 = 5;
    pub const HOCKEY: i64 = 6;
    pub const FIGHTING: i64 = 7;
    pub const TENNIS: i64 = 8;
    pub const GOLF: i64 = 9;
    pub const CRICKET: i64 = 10;
}

/// `marketType` query parameter values.
pub mod market_types {
    pub const MONEYLINE: i64 = 0;
    pub const SPREAD: i64 = 1;
    pub const TOTAL: i64 = 2;
    pub const PLAYER_PROPS: i64 = 3;
    pub const FUTURES: i64 = 10;
}

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

struct LeagueSynonym {
    terms: &'static [&'static str],
    league_id: i64,
}

/// Consulted only after both reference-table lookups miss.
const LEAGUE_SYNONYMS: &[LeagueSynonym] = &[
    LeagueSynonym { terms: &["nba", "national basketball association"], league_id: league_ids::NBA },
    LeagueSynonym { terms: &["ncaa basketball", "college basketball", "march madness"], league_id: league_ids::NCAA_BASKETBALL },
    LeagueSynonym { terms: &["nfl", "national football league"], league_id: league_ids::NFL },
    LeagueSynonym { terms: &["ncaa football", "college football"], league_id: league_ids::NCAA_FOOTBALL },
    LeagueSynonym { terms: &["mlb", "major league baseball"], league_id: league_ids::MLB },
    LeagueSynonym { terms: &["nhl", "national hockey league"], league_id: league_ids::NHL },
    LeagueSynonym { terms: &["mls", "major league soccer"], league_id: league_ids::MLS },
    LeagueSynonym { terms: &["epl", "premier league", "english premier league"], league_id: league_ids::EPL },
    LeagueSynonym { terms: &["la liga", "spanish primera division"], league_id: league_ids::LA_LIGA },
    LeagueSynonym { terms: &["serie a", "italian serie a"], league_id: league_ids::SERIE_A },
    LeagueSynonym { terms: &["bundesliga", "german bundesliga"], league_id: league_ids::BUNDESLIGA },
    LeagueSynonym { terms: &["ligue 1", "french ligue 1"], league_id: league_ids::LIGUE_1 },
    LeagueSynonym { terms: &["ucl", "champions league", "uefa champions league"], league_id: league_ids::UEFA_CHAMPIONS },
    LeagueSynonym { terms: &["ufc", "ultimate fighting championship"], league_id: league_ids::UFC },
];

/// A sport keyword in a query selects that sport's default league.
struct SportRule {
    keyword: &'static str,
    league_id: i64,
    /// Used instead when the query also says "college" or "ncaa".
    college_league_id: Option<i64>,
}

const SPORT_RULES: &[SportRule] = &[
    SportRule { keyword: "basketball", league_id: league_ids::NBA, college_league_id: Some(league_ids::NCAA_BASKETBALL) },
    SportRule { keyword: "football", league_id: league_ids::NFL, college_league_id: Some(league_ids::NCAA_FOOTBALL) },
    SportRule { keyword: "baseball", league_id: league_ids::MLB, college_league_id: None },
    SportRule { keyword: "hockey", league_id: league_ids::NHL, college_league_id: None },
    SportRule { keyword: "soccer", league_id: league_ids::EPL, college_league_id: None },
    SportRule { keyword: "fighting", league_id: league_ids::UFC, college_league_id: None },
];

/// League phrases looked for in a query, each resolved through `resolve_league`.
const LEAGUE_KEYWORDS: &[&str] = &[
    "nba", "nfl", "mlb", "nhl", "epl", "premier league", "la liga",
    "serie a", "bundesliga", "ligue 1", "mls", "champions league",
    "ncaa basketball", "ncaa football", "ufc",
];

const MARKET_TYPE_RULES: &[(&str, i64)] = &[
    ("money line", market_types::MONEYLINE),
    ("moneyline", market_types::MONEYLINE),
    ("spread", market_types::SPREAD),
    ("handicap", market_types::SPREAD),
    ("point spread", market_types::SPREAD),
    ("total", market_types::TOTAL),
    ("over under", market_types::TOTAL),
    ("over/under", market_types::TOTAL),
    ("player prop", market_types::PLAYER_PROPS),
    ("player props", market_types::PLAYER_PROPS),
    ("future", market_types::FUTURES),
    ("futures", market_types::FUTURES),
];

const TIMEFRAME_RULES: &[(&str, Timeframe)] = &[
    ("today", Timeframe::Today),
    ("tonight", Timeframe::Today),
    ("tomorrow", Timeframe::Tomorrow),
    ("this week", Timeframe::ThisWeek),
    ("upcoming", Timeframe::ThisWeek),
    ("live", Timeframe::Live),
    ("in-play", Timeframe::Live),
];

/// Exact-term sport lookup. "football" appears under both American football and
/// soccer; the American football row comes first, so it wins.
const SPORT_TERMS: &[(&[&str], i64)] = &[
    (&["basketball", "nba", "ncaa basketball", "hoops", "bball"], sport_ids::BASKETBALL),
    (&["football", "nfl", "ncaa football"], sport_ids::FOOTBALL),
    (&["baseball", "mlb"], sport_ids::BASEBALL),
    (&["hockey", "nhl"], sport_ids::HOCKEY),
    (&["soccer", "futbol", "football", "epl", "mls", "premier league"], sport_ids::SOCCER),
    (&["ufc", "mma", "boxing", "fighting"], sport_ids::FIGHTING),
    (&["tennis", "atp", "wta"], sport_ids::TENNIS),
    (&["golf", "pga"], sport_ids::GOLF),
    (&["cricket", "ipl"], sport_ids::CRICKET),
];

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve a league name, abbreviation or numeric ID.
///
/// Order: exact label, substring of the alternate name, synonym table, numeric
/// passthrough. An all-digit input skips the substring rule so "1" cannot land on
/// "France - Ligue 1".
pub fn resolve_league(table: &LeagueTable, name_or_id: &str) -> Option<i64> {
    let normalized = name_or_id.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    if let Some(entry) = table.iter().find(|e| e.label.to_lowercase() == normalized) {
        return Some(entry.id);
    }

    let numeric = normalized.chars().all(|c| c.is_ascii_digit());
    if !numeric {
        if let Some(entry) = table.iter().find(|e| {
            e.alt_name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&normalized))
        }) {
            return Some(entry.id);
        }
    }

    if let Some(syn) = LEAGUE_SYNONYMS
        .iter()
        .find(|s| s.terms.contains(&normalized.as_str()))
    {
        return Some(syn.league_id);
    }

    normalized.parse::<i64>().ok()
}

pub fn resolve_sport(term: &str) -> Option<i64> {
    let normalized = term.trim().to_lowercase();
    SPORT_TERMS
        .iter()
        .find(|(terms, _)| terms.contains(&normalized.as_str()))
        .map(|(_, id)| *id)
}

/// Name a sport code the way the reference data spells it.
pub fn sport_name(code: i64) -> Option<&'static str> {
    Some(match code {
        sport_ids::FOOTBALL => "Football",
        sport_ids::BASEBALL => "Baseball",
        sport_ids::BASKETBALL => "Basketball",
        sport_ids::SOCCER => "Soccer",
        sport_ids::HOCKEY => "Hockey",
        sport_ids::FIGHTING => "Fighting",
        sport_ids::TENNIS => "Tennis",
        sport_ids::GOLF => "Golf",
        sport_ids::CRICKET => "Cricket",
        _ => return None,
    })
}

/// Pull league, market type and timeframe filters out of a free-text query.
///
/// Passes run in a fixed order and later passes overwrite earlier ones: sport
/// keyword, league keyword, explicit `league=<id>`. Market type and timeframe are
/// independent and take the first matching rule.
pub fn extract_query_terms(table: &LeagueTable, query: &str) -> QueryTerms {
    let q = query.to_lowercase();
    let mut terms = QueryTerms::default();

    if let Some(rule) = SPORT_RULES.iter().find(|r| q.contains(r.keyword)) {
        let college = q.contains("college") || q.contains("ncaa");
        terms.league_id = match rule.college_league_id {
            Some(id) if college => Some(id),
            _ => Some(rule.league_id),
        };
    }

    for keyword in LEAGUE_KEYWORDS {
        if q.contains(keyword) {
            if let Some(id) = resolve_league(table, keyword) {
                terms.league_id = Some(id);
                break;
            }
        }
    }

    if let Some(id) = explicit_league_id(&q) {
        terms.league_id = Some(id);
    }

    terms.market_type = MARKET_TYPE_RULES
        .iter()
        .find(|(phrase, _)| q.contains(phrase))
        .map(|(_, code)| *code);

    terms.timeframe = TIMEFRAME_RULES
        .iter()
        .find(|(phrase, _)| q.contains(phrase))
        .map(|(_, tf)| *tf);

    debug!(?terms, "Extracted query terms");
    terms
}

/// Find `league<ws>[id]<ws>[=|:]<ws><digits>` where `league` starts a word.
/// Expects lowercased input.
fn explicit_league_id(q: &str) -> Option<i64> {
    let bytes = q.as_bytes();
    let mut from = 0;
    while let Some(offset) = q[from..].find("league") {
        let start = from + offset;
        from = start + "league".len();

        let at_word_start = start == 0 || {
            let prev = bytes[start - 1];
            !(prev.is_ascii_alphanumeric() || prev == b'_')
        };
        if !at_word_start {
            continue;
        }

        let mut rest = q[from..].trim_start();
        if let Some(r) = rest.strip_prefix("id") {
            rest = r.trim_start();
        }
        if let Some(r) = rest.strip_prefix('=').or_else(|| rest.strip_prefix(':')) {
            rest = r.trim_start();
        }
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(id) = digits.parse::<i64>() {
            return Some(id);
        }
    }
    None
}

pub fn market_type_label(code: i64) -> &'static str {
    match code {
        market_types::MONEYLINE => "moneyline",
        market_types::SPREAD => "spread",
        market_types::TOTAL => "total",
        market_types::PLAYER_PROPS => "player props",
        market_types::FUTURES => "futures",
        _ => "other",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
