use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::config::LLM_MARKET_LIMIT;
use crate::resolver::{resolve_sport, sport_name};
use crate::state::LeagueTable;
use crate::types::{GameSummary, LiveGame, MarketRecord, MarketType, Odds};

pub const LLM_HEADER: &str = "Available Markets:\n\n";
pub const NO_MARKETS_DATA: &str = "No markets data available.";

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// `+130` / `-150`, rounded to the nearest integer.
pub fn format_american(american: f64) -> String {
    let rounded = american.round() as i64;
    if american > 0.0 {
        format!("+{rounded}")
    } else {
        rounded.to_string()
    }
}

/// American odds when present, else decimal to two places, else `N/A`.
pub fn format_price(odds: &Odds) -> String {
    match (odds.american, odds.decimal) {
        (Some(a), _) => format_american(a),
        (None, Some(d)) => format!("{d:.2}"),
        (None, None) => "N/A".to_string(),
    }
}

pub fn format_line(line: f64) -> String {
    if line > 0.0 {
        format!("+{line}")
    } else {
        line.to_string()
    }
}

fn short_date(dt: &DateTime<Utc>) -> String {
    dt.format("%b %-d, %Y").to_string()
}

fn kickoff(dt: &DateTime<Utc>) -> String {
    dt.format("%A, %B %-d, %Y %H:%M UTC").to_string()
}

fn list_time(dt: &DateTime<Utc>) -> String {
    dt.format("%a %b %-d %H:%M").to_string()
}

/// IDs longer than 16 characters display as their first 8 plus `...`.
pub fn shorten_game_id(game_id: &str) -> String {
    if game_id.chars().count() > 16 {
        let head: String = game_id.chars().take(8).collect();
        format!("{head}...")
    } else {
        game_id.to_string()
    }
}

// ---------------------------------------------------------------------------
// LLM context
// ---------------------------------------------------------------------------

fn is_moneyline_like(r: &MarketRecord) -> bool {
    r.type_name == "winner"
        || r.market_name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains("moneyline"))
}

/// Parents only, moneyline records first choice when any exist, at most 10.
pub fn truncate_for_llm(records: &[MarketRecord]) -> Vec<&MarketRecord> {
    let parents: Vec<&MarketRecord> = records.iter().filter(|r| !r.is_child_market).collect();
    let moneylines: Vec<&MarketRecord> = parents.iter().copied().filter(|r| is_moneyline_like(r)).collect();
    let chosen = if moneylines.is_empty() { parents } else { moneylines };
    chosen.into_iter().take(LLM_MARKET_LIMIT).collect()
}

fn market_label(r: &MarketRecord) -> String {
    match (&r.market_name, r.type_name.as_str()) {
        (Some(name), _) => name.clone(),
        (None, "winner") => "Moneyline".to_string(),
        (None, "") => "Unnamed market".to_string(),
        (None, t) => t.to_string(),
    }
}

/// Compact text block handed to the LLM as market context.
pub fn format_for_llm(records: &[MarketRecord]) -> String {
    let retained = truncate_for_llm(records);
    if retained.is_empty() {
        return NO_MARKETS_DATA.to_string();
    }

    let mut out = String::from(LLM_HEADER);
    for r in retained {
        let mut event = if !r.home_team.is_empty() && !r.away_team.is_empty() {
            format!("{} vs {}", r.home_team, r.away_team)
        } else {
            String::new()
        };
        if !r.league_name.is_empty() {
            event = format!("{}: {event}", r.league_name);
        }
        if let Some(dt) = &r.maturity {
            let _ = write!(event, " ({})", short_date(dt));
        }
        let _ = writeln!(out, "Event: {event}");

        let label = market_label(r);
        let _ = writeln!(out, "Market: {label}");

        if !r.odds.is_empty() {
            out.push_str("Odds:\n");
            let moneyline = r.type_name == "winner" || label == "Moneyline";
            let home = if r.home_team.is_empty() { "Home" } else { r.home_team.as_str() };
            let away = if r.away_team.is_empty() { "Away" } else { r.away_team.as_str() };
            for (i, odds) in r.odds.iter().enumerate() {
                let outcome = match (moneyline, i) {
                    (true, 0) => home.to_string(),
                    (true, 1) if r.sport == "Soccer" => "Draw".to_string(),
                    (true, _) => away.to_string(),
                    (false, _) => format!("Option {}", i + 1),
                };
                let _ = writeln!(out, "- {outcome}: {}", format_price(odds));
            }
        }
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Game card
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PriceCell {
    pub label: String,
    pub american: Option<f64>,
}

impl PriceCell {
    pub fn price(&self) -> String {
        self.american.map(format_american).unwrap_or_else(|| "N/A".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePrice {
    pub line: f64,
    pub american: Option<f64>,
}

/// Home side at `line`, away side at `-line`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadRow {
    pub home: Option<LinePrice>,
    pub away: Option<LinePrice>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TotalRow {
    pub line: f64,
    pub over: Option<f64>,
    pub under: Option<f64>,
}

/// Structured view of one game's markets. The TUI styles it; `to_markup` flattens it.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCard {
    pub league: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: Option<String>,
    pub moneyline: Vec<PriceCell>,
    pub spreads: Vec<SpreadRow>,
    pub totals: Vec<TotalRow>,
    pub market_count: usize,
}

fn american_at(r: &MarketRecord, idx: usize) -> Option<f64> {
    r.odds.get(idx).and_then(|o| o.american)
}

fn sorted_lines<'a>(records: impl Iterator<Item = &'a MarketRecord>) -> Vec<f64> {
    let mut lines: Vec<f64> = records.filter_map(|r| r.line).collect();
    lines.sort_by(|a, b| a.total_cmp(b));
    lines.dedup();
    lines
}

/// Group a game's markets into winner, handicap and total sections.
/// Returns `None` when there is nothing to show.
pub fn format_for_display(
    table: &LeagueTable,
    records: &[MarketRecord],
    game_info: Option<&GameSummary>,
) -> Option<DisplayCard> {
    let first = records.first()?;

    let (home_team, away_team, maturity, league_id) = match game_info {
        Some(g) => (g.home_team.clone(), g.away_team.clone(), g.maturity, g.league_id),
        None => (first.home_team.clone(), first.away_team.clone(), first.maturity, first.league_id),
    };
    let league = league_id
        .and_then(|id| table.league_name(id).map(str::to_string))
        .or_else(|| (!first.league_name.is_empty()).then(|| first.league_name.clone()));

    let of_type = |t: MarketType| records.iter().filter(move |r| r.market_type == t);

    let mut moneyline = Vec::new();
    if let Some(ml) = of_type(MarketType::Moneyline).find(|r| !r.odds.is_empty()) {
        moneyline.push(PriceCell { label: home_team.clone(), american: american_at(ml, 0) });
        if ml.odds.len() > 1 {
            let away_idx = if ml.odds.len() == 3 { 2 } else { 1 };
            moneyline.push(PriceCell { label: away_team.clone(), american: american_at(ml, away_idx) });
        }
        if ml.odds.len() > 2 {
            moneyline.push(PriceCell { label: "Draw".to_string(), american: american_at(ml, 1) });
        }
    }

    let spreads = sorted_lines(of_type(MarketType::Spread))
        .into_iter()
        .filter_map(|line| {
            let home = of_type(MarketType::Spread)
                .find(|r| r.line == Some(line) && !r.odds.is_empty())
                .map(|r| LinePrice { line, american: american_at(r, 0) });
            let away = of_type(MarketType::Spread)
                .find(|r| r.line == Some(-line) && !r.odds.is_empty())
                .map(|r| LinePrice { line: -line, american: american_at(r, 1) });
            (home.is_some() || away.is_some()).then_some(SpreadRow { home, away })
        })
        .collect();

    // Several markets on one line: the last one listed wins.
    let totals = sorted_lines(of_type(MarketType::Total))
        .into_iter()
        .filter_map(|line| {
            let market = of_type(MarketType::Total).filter(|r| r.line == Some(line)).last()?;
            (market.odds.len() >= 2).then(|| TotalRow {
                line,
                over: american_at(market, 0),
                under: american_at(market, 1),
            })
        })
        .collect();

    Some(DisplayCard {
        league,
        home_team,
        away_team,
        kickoff: maturity.as_ref().map(kickoff),
        moneyline,
        spreads,
        totals,
        market_count: records.len(),
    })
}

impl DisplayCard {
    pub fn title(&self) -> String {
        format!("{} @ {}", self.away_team, self.home_team)
    }

    /// Plain-text rendering, one section per market group.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        if let Some(league) = &self.league {
            let _ = writeln!(out, "{league}");
        }
        let _ = writeln!(out, "{}", self.title());
        if let Some(k) = &self.kickoff {
            let _ = writeln!(out, "{k}");
        }

        if !self.moneyline.is_empty() {
            out.push_str("\nWINNER\n");
            for cell in &self.moneyline {
                let _ = writeln!(out, "  {}: {}", cell.label, cell.price());
            }
        }

        if !self.spreads.is_empty() {
            out.push_str("\nHANDICAP\n");
            let _ = writeln!(out, "  {} | {}", self.home_team, self.away_team);
            for row in &self.spreads {
                let cell = |side: &Option<LinePrice>| match side {
                    Some(lp) => format!(
                        "{} {}",
                        format_line(lp.line),
                        lp.american.map(format_american).unwrap_or_else(|| "N/A".to_string())
                    ),
                    None => "-".to_string(),
                };
                let _ = writeln!(out, "  {} | {}", cell(&row.home), cell(&row.away));
            }
        }

        if !self.totals.is_empty() {
            out.push_str("\nTOTAL\n  Over | Under\n");
            for row in &self.totals {
                let price = |p: Option<f64>| p.map(format_american).unwrap_or_else(|| "N/A".to_string());
                let _ = writeln!(
                    out,
                    "  {} {} | {} {}",
                    row.line,
                    price(row.over),
                    row.line,
                    price(row.under)
                );
            }
        }

        let _ = write!(out, "\n{} markets available", self.market_count);
        out
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

pub fn format_game_list(league_name: &str, games: &[GameSummary]) -> String {
    let mut out = format!("{} Games for {league_name}\n", games.len());
    for g in games {
        let when = g.maturity.as_ref().map(list_time).unwrap_or_default();
        let _ = writeln!(
            out,
            "[{}] {} @ {} {when}",
            shorten_game_id(&g.game_id),
            g.away_team,
            g.home_team
        );
    }
    out.push_str("Type /gameid [ID] to view markets");
    out
}

/// Numeric filters match the league ID; anything else matches league name or sport.
pub fn filter_live_games(games: Vec<LiveGame>, filter: Option<&str>) -> Vec<LiveGame> {
    let Some(f) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
        return games;
    };
    if let Ok(id) = f.parse::<i64>() {
        return games.into_iter().filter(|g| g.game.league_id == Some(id)).collect();
    }
    let f = f.to_lowercase();
    games
        .into_iter()
        .filter(|g| {
            g.game.league_name.to_lowercase().contains(&f) || g.game.sport.to_lowercase().contains(&f)
        })
        .collect()
}

pub fn format_live_games(games: &[LiveGame]) -> String {
    let mut groups: Vec<(String, Vec<&LiveGame>)> = Vec::new();
    for g in games {
        let key = format!("{}: {}", g.game.sport, g.game.league_name);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, list)) => list.push(g),
            None => groups.push((key, vec![g])),
        }
    }

    let mut out = format!("Live Games ({})\n", games.len());
    for (key, list) in &groups {
        let _ = writeln!(out, "\n{key} ({})", list.len());
        for g in list {
            let clock = match (&g.game_period, &g.game_clock) {
                (Some(p), Some(c)) => format!("{p} {c}"),
                (Some(p), None) => p.clone(),
                _ => g.status_code.clone(),
            };
            let _ = writeln!(
                out,
                "[{}] {} {} @ {} {}  {clock}",
                shorten_game_id(&g.game.game_id),
                g.game.away_team,
                g.away_score.unwrap_or(0),
                g.game.home_team,
                g.home_score.unwrap_or(0),
            );
        }
    }
    out.push_str("\nType /gameid [ID] to view markets");
    out
}

const LEAGUES_PER_SPORT: usize = 5;

/// `/leagueid` output: a per-sport summary, or the leagues matching a sport,
/// league label or ID.
pub fn format_league_listing(table: &LeagueTable, filter: Option<&str>) -> String {
    if table.is_empty() {
        return "League ID data not loaded.".to_string();
    }
    let groups = table.by_sport();
    let mut out = String::from("League ID Reference:\n\n");

    let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
        for (sport, leagues) in &groups {
            let _ = writeln!(out, "{sport} Leagues:");
            for l in leagues.iter().take(LEAGUES_PER_SPORT) {
                let _ = writeln!(out, "  {}: {}", l.id, l.label);
            }
            if leagues.len() > LEAGUES_PER_SPORT {
                let _ = writeln!(out, "  ...and {} more {sport} leagues", leagues.len() - LEAGUES_PER_SPORT);
            }
            out.push('\n');
        }
        out.push_str(
            "Use /leagueid [sport|league|id] to see more details. \
             For example: /leagueid Soccer or /leagueid EPL or /leagueid 11",
        );
        return out;
    };

    if let Some((sport, leagues)) = groups.iter().find(|(s, _)| *s == filter) {
        let _ = writeln!(out, "{sport} leagues:");
        for l in leagues {
            let _ = writeln!(out, "  {}: {}", l.id, l.label);
        }
        return out;
    }

    let needle = filter.to_lowercase();
    let mut found = false;
    for (sport, leagues) in groups.iter().filter(|(s, _)| s.to_lowercase().contains(&needle)) {
        let _ = writeln!(out, "{sport} leagues:");
        for l in leagues {
            let _ = writeln!(out, "  {}: {}", l.id, l.label);
        }
        found = true;
    }
    if found {
        return out;
    }

    for (sport, leagues) in &groups {
        let matching: Vec<_> = leagues
            .iter()
            .filter(|l| l.label.to_lowercase().contains(&needle))
            .collect();
        if matching.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{sport} - matching leagues:");
        for l in matching {
            let _ = writeln!(out, "  {}: {}", l.id, l.label);
        }
        found = true;
    }
    if found {
        return out;
    }

    // Sport aliases such as "futbol" or "hoops".
    if let Some(sport) = resolve_sport(filter).and_then(sport_name) {
        let ids = table.ids_for_sport(sport);
        if !ids.is_empty() {
            let _ = writeln!(out, "{sport} leagues:");
            for e in ids.iter().filter_map(|id| table.get(*id)) {
                let _ = writeln!(out, "  {}: {}", e.id, e.label);
            }
            return out;
        }
    }

    match filter.parse::<i64>() {
        Ok(id) => match table.get(id) {
            Some(e) => {
                let _ = writeln!(out, "League ID {id}:");
                let _ = writeln!(out, "  Sport: {}", e.sport);
                let _ = writeln!(out, "  Label: {}", e.label);
                if let Some(name) = &e.alt_name {
                    let _ = writeln!(out, "  Full Name: {name}");
                }
                if let Some(p) = e.priority {
                    let _ = writeln!(out, "  Priority: {p}");
                }
                if let Some(d) = e.draw_available {
                    let _ = writeln!(out, "  Draw Available: {d}");
                }
            }
            None => {
                let _ = write!(out, "No league found for ID {id}.");
            }
        },
        Err(_) => {
            let _ = write!(out, "No matches found for \"{filter}\". Try a different filter or check /help.");
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Type filter
// ---------------------------------------------------------------------------

/// Case-insensitive substring match against the raw type or the market name.
pub fn filter_by_type<'a>(records: &'a [MarketRecord], market_type: &str) -> Vec<&'a MarketRecord> {
    let needle = market_type.trim().to_lowercase();
    records
        .iter()
        .filter(|r| {
            r.type_name.to_lowercase().contains(&needle)
                || r.market_name.as_deref().is_some_and(|n| n.to_lowercase().contains(&needle))
        })
        .collect()
}

pub fn friendly_type_name(market_type: &str) -> &str {
    match market_type {
        "winner" => "Moneyline",
        "spread" => "Point Spread",
        "total" => "Over/Under",
        "firstPeriod" => "First Half",
        other => other,
    }
}

pub fn format_filtered_markets(table: &LeagueTable, market_type: &str, records: &[&MarketRecord]) -> String {
    let Some(first) = records.first() else {
        return format!("No markets found with type \"{}\"", market_type.trim());
    };

    let mut title = if !first.home_team.is_empty() && !first.away_team.is_empty() {
        format!("{} @ {}", first.away_team, first.home_team)
    } else {
        "Filtered Markets".to_string()
    };
    if let Some(name) = first.league_id.and_then(|id| table.league_name(id)) {
        title = format!("{name}: {title}");
    }

    let mut out = format!("{title}\n");
    if let Some(dt) = &first.maturity {
        let _ = writeln!(out, "{}", list_time(dt));
    }
    let _ = writeln!(out, "Showing {} Markets\n", friendly_type_name(market_type.trim()));
    for r in records {
        let line = r.line.map(|l| format!(" {}", format_line(l))).unwrap_or_default();
        let prices: Vec<String> = r.odds.iter().map(format_price).collect();
        let _ = writeln!(out, "{}{line}: {}", market_label(r), prices.join(" / "));
    }
    let _ = write!(out, "\n{} markets found", records.len());
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
