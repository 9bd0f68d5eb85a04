use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::types::LeagueEntry;

// ---------------------------------------------------------------------------
// LeagueTable
// ---------------------------------------------------------------------------

/// Read-only league reference data. Loaded once at startup and shared behind an `Arc`.
///
/// Entries keep the insertion order of the source JSON object; every "first match
/// wins" rule in the resolver depends on it.
#[derive(Debug, Clone, Default)]
pub struct LeagueTable {
    entries: Vec<LeagueEntry>,
}

impl LeagueTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a JSON object keyed by stringified league ID. Malformed rows are skipped.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(s)?;
        let mut entries = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            match serde_json::from_value::<LeagueEntry>(value) {
                Ok(entry) => entries.push(entry),
                Err(e) => debug!("Skipping league reference row {key}: {e}"),
            }
        }
        Ok(Self { entries })
    }

    /// Load from disk. A missing or malformed file yields an empty table so
    /// startup never fails on reference data.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("League reference data not loaded from {}: {e}", path.display());
                return Self::empty();
            }
        };
        match Self::from_json_str(&contents) {
            Ok(table) => {
                info!(leagues = table.len(), "Loaded league reference data from {}", path.display());
                table
            }
            Err(e) => {
                warn!("League reference data at {} is malformed: {e}", path.display());
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LeagueEntry> {
        self.entries.iter()
    }

    pub fn get(&self, id: i64) -> Option<&LeagueEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn league_name(&self, id: i64) -> Option<&str> {
        self.get(id).map(|e| e.display_name())
    }

    /// League name for display; unknown IDs degrade to `League ID {id}`.
    pub fn display_league(&self, id: i64) -> String {
        self.league_name(id)
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("League ID {id}"))
    }

    pub fn ids_for_sport(&self, sport: &str) -> Vec<i64> {
        self.entries
            .iter()
            .filter(|e| e.sport.eq_ignore_ascii_case(sport))
            .map(|e| e.id)
            .collect()
    }

    /// Entries grouped by sport, sports in first-seen order.
    pub fn by_sport(&self) -> Vec<(&str, Vec<&LeagueEntry>)> {
        let mut groups: Vec<(&str, Vec<&LeagueEntry>)> = Vec::new();
        for entry in &self.entries {
            match groups.iter_mut().find(|(sport, _)| *sport == entry.sport) {
                Some((_, list)) => list.push(entry),
                None => groups.push((entry.sport.as_str(), vec![entry])),
            }
        }
        groups
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "4":  { "id": 4,  "sport": "Basketball", "label": "NBA", "opticOddsName": "NBA", "priority": 1 },
        "5":  { "id": 5,  "sport": "Basketball", "label": "NCAA Basketball", "opticOddsName": "NCAAB" },
        "11": { "id": 11, "sport": "Soccer", "label": "EPL", "opticOddsName": "England - Premier League", "isDrawAvailable": true },
        "16": { "id": 16, "sport": "Soccer", "label": "UEFA Champions League", "opticOddsName": "UEFA - Champions League" },
        "2":  { "id": 2,  "sport": "Football", "label": "NFL" }
    }"#;

    pub(crate) fn sample_table() -> LeagueTable {
        LeagueTable::from_json_str(SAMPLE).unwrap()
    }

    #[test]
    fn keeps_source_order() {
        let table = sample_table();
        let ids: Vec<i64> = table.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 5, 11, 16, 2]);
    }

    #[test]
    fn optional_fields_map_to_entry() {
        let table = sample_table();
        let epl = table.get(11).unwrap();
        assert_eq!(epl.alt_name.as_deref(), Some("England - Premier League"));
        assert_eq!(epl.draw_available, Some(true));
        assert_eq!(epl.priority, None);
        assert_eq!(table.get(2).unwrap().display_name(), "NFL");
    }

    #[test]
    fn unknown_id_degrades_to_raw_id() {
        let table = sample_table();
        assert_eq!(table.display_league(11), "England - Premier League");
        assert_eq!(table.display_league(999), "League ID 999");
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let table = LeagueTable::from_json_str(r#"{"1": {"label": "no id"}, "4": {"id": 4, "sport": "Basketball", "label": "NBA"}}"#).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn missing_file_is_empty_table() {
        let table = LeagueTable::load("does/not/exist.json");
        assert!(table.is_empty());
    }

    #[test]
    fn groups_by_sport_in_first_seen_order() {
        let table = sample_table();
        let groups = table.by_sport();
        let sports: Vec<&str> = groups.iter().map(|(s, _)| *s).collect();
        assert_eq!(sports, vec!["Basketball", "Soccer", "Football"]);
        assert_eq!(table.ids_for_sport("soccer"), vec![11, 16]);
    }

    #[test]
    fn bundled_reference_file_parses() {
        let table = LeagueTable::load(concat!(env!("CARGO_MANIFEST_DIR"), "/data/leagues.json"));
        assert_eq!(table.get(4).map(|e| e.label.as_str()), Some("NBA"));
        assert_eq!(table.get(11).map(|e| e.label.as_str()), Some("EPL"));
    }
}
