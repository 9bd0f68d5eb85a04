pub mod league_table;
pub mod response_cache;

pub use league_table::LeagueTable;
pub use response_cache::ResponseCache;
