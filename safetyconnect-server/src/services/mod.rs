pub mod db;
pub mod hotlines;
