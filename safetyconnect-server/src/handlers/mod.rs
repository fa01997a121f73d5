pub mod hotlines;
pub mod reports;
pub mod sos;
