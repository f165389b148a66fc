/// SQL statement builders.
///
/// Every function here is pure: validated identifiers and coerced values in,
/// one statement out. Values only ever appear as `$n` placeholders; the
/// builders never see an identifier that has not passed `ident::validate`.
pub mod ddl;
pub mod dml;
pub mod join;
