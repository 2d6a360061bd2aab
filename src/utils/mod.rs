pub mod cipher;
pub mod spreadsheet;
