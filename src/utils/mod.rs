pub mod format;
pub mod url;
