//! Cross-cutting utilities: lexical path handling and scoped mtime faking.

pub mod fs;
pub mod mtime;
