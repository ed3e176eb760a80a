//! Parsers: Script Parser and Module Parser.

pub mod module;
pub mod script;
