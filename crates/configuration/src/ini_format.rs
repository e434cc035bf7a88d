//! INI parsing for the connection file.
//!
//! Values are taken literally: a backslash or a quote is part of the value,
//! never an escape. Option names are case-insensitive and stored lowercase;
//! section names keep their case.

use config::{FileStoredFormat, Format, Map, Value, ValueKind};
use ini::{Ini, ParseOption};
use std::error::Error;

#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralIni;

impl Format for LiteralIni {
    fn parse(
        &self,
        uri: Option<&String>,
        text: &str,
    ) -> Result<Map<String, Value>, Box<dyn Error + Send + Sync>> {
        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(text, options)?;

        let mut root = Map::new();
        for (section, properties) in ini.iter() {
            let mut entries = Map::new();
            for (key, value) in properties.iter() {
                entries.insert(
                    key.to_lowercase(),
                    Value::new(uri, ValueKind::String(value.to_owned())),
                );
            }
            match section {
                Some(name) => {
                    root.insert(name.to_owned(), Value::new(uri, ValueKind::Table(entries)));
                }
                None => root.extend(entries),
            }
        }
        Ok(root)
    }
}

impl FileStoredFormat for LiteralIni {
    fn file_extensions(&self) -> &'static [&'static str] {
        &["ini"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(text: &str, name: &str) -> Map<String, Value> {
        let mut root = LiteralIni.parse(None, text).unwrap();
        root.remove(name).unwrap().into_table().unwrap()
    }

    fn string(table: &Map<String, Value>, key: &str) -> String {
        table[key].clone().into_string().unwrap()
    }

    #[test]
    fn backslashes_and_quotes_are_kept() {
        let table = section(
            "[postgresql]\npassword=pa\\nss\nhost=\"quoted\"\nuser=C:\\Users\\x\n",
            "postgresql",
        );
        assert_eq!(string(&table, "password"), "pa\\nss");
        assert_eq!(string(&table, "host"), "\"quoted\"");
        assert_eq!(string(&table, "user"), "C:\\Users\\x");
    }

    #[test]
    fn option_names_are_lowercased() {
        let table = section("[Staging]\nHOST=h\nDataBase=d\n", "Staging");
        assert_eq!(string(&table, "host"), "h");
        assert_eq!(string(&table, "database"), "d");
    }

    #[test]
    fn keys_outside_sections_stay_at_the_root() {
        let root = LiteralIni.parse(None, "stray=1\n[postgresql]\nhost=h\n").unwrap();
        assert!(root.contains_key("stray"));
        assert!(root.contains_key("postgresql"));
    }
}
