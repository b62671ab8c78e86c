use crate::error::IdError;
use std::fmt;

pub const SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub table: String,
    pub record_id: String,
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.table, SEPARATOR, self.record_id)
    }
}

// Decoding takes the first configured table whose `name + '_'` prefixes the
// id, so earlier tables win when names overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdCodec {
    tables: Vec<String>,
}

impl IdCodec {
    pub fn new(tables: Vec<String>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn encode(&self, table: &str, record_id: &str) -> Result<String, IdError> {
        if !self.tables.iter().any(|known| known == table) {
            return Err(IdError::UnknownTable(table.to_string()));
        }
        if record_id.is_empty() {
            return Err(IdError::EmptyRecordId(table.to_string()));
        }
        Ok(DocumentKey {
            table: table.to_string(),
            record_id: record_id.to_string(),
        }
        .to_string())
    }

    pub fn decode(&self, id: &str) -> Result<DocumentKey, IdError> {
        for table in &self.tables {
            let Some(rest) = id.strip_prefix(table.as_str()) else {
                continue;
            };
            let Some(record_id) = rest.strip_prefix(SEPARATOR) else {
                continue;
            };
            if record_id.is_empty() {
                continue;
            }
            return Ok(DocumentKey {
                table: table.clone(),
                record_id: record_id.to_string(),
            });
        }
        Err(IdError::Unresolvable(id.to_string()))
    }

    // (earlier, later) pairs where ids of `later` would decode as `earlier`.
    pub fn ambiguous_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (position, earlier) in self.tables.iter().enumerate() {
            let prefix = format!("{earlier}{SEPARATOR}");
            for later in &self.tables[position + 1..] {
                if later.starts_with(&prefix) {
                    pairs.push((earlier.clone(), later.clone()));
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DEFAULT_TABLES;

    fn codec(tables: &[&str]) -> IdCodec {
        IdCodec::new(tables.iter().map(|table| table.to_string()).collect())
    }

    #[test]
    fn every_builtin_table_round_trips() {
        let codec = codec(&DEFAULT_TABLES);
        for table in DEFAULT_TABLES {
            for record_id in ["1", "42", "000917", "A_B", "9f1c-7a"] {
                let id = codec.encode(table, record_id).expect("configured table encodes");
                let key = codec.decode(&id).expect("encoded id decodes");
                assert_eq!(key.table, table);
                assert_eq!(key.record_id, record_id);
            }
        }
    }

    #[test]
    fn earlier_table_wins_when_names_overlap() {
        let codec = codec(&["FORMS_MASTER", "FORMS_MASTER_ARCHIVE"]);
        let key = codec
            .decode("FORMS_MASTER_ARCHIVE_77")
            .expect("prefix match should resolve");

        assert_eq!(key.table, "FORMS_MASTER");
        assert_eq!(key.record_id, "ARCHIVE_77");
        assert_eq!(
            codec.ambiguous_pairs(),
            vec![("FORMS_MASTER".to_string(), "FORMS_MASTER_ARCHIVE".to_string())]
        );
    }

    #[test]
    fn reversed_order_resolves_to_longer_table() {
        let codec = codec(&["FORMS_MASTER_ARCHIVE", "FORMS_MASTER"]);
        let key = codec.decode("FORMS_MASTER_ARCHIVE_77").expect("should resolve");
        assert_eq!(key.table, "FORMS_MASTER_ARCHIVE");
        assert_eq!(key.record_id, "77");
        assert!(codec.ambiguous_pairs().is_empty());
    }

    #[test]
    fn unknown_tables_and_bare_prefixes_are_rejected() {
        let codec = codec(&DEFAULT_TABLES);

        assert_eq!(
            codec.encode("PAYROLL", "1"),
            Err(IdError::UnknownTable("PAYROLL".to_string()))
        );
        assert_eq!(
            codec.encode("FORMS_MASTER", ""),
            Err(IdError::EmptyRecordId("FORMS_MASTER".to_string()))
        );
        assert!(matches!(codec.decode("PAYROLL_1"), Err(IdError::Unresolvable(_))));
        assert!(matches!(codec.decode("FORMS_MASTER_"), Err(IdError::Unresolvable(_))));
        assert!(matches!(codec.decode("FORMS_MASTER"), Err(IdError::Unresolvable(_))));
        assert!(matches!(codec.decode("SurveyCertificates:3"), Err(IdError::Unresolvable(_))));
    }
}
