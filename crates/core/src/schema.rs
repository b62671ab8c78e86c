use crate::ids::IdCodec;
use crate::models::{DocumentMetadata, MetadataMap};
use tracing::warn;

pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRoles {
    pub id: &'static str,
    pub name: &'static str,
    pub mime_type: &'static str,
    pub title: &'static str,
    pub content: &'static str,
    pub last_update: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraColumn {
    pub column: &'static str,
    pub key: &'static str,
    pub kind: ColumnKind,
}

const fn text(column: &'static str, key: &'static str) -> ExtraColumn {
    ExtraColumn {
        column,
        key,
        kind: ColumnKind::Text,
    }
}

const fn date(column: &'static str, key: &'static str) -> ExtraColumn {
    ExtraColumn {
        column,
        key,
        kind: ColumnKind::Date,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment {
    Literal(&'static str),
    // Value of an extra column by metadata key. Without a fallback a missing
    // value drops the segment.
    Metadata {
        key: &'static str,
        fallback: Option<&'static str>,
    },
    DocumentName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: &'static str,
    pub columns: ColumnRoles,
    pub active_column: Option<&'static str>,
    pub reference_column: Option<&'static str>,
    pub extra_columns: &'static [ExtraColumn],
    pub path: &'static [PathSegment],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRow {
    pub id: String,
    pub name: String,
    pub title: Option<String>,
    pub mime_type: Option<String>,
    pub modified_time: Option<String>,
    pub size: Option<i64>,
    pub form_no: Option<String>,
    pub extras: MetadataMap,
}

impl TableSchema {
    pub fn document_from_row(&self, composite_id: String, row: SourceRow) -> DocumentMetadata {
        let path = self.render_path(&row);
        let title = row
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| row.name.clone());
        let mime_type = row
            .mime_type
            .filter(|mime| !mime.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        DocumentMetadata {
            composite_id,
            source_table: self.table.to_string(),
            original_id: row.id,
            name: row.name,
            title,
            form_no: row.form_no,
            mime_type,
            size_bytes: row.size.unwrap_or(0).to_string(),
            modified_time: row.modified_time.unwrap_or_default(),
            path,
            metadata: row.extras,
        }
    }

    fn render_path(&self, row: &SourceRow) -> String {
        let mut segments = Vec::with_capacity(self.path.len());
        for segment in self.path {
            match segment {
                PathSegment::Literal(value) => segments.push(value.to_string()),
                PathSegment::DocumentName => segments.push(row.name.clone()),
                PathSegment::Metadata { key, fallback } => {
                    let value = row
                        .extras
                        .get(*key)
                        .and_then(|value| value.as_deref())
                        .map(str::trim)
                        .filter(|value| !value.is_empty());
                    match (value, fallback) {
                        (Some(value), _) => segments.push(value.to_string()),
                        (None, Some(fallback)) => segments.push(fallback.to_string()),
                        (None, None) => {}
                    }
                }
            }
        }
        segments.join("/")
    }
}

pub const FORMS_MASTER: TableSchema = TableSchema {
    table: "FORMS_MASTER",
    columns: ColumnRoles {
        id: "FORMS_MASTER_ID",
        name: "DOCFILE_NAME",
        mime_type: "DOCFILE_TYPE",
        title: "TITLE",
        content: "DOCFILE_CONTENT",
        last_update: "UpdateDate",
    },
    active_column: Some("IsActive"),
    reference_column: Some("FORM_NO"),
    extra_columns: &[
        text("FORM_TYPE", "form_type"),
        text("DEPARTMENT_ID", "department"),
        date("EFFECTIVE_DATE", "effective_date"),
        date("REVISION_DATE", "revision_date"),
        text("REVISION_NO", "revision_no"),
        text("STATUS", "status"),
    ],
    path: &[
        PathSegment::Metadata {
            key: "form_type",
            fallback: None,
        },
        PathSegment::Metadata {
            key: "department",
            fallback: Some("General"),
        },
        PathSegment::DocumentName,
    ],
};

pub const VESSEL_CERTIFICATES: TableSchema = TableSchema {
    table: "VESSEL_CERTIFICATES",
    columns: ColumnRoles {
        id: "VESSEL_CERTIFICATES_ID",
        name: "CERTIFICATE_NAME",
        mime_type: "CERTIFICATE_TYPE",
        title: "CERTIFICATE_TITLE",
        content: "CERTIFICATE_CONTENT",
        last_update: "UpdateDate",
    },
    active_column: Some("IsActive"),
    reference_column: Some("CERTIFICATE_NO"),
    extra_columns: &[
        text("VESSEL_ID", "vessel_id"),
        text("CERTIFICATE_NO", "certificate_no"),
        date("ISSUE_DATE", "issue_date"),
        date("EXPIRY_DATE", "expiry_date"),
        text("ISSUING_AUTHORITY", "issuing_authority"),
        text("STATUS", "status"),
    ],
    path: &[
        PathSegment::Literal("Certificates"),
        PathSegment::Literal("Vessel"),
        PathSegment::Metadata {
            key: "vessel_id",
            fallback: None,
        },
        PathSegment::DocumentName,
    ],
};

pub const SURVEY_CERTIFICATES: TableSchema = TableSchema {
    table: "SurveyCertificates",
    columns: ColumnRoles {
        id: "SURVEY_CERTIFICATE_ID",
        name: "CERTIFICATE_NAME",
        mime_type: "CERTIFICATE_TYPE",
        title: "CERTIFICATE_TITLE",
        content: "CERTIFICATE_CONTENT",
        last_update: "UpdateDate",
    },
    active_column: Some("IsActive"),
    reference_column: Some("SURVEY_TYPE"),
    extra_columns: &[
        text("VESSEL_ID", "vessel_id"),
        text("SURVEY_TYPE", "survey_type"),
        date("SURVEY_DATE", "survey_date"),
        date("NEXT_SURVEY_DATE", "next_survey_date"),
        text("SURVEYOR", "surveyor"),
        text("STATUS", "status"),
    ],
    path: &[
        PathSegment::Literal("Certificates"),
        PathSegment::Literal("Survey"),
        PathSegment::Metadata {
            key: "vessel_id",
            fallback: None,
        },
        PathSegment::DocumentName,
    ],
};

pub const BUILTIN_SCHEMAS: [TableSchema; 3] = [FORMS_MASTER, VESSEL_CERTIFICATES, SURVEY_CERTIFICATES];

pub const DEFAULT_TABLES: [&str; 3] = ["FORMS_MASTER", "VESSEL_CERTIFICATES", "SurveyCertificates"];

// The single ordered list of tables in play. Both the identifier codec and
// the repository read from here.
#[derive(Debug, Clone)]
pub struct TableRegistry {
    schemas: Vec<TableSchema>,
    codec: IdCodec,
}

impl TableRegistry {
    pub fn from_config<S: AsRef<str>>(tables: &[S]) -> Self {
        let mut schemas = Vec::new();
        for requested in tables {
            let requested = requested.as_ref().trim();
            if requested.is_empty() {
                continue;
            }
            match BUILTIN_SCHEMAS.iter().find(|schema| schema.table == requested) {
                Some(schema) if schemas.iter().any(|known: &TableSchema| known.table == schema.table) => {
                    warn!(table = requested, "table listed twice, keeping first occurrence");
                }
                Some(schema) => schemas.push(schema.clone()),
                None => warn!(table = requested, "unknown table schema, skipping"),
            }
        }
        Self::from_schemas(schemas)
    }

    pub fn from_schemas(schemas: Vec<TableSchema>) -> Self {
        let names = schemas
            .iter()
            .map(|schema| schema.table.to_string())
            .collect::<Vec<_>>();
        let codec = IdCodec::new(names);
        for (shadowing, shadowed) in codec.ambiguous_pairs() {
            warn!(
                table = %shadowing,
                shadowed = %shadowed,
                "table name is a prefix of another table; identifiers resolve to the earlier table"
            );
        }
        Self { schemas, codec }
    }

    pub fn builtin() -> Self {
        Self::from_config(&DEFAULT_TABLES)
    }

    pub fn schemas(&self) -> &[TableSchema] {
        &self.schemas
    }

    pub fn get(&self, table: &str) -> Option<&TableSchema> {
        self.schemas.iter().find(|schema| schema.table == table)
    }

    pub fn codec(&self) -> &IdCodec {
        &self.codec
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
