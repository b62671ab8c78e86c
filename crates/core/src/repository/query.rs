use crate::schema::{ColumnKind, TableSchema};

pub const LIVENESS_PROBE: &str = "SELECT 1";
pub const VERSION_QUERY: &str = "SELECT @@VERSION";

// Brackets an identifier, doubling any closing bracket inside it.
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

fn as_text(column: &str, alias: &str) -> String {
    format!(
        "CAST({} AS NVARCHAR(4000)) AS {}",
        quote_identifier(column),
        quote_identifier(alias)
    )
}

fn as_iso_date(column: &str, alias: &str) -> String {
    format!(
        "CONVERT(NVARCHAR(33), {}, 126) AS {}",
        quote_identifier(column),
        quote_identifier(alias)
    )
}

fn projection(schema: &TableSchema) -> String {
    let columns = &schema.columns;
    let mut fields = vec![
        as_text(columns.id, "id"),
        as_text(columns.name, "name"),
        as_text(columns.title, "title"),
        as_text(columns.mime_type, "mime_type"),
        as_iso_date(columns.last_update, "modified_time"),
        format!(
            "CAST(DATALENGTH({}) AS BIGINT) AS [size]",
            quote_identifier(columns.content)
        ),
    ];

    if let Some(reference) = schema.reference_column {
        fields.push(as_text(reference, "form_no"));
    }

    for extra in schema.extra_columns {
        fields.push(match extra.kind {
            ColumnKind::Text => as_text(extra.column, extra.key),
            ColumnKind::Date => as_iso_date(extra.column, extra.key),
        });
    }

    fields.join(", ")
}

fn active_filter(schema: &TableSchema) -> Option<String> {
    schema
        .active_column
        .map(|column| format!("{} = 1", quote_identifier(column)))
}

fn where_clause(conditions: Vec<String>) -> String {
    format!("WHERE {}", conditions.join(" AND "))
}

pub fn list_documents(schema: &TableSchema) -> String {
    let columns = &schema.columns;
    let mut conditions: Vec<String> = active_filter(schema).into_iter().collect();
    conditions.push(format!("{} IS NOT NULL", quote_identifier(columns.content)));
    conditions.push(format!("{} IS NOT NULL", quote_identifier(columns.name)));

    format!(
        "SELECT {} FROM {} {} ORDER BY {} DESC",
        projection(schema),
        quote_identifier(schema.table),
        where_clause(conditions),
        quote_identifier(columns.last_update)
    )
}

pub fn document_metadata(schema: &TableSchema) -> String {
    let mut conditions = vec![format!("{} = @P1", quote_identifier(schema.columns.id))];
    conditions.extend(active_filter(schema));

    format!(
        "SELECT {} FROM {} {}",
        projection(schema),
        quote_identifier(schema.table),
        where_clause(conditions)
    )
}

pub fn document_content(schema: &TableSchema) -> String {
    let columns = &schema.columns;
    let mut conditions = vec![format!("{} = @P1", quote_identifier(columns.id))];
    conditions.extend(active_filter(schema));
    conditions.push(format!("{} IS NOT NULL", quote_identifier(columns.content)));

    format!(
        "SELECT {} FROM {} {}",
        quote_identifier(columns.content),
        quote_identifier(schema.table),
        where_clause(conditions)
    )
}
