/// CSV bulk import
///
/// A file is processed in two phases. [`parse_csv`] reads the header row,
/// matches it against the entity's columns (case, spaces, and underscores
/// are ignored, so `First Name`, `first_name`, and `firstName` all match),
/// and turns every data row into either a validated create request or a
/// list of [`RowError`]s. [`import_csv`] then inserts the valid rows one by
/// one, owned by the importing user; a row whose insert fails (for example
/// a duplicate SKU) is reported like a validation failure.
///
/// Unknown columns are ignored. A missing required column fails the whole
/// file before anything is inserted.

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::models::account::{Account, CreateAccount};
use crate::models::contact::{Contact, CreateContact};
use crate::models::lead::{CreateLead, Lead, LeadStatus};
use crate::models::product::{CreateProduct, Product};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Unsupported import entity: {0}")]
    UnknownEntity(String),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportEntity {
    Accounts,
    Contacts,
    Leads,
    Products,
}

impl ImportEntity {
    pub fn parse(s: &str) -> Result<Self, ImportError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accounts" => Ok(ImportEntity::Accounts),
            "contacts" => Ok(ImportEntity::Contacts),
            "leads" => Ok(ImportEntity::Leads),
            "products" => Ok(ImportEntity::Products),
            other => Err(ImportError::UnknownEntity(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportEntity::Accounts => "accounts",
            ImportEntity::Contacts => "contacts",
            ImportEntity::Leads => "leads",
            ImportEntity::Products => "products",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            ImportEntity::Accounts => &[
                "name",
                "industry",
                "account_type",
                "website",
                "phone",
                "email",
                "address",
                "city",
                "country",
                "annual_revenue",
                "employee_count",
                "description",
            ],
            ImportEntity::Contacts => &[
                "first_name",
                "last_name",
                "email",
                "phone",
                "mobile",
                "job_title",
                "department",
                "notes",
            ],
            ImportEntity::Leads => &[
                "first_name",
                "last_name",
                "company",
                "email",
                "phone",
                "source",
                "status",
                "estimated_value",
                "notes",
            ],
            ImportEntity::Products => &[
                "name",
                "sku",
                "description",
                "category",
                "unit_price",
                "tax_rate",
                "is_active",
            ],
        }
    }

    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            ImportEntity::Accounts => &["name"],
            ImportEntity::Contacts | ImportEntity::Leads => &["first_name"],
            ImportEntity::Products => &["name", "sku", "unit_price"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    /// 1-based data row, header excluded
    pub row: usize,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total_rows: usize,
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone)]
pub enum ImportRow {
    Account(CreateAccount),
    Contact(CreateContact),
    Lead(CreateLead),
    Product(CreateProduct),
}

/// Result of the parse phase
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub total_rows: usize,
    /// `(row number, request)` for rows that passed validation
    pub rows: Vec<(usize, ImportRow)>,
    pub errors: Vec<RowError>,
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Header row of the import template
pub fn template(entity: ImportEntity) -> Result<Vec<u8>, ImportError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(entity.columns())?;
    writer
        .into_inner()
        .map_err(|e| ImportError::Csv(e.into_error().into()))
}

struct RowReader<'a> {
    row: usize,
    columns: &'a HashMap<&'static str, usize>,
    record: &'a StringRecord,
    errors: Vec<RowError>,
}

impl<'a> RowReader<'a> {
    fn text(&self, column: &str) -> Option<String> {
        self.columns
            .get(column)
            .and_then(|&i| self.record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(RowError {
            row: self.row,
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn number<T: FromStr>(&mut self, column: &str) -> Option<T> {
        let raw = self.text(column)?;
        match raw.replace(',', "").parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.error(column, format!("'{}' is not a valid number", raw));
                None
            }
        }
    }

    fn flag(&mut self, column: &str) -> Option<bool> {
        let raw = self.text(column)?;
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => {
                self.error(column, format!("'{}' is not a valid boolean", raw));
                None
            }
        }
    }

    fn lead_status(&mut self, column: &str) -> Option<LeadStatus> {
        let raw = self.text(column)?;
        match LeadStatus::parse(&raw) {
            Some(LeadStatus::Converted) | None => {
                self.error(
                    column,
                    format!("'{}' must be one of new, contacted, qualified, unqualified", raw),
                );
                None
            }
            status => status,
        }
    }

    fn validated<T: Validate>(mut self, data: T) -> Result<T, Vec<RowError>> {
        if let Err(errors) = data.validate() {
            let row = self.row;
            self.errors.extend(validation_row_errors(row, &errors));
        }

        if self.errors.is_empty() {
            Ok(data)
        } else {
            Err(self.errors)
        }
    }
}

fn validation_row_errors(row: usize, errors: &ValidationErrors) -> Vec<RowError> {
    let mut out: Vec<RowError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = field.to_string();
            errs.iter().map(move |e| RowError {
                row,
                field: field.clone(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field)),
            })
        })
        .collect();
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

fn parse_row(entity: ImportEntity, mut reader: RowReader<'_>) -> Result<ImportRow, Vec<RowError>> {
    match entity {
        ImportEntity::Accounts => {
            let data = CreateAccount {
                name: reader.text("name").unwrap_or_default(),
                industry: reader.text("industry"),
                account_type: reader.text("account_type"),
                website: reader.text("website"),
                phone: reader.text("phone"),
                email: reader.text("email"),
                address: reader.text("address"),
                city: reader.text("city"),
                country: reader.text("country"),
                annual_revenue: reader.number("annual_revenue"),
                employee_count: reader.number("employee_count"),
                description: reader.text("description"),
                owner_id: None,
            };
            reader.validated(data).map(ImportRow::Account)
        }
        ImportEntity::Contacts => {
            let data = CreateContact {
                account_id: None,
                first_name: reader.text("first_name").unwrap_or_default(),
                last_name: reader.text("last_name"),
                email: reader.text("email"),
                phone: reader.text("phone"),
                mobile: reader.text("mobile"),
                job_title: reader.text("job_title"),
                department: reader.text("department"),
                notes: reader.text("notes"),
                owner_id: None,
            };
            reader.validated(data).map(ImportRow::Contact)
        }
        ImportEntity::Leads => {
            let data = CreateLead {
                first_name: reader.text("first_name").unwrap_or_default(),
                last_name: reader.text("last_name"),
                company: reader.text("company"),
                email: reader.text("email"),
                phone: reader.text("phone"),
                source: reader.text("source"),
                status: reader.lead_status("status"),
                estimated_value: reader.number("estimated_value"),
                notes: reader.text("notes"),
                assigned_to: None,
            };
            reader.validated(data).map(ImportRow::Lead)
        }
        ImportEntity::Products => {
            let unit_price = match reader.text("unit_price") {
                Some(_) => reader.number("unit_price").unwrap_or_default(),
                None => {
                    reader.error("unit_price", "Unit price is required");
                    0.0
                }
            };
            let data = CreateProduct {
                name: reader.text("name").unwrap_or_default(),
                sku: reader.text("sku").unwrap_or_default(),
                description: reader.text("description"),
                category: reader.text("category"),
                unit_price,
                tax_rate: reader.number("tax_rate"),
                is_active: reader.flag("is_active"),
            };
            reader.validated(data).map(ImportRow::Product)
        }
    }
}

/// Parses and validates an uploaded file without touching the database
pub fn parse_csv(entity: ImportEntity, data: &[u8]) -> Result<ParsedFile, ImportError> {
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ImportError::EmptyFile);
    }

    // Strip a UTF-8 byte order mark left by spreadsheet exports
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let mut columns: HashMap<&'static str, usize> = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        let normalized = normalize_header(header);
        if let Some(column) = entity
            .columns()
            .iter()
            .find(|c| normalize_header(c) == normalized)
        {
            columns.entry(column).or_insert(index);
        }
    }

    let missing: Vec<&'static str> = entity
        .required_columns()
        .iter()
        .copied()
        .filter(|c| !columns.contains_key(c))
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    let mut parsed = ParsedFile::default();
    for (i, record) in reader.records().enumerate() {
        let row = i + 1;
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        parsed.total_rows += 1;

        let row_reader = RowReader {
            row,
            columns: &columns,
            record: &record,
            errors: Vec::new(),
        };
        match parse_row(entity, row_reader) {
            Ok(request) => parsed.rows.push((row, request)),
            Err(errors) => parsed.errors.extend(errors),
        }
    }

    Ok(parsed)
}

async fn insert_row(pool: &PgPool, tenant_id: Uuid, owner_id: Uuid, row: ImportRow) -> Result<(), sqlx::Error> {
    match row {
        ImportRow::Account(data) => Account::create(pool, tenant_id, owner_id, data).await.map(|_| ()),
        ImportRow::Contact(data) => Contact::create(pool, tenant_id, owner_id, data).await.map(|_| ()),
        ImportRow::Lead(data) => Lead::create(pool, tenant_id, owner_id, data).await.map(|_| ()),
        ImportRow::Product(data) => Product::create(pool, tenant_id, data).await.map(|_| ()),
    }
}

fn insert_error_message(entity: ImportEntity, error: &sqlx::Error) -> (String, String) {
    match error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            let field = match entity {
                ImportEntity::Products => "sku",
                _ => "row",
            };
            (field.to_string(), "Duplicate record".to_string())
        }
        sqlx::Error::Database(db) => ("row".to_string(), db.message().to_string()),
        other => ("row".to_string(), other.to_string()),
    }
}

/// Parses, validates, and inserts every valid row of `data`
pub async fn import_csv(
    pool: &PgPool,
    tenant_id: Uuid,
    owner_id: Uuid,
    entity: ImportEntity,
    data: &[u8],
) -> Result<ImportReport, ImportError> {
    let parsed = parse_csv(entity, data)?;
    let mut errors = parsed.errors;
    let mut imported = 0;

    for (row, request) in parsed.rows {
        match insert_row(pool, tenant_id, owner_id, request).await {
            Ok(()) => imported += 1,
            Err(e @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_))) => {
                return Err(ImportError::Database(e));
            }
            Err(e) => {
                let (field, message) = insert_error_message(entity, &e);
                tracing::debug!(row, entity = entity.as_str(), error = %e, "Import row rejected");
                errors.push(RowError { row, field, message });
            }
        }
    }

    errors.sort_by_key(|e| e.row);
    let failed = parsed.total_rows - imported;

    Ok(ImportReport {
        total_rows: parsed.total_rows,
        imported,
        failed,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_parse() {
        assert_eq!(ImportEntity::parse("Leads").unwrap(), ImportEntity::Leads);
        assert!(matches!(
            ImportEntity::parse("deals"),
            Err(ImportError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_template_is_header_row() {
        let bytes = template(ImportEntity::Products).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "name,sku,description,category,unit_price,tax_rate,is_active\n"
        );
    }

    #[test]
    fn test_headers_match_loosely() {
        let csv = "First Name,LAST_NAME,email,Favourite Colour\nAda,Lovelace,ada@example.com,green\n";
        let parsed = parse_csv(ImportEntity::Contacts, csv.as_bytes()).unwrap();

        assert_eq!(parsed.total_rows, 1);
        assert!(parsed.errors.is_empty());
        match &parsed.rows[0].1 {
            ImportRow::Contact(c) => {
                assert_eq!(c.first_name, "Ada");
                assert_eq!(c.last_name.as_deref(), Some("Lovelace"));
            }
            other => panic!("unexpected row: {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_column_fails_file() {
        let csv = "name,description\nWidget,Blue\n";
        match parse_csv(ImportEntity::Products, csv.as_bytes()) {
            Err(ImportError::MissingColumns(cols)) => assert_eq!(cols, vec!["sku", "unit_price"]),
            other => panic!("expected missing columns, got {:?}", other.map(|p| p.total_rows)),
        }
    }

    #[test]
    fn test_row_errors_are_reported_per_row() {
        let csv = "name,sku,unit_price,is_active\n\
                   Widget,W-1,9.99,yes\n\
                   ,W-2,abc,maybe\n\
                   Gadget,G-1,\"1,000.50\",no\n";
        let parsed = parse_csv(ImportEntity::Products, csv.as_bytes()).unwrap();

        assert_eq!(parsed.total_rows, 3);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].0, 1);
        match &parsed.rows[1].1 {
            ImportRow::Product(p) => assert_eq!(p.unit_price, 1000.5),
            other => panic!("unexpected row: {:?}", other),
        }

        let fields: Vec<&str> = parsed.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(parsed.errors.iter().all(|e| e.row == 2));
        assert!(fields.contains(&"unit_price"));
        assert!(fields.contains(&"is_active"));
        assert!(fields.contains(&"name"));
    }

    #[test]
    fn test_lead_status_and_email_validation() {
        let csv = "first_name,email,status,estimated_value\n\
                   Ada,not-an-email,qualified,100\n\
                   Grace,grace@example.com,converted,\n\
                   Linus,linus@example.com,Contacted,2500\n";
        let parsed = parse_csv(ImportEntity::Leads, csv.as_bytes()).unwrap();

        assert_eq!(parsed.total_rows, 3);
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!((parsed.errors[0].row, parsed.errors[0].field.as_str()), (1, "email"));
        assert_eq!((parsed.errors[1].row, parsed.errors[1].field.as_str()), (2, "status"));

        match &parsed.rows[0].1 {
            ImportRow::Lead(lead) => {
                assert_eq!(lead.status, Some(LeadStatus::Contacted));
                assert_eq!(lead.estimated_value, Some(2500.0));
            }
            other => panic!("unexpected row: {:?}", other),
        }
    }

    #[test]
    fn test_blank_lines_and_bom_are_skipped() {
        let csv = "\u{feff}name\nAcme\n,\nGlobex\n";
        let parsed = parse_csv(ImportEntity::Accounts, csv.as_bytes()).unwrap();
        assert_eq!(parsed.total_rows, 2);
        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(
            parse_csv(ImportEntity::Accounts, b"  \n"),
            Err(ImportError::EmptyFile)
        ));
    }
}
