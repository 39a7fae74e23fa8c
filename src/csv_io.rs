//! CSV export and import of contacts.
//!
//! Columns are fixed and matched by label on import, so a file exported here
//! re-imports losslessly and hand-made files may carry extra columns or omit
//! some.

use anyhow::{Context, Result};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::contact::{normalize_links, Contact, ContactDraft};

const SOCIAL_SEPARATOR: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    FirstName,
    LastName,
    Email,
    Phone,
    Company,
    JobTitle,
    Address,
    SocialMedia,
    Notes,
    Starred,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::FirstName,
        Column::LastName,
        Column::Email,
        Column::Phone,
        Column::Company,
        Column::JobTitle,
        Column::Address,
        Column::SocialMedia,
        Column::Notes,
        Column::Starred,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Column::FirstName => "First Name",
            Column::LastName => "Last Name",
            Column::Email => "Email",
            Column::Phone => "Phone",
            Column::Company => "Company",
            Column::JobTitle => "Job Title",
            Column::Address => "Address",
            Column::SocialMedia => "Social Media Links",
            Column::Notes => "Notes",
            Column::Starred => "Starred",
        }
    }

    fn from_header(header: &str) -> Option<Self> {
        let clean = header.trim().to_lowercase();
        Column::ALL
            .into_iter()
            .find(|column| column.label().to_lowercase() == clean)
    }

    fn cell(self, contact: &Contact) -> String {
        match self {
            Column::FirstName => contact.first_name.clone(),
            Column::LastName => contact.last_name.clone(),
            Column::Email => contact.email.clone(),
            Column::Phone => contact.phone.clone(),
            Column::Company => contact.company.clone(),
            Column::JobTitle => contact.job_title.clone(),
            Column::Address => contact.address.clone(),
            Column::SocialMedia => contact.social_media.join(SOCIAL_SEPARATOR),
            Column::Notes => contact.notes.clone(),
            Column::Starred => contact.starred.to_string(),
        }
    }

    fn assign(self, draft: &mut ContactDraft, value: &str) {
        let text = Some(value.to_string());
        match self {
            Column::FirstName => draft.first_name = text,
            Column::LastName => draft.last_name = text,
            Column::Email => draft.email = text,
            Column::Phone => draft.phone = text,
            Column::Company => draft.company = text,
            Column::JobTitle => draft.job_title = text,
            Column::Address => draft.address = text,
            Column::SocialMedia => {
                draft.social_media = Some(normalize_links(value.split(SOCIAL_SEPARATOR)));
            }
            Column::Notes => draft.notes = text,
            Column::Starred => draft.starred = Some(value.eq_ignore_ascii_case("true")),
        }
    }
}

/// Header plus one row per contact, `\n`-separated, no trailing newline.
/// Cells holding a comma, quote or newline are quoted with quotes doubled.
pub fn encode(contacts: &[Contact]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(Column::ALL.iter().map(|column| column.label()))
        .context("failed to write CSV header")?;
    for contact in contacts {
        let row: Vec<String> = Column::ALL.iter().map(|column| column.cell(contact)).collect();
        writer
            .write_record(&row)
            .with_context(|| format!("failed to write CSV row for contact {}", contact.id))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush CSV output: {}", err.error()))?;
    let mut text = String::from_utf8(bytes).context("CSV output is not valid UTF-8")?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

pub fn export_file_name(date: Date) -> String {
    let format = format_description!("[year]-[month]-[day]");
    let stamp = date
        .format(&format)
        .unwrap_or_else(|_| date.to_string());
    format!("contacts_export_{}.csv", stamp)
}

pub fn export_file_name_today() -> String {
    export_file_name(OffsetDateTime::now_utc().date())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: u64,
    pub message: String,
}

/// Decoded rows plus the rows that could not be read. Never fails outright.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedCsv {
    pub drafts: Vec<ContactDraft>,
    pub errors: Vec<RowError>,
}

pub fn decode(text: &str) -> DecodedCsv {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut decoded = DecodedCsv::default();
    let mut columns: Option<Vec<Option<Column>>> = None;

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                let line = err.position().map(|pos| pos.line()).unwrap_or(0);
                tracing::warn!(line, error = %err, "skipping unreadable CSV row");
                decoded.errors.push(RowError {
                    line,
                    message: err.to_string(),
                });
                if err.is_io_error() {
                    break;
                }
                continue;
            }
        };

        if is_blank_record(&record) {
            continue;
        }

        match &columns {
            None => {
                columns = Some(record.iter().map(Column::from_header).collect());
            }
            Some(mapping) => {
                let line = record.position().map(|pos| pos.line()).unwrap_or(0);
                let cells = rejoin_stray_quotes(&record, mapping.len());
                if cells.len() > mapping.len() {
                    tracing::warn!(line, fields = cells.len(), "skipping CSV row with surplus fields");
                    decoded.errors.push(RowError {
                        line,
                        message: format!(
                            "row has {} fields but the header has {}",
                            cells.len(),
                            mapping.len()
                        ),
                    });
                    continue;
                }
                if let Some(draft) = decode_row(mapping, &cells) {
                    decoded.drafts.push(draft);
                }
            }
        }
    }

    decoded
}

fn is_blank_record(record: &StringRecord) -> bool {
    record.iter().all(|cell| cell.trim().is_empty())
}

/// A quote inside an unquoted cell toggles quoting, so the separators it
/// covers belong to the cell. The reader splits such cells apart; when the
/// row came out wider than the header, glue them back and drop the quotes.
fn rejoin_stray_quotes(record: &StringRecord, width: usize) -> Vec<String> {
    let cells: Vec<String> = record.iter().map(str::to_string).collect();
    if cells.len() <= width {
        return cells;
    }

    let mut joined = Vec::with_capacity(cells.len());
    let mut open: Option<String> = None;
    for cell in cells {
        let quotes = cell.matches('"').count();
        open = match open.take() {
            Some(mut buffer) => {
                buffer.push(',');
                buffer.push_str(&cell);
                if quotes % 2 == 1 {
                    joined.push(strip_toggle_quotes(&buffer));
                    None
                } else {
                    Some(buffer)
                }
            }
            None if quotes % 2 == 1 => Some(cell),
            None => {
                joined.push(cell);
                None
            }
        };
    }
    // Unbalanced to the end of the row: keep what was read.
    if let Some(buffer) = open {
        joined.push(buffer);
    }
    joined
}

/// `"` toggles quoted mode; `""` inside quotes is one literal quote.
fn strip_toggle_quotes(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    let mut quoted = false;
    let mut chars = cell.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '"' {
            out.push(c);
        } else if quoted && chars.peek() == Some(&'"') {
            out.push('"');
            chars.next();
        } else {
            quoted = !quoted;
        }
    }
    out
}

/// `None` when every mapped cell is empty.
fn decode_row(mapping: &[Option<Column>], cells: &[String]) -> Option<ContactDraft> {
    let mut draft = ContactDraft::default();
    let mut has_data = false;
    for (cell, column) in cells.iter().zip(mapping) {
        let Some(column) = column else {
            continue;
        };
        let value = cell.trim();
        column.assign(&mut draft, value);
        has_data |= !value.is_empty();
    }
    has_data.then_some(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::sample;
    use time::macros::date;

    fn full_contact() -> Contact {
        let mut contact = sample("1", "Maria", "Santos", "0917-123-4567", 1);
        contact.email = "maria@example.com".into();
        contact.company = "Globe".into();
        contact.job_title = "Engineer".into();
        contact.address = "Makati City".into();
        contact.social_media = vec!["https://x.com/maria".into(), "https://github.com/maria".into()];
        contact.notes = "Met at conference".into();
        contact.starred = true;
        contact
    }

    fn assert_fields_match(draft: &ContactDraft, contact: &Contact) {
        assert_eq!(draft.first_name.as_deref(), Some(contact.first_name.as_str()));
        assert_eq!(draft.last_name.as_deref(), Some(contact.last_name.as_str()));
        assert_eq!(draft.email.as_deref(), Some(contact.email.as_str()));
        assert_eq!(draft.phone.as_deref(), Some(contact.phone.as_str()));
        assert_eq!(draft.company.as_deref(), Some(contact.company.as_str()));
        assert_eq!(draft.job_title.as_deref(), Some(contact.job_title.as_str()));
        assert_eq!(draft.address.as_deref(), Some(contact.address.as_str()));
        assert_eq!(draft.social_media.as_ref(), Some(&contact.social_media));
        assert_eq!(draft.notes.as_deref(), Some(contact.notes.as_str()));
        assert_eq!(draft.starred, Some(contact.starred));
    }

    #[test]
    fn encode_writes_header_and_plain_rows() {
        let text = encode(&[full_contact()]).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("First Name,Last Name,Email,Phone,Company,Job Title,Address,Social Media Links,Notes,Starred")
        );
        assert_eq!(
            lines.next(),
            Some("Maria,Santos,maria@example.com,0917-123-4567,Globe,Engineer,Makati City,https://x.com/maria|https://github.com/maria,Met at conference,true")
        );
        assert_eq!(lines.next(), None);
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn encode_quotes_cells_with_commas_and_quotes() {
        let mut contact = full_contact();
        contact.notes = r#"Likes "tea", not coffee"#.into();
        let text = encode(&[contact]).unwrap();
        assert!(text.ends_with(r#","Likes ""tea"", not coffee",true"#));
    }

    #[test]
    fn round_trip_preserves_mapped_fields() {
        let plain = full_contact();
        let mut tricky = sample("2", "Jose", "Rizal", "0918-000-0000", 2);
        tricky.notes = r#"Calls at 9, says "hi""#.into();

        let decoded = decode(&encode(&[plain.clone(), tricky.clone()]).unwrap());
        assert!(decoded.errors.is_empty());
        assert_eq!(decoded.drafts.len(), 2);
        assert_fields_match(&decoded.drafts[0], &plain);
        assert_fields_match(&decoded.drafts[1], &tricky);
    }

    #[test]
    fn decode_matches_headers_loosely_and_ignores_unknown_columns() {
        let text = "  PHONE ,first name,Favourite Colour,starred\n09171234567,Ana,blue,TRUE\n";
        let decoded = decode(text);
        assert_eq!(decoded.drafts.len(), 1);
        let draft = &decoded.drafts[0];
        assert_eq!(draft.first_name.as_deref(), Some("Ana"));
        assert_eq!(draft.phone.as_deref(), Some("09171234567"));
        assert_eq!(draft.starred, Some(true));
        assert_eq!(draft.email, None);
    }

    #[test]
    fn decode_splits_social_links_and_drops_empties() {
        let text = "First Name,Social Media Links\nAna, a | |b |\n";
        let decoded = decode(text);
        assert_eq!(
            decoded.drafts[0].social_media,
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn decode_drops_rows_with_no_mapped_data() {
        let text = "First Name,Phone,Extra\n\n,,ignored\n  ,  ,\nBea,0917,\n";
        let decoded = decode(text);
        assert_eq!(decoded.drafts.len(), 1);
        assert_eq!(decoded.drafts[0].first_name.as_deref(), Some("Bea"));
    }

    #[test]
    fn header_only_or_empty_input_yields_nothing() {
        assert!(decode("").drafts.is_empty());
        assert!(decode("\n\n").drafts.is_empty());
        assert!(decode("First Name,Phone\n").drafts.is_empty());
    }

    #[test]
    fn quote_inside_a_cell_keeps_its_comma() {
        let text = "First Name,Phone,Notes\nAna,09171234567,say \"hi, there\" ok\n";
        let decoded = decode(text);
        assert!(decoded.errors.is_empty());
        assert_eq!(decoded.drafts.len(), 1);
        assert_eq!(decoded.drafts[0].notes.as_deref(), Some("say hi, there ok"));
        assert_eq!(decoded.drafts[0].phone.as_deref(), Some("09171234567"));
    }

    #[test]
    fn row_wider_than_header_is_reported_and_skipped() {
        let text = "First Name,Phone\nAna,0917,extra,more\nCid,09181234567\n";
        let decoded = decode(text);

        assert_eq!(
            decoded.errors,
            vec![RowError {
                line: 2,
                message: "row has 4 fields but the header has 2".into(),
            }]
        );
        assert_eq!(decoded.drafts.len(), 1);
        assert_eq!(decoded.drafts[0].first_name.as_deref(), Some("Cid"));
    }

    #[test]
    fn short_rows_leave_missing_columns_unset() {
        let text = "First Name,Phone,Email\nCid\n";
        let decoded = decode(text);
        assert!(decoded.errors.is_empty());
        assert_eq!(decoded.drafts.len(), 1);
        assert_eq!(decoded.drafts[0].first_name.as_deref(), Some("Cid"));
        assert_eq!(decoded.drafts[0].phone, None);
    }

    #[test]
    fn export_name_uses_iso_date() {
        assert_eq!(
            export_file_name(date!(2024 - 03 - 09)),
            "contacts_export_2024-03-09.csv"
        );
    }
}
