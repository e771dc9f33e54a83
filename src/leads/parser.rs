//! CSV lead ingestion.
//!
//! Real-world lead exports disagree on column names, so headers are
//! normalized against a variant table before validation. Rows that fail
//! validation are skipped with a warning; a bad row never aborts the file.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::error::ParseError;
use crate::leads::model::{Lead, LeadSource};

/// Accepted header variants for each canonical field.
const FIELD_MAPPINGS: &[(&str, &[&str])] = &[
    ("first_name", &["first_name", "firstname", "fname", "first"]),
    ("last_name", &["last_name", "lastname", "lname", "last"]),
    ("email", &["email", "email_address", "emailaddress"]),
    ("company_name", &["company_name", "company", "organization", "org"]),
    ("job_title", &["job_title", "title", "position", "role"]),
    ("industry", &["industry", "sector"]),
    ("company_size", &["company_size", "size", "employees", "employee_count"]),
    ("phone", &["phone", "phone_number", "phonenumber", "telephone"]),
    ("website", &["website", "web", "url", "site"]),
    ("slack_id", &["slack_id", "slack", "slack_channel"]),
    ("pain_points", &["pain_points", "painpoints", "challenges", "problems"]),
    ("interests", &["interests", "topics", "focus_areas"]),
    ("notes", &["notes", "comments", "additional_info"]),
];

/// CSV lead parser.
pub struct CsvLeadParser;

impl CsvLeadParser {
    /// Parse a CSV file into leads, skipping invalid rows.
    pub fn parse_file(path: &Path) -> Result<Vec<Lead>, ParseError> {
        let file = std::fs::File::open(path).map_err(|e| ParseError::Source {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(file)
    }

    /// Parse CSV from any reader into leads, skipping invalid rows.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<Lead>, ParseError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let mut leads = Vec::new();
        for (row_index, record) in csv_reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(row = row_index + 1, "Skipping malformed CSV row: {e}");
                    continue;
                }
            };

            let raw: BTreeMap<String, String> = headers
                .iter()
                .zip(record.iter())
                .filter(|(_, value)| !value.is_empty())
                .map(|(header, value)| (header.clone(), value.to_string()))
                .collect();

            match lead_from_row(&raw) {
                Some(lead) => leads.push(lead),
                None => {
                    tracing::warn!(row = row_index + 1, "Skipping invalid lead row");
                }
            }
        }

        tracing::info!(count = leads.len(), "Parsed leads from CSV");
        Ok(leads)
    }
}

/// Map a raw row onto canonical fields, then validate and build a Lead.
fn lead_from_row(raw: &BTreeMap<String, String>) -> Option<Lead> {
    let mut standardized: BTreeMap<&str, String> = BTreeMap::new();
    for (canonical, variants) in FIELD_MAPPINGS.iter() {
        for variant in variants.iter() {
            if let Some(value) = raw.get(*variant) {
                standardized.insert(*canonical, value.clone());
                break;
            }
        }
    }

    if !validate(&standardized) {
        return None;
    }

    let mut lead = Lead::new(
        &standardized["first_name"],
        &standardized["last_name"],
        &standardized["email"],
        &standardized["company_name"],
    );
    lead.source = LeadSource::Csv;
    lead.job_title = standardized.get("job_title").cloned();
    lead.industry = standardized.get("industry").cloned();
    lead.company_size = standardized.get("company_size").cloned();
    lead.phone = standardized.get("phone").cloned();
    lead.website = standardized.get("website").cloned();
    lead.slack_id = standardized.get("slack_id").cloned();
    lead.pain_points = split_list(standardized.get("pain_points"));
    lead.interests = split_list(standardized.get("interests"));
    lead.notes = standardized.get("notes").cloned().unwrap_or_default();

    // Unmapped non-empty columns become custom attributes.
    for (key, value) in raw {
        let is_standard = FIELD_MAPPINGS
            .iter()
            .any(|(_, variants)| variants.contains(&key.as_str()));
        if !is_standard {
            lead.custom_attributes.insert(key.clone(), value.clone());
        }
    }

    Some(lead)
}

fn validate(fields: &BTreeMap<&str, String>) -> bool {
    for required in ["first_name", "last_name", "email", "company_name"] {
        match fields.get(required) {
            Some(value) if !value.is_empty() => {}
            _ => {
                tracing::warn!(field = required, "Missing required lead field");
                return false;
            }
        }
    }

    let email = &fields["email"];
    if !email.contains('@') || !email.contains('.') {
        tracing::warn!(%email, "Invalid email format");
        return false;
    }

    true
}

fn split_list(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_str(input: &str) -> Vec<Lead> {
        CsvLeadParser::parse(Cursor::new(input.to_string())).unwrap()
    }

    #[test]
    fn parses_canonical_headers() {
        let leads = parse_str(
            "first_name,last_name,email,company_name,industry\n\
             Grace,Hopper,grace@navy.mil,US Navy,Defense\n",
        );
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].full_name(), "Grace Hopper");
        assert_eq!(leads[0].industry.as_deref(), Some("Defense"));
        assert_eq!(leads[0].source, LeadSource::Csv);
    }

    #[test]
    fn maps_header_variants() {
        let leads = parse_str(
            "fname,lname,email_address,organization,position\n\
             Alan,Turing,alan@bletchley.uk,GCHQ,Researcher\n",
        );
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].first_name, "Alan");
        assert_eq!(leads[0].company_name, "GCHQ");
        assert_eq!(leads[0].job_title.as_deref(), Some("Researcher"));
    }

    #[test]
    fn skips_row_missing_required_field() {
        let leads = parse_str(
            "first_name,last_name,email,company_name\n\
             ,Turing,alan@bletchley.uk,GCHQ\n\
             Grace,Hopper,grace@navy.mil,US Navy\n",
        );
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].first_name, "Grace");
    }

    #[test]
    fn skips_malformed_email() {
        let leads = parse_str(
            "first_name,last_name,email,company_name\n\
             Alan,Turing,not-an-email,GCHQ\n",
        );
        assert!(leads.is_empty());
    }

    #[test]
    fn splits_comma_separated_lists() {
        let leads = parse_str(
            "first_name,last_name,email,company_name,pain_points\n\
             Ada,Lovelace,ada@engines.dev,Engines,\"data quality, reporting\"\n",
        );
        assert_eq!(
            leads[0].pain_points,
            vec!["data quality".to_string(), "reporting".to_string()]
        );
    }

    #[test]
    fn unmapped_columns_become_custom_attributes() {
        let leads = parse_str(
            "first_name,last_name,email,company_name,favorite_color\n\
             Ada,Lovelace,ada@engines.dev,Engines,green\n",
        );
        assert_eq!(
            leads[0].custom_attributes.get("favorite_color").map(String::as_str),
            Some("green")
        );
    }

    #[test]
    fn parses_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"first_name,last_name,email,company_name\nGrace,Hopper,grace@navy.mil,US Navy\n",
        )
        .unwrap();
        let leads = CsvLeadParser::parse_file(file.path()).unwrap();
        assert_eq!(leads.len(), 1);
    }
}
