use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::record::{ReaderType, RequestRecord};
use crate::error::ValidationError;

/// Date layouts accepted from callers, tried in order.
const DATE_FORMATS: [&str; 3] = ["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y"];

/// Wire envelope: submissions arrive as `{ "message": { ... } }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitEnvelope {
    pub message: SubmitRequest,
}

/// An inbound request submission, still in the caller's string encodings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitRequest {
    pub collection_code: String,
    pub shelfmark: String,
    pub volume_number: String,
    pub storage_location_code: String,
    pub author: String,
    pub title: String,
    pub publication_date: String,
    pub periodical_date: String,
    pub article_line1: String,
    pub article_line2: String,
    pub catalogue_record_url: String,
    pub further_details_url: String,
    #[serde(rename = "dtRequired", alias = "dateRequired")]
    pub date_required: String,
    pub route: String,
    pub reading_room_staff_area: String,
    pub seat_number: String,
    pub reading_category: String,
    pub identifier: String,
    pub reader_name: String,
    pub reader_type: String,
    pub operator_information: String,
    pub item_identity: String,
}

/// A submission whose typed fields have all parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedRequest {
    request: SubmitRequest,
    publication_date: Option<NaiveDate>,
    periodical_date: Option<NaiveDate>,
    reading_room_staff_area: bool,
    reader_type: ReaderType,
}

impl SubmitRequest {
    /// Check the submission, reporting the first offending field.
    pub fn validate(self) -> Result<ValidatedRequest, ValidationError> {
        require("collectionCode", &self.collection_code)?;
        require("shelfmark", &self.shelfmark)?;
        require("identifier", &self.identifier)?;

        let publication_date = parse_date("publicationDate", &self.publication_date)?;
        let periodical_date = parse_date("periodicalDate", &self.periodical_date)?;
        let reading_room_staff_area =
            parse_flag("readingRoomStaffArea", &self.reading_room_staff_area)?;
        let reader_type = parse_reader_type(&self.reader_type)?;

        Ok(ValidatedRequest {
            request: self,
            publication_date,
            periodical_date,
            reading_room_staff_area,
            reader_type,
        })
    }
}

impl ValidatedRequest {
    pub fn reference_identifier(&self) -> &str {
        &self.request.identifier
    }

    /// Build the record under a freshly assigned identifier.
    pub fn into_record(self, identifier: String, created_at: DateTime<Utc>) -> RequestRecord {
        let request = self.request;
        RequestRecord {
            identifier,
            collection_code: request.collection_code.trim().to_string(),
            shelfmark: request.shelfmark.trim().to_string(),
            volume_number: request.volume_number,
            storage_location_code: request.storage_location_code,
            author: request.author,
            title: request.title,
            publication_date: self.publication_date,
            periodical_date: self.periodical_date,
            article_line1: request.article_line1,
            article_line2: request.article_line2,
            catalogue_record_url: request.catalogue_record_url,
            further_details_url: request.further_details_url,
            date_required: request.date_required,
            route: request.route,
            reading_room_staff_area: self.reading_room_staff_area,
            seat_number: request.seat_number,
            reading_category: request.reading_category,
            reference_identifier: request.identifier.trim().to_string(),
            reader_name: request.reader_name,
            reader_type: self.reader_type,
            operator_information: request.operator_information,
            item_identity: request.item_identity,
            created_at,
        }
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::required(field))
    } else {
        Ok(())
    }
}

/// Empty means "no date"; anything else must be a real calendar date.
fn parse_date(field: &'static str, value: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .map(Some)
        .ok_or_else(|| ValidationError::new(field, format!("'{}' is not a valid date", value)))
}

fn parse_flag(field: &'static str, value: &str) -> Result<bool, ValidationError> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else {
        Err(ValidationError::new(
            field,
            format!("'{}' is not true or false", value),
        ))
    }
}

fn parse_reader_type(value: &str) -> Result<ReaderType, ValidationError> {
    let value = value.trim();
    let code: u8 = value.parse().map_err(|_| {
        ValidationError::new("readerType", format!("'{}' is not a reader type code", value))
    })?;
    ReaderType::try_from(code).map_err(|err| ValidationError::new("readerType", err.to_string()))
}
