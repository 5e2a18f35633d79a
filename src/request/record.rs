use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Category of reader placing the request. Stored and published as its
/// numeric code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ReaderType {
    Standard = 1,
    Staff = 2,
    Proxy = 3,
}

impl ReaderType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ReaderType> for u8 {
    fn from(reader_type: ReaderType) -> Self {
        reader_type.code()
    }
}

impl TryFrom<u8> for ReaderType {
    type Error = UnknownReaderType;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ReaderType::Standard),
            2 => Ok(ReaderType::Staff),
            3 => Ok(ReaderType::Proxy),
            other => Err(UnknownReaderType(other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownReaderType(pub u8);

impl fmt::Display for UnknownReaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown reader type {}", self.0)
    }
}

/// A submitted reading-room item request.
///
/// `identifier` is generated when the request is accepted and never changes.
/// `reference_identifier` is the identifier the caller sent with the
/// submission and is kept only as data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub identifier: String,
    pub collection_code: String,
    pub shelfmark: String,
    pub volume_number: String,
    pub storage_location_code: String,
    pub author: String,
    pub title: String,
    pub publication_date: Option<NaiveDate>,
    pub periodical_date: Option<NaiveDate>,
    pub article_line1: String,
    pub article_line2: String,
    pub catalogue_record_url: String,
    pub further_details_url: String,
    pub date_required: String,
    pub route: String,
    pub reading_room_staff_area: bool,
    pub seat_number: String,
    pub reading_category: String,
    pub reference_identifier: String,
    pub reader_name: String,
    pub reader_type: ReaderType,
    pub operator_information: String,
    pub item_identity: String,
    pub created_at: DateTime<Utc>,
}

impl RequestRecord {
    pub fn id(&self) -> &str {
        &self.identifier
    }
}
