//! Reading-room item requests: the submission command, its validation, the
//! persisted record, the handler that commits it, and the read-side view.

mod command;
mod handler;
mod query;
mod record;

pub use command::{SubmitEnvelope, SubmitRequest, ValidatedRequest};
pub use handler::CommandHandler;
pub use query::{RequestQueries, RequestView};
pub use record::{ReaderType, RequestRecord, UnknownReaderType};

#[cfg(test)]
pub(crate) fn sample_record(identifier: &str) -> RequestRecord {
    RequestRecord {
        identifier: identifier.to_string(),
        collection_code: "TST".into(),
        shelfmark: "tstMark".into(),
        volume_number: "123".into(),
        storage_location_code: "33".into(),
        author: "Christopher James".into(),
        title: "A History of Yesterday".into(),
        publication_date: chrono::NaiveDate::from_ymd_opt(2024, 4, 23),
        periodical_date: None,
        article_line1: String::new(),
        article_line2: String::new(),
        catalogue_record_url: String::new(),
        further_details_url: String::new(),
        date_required: "23-04-2024".into(),
        route: String::new(),
        reading_room_staff_area: false,
        seat_number: "15".into(),
        reading_category: "fiction".into(),
        reference_identifier: "GHJ456".into(),
        reader_name: "Herod Antipas".into(),
        reader_type: ReaderType::Standard,
        operator_information: String::new(),
        item_identity: String::new(),
        created_at: chrono::Utc::now(),
    }
}
