use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::record::RequestRecord;
use crate::error::QueryError;
use crate::store::RequestRepository;

/// Read model returned to the query layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestView {
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
    pub dt_required: String,
    pub route: String,
    pub reading_room_staff_area: String,
    pub seat_number: String,
    pub reading_category: String,
    pub reference_identifier: String,
    pub reader_name: String,
    pub reader_type: u8,
    pub operator_information: String,
    pub item_identity: String,
    pub created_at: DateTime<Utc>,
}

impl From<RequestRecord> for RequestView {
    fn from(record: RequestRecord) -> Self {
        Self {
            identifier: record.identifier,
            collection_code: record.collection_code,
            shelfmark: record.shelfmark,
            volume_number: record.volume_number,
            storage_location_code: record.storage_location_code,
            author: record.author,
            title: record.title,
            publication_date: record.publication_date,
            periodical_date: record.periodical_date,
            article_line1: record.article_line1,
            article_line2: record.article_line2,
            catalogue_record_url: record.catalogue_record_url,
            further_details_url: record.further_details_url,
            dt_required: record.date_required,
            route: record.route,
            reading_room_staff_area: record.reading_room_staff_area.to_string(),
            seat_number: record.seat_number,
            reading_category: record.reading_category,
            reference_identifier: record.reference_identifier,
            reader_name: record.reader_name,
            reader_type: record.reader_type.code(),
            operator_information: record.operator_information,
            item_identity: record.item_identity,
            created_at: record.created_at,
        }
    }
}

pub struct RequestQueries<R> {
    repository: R,
}

impl<R: RequestRepository> RequestQueries<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn get_request(&self, identifier: &str) -> Result<RequestView, QueryError> {
        self.repository
            .find_request(identifier)?
            .map(RequestView::from)
            .ok_or_else(|| QueryError::NotFound(identifier.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::{IntegrationEvent, NewOutboxEntry};
    use crate::request::sample_record;
    use crate::store::{HashMapStore, UnitOfWork};

    #[test]
    fn view_of_stored_request() {
        let store = HashMapStore::new();
        let record = sample_record("req-1");
        let staged =
            NewOutboxEntry::from_event(&IntegrationEvent::RequestSubmitted(record.clone()))
                .unwrap();
        store.execute(record, staged).unwrap();

        let view = RequestQueries::new(store).get_request("req-1").unwrap();
        assert_eq!(view.identifier, "req-1");
        assert_eq!(view.reference_identifier, "GHJ456");
        assert_eq!(view.reader_type, 1);
        assert_eq!(view.reading_room_staff_area, "false");
        assert_eq!(view.dt_required, "23-04-2024");
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let queries = RequestQueries::new(HashMapStore::new());
        assert_eq!(
            queries.get_request("ABC123"),
            Err(QueryError::NotFound("ABC123".into()))
        );
    }
}
