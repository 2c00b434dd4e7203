use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use super::domain::{ApplicationId, PostingId};
use super::error::FulfillmentError;
use super::repository::{FulfillmentStore, PostingRecord, RepositoryError};

/// Process-local store: one mutex per posting, so postings never contend.
#[derive(Default, Clone)]
pub struct InMemoryFulfillmentStore {
    postings: Arc<RwLock<HashMap<PostingId, Arc<Mutex<PostingRecord>>>>>,
    application_index: Arc<RwLock<HashMap<ApplicationId, PostingId>>>,
}

impl InMemoryFulfillmentStore {
    fn slot(&self, id: &PostingId) -> Result<Option<Arc<Mutex<PostingRecord>>>, RepositoryError> {
        let guard = self
            .postings
            .read()
            .map_err(|_| RepositoryError::Unavailable("posting map poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    fn index(&self, record: &PostingRecord) -> Result<(), RepositoryError> {
        let mut index = self
            .application_index
            .write()
            .map_err(|_| RepositoryError::Unavailable("application index poisoned".to_string()))?;
        for application in &record.applications {
            index
                .entry(application.id.clone())
                .or_insert_with(|| record.posting.id.clone());
        }
        Ok(())
    }
}

impl FulfillmentStore for InMemoryFulfillmentStore {
    fn insert_posting(&self, record: PostingRecord) -> Result<PostingRecord, RepositoryError> {
        let mut guard = self
            .postings
            .write()
            .map_err(|_| RepositoryError::Unavailable("posting map poisoned".to_string()))?;
        if guard.contains_key(&record.posting.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(
            record.posting.id.clone(),
            Arc::new(Mutex::new(record.clone())),
        );
        drop(guard);
        self.index(&record)?;
        Ok(record)
    }

    fn fetch(&self, id: &PostingId) -> Result<Option<PostingRecord>, RepositoryError> {
        match self.slot(id)? {
            Some(slot) => {
                let record = slot
                    .lock()
                    .map_err(|_| RepositoryError::Unavailable("posting lock poisoned".to_string()))?;
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    fn locate_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<PostingId>, RepositoryError> {
        let index = self
            .application_index
            .read()
            .map_err(|_| RepositoryError::Unavailable("application index poisoned".to_string()))?;
        Ok(index.get(id).cloned())
    }

    fn transact<T, F>(&self, id: &PostingId, work: F) -> Result<T, FulfillmentError>
    where
        F: FnOnce(&mut PostingRecord) -> Result<T, FulfillmentError>,
    {
        let slot = self
            .slot(id)?
            .ok_or_else(|| FulfillmentError::NotFound(format!("posting {id}")))?;
        let mut committed = slot
            .lock()
            .map_err(|_| RepositoryError::Unavailable("posting lock poisoned".to_string()))?;

        let mut working = committed.clone();
        let value = work(&mut working)?;
        self.index(&working)?;
        *committed = working;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::fulfillment::domain::{
        Posting, PostingMode, PostingStatus, UserId,
    };
    use chrono::{TimeZone, Utc};

    fn record(id: &str) -> PostingRecord {
        PostingRecord::new(Posting {
            id: PostingId::from(id),
            creator_id: UserId::from("owner"),
            title: "Robotics club".to_string(),
            team_size_min: 1,
            team_size_max: 2,
            status: PostingStatus::Open,
            mode: PostingMode::Open,
            auto_accept: false,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        })
    }

    #[test]
    fn insert_rejects_duplicate_posting_ids() {
        let store = InMemoryFulfillmentStore::default();
        store.insert_posting(record("post-1")).expect("first insert");

        assert!(matches!(
            store.insert_posting(record("post-1")),
            Err(RepositoryError::Conflict)
        ));
    }

    #[test]
    fn failed_work_is_not_committed() {
        let store = InMemoryFulfillmentStore::default();
        store.insert_posting(record("post-1")).expect("insert");
        let id = PostingId::from("post-1");

        let result: Result<(), FulfillmentError> = store.transact(&id, |record| {
            record.posting.title = "changed".to_string();
            Err(FulfillmentError::CapacityExceeded)
        });
        assert!(matches!(result, Err(FulfillmentError::CapacityExceeded)));

        let stored = store.fetch(&id).expect("fetch").expect("present");
        assert_eq!(stored.posting.title, "Robotics club");
    }

    #[test]
    fn transact_on_missing_posting_is_not_found() {
        let store = InMemoryFulfillmentStore::default();
        let result = store.transact(&PostingId::from("nope"), |_| Ok(()));
        assert!(matches!(result, Err(FulfillmentError::NotFound(_))));
    }
}
