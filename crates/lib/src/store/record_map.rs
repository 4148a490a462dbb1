//! In-memory `id → Record` mapping with the CRUD and merge rules shared by the
//! remote Record Store and the Local Replica.
//!
//! Both stores persist the whole mapping as one value, so every mutation is:
//! load the map, apply one of these methods, write the map back.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    errors::StoreError,
    record::{Record, RecordInput, check_id},
};
use crate::Result;

/// One partition's records keyed by id. Serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordMap {
    records: BTreeMap<String, Record>,
}

impl RecordMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records.into_values().collect()
    }

    /// Schema check run after decoding a stored map: every entry must sit
    /// under its own id.
    pub(crate) fn check_integrity(&self, storage_key: &str) -> Result<()> {
        for (key, record) in &self.records {
            if key != &record.id {
                return Err(StoreError::Corrupted {
                    key: storage_key.to_string(),
                    reason: format!("record '{}' stored under id '{key}'", record.id),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Validate `input`, assign an id if it has none, stamp it and insert it.
    pub fn create(&mut self, input: RecordInput, now: DateTime<Utc>) -> Result<Record> {
        self.create_excluding(input, now, &RecordMap::new())
    }

    /// [`create`](Self::create), additionally rejecting a client-supplied id
    /// that `other` (the user's other partition) already holds.
    pub fn create_excluding(
        &mut self,
        input: RecordInput,
        now: DateTime<Utc>,
        other: &RecordMap,
    ) -> Result<Record> {
        let id = match input.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                check_id(id)?;
                id.to_string()
            }
            _ => uuid::Uuid::new_v4().to_string(),
        };
        if self.records.contains_key(&id) {
            return Err(StoreError::validation("id", format!("'{id}' already exists")).into());
        }
        if other.contains(&id) {
            return Err(StoreError::validation(
                "id",
                format!("'{id}' already exists in the other partition"),
            )
            .into());
        }
        let record = input.into_record(id, now)?;
        self.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    /// Replace the fields of an existing record. The id never changes.
    pub fn update(&mut self, id: &str, input: RecordInput, now: DateTime<Utc>) -> Result<Record> {
        if !self.records.contains_key(id) {
            return Err(StoreError::RecordNotFound { id: id.to_string() }.into());
        }
        let record = input.into_record(id.to_string(), now)?;
        self.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    /// Remove every listed id that is present. Returns how many were removed.
    pub fn remove_many<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        ids.iter()
            .filter(|id| self.records.remove(id.as_ref()).is_some())
            .count()
    }

    /// Last-write-wins merge: insert each record if its id is absent, or
    /// replace the existing one only if the incoming `lastUpdated` is strictly
    /// newer. Incoming timestamps are trusted for ordering.
    ///
    /// All records are validated before any is applied. Returns how many
    /// records were inserted or replaced.
    pub fn upsert_newer(&mut self, incoming: Vec<Record>) -> Result<usize> {
        self.upsert_newer_excluding(incoming, &RecordMap::new())
    }

    /// [`upsert_newer`](Self::upsert_newer), skipping records whose id `other`
    /// (the user's other partition) already holds. A record lives in exactly
    /// one partition; the partition that has it keeps it.
    pub fn upsert_newer_excluding(
        &mut self,
        incoming: Vec<Record>,
        other: &RecordMap,
    ) -> Result<usize> {
        let incoming = incoming
            .into_iter()
            .map(Record::normalized)
            .collect::<Result<Vec<_>>>()?;

        let mut applied = 0;
        for record in incoming {
            if other.contains(&record.id) {
                continue;
            }
            let newer = match self.records.get(&record.id) {
                Some(existing) => record.last_updated > existing.last_updated,
                None => true,
            };
            if newer {
                self.records.insert(record.id.clone(), record);
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Clones of the listed records that are present, in request order.
    pub(crate) fn select<S: AsRef<str>>(&self, ids: &[S]) -> Vec<Record> {
        let mut seen = BTreeSet::new();
        ids.iter()
            .filter(|id| seen.insert((*id).as_ref()))
            .filter_map(|id| self.records.get(id.as_ref()).cloned())
            .collect()
    }

    /// Insert records exactly as given, replacing same-id entries.
    pub(crate) fn insert_unchanged(&mut self, records: Vec<Record>) {
        for record in records {
            self.records.insert(record.id.clone(), record);
        }
    }

    /// Distinct tags across all records, sorted.
    pub fn tags(&self) -> Vec<String> {
        self.records
            .values()
            .flat_map(|r| r.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl FromIterator<Record> for RecordMap {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }
}

impl IntoIterator for RecordMap {
    type Item = (String, Record);
    type IntoIter = std::collections::btree_map::IntoIter<String, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
