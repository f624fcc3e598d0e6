//! Background loading of topology documents.
//!
//! Each request is tagged with a ticket. Workers report back over a channel
//! that the UI loop drains; only the newest ticket's result is accepted, so a
//! slow earlier request can never overwrite a later one.

use std::{
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread,
};

use crate::{error::LoadError, feature::FeatureSet, topology::decode_document};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    pub id: u64,
    pub source: String,
    pub object: String,
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub ticket: LoadTicket,
    pub result: Result<FeatureSet, LoadError>,
}

/// Hands out tickets and remembers which one is current.
#[derive(Debug, Default)]
pub struct LoadTracker {
    next_id: u64,
    latest: Option<u64>,
}

impl LoadTracker {
    pub fn issue(&mut self, source: &str, object: &str) -> LoadTicket {
        self.next_id += 1;
        self.latest = Some(self.next_id);
        LoadTicket { id: self.next_id, source: source.to_string(), object: object.to_string() }
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.latest == Some(ticket.id)
    }

    /// Accepts the current ticket once; later duplicates and stale tickets are refused.
    pub fn accept(&mut self, ticket: &LoadTicket) -> bool {
        if self.is_current(ticket) {
            self.latest = None;
            true
        } else {
            false
        }
    }
}

pub struct Loader {
    tracker: LoadTracker,
    tx: Sender<LoadOutcome>,
    rx: Receiver<LoadOutcome>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tracker: LoadTracker::default(), tx, rx }
    }

    /// Starts loading on a worker thread and returns its ticket.
    pub fn request(&mut self, source: &str, object: &str) -> LoadTicket {
        let ticket = self.tracker.issue(source, object);
        tracing::info!(id = ticket.id, source, object, "load json");
        let tx = self.tx.clone();
        let job = ticket.clone();
        thread::spawn(move || {
            let result = load(&job.source, &job.object);
            // The receiver is gone only when the app is shutting down.
            let _ = tx.send(LoadOutcome { ticket: job, result });
        });
        ticket
    }

    pub fn tracker_mut(&mut self) -> &mut LoadTracker {
        &mut self.tracker
    }

    /// Drains finished work; returns the newest request's outcome if it arrived.
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        let mut accepted = None;
        loop {
            match self.rx.try_recv() {
                Ok(outcome) => {
                    if self.tracker.accept(&outcome.ticket) {
                        accepted = Some(outcome);
                    } else {
                        tracing::info!(
                            id = outcome.ticket.id,
                            source = %outcome.ticket.source,
                            "discarding stale load result"
                        );
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        accepted
    }
}

/// Reads a document from an `http(s)` URL or a file path.
pub fn fetch(source: &str) -> Result<Vec<u8>, LoadError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let bytes = reqwest::blocking::get(source)
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| LoadError::Http { url: source.to_string(), source: e })?;
        Ok(bytes.to_vec())
    } else {
        std::fs::read(source).map_err(|e| LoadError::Io { path: source.to_string(), source: e })
    }
}

/// Fetches and decodes synchronously.
pub fn load(source: &str, object: &str) -> Result<FeatureSet, LoadError> {
    let bytes = fetch(source)?;
    let features = decode_document(&bytes, object)?;
    tracing::info!(source, object, features = features.len(), "load json success");
    Ok(features)
}
