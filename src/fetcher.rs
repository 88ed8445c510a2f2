use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use tracing::{debug, warn};

use crate::domain::KeggEntityId;
use crate::error::KeggError;
use crate::kegg::KeggClient;
use crate::manager::{ProgressEvent, ProgressSink};
use crate::store::Store;

pub const DEFAULT_POOL_SIZE: usize = 3;

#[derive(Debug)]
pub struct FetchOutcome {
    pub id: KeggEntityId,
    pub result: Result<Vec<String>, KeggError>,
}

/// Cache-first access to KEGG flat-file entries.
pub struct EntityFetcher<C: KeggClient> {
    client: C,
    store: Store,
}

impl<C: KeggClient> EntityFetcher<C> {
    pub fn new(client: C, store: Store) -> Self {
        Self { client, store }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn is_cached(&self, id: &KeggEntityId) -> bool {
        self.store.exists(&self.store.entity_path(id))
    }

    /// Returns the raw lines of an entry, downloading it at most once.
    pub fn ensure_entity(&self, id: &KeggEntityId) -> Result<Vec<String>, KeggError> {
        let path = self.store.entity_path(id);
        let text = if self.store.exists(&path) {
            debug!(%id, "entity cache hit");
            Store::read_text(&path)?
        } else {
            debug!(%id, "entity cache miss");
            let text = self.client.get_entity(id)?;
            Store::write_bytes_atomic(&path, text.as_bytes())?;
            text
        };
        Ok(text.lines().map(str::to_string).collect())
    }

    /// Fetches distinct entries on a bounded pool of worker threads.
    ///
    /// Outcomes arrive in completion order. A failure is reported for its own
    /// identifier and never stops the remaining fetches.
    pub fn fetch_all(
        &self,
        ids: &[KeggEntityId],
        pool_size: usize,
        sink: &dyn ProgressSink,
    ) -> Vec<FetchOutcome> {
        if ids.is_empty() {
            return Vec::new();
        }
        let workers = pool_size.clamp(1, ids.len());
        let next = AtomicUsize::new(0);
        let start = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {} entities on {workers} threads", ids.len()),
            elapsed: None,
        });

        let mut outcomes = Vec::with_capacity(ids.len());
        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<FetchOutcome>();
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                scope.spawn(move || {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(id) = ids.get(index) else {
                            break;
                        };
                        let result = self.ensure_entity(id).map_err(|err| match err {
                            KeggError::EntityFetch { .. } => err,
                            other => KeggError::EntityFetch {
                                id: id.to_string(),
                                message: other.to_string(),
                            },
                        });
                        if tx
                            .send(FetchOutcome {
                                id: id.clone(),
                                result,
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for outcome in rx {
                if let Err(err) = &outcome.result {
                    warn!(id = %outcome.id, error = %err, "entity fetch failed");
                }
                outcomes.push(outcome);
                if outcomes.len() % 100 == 0 || outcomes.len() == ids.len() {
                    sink.event(ProgressEvent {
                        message: format!("fetched {}/{}", outcomes.len(), ids.len()),
                        elapsed: Some(start.elapsed()),
                    });
                }
            }
        });
        outcomes
    }
}
