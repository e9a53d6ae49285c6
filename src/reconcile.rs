// Merges a freshly scraped batch against the previously persisted snapshot.
//
// The batch always wins: prices and timestamps come from the current run and
// the prior snapshot only classifies names as known or new. Names that were
// not observed in this run are dropped.

use crate::{
    error::{TrackerError, TrackerResult},
    models::{ProductRecord, Snapshot},
};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub snapshot: Snapshot,
    pub new_names: Vec<String>,
    pub known_names: Vec<String>,
    pub dropped_names: Vec<String>,
    /// The prior snapshot could not be indexed and was ignored.
    pub fell_back: bool,
}

// Name lookup over the prior snapshot. Blank or repeated names mean the
// snapshot was not produced by this tool and cannot be trusted as an index.
fn index_prior(prior: &Snapshot) -> TrackerResult<HashSet<&str>> {
    let mut index = HashSet::with_capacity(prior.len());
    for (row, name) in prior.names().enumerate() {
        if name.trim().is_empty() {
            return Err(TrackerError::MalformedSnapshot(format!(
                "row {} has an empty product name",
                row + 1
            )));
        }
        if !index.insert(name) {
            return Err(TrackerError::MalformedSnapshot(format!(
                "product name '{}' appears more than once",
                name
            )));
        }
    }
    Ok(index)
}

pub fn reconcile(batch: Vec<ProductRecord>, prior: Option<&Snapshot>) -> Reconciliation {
    let snapshot = Snapshot::from_batch(batch);

    let index = match prior.map(index_prior).transpose() {
        Ok(index) => index,
        Err(e) => {
            tracing::warn!(error = %e, "Prior snapshot ignored; rebuilding from this run only");
            return Reconciliation {
                new_names: snapshot.names().map(str::to_owned).collect(),
                snapshot,
                known_names: Vec::new(),
                dropped_names: Vec::new(),
                fell_back: true,
            };
        }
    };

    let Some(index) = index else {
        return Reconciliation {
            new_names: snapshot.names().map(str::to_owned).collect(),
            snapshot,
            known_names: Vec::new(),
            dropped_names: Vec::new(),
            fell_back: false,
        };
    };

    let (known_names, new_names): (Vec<String>, Vec<String>) = snapshot
        .names()
        .map(str::to_owned)
        .partition(|name| index.contains(name.as_str()));

    let current: HashSet<&str> = snapshot.names().collect();
    let dropped_names = prior
        .into_iter()
        .flat_map(Snapshot::names)
        .filter(|name| !current.contains(name))
        .map(str::to_owned)
        .collect();

    Reconciliation {
        snapshot,
        new_names,
        known_names,
        dropped_names,
        fell_back: false,
    }
}
