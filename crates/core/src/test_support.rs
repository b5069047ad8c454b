//! Stub sources and clocks shared by the unit tests of this crate.

use crate::cache::Clock;
use crate::record::Provenance;
use crate::sources::{
    BaselineStore, ClinicalFragment, RecommendationFragment, RecordSource, SourceError,
    SourceFragment, SourceResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tumorboard_types::PatientId;

pub(crate) fn fragment(information: Option<&str>, recommendation: Option<&str>) -> SourceFragment {
    SourceFragment {
        clinical: information.map(|i| ClinicalFragment {
            information: Some(i.to_string()),
            ..ClinicalFragment::default()
        }),
        recommendation: recommendation.map(|r| RecommendationFragment {
            text: Some(r.to_string()),
            trials: Vec::new(),
        }),
    }
}

/// How a stub source answers one lookup.
#[derive(Clone)]
pub(crate) enum Outcome {
    Returns(Option<SourceFragment>),
    Unavailable,
    Malformed,
}

enum Behaviour {
    Always(Outcome),
    /// Patients not listed have no data.
    PerPatient(HashMap<PatientId, Outcome>),
}

/// A stub source that counts how often it was asked.
pub(crate) struct CountingSource {
    provenance: Provenance,
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl CountingSource {
    fn build(provenance: Provenance, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            provenance,
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn with(provenance: Provenance, fragment: SourceFragment) -> Arc<Self> {
        Self::build(provenance, Behaviour::Always(Outcome::Returns(Some(fragment))))
    }

    pub(crate) fn empty(provenance: Provenance) -> Arc<Self> {
        Self::build(provenance, Behaviour::Always(Outcome::Returns(None)))
    }

    pub(crate) fn unavailable(provenance: Provenance) -> Arc<Self> {
        Self::build(provenance, Behaviour::Always(Outcome::Unavailable))
    }

    pub(crate) fn malformed(provenance: Provenance) -> Arc<Self> {
        Self::build(provenance, Behaviour::Always(Outcome::Malformed))
    }

    pub(crate) fn per_patient(provenance: Provenance, outcomes: Vec<(&str, Outcome)>) -> Arc<Self> {
        let outcomes = outcomes
            .into_iter()
            .map(|(id, outcome)| (PatientId::parse(id).expect("valid stub id"), outcome))
            .collect();
        Self::build(provenance, Behaviour::PerPatient(outcomes))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for CountingSource {
    fn provenance(&self) -> Provenance {
        self.provenance
    }

    fn name(&self) -> &'static str {
        "counting stub"
    }

    async fn try_load(&self, id: &PatientId) -> SourceResult<Option<SourceFragment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = match &self.behaviour {
            Behaviour::Always(outcome) => outcome.clone(),
            Behaviour::PerPatient(outcomes) => {
                outcomes.get(id).cloned().unwrap_or(Outcome::Returns(None))
            }
        };
        match outcome {
            Outcome::Returns(fragment) => Ok(fragment),
            Outcome::Unavailable => Err(SourceError::Unavailable("connection refused".into())),
            Outcome::Malformed => Err(SourceError::Malformed {
                location: "stub".into(),
                message: "unexpected shape".into(),
            }),
        }
    }
}

pub(crate) struct StubBaseline {
    text: Option<String>,
    fail: bool,
}

impl StubBaseline {
    pub(crate) fn with_text(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
            fail: false,
        })
    }

    pub(crate) fn empty() -> Arc<Self> {
        Arc::new(Self {
            text: None,
            fail: false,
        })
    }

    pub(crate) fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            text: None,
            fail: true,
        })
    }
}

#[async_trait]
impl BaselineStore for StubBaseline {
    async fn fetch(&self, _id: &PatientId, _model_tag: &str) -> SourceResult<Option<String>> {
        if self.fail {
            return Err(SourceError::Unavailable("timeout".into()));
        }
        Ok(self.text.clone())
    }
}

/// Clock that only moves when told to.
pub(crate) struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        })
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock()
    }
}
