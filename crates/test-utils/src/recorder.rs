use std::sync::{Arc, Mutex};

use priojob::{JobManager, JobPriority};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Started,
    Completed,
    Failed,
}

/// One notification as seen by an [`EventRecorder`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub kind: Kind,
    pub job: String,
    pub priority: JobPriority,
    /// Display form of each failure cause; empty unless `kind == Failed`.
    pub causes: Vec<String>,
}

/// Collects every notification a manager emits, in delivery order.
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<Recorded>>>,
}

impl EventRecorder {
    /// Register one observer per notification kind on `manager`.
    pub fn attach(manager: &JobManager) -> Self {
        let recorder = Self::default();

        let events = Arc::clone(&recorder.events);
        manager.on_job_started(move |e| {
            events.lock().unwrap().push(Recorded {
                kind: Kind::Started,
                job: e.job.name().to_string(),
                priority: e.priority,
                causes: vec![],
            });
        });

        let events = Arc::clone(&recorder.events);
        manager.on_job_completed(move |e| {
            events.lock().unwrap().push(Recorded {
                kind: Kind::Completed,
                job: e.job.name().to_string(),
                priority: e.priority,
                causes: vec![],
            });
        });

        let events = Arc::clone(&recorder.events);
        manager.on_job_failed(move |e| {
            events.lock().unwrap().push(Recorded {
                kind: Kind::Failed,
                job: e.job.name().to_string(),
                priority: e.priority,
                causes: e.error.causes().iter().map(|c| c.to_string()).collect(),
            });
        });

        recorder
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    /// Job names of every event of `kind`, in delivery order.
    pub fn names(&self, kind: Kind) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.job.clone())
            .collect()
    }

    pub fn count(&self, kind: Kind) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    /// Number of completed plus failed notifications.
    pub fn terminal_count(&self) -> usize {
        self.count(Kind::Completed) + self.count(Kind::Failed)
    }
}
