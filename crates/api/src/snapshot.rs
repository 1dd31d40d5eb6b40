use serde::Serialize;

use common::{CandidateScore, CandidateView, DashboardEvent, RankEntry};

/// Last known value of every dashboard event kind.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub potential_candidates: Vec<CandidateView>,
    pub current: Option<CandidateScore>,
    pub history: Vec<RankEntry>,
    pub last_log: Option<String>,
}

impl DashboardSnapshot {
    pub fn apply(&mut self, event: &DashboardEvent) {
        match event {
            DashboardEvent::Candidates { potential_candidates } => {
                self.potential_candidates = potential_candidates.clone();
            }
            DashboardEvent::Performers { current, history } => {
                self.current = current.clone();
                self.history = history.clone();
            }
            DashboardEvent::Log { message } => self.last_log = Some(message.clone()),
        }
    }

    /// Events that rebuild this state on a fresh client.
    pub fn replay(&self) -> Vec<DashboardEvent> {
        let mut events = vec![
            DashboardEvent::Candidates { potential_candidates: self.potential_candidates.clone() },
            DashboardEvent::Performers { current: self.current.clone(), history: self.history.clone() },
        ];
        if let Some(message) = &self.last_log {
            events.push(DashboardEvent::Log { message: message.clone() });
        }
        events
    }
}
