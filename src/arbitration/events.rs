//! Reporting seam: events emitted by arbitration

use serde::Serialize;

use crate::activity::status::ActivityStatus;
use crate::core::types::ActivityId;

/// Which shortfall handler receives a shortfall report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShortfallRoute {
    /// The requesting activity's own handler
    Activity,
    /// The market holding the short pool
    Market,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum ArbitrationEvent {
    Shortfall {
        activity: ActivityId,
        activity_name: String,
        resource: String,
        requested: f64,
        available: f64,
        route: ShortfallRoute,
    },
    ActivityPerformed {
        activity: ActivityId,
        activity_name: String,
        status: ActivityStatus,
    },
}

pub trait ArbitrationObserver {
    fn notify(&mut self, event: ArbitrationEvent);
}

/// Observer that keeps every event in order
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<ArbitrationEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ArbitrationEvent] {
        &self.events
    }

    pub fn shortfalls(&self) -> impl Iterator<Item = &ArbitrationEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, ArbitrationEvent::Shortfall { .. }))
    }

    /// Last status reported for an activity
    pub fn last_status(&self, activity: ActivityId) -> Option<ActivityStatus> {
        self.events.iter().rev().find_map(|e| match e {
            ArbitrationEvent::ActivityPerformed {
                activity: id, status, ..
            } if *id == activity => Some(*status),
            _ => None,
        })
    }

    /// Remove and return everything logged so far
    pub fn drain(&mut self) -> Vec<ArbitrationEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl ArbitrationObserver for EventLog {
    fn notify(&mut self, event: ArbitrationEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_status() {
        let mut log = EventLog::new();
        log.notify(ArbitrationEvent::ActivityPerformed {
            activity: ActivityId(1),
            activity_name: "Feed".into(),
            status: ActivityStatus::Partial,
        });
        log.notify(ArbitrationEvent::ActivityPerformed {
            activity: ActivityId(1),
            activity_name: "Feed".into(),
            status: ActivityStatus::Success,
        });
        assert_eq!(log.last_status(ActivityId(1)), Some(ActivityStatus::Success));
        assert_eq!(log.last_status(ActivityId(2)), None);
        assert_eq!(log.drain().len(), 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = ArbitrationEvent::Shortfall {
            activity: ActivityId(3),
            activity_name: "Buy".into(),
            resource: "Finance.Bank".into(),
            requested: 10.0,
            available: 4.0,
            route: ShortfallRoute::Market,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"Shortfall\""));
        assert!(json.contains("\"route\":\"Market\""));
    }
}
