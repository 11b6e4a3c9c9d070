//! Farm - owns the resources and activities and drives monthly steps

use crate::activity::node::StepContext;
use crate::activity::tree::{ActivityTree, TriggerSource};
use crate::arbitration::arbiter::Arbiter;
use crate::arbitration::events::EventLog;
use crate::core::calendar::{Calendar, SimDate};
use crate::core::config::EngineConfig;
use crate::core::diagnostics::Diagnostics;
use crate::core::error::Result;
use crate::core::types::ActivityId;
use crate::resources::pricing::PriceList;
use crate::resources::registry::ResourceHolder;

#[derive(Debug)]
pub struct Farm {
    pub name: String,
    pub calendar: Calendar,
    pub resources: ResourceHolder,
    pub prices: PriceList,
    pub activities: ActivityTree,
    pub config: EngineConfig,
    pub diagnostics: Diagnostics,
    pub events: EventLog,
}

impl Farm {
    pub fn new(name: impl Into<String>, start: SimDate, config: EngineConfig) -> Self {
        Self {
            name: name.into(),
            calendar: Calendar::new(start),
            resources: ResourceHolder::new(),
            prices: PriceList::new(),
            activities: ActivityTree::new(),
            config,
            diagnostics: Diagnostics::new(),
            events: EventLog::new(),
        }
    }

    pub fn step_context(&self) -> StepContext {
        StepContext {
            today: self.calendar.today(),
            step: self.calendar.current_step(),
        }
    }

    /// Build dynamic children and run the one-time initialisation pass
    pub fn initialise(&mut self) -> Result<()> {
        self.activities.rebuild_dynamic_children();
        self.resources.refresh_labour();
        let mut arbiter = Arbiter::new(
            &mut self.resources,
            &self.prices,
            &self.config,
            &mut self.diagnostics,
            &mut self.events,
        );
        self.activities.gather_resources_for_initialisation(&mut arbiter)?;
        tracing::info!(farm = %self.name, "farm initialised");
        Ok(())
    }

    /// Resource every automatic activity for the current month, then advance
    pub fn run_step(&mut self) -> Result<()> {
        let step = self.step_context();
        self.resources.refresh_labour();
        let mut arbiter = Arbiter::new(
            &mut self.resources,
            &self.prices,
            &self.config,
            &mut self.diagnostics,
            &mut self.events,
        );
        self.activities
            .gather_resources_for_activities(&mut arbiter, &step, TriggerSource::Holder)?;
        tracing::info!(
            farm = %self.name,
            step = step.step,
            year = step.today.year,
            month = step.today.month,
            "step complete"
        );
        self.calendar.advance();
        Ok(())
    }

    /// Run `steps` months; a fatal error stops the run
    pub fn run(&mut self, steps: u64) -> Result<()> {
        for _ in 0..steps {
            self.run_step()?;
        }
        Ok(())
    }

    /// Resource a manually allocated activity (and its subtree) in the current month
    ///
    /// Returns false if the activity does not exist.
    pub fn allocate_manual(&mut self, id: ActivityId) -> Result<bool> {
        let step = self.step_context();
        let mut arbiter = Arbiter::new(
            &mut self.resources,
            &self.prices,
            &self.config,
            &mut self.diagnostics,
            &mut self.events,
        );
        self.activities.gather_resources_for(id, &mut arbiter, &step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::node::ActivityNode;
    use crate::activity::status::ActivityStatus;

    #[test]
    fn test_run_advances_calendar() {
        let mut farm = Farm::new("Test", SimDate::new(2000, 11), EngineConfig::default());
        farm.activities.add(ActivityNode::folder(ActivityId(1), "Root"));
        farm.initialise().unwrap();
        farm.run(3).unwrap();
        assert_eq!(farm.calendar.today(), SimDate::new(2001, 2));
        assert_eq!(farm.calendar.current_step(), 3);
        assert_eq!(farm.events.len(), 3);
        assert_eq!(farm.events.last_status(ActivityId(1)), Some(ActivityStatus::NoTask));
    }
}
