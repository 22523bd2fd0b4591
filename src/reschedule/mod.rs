mod policy;
mod rescheduler;
mod rule_store;

pub use policy::{next_occurrence, RescheduleRule, RuleOffset, SeasonWindow};
pub use rescheduler::{
    CloseDayError, EndOfDayRescheduler, RescheduleFailure, RescheduleReport,
};
pub use rule_store::{NewRescheduleRule, RuleStore};
