//! `taskbell-rules` — reminder admissibility and urgency rules.
//!
//! | Predicate                   | True when                                              |
//! |-----------------------------|--------------------------------------------------------|
//! | `should_execute`            | open, dated, due within the next 60 minutes            |
//! | `is_overdue`                | open and due date before today                         |
//! | `is_high_priority`          | priority is `HIGH`                                     |
//! | `needs_immediate_attention` | overdue, or high priority and `should_execute`         |
//!
//! `calculate_urgency_score` ranks tasks; it never gates a reminder.

pub mod engine;

pub use engine::{RuleEngine, TaskAssessment};
