//! Operator Feedback
//!
//! Offline analysis of operator verdicts on stored clips, producing
//! weight-adjustment reports under `learning/`.

pub mod analyzer;

pub use analyzer::{target_for, AdjustmentReport, FeedbackAnalyzer, FeedbackOutcome, Verdict};
