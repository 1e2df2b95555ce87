//! # dakoku-automation
//!
//! Attendance punching for Jobcan and Slack workflows.
//!
//! Each site is a [`SiteDriver`] that describes its flow as a list of
//! [`Step`]s. The [`Orchestrator`] runs the login flow and the punches a
//! [`RunRequest`] asks for, and [`run_automation`] wraps that in a process
//! lock, a browser session and a liveness watch.

pub mod error;
pub mod jobcan;
pub mod orchestrator;
pub mod request;
pub mod runner;
pub mod schedule;
pub mod slackwf;
pub mod step;

pub use error::AutomationError;
pub use jobcan::JobcanDriver;
pub use orchestrator::{Orchestrator, RunReport};
pub use request::{field, Action, CredentialBundle, RunRequest, RunResult, Secret, Site};
pub use runner::{launch_options, run_automation, RunOutcome, RunParams};
pub use schedule::{workflow_date, AttendanceSchedule, ClockTime};
pub use slackwf::SlackWfDriver;
pub use step::{
    Condition, Confirmation, PunchKind, SiteDriver, Step, StepRunner, SubmitOutcome, Target,
    TransplantStrategy,
};
