//! Scenario tests for the question bank services.

mod dedup_scenarios;
mod support;
