//! Deterministic analytics over a [`crate::domain::PriceSeries`].
//!
//! The indicator and risk engines are pure functions of the series and can
//! run in any order; fundamentals are extracted independently from the
//! provider payload.

pub mod fundamentals;
pub mod indicators;
pub mod risk;
