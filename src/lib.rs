//! `ligfit` library crate.
//!
//! Equilibrium model and curve fitting for ligand-bridged protein
//! dimerization (`P + L <-> PL`, `PL + P <-> PLP`).
//!
//! The binary (`ligfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the solver and fitter are reusable outside the CLI

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
