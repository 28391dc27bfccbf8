//! Library side of the `sofa-gold` binary: logging setup and the scoring
//! run, kept out of `main` so integration tests can drive them.

pub mod logging;
pub mod run;
