//! # Telecommand module
//!
//! Requests sent to the liquid handler by whatever is driving it (a recipe file, the command line,
//! or an API layer), and the responses it sends back.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod transfer;
