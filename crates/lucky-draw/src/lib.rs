//! Lucky draw core for the property listing platform: registration windows, registrant intake,
//! one-shot winner selection and registrant export, plus the HTTP router that exposes them.

pub mod config;
pub mod draws;
pub mod error;
pub mod telemetry;
