pub mod calibrate;
pub mod config;
pub mod extract;
pub mod reconcile;
pub mod register;
pub mod reset;
pub mod run;
