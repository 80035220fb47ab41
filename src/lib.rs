pub mod admission;
pub mod configuration;
pub mod domain;
pub mod events;
pub mod provider;
pub mod startup;
pub mod telemetry;
pub mod webhook;
pub mod workers;
