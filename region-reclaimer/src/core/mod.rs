/*!
Core modules of the region reclaimer service
*/

pub mod config;
pub mod event_system;
pub mod output_plugins;
pub mod tracker;
pub mod world_adapter;
