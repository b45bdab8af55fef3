pub mod bridge;
pub mod command;
pub mod config;
pub mod consts;
pub mod discovery;
pub mod encoder;
pub mod entity;
pub mod filter;
pub mod hub;
pub mod mqtt;
pub mod registry;
pub mod topics;
pub mod tracker;
