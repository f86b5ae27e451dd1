//! Banking Gate Library
//!
//! Access control and financing calculations for the digital banking front
//! end. Identity, account records and sessions live in a hosted provider;
//! this crate decides what a session may see and computes financing quotes.
//!
//! # Modules
//!
//! - `access_gate`: Pure access decision for an account and a route.
//! - `access_guard`: Fetch-then-evaluate check against the identity provider.
//! - `amortization`: Flat add-on interest financing calculator.
//! - `circuit_breaker`: Circuit breaker for identity provider calls.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `identity_client`: Identity provider REST client.
//! - `models`: Core data models.
//! - `routes`: Page catalogue and per-page requirements.
//! - `session_events`: Sign-in/sign-out event bus.

pub mod access_gate;
pub mod access_guard;
pub mod amortization;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod identity_client;
pub mod models;
pub mod routes;
pub mod session_events;
