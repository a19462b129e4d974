//! Quote provider abstractions and implementations.
//!
//! This module contains:
//! - The `QuoteProvider` trait that all providers implement
//! - The Yahoo Finance implementation
//!
//! Providers are deliberately dumb: they fetch and translate errors. Deciding
//! when to call them, how to degrade and what to cache lives in the core crate.

mod traits;

pub mod yahoo;

pub use traits::QuoteProvider;
