//! Lead outreach pipeline library
//!
//! Reads business leads from a Google Sheets tab, optionally probes each
//! lead's website and map listing with headless Chrome, classifies the
//! business with keyword rules, composes a Spanish WhatsApp message (from a
//! template or an LLM) and writes the results to a sheet tab or CSV file.
//!
//! # Modules
//!
//! - `browser`: Headless Chrome behind the `PageFetcher` trait.
//! - `classifier`: Business-type rules, pain points and confidence scoring.
//! - `config`: Configuration management.
//! - `contact`: Phone, website and text normalization.
//! - `errors`: Error handling types.
//! - `llm`: OpenAI-compatible completion client with a circuit breaker.
//! - `message`: Template rendering and message composition.
//! - `models`: Core data models.
//! - `pipeline`: Run orchestration and summary.
//! - `probe`: Website and map-listing inspection.
//! - `ranked`: Ranked fallback strategies with recorded attempts.
//! - `sheets`: Google Sheets v4 client.
//! - `sink`: Output tab and CSV writers.
//! - `source`: Header mapping and lead loading.
//! - `whatsapp`: WhatsApp Web sender.

pub mod browser;
pub mod classifier;
pub mod config;
pub mod contact;
pub mod errors;
pub mod llm;
pub mod message;
pub mod models;
pub mod pipeline;
pub mod probe;
pub mod ranked;
pub mod sheets;
pub mod sink;
pub mod source;
pub mod whatsapp;
