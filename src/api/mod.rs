//! API Module
//!
//! HTTP handlers and routing for the analysis job REST API.
//!
//! # Endpoints
//! - `POST /jobs` - Queue an analysis of a dataset
//! - `GET /jobs/:job_id` - Poll a job's status and progress
//! - `GET /datasets/:dataset_ref/views/:view` - Fetch a phase result
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
