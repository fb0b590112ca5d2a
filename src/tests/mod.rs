//! End-to-end pipeline scenarios against in-memory fakes.

mod pipeline_e2e;
