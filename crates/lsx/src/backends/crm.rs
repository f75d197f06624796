//! 📡 The CRM backend — the HTTP API on the receiving end of the pipeline.
//!
//! One module, one job: POST normalized records at the target and translate
//! its answers into the typed [`crate::error::SinkError`] taxonomy.

pub(crate) mod crm_sink;

pub use crm_sink::CrmSinkConfig;
pub(crate) use crm_sink::CrmSink;
