//! Control plane state changes that reach the edge fleet
//!
//! Every mutation here runs in one database transaction together with a
//! [`ConfigLedger::bump`], so agents polling the version see either the whole
//! change or none of it.
pub mod agent;
pub mod error;
pub mod ledger;
pub mod task_tracker;
pub mod topology;

pub use agent::{
    AgentConfig, AgentService, CertificateBundle, HttpsConfig, LineGroupConfig, NodeGroupConfig,
    WebsiteConfig,
};
pub use error::ControlError;
pub use ledger::{ConfigLedger, LedgerHead};
pub use task_tracker::TaskTracker;
pub use topology::{generate_cname_prefix, TopologyService, CNAME_PREFIX_LEN};
