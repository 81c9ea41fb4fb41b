//! Typed repositories over the entities
//!
//! Every trait is implemented for any [`sea_orm::ConnectionTrait`], so the
//! caller decides the transaction scope: pass the `DatabaseConnection` for a
//! standalone statement or a `DatabaseTransaction` to take part in a unit of
//! work.

mod acme_account;
mod agent_task;
mod binding;
mod certificate;
mod certificate_request;
mod config_version;
mod dns_record;
mod topology;
mod website;
mod zone;

pub use acme_account::AcmeAccountStore;
pub use agent_task::AgentTaskStore;
pub use binding::BindingStore;
pub use certificate::{CertificateStore, NewCertificate};
pub use certificate_request::{CertificateRequestStore, NewCertificateRequest};
pub use config_version::ConfigVersionStore;
pub use dns_record::{DnsRecordStore, NewDnsRecord};
pub use topology::TopologyStore;
pub use website::WebsiteStore;
pub use zone::ZoneStore;
