//! Database entities

pub mod acme_account;
pub mod acme_provider;
pub mod agent_task;
pub mod certificate;
pub mod certificate_binding;
pub mod certificate_domain;
pub mod certificate_request;
pub mod config_version;
pub mod dns_record;
pub mod domain;
pub mod domain_dns_provider;
pub mod line_group;
pub mod node;
pub mod node_group;
pub mod node_group_sub_ip;
pub mod node_sub_ip;
pub mod provider_credential;
pub mod website;
pub mod website_domain;

pub mod prelude {
    pub use super::acme_account::Entity as AcmeAccount;
    pub use super::acme_provider::Entity as AcmeProvider;
    pub use super::agent_task::Entity as AgentTask;
    pub use super::certificate::Entity as Certificate;
    pub use super::certificate_binding::Entity as CertificateBinding;
    pub use super::certificate_domain::Entity as CertificateDomain;
    pub use super::certificate_request::Entity as CertificateRequest;
    pub use super::config_version::Entity as ConfigVersion;
    pub use super::dns_record::Entity as DnsRecord;
    pub use super::domain::Entity as Domain;
    pub use super::domain_dns_provider::Entity as DomainDnsProvider;
    pub use super::line_group::Entity as LineGroup;
    pub use super::node::Entity as Node;
    pub use super::node_group::Entity as NodeGroup;
    pub use super::node_group_sub_ip::Entity as NodeGroupSubIp;
    pub use super::node_sub_ip::Entity as NodeSubIp;
    pub use super::provider_credential::Entity as ProviderCredential;
    pub use super::website::Entity as Website;
    pub use super::website_domain::Entity as WebsiteDomain;
}
