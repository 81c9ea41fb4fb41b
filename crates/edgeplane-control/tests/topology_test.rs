//! Node group, line group and website writers

mod common;

use chrono::{Duration, Utc};
use common::{seed_node, seed_zone, Harness};
use edgeplane_control::{ConfigLedger, ControlError};
use edgeplane_db::{
    entities::{
        certificate::{CertificateSource, RenewMode},
        certificate_binding::BindType,
        dns_record::{RecordStatus, RecordType},
    },
    store::{
        BindingStore, CertificateStore, DnsRecordStore, NewCertificate, TopologyStore,
        WebsiteStore,
    },
    Owner,
};

async fn version(harness: &Harness) -> i64 {
    ConfigLedger::new(harness.db.clone())
        .latest()
        .await
        .unwrap()
        .version
}

#[tokio::test]
async fn test_node_group_publishes_enabled_sub_ips_only() {
    let h = Harness::new().await;
    let zone_id = seed_zone(&h.db, "example.com").await;
    let (_, sub_ips) = seed_node(
        &h.db,
        &[("10.0.0.1", true), ("10.0.0.2", true), ("10.0.0.3", false)],
    )
    .await;

    let before = version(&h).await;
    let group = h
        .topology
        .create_node_group("edge-eu", zone_id, &sub_ips)
        .await
        .unwrap();

    assert_eq!(group.cname_prefix.len(), 8);
    assert_eq!(group.cname, format!("{}.example.com", group.cname_prefix));

    let records = h
        .db
        .find_records_by_owner(Owner::NodeGroup(group.id))
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.record_type, RecordType::A);
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.name, group.cname_prefix);
        assert_eq!(record.ttl, 120);
        assert!(!record.proxied);
    }
    let mut values: Vec<&str> = records.iter().map(|r| r.value.as_str()).collect();
    values.sort();
    assert_eq!(values, vec!["10.0.0.1", "10.0.0.2"]);

    // All three stay linked; the disabled one just gets no record
    assert_eq!(h.db.node_group_sub_ips(group.id).await.unwrap().len(), 3);
    assert_eq!(version(&h).await, before + 1);
}

#[tokio::test]
async fn test_unknown_sub_ip_rolls_back() {
    let h = Harness::new().await;
    let zone_id = seed_zone(&h.db, "example.com").await;
    let (_, sub_ips) = seed_node(&h.db, &[("10.0.0.1", true)]).await;

    let err = h
        .topology
        .create_node_group("edge-eu", zone_id, &[sub_ips[0], 999])
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)));

    assert!(h.db.list_node_groups().await.unwrap().is_empty());
    assert_eq!(version(&h).await, 0);
}

#[tokio::test]
async fn test_node_group_in_unknown_zone() {
    let h = Harness::new().await;
    let err = h
        .topology
        .create_node_group("edge-eu", 42, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::NotFound(_)));
}

#[tokio::test]
async fn test_update_sub_ips_replaces_records() {
    let h = Harness::new().await;
    let zone_id = seed_zone(&h.db, "example.com").await;
    let (_, sub_ips) = seed_node(&h.db, &[("10.0.0.1", true), ("10.0.0.2", true)]).await;

    let group = h
        .topology
        .create_node_group("edge-eu", zone_id, &sub_ips)
        .await
        .unwrap();
    h.sync().await;

    h.topology
        .update_node_group_sub_ips(group.id, &sub_ips[..1])
        .await
        .unwrap();

    let records = h
        .db
        .find_records_by_owner(Owner::NodeGroup(group.id))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, "10.0.0.1");
    assert_eq!(records[0].status, RecordStatus::Pending);
    assert!(records[0].provider_record_id.is_none());

    // Both previously synced provider records are removed after commit
    assert_eq!(h.provider.deleted().len(), 2);
    assert_eq!(h.db.node_group_sub_ips(group.id).await.unwrap().len(), 1);
    assert_eq!(version(&h).await, 2);
}

#[tokio::test]
async fn test_line_group_points_at_node_group() {
    let h = Harness::new().await;
    let zone_id = seed_zone(&h.db, "example.com").await;
    let (_, sub_ips) = seed_node(&h.db, &[("10.0.0.1", true)]).await;

    let node_group = h
        .topology
        .create_node_group("edge-eu", zone_id, &sub_ips)
        .await
        .unwrap();
    let line_group = h
        .topology
        .create_line_group("default", zone_id, node_group.id)
        .await
        .unwrap();

    assert_eq!(line_group.node_group_id, node_group.id);
    assert_ne!(line_group.cname, node_group.cname);

    let records = h
        .db
        .find_records_by_owner(Owner::LineGroup(line_group.id))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record_type, RecordType::Cname);
    assert_eq!(records[0].name, line_group.cname_prefix);
    assert_eq!(records[0].value, node_group.cname);
}

#[tokio::test]
async fn test_delete_refused_while_referenced() {
    let h = Harness::new().await;
    let zone_id = seed_zone(&h.db, "example.com").await;
    let (_, sub_ips) = seed_node(&h.db, &[("10.0.0.1", true)]).await;

    let node_group = h
        .topology
        .create_node_group("edge-eu", zone_id, &sub_ips)
        .await
        .unwrap();
    let line_group = h
        .topology
        .create_line_group("default", zone_id, node_group.id)
        .await
        .unwrap();
    let (site, _) = h
        .topology
        .create_website(line_group.id, &["www.example.com".to_string()])
        .await
        .unwrap();

    let err = h.topology.delete_node_group(node_group.id).await.unwrap_err();
    assert!(matches!(err, ControlError::Conflict(_)));
    let err = h.topology.delete_line_group(line_group.id).await.unwrap_err();
    assert!(matches!(err, ControlError::Conflict(_)));

    h.topology.delete_website(site.id).await.unwrap();
    h.topology.delete_line_group(line_group.id).await.unwrap();
    h.topology.delete_node_group(node_group.id).await.unwrap();

    assert!(h.db.list_node_groups().await.unwrap().is_empty());
    assert!(h
        .db
        .find_records_by_owner(Owner::NodeGroup(node_group.id))
        .await
        .unwrap()
        .is_empty());
    assert!(h
        .db
        .find_records_by_owner(Owner::LineGroup(line_group.id))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_website_domains_use_longest_zone() {
    let h = Harness::new().await;
    let parent = seed_zone(&h.db, "example.com").await;
    let child = seed_zone(&h.db, "sub.example.com").await;
    let (_, sub_ips) = seed_node(&h.db, &[("10.0.0.1", true)]).await;

    let node_group = h
        .topology
        .create_node_group("edge-eu", parent, &sub_ips)
        .await
        .unwrap();
    let line_group = h
        .topology
        .create_line_group("default", parent, node_group.id)
        .await
        .unwrap();

    let (site, domains) = h
        .topology
        .create_website(
            line_group.id,
            &[
                "WWW.Sub.Example.com.".to_string(),
                "example.com".to_string(),
                "www.sub.example.com".to_string(),
            ],
        )
        .await
        .unwrap();

    // Normalised and de-duplicated, first one primary
    assert_eq!(domains.len(), 2);
    assert_eq!(domains[0].domain, "www.sub.example.com");
    assert!(domains[0].is_primary);
    assert!(!domains[1].is_primary);
    assert_eq!(domains[0].cname, line_group.cname);

    let first = h
        .db
        .find_records_by_owner(Owner::WebsiteDomain(domains[0].id))
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].domain_id, child);
    assert_eq!(first[0].name, "www");
    assert_eq!(first[0].value, line_group.cname);

    let apex = h
        .db
        .find_records_by_owner(Owner::WebsiteDomain(domains[1].id))
        .await
        .unwrap();
    assert_eq!(apex[0].domain_id, parent);
    assert_eq!(apex[0].name, "@");

    assert_eq!(h.db.website_domains(site.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_website_domain_outside_zones_writes_nothing() {
    let h = Harness::new().await;
    let zone_id = seed_zone(&h.db, "example.com").await;
    let node_group = h
        .topology
        .create_node_group("edge-eu", zone_id, &[])
        .await
        .unwrap();
    let line_group = h
        .topology
        .create_line_group("default", zone_id, node_group.id)
        .await
        .unwrap();
    let before = version(&h).await;

    let err = h
        .topology
        .create_website(
            line_group.id,
            &["www.example.com".to_string(), "shop.other.com".to_string()],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)));

    assert!(h.db.list_websites().await.unwrap().is_empty());
    assert!(h
        .db
        .find_website_domain_by_name("www.example.com")
        .await
        .unwrap()
        .is_none());
    assert_eq!(version(&h).await, before);
}

#[tokio::test]
async fn test_domain_served_twice_conflicts() {
    let h = Harness::new().await;
    let zone_id = seed_zone(&h.db, "example.com").await;
    let node_group = h
        .topology
        .create_node_group("edge-eu", zone_id, &[])
        .await
        .unwrap();
    let line_group = h
        .topology
        .create_line_group("default", zone_id, node_group.id)
        .await
        .unwrap();

    h.topology
        .create_website(line_group.id, &["www.example.com".to_string()])
        .await
        .unwrap();
    let err = h
        .topology
        .create_website(line_group.id, &["www.example.com".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Conflict(_)));
}

#[tokio::test]
async fn test_add_and_remove_domain() {
    let h = Harness::new().await;
    let zone_id = seed_zone(&h.db, "example.com").await;
    let node_group = h
        .topology
        .create_node_group("edge-eu", zone_id, &[])
        .await
        .unwrap();
    let line_group = h
        .topology
        .create_line_group("default", zone_id, node_group.id)
        .await
        .unwrap();
    let (site, _) = h
        .topology
        .create_website(line_group.id, &["www.example.com".to_string()])
        .await
        .unwrap();

    let added = h
        .topology
        .add_website_domain(site.id, "shop.example.com")
        .await
        .unwrap();
    assert!(!added.is_primary);
    h.sync().await;

    h.topology
        .remove_website_domain(site.id, "shop.example.com")
        .await
        .unwrap();
    assert!(h
        .db
        .find_records_by_owner(Owner::WebsiteDomain(added.id))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(h.provider.deleted().len(), 1);

    let err = h
        .topology
        .remove_website_domain(site.id, "shop.example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::NotFound(_)));

    let (history, _) = ConfigLedger::new(h.db.clone()).history(0, 2).await.unwrap();
    assert_eq!(history[0].reason, format!("website:remove_domain:{}", site.id));
    assert_eq!(history[1].reason, format!("website:add_domain:{}", site.id));
}

#[tokio::test]
async fn test_delete_website_drops_binding() {
    let h = Harness::new().await;
    let zone_id = seed_zone(&h.db, "example.com").await;
    let node_group = h
        .topology
        .create_node_group("edge-eu", zone_id, &[])
        .await
        .unwrap();
    let line_group = h
        .topology
        .create_line_group("default", zone_id, node_group.id)
        .await
        .unwrap();
    let (site, domains) = h
        .topology
        .create_website(line_group.id, &["www.example.com".to_string()])
        .await
        .unwrap();

    let now = Utc::now();
    let certificate = h
        .db
        .insert_certificate(
            NewCertificate {
                provider: "manual".to_string(),
                source: CertificateSource::Manual,
                acme_account_id: None,
                fingerprint: "ab".repeat(32),
                issue_at: now,
                expire_at: now + Duration::days(90),
                renew_mode: RenewMode::Manual,
                renew_at: None,
                certificate_pem: "cert".to_string(),
                private_key_pem: "key".to_string(),
            },
            &["www.example.com".to_string()],
        )
        .await
        .unwrap();
    h.db.insert_binding(certificate.id, BindType::Website, site.id)
        .await
        .unwrap();

    h.topology.delete_website(site.id).await.unwrap();

    assert!(h.db.find_website(site.id).await.unwrap().is_none());
    assert!(h
        .db
        .find_records_by_owner(Owner::WebsiteDomain(domains[0].id))
        .await
        .unwrap()
        .is_empty());
    assert!(h
        .db
        .active_binding(BindType::Website, site.id)
        .await
        .unwrap()
        .is_none());
}
