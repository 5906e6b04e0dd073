//! GET tests against the loopback agent.

mod common;

use common::{COMMUNITY, FAST_TIMEOUT, TestAgent, nonexistent_oid, sys_descr, sys_name, syno_system};
use syno_snmp::{Client, Error, ErrorStatus, PduType, Value, Version, oid};

#[tokio::test]
async fn v2c_get_returns_values_in_order() {
    let agent = TestAgent::new().await;
    let mut client = Client::v2c(agent.addr().to_string())
        .community(COMMUNITY)
        .connect()
        .await
        .unwrap();

    let results = client
        .get(&[sys_name(), syno_system().child(2).child(0), sys_descr()])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].value.as_str(), Some("diskstation"));
    assert_eq!(results[1].value, Value::Integer(41));
    assert!(results[2].value.as_str().unwrap().starts_with("Linux DS918"));
}

#[tokio::test]
async fn v2c_missing_object_is_a_value_not_an_error() {
    let agent = TestAgent::new().await;
    let mut client = Client::v2c(agent.addr().to_string()).connect().await.unwrap();
    let results = client.get(&[nonexistent_oid()]).await.unwrap();
    assert_eq!(results[0].value, Value::NoSuchObject);
}

#[tokio::test]
async fn v1_missing_object_is_no_such_name() {
    let agent = TestAgent::new().await;
    let mut client = Client::v1(agent.addr().to_string()).connect().await.unwrap();
    let err = client.get(&[sys_name(), nonexistent_oid()]).await.unwrap_err();
    match err {
        Error::Snmp { status, index, oid, .. } => {
            assert_eq!(status, ErrorStatus::NoSuchName);
            assert_eq!(index, 2);
            assert_eq!(oid, Some(nonexistent_oid()));
        }
        other => panic!("expected Snmp error, got {other:?}"),
    }
}

#[tokio::test]
async fn requests_carry_version_and_community() {
    let agent = TestAgent::builder().community(b"s3cret").start().await;
    let mut client = Client::v1(agent.addr().to_string())
        .community(b"s3cret")
        .connect()
        .await
        .unwrap();
    client.get(&[sys_name()]).await.unwrap();

    let requests = agent.community_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].version, Version::V1);
    assert_eq!(&requests[0].community[..], b"s3cret");
    assert_eq!(requests[0].pdu.pdu_type, PduType::GetRequest);
    assert!(requests[0].pdu.request_id > 0);
}

#[tokio::test]
async fn wrong_community_times_out() {
    let agent = TestAgent::new().await;
    let mut client = Client::v2c(agent.addr().to_string())
        .community(b"private")
        .timeout(FAST_TIMEOUT)
        .retries(1)
        .connect()
        .await
        .unwrap();
    let err = client.get(&[sys_name()]).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { attempts: 2, .. }), "{err:?}");
    assert_eq!(agent.request_count(), 2);
    assert_eq!(agent.answered(), 0);
}

#[tokio::test]
async fn long_oid_lists_are_batched() {
    let agent = TestAgent::new().await;
    let mut client = Client::v2c(agent.addr().to_string())
        .max_oids_per_request(3)
        .connect()
        .await
        .unwrap();

    let base = oid!(1, 3, 6, 1, 4, 1, 2021, 4);
    let oids: Vec<_> = [3, 4, 5, 6, 11, 13, 14, 15]
        .into_iter()
        .map(|arc| base.child(arc).child(0))
        .collect();
    let results = client.get(&oids).await.unwrap();

    assert_eq!(results.len(), 8);
    for (vb, oid) in results.iter().zip(&oids) {
        assert_eq!(&vb.oid, oid);
    }
    assert_eq!(agent.request_count(), 3);
}

#[tokio::test]
async fn get_map_uses_caller_identifiers() {
    let agent = TestAgent::new().await;
    let mut client = Client::v1(agent.addr().to_string()).connect().await.unwrap();
    let values = client
        .get_map(&[".1.3.6.1.4.1.6574.1.2.0", "1.3.6.1.2.1.1.5.0"])
        .await
        .unwrap();
    assert_eq!(values[".1.3.6.1.4.1.6574.1.2.0"], Value::Integer(41));
    assert_eq!(values["1.3.6.1.2.1.1.5.0"].as_str(), Some("diskstation"));
}

#[tokio::test]
async fn target_without_port_defaults_to_161() {
    let client = Client::v2c("127.0.0.1").connect().await.unwrap();
    assert_eq!(client.peer_addr().port(), 161);
}
