//! Forwarding to an HTTPS origin and reporting its TLS session.

use api_relay::error::ProxyError;
use api_relay::forward::RequestDescriptor;

mod common;

use common::{forwarder, response, start_tls_origin, test_config};

#[tokio::test]
async fn tls_details_are_reported() {
    let origin = start_tls_origin(|_| response("200 OK", &[("Content-Type", "text/plain")], "secure")).await;

    let envelope = forwarder(&test_config())
        .forward(RequestDescriptor::new("GET", &origin.tls_url("/")))
        .await
        .unwrap();

    assert_eq!(envelope.response.status, 200);
    assert_eq!(envelope.response.body.content, b"secure");

    let network = &envelope.response.meta.network;
    assert_eq!(network.http_version, "1.1");
    assert_eq!(network.tls_protocol.as_deref(), Some("TLSv1.3"));
    assert!(network.cipher_name.as_deref().is_some_and(|c| c.starts_with("TLS13_")));

    let cert = network.certificate.as_ref().expect("certificate summary");
    assert_eq!(cert.cn.as_deref(), Some("localhost"));
    assert_eq!(cert.issuer.as_deref(), Some("Relay Test CA"));
    assert_eq!(cert.valid_until.as_deref(), Some("Sep 25 14:06:24 2126 GMT"));

    assert!(envelope.response.meta.timings.tls > 0.0);
}

#[tokio::test]
async fn untrusted_certificate_is_a_tls_error() {
    let origin = start_tls_origin(|_| response("200 OK", &[], "")).await;
    let mut config = test_config();
    config.forwarding.extra_root_certs.clear();

    let err = forwarder(&config)
        .forward(RequestDescriptor::new("GET", &origin.tls_url("/")))
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::Tls { .. }), "{err:?}");
}
