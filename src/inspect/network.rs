//! Connection and TLS metadata for the envelope.

use std::net::SocketAddr;

use chrono::DateTime;
use rustls::pki_types::CertificateDer;
use rustls::{ClientConnection, ProtocolVersion};
use serde::Serialize;

/// Facts captured from the final hop's socket.
#[derive(Debug, Clone, Default)]
pub struct ConnectionDetails {
    pub local: Option<SocketAddr>,
    pub remote: Option<SocketAddr>,
    /// `None` on plaintext connections.
    pub tls: Option<TlsDetails>,
}

/// Negotiated session parameters of an encrypted connection.
#[derive(Debug, Clone, Default)]
pub struct TlsDetails {
    pub protocol: Option<String>,
    pub cipher: Option<String>,
    /// DER of the peer's end-entity certificate.
    pub peer_certificate: Option<CertificateDer<'static>>,
}

impl TlsDetails {
    /// Snapshot a client session after its handshake completed.
    pub fn capture(conn: &ClientConnection) -> Self {
        Self {
            protocol: conn.protocol_version().map(protocol_name),
            cipher: conn
                .negotiated_cipher_suite()
                .map(|suite| format!("{:?}", suite.suite())),
            peer_certificate: conn
                .peer_certificates()
                .and_then(|chain| chain.first())
                .map(|cert| cert.clone().into_owned()),
        }
    }
}

fn protocol_name(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        ProtocolVersion::TLSv1_1 => "TLSv1.1".to_string(),
        ProtocolVersion::TLSv1_0 => "TLSv1".to_string(),
        other => format!("{other:?}"),
    }
}

/// Peer certificate summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    pub cn: Option<String>,
    pub issuer: Option<String>,
    /// Expiry in OpenSSL's text form, e.g. `Mar 10 23:59:59 2026 GMT`.
    pub valid_until: Option<String>,
}

impl CertificateSummary {
    /// Summarize a DER certificate; `None` when it cannot be parsed or has
    /// an empty subject.
    pub fn from_der(der: &[u8]) -> Option<Self> {
        let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
        if cert.subject().iter().next().is_none() {
            return None;
        }

        let cn = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);
        let issuer = cert
            .issuer()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);
        let valid_until = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .map(|t| t.format("%b %e %H:%M:%S %Y GMT").to_string());

        Some(Self {
            cn,
            issuer,
            valid_until,
        })
    }
}

/// Transport facts reported in `meta.network`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub http_version: String,
    pub local_address: String,
    pub remote_address: String,
    pub tls_protocol: Option<String>,
    pub cipher_name: Option<String>,
    pub certificate: Option<CertificateSummary>,
}

/// Build the network block. TLS fields stay `null` unless the connection was
/// encrypted; `certificate` is also `null` when no subject is available.
pub fn get_network_info(connection: &ConnectionDetails, http_version: &str) -> NetworkInfo {
    let mut info = NetworkInfo {
        http_version: http_version.to_string(),
        local_address: connection.local.map(|a| a.ip().to_string()).unwrap_or_default(),
        remote_address: connection.remote.map(|a| a.ip().to_string()).unwrap_or_default(),
        tls_protocol: None,
        cipher_name: None,
        certificate: None,
    };

    let Some(tls) = &connection.tls else {
        return info;
    };
    info.tls_protocol = tls.protocol.clone();
    info.cipher_name = tls.cipher.clone();
    info.certificate = tls
        .peer_certificate
        .as_ref()
        .and_then(|der| CertificateSummary::from_der(der));
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN_PEM: &[u8] = include_bytes!("../../tests/fixtures/origin.pem");

    fn origin_der() -> CertificateDer<'static> {
        rustls_pemfile::certs(&mut &ORIGIN_PEM[..])
            .next()
            .unwrap()
            .unwrap()
    }

    fn addrs() -> ConnectionDetails {
        ConnectionDetails {
            local: Some("127.0.0.1:50000".parse().unwrap()),
            remote: Some("127.0.0.1:443".parse().unwrap()),
            tls: None,
        }
    }

    #[test]
    fn plaintext_has_no_tls_fields() {
        let info = get_network_info(&addrs(), "1.1");
        assert_eq!(info.http_version, "1.1");
        assert_eq!(info.local_address, "127.0.0.1");
        assert_eq!(info.remote_address, "127.0.0.1");
        assert!(info.tls_protocol.is_none());
        assert!(info.cipher_name.is_none());
        assert!(info.certificate.is_none());

        let json = serde_json::to_value(&info).unwrap();
        assert!(json["tlsProtocol"].is_null());
        assert!(json["certificate"].is_null());
    }

    #[test]
    fn encrypted_connection_reports_session_and_certificate() {
        let mut details = addrs();
        details.tls = Some(TlsDetails {
            protocol: Some("TLSv1.3".into()),
            cipher: Some("TLS13_AES_128_GCM_SHA256".into()),
            peer_certificate: Some(origin_der()),
        });

        let info = get_network_info(&details, "1.1");
        assert_eq!(info.tls_protocol.as_deref(), Some("TLSv1.3"));
        assert_eq!(info.cipher_name.as_deref(), Some("TLS13_AES_128_GCM_SHA256"));
        let cert = info.certificate.unwrap();
        assert_eq!(cert.cn.as_deref(), Some("localhost"));
        assert_eq!(cert.issuer.as_deref(), Some("Relay Test CA"));
        assert_eq!(cert.valid_until.as_deref(), Some("Sep 25 14:06:24 2126 GMT"));
    }

    #[test]
    fn unparseable_certificate_is_null() {
        let mut details = addrs();
        details.tls = Some(TlsDetails {
            protocol: Some("TLSv1.2".into()),
            cipher: None,
            peer_certificate: Some(CertificateDer::from(vec![0x30, 0x00])),
        });

        let info = get_network_info(&details, "1.1");
        assert_eq!(info.tls_protocol.as_deref(), Some("TLSv1.2"));
        assert!(info.certificate.is_none());
    }
}
