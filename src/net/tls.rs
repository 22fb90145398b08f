//! TLS configuration: client side for origins, server side for the listener.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::{ClientConfig, RootCertStore};

/// ALPN identifiers offered to origins.
const ALPN_H2: &[u8] = b"h2";
const ALPN_HTTP11: &[u8] = b"http/1.1";

/// Build the client config used for every encrypted hop.
///
/// Trusts the webpki roots plus every certificate found in `extra_roots`.
pub fn client_config(extra_roots: &[String], http2: bool) -> Result<Arc<ClientConfig>, std::io::Error> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    for path in extra_roots {
        let file = File::open(path).map_err(|e| {
            std::io::Error::new(e.kind(), format!("Root bundle {path} unreadable: {e}"))
        })?;
        let mut added = 0usize;
        for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
            roots
                .add(cert?)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            added += 1;
        }
        tracing::info!(path = %path, certificates = added, "Loaded extra trust roots");
    }

    let mut config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = if http2 {
        vec![ALPN_H2.to_vec(), ALPN_HTTP11.to_vec()]
    } else {
        vec![ALPN_HTTP11.to_vec()]
    };

    Ok(Arc::new(config))
}

/// Whether the negotiated ALPN protocol is HTTP/2.
pub fn is_h2(alpn: Option<&[u8]>) -> bool {
    alpn == Some(ALPN_H2)
}

/// Load the listener's certificate and key for serving the relay over HTTPS.
pub async fn listener_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    for (what, path) in [("Certificate", cert_path), ("Private key", key_path)] {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{what} file not found: {}", path.display()),
            ));
        }
    }
    RustlsConfig::from_pem_file(cert_path, key_path).await
}
