// Shared TCP+TLS dialing for both protocol channels.
//
// The config (ACI) and command (Host Command) clients both speak raw
// TCP, optionally wrapped in TLS. Controllers ship self-signed
// certificates, so certificate verification is off by default.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::error::Error;

/// TLS certificate verification mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Full verification against the system webpki roots.
    Strict,
    /// Verify the certificate chain, but not the hostname. Useful when
    /// connecting to a controller by IP with a CA-issued certificate.
    SkipHostnameVerify,
    /// Accept any certificate. Default -- controllers ship self-signed.
    #[default]
    DangerAcceptInvalid,
}

/// Transport configuration shared by both channels.
///
/// `tls: None` disables TLS entirely; callers then dial the plaintext
/// fallback port for their service.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: Option<TlsMode>,
    pub conn_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: Some(TlsMode::default()),
            conn_timeout: Duration::from_secs(5),
        }
    }
}

impl TransportConfig {
    /// Pick the service port: `secure` when TLS is enabled, `plain` otherwise.
    pub fn service_port(&self, secure: u16, plain: u16) -> u16 {
        if self.tls.is_some() {
            secure
        } else {
            plain
        }
    }
}

// ── Stream ───────────────────────────────────────────────────────────

/// A connected socket, plaintext or TLS.
pub struct Stream {
    inner: StreamInner,
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

enum StreamInner {
    Tcp(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            StreamInner::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            StreamInner::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().inner {
            StreamInner::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            StreamInner::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            StreamInner::Tcp(s) => Pin::new(s).poll_flush(cx),
            StreamInner::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            StreamInner::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            StreamInner::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

// ── Dialing ──────────────────────────────────────────────────────────

/// Dial `host:port`, performing the TLS handshake if configured.
///
/// Connection failures are tagged by phase: DNS resolution, TCP
/// connect, and TLS handshake each produce a distinct error.
pub async fn connect(host: &str, port: u16, config: &TransportConfig) -> Result<Stream, Error> {
    let addr = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::Dns {
            host: host.to_string(),
            message: e.to_string(),
        })?
        .next()
        .ok_or_else(|| Error::Dns {
            host: host.to_string(),
            message: "no addresses returned".into(),
        })?;

    let tcp = tokio::time::timeout(config.conn_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::Connect {
            host: host.to_string(),
            port,
            message: format!("connection timed out after {:?}", config.conn_timeout),
        })?
        .map_err(|e| Error::Connect {
            host: host.to_string(),
            port,
            message: e.to_string(),
        })?;

    let Some(mode) = &config.tls else {
        return Ok(Stream {
            inner: StreamInner::Tcp(tcp),
        });
    };

    let tls_config = client_config(mode).map_err(|e| Error::TlsHandshake {
        host: host.to_string(),
        message: e,
    })?;

    // Controllers are usually addressed by IP; ServerName supports both.
    let server_name = ServerName::try_from(host.to_string()).map_err(|e| Error::TlsHandshake {
        host: host.to_string(),
        message: format!("invalid server name: {e}"),
    })?;

    let connector = TlsConnector::from(Arc::new(tls_config));
    let tls = tokio::time::timeout(config.conn_timeout, connector.connect(server_name, tcp))
        .await
        .map_err(|_| Error::TlsHandshake {
            host: host.to_string(),
            message: "handshake timed out".into(),
        })?
        .map_err(|e| Error::TlsHandshake {
            host: host.to_string(),
            message: e.to_string(),
        })?;

    Ok(Stream {
        inner: StreamInner::Tls(Box::new(tls)),
    })
}

fn client_config(mode: &TlsMode) -> Result<ClientConfig, String> {
    let roots = || {
        let mut store = RootCertStore::empty();
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Arc::new(store)
    };

    let config = match mode {
        TlsMode::Strict => ClientConfig::builder()
            .with_root_certificates(roots())
            .with_no_client_auth(),
        TlsMode::SkipHostnameVerify => {
            let provider = Arc::new(rustls::crypto::ring::default_provider());
            let inner = WebPkiServerVerifier::builder_with_provider(roots(), provider)
                .build()
                .map_err(|e| format!("failed to build certificate verifier: {e}"))?;
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipHostnameVerification(inner)))
                .with_no_client_auth()
        }
        TlsMode::DangerAcceptInvalid => ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(NoVerification::new())
            .with_no_client_auth(),
    };

    Ok(config)
}

// ── Certificate verifiers ────────────────────────────────────────────

/// Accepts any server certificate. Signature checks on the handshake
/// itself still run, so a broken peer is rejected.
#[derive(Debug)]
struct NoVerification(Arc<CryptoProvider>);

impl NoVerification {
    fn new() -> Arc<Self> {
        Arc::new(Self(Arc::new(rustls::crypto::ring::default_provider())))
    }
}

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Verifies the certificate chain but tolerates a hostname mismatch.
#[derive(Debug)]
struct SkipHostnameVerification(Arc<WebPkiServerVerifier>);

impl ServerCertVerifier for SkipHostnameVerification {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self
            .0
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName
                | CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.0.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.0.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.supported_verify_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_accepts_invalid_certs() {
        assert_eq!(TlsMode::default(), TlsMode::DangerAcceptInvalid);
    }

    #[test]
    fn service_port_follows_tls_setting() {
        let secure = TransportConfig::default();
        assert_eq!(secure.service_port(2010, 2001), 2010);

        let plain = TransportConfig {
            tls: None,
            ..TransportConfig::default()
        };
        assert_eq!(plain.service_port(2010, 2001), 2001);
    }

    #[tokio::test]
    async fn connect_reports_dns_failure() {
        let config = TransportConfig {
            tls: None,
            conn_timeout: Duration::from_millis(500),
        };
        let err = connect("host.invalid.", 3001, &config).await.unwrap_err();
        assert!(matches!(err, Error::Dns { .. }), "got: {err:?}");
    }
}
