use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::connect_info::Connected,
    serve::{IncomingStream, Listener},
    Router,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::Duration;
use tokio_rustls::{server::TlsStream, TlsAcceptor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::{AppConfig, ApiTlsConfig},
    errors::Error,
    utils::certificates::{load_certificate_bundle, CertificateInfo},
};

use super::routes::{build_redirect_router, build_router, ApiState};

/// Clients that connect but do not finish the TLS handshake within this window are dropped.
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Peer address of an accepted connection, on both the plain and the TLS listener.
///
/// Extract it with `ConnectInfo<ClientAddr>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

impl Connected<IncomingStream<'_, TcpListener>> for ClientAddr {
    fn connect_info(stream: IncomingStream<'_, TcpListener>) -> Self {
        Self(*stream.remote_addr())
    }
}

impl Connected<IncomingStream<'_, TlsListener>> for ClientAddr {
    fn connect_info(stream: IncomingStream<'_, TlsListener>) -> Self {
        Self(*stream.remote_addr())
    }
}

/// Run the configured listeners until `shutdown` is cancelled or one of them fails.
///
/// With both listeners configured and redirect enabled, the HTTP listener only answers
/// with redirects to the HTTPS listener.
pub async fn start_api_server(
    config: &AppConfig,
    state: ApiState,
    shutdown: CancellationToken,
) -> crate::Result<()> {
    let server = &config.server;
    let mut servers = JoinSet::new();

    if let Some(https_addr) = server.https_address {
        let tls = server
            .tls
            .as_ref()
            .ok_or_else(|| Error::config("HTTPS listener requires TLS certificate and key paths"))?;
        let (acceptor, certificate_info) = configure_tls_acceptor(tls)?;
        let listener = bind(https_addr).await?;

        info!(
            address = %https_addr,
            subject = %certificate_info.subject,
            expires_at = %certificate_info.not_after,
            "Starting HTTPS server"
        );
        let router = build_router(state.clone(), config);
        servers.spawn(run_tls_server(listener, acceptor, router, shutdown.clone()));
    }

    if let Some(http_addr) = server.http_address {
        let listener = bind(http_addr).await?;
        let router = match (server.https_redirect, server.https_address) {
            (true, Some(https_addr)) => {
                info!(address = %http_addr, https_port = https_addr.port(), "Starting HTTP redirect server");
                build_redirect_router(https_addr.port(), server.request_timeout)
            }
            _ => {
                info!(address = %http_addr, "Starting HTTP server");
                build_router(state.clone(), config)
            }
        };
        servers.spawn(run_http_server(listener, router, shutdown.clone()));
    }

    if servers.is_empty() {
        return Err(Error::config("No HTTP or HTTPS listener configured"));
    }

    let mut result = Ok(());
    while let Some(joined) = servers.join_next().await {
        let outcome = joined.map_err(|e| Error::internal(format!("Server task failed: {e}")))?;
        if let Err(e) = outcome {
            error!(error = %e, "Listener stopped with an error; shutting down");
            shutdown.cancel();
            if result.is_ok() {
                result = Err(e);
            }
        }
    }

    info!("API server shutdown completed");
    result
}

/// Cancel the returned token on Ctrl-C.
pub fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!(error = %e, "Shutdown listener failed"),
        }
        trigger.cancel();
    });
    token
}

async fn bind(addr: SocketAddr) -> crate::Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::transport(format!("Failed to bind {addr}: {e}")))
}

async fn run_http_server(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> crate::Result<()> {
    axum::serve(listener, router.into_make_service_with_connect_info::<ClientAddr>())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| Error::transport(format!("HTTP server error: {}", e)))
}

async fn run_tls_server(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
    shutdown: CancellationToken,
) -> crate::Result<()> {
    let tls_listener = TlsListener::new(listener, acceptor);
    axum::serve(tls_listener, router.into_make_service_with_connect_info::<ClientAddr>())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| Error::transport(format!("HTTPS server error: {}", e)))
}

pub(crate) fn configure_tls_acceptor(
    tls: &ApiTlsConfig,
) -> crate::Result<(TlsAcceptor, CertificateInfo)> {
    let bundle = load_certificate_bundle(tls.cert_path.as_path(), tls.key_path.as_path())?;

    let provider = rustls::crypto::ring::default_provider();
    let builder = rustls::ServerConfig::builder_with_provider(provider.into())
        .with_safe_default_protocol_versions()
        .map_err(|err| Error::config(format!("Invalid TLS protocol configuration: {err}")))?;

    let mut server_config = builder
        .with_no_client_auth()
        .with_single_cert(bundle.chain(), bundle.private_key.clone_key())
        .map_err(crate::errors::TlsError::from)?;
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok((TlsAcceptor::from(Arc::new(server_config)), bundle.info))
}

/// TCP listener that yields connections once their TLS handshake has completed.
///
/// Handshakes run in their own tasks, each bounded by a timeout, so a client that never
/// sends a ClientHello cannot hold up other connections.
pub struct TlsListener {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    handshake_timeout: Duration,
    handshakes: JoinSet<Option<(TlsStream<TcpStream>, SocketAddr)>>,
}

impl TlsListener {
    pub fn new(listener: TcpListener, acceptor: TlsAcceptor) -> Self {
        Self { listener, acceptor, handshake_timeout: TLS_HANDSHAKE_TIMEOUT, handshakes: JoinSet::new() }
    }

    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }
}

async fn handshake(
    acceptor: TlsAcceptor,
    stream: TcpStream,
    addr: SocketAddr,
    limit: Duration,
) -> Option<(TlsStream<TcpStream>, SocketAddr)> {
    match tokio::time::timeout(limit, acceptor.accept(stream)).await {
        Ok(Ok(tls_stream)) => Some((tls_stream, addr)),
        Ok(Err(err)) => {
            warn!(error = %err, %addr, "TLS handshake failed");
            None
        }
        Err(_) => {
            debug!(%addr, timeout_ms = limit.as_millis() as u64, "TLS handshake timed out");
            None
        }
    }
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        self.handshakes.spawn(handshake(
                            self.acceptor.clone(),
                            stream,
                            addr,
                            self.handshake_timeout,
                        ));
                    }
                    Err(err) => {
                        if !is_connection_error(&err) {
                            error!("HTTPS accept error: {err}");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                },
                Some(joined) = self.handshakes.join_next() => match joined {
                    Ok(Some(connection)) => return connection,
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "TLS handshake task failed"),
                },
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        self.listener.local_addr()
    }
}

fn is_connection_error(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
    )
}
