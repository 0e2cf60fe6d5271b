//! Running a provider as a plugin process.
//!
//! [`serve`] checks that the process was started by a plugin host, binds a
//! local port, prints the handshake line to stdout and serves the plugin
//! protocol until the process receives SIGTERM or SIGINT.
//!
//! # Host compatibility
//!
//! The handshake uses the same magic cookie and protocol number (5) as
//! Terraform's plugin handshake, but the gRPC service is `tfplugin.Provider`
//! as defined in `proto/tfplugin.proto`. It carries a reduced RPC set and
//! JSON-only values. A host must speak that service. Terraform itself will
//! complete the handshake and then fail on the first call.
//!
//! # Shutdown
//!
//! On SIGTERM or SIGINT the listener closes, in-flight calls get
//! [`ServeOptions::shutdown_timeout`] to finish, and then
//! [`Provider::stop`] runs. The host usually kills the plugin itself, so
//! this path mostly matters when a developer runs the binary by hand.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tonic::transport::Server as TransportServer;
use tracing::{debug, error, info, warn};

use crate::error::ProviderError;
use crate::grpc::ProviderGrpcService;
use crate::provider::Provider;
use crate::server::Server;

/// Environment variable the host sets to prove it launched the plugin.
///
/// Shared with Terraform's handshake; see the module docs on compatibility.
pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";

/// Expected value of [`MAGIC_COOKIE_KEY`].
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

/// Version of the plugin handshake itself.
pub const CORE_PROTOCOL_VERSION: u32 = 1;

/// Version of the provider protocol served.
pub const PROTOCOL_VERSION: u32 = 5;

/// Settings for [`serve_with_options`] and [`serve_on_with_options`].
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight calls may run after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
    /// Refuse to start unless the host's magic cookie is present.
    /// Default: true.
    pub check_magic_cookie: bool,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
            check_magic_cookie: true,
        }
    }
}

impl ServeOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Change how long shutdown waits for in-flight calls.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Skip the magic cookie check, for running the binary by hand while
    /// debugging.
    pub fn without_magic_cookie(mut self) -> Self {
        self.check_magic_cookie = false;
        self
    }
}

/// The line printed to stdout once the server is listening.
pub fn handshake_line(addr: SocketAddr) -> String {
    format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, PROTOCOL_VERSION, addr
    )
}

/// Check that the process was launched by a plugin host.
pub fn check_magic_cookie(options: &ServeOptions) -> Result<(), ProviderError> {
    if !options.check_magic_cookie {
        return Ok(());
    }
    cookie_matches(std::env::var(MAGIC_COOKIE_KEY).ok().as_deref())
}

fn cookie_matches(value: Option<&str>) -> Result<(), ProviderError> {
    match value {
        Some(MAGIC_COOKIE_VALUE) => Ok(()),
        _ => Err(ProviderError::NotPlugin),
    }
}

/// Resolve on SIGTERM or SIGINT (CTRL+C on Windows).
///
/// If the handlers cannot be installed the error is logged and this never
/// returns.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
                    _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "Failed to install signal handlers");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(windows)]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received CTRL+C, initiating graceful shutdown"),
            Err(e) => {
                error!(error = %e, "Failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::future::pending::<()>().await;
    }
}

/// Run `provider` as a plugin process until a shutdown signal arrives.
///
/// Refuses to start without the host's magic cookie. Otherwise listens on a
/// free loopback port and announces it on stdout as
/// `1|5|tcp|<address>|grpc`. Nothing else may be written to stdout.
pub async fn serve<P: Provider>(provider: P) -> Result<(), ProviderError> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// [`serve`] with explicit options.
pub async fn serve_with_options<P: Provider>(
    provider: P,
    options: ServeOptions,
) -> Result<(), ProviderError> {
    check_magic_cookie(&options)?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    serve_on_listener(provider, listener, addr, options).await
}

/// [`serve`] on a fixed address instead of a free port.
pub async fn serve_on<P: Provider>(provider: P, addr: SocketAddr) -> Result<(), ProviderError> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

/// [`serve_on`] with explicit options.
pub async fn serve_on_with_options<P: Provider>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), ProviderError> {
    check_magic_cookie(&options)?;

    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    serve_on_listener(provider, listener, actual_addr, options).await
}

async fn serve_on_listener<P: Provider>(
    provider: P,
    listener: TcpListener,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), ProviderError> {
    println!("{}", handshake_line(addr));

    info!(address = %addr, protocol = PROTOCOL_VERSION, "Plugin server listening");

    let provider = Arc::new(provider);
    let server = Arc::new(Server::from_arc(Arc::clone(&provider)));
    let service = ProviderGrpcService::new(server).into_service();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_future = TransportServer::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async {
                let _ = shutdown_rx.await;
            },
        );
    tokio::pin!(server_future);

    tokio::select! {
        result = &mut server_future => {
            if let Err(e) = result {
                error!(error = %e, "Server error");
                return Err(e.into());
            }
        }
        _ = wait_for_shutdown_signal() => {
            let _ = shutdown_tx.send(());

            // The timeout only bounds the drain of in-flight requests.
            match tokio::time::timeout(options.shutdown_timeout, &mut server_future).await {
                Ok(Ok(())) => info!("Server shutdown complete"),
                Ok(Err(e)) => {
                    error!(error = %e, "Server error during shutdown");
                    return Err(e.into());
                }
                Err(_) => warn!(
                    timeout = ?options.shutdown_timeout,
                    "Shutdown timeout exceeded, forcing shutdown"
                ),
            }
        }
    }

    debug!("Stopping provider");
    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider failed to stop cleanly");
    }

    info!("Plugin server stopped");
    Ok(())
}
