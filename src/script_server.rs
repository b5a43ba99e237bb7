//! Static file server exposing the installer script and the built packages
//! to the environments under test.
//!
//! The server runs on its own thread with a single-threaded runtime, so the
//! rest of the harness stays synchronous.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener},
    path::{Path, PathBuf},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::Context;
use axum::Router;
use log::{debug, info, warn};
use tokio::sync::oneshot;
use tower_http::services::ServeDir;
use url::Url;

use harness_api::{
    config::TestConfig,
    constants::{BUILT_PACKAGES_TARGET_PATH, INSTALL_SCRIPT_NAME},
    error::{HarnessError, InitializationError, InternalError, ReportError},
};

use crate::polling;

/// How long to wait for the server to answer once started.
const READINESS_TIMEOUT: Duration = Duration::from_secs(10);
const READINESS_INTERVAL: Duration = Duration::from_millis(100);

/// Routes of the server: the packages directory under `/packages`, the script
/// directory everywhere else.
pub fn router(script_dir: &Path, packages_dir: &Path) -> Router {
    Router::new()
        .nest_service(BUILT_PACKAGES_TARGET_PATH, ServeDir::new(packages_dir))
        .fallback_service(ServeDir::new(script_dir))
}

pub struct ScriptServer {
    local_addr: SocketAddr,
    base_url: Url,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<Result<(), anyhow::Error>>>,
}

impl ScriptServer {
    /// Bind the configured address and start serving in the background.
    pub fn start(config: &TestConfig) -> Result<Self, HarnessError> {
        let server_config = &config.script_server;
        let start_error = || InitializationError::StartScriptServer {
            port: server_config.port,
        };

        // Bind synchronously so that a busy port fails here, not on the thread
        let listener = TcpListener::bind((server_config.bind_address.as_str(), server_config.port))
            .structured(start_error())?;
        listener.set_nonblocking(true).structured(start_error())?;
        let local_addr = listener.local_addr().structured(start_error())?;

        let base_url = Url::parse(&format!(
            "http://{}:{}/",
            server_config.client_address,
            local_addr.port()
        ))
        .structured(start_error())?;

        let app = router(&config.script_dir, &config.packages_dir);
        let (shutdown, shutdown_signal) = oneshot::channel::<()>();
        let script_dir: PathBuf = config.script_dir.clone();

        let thread = thread::Builder::new()
            .name("script-server".into())
            .spawn(move || -> Result<(), anyhow::Error> {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_io()
                    .build()
                    .context("Failed to build script server runtime")?;

                runtime.block_on(async move {
                    let listener = tokio::net::TcpListener::from_std(listener)
                        .context("Failed to register listener")?;
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async move {
                            let _ = shutdown_signal.await;
                        })
                        .await
                        .context("Script server failed")
                })
            })
            .structured(start_error())?;

        info!(
            "Serving '{}' on {local_addr}, reachable at {base_url}",
            script_dir.display()
        );

        Ok(Self {
            local_addr,
            base_url,
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    /// URL the environments under test use to reach the server.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL of the installer script, as fetched by the environments.
    pub fn install_script_url(&self) -> Result<Url, HarnessError> {
        self.base_url
            .join(INSTALL_SCRIPT_NAME)
            .structured(InternalError::Internal("Failed to build installer URL"))
    }

    /// Wait until the server hands out the installer script.
    pub fn wait_ready(&self) -> Result<(), HarnessError> {
        let ip = match self.local_addr.ip() {
            ip if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            ip => ip,
        };
        let url = format!(
            "http://{}/{INSTALL_SCRIPT_NAME}",
            SocketAddr::new(ip, self.local_addr.port())
        );
        let client = reqwest::blocking::Client::builder()
            .timeout(READINESS_INTERVAL * 10)
            .build()
            .structured(InternalError::Internal("Failed to build HTTP client"))?;

        let ready = polling::wait_until(READINESS_TIMEOUT, READINESS_INTERVAL, || {
            match client.get(&url).send() {
                Ok(response) if response.status().is_success() => Ok(Some(())),
                Ok(response) => {
                    debug!("Script server answered {} for '{url}'", response.status());
                    Ok(None)
                }
                Err(e) => {
                    debug!("Script server not reachable yet: {e}");
                    Ok(None)
                }
            }
        })?;

        ready.structured(InitializationError::ScriptServerNotReady {
            file: INSTALL_SCRIPT_NAME.into(),
        })
    }

    /// Stop serving and wait for the server thread to exit.
    pub fn stop(mut self) -> Result<(), HarnessError> {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> Result<(), HarnessError> {
        if let Some(shutdown) = self.shutdown.take() {
            // The receiver is gone if the server already exited
            let _ = shutdown.send(());
        }

        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        match thread.join() {
            Ok(result) => {
                result.structured(InternalError::Internal("Script server exited with an error"))?;
                info!("Script server on {} stopped", self.local_addr);
                Ok(())
            }
            Err(e) => Err(HarnessError::new(InternalError::Panic(format!("{e:?}")))),
        }
    }
}

impl Drop for ScriptServer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_and_join() {
            warn!("Failed to stop script server: {e:?}");
        }
    }
}

/// Serve in the foreground until the process is interrupted.
pub fn serve_until_interrupted(config: &TestConfig) -> Result<(), HarnessError> {
    let server = ScriptServer::start(config)?;
    server.wait_ready()?;
    info!("Press Ctrl+C to stop");

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .structured(InternalError::Internal("Failed to build signal runtime"))?
        .block_on(tokio::signal::ctrl_c())
        .structured(InternalError::Internal("Failed to wait for interrupt"))?;

    server.stop()
}
