//! Appliance RPC daemon entry point (spec.md §10.5).
//!
//! Loads configuration, registers mounts, and starts both transport
//! servers and the script worker. Grounded on the teacher's
//! `examples/hello.rs`: a `clap::Parser` args struct, `env_logger::init()`,
//! then wiring into the library.
//!
//! The mount engine here is [`appliance_rpcd::engine::InMemoryFsEngine`] —
//! the real flash-backed log-structured filesystem is an external
//! collaborator (spec.md §1) this crate never implements, so the demo
//! binary stands one up in memory instead of mounting real flash.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::{TcpListener, UdpSocket};

use appliance_rpcd::config::AppConfig;
use appliance_rpcd::engine::{EngineStats, InMemoryFsEngine};
use appliance_rpcd::partition::{Mount, PartitionRegistry};
use appliance_rpcd::script_worker::{ScriptStdlibProfile, ScriptWorker, ScriptInterpreter, ScriptInterpreterFactory};
use appliance_rpcd::{AppState, Dispatcher};

#[derive(Parser)]
#[command(version, about = "Embedded RPC-controlled appliance core runtime")]
struct Args {
    /// Path to a TOML configuration file (spec.md §6).
    #[arg(long)]
    config: PathBuf,
}

/// Placeholder script interpreter for the demo binary: always succeeds.
/// A real deployment supplies a restricted Lua host; see `ScriptInterpreter`.
struct NoopInterpreter;

impl ScriptInterpreter for NoopInterpreter {
    fn run(&mut self, _chunk_name: &str, _source: &[u8]) -> Result<(), String> {
        Ok(())
    }
}

struct NoopInterpreterFactory;

impl ScriptInterpreterFactory for NoopInterpreterFactory {
    fn create(&self, _profile: &ScriptStdlibProfile) -> Box<dyn ScriptInterpreter> {
        Box::new(NoopInterpreter)
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config_text = std::fs::read_to_string(&args.config)?;
    let config = AppConfig::from_toml_str(&config_text)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: AppConfig) -> std::io::Result<()> {
    let registry = PartitionRegistry::new();
    let mut first_mount = None;
    for mount_cfg in &config.mounts {
        let engine = InMemoryFsEngine::new(EngineStats {
            address: mount_cfg.base_address,
            size: mount_cfg.byte_length,
            block_size: mount_cfg.block_size,
            block_count: mount_cfg.block_count(),
        });
        let mount = registry
            .register(Mount::new(mount_cfg, Box::new(engine)))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AlreadyExists, e))?;
        log::info!("registered mount {:?}", mount_cfg.label);
        first_mount.get_or_insert(mount);
    }
    let script_mount = first_mount
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no mounts configured"))?;

    let state = Arc::new(AppState::new(registry, &config.pool));
    let (worker, script_handle) = ScriptWorker::new(
        script_mount,
        ScriptStdlibProfile::DEFAULT,
        Box::new(NoopInterpreterFactory),
        config.script_worker.queue_capacity,
        config.script_worker.last_message_capacity,
    );
    tokio::spawn(worker.run_loop());

    let dispatcher = Arc::new(Dispatcher::new(
        state,
        script_handle,
        Duration::from_millis(config.script_worker.enqueue_timeout_ms),
    ));

    let mut tasks = Vec::new();
    if let Some(server_cfg) = &config.stream_server {
        let addr = SocketAddr::from(([0, 0, 0, 0], server_cfg.port));
        let listener = TcpListener::bind(addr).await?;
        log::info!("stream transport listening on {addr}");
        let dispatcher = dispatcher.clone();
        let max_size = config.dispatch.max_message_size;
        tasks.push(tokio::spawn(async move {
            appliance_rpcd::transport::stream::serve(listener, dispatcher, max_size).await;
        }));
    }
    if let Some(server_cfg) = &config.datagram_server {
        let addr = SocketAddr::from(([0, 0, 0, 0], server_cfg.port));
        let socket = UdpSocket::bind(addr).await?;
        log::info!("datagram transport listening on {addr}");
        let dispatcher = dispatcher.clone();
        let max_size = config.dispatch.max_message_size;
        tasks.push(tokio::spawn(async move {
            appliance_rpcd::transport::datagram::serve(socket, dispatcher, max_size).await;
        }));
    }

    for task in tasks {
        let _ = task.await;
    }
    Ok(())
}
