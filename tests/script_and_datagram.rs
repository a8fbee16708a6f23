//! End-to-end test of the datagram transport plus the script worker
//! (spec.md §8 scenario: run a script, then read back its captured
//! traceback over `getLastMessage`).

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use appliance_rpcd::codec;
use appliance_rpcd::config::PoolConfig;
use appliance_rpcd::dispatch::Dispatcher;
use appliance_rpcd::engine::{EngineStats, InMemoryFsEngine};
use appliance_rpcd::partition::{Mount, PartitionRegistry};
use appliance_rpcd::proto::{
    script_callset::WhichMsg as ScriptWhichMsg, rpc_frame::WhichCallset, GetLastMessageCall, Header, RpcFrame,
    RunScriptCall, ScriptCallset, StatusCode,
};
use appliance_rpcd::script_worker::{
    ScriptInterpreter, ScriptInterpreterFactory, ScriptStdlibProfile, ScriptWorker,
};
use appliance_rpcd::state::AppState;
use appliance_rpcd::transport::datagram;

const MAX_MESSAGE_SIZE: usize = 4096;

/// Fails any script containing `error(`, capturing a one-line synthetic
/// traceback, mirroring `lua_thread.c`'s `msghandler`.
struct FailingInterpreter;

impl ScriptInterpreter for FailingInterpreter {
    fn run(&mut self, chunk_name: &str, source: &[u8]) -> Result<(), String> {
        let text = String::from_utf8_lossy(source);
        if text.contains("error(") {
            Err(format!("{chunk_name}: boom\nstack traceback:\n\t[C]: in ?"))
        } else {
            Ok(())
        }
    }
}

struct FailingInterpreterFactory;

impl ScriptInterpreterFactory for FailingInterpreterFactory {
    fn create(&self, _profile: &ScriptStdlibProfile) -> Box<dyn ScriptInterpreter> {
        Box::new(FailingInterpreter)
    }
}

async fn spawn_server() -> std::net::SocketAddr {
    let cfg = appliance_rpcd::config::MountConfig {
        label: "data".into(),
        base_address: 0,
        byte_length: 4096 * 4,
        block_size: 4096,
        read_size: 64,
        program_size: 64,
        cache_size: 64,
        lookahead_size: 64,
        block_cycles: 100,
    };
    let mut engine = InMemoryFsEngine::new(EngineStats {
        address: 0,
        size: cfg.byte_length,
        block_size: cfg.block_size,
        block_count: cfg.block_count(),
    });
    engine.seed_file("/bad.lua", b"error('boom')");
    let registry = PartitionRegistry::new();
    let mount = registry.register(Mount::new(&cfg, Box::new(engine))).unwrap();

    let state = Arc::new(AppState::new(registry, &PoolConfig::default()));
    let (worker, script_handle) = ScriptWorker::new(
        mount,
        ScriptStdlibProfile::DEFAULT,
        Box::new(FailingInterpreterFactory),
        4,
        900,
    );
    tokio::spawn(worker.run_loop());

    let dispatcher = Arc::new(Dispatcher::new(state, script_handle, Duration::from_millis(200)));
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        datagram::serve(socket, dispatcher, MAX_MESSAGE_SIZE).await;
    });
    addr
}

async fn send_and_receive(client: &UdpSocket, server: std::net::SocketAddr, frame: &RpcFrame) -> RpcFrame {
    let mut encoded = Vec::new();
    codec::encode(frame, MAX_MESSAGE_SIZE, &mut encoded).unwrap();
    client.send_to(&encoded, server).await.unwrap();
    let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
    let (n, _) = client.recv_from(&mut buf).await.unwrap();
    codec::decode(&buf[..n], MAX_MESSAGE_SIZE).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn run_script_then_read_back_its_traceback() {
    let server_addr = spawn_server().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let run_request = RpcFrame {
        header: Some(Header {
            seqn: 1,
            no_reply: false,
            status: StatusCode::Success as i32,
        }),
        which_callset: Some(WhichCallset::Script(ScriptCallset {
            which_msg: Some(ScriptWhichMsg::RunScriptCall(RunScriptCall {
                filename: "/bad.lua".into(),
            })),
        })),
    };
    let run_reply = send_and_receive(&client, server_addr, &run_request).await;
    assert_eq!(run_reply.header.unwrap().status, StatusCode::Success as i32);

    // Give the worker task a moment to drain the queue and run the script.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let message_request = RpcFrame {
        header: Some(Header {
            seqn: 2,
            no_reply: false,
            status: StatusCode::Success as i32,
        }),
        which_callset: Some(WhichCallset::Script(ScriptCallset {
            which_msg: Some(ScriptWhichMsg::GetLastMessageCall(GetLastMessageCall {})),
        })),
    };
    let message_reply = send_and_receive(&client, server_addr, &message_request).await;
    match message_reply.which_callset {
        Some(WhichCallset::Script(ScriptCallset {
            which_msg: Some(ScriptWhichMsg::GetLastMessageReply(r)),
        })) => {
            assert!(r.msg.contains("boom"));
            assert!(r.msg.contains("traceback"));
        }
        other => panic!("unexpected reply: {other:?}"),
    }
}
