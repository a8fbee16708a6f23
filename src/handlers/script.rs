//! Script verb handlers (spec.md §4.9): `runScript` enqueues a run on the
//! script worker, `getLastMessage` reads back the most recently captured
//! result or traceback.

use std::time::Duration;

use crate::proto::{self, StatusCode};
use crate::script_worker::ScriptWorkerHandle;

/// `status` mirrors the teacher's convention of 0 for success, negative for
/// failure — here: enqueued (0) or queue full / timed out (-1).
pub async fn run_script(
    worker: &ScriptWorkerHandle,
    call: &proto::RunScriptCall,
    enqueue_timeout: Duration,
) -> (proto::RunScriptReply, StatusCode) {
    match worker.enqueue(call.filename.clone(), enqueue_timeout).await {
        Ok(()) => (proto::RunScriptReply { status: 0 }, StatusCode::Success),
        Err(_) => (
            proto::RunScriptReply { status: -1 },
            StatusCode::RpcHandlerError,
        ),
    }
}

pub fn get_last_message(
    worker: &ScriptWorkerHandle,
    _call: &proto::GetLastMessageCall,
) -> (proto::GetLastMessageReply, StatusCode) {
    (
        proto::GetLastMessageReply {
            msg: worker.last_message(),
        },
        StatusCode::Success,
    )
}
