//! Fuzz target for IPC JSON message decoding and handling.
//!
//! Arbitrary bytes must decode to `Ok` or `Err` without panicking, and the
//! handler must always produce a reply frame for them.

#![no_main]

use std::sync::Arc;

use floor_core::engine::{DispatchConfig, DispatchEngine};
use floor_core::ipc::{decode_message, IpcHandlerConfig};
use floor_core::scheduler::ManualClock;
use floor_core::Floor;
use libfuzzer_sys::fuzz_target;

const MAX: usize = 64 * 1024;

fuzz_target!(|data: &[u8]| {
    let _ = decode_message(data, MAX);

    let clock = Arc::new(ManualClock::new());
    let engine = DispatchEngine::new(DispatchConfig::default(), clock.clone(), clock);
    let floor = Floor::with_engine(engine, IpcHandlerConfig { max_frame_size: MAX });
    let _ = floor.ipc_handler.process(data);
});
