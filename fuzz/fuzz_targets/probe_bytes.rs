#![no_main]
use libfuzzer_sys::fuzz_target;

use isaprobe::scan::CancelToken;
use isaprobe::{analyze_bytes, ProbeConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread().build() else {
        return;
    };
    let mut config = ProbeConfig::default();
    config.scan.max_instructions = Some(100_000);
    let _ = runtime.block_on(analyze_bytes(data.to_vec(), &config, CancelToken::new()));
});
