#![no_main]
use libfuzzer_sys::fuzz_target;

use isaprobe::config::SeedConfig;
use isaprobe::core::issues::IssueSink;
use isaprobe::formats::Container;
use isaprobe::io::{IOLimits, SliceSource};
use isaprobe::seeds::{SeedProvider, SeedProviderKind};

fuzz_target!(|data: &[u8]| {
    let Ok(mut source) = SliceSource::new(data.to_vec(), IOLimits::default()) else {
        return;
    };
    let Ok(container) = Container::read(&mut source) else {
        return;
    };
    let config = SeedConfig::default();
    let mut issues = IssueSink::default();
    let _ = SeedProviderKind::for_container(&container, &config).collect(&mut source, &mut issues);
});
