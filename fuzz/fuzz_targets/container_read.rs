#![no_main]
use libfuzzer_sys::fuzz_target;

use isaprobe::formats::Container;
use isaprobe::io::{IOLimits, SliceSource};

fuzz_target!(|data: &[u8]| {
    if let Ok(mut source) = SliceSource::new(data.to_vec(), IOLimits::default()) {
        if let Ok(container) = Container::read(&mut source) {
            let _ = container.code_ranges();
        }
    }
});
