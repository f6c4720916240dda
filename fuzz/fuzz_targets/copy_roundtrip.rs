#![no_main]

use libfuzzer_sys::fuzz_target;
use pipecopy::{CopyConfig, Strategy, copy};

fuzz_target!(|input: (u16, u8, u8, Vec<u8>)| {
    let (size, capacity, pause, data) = input;

    // Small sizes so short inputs still cross many chunk boundaries
    let buffer_size = usize::from(size % 512) + 1;
    let pause = usize::from(pause) + buffer_size;
    let config = CopyConfig::default()
        .with_buffer_size(buffer_size)
        .with_segment_size(buffer_size)
        .with_channel_capacity(usize::from(capacity % 16) + 1)
        .with_pipe_thresholds(pause, pause / 2);

    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    for strategy in Strategy::ALL {
        let mut out = Vec::new();
        let report = rt
            .block_on(copy(strategy, &data[..], &mut out, &config))
            .unwrap();

        // Verify: byte-for-byte identical, in order
        assert_eq!(out, data);
        assert_eq!(report.bytes_copied, data.len() as u64);

        // Verify: the queue never held more than its capacity
        if strategy == Strategy::PooledQueue {
            assert!(report.peak_queued_chunks <= config.channel_capacity());
        }
    }
});
