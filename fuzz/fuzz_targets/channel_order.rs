#![no_main]

use libfuzzer_sys::fuzz_target;
use pipecopy::BoundedChannel;

fuzz_target!(|input: (u8, Vec<u16>)| {
    let (capacity, items) = input;
    let capacity = usize::from(capacity % 8) + 1;

    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let received = rt.block_on(async {
        let channel = BoundedChannel::new(capacity);
        let produce = async {
            for item in &items {
                channel.push(*item).await.unwrap();
                assert!(channel.len() <= capacity);
            }
            channel.close();
        };
        let consume = async {
            let mut received = Vec::new();
            while let Some(item) = channel.pop().await {
                received.push(item);
            }
            received
        };
        let ((), received) = tokio::join!(produce, consume);
        received
    });

    // Verify: FIFO, nothing lost or duplicated
    assert_eq!(received, items);
});
