#![no_main]

use std::sync::Arc;

use bytes::Bytes;
use honchat_protocol::core::codec::WireCodec;
use honchat_protocol::protocol::dispatcher::EventBus;
use honchat_protocol::protocol::router::PacketRouter;
use honchat_protocol::utils::metrics::Metrics;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary socket reads must be dropped or routed, never panic
    let router = PacketRouter::new(
        Arc::new(WireCodec::new()),
        Arc::new(EventBus::new()),
        Arc::new(Metrics::new()),
    );
    let _ = router.parse(Bytes::copy_from_slice(data));
});
