#![no_main]

use huddle_core::{OperationRequest, OperationResponse};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(request) = serde_json::from_slice::<OperationRequest>(data) {
        let encoded = serde_json::to_vec(&request).expect("re-encode request");
        let again: OperationRequest = serde_json::from_slice(&encoded).expect("decode re-encoded");
        assert_eq!(request, again);
    }
    let _ = serde_json::from_slice::<OperationResponse>(data);
});
