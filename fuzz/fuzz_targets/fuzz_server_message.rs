#![no_main]

use libfuzzer_sys::fuzz_target;
use spy_artist_client::protocol::ServerMessage;

fuzz_target!(|data: &[u8]| {
    let Ok(msg) = serde_json::from_slice::<ServerMessage>(data) else {
        return;
    };
    // Anything that decodes must re-encode under the same event name.
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["event"], msg.kind().as_str());
});
