//! Test assertion helpers - fluent API for verifying delivered frames
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;

use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct FrameAssertion<'a> {
    setup: &'a mut TestSetup,
    clients: Vec<String>,
}

impl<'a> FrameAssertion<'a> {
    pub fn for_clients(setup: &'a mut TestSetup, clients: &[&str]) -> Self {
        Self {
            setup,
            clients: clients.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Each client received exactly one frame, of the given type
    pub fn received_frame_type(self, expected_type: &str) -> FrameContent {
        let mut frames = vec![];
        for name in &self.clients {
            let received = self.setup.client(name).drain();
            assert_eq!(
                received.len(),
                1,
                "{name} should have received exactly one frame, got {received:?}"
            );
            assert_eq!(
                received[0]["type"], expected_type,
                "{name} received wrong frame type"
            );
            frames.push(received[0].clone());
        }

        for (i, frame) in frames.iter().enumerate().skip(1) {
            assert_eq!(
                frame["payload"], frames[0]["payload"],
                "{} payload differs from {}",
                self.clients[i], self.clients[0]
            );
        }

        FrameContent {
            payload: frames[0]["payload"].clone(),
        }
    }

    /// Each client received the given frame types, in order, and nothing else
    pub fn received_frame_sequence(self, expected_types: &[&str]) -> Vec<FrameContent> {
        let mut first = vec![];
        for (index, name) in self.clients.iter().enumerate() {
            let received = self.setup.client(name).drain();
            let types: Vec<&str> = received
                .iter()
                .map(|frame| frame["type"].as_str().unwrap_or_default())
                .collect();
            assert_eq!(types, expected_types, "{name} received wrong frame sequence");
            if index == 0 {
                first = received
                    .into_iter()
                    .map(|frame| FrameContent {
                        payload: frame["payload"].clone(),
                    })
                    .collect();
            }
        }
        first
    }

    pub fn received_no_frames(self) {
        for name in &self.clients {
            let received = self.setup.client(name).drain();
            assert!(received.is_empty(), "{name} should not have received {received:?}");
        }
    }
}

// ============================================================================
// Frame Content Assertions
// ============================================================================

pub struct FrameContent {
    pub payload: Value,
}

impl FrameContent {
    pub fn with_room(self, room: &str) -> Self {
        assert_eq!(self.payload["room"], room);
        self
    }

    pub fn with_from(self, from: &str) -> Self {
        assert_eq!(self.payload["from"], from);
        self
    }

    pub fn with_success(self, success: bool) -> Self {
        assert_eq!(self.payload["success"], success);
        self
    }

    pub fn with_field(self, key: &str, value: Value) -> Self {
        assert_eq!(self.payload[key], value, "payload field {key}");
        self
    }

    pub fn with_timestamp(self) -> Self {
        assert!(
            self.payload["timestamp"].is_string(),
            "payload should carry a timestamp"
        );
        self
    }
}
