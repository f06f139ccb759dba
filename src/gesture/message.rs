//! Messages exchanged with the landmark-detection service.
//!
//! Every message is a JSON object with a `"type"` tag. Inbound messages carry
//! detected gestures and hand landmarks; outbound messages carry camera
//! frames and instrument changes.

use crate::error::TransportError;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Instruments the synthesizer knows how to play.
pub const INSTRUMENTS: [&str; 6] = ["piano", "drums", "guitar", "flute", "violin", "saxophone"];

/// Returns the instrument after `current` in [`INSTRUMENTS`], wrapping around.
/// Unknown instruments step to the first one.
pub fn next_instrument(current: &str) -> &'static str {
    let index = INSTRUMENTS
        .iter()
        .position(|&i| i == current)
        .map(|i| (i + 1) % INSTRUMENTS.len())
        .unwrap_or(0);
    INSTRUMENTS[index]
}

/// A landmark in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    /// Depth estimate. Carried on the wire but not used for drawing.
    #[serde(default)]
    pub z: f32,
}

impl LandmarkPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Which side of the image a hand is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// Up to 21 landmarks of one hand; index 0 is the wrist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandLandmarks(pub Vec<LandmarkPoint>);

impl HandLandmarks {
    /// Landmark index of the wrist.
    pub const WRIST: usize = 0;

    pub fn get(&self, index: usize) -> Option<LandmarkPoint> {
        self.0.get(index).copied()
    }

    pub fn wrist(&self) -> Option<LandmarkPoint> {
        self.get(Self::WRIST)
    }

    /// Classifies the hand by where its wrist sits in the image: a wrist
    /// right of centre is the right hand.
    pub fn side(&self) -> Option<Handedness> {
        self.wrist().map(|w| {
            if w.x > 0.5 {
                Handedness::Right
            } else {
                Handedness::Left
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One detection result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// The gesture that should sound, if any.
    #[serde(default)]
    pub gesture: Option<String>,
    /// Per-hand gesture labels.
    #[serde(default)]
    pub gestures: Vec<String>,
    #[serde(default, rename = "landmarks")]
    pub hands: Vec<HandLandmarks>,
    #[serde(default)]
    pub image_width: u32,
    #[serde(default)]
    pub image_height: u32,
    #[serde(default)]
    pub instrument: String,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl LandmarkFrame {
    /// True if at least one hand has landmarks to draw.
    pub fn has_landmarks(&self) -> bool {
        self.hands.iter().any(|h| !h.is_empty())
    }
}

/// Messages received from the detection service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    GestureDetected(LandmarkFrame),
    InstrumentChanged {
        instrument: String,
        #[serde(default)]
        timestamp: Option<Value>,
    },
    Pong {
        #[serde(default)]
        timestamp: Option<Value>,
    },
}

impl InboundMessage {
    const TAGS: [&'static str; 3] = ["gesture_detected", "instrument_changed", "pong"];

    /// Parses one JSON message.
    ///
    /// # Errors
    ///
    /// Distinguishes malformed JSON, a missing `"type"` and an unknown tag so
    /// callers can log them differently.
    pub fn parse(text: &str) -> Result<Self, TransportError> {
        let value: Value = serde_json::from_str(text)?;
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(TransportError::MissingTag)?;
        if !Self::TAGS.contains(&tag) {
            return Err(TransportError::UnknownTag {
                tag: tag.to_string(),
            });
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Messages sent to the detection service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    VideoFrame {
        /// JPEG image as a `data:` URL.
        image: String,
        instrument: String,
        /// Milliseconds since the Unix epoch.
        timestamp: u64,
    },
    InstrumentChange {
        instrument: String,
    },
    Ping,
}

impl OutboundMessage {
    /// Wraps JPEG bytes as a video frame message.
    pub fn video_frame(jpeg: &[u8], instrument: &str, timestamp: u64) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg);
        Self::VideoFrame {
            image: format!("data:image/jpeg;base64,{encoded}"),
            instrument: instrument.to_string(),
            timestamp,
        }
    }

    /// Serializes the message as a single line of JSON.
    pub fn to_line(&self) -> Result<String, TransportError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gesture_detected() {
        let text = r#"{
            "type": "gesture_detected",
            "gesture": "fist",
            "gestures": ["fist"],
            "landmarks": [[{"x": 0.7, "y": 0.5, "z": -0.01}, {"x": 0.72, "y": 0.45}]],
            "image_width": 640,
            "image_height": 480,
            "instrument": "piano",
            "timestamp": "2024-05-01T10:00:00"
        }"#;
        let InboundMessage::GestureDetected(frame) = InboundMessage::parse(text).unwrap() else {
            panic!("expected gesture_detected");
        };
        assert_eq!(frame.gesture.as_deref(), Some("fist"));
        assert_eq!(frame.hands.len(), 1);
        assert_eq!(frame.hands[0].get(1), Some(LandmarkPoint::new(0.72, 0.45)));
        assert_eq!(frame.hands[0].side(), Some(Handedness::Right));
        assert_eq!(frame.image_width, 640);
        assert!(frame.has_landmarks());
    }

    #[test]
    fn test_parse_minimal_gesture_frame() {
        let message = InboundMessage::parse(r#"{"type":"gesture_detected","gesture":null}"#).unwrap();
        let InboundMessage::GestureDetected(frame) = message else {
            panic!("expected gesture_detected");
        };
        assert!(frame.gesture.is_none());
        assert!(!frame.has_landmarks());
        assert_eq!(frame.image_width, 0);
    }

    #[test]
    fn test_parse_control_messages() {
        assert_eq!(
            InboundMessage::parse(r#"{"type":"instrument_changed","instrument":"drums"}"#).unwrap(),
            InboundMessage::InstrumentChanged {
                instrument: "drums".into(),
                timestamp: None
            }
        );
        assert!(matches!(
            InboundMessage::parse(r#"{"type":"pong","timestamp":"now"}"#).unwrap(),
            InboundMessage::Pong { .. }
        ));
    }

    #[test]
    fn test_parse_rejects_bad_messages() {
        assert!(matches!(
            InboundMessage::parse(r#"{"type":"telemetry"}"#),
            Err(TransportError::UnknownTag { tag }) if tag == "telemetry"
        ));
        assert!(matches!(
            InboundMessage::parse(r#"{"gesture":"fist"}"#),
            Err(TransportError::MissingTag)
        ));
        assert!(matches!(
            InboundMessage::parse("{not json"),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_video_frame_is_a_data_url() {
        let line = OutboundMessage::video_frame(b"\xff\xd8jpeg", "violin", 42)
            .to_line()
            .unwrap();
        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["type"], "video_frame");
        assert_eq!(value["instrument"], "violin");
        assert_eq!(value["timestamp"], 42);
        assert!(value["image"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,/9hqcGVn"));
    }

    #[test]
    fn test_ping_and_instrument_change_shape() {
        assert_eq!(
            OutboundMessage::Ping.to_line().unwrap(),
            "{\"type\":\"ping\"}\n"
        );
        assert_eq!(
            OutboundMessage::InstrumentChange {
                instrument: "flute".into()
            }
            .to_line()
            .unwrap(),
            "{\"type\":\"instrument_change\",\"instrument\":\"flute\"}\n"
        );
    }

    #[test]
    fn test_instrument_cycle() {
        assert_eq!(next_instrument("piano"), "drums");
        assert_eq!(next_instrument("saxophone"), "piano");
        assert_eq!(next_instrument("kazoo"), "piano");
    }

    #[test]
    fn test_left_hand_by_position() {
        let hand = HandLandmarks(vec![LandmarkPoint::new(0.5, 0.5)]);
        assert_eq!(hand.side(), Some(Handedness::Left));
        assert_eq!(HandLandmarks::default().side(), None);
    }
}
