use serde::{Deserialize, Serialize};

/// One scripted reply, consumed by one request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetReply {
    /// A finished text, delivered whole.
    #[serde(rename = "scalar")]
    Scalar(String),
    /// A sequence of stream steps.
    #[serde(rename = "stream")]
    Stream(Vec<StreamStep>),
    /// A failure raised before any output is produced.
    #[serde(rename = "fail")]
    Fail(String),
}

/// One step of a scripted stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StreamStep {
    /// A partial-text increment.
    #[serde(rename = "delta")]
    Delta(String),
    /// A failure raised mid-stream, after any prior deltas.
    #[serde(rename = "fail")]
    Fail(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let reply = PresetReply::Stream(vec![
            StreamStep::Delta("Hello, ".to_owned()),
            StreamStep::Delta("world!".to_owned()),
            StreamStep::Fail("cut off".to_owned()),
        ]);

        let serialized = serde_json::to_string(&reply).unwrap();
        let deserialized: PresetReply = serde_json::from_str(&serialized).unwrap();

        assert_eq!(reply, deserialized);
    }
}
