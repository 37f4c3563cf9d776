use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire shape of a stored blob record: one row per session id.
/// `data` is the opaque blob as base64 text so the record round-trips
/// through JSON exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobRecord {
    pub id: String,
    pub data: String,
    pub updated_at: DateTime<Utc>,
}

/// Body of a put/upsert call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutBlobRequest {
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_record_parses() {
        let raw = r#"{"id":"primary","data":"aGVsbG8=","updated_at":"2026-03-01T12:00:00Z"}"#;
        let rec: BlobRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.id, "primary");
        assert_eq!(rec.data, "aGVsbG8=");
    }
}
