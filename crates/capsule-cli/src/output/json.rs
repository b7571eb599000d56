//! JSON output formatting.

use capsule_core::Response;

/// One response as a single JSON line.
pub fn response_line(response: &Response) -> anyhow::Result<String> {
    serde_json::to_string(response).map_err(|e| anyhow::anyhow!("JSON error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_line_shape() {
        let line = response_line(&Response::Error {
            kind: "input".to_string(),
            message: "bad".to_string(),
            retryable: false,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["result"], "error");
        assert_eq!(value["kind"], "input");
        assert!(!line.contains('\n'));
    }
}
