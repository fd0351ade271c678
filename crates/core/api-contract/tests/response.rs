use api_contract::ApiResponse;

#[test]
fn api_response_success() {
    let response = ApiResponse::success("ok");
    assert!(response.success);
    assert!(response.data.is_some());
    assert!(response.error.is_none());
}

#[test]
fn api_response_error() {
    let response = ApiResponse::<()>::error("INHERIT.FLAG_CONFLICT", "flag conflict");
    assert!(!response.success);
    assert!(response.data.is_none());
    let error = response.error.expect("error body");
    assert_eq!(error.code, "INHERIT.FLAG_CONFLICT");
}

#[test]
fn error_response_serializes_null_data() {
    let response = ApiResponse::<()>::error("INHERIT.STORAGE", "lock failed");
    let value = serde_json::to_value(response).expect("serialize");
    assert_eq!(value["success"], false);
    assert!(value["data"].is_null());
    assert_eq!(value["error"]["message"], "lock failed");
}
