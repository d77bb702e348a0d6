//! Tests for error module

use crate::error::Error;

#[test]
fn test_error_display() {
    let err = Error::Config("missing token: INFLUXDB_TOKEN must be set".to_string());
    assert!(err.to_string().starts_with("configuration error:"));
    assert!(err.to_string().contains("missing token"));

    let err = Error::Upstream("HTTP 401 Unauthorized: unauthorized access".to_string());
    assert!(err.to_string().contains("unauthorized access"));
}

#[test]
fn test_error_predicates() {
    assert!(Error::NotFound("bucket not found: metrics".to_string()).is_not_found());
    assert!(!Error::NotFound("x".to_string()).is_upstream());

    assert!(Error::Upstream("connection refused".to_string()).is_upstream());
    assert!(!Error::Upstream("x".to_string()).is_not_found());

    assert!(!Error::InvalidParameter("x".to_string()).is_not_found());
    assert!(!Error::Config("x".to_string()).is_upstream());
}

#[test]
fn test_error_kind() {
    assert_eq!(Error::Config("x".to_string()).kind(), "config");
    assert_eq!(
        Error::InvalidParameter("x".to_string()).kind(),
        "invalid_parameter"
    );
    assert_eq!(Error::NotFound("x".to_string()).kind(), "not_found");
    assert_eq!(Error::Upstream("x".to_string()).kind(), "upstream");
}
