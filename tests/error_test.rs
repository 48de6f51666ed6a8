//! Tests for the error taxonomy and its wire-level mapping.

use std::time::Duration;

use grimnir::GrimnirError;

// ============================================================================
// Transience classification
// ============================================================================

#[test]
fn transient_upstream_errors_are_transient() {
    let err = GrimnirError::Upstream {
        provider: "openai".into(),
        status: Some(503),
        message: "bad gateway".into(),
        transient: true,
    };
    assert!(err.is_transient());
}

#[test]
fn permanent_upstream_errors_are_not_transient() {
    let err = GrimnirError::Upstream {
        provider: "openai".into(),
        status: Some(400),
        message: "bad request".into(),
        transient: false,
    };
    assert!(!err.is_transient());
}

#[test]
fn dispatch_timeout_is_transient_other_stages_are_not() {
    assert!(GrimnirError::StageTimeout { stage: "dispatch" }.is_transient());
    assert!(!GrimnirError::StageTimeout { stage: "scrub" }.is_transient());
}

#[test]
fn terminal_errors_are_never_transient() {
    assert!(!GrimnirError::InvalidRequest("x".into()).is_transient());
    assert!(!GrimnirError::AuthenticationFailed.is_transient());
    assert!(!GrimnirError::ModelNotFound("m".into()).is_transient());
    assert!(
        !GrimnirError::RateLimited {
            retry_after: Duration::from_secs(1)
        }
        .is_transient()
    );
}

// ============================================================================
// retry_after extraction
// ============================================================================

#[test]
fn retry_after_comes_from_rate_limiting() {
    let err = GrimnirError::RateLimited {
        retry_after: Duration::from_secs(42),
    };
    assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
}

#[test]
fn retry_after_is_absent_elsewhere() {
    assert_eq!(GrimnirError::AuthenticationFailed.retry_after(), None);
    assert_eq!(GrimnirError::ModelNotFound("m".into()).retry_after(), None);
}

// ============================================================================
// Wire-level body
// ============================================================================

#[test]
fn codes_are_stable() {
    assert_eq!(GrimnirError::InvalidRequest("x".into()).code(), "invalid_request");
    assert_eq!(
        GrimnirError::RateLimited {
            retry_after: Duration::ZERO
        }
        .code(),
        "rate_limited"
    );
    assert_eq!(
        GrimnirError::AuthenticationFailed.code(),
        "authentication_error"
    );
    assert_eq!(GrimnirError::ModelNotFound("m".into()).code(), "model_not_found");
    assert_eq!(
        GrimnirError::StageTimeout { stage: "dispatch" }.code(),
        "timeout"
    );
    assert_eq!(
        GrimnirError::Internal("oops".into()).code(),
        "internal_error"
    );
}

#[test]
fn body_has_code_message_and_type() {
    let body = GrimnirError::ModelNotFound("gpt-99".into()).to_body();
    assert_eq!(body.code, "model_not_found");
    assert_eq!(body.error_type, "not_found_error");
    assert!(body.message.contains("gpt-99"));

    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["code"], "model_not_found");
    assert_eq!(json["type"], "not_found_error");
    assert!(json["message"].is_string());
}

#[test]
fn internal_detail_never_leaks_into_the_body() {
    let body = GrimnirError::Internal("db password is hunter2".into()).to_body();
    assert_eq!(body.message, "internal error");

    let body = GrimnirError::Configuration("secret path /etc/keys".into()).to_body();
    assert_eq!(body.message, "internal error");
}

#[test]
fn upstream_body_names_the_provider() {
    let err = GrimnirError::Upstream {
        provider: "openai".into(),
        status: Some(502),
        message: "bad gateway".into(),
        transient: true,
    };
    let body = err.to_body();
    assert_eq!(body.code, "upstream_error");
    assert!(body.message.contains("openai"));
}
