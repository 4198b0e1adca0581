use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ScopeError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        ScopeError::invalid_geometry("x")
            .to_string()
            .contains("invalid geometry:")
    );
    assert!(
        ScopeError::unsupported("x")
            .to_string()
            .contains("unsupported waveform variant:")
    );
    assert!(
        ScopeError::exhausted("x")
            .to_string()
            .contains("resource exhaustion:")
    );
    assert!(
        ScopeError::format("x")
            .to_string()
            .contains("sample format error:")
    );
    assert!(
        ScopeError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn only_resource_exhaustion_is_fatal() {
    assert!(ScopeError::exhausted("oom").is_fatal());
    assert!(!ScopeError::invalid_geometry("empty").is_fatal());
    assert!(!ScopeError::unsupported("bus").is_fatal());
    assert!(!ScopeError::format("short").is_fatal());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ScopeError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
