use armature::ContainerError;

#[test]
fn test_not_found_display() {
    let err = ContainerError::NotFound("database".to_string());
    assert_eq!(err.to_string(), "Instance not found: database");
}

#[test]
fn test_creation_display() {
    let err = ContainerError::creation("server", "no blueprint registered for type Server");
    assert_eq!(
        err.to_string(),
        "Error creating instance 'server': no blueprint registered for type Server"
    );
}

#[test]
fn test_circular_reference_display_shows_the_path() {
    let err = ContainerError::CircularReference(vec![
        "a".to_string(),
        "b".to_string(),
        "a".to_string(),
    ]);
    assert_eq!(err.to_string(), "Circular reference: a -> b -> a");
}

#[test]
fn test_ambiguous_dependency_display_lists_candidates() {
    let err = ContainerError::AmbiguousDependency {
        dependency: "Database".to_string(),
        candidates: vec!["primary".to_string(), "replica".to_string()],
    };
    assert_eq!(
        err.to_string(),
        "Ambiguous dependency 'Database': candidates [primary, replica]"
    );
}

#[test]
fn test_conversion_display() {
    let err = ContainerError::Conversion {
        value: "lots".to_string(),
        target: "int".to_string(),
    };
    assert_eq!(err.to_string(), "Cannot convert 'lots' to int");
}

#[test]
fn test_errors_are_std_errors() {
    fn takes_error(_: &dyn std::error::Error) {}
    takes_error(&ContainerError::NotFound("x".to_string()));
}
