use armature::{
    AnyArc, Blueprint, Container, ContainerError, ContainerObserver, Definition, Param,
    PropertyValue, TracingObserver, ValueKind, SCOPE_UNSCOPED,
};
use std::sync::{Arc, Mutex, RwLock};

struct Database {
    url: RwLock<String>,
}

fn database_blueprint() -> Blueprint {
    Blueprint::new::<Database>("Database")
        .with_default(|| Database {
            url: RwLock::new(String::new()),
        })
        .with_setter("url", ValueKind::Str, |d: &Database, v: Arc<String>| {
            *d.url.write().unwrap() = (*v).clone();
        })
}

#[test]
fn test_singleton_identity() {
    let container = Container::new();
    container.register_blueprint(database_blueprint());
    container.register_definition("database", Definition::new("Database"));

    let a = container.get_typed::<Database>("database").unwrap();
    let b = container.get_typed::<Database>("database").unwrap();

    assert!(Arc::ptr_eq(&a, &b)); // Same instance
}

#[test]
fn test_unscoped_distinctness() {
    let container = Container::new();
    container.register_blueprint(database_blueprint());
    container.register_definition(
        "database",
        Definition::new("Database").with_scope(SCOPE_UNSCOPED),
    );

    let a = container.get_typed::<Database>("database").unwrap();
    let b = container.get_typed::<Database>("database").unwrap();
    let c = container.get_typed::<Database>("database").unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&b, &c));
    assert!(!Arc::ptr_eq(&a, &c));
}

struct Repository {
    db: Arc<Database>,
}

fn repository_blueprint() -> Blueprint {
    Blueprint::new::<Repository>("Repository").with_constructor(
        vec![Param::required("database", ValueKind::Instance("Database"))],
        |args| {
            let db = args[0]
                .clone()
                .downcast::<Database>()
                .map_err(|_| ContainerError::creation("Repository", "expected a Database"))?;
            Ok(Arc::new(Repository { db }) as AnyArc)
        },
    )
}

#[test]
fn test_constructor_autowire_by_unique_type() {
    let container = Container::new();
    container.register_blueprint(database_blueprint());
    container.register_blueprint(repository_blueprint());
    container.register_definition(
        "database",
        Definition::new("Database").with_property("url", PropertyValue::Str("db://main".into())),
    );
    container.register_definition("repository", Definition::new("Repository"));

    let repo = container.get_typed::<Repository>("repository").unwrap();
    let db = container.get_typed::<Database>("database").unwrap();

    assert!(Arc::ptr_eq(&repo.db, &db));
    assert_eq!(*repo.db.url.read().unwrap(), "db://main");
}

#[test]
fn test_autowire_tiebreak_by_param_name() {
    let container = Container::new();
    container.register_blueprint(database_blueprint());
    container.register_blueprint(
        Blueprint::new::<Repository>("Repository").with_constructor(
            vec![Param::required("replica", ValueKind::Instance("Database"))],
            |args| {
                let db = args[0]
                    .clone()
                    .downcast::<Database>()
                    .map_err(|_| ContainerError::creation("Repository", "expected a Database"))?;
                Ok(Arc::new(Repository { db }) as AnyArc)
            },
        ),
    );
    container.register_definition("primary", Definition::new("Database"));
    container.register_definition("replica", Definition::new("Database"));
    container.register_definition("repository", Definition::new("Repository"));

    let repo = container.get_typed::<Repository>("repository").unwrap();
    let replica = container.get_typed::<Database>("replica").unwrap();

    assert!(Arc::ptr_eq(&repo.db, &replica));
}

#[test]
fn test_autowire_ambiguous_type_fails() {
    let container = Container::new();
    container.register_blueprint(database_blueprint());
    container.register_blueprint(repository_blueprint());
    container.register_definition("first", Definition::new("Database"));
    container.register_definition("second", Definition::new("Database"));
    container.register_definition("repository", Definition::new("Repository"));

    let err = container.get_instance("repository").unwrap_err();
    match err {
        ContainerError::AmbiguousDependency { candidates, .. } => {
            assert_eq!(candidates, vec!["first".to_string(), "second".to_string()]);
        }
        other => panic!("expected AmbiguousDependency, got {:?}", other),
    }
}

struct Named {
    label: String,
}

#[test]
fn test_explicit_constructor_args_with_conversion() {
    let container = Container::new();
    container.register_blueprint(Blueprint::new::<Named>("Named").with_constructor(
        vec![Param::required("label", ValueKind::Str)],
        |args| {
            let label = args[0]
                .downcast_ref::<String>()
                .cloned()
                .unwrap_or_default();
            Ok(Arc::new(Named { label }) as AnyArc)
        },
    ));
    container.register_definition("named", Definition::new("Named"));

    let arg: AnyArc = Arc::new("hello".to_string());
    let named = container
        .get_with_args("named", &[arg])
        .unwrap()
        .downcast::<Named>()
        .unwrap();
    assert_eq!(named.label, "hello");
}

struct Optionalist {
    db: Option<Arc<Database>>,
}

#[test]
fn test_optional_param_receives_absent_marker() {
    let container = Container::new();
    container.register_blueprint(database_blueprint());
    container.register_blueprint(Blueprint::new::<Optionalist>("Optionalist").with_constructor(
        vec![Param::optional("db", ValueKind::Instance("Database"))],
        |args| {
            let db = if armature::is_absent(&args[0]) {
                None
            } else {
                args[0].clone().downcast::<Database>().ok()
            };
            Ok(Arc::new(Optionalist { db }) as AnyArc)
        },
    ));
    // No Database definition registered at all.
    container.register_definition("optionalist", Definition::new("Optionalist"));

    let opt = container.get_typed::<Optionalist>("optionalist").unwrap();
    assert!(opt.db.is_none());
}

#[test]
fn test_get_by_type() {
    let container = Container::new();
    container.register_blueprint(database_blueprint());
    container.register_definition("database", Definition::new("Database"));

    let by_type = container.get_by_type::<Database>().unwrap();
    let by_name = container.get_typed::<Database>("database").unwrap();
    assert!(Arc::ptr_eq(&by_type, &by_name));
}

#[test]
fn test_get_by_type_ambiguous() {
    let container = Container::new();
    container.register_blueprint(database_blueprint());
    container.register_definition("first", Definition::new("Database"));
    container.register_definition("second", Definition::new("Database"));

    assert!(matches!(
        container.get_by_type::<Database>(),
        Err(ContainerError::AmbiguousDependency { .. })
    ));
}

#[test]
fn test_typed_mismatch() {
    let container = Container::new();
    container.register_blueprint(database_blueprint());
    container.register_definition("database", Definition::new("Database"));

    assert!(matches!(
        container.get_typed::<Repository>("database"),
        Err(ContainerError::TypeMismatch { .. })
    ));
}

#[test]
fn test_missing_definition() {
    let container = Container::new();
    match container.get_instance("ghost") {
        Err(ContainerError::NotFound(name)) => assert_eq!(name, "ghost"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_register_singleton_directly() {
    let container = Container::new();
    container.register_singleton("answer", Arc::new(42i64) as AnyArc);

    assert!(container.contains_instance("answer"));
    let v = container.get_instance("answer").unwrap();
    assert_eq!(*v.downcast::<i64>().unwrap(), 42);
}

#[test]
fn test_contains_singleton_tracks_the_cache_not_the_definition() {
    let container = Container::new();
    container.register_blueprint(database_blueprint());
    container.register_definition("database", Definition::new("Database"));

    // The definition alone answers contains_instance, not contains_singleton.
    assert!(container.contains_instance("database"));
    assert!(!container.contains_singleton("database"));

    container.get_instance("database").unwrap();
    assert!(container.contains_singleton("database"));

    assert!(container.shutdown().is_empty());
    assert!(!container.contains_singleton("database"));
    assert!(container.contains_instance("database"));
}

struct SelfAware {
    seen_name: RwLock<Option<String>>,
    seen_container: RwLock<Option<Container>>,
}

#[test]
fn test_aware_callbacks() {
    let container = Container::new();
    container.register_blueprint(
        Blueprint::new::<SelfAware>("SelfAware")
            .with_default(|| SelfAware {
                seen_name: RwLock::new(None),
                seen_container: RwLock::new(None),
            })
            .aware_of_name(|s: &SelfAware, name: &str| {
                *s.seen_name.write().unwrap() = Some(name.to_string());
            })
            .aware_of_container(|s: &SelfAware, c: &Container| {
                *s.seen_container.write().unwrap() = Some(c.clone());
            }),
    );
    container.register_definition("self-aware", Definition::new("SelfAware"));

    let aware = container.get_typed::<SelfAware>("self-aware").unwrap();
    assert_eq!(aware.seen_name.read().unwrap().as_deref(), Some("self-aware"));
    let seen = aware.seen_container.read().unwrap();
    assert!(seen.as_ref().unwrap().contains_definition("self-aware"));
}

struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl ContainerObserver for EventLog {
    fn creating(&self, name: &str) {
        self.events.lock().unwrap().push(format!("creating:{}", name));
    }

    fn created(&self, name: &str, _duration: std::time::Duration) {
        self.events.lock().unwrap().push(format!("created:{}", name));
    }

    fn creation_failed(&self, name: &str, _error: &ContainerError) {
        self.events.lock().unwrap().push(format!("failed:{}", name));
    }
}

#[test]
fn test_observer_sees_creation_events() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new();
    container.add_observer(Arc::new(EventLog {
        events: events.clone(),
    }));
    container.register_blueprint(database_blueprint());
    container.register_definition("database", Definition::new("Database"));

    container.get_instance("database").unwrap();
    // Cached hit should not re-notify.
    container.get_instance("database").unwrap();

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec!["creating:database".to_string(), "created:database".to_string()]
    );
}

#[test]
fn test_tracing_observer_alongside_custom_observers() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let events = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new();
    container.add_observer(Arc::new(TracingObserver::new()));
    container.add_observer(Arc::new(EventLog {
        events: events.clone(),
    }));
    container.register_blueprint(database_blueprint());
    container.register_definition("database", Definition::new("Database"));

    container.get_instance("database").unwrap();
    assert!(container.shutdown().is_empty());
    assert_eq!(events.lock().unwrap().len(), 2);
}

#[test]
fn test_observer_sees_failures() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new();
    container.add_observer(Arc::new(EventLog {
        events: events.clone(),
    }));
    container.register_blueprint(database_blueprint());
    container.register_definition(
        "database",
        Definition::new("Database").with_init("does_not_exist"),
    );

    assert!(container.get_instance("database").is_err());
    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec!["creating:database".to_string(), "failed:database".to_string()]
    );
}
