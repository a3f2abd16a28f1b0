use armature::{
    AnyArc, Blueprint, Container, ContainerError, ConversationScope, Definition, Proxy, Scope,
    UnscopedScope,
};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

struct Counter {
    id: i64,
    log: Arc<Mutex<Vec<String>>>,
}

fn counter_blueprint(seq: Arc<Mutex<i64>>, log: Arc<Mutex<Vec<String>>>) -> Blueprint {
    Blueprint::new::<Counter>("Counter")
        .with_default(move || {
            let mut next = seq.lock().unwrap();
            *next += 1;
            Counter {
                id: *next,
                log: log.clone(),
            }
        })
        .with_method("id", |c: &Counter, _args: &[AnyArc]| {
            Ok(Arc::new(c.id) as AnyArc)
        })
        .on_destroy(|c: &Counter| {
            c.log.lock().unwrap().push(format!("destroy:{}", c.id));
            Ok(())
        })
}

fn conversation_container() -> (Container, Arc<ConversationScope>, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let seq = Arc::new(Mutex::new(0));
    let container = Container::new();
    let scope = Arc::new(ConversationScope::new("conv-1"));
    container
        .register_scope("conversation", scope.clone())
        .unwrap();
    container.register_blueprint(counter_blueprint(seq, log.clone()));
    (container, scope, log)
}

#[test]
fn test_conversation_scope_caches_per_conversation() {
    let (container, scope, _log) = conversation_container();
    container.register_definition(
        "counter",
        Definition::new("Counter").with_scope("conversation"),
    );

    let first = container.get_typed::<Counter>("counter").unwrap();
    let again = container.get_typed::<Counter>("counter").unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(first.id, 1);

    scope.set_conversation("conv-2");
    let second = container.get_typed::<Counter>("counter").unwrap();
    assert_eq!(second.id, 2);

    scope.set_conversation("conv-1");
    let back = container.get_typed::<Counter>("counter").unwrap();
    assert!(Arc::ptr_eq(&first, &back));
}

#[test]
fn test_end_conversation_runs_destruction_callbacks() {
    let (container, scope, log) = conversation_container();
    container.register_definition(
        "counter",
        Definition::new("Counter").with_scope("conversation"),
    );

    container.get_instance("counter").unwrap();
    scope.set_conversation("conv-2");
    container.get_instance("counter").unwrap();

    scope.end_conversation("conv-2");
    assert_eq!(*log.lock().unwrap(), vec!["destroy:2".to_string()]);

    scope.end_conversation("conv-1");
    assert_eq!(
        *log.lock().unwrap(),
        vec!["destroy:2".to_string(), "destroy:1".to_string()]
    );
}

#[test]
fn test_unscoped_destroy_callbacks_never_auto_run() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let seq = Arc::new(Mutex::new(0));
    let container = Container::new();
    container.register_blueprint(counter_blueprint(seq, log.clone()));
    container.register_definition(
        "counter",
        Definition::new("Counter").with_scope("unscoped"),
    );

    container.get_instance("counter").unwrap();
    container.get_instance("counter").unwrap();
    assert!(container.shutdown().is_empty());
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_scope_names_singleton_and_unscoped_are_reserved() {
    let container = Container::new();
    let scope = Arc::new(ConversationScope::new("conv"));
    assert!(matches!(
        container.register_scope("singleton", scope.clone()),
        Err(ContainerError::Creation { .. })
    ));
    assert!(matches!(
        container.register_scope("unscoped", scope),
        Err(ContainerError::Creation { .. })
    ));
}

#[test]
fn test_unknown_scope_fails_resolution() {
    let (container, _scope, _log) = conversation_container();
    container.register_definition(
        "counter",
        Definition::new("Counter").with_scope("request"),
    );

    assert!(container.get_instance("counter").is_err());
}

#[test]
fn test_scoped_proxy_follows_the_active_conversation() {
    let (container, scope, _log) = conversation_container();
    container.register_definition(
        "counter",
        Definition::new("Counter")
            .with_scope("conversation")
            .with_scoped_proxy(),
    );

    let handle = container.get_instance("counter").unwrap();
    let proxy = handle.downcast::<Proxy>().unwrap();

    let id = |p: &Proxy| *p.invoke("id", &[]).unwrap().downcast::<i64>().unwrap();
    assert_eq!(id(&proxy), 1);
    assert_eq!(id(&proxy), 1);

    scope.set_conversation("conv-2");
    assert_eq!(id(&proxy), 2);

    scope.set_conversation("conv-1");
    assert_eq!(id(&proxy), 1);

    // The proxy handle itself is a stable singleton-like object.
    let again = container.get_instance("counter").unwrap();
    let again = again.downcast::<Proxy>().unwrap();
    assert!(Arc::ptr_eq(&proxy, &again));

    // The applied wrapping is recorded on the definition.
    let definition = container.get_definition("counter").unwrap();
    assert_eq!(definition.attribute("scoped-proxy"), Some("applied"));
    assert_eq!(definition.attribute("original-scope"), Some("conversation"));
}

#[test]
fn test_unscoped_callbacks_do_not_accumulate_per_name() {
    let scope = UnscopedScope::new();

    let first = Arc::new(());
    let weak = Arc::downgrade(&first);
    scope.register_destruction_callback("conn", Box::new(move || drop(first)));
    assert!(weak.upgrade().is_some());

    // Re-registering under the same name releases the previous capture.
    let second = Arc::new(());
    scope.register_destruction_callback("conn", Box::new(move || drop(second)));
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_conversation_race_keeps_one_instance_and_its_callback() {
    let scope = Arc::new(ConversationScope::new("conv"));
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    // registered: the slow thread has registered its callback mid-factory.
    // cached: the fast thread has finished its whole get and won the slot.
    let registered = Arc::new(Barrier::new(2));
    let cached = Arc::new(Barrier::new(2));

    let slow = thread::spawn({
        let scope = scope.clone();
        let log = log.clone();
        let registered = registered.clone();
        let cached = cached.clone();
        move || {
            scope
                .get("svc", &|| {
                    let log = log.clone();
                    scope.register_destruction_callback(
                        "svc",
                        Box::new(move || log.lock().unwrap().push("loser")),
                    );
                    registered.wait();
                    cached.wait();
                    Ok(Arc::new(11i64) as AnyArc)
                })
                .unwrap()
        }
    });

    let fast = thread::spawn({
        let scope = scope.clone();
        let log = log.clone();
        move || {
            registered.wait();
            let out = scope
                .get("svc", &|| {
                    let log = log.clone();
                    scope.register_destruction_callback(
                        "svc",
                        Box::new(move || log.lock().unwrap().push("winner")),
                    );
                    Ok(Arc::new(22i64) as AnyArc)
                })
                .unwrap();
            cached.wait();
            out
        }
    });

    let from_slow = slow.join().unwrap();
    let from_fast = fast.join().unwrap();

    // Both callers get the instance that won the cache slot.
    assert!(Arc::ptr_eq(&from_slow, &from_fast));
    assert_eq!(*from_fast.downcast::<i64>().unwrap(), 22);

    // Only the winner's callback runs; the discarded instance's was dropped.
    scope.end_conversation("conv");
    assert_eq!(*log.lock().unwrap(), vec!["winner"]);
}
