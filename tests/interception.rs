use armature::{
    Advisor, AfterReturningAdvice, AnyArc, AutoProxyProcessor, BeforeAdvice, Blueprint, Container,
    ContainerError, ContainerResult, Definition, FixedTargetSource, MethodInvocation,
    MethodMatcher, NameMethodMatcher, Proxy, StaticPointcut, TrueClassFilter, TypeClassFilter,
};
use std::sync::{Arc, Mutex};

struct Calculator {
    factor: i64,
}

fn calculator_blueprint() -> Blueprint {
    Blueprint::new::<Calculator>("Calculator")
        .with_default(|| Calculator { factor: 2 })
        .with_method("scale", |c: &Calculator, args: &[AnyArc]| {
            let n = args
                .first()
                .and_then(|a| a.downcast_ref::<i64>())
                .copied()
                .ok_or_else(|| ContainerError::creation("calculator", "scale needs an i64"))?;
            Ok(Arc::new(c.factor * n) as AnyArc)
        })
        .with_method("factor", |c: &Calculator, _args: &[AnyArc]| {
            Ok(Arc::new(c.factor) as AnyArc)
        })
}

struct Recording {
    log: Arc<Mutex<Vec<String>>>,
    tag: &'static str,
}

impl BeforeAdvice for Recording {
    fn before(&self, invocation: &MethodInvocation<'_>) -> ContainerResult<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("before:{}:{}", self.tag, invocation.method()));
        Ok(())
    }
}

impl AfterReturningAdvice for Recording {
    fn after_returning(
        &self,
        _invocation: &MethodInvocation<'_>,
        result: &AnyArc,
    ) -> ContainerResult<()> {
        let value = result.downcast_ref::<i64>().copied().unwrap_or(-1);
        self.log
            .lock()
            .unwrap()
            .push(format!("after:{}:{}", self.tag, value));
        Ok(())
    }
}

fn recording(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Arc<Recording> {
    Arc::new(Recording {
        log: log.clone(),
        tag,
    })
}

fn subclass_proxy(advisors: Vec<Arc<Advisor>>) -> Proxy {
    let registry = armature::BlueprintRegistry::new();
    registry.register(calculator_blueprint());
    let source = Arc::new(FixedTargetSource::new(
        Arc::new(Calculator { factor: 2 }) as AnyArc,
        "Calculator",
    ));
    armature::create_proxy(&registry, source, advisors, None).unwrap()
}

#[test]
fn test_chain_runs_in_registration_order_with_afters_unwound() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let proxy = subclass_proxy(vec![
        Arc::new(Advisor::before(recording(&log, "a"))),
        Arc::new(Advisor::after_returning(recording(&log, "b"))),
        Arc::new(Advisor::before(recording(&log, "c"))),
    ]);

    let result = proxy.invoke("scale", &[Arc::new(5i64) as AnyArc]).unwrap();
    assert_eq!(*result.downcast::<i64>().unwrap(), 10);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "before:a:scale".to_string(),
            "before:c:scale".to_string(),
            "after:b:10".to_string(),
        ]
    );
}

#[test]
fn test_pointcut_limits_advice_to_matched_methods() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let advisor = Advisor::before(recording(&log, "scoped"))
        .with_pointcut(Arc::new(StaticPointcut::for_methods(["scale"])));
    let proxy = subclass_proxy(vec![Arc::new(advisor)]);

    proxy.invoke("scale", &[Arc::new(3i64) as AnyArc]).unwrap();
    proxy.invoke("factor", &[]).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["before:scoped:scale".to_string()]);
}

#[test]
fn test_prefix_pattern_matches_method_names() {
    let matcher = NameMethodMatcher::new(["sc*", "reset"]);
    assert!(matcher.matches("scale", "Calculator"));
    assert!(matcher.matches("reset", "Calculator"));
    assert!(!matcher.matches("factor", "Calculator"));
}

#[test]
fn test_unknown_method_fails_invocation() {
    let proxy = subclass_proxy(Vec::new());
    assert!(matches!(
        proxy.invoke("divide", &[]),
        Err(ContainerError::ProxyInvocation(_))
    ));
}

struct PositiveFirstArg;

impl MethodMatcher for PositiveFirstArg {
    fn matches(&self, method: &str, _type_name: &str) -> bool {
        method == "scale"
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn matches_args(&self, _method: &str, _type_name: &str, args: &[AnyArc]) -> bool {
        args.first()
            .and_then(|a| a.downcast_ref::<i64>())
            .map(|n| *n > 0)
            .unwrap_or(false)
    }
}

#[test]
fn test_dynamic_matcher_is_rechecked_per_call() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let advisor = Advisor::before(recording(&log, "dyn")).with_pointcut(Arc::new(
        StaticPointcut::new(Arc::new(TrueClassFilter), Arc::new(PositiveFirstArg)),
    ));
    let proxy = subclass_proxy(vec![Arc::new(advisor)]);

    proxy.invoke("scale", &[Arc::new(4i64) as AnyArc]).unwrap();
    proxy.invoke("scale", &[Arc::new(-4i64) as AnyArc]).unwrap();
    proxy.invoke("scale", &[Arc::new(6i64) as AnyArc]).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["before:dyn:scale".to_string(), "before:dyn:scale".to_string()]
    );
}

#[test]
fn test_added_advisor_invalidates_cached_chains() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let proxy = subclass_proxy(vec![Arc::new(Advisor::before(recording(&log, "first")))]);

    proxy.invoke("scale", &[Arc::new(1i64) as AnyArc]).unwrap();
    proxy
        .config()
        .add_advisor(Arc::new(Advisor::before(recording(&log, "second"))))
        .unwrap();
    proxy.invoke("scale", &[Arc::new(1i64) as AnyArc]).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "before:first:scale".to_string(),
            "before:first:scale".to_string(),
            "before:second:scale".to_string(),
        ]
    );
}

#[test]
fn test_frozen_config_rejects_new_advisors() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let proxy = subclass_proxy(Vec::new());
    proxy.config().freeze();
    assert!(proxy.config().is_frozen());
    assert!(matches!(
        proxy
            .config()
            .add_advisor(Arc::new(Advisor::before(recording(&log, "late")))),
        Err(ContainerError::ProxyCreation(_))
    ));
}

#[test]
fn test_interface_proxy_exposes_only_declared_methods() {
    let registry = armature::BlueprintRegistry::new();
    registry.register_interface("Scaling", vec!["scale"]);
    registry.register(calculator_blueprint().implements("Scaling"));
    let source = Arc::new(FixedTargetSource::new(
        Arc::new(Calculator { factor: 3 }) as AnyArc,
        "Calculator",
    ));
    let proxy = armature::create_proxy(&registry, source, Vec::new(), None).unwrap();

    assert!(proxy.implements_interface("Scaling"));
    assert!(!proxy.is_subclass());

    let result = proxy.invoke("scale", &[Arc::new(7i64) as AnyArc]).unwrap();
    assert_eq!(*result.downcast::<i64>().unwrap(), 21);
    // Present in the method table but not declared by the interface.
    assert!(matches!(
        proxy.invoke("factor", &[]),
        Err(ContainerError::ProxyInvocation(_))
    ));
}

#[test]
fn test_undeclared_interface_fails_proxy_creation() {
    let registry = armature::BlueprintRegistry::new();
    registry.register(calculator_blueprint().implements("Scaling"));
    let source = Arc::new(FixedTargetSource::new(
        Arc::new(Calculator { factor: 2 }) as AnyArc,
        "Calculator",
    ));
    assert!(matches!(
        armature::create_proxy(&registry, source, Vec::new(), None),
        Err(ContainerError::ProxyCreation(_))
    ));
}

#[test]
fn test_auto_proxy_processor_wraps_matching_instances() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new();
    container.register_blueprint(calculator_blueprint());
    container.register_definition("calculator", Definition::new("Calculator"));

    let processor = Arc::new(AutoProxyProcessor::new(container.blueprints().clone()));
    processor.add_advisor(Arc::new(Advisor::before(recording(&log, "auto")).with_pointcut(
        Arc::new(StaticPointcut::new(
            Arc::new(TypeClassFilter::new("Calculator")),
            Arc::new(NameMethodMatcher::new(["scale"])),
        )),
    )));
    container.add_post_processor(processor);

    let handle = container.get_instance("calculator").unwrap();
    let proxy = handle.downcast::<Proxy>().unwrap();
    let result = proxy.invoke("scale", &[Arc::new(9i64) as AnyArc]).unwrap();
    assert_eq!(*result.downcast::<i64>().unwrap(), 18);
    assert_eq!(*log.lock().unwrap(), vec!["before:auto:scale".to_string()]);

    // The cached singleton is the proxy itself.
    let again = container.get_instance("calculator").unwrap();
    let again = again.downcast::<Proxy>().unwrap();
    assert!(Arc::ptr_eq(&proxy, &again));
}

#[test]
fn test_auto_proxy_skips_types_out_of_scope() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new();
    container.register_blueprint(calculator_blueprint());
    container.register_definition("calculator", Definition::new("Calculator"));

    let processor = Arc::new(AutoProxyProcessor::new(container.blueprints().clone()));
    processor.add_advisor(Arc::new(Advisor::before(recording(&log, "auto")).with_pointcut(
        Arc::new(StaticPointcut::new(
            Arc::new(TypeClassFilter::new("SomethingElse")),
            Arc::new(NameMethodMatcher::new(["scale"])),
        )),
    )));
    container.add_post_processor(processor);

    let handle = container.get_instance("calculator").unwrap();
    assert!(handle.downcast::<Calculator>().is_ok());
}

struct FailingBefore;

impl BeforeAdvice for FailingBefore {
    fn before(&self, _invocation: &MethodInvocation<'_>) -> ContainerResult<()> {
        Err(ContainerError::ProxyInvocation("vetoed".to_string()))
    }
}

#[test]
fn test_failing_before_advice_aborts_the_call() {
    let proxy = subclass_proxy(vec![Arc::new(Advisor::before(Arc::new(FailingBefore)))]);
    assert!(matches!(
        proxy.invoke("scale", &[Arc::new(2i64) as AnyArc]),
        Err(ContainerError::ProxyInvocation(_))
    ));
}
