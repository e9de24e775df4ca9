// src/api.rs
use crate::config::AppConfig;
use crate::counter::RequestCounter;
use crate::delay::DelaySpec;
use crate::executor::{Execution, execute};
use crate::registry::{ComponentKind, ComponentRegistry};
use crate::shutdown::Interrupt;
use crate::simulator::WorkloadSimulator;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::types::{ExecutionModel, current_thread_name};
use hyper::{Method, StatusCode};
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_INPUT: &str = "test";
pub const POOL_EXECUTOR: &str = "tokio-blocking-pool";

/// JSON status + body handed back to the HTTP layer.
pub type Reply = (StatusCode, Value);

/// One family of workload endpoints under a common path prefix.
pub struct ServiceController {
    prefix: &'static str,
    service: &'static str,
    simulator: Arc<WorkloadSimulator>,
    actions: Vec<(&'static str, ExecutionModel)>,
}

impl ServiceController {
    /// `/threads`: platform thread, blocking pool, lightweight task.
    pub fn threads(simulator: Arc<WorkloadSimulator>) -> Self {
        Self {
            prefix: "threads",
            service: "Threads Controller",
            simulator,
            actions: vec![
                ("sync", ExecutionModel::Platform),
                ("async", ExecutionModel::Pool),
                ("virtual", ExecutionModel::Virtual),
            ],
        }
    }

    /// `/tasks`: platform thread, inline coroutine, lightweight task.
    pub fn tasks(simulator: Arc<WorkloadSimulator>) -> Self {
        Self {
            prefix: "tasks",
            service: "Tasks Controller",
            simulator,
            actions: vec![
                ("sync", ExecutionModel::Platform),
                ("coroutine", ExecutionModel::Coroutine),
                ("virtual", ExecutionModel::Virtual),
            ],
        }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    pub fn model_for(&self, action: &str) -> Option<ExecutionModel> {
        self.actions
            .iter()
            .find(|(name, _)| *name == action)
            .map(|(_, model)| *model)
    }

    pub async fn run(&self, model: ExecutionModel, input: String) -> Reply {
        let start = Instant::now();
        let outcome = execute(Arc::clone(&self.simulator), model, input).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(exec) => {
                debug!(
                    target = "api",
                    service = self.simulator.name(),
                    sequence = exec.result.sequence,
                    delay_ms = exec.result.delay_ms(),
                    elapsed_ms,
                    thread = %exec.thread_name,
                    "workload done"
                );
                (StatusCode::OK, self.success_body(&exec, elapsed_ms))
            }
            Err(e) => {
                warn!(target = "api", service = self.simulator.name(), %model, error = %e, "workload failed");
                let body = json!({
                    "error": e.to_string(),
                    "processingTime": elapsed_ms,
                    "threadType": format!("{} Error", model.thread_type()),
                    "threadName": current_thread_name(),
                });
                (StatusCode::SERVICE_UNAVAILABLE, body)
            }
        }
    }

    fn success_body(&self, exec: &Execution, elapsed_ms: u64) -> Value {
        let r = &exec.result;
        let mut result = format!(
            "{} {} [{}]: Processed '{}' in {}ms on {}",
            self.simulator.name(),
            exec.model.mode(),
            r.sequence,
            r.input,
            r.delay_ms(),
            exec.thread_name
        );
        if exec.model.is_virtual() {
            result.push_str(" (virtual=true)");
        }

        let mut body = Map::new();
        body.insert("result".into(), json!(result));
        body.insert("processingTime".into(), json!(elapsed_ms));
        body.insert("threadType".into(), json!(exec.model.thread_type()));
        body.insert("threadName".into(), json!(exec.thread_name));
        match exec.model {
            ExecutionModel::Pool => {
                body.insert("executor".into(), json!(POOL_EXECUTOR));
            }
            ExecutionModel::Virtual => {
                body.insert("isVirtual".into(), json!(true));
            }
            ExecutionModel::Platform | ExecutionModel::Coroutine => {}
        }
        Value::Object(body)
    }

    pub fn health(&self) -> Value {
        json!({
            "status": "UP",
            "service": self.service,
            "currentThread": current_thread_name(),
            "isVirtual": false,
            "requestsProcessed": self.simulator.requests_processed(),
            "details": self.simulator.health(),
        })
    }
}

/// Read-only views over the component registry.
pub struct DiagnosticController {
    registry: Arc<ComponentRegistry>,
    relevant_keywords: Vec<String>,
}

/// Components whose presence `/diagnostic/status` reports on.
const STATUS_CHECKS: [&str; 2] = ["threadsController", "threadsSimulator"];

impl DiagnosticController {
    pub fn new(registry: Arc<ComponentRegistry>, relevant_keywords: Vec<String>) -> Self {
        Self {
            registry,
            relevant_keywords,
        }
    }

    pub fn components(&self) -> Value {
        json!({
            "totalComponents": self.registry.len(),
            "relevantComponents": self.registry.matching(&self.relevant_keywords),
            "allControllers": self.registry.of_kind(ComponentKind::Controller),
            "allServices": self.registry.of_kind(ComponentKind::Service),
        })
    }

    pub fn controllers(&self) -> Value {
        json!({ "controllers": self.registry.of_kind(ComponentKind::Controller) })
    }

    pub fn services(&self) -> Value {
        json!({ "services": self.registry.of_kind(ComponentKind::Service) })
    }

    /// Lookup failures are reported per entry instead of failing the response.
    pub fn status(&self) -> Value {
        let mut status = Map::new();
        for name in STATUS_CHECKS {
            let entry = match self.registry.lookup(name) {
                Ok(c) => json!({ "found": true, "type": c.type_name }),
                Err(e) => json!({ "found": false, "error": e.to_string() }),
            };
            status.insert(name.to_string(), entry);
        }
        Value::Object(status)
    }
}

/// Everything the HTTP layer routes to.
pub struct App {
    controllers: Vec<ServiceController>,
    diagnostic: DiagnosticController,
    registry: Arc<ComponentRegistry>,
}

impl App {
    /// Wire simulators, controllers and the registry from config.
    pub fn new(cfg: &AppConfig, interrupt: Interrupt) -> Self {
        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper::new(interrupt));
        Self::with_sleeper(cfg, sleeper)
    }

    pub fn with_sleeper(cfg: &AppConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        let delays = DelaySpec::from(&cfg.workload);
        let simulator = |name: &str| {
            Arc::new(WorkloadSimulator::new(
                name,
                Arc::new(RequestCounter::new()),
                delays,
                Arc::clone(&sleeper),
            ))
        };

        let registry = Arc::new(ComponentRegistry::new());
        registry.register::<AppConfig>("appConfig", ComponentKind::Configuration);
        registry.register::<TokioSleeper>("tokioSleeper", ComponentKind::Service);
        registry.register::<WorkloadSimulator>("threadsSimulator", ComponentKind::Service);
        registry.register::<WorkloadSimulator>("tasksSimulator", ComponentKind::Service);
        registry.register::<ServiceController>("threadsController", ComponentKind::Controller);
        registry.register::<ServiceController>("tasksController", ComponentKind::Controller);
        registry.register::<DiagnosticController>("diagnosticController", ComponentKind::Controller);

        let controllers = vec![
            ServiceController::threads(simulator("Threads")),
            ServiceController::tasks(simulator("Tasks")),
        ];
        let diagnostic = DiagnosticController::new(
            Arc::clone(&registry),
            cfg.diagnostic.relevant_keywords.clone(),
        );

        Self {
            controllers,
            diagnostic,
            registry,
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Route one request. `query` is the raw query string, if any.
    pub async fn handle(&self, method: &Method, path: &str, query: Option<&str>) -> Reply {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let [prefix, action] = segments.as_slice() else {
            return not_found(path);
        };

        if *prefix == "diagnostic" {
            let body = match *action {
                "components" => self.diagnostic.components(),
                "controllers" => self.diagnostic.controllers(),
                "services" => self.diagnostic.services(),
                "status" => self.diagnostic.status(),
                _ => return not_found(path),
            };
            return only_get(method, path, body);
        }

        let Some(controller) = self.controllers.iter().find(|c| c.prefix() == *prefix) else {
            return not_found(path);
        };

        if *action == "health" {
            return only_get(method, path, controller.health());
        }

        let Some(model) = controller.model_for(action) else {
            return not_found(path);
        };
        if *method != Method::GET {
            return method_not_allowed(method, path);
        }

        let input = query
            .and_then(|q| query_param(q, "input"))
            .unwrap_or_else(|| DEFAULT_INPUT.to_string());
        controller.run(model, input).await
    }
}

fn only_get(method: &Method, path: &str, body: Value) -> Reply {
    if *method == Method::GET {
        (StatusCode::OK, body)
    } else {
        method_not_allowed(method, path)
    }
}

fn not_found(path: &str) -> Reply {
    (
        StatusCode::NOT_FOUND,
        json!({ "error": "not found", "path": path }),
    )
}

fn method_not_allowed(method: &Method, path: &str) -> Reply {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        json!({ "error": format!("method {method} not allowed"), "path": path }),
    )
}

/// First value of `key` in a form-encoded query string. `+` decodes to a space.
pub fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if decode_component(k) == key {
            Some(decode_component(v))
        } else {
            None
        }
    })
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleeper::SleepInterrupted;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoopSleeper;

    #[async_trait]
    impl Sleeper for NoopSleeper {
        async fn sleep(&self, _duration: Duration) -> Result<(), SleepInterrupted> {
            Ok(())
        }
    }

    fn app() -> App {
        App::with_sleeper(&AppConfig::default(), Arc::new(NoopSleeper))
    }

    #[test]
    fn query_param_decodes() {
        assert_eq!(query_param("input=hello", "input").as_deref(), Some("hello"));
        assert_eq!(query_param("a=1&input=a+b%21", "input").as_deref(), Some("a b!"));
        assert_eq!(query_param("input=", "input").as_deref(), Some(""));
        assert_eq!(query_param("input", "input").as_deref(), Some(""));
        assert_eq!(query_param("other=1", "input"), None);
        assert_eq!(query_param("input=%E2%9C%93", "input").as_deref(), Some("✓"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sync_endpoint_defaults_input() {
        let app = app();
        let (status, body) = app.handle(&Method::GET, "/threads/sync", None).await;
        assert_eq!(status, StatusCode::OK);
        let result = body["result"].as_str().unwrap();
        assert!(result.starts_with("Threads Sync [1]: Processed 'test' in "), "{result}");
        assert_eq!(body["threadType"], "Platform Thread");
        assert!(body["processingTime"].is_u64());
        assert!(body["threadName"].is_string());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn model_specific_fields() {
        let app = app();

        let (_, body) = app.handle(&Method::GET, "/threads/async", Some("input=x")).await;
        assert_eq!(body["executor"], POOL_EXECUTOR);
        assert_eq!(body["threadType"], "Async with Blocking Pool");

        let (_, body) = app.handle(&Method::GET, "/tasks/virtual", Some("input=x")).await;
        assert_eq!(body["isVirtual"], true);
        assert!(body["result"].as_str().unwrap().ends_with("(virtual=true)"));

        let (_, body) = app.handle(&Method::GET, "/tasks/coroutine", Some("input=")).await;
        assert_eq!(body["threadType"], "Coroutine");
        assert!(body["result"].as_str().unwrap().contains("Processed '' in"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn services_count_independently() {
        let app = app();
        app.handle(&Method::GET, "/threads/sync", None).await;
        app.handle(&Method::GET, "/threads/virtual", None).await;
        let (_, body) = app.handle(&Method::GET, "/tasks/coroutine", None).await;
        assert!(body["result"].as_str().unwrap().starts_with("Tasks Coroutine [1]"));

        let (_, health) = app.handle(&Method::GET, "/threads/health", None).await;
        assert_eq!(health["status"], "UP");
        assert_eq!(health["service"], "Threads Controller");
        assert_eq!(health["requestsProcessed"], 2);
        assert_eq!(health["isVirtual"], false);
    }

    #[tokio::test]
    async fn unknown_routes_and_methods() {
        let app = app();
        let (status, _) = app.handle(&Method::GET, "/threads/coroutine", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.handle(&Method::GET, "/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.handle(&Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.handle(&Method::POST, "/tasks/coroutine", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _) = app.handle(&Method::DELETE, "/diagnostic/status", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn diagnostic_views() {
        let app = app();
        let (status, body) = app.handle(&Method::GET, "/diagnostic/components", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalComponents"], app.registry().len());
        assert!(body["allControllers"]["threadsController"]
            .as_str()
            .unwrap()
            .ends_with("ServiceController"));
        assert!(body["allServices"].get("tasksSimulator").is_some());
        assert!(body["relevantComponents"].get("threadsSimulator").is_some());
        assert!(body["relevantComponents"].get("appConfig").is_none());

        let (_, body) = app.handle(&Method::GET, "/diagnostic/controllers", None).await;
        assert_eq!(body["controllers"].as_object().unwrap().len(), 3);

        let (_, body) = app.handle(&Method::GET, "/diagnostic/services", None).await;
        assert_eq!(body["services"].as_object().unwrap().len(), 3);

        let (_, body) = app.handle(&Method::GET, "/diagnostic/status", None).await;
        assert_eq!(body["threadsController"]["found"], true);
        assert_eq!(body["threadsSimulator"]["found"], true);
    }

    #[tokio::test]
    async fn status_reports_missing_components_inline() {
        let registry = Arc::new(ComponentRegistry::new());
        registry.register::<ServiceController>("threadsController", ComponentKind::Controller);
        let diag = DiagnosticController::new(registry, vec![]);

        let status = diag.status();
        assert_eq!(status["threadsController"]["found"], true);
        assert_eq!(status["threadsSimulator"]["found"], false);
        assert_eq!(
            status["threadsSimulator"]["error"],
            "no component named 'threadsSimulator'"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn interrupted_call_is_503() {
        let interrupt = Interrupt::new();
        interrupt.fire();
        let app = App::new(&AppConfig::default(), interrupt);

        let (status, body) = app.handle(&Method::GET, "/tasks/coroutine", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "processing interrupted for request 1");
        assert_eq!(body["threadType"], "Coroutine Error");
    }
}
