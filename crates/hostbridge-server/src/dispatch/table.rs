//! Command-type routing.
//!
//! The table maps each command type to a handler that runs against the host
//! state. Two types are built in and never reach a host handler: `heartbeat`
//! answers immediately so it can report liveness regardless of main-thread
//! backlog, and `get_status` (alias `get_server_status`) answers from the
//! server's own statistics.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use hostbridge_protocol::{Command, GET_SERVER_STATUS, GET_STATUS, HEARTBEAT, Response};

use super::errors::{DispatchError, HandlerError};
use super::panic::contain;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Parameters passed to a handler.
pub type Params = Map<String, Value>;

/// Result of a host handler.
pub type HandlerResult = Result<Value, HandlerError>;

type Handler<H> = Arc<dyn Fn(&mut H, &Params) -> HandlerResult + Send + Sync>;

/// Supplies the payload for status queries.
pub trait StatusSource: Send + Sync {
    /// Returns the current status report as JSON.
    fn status_json(&self) -> Value;
}

/// How a command type is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Answered on the connection thread without touching host state.
    Inline,
    /// Queued for the main thread.
    Queued,
    /// No handler exists.
    Unknown,
}

/// Registry of command handlers for host state `H`.
pub struct DispatchTable<H> {
    handlers: HashMap<String, Handler<H>>,
    status: Option<Arc<dyn StatusSource>>,
}

impl<H> DispatchTable<H> {
    /// Creates a table containing only the built-in commands.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            status: None,
        }
    }

    /// Registers `handler` for `kind`, replacing any previous registration.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Reserved`] for built-in type names and
    /// [`DispatchError::EmptyKind`] for blank names.
    pub fn register<F>(&mut self, kind: impl Into<String>, handler: F) -> Result<(), DispatchError>
    where
        F: Fn(&mut H, &Params) -> HandlerResult + Send + Sync + 'static,
    {
        let kind = kind.into().trim().to_owned();
        if kind.is_empty() {
            return Err(DispatchError::EmptyKind);
        }
        if is_builtin(&kind) {
            return Err(DispatchError::reserved(kind));
        }
        if self.handlers.insert(kind.clone(), Arc::new(handler)).is_some() {
            debug!(target: DISPATCH_TARGET, kind = %kind, "replaced command handler");
        }
        Ok(())
    }

    /// Builder form of [`DispatchTable::register`].
    ///
    /// # Errors
    ///
    /// See [`DispatchTable::register`].
    pub fn with_handler<F>(mut self, kind: impl Into<String>, handler: F) -> Result<Self, DispatchError>
    where
        F: Fn(&mut H, &Params) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(kind, handler)?;
        Ok(self)
    }

    /// Installs the source answering status queries.
    pub(crate) fn set_status_source(&mut self, source: Arc<dyn StatusSource>) {
        self.status = Some(source);
    }

    /// Classifies a command type.
    pub fn route(&self, kind: &str) -> Route {
        let kind = kind.trim();
        if is_builtin(kind) {
            Route::Inline
        } else if self.handlers.contains_key(kind) {
            Route::Queued
        } else {
            Route::Unknown
        }
    }

    /// Returns the registered host command types in sorted order.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Answers commands that do not need host state.
    ///
    /// Returns `None` when the command must be queued for the main thread.
    pub fn dispatch_inline(&self, command: &Command) -> Option<Response> {
        match command.kind() {
            HEARTBEAT => Some(Response::heartbeat()),
            GET_STATUS | GET_SERVER_STATUS => Some(match &self.status {
                Some(source) => Response::success(source.status_json()),
                None => Response::error("Server status is unavailable"),
            }),
            kind if self.handlers.contains_key(kind) => None,
            kind => {
                warn!(target: DISPATCH_TARGET, kind = %kind, "unknown command type");
                Some(DispatchError::unknown_command(kind).to_response())
            }
        }
    }

    /// Dispatches a command against the host state.
    ///
    /// Never panics: handler errors and handler panics become error
    /// responses.
    pub fn dispatch(&self, host: &mut H, command: &Command) -> Response {
        if let Some(response) = self.dispatch_inline(command) {
            return response;
        }
        let kind = command.kind();
        let Some(handler) = self.handlers.get(kind) else {
            return DispatchError::unknown_command(kind).to_response();
        };

        match contain(|| handler(host, &command.params)) {
            Ok(Ok(data)) => Response::success(data),
            Ok(Err(error)) => {
                debug!(target: DISPATCH_TARGET, kind = %kind, error = %error, "handler failed");
                DispatchError::Handler(error).to_response()
            }
            Err(caught) => {
                warn!(
                    target: DISPATCH_TARGET,
                    kind = %kind,
                    message = %caught.message,
                    "handler panicked"
                );
                DispatchError::Panicked {
                    kind: kind.to_owned(),
                    message: caught.message,
                    traceback: caught.backtrace,
                }
                .to_response()
            }
        }
    }
}

impl<H> Default for DispatchTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for DispatchTable<H> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DispatchTable")
            .field("kinds", &self.kinds())
            .field("status", &self.status.is_some())
            .finish()
    }
}

fn is_builtin(kind: &str) -> bool {
    matches!(kind, HEARTBEAT | GET_STATUS | GET_SERVER_STATUS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[derive(Default)]
    struct Counter {
        value: i64,
    }

    struct FixedStatus;

    impl StatusSource for FixedStatus {
        fn status_json(&self) -> Value {
            json!({"server": {"running": true}})
        }
    }

    #[fixture]
    fn table() -> DispatchTable<Counter> {
        DispatchTable::new()
            .with_handler("add", |host: &mut Counter, params: &Params| {
                let amount = params
                    .get("amount")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| HandlerError::new("amount must be an integer"))?;
                host.value += amount;
                Ok(json!({"value": host.value}))
            })
            .and_then(|table| {
                table.with_handler("explode", |_host: &mut Counter, _params: &Params| {
                    panic!("kaboom")
                })
            })
            .expect("register handlers")
    }

    #[rstest]
    #[case::heartbeat(HEARTBEAT, Route::Inline)]
    #[case::status(GET_STATUS, Route::Inline)]
    #[case::status_alias(GET_SERVER_STATUS, Route::Inline)]
    #[case::registered("add", Route::Queued)]
    #[case::unknown("bogus", Route::Unknown)]
    fn routes_command_types(table: DispatchTable<Counter>, #[case] kind: &str, #[case] expected: Route) {
        assert_eq!(table.route(kind), expected);
    }

    #[rstest]
    #[case::bogus("bogus")]
    #[case::empty("")]
    #[case::near_miss("Heartbeat")]
    fn unknown_types_answer_with_named_error(table: DispatchTable<Counter>, #[case] kind: &str) {
        let mut host = Counter::default();
        let response = table.dispatch(&mut host, &Command::new(kind));
        assert_eq!(
            response,
            Response::error(format!("Unknown command type: {kind}"))
        );
    }

    #[rstest]
    fn runs_registered_handler(table: DispatchTable<Counter>) {
        let mut host = Counter::default();
        let response = table.dispatch(&mut host, &Command::new("add").with_param("amount", 4));
        assert_eq!(response, Response::success(json!({"value": 4})));
        assert_eq!(host.value, 4);
    }

    #[rstest]
    fn wraps_handler_errors(table: DispatchTable<Counter>) {
        let mut host = Counter::default();
        let response = table.dispatch(&mut host, &Command::new("add"));
        assert_eq!(response, Response::error("amount must be an integer"));
    }

    #[rstest]
    fn contains_handler_panics(table: DispatchTable<Counter>) {
        let mut host = Counter::default();
        let response = table.dispatch(&mut host, &Command::new("explode"));
        let Response::Error { message, traceback } = response else {
            panic!("expected error response");
        };
        assert_eq!(message, "Handler for 'explode' panicked: kaboom");
        assert!(traceback.is_some());
    }

    #[rstest]
    fn heartbeat_never_touches_host(table: DispatchTable<Counter>) {
        let response = table.dispatch_inline(&Command::heartbeat()).expect("inline");
        assert!(response.is_heartbeat());
    }

    #[rstest]
    fn status_requires_a_source(mut table: DispatchTable<Counter>) {
        let response = table.dispatch_inline(&Command::new(GET_STATUS)).expect("inline");
        assert!(!response.is_success());

        table.set_status_source(Arc::new(FixedStatus));
        let response = table
            .dispatch_inline(&Command::new(GET_SERVER_STATUS))
            .expect("inline");
        assert_eq!(response.data(), Some(&json!({"server": {"running": true}})));
    }

    #[rstest]
    fn registered_types_are_not_inline(table: DispatchTable<Counter>) {
        assert!(table.dispatch_inline(&Command::new("add")).is_none());
    }

    #[rstest]
    #[case::heartbeat(HEARTBEAT)]
    #[case::status(GET_STATUS)]
    fn rejects_builtin_registration(mut table: DispatchTable<Counter>, #[case] kind: &str) {
        let error = table
            .register(kind, |_host: &mut Counter, _params: &Params| Ok(Value::Null))
            .expect_err("built-in names are reserved");
        assert_eq!(error, DispatchError::reserved(kind));
    }

    #[rstest]
    fn lists_registered_kinds(table: DispatchTable<Counter>) {
        assert_eq!(table.kinds(), ["add", "explode"]);
    }
}
