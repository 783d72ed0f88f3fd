//! Writing models, collections and errors to a JSON response.
//!
//! The transport is abstracted by [`ResponseSink`]: anything that can take a status
//! and a JSON body and exposes per-response [`ResponseLocals`]. Handlers place the
//! resource they loaded in the locals and finish with [`send_json`], or report a
//! failure with [`send_error`]. Neither function can fail.

use std::{error::Error as StdError, fmt, sync::Arc};

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::{
    error::ModelError,
    projection::{Projectable, ProjectionOptions},
};

/// Status written by [`send_json`].
pub const STATUS_OK: u16 = 200;

/// Status written for errors that are not a [`ModelError`].
pub const STATUS_INTERNAL: u16 = 500;

/// What the response utilities need from the incoming request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Overrides the default projection of the rendered resource.
    pub projection: Option<ProjectionOptions>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(projection: ProjectionOptions) -> Self {
        Self { projection: Some(projection) }
    }
}

/// Per-response scratch space shared between a handler and [`send_json`].
#[derive(Clone, Default)]
pub struct ResponseLocals {
    pub resource: Option<Arc<dyn Projectable>>,
}

impl ResponseLocals {
    pub fn set_resource<P: Projectable + 'static>(&mut self, resource: P) {
        self.resource = Some(Arc::new(resource));
    }
}

impl fmt::Debug for ResponseLocals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseLocals")
            .field("resource", &self.resource.is_some())
            .finish()
    }
}

/// A response being built by a transport.
pub trait ResponseSink {
    fn locals(&self) -> &ResponseLocals;

    fn status(&mut self, code: u16);

    fn json(&mut self, body: Value);
}

/// A [`ResponseSink`] that keeps what was written.
#[derive(Debug, Clone, Default)]
pub struct JsonReply {
    locals: ResponseLocals,
    status: Option<u16>,
    body: Option<Value>,
}

impl JsonReply {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reply whose locals carry `resource`.
    pub fn with_resource<P: Projectable + 'static>(resource: P) -> Self {
        let mut reply = Self::default();
        reply.locals.set_resource(resource);
        reply
    }

    pub fn locals_mut(&mut self) -> &mut ResponseLocals {
        &mut self.locals
    }

    /// The written status, if any.
    pub fn status_code(&self) -> Option<u16> {
        self.status
    }

    /// The written body, if any.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn into_parts(self) -> (Option<u16>, Option<Value>) {
        (self.status, self.body)
    }
}

impl ResponseSink for JsonReply {
    fn locals(&self) -> &ResponseLocals {
        &self.locals
    }

    fn status(&mut self, code: u16) {
        self.status = Some(code);
    }

    fn json(&mut self, body: Value) {
        self.body = Some(body);
    }
}

/// Renders the resource held in the response locals with status 200.
///
/// The request's projection is used when present, the resource's default otherwise.
/// Without a resource the body is `null`.
pub fn send_json<S: ResponseSink + ?Sized>(request: &RequestContext, response: &mut S) {
    let body = match &response.locals().resource {
        Some(resource) => resource.project(request.projection.as_ref()),
        None => {
            warn!("no resource to send, replying with an empty body");
            Value::Null
        }
    };

    response.status(STATUS_OK);
    response.json(body);
}

/// Writes `error` as a status and an error payload.
///
/// See [`error_response`] for the mapping.
pub fn send_error<S: ResponseSink + ?Sized>(
    _request: &RequestContext,
    response: &mut S,
    error: &(dyn StdError + 'static),
) {
    let (status, body) = error_response(error);

    if status >= STATUS_INTERNAL {
        warn!(status, %error, "sending error response");
    } else {
        debug!(status, %error, "sending error response");
    }

    response.status(status);
    response.json(body);
}

/// Maps an error to its status and `{"error": {"kind", "message", ...}}` payload.
///
/// A [`ModelError`] uses its own status and kind; `NotFound` also reports the
/// namespace and id. Any other error is reported as `internal` with status 500.
pub fn error_response(error: &(dyn StdError + 'static)) -> (u16, Value) {
    let Some(model_error) = error.downcast_ref::<ModelError>() else {
        return (
            STATUS_INTERNAL,
            json!({ "error": { "kind": "internal", "message": error.to_string() } }),
        );
    };

    let mut details = Map::new();
    details.insert("kind".to_string(), model_error.kind().as_str().into());
    details.insert("message".to_string(), model_error.to_string().into());

    if let ModelError::NotFound { namespace, id } = model_error.root() {
        details.insert("namespace".to_string(), namespace.clone().into());
        details.insert("id".to_string(), id.clone().into());
    }

    if let ModelError::AggregateFailure(_) = model_error {
        details.insert("cause".to_string(), model_error.root().kind().as_str().into());
    }

    (model_error.status_code(), json!({ "error": details }))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Value);

    impl Projectable for Fixed {
        fn project(&self, options: Option<&ProjectionOptions>) -> Value {
            match (options, &self.0) {
                (Some(options), Value::Object(attributes)) => {
                    crate::projection::project(attributes, options)
                }
                _ => self.0.clone(),
            }
        }
    }

    #[test]
    fn sends_resource_with_request_projection() {
        let mut reply = JsonReply::with_resource(Fixed(json!({ "id": "a", "title": "foo" })));

        send_json(&RequestContext::new(), &mut reply);
        assert_eq!(reply.status_code(), Some(200));
        assert_eq!(reply.body(), Some(&json!({ "id": "a", "title": "foo" })));

        let request = RequestContext::with_projection(ProjectionOptions::only(["title"]));
        send_json(&request, &mut reply);
        assert_eq!(reply.body(), Some(&json!({ "title": "foo" })));
    }

    #[test]
    fn sends_null_without_resource() {
        let mut reply = JsonReply::new();

        send_json(&RequestContext::new(), &mut reply);

        assert_eq!(reply.into_parts(), (Some(200), Some(Value::Null)));
    }

    #[test]
    fn maps_plain_errors_to_internal() {
        let mut reply = JsonReply::new();
        let err = std::io::Error::other("Foo error");

        send_error(&RequestContext::new(), &mut reply, &err);

        assert_eq!(reply.status_code(), Some(500));
        assert_eq!(
            reply.body(),
            Some(&json!({ "error": { "kind": "internal", "message": "Foo error" } }))
        );
    }

    #[test]
    fn maps_model_errors_by_kind() {
        let cases = [
            (ModelError::ValidationFailed("foo reason".into()), 400, "validation_failed"),
            (ModelError::MissingId, 400, "missing_id"),
            (ModelError::InvalidFilter("bad".into()), 400, "invalid_filter"),
            (ModelError::store("down"), 502, "store_failure"),
            (ModelError::Initialization("no uri".into()), 500, "initialization"),
        ];

        for (err, status, kind) in cases {
            let (actual, body) = error_response(&err);
            assert_eq!(actual, status, "{err}");
            assert_eq!(body["error"]["kind"], json!(kind));
            assert_eq!(body["error"]["message"], json!(err.to_string()));
        }
    }

    #[test]
    fn not_found_reports_address() {
        let err = ModelError::AggregateFailure(Box::new(ModelError::not_found("tests", "abc")));
        let (status, body) = error_response(&err);

        assert_eq!(status, 404);
        assert_eq!(body["error"]["kind"], json!("aggregate_failure"));
        assert_eq!(body["error"]["cause"], json!("not_found"));
        assert_eq!(body["error"]["namespace"], json!("tests"));
        assert_eq!(body["error"]["id"], json!("abc"));
    }
}
