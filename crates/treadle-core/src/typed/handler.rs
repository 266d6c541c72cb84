//! Handler traits: the body of a task.
//!
//! Two layers:
//! - `Handler` is typed. Its input struct is decoded from the resolved
//!   bindings, its output is encoded back to JSON.
//! - `DynHandler` is object safe and works on `serde_json::Value`, so the
//!   graph can hold heterogeneous bodies as `Arc<dyn DynHandler>`.
//!
//! `TypedHandler<H>` erases a `Handler` into a `DynHandler`.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::HandlerError;

/// A typed task body.
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct EvaluateInput { test_target: Frame, prediction: Frame }
///
/// struct Evaluate;
///
/// #[async_trait]
/// impl Handler for Evaluate {
///     type Input = EvaluateInput;
///     type Output = Metrics;
///
///     async fn handle(&self, input: EvaluateInput) -> anyhow::Result<Metrics> {
///         metrics::evaluate(&input.test_target, &input.prediction)
///     }
/// }
/// ```
///
/// The input struct's field names are the task's binding names.
#[async_trait]
pub trait Handler: Send + Sync {
    type Input: DeserializeOwned + Send + 'static;
    type Output: Serialize + Send + 'static;

    async fn handle(&self, input: Self::Input) -> anyhow::Result<Self::Output>;
}

/// Object-safe task body.
///
/// - The method is not generic, so `dyn DynHandler` is a valid trait object.
/// - `inputs` is the JSON object of resolved bindings.
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, inputs: Value) -> Result<Value, HandlerError>;

    /// Name used in logs and debug output.
    fn name(&self) -> &str;
}

pub struct TypedHandler<H: Handler> {
    handler: H,
    _marker: PhantomData<fn() -> H::Input>,
}

impl<H: Handler> TypedHandler<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<H: Handler> DynHandler for TypedHandler<H> {
    async fn handle_dyn(&self, inputs: Value) -> Result<Value, HandlerError> {
        let input: H::Input = serde_json::from_value(inputs).map_err(HandlerError::Decode)?;
        let output = self.handler.handle(input).await?;
        serde_json::to_value(output).map_err(HandlerError::Encode)
    }

    fn name(&self) -> &str {
        std::any::type_name::<H>()
    }
}

/// A body built from an async closure over the raw JSON inputs.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> DynHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn handle_dyn(&self, inputs: Value) -> Result<Value, HandlerError> {
        Ok((self.f)(inputs).await?)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct AddInput {
        a: i64,
        b: i64,
    }

    #[derive(Serialize)]
    struct AddOutput {
        sum: i64,
    }

    struct Add;

    #[async_trait]
    impl Handler for Add {
        type Input = AddInput;
        type Output = AddOutput;

        async fn handle(&self, input: AddInput) -> anyhow::Result<AddOutput> {
            Ok(AddOutput {
                sum: input.a + input.b,
            })
        }
    }

    #[tokio::test]
    async fn typed_handler_decodes_and_encodes() {
        let handler = TypedHandler::new(Add);

        let out = handler.handle_dyn(json!({"a": 2, "b": 3})).await.unwrap();
        assert_eq!(out, json!({"sum": 5}));
        assert!(handler.name().ends_with("Add"));
    }

    #[tokio::test]
    async fn typed_handler_reports_decode_errors() {
        let handler = TypedHandler::new(Add);

        let err = handler.handle_dyn(json!({"a": 2})).await.unwrap_err();
        assert!(matches!(err, HandlerError::Decode(_)));
    }

    #[tokio::test]
    async fn fn_handler_passes_body_errors_through() {
        let handler = FnHandler::new("boom", |_| async { Err(anyhow::anyhow!("I/O error")) });

        let err = handler.handle_dyn(json!({})).await.unwrap_err();
        assert!(matches!(err, HandlerError::Body(_)));
        assert_eq!(handler.name(), "boom");
    }
}
