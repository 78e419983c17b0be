//! Tool registration and dispatch.
//!
//! Each [`Tool`] is generic over its own input and output types. Registering
//! it compiles JSON Schema validators for both and erases the types behind
//! [`ErasedTool`], so the router keeps a single name-indexed table without
//! knowing any concrete tool shape.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use jsonschema::{Draft, Validator};
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::envelope::{describe_envelope, to_error_result, ToolEnvelope};
use crate::error::{RouterError, ToolError};
use crate::tool_name::ToolName;

type Handler<C, I, O> = Box<dyn Fn(&C, I) -> Result<O, ToolError> + Send + Sync>;

/// A tool as written by its author: name, description, and typed handler.
pub struct Tool<C, I, O> {
    name: ToolName,
    description: String,
    handler: Handler<C, I, O>,
}

impl<C, I, O> Tool<C, I, O>
where
    C: 'static,
    I: JsonSchema + DeserializeOwned + 'static,
    O: JsonSchema + Serialize + 'static,
{
    pub fn new<F>(name: ToolName, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&C, I) -> Result<O, ToolError> + Send + Sync + 'static,
    {
        Self {
            name,
            description: description.into(),
            handler: Box::new(handler),
        }
    }
}

/// Listing entry served by `tools/list`.
///
/// `output_schema` is always the enveloped shape returned by `tools/call`,
/// never the bare handler output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

trait ErasedTool<C>: Send + Sync {
    fn call(&self, context: &C, arguments: Value) -> Result<Value, ToolError>;
}

struct TypedTool<C, I, O> {
    name: ToolName,
    input_validator: Validator,
    output_validator: Validator,
    handler: Handler<C, I, O>,
}

impl<C, I, O> ErasedTool<C> for TypedTool<C, I, O>
where
    I: DeserializeOwned,
    O: Serialize,
{
    fn call(&self, context: &C, arguments: Value) -> Result<Value, ToolError> {
        let violations = schema_violations(&self.input_validator, &arguments);
        if !violations.is_empty() {
            return Err(ToolError::Validation {
                tool: self.name,
                message: violations.join("; "),
            });
        }
        let input: I = serde_json::from_value(arguments).map_err(|err| ToolError::Validation {
            tool: self.name,
            message: err.to_string(),
        })?;

        let output = (self.handler)(context, input)?;

        let value = serde_json::to_value(&output).map_err(|err| {
            ToolError::handler(format!("failed to serialize {} output: {err}", self.name))
        })?;
        let violations = schema_violations(&self.output_validator, &value);
        if !violations.is_empty() {
            return Err(ToolError::handler(format!(
                "{} produced output outside its declared schema: {}",
                self.name,
                violations.join("; ")
            )));
        }
        Ok(value)
    }
}

pub struct ToolRouterBuilder<C> {
    tools: Vec<(ToolName, ToolDescriptor, Box<dyn ErasedTool<C>>)>,
    error: Option<RouterError>,
}

impl<C: Send + Sync + 'static> ToolRouterBuilder<C> {
    fn new() -> Self {
        Self {
            tools: Vec::new(),
            error: None,
        }
    }

    /// Adds a tool. Schema problems are remembered and reported by
    /// [`ToolRouterBuilder::build`] so registrations stay chainable.
    #[must_use]
    pub fn register<I, O>(mut self, tool: Tool<C, I, O>) -> Self
    where
        I: JsonSchema + DeserializeOwned + 'static,
        O: JsonSchema + Serialize + 'static,
    {
        if self.error.is_some() {
            return self;
        }
        match compile_tool(tool) {
            Ok(entry) => self.tools.push(entry),
            Err(err) => self.error = Some(err),
        }
        self
    }

    /// Freezes the registrations and binds the shared context.
    ///
    /// Registering the same [`ToolName`] twice is an error.
    pub fn build(self, context: Arc<C>) -> Result<ToolRouter<C>, RouterError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut descriptors = Vec::with_capacity(self.tools.len());
        let mut dispatch_table = HashMap::with_capacity(self.tools.len());
        for (name, descriptor, tool) in self.tools {
            if dispatch_table.insert(name, tool).is_some() {
                return Err(RouterError::DuplicateTool(name));
            }
            descriptors.push(descriptor);
        }
        info!(tools = descriptors.len(), "tool router ready");
        Ok(ToolRouter {
            context,
            descriptors,
            dispatch_table,
        })
    }
}

pub struct ToolRouter<C> {
    context: Arc<C>,
    descriptors: Vec<ToolDescriptor>,
    dispatch_table: HashMap<ToolName, Box<dyn ErasedTool<C>>>,
}

impl<C: Send + Sync + 'static> ToolRouter<C> {
    pub fn builder() -> ToolRouterBuilder<C> {
        ToolRouterBuilder::new()
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    /// Registered tools in registration order.
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Routes a call to the named tool. Never fails: unknown names,
    /// validation failures, handler errors and handler panics all come back
    /// as error envelopes. Missing arguments are treated as `{}`.
    pub fn dispatch(&self, name: &str, arguments: Option<Value>) -> ToolEnvelope {
        let Some((tool_name, tool)) = name
            .parse::<ToolName>()
            .ok()
            .and_then(|parsed| self.dispatch_table.get(&parsed).map(|tool| (parsed, tool)))
        else {
            warn!(tool = name, "call to unknown tool");
            return to_error_result(&ToolError::UnknownTool(name.to_string()));
        };

        let arguments = arguments.unwrap_or_else(|| Value::Object(Map::new()));
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            tool.call(self.context.as_ref(), arguments)
        }))
        .unwrap_or_else(|payload| {
            Err(ToolError::Panic {
                tool: tool_name,
                message: panic_message(payload.as_ref()),
            })
        });
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(value) => {
                debug!(tool = %tool_name, elapsed_ms, "tool call succeeded");
                ToolEnvelope::success(value)
            }
            Err(err) => {
                warn!(tool = %tool_name, kind = err.kind(), error = %err, elapsed_ms, "tool call failed");
                to_error_result(&err)
            }
        }
    }
}

fn compile_tool<C, I, O>(
    tool: Tool<C, I, O>,
) -> Result<(ToolName, ToolDescriptor, Box<dyn ErasedTool<C>>), RouterError>
where
    C: 'static,
    I: JsonSchema + DeserializeOwned + 'static,
    O: JsonSchema + Serialize + 'static,
{
    let input_schema = schema_value::<I>(tool.name, "input")?;
    let output_schema = schema_value::<O>(tool.name, "output")?;
    let input_validator = compile_schema(tool.name, "input", &input_schema)?;
    let output_validator = compile_schema(tool.name, "output", &output_schema)?;

    let descriptor = ToolDescriptor {
        name: tool.name.as_str(),
        description: tool.description,
        input_schema,
        output_schema: describe_envelope(output_schema),
    };
    let erased: Box<dyn ErasedTool<C>> = Box::new(TypedTool {
        name: tool.name,
        input_validator,
        output_validator,
        handler: tool.handler,
    });
    Ok((tool.name, descriptor, erased))
}

fn schema_value<T: JsonSchema>(tool: ToolName, direction: &'static str) -> Result<Value, RouterError> {
    serde_json::to_value(schema_for!(T)).map_err(|err| RouterError::Schema {
        tool,
        direction,
        message: err.to_string(),
    })
}

fn compile_schema(
    tool: ToolName,
    direction: &'static str,
    schema: &Value,
) -> Result<Validator, RouterError> {
    jsonschema::options()
        .with_draft(Draft::Draft7)
        .build(schema)
        .map_err(|err| RouterError::Schema {
            tool,
            direction,
            message: err.to_string(),
        })
}

/// One message per violated constraint, each naming the offending location
/// as a JSON pointer (`/` for the document root).
fn schema_violations(validator: &Validator, value: &Value) -> Vec<String> {
    validator
        .iter_errors(value)
        .map(|err| {
            let path = err.instance_path().to_string();
            let path = if path.is_empty() { "/" } else { path.as_str() };
            format!("{err} at {path}")
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}
