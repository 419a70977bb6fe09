//! Call-method: invoke a method on a stack object when the element ends.

use super::provider_accessors;
use crate::config::validate_method_name;
use crate::diagnostics::ErrorAggregator;
use crate::error::ExecutionError;
use crate::host::{resolve_param_type, Host, MethodCall};
use crate::registry::{RuleProvider, RuleTarget};
use crate::rule::{Context, Rule};
use crate::value::{Attributes, ParamType, Value};

/// Builder for [`CallMethodRule`].
#[derive(Debug)]
pub struct CallMethodBuilder {
    target: RuleTarget,
    method: String,
    param_count: i32,
    param_type_names: Vec<String>,
    exact_match: bool,
    target_offset: i32,
    param_types: Vec<ParamType>,
}

impl CallMethodBuilder {
    pub(crate) fn new(target: RuleTarget, method: String) -> Self {
        Self {
            target,
            method,
            param_count: 0,
            param_type_names: Vec::new(),
            exact_match: false,
            target_offset: 0,
            param_types: Vec::new(),
        }
    }

    /// Number of parameters collected from call-param rules. With `0` the
    /// trimmed element text is passed as the only argument.
    pub fn with_param_count(&mut self, count: i32) -> &mut Self {
        self.param_count = count;
        self
    }

    /// Parameter types, by name: `string`, `int`, `float`, `bool`, `any` or a
    /// host type.
    pub fn with_param_types<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.param_type_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn use_exact_match(&mut self, exact: bool) -> &mut Self {
        self.exact_match = exact;
        self
    }

    /// Stack offset of the target object; see [`Context::peek`].
    pub fn with_target_offset(&mut self, offset: i32) -> &mut Self {
        self.target_offset = offset;
        self
    }

    fn arity(&self) -> usize {
        usize::try_from(self.param_count).unwrap_or(0).max(1)
    }
}

impl RuleProvider for CallMethodBuilder {
    provider_accessors!();

    fn kind(&self) -> &'static str {
        "call-method"
    }

    fn finalize(&mut self, host: &dyn Host, errors: &mut ErrorAggregator) {
        if let Err(e) = validate_method_name(&self.method) {
            self.target.error(errors, e);
        }
        if self.param_count < 0 {
            self.target.error(
                errors,
                format!(
                    "Call-method parameter count must not be negative, got {}",
                    self.param_count
                ),
            );
            return;
        }

        let arity = self.arity();
        if self.param_type_names.is_empty() {
            let default = if self.param_count == 0 {
                ParamType::String
            } else {
                ParamType::Any
            };
            self.param_types = vec![default; arity];
            return;
        }
        if self.param_type_names.len() != arity {
            self.target.error(
                errors,
                format!(
                    "Call-method '{}' declares {} parameter type(s) for {arity} parameter(s)",
                    self.method,
                    self.param_type_names.len()
                ),
            );
            return;
        }

        let mut resolved = Vec::with_capacity(arity);
        for name in &self.param_type_names {
            match resolve_param_type(host, name) {
                Some(param_type) => resolved.push(param_type),
                None => self
                    .target
                    .error(errors, format!("Unknown parameter type '{name}'")),
            }
        }
        self.param_types = resolved;
    }

    fn create_rule(&self) -> Box<dyn Rule> {
        Box::new(CallMethodRule {
            method: self.method.clone(),
            param_count: usize::try_from(self.param_count).unwrap_or(0),
            param_types: self.param_types.clone(),
            exact_match: self.exact_match,
            target_offset: self.target_offset,
            frames: Vec::new(),
            body: None,
        })
    }
}

/// Invokes a method on `end` with parameters collected while the element was open.
#[derive(Debug)]
pub struct CallMethodRule {
    method: String,
    param_count: usize,
    param_types: Vec<ParamType>,
    exact_match: bool,
    target_offset: i32,
    /// Parameter frame index per open element matched by this rule.
    frames: Vec<usize>,
    body: Option<String>,
}

impl CallMethodRule {
    fn arguments(&mut self, ctx: &Context<'_>) -> Result<Option<Vec<Value>>, ExecutionError> {
        if self.param_count == 0 {
            let text = self.body.take().unwrap_or_default();
            return Ok(Some(vec![Value::String(text)]));
        }

        let frame = self.frames.pop();
        let params = frame
            .and_then(|index| ctx.params_at(index))
            .ok_or(ExecutionError::NoParameterFrame { index: 0 })?;
        if self.param_count == 1 && params.first().is_some_and(Option::is_none) {
            return Ok(None);
        }
        Ok(Some(
            params
                .iter()
                .map(|param| param.clone().unwrap_or_default())
                .collect(),
        ))
    }
}

impl Rule for CallMethodRule {
    fn begin(
        &mut self,
        ctx: &mut Context<'_>,
        _attributes: &Attributes,
    ) -> Result<(), ExecutionError> {
        if self.param_count > 0 {
            let index = ctx.push_params(self.param_count);
            self.frames.push(index);
        }
        Ok(())
    }

    fn body(&mut self, _ctx: &mut Context<'_>, text: &str) -> Result<(), ExecutionError> {
        if self.param_count == 0 {
            self.body = Some(text.trim().to_string());
        }
        Ok(())
    }

    fn end(&mut self, ctx: &mut Context<'_>) -> Result<(), ExecutionError> {
        let Some(args) = self.arguments(ctx)? else {
            tracing::trace!(method = %self.method, "Single parameter never supplied, call skipped");
            return Ok(());
        };
        let args = args
            .into_iter()
            .zip(&self.param_types)
            .map(|(arg, param_type)| param_type.convert(arg))
            .collect::<Result<Vec<_>, _>>()?;

        let target = ctx.peek(self.target_offset)?;
        tracing::trace!(method = %self.method, args = args.len(), "Invoking method");
        ctx.host().invoke_method(
            target,
            MethodCall {
                name: &self.method,
                param_types: &self.param_types,
                args,
                exact_match: self.exact_match,
            },
        )?;
        Ok(())
    }
}
