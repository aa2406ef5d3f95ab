use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace};
use thiserror::Error;

use crate::{
    ClassRegistry, ConverterRegistry, Fixture, Instruction, SymbolTable,
    TypeDescriptor, Value, Verb, WireValue, EXCEPTION_TAG, OK, VOID_TAG,
};

/// Internal error taxonomy. Never crosses the executor boundary as a
/// structured value: every failure is rendered into an exception-marker
/// string, because the transport is text oriented and assumes no shared
/// type system between engine and caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("message:<<NO_INSTANCE {0}.>>")]
    NoInstance(String),
    #[error("message:<<NO_CLASS {0}>>")]
    NoClass(String),
    #[error("message:<<NO_CONSTRUCTOR {0}>>")]
    NoConstructor(String),
    #[error("message:<<COULD_NOT_INVOKE_CONSTRUCTOR {class}[{arity}]>>")]
    CouldNotInvokeConstructor { class: String, arity: usize },
    #[error("message:<<NO_METHOD_IN_CLASS {method}[{arity}] {class}.>>")]
    NoMethodInClass {
        method: String,
        arity: usize,
        class: String,
    },
    #[error("message:<<NO_CONVERTER_FOR_ARGUMENT_NUMBER {0}.>>")]
    NoConverterForArgument(String),
    #[error("message:<<INVALID_STATEMENT {0}>>")]
    InvalidStatement(String),
    /// The invoked fixture code itself failed; carries its description.
    #[error("{0}")]
    CallFailed(String),
}

/// Renders any executor failure into the reserved wire form.
pub fn exception_to_string(error: &ExecError) -> String {
    format!("{EXCEPTION_TAG}{error}")
}

/// Executes single instructions against live fixture instances.
/// One per session; holds the instance registry, symbol bindings,
/// search paths and the converter registry for that session only.
pub struct StatementExecutor {
    classes: Arc<ClassRegistry>,
    converters: ConverterRegistry,
    instances: HashMap<String, Box<dyn Fixture>>,
    symbols: SymbolTable,
    paths: Vec<String>,
}

impl StatementExecutor {
    pub fn new(classes: Arc<ClassRegistry>) -> Self {
        Self::with_converters(classes, ConverterRegistry::with_defaults())
    }

    /// Extension point: the hosting process may hand over a registry
    /// with custom converters pre-registered.
    pub fn with_converters(classes: Arc<ClassRegistry>, converters: ConverterRegistry) -> Self {
        Self {
            classes,
            converters,
            instances: HashMap::new(),
            symbols: SymbolTable::new(),
            paths: Vec::new(),
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn converters(&mut self) -> &mut ConverterRegistry {
        &mut self.converters
    }

    pub fn get_instance(&self, name: &str) -> Option<&dyn Fixture> {
        self.instances.get(name).map(Box::as_ref)
    }

    /// Appends a namespace prefix used to resolve short class names.
    pub fn add_path(&mut self, path: &str) -> WireValue {
        debug!("import path {path}");
        self.paths.push(path.to_owned());
        WireValue::text(OK)
    }

    /// Resolves and constructs a fixture, storing it under
    /// `instance_name`. A prior instance with the same name is replaced.
    pub fn create(&mut self, instance_name: &str, class_name: &str, args: &[WireValue]) -> WireValue {
        match self.try_create(instance_name, class_name, args) {
            Ok(value) => value,
            Err(error) => WireValue::Text(exception_to_string(&error)),
        }
    }

    pub fn call(&mut self, instance_name: &str, method_name: &str, args: &[WireValue]) -> WireValue {
        match self.try_call(instance_name, method_name, args) {
            Ok(value) => value,
            Err(error) => WireValue::Text(exception_to_string(&error)),
        }
    }

    /// Like `call`, additionally binding the stringified result to
    /// `symbol_name`. Exception markers are bound too; assignment is not
    /// a pass/fail concept.
    pub fn call_and_assign(
        &mut self,
        symbol_name: &str,
        instance_name: &str,
        method_name: &str,
        args: &[WireValue],
    ) -> WireValue {
        let result = self.call(instance_name, method_name, args);
        self.symbols.set(symbol_name, result.render_text());
        result
    }

    /// Dispatches one instruction. Infallible by design: every failure
    /// is already folded into the returned wire value.
    pub fn execute(&mut self, instruction: &Instruction) -> WireValue {
        trace!("execute {:?} {}", instruction.verb, instruction.id);
        match self.dispatch(instruction) {
            Ok(value) => value,
            Err(error) => WireValue::Text(exception_to_string(&error)),
        }
    }

    fn dispatch(&mut self, instruction: &Instruction) -> Result<WireValue, ExecError> {
        let operands = &instruction.operands;
        match instruction.verb {
            Verb::Import => Ok(self.add_path(text_operand(operands, 0)?)),
            Verb::Make => Ok(self.create(
                text_operand(operands, 0)?,
                text_operand(operands, 1)?,
                &operands[2..],
            )),
            Verb::Call => Ok(self.call(
                text_operand(operands, 0)?,
                text_operand(operands, 1)?,
                &operands[2..],
            )),
            Verb::CallAndAssign => Ok(self.call_and_assign(
                text_operand(operands, 0)?,
                text_operand(operands, 1)?,
                text_operand(operands, 2)?,
                &operands[3..],
            )),
        }
    }

    fn try_create(
        &mut self,
        instance_name: &str,
        class_name: &str,
        args: &[WireValue],
    ) -> Result<WireValue, ExecError> {
        let args = self.symbols.substitute_values(args);
        let class = self
            .classes
            .resolve(class_name, &self.paths)
            .ok_or_else(|| ExecError::NoClass(class_name.to_owned()))?;
        let constructor = class
            .constructor_for_arity(args.len())
            .ok_or_else(|| ExecError::NoConstructor(class_name.to_owned()))?;
        let converted = convert_args(&self.converters, &args, constructor.params)?;
        let instance =
            (constructor.build)(converted).map_err(|_| ExecError::CouldNotInvokeConstructor {
                class: class_name.to_owned(),
                arity: args.len(),
            })?;
        debug!("made instance {instance_name} of {class_name}");
        self.instances.insert(instance_name.to_owned(), instance);
        Ok(WireValue::text(OK))
    }

    fn try_call(
        &mut self,
        instance_name: &str,
        method_name: &str,
        args: &[WireValue],
    ) -> Result<WireValue, ExecError> {
        let args = self.symbols.substitute_values(args);
        let (index, def) = {
            let instance = self
                .instances
                .get(instance_name)
                .ok_or_else(|| ExecError::NoInstance(instance_name.to_owned()))?;
            find_matching_method(instance.as_ref(), method_name, args.len())?
        };
        let converted = convert_args(&self.converters, &args, def.params)?;
        let instance = self
            .instances
            .get_mut(instance_name)
            .ok_or_else(|| ExecError::NoInstance(instance_name.to_owned()))?;
        let value = instance
            .invoke(index, converted)
            .map_err(ExecError::CallFailed)?;
        trace!("call {instance_name}.{method_name} -> {value:?}");
        Ok(self.convert_return(value, def.ret))
    }

    fn convert_return(&self, value: Value, ret: TypeDescriptor) -> WireValue {
        match (ret, value) {
            (TypeDescriptor::Void, _) => WireValue::text(VOID_TAG),
            // generic lists cross the boundary untouched
            (TypeDescriptor::List, Value::List(items)) => {
                WireValue::List(items.into_iter().map(|item| self.list_item_to_wire(item)).collect())
            }
            (ret, value) => WireValue::Text(self.converters.encode(&value, ret)),
        }
    }

    fn list_item_to_wire(&self, item: Value) -> WireValue {
        match item {
            Value::Text(text) => WireValue::Text(text),
            Value::List(items) => {
                WireValue::List(items.into_iter().map(|item| self.list_item_to_wire(item)).collect())
            }
            other => WireValue::Text(other.render_text()),
        }
    }
}

// First method with matching name and parameter count wins; types are
// never consulted.
fn find_matching_method(
    instance: &dyn Fixture,
    method_name: &str,
    arity: usize,
) -> Result<(usize, &'static crate::MethodDef), ExecError> {
    instance
        .methods()
        .iter()
        .enumerate()
        .find(|(_, def)| def.name == method_name && def.params.len() == arity)
        .ok_or_else(|| ExecError::NoMethodInClass {
            method: method_name.to_owned(),
            arity,
            class: instance.class_name().to_owned(),
        })
}

fn convert_args(
    converters: &ConverterRegistry,
    args: &[WireValue],
    params: &[TypeDescriptor],
) -> Result<Vec<Value>, ExecError> {
    let mut converted = Vec::with_capacity(args.len());
    for (arg, &param) in args.iter().zip(params) {
        converted.push(convert_arg(converters, arg, param)?);
    }
    Ok(converted)
}

fn convert_arg(
    converters: &ConverterRegistry,
    arg: &WireValue,
    param: TypeDescriptor,
) -> Result<Value, ExecError> {
    match (param, arg) {
        // generic list parameters take the operand untouched
        (TypeDescriptor::List, WireValue::List(_)) => Ok(untouched(arg)),
        (_, WireValue::List(_)) => Err(ExecError::CallFailed(format!(
            "list argument passed for a {param} parameter"
        ))),
        (_, WireValue::Text(text)) => {
            let converter = converters
                .lookup(param)
                .ok_or_else(|| ExecError::NoConverterForArgument(param.name().to_owned()))?;
            converter
                .decode(text)
                .map_err(|error| ExecError::CallFailed(error.to_string()))
        }
    }
}

fn untouched(arg: &WireValue) -> Value {
    match arg {
        WireValue::Text(text) => Value::Text(text.clone()),
        WireValue::List(items) => Value::List(items.iter().map(untouched).collect()),
    }
}

fn text_operand<'a>(operands: &'a [WireValue], index: usize) -> Result<&'a str, ExecError> {
    operands
        .get(index)
        .and_then(WireValue::as_text)
        .ok_or_else(|| ExecError::InvalidStatement(format!("operand {index} must be a string")))
}
