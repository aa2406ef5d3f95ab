use std::collections::HashMap;

use crate::{TypeDescriptor, Value};

/// One entry in a fixture's method table.
#[derive(Debug, Clone, Copy)]
pub struct MethodDef {
    pub name: &'static str,
    pub params: &'static [TypeDescriptor],
    pub ret: TypeDescriptor,
}

/// A dynamically constructed object instructions are invoked against.
///
/// Method resolution is by name and parameter count only: the executor
/// picks the FIRST entry in `methods()` whose name and arity match.
/// Types are never consulted, so overloads sharing an arity shadow each
/// other. Known limitation, kept for compatibility.
pub trait Fixture {
    fn class_name(&self) -> &'static str;
    fn methods(&self) -> &'static [MethodDef];

    /// Invokes the method at `index` (a position in `methods()`).
    /// `args` arrive already converted to the declared parameter types.
    /// The error string is a rendered description of the failure.
    fn invoke(&mut self, index: usize, args: Vec<Value>) -> Result<Value, String>;
}

/// Constructor selected by argument count, like methods.
pub struct Constructor {
    pub params: &'static [TypeDescriptor],
    pub build: fn(Vec<Value>) -> Result<Box<dyn Fixture>, String>,
}

pub struct FixtureClass {
    pub constructors: Vec<Constructor>,
}

impl FixtureClass {
    pub fn constructor_for_arity(&self, arity: usize) -> Option<&Constructor> {
        self.constructors
            .iter()
            .find(|ctor| ctor.params.len() == arity)
    }
}

/// Registered-factory replacement for runtime reflection: fully
/// qualified class names map to constructible fixture classes.
#[derive(Default)]
pub struct ClassRegistry {
    classes: HashMap<String, FixtureClass>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, qualified_name: impl Into<String>, class: FixtureClass) {
        self.classes.insert(qualified_name.into(), class);
    }

    /// Tries the bare name first, then each search path as a prefix, in
    /// registration order.
    pub fn resolve(&self, name: &str, paths: &[String]) -> Option<&FixtureClass> {
        if let Some(class) = self.classes.get(name) {
            return Some(class);
        }
        for path in paths {
            if let Some(class) = self.classes.get(&format!("{path}.{name}")) {
                return Some(class);
            }
        }
        None
    }
}

fn int_arg(args: &[Value], index: usize) -> i64 {
    match args.get(index) {
        Some(Value::Int(n)) => *n,
        _ => 0,
    }
}

/// Small arithmetic fixture shipped with the binary so freshly written
/// tables have something to run against.
pub struct Calculator {
    memory: i64,
}

impl Calculator {
    pub const CLASS_NAME: &'static str = "slate.Calculator";

    pub fn class() -> FixtureClass {
        FixtureClass {
            constructors: vec![
                Constructor {
                    params: &[],
                    build: |_| Ok(Box::new(Calculator { memory: 0 })),
                },
                Constructor {
                    params: &[TypeDescriptor::Int],
                    build: |args| {
                        Ok(Box::new(Calculator {
                            memory: int_arg(&args, 0),
                        }))
                    },
                },
            ],
        }
    }
}

const CALCULATOR_METHODS: &[MethodDef] = &[
    MethodDef {
        name: "addAnd",
        params: &[TypeDescriptor::Int, TypeDescriptor::Int],
        ret: TypeDescriptor::Int,
    },
    MethodDef {
        name: "subtractFrom",
        params: &[TypeDescriptor::Int, TypeDescriptor::Int],
        ret: TypeDescriptor::Int,
    },
    MethodDef {
        name: "isPositive",
        params: &[TypeDescriptor::Int],
        ret: TypeDescriptor::Bool,
    },
    MethodDef {
        name: "store",
        params: &[TypeDescriptor::Int],
        ret: TypeDescriptor::Void,
    },
    MethodDef {
        name: "recall",
        params: &[],
        ret: TypeDescriptor::Int,
    },
];

impl Fixture for Calculator {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn methods(&self) -> &'static [MethodDef] {
        CALCULATOR_METHODS
    }

    fn invoke(&mut self, index: usize, args: Vec<Value>) -> Result<Value, String> {
        match index {
            0 => Ok(Value::Int(int_arg(&args, 0) + int_arg(&args, 1))),
            1 => Ok(Value::Int(int_arg(&args, 1) - int_arg(&args, 0))),
            2 => Ok(Value::Bool(int_arg(&args, 0) > 0)),
            3 => {
                self.memory = int_arg(&args, 0);
                Ok(Value::Void)
            }
            4 => Ok(Value::Int(self.memory)),
            _ => Err(format!("no method at index {index}")),
        }
    }
}

/// Registry preloaded with the fixtures the binary exposes.
pub fn demo_registry() -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    registry.register(Calculator::CLASS_NAME, Calculator::class());
    registry
}

/// Test double exercising every executor path: both constructors, all
/// primitive parameter kinds, generic lists, void, and a method that
/// always fails.
#[cfg(test)]
pub struct EchoFixture {
    constructor_arg: i64,
}

#[cfg(test)]
const ECHO_METHODS: &[MethodDef] = &[
    MethodDef {
        name: "returnString",
        params: &[],
        ret: TypeDescriptor::Text,
    },
    MethodDef {
        name: "returnConstructorArg",
        params: &[],
        ret: TypeDescriptor::Int,
    },
    MethodDef {
        name: "echoInt",
        params: &[TypeDescriptor::Int],
        ret: TypeDescriptor::Int,
    },
    MethodDef {
        name: "echoString",
        params: &[TypeDescriptor::Text],
        ret: TypeDescriptor::Text,
    },
    MethodDef {
        name: "echoDouble",
        params: &[TypeDescriptor::Double],
        ret: TypeDescriptor::Double,
    },
    MethodDef {
        name: "echoBoolean",
        params: &[TypeDescriptor::Bool],
        ret: TypeDescriptor::Bool,
    },
    MethodDef {
        name: "echoList",
        params: &[TypeDescriptor::List],
        ret: TypeDescriptor::List,
    },
    MethodDef {
        name: "addTo",
        params: &[TypeDescriptor::Int, TypeDescriptor::Int],
        ret: TypeDescriptor::Int,
    },
    MethodDef {
        name: "voidFunction",
        params: &[],
        ret: TypeDescriptor::Void,
    },
    MethodDef {
        name: "die",
        params: &[],
        ret: TypeDescriptor::Void,
    },
];

#[cfg(test)]
impl EchoFixture {
    pub const CLASS_NAME: &'static str = "slate.test.EchoFixture";

    pub fn class() -> FixtureClass {
        FixtureClass {
            constructors: vec![
                Constructor {
                    params: &[],
                    build: |_| Ok(Box::new(EchoFixture { constructor_arg: 0 })),
                },
                Constructor {
                    params: &[TypeDescriptor::Int],
                    build: |args| {
                        Ok(Box::new(EchoFixture {
                            constructor_arg: int_arg(&args, 0),
                        }))
                    },
                },
            ],
        }
    }
}

#[cfg(test)]
impl Fixture for EchoFixture {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn methods(&self) -> &'static [MethodDef] {
        ECHO_METHODS
    }

    fn invoke(&mut self, index: usize, mut args: Vec<Value>) -> Result<Value, String> {
        match index {
            0 => Ok(Value::Text("string".into())),
            1 => Ok(Value::Int(self.constructor_arg)),
            2..=6 => Ok(args.swap_remove(0)),
            7 => Ok(Value::Int(int_arg(&args, 0) + int_arg(&args, 1))),
            8 => Ok(Value::Void),
            9 => Err("blah".into()),
            _ => Err(format!("no method at index {index}")),
        }
    }
}

/// Class registry used across the executor, runner and suite tests.
#[cfg(test)]
pub fn test_registry() -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    registry.register(EchoFixture::CLASS_NAME, EchoFixture::class());
    registry
}
