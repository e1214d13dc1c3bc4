use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::config::ScriptLimits;
use crate::sandbox::ScriptError;
use crate::sandbox::parser::{AssignOp, BinaryOp, Expr, Literal, LogicalOp, Stmt, UnaryOp};
use crate::sandbox::value::{
    Builtin, ScriptValue, number_to_string, parse_float_prefix, parse_int_prefix,
};

/// Identifiers whose last assignment becomes the script result.
pub const RESULT_BINDINGS: &[&str] = &["value", "show", "valid"];

/// Context bindings scripts may read but never rebind.
const READ_ONLY_BINDINGS: &[&str] = &["data", "row", "util"];

const MAX_EVAL_DEPTH: usize = 256;

const GLOBAL_FUNCTIONS: &[&str] = &[
    "Number",
    "String",
    "Boolean",
    "parseInt",
    "parseFloat",
    "isNaN",
];
const MATH_FUNCTIONS: &[&str] = &[
    "Math.min",
    "Math.max",
    "Math.abs",
    "Math.round",
    "Math.floor",
    "Math.ceil",
    "Math.pow",
    "Math.sqrt",
];
const STRING_METHODS: &[&str] = &[
    "trim",
    "toLowerCase",
    "toUpperCase",
    "includes",
    "startsWith",
    "endsWith",
    "indexOf",
    "slice",
    "substring",
    "split",
];
const ARRAY_METHODS: &[&str] = &["includes", "indexOf", "join", "concat", "slice"];
const NUMBER_METHODS: &[&str] = &["toFixed", "toString"];

/// Values bound into a script's scope.
pub struct Bindings {
    pub data: ScriptValue,
    pub row: ScriptValue,
    pub value: ScriptValue,
    pub util: ScriptValue,
}

enum Flow {
    Next,
    Return(ScriptValue),
}

pub struct Interpreter {
    scope: BTreeMap<String, ScriptValue>,
    captured: Option<ScriptValue>,
    limits: ScriptLimits,
    steps: u64,
    depth: usize,
    started: Instant,
}

impl Interpreter {
    pub fn new(bindings: Bindings, limits: ScriptLimits) -> Self {
        let mut scope = BTreeMap::new();
        scope.insert("data".to_string(), bindings.data);
        scope.insert("row".to_string(), bindings.row);
        scope.insert("input".to_string(), bindings.value.clone());
        scope.insert("value".to_string(), bindings.value);
        scope.insert("util".to_string(), bindings.util);
        scope.insert("show".to_string(), ScriptValue::Undefined);
        scope.insert("valid".to_string(), ScriptValue::Undefined);
        Self {
            scope,
            captured: None,
            limits,
            steps: 0,
            depth: 0,
            started: Instant::now(),
        }
    }

    /// Runs a program and resolves its result: an explicit `return`, else the
    /// latest assignment to a result binding, else the value of a trailing
    /// bare expression, else undefined.
    pub fn run(mut self, program: &[Stmt]) -> Result<ScriptValue, ScriptError> {
        let mut completion = None;
        for stmt in program {
            completion = None;
            if let Stmt::Expr(expr) = stmt {
                let value = self.eval(expr)?;
                if !matches!(expr, Expr::Assign { .. }) {
                    completion = Some(value);
                }
                continue;
            }
            if let Flow::Return(value) = self.exec(stmt)? {
                return Ok(value);
            }
        }
        Ok(self
            .captured
            .or(completion)
            .unwrap_or(ScriptValue::Undefined))
    }

    fn tick(&mut self) -> Result<(), ScriptError> {
        self.steps += 1;
        if self.limits.max_steps > 0 && self.steps > self.limits.max_steps {
            return Err(ScriptError::StepBudget(self.limits.max_steps));
        }
        if self.limits.max_duration_ms > 0
            && self.steps % 64 == 0
            && self.started.elapsed() > Duration::from_millis(self.limits.max_duration_ms)
        {
            return Err(ScriptError::TimeBudget(self.limits.max_duration_ms));
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, ScriptError> {
        self.tick()?;
        match stmt {
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr)?,
                    None => ScriptValue::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Declare(bindings) => {
                for (name, init) in bindings {
                    let value = match init {
                        Some(init) => self.eval(init)?,
                        None => ScriptValue::Undefined,
                    };
                    self.bind(name, value, init.is_some())?;
                }
                Ok(Flow::Next)
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.truthy() {
                    self.exec(consequent)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate)
                } else {
                    Ok(Flow::Next)
                }
            }
            Stmt::Block(body) => {
                for stmt in body {
                    if let Flow::Return(value) = self.exec(stmt)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Next)
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Next)
            }
            Stmt::Empty => Ok(Flow::Next),
        }
    }

    fn bind(&mut self, name: &str, value: ScriptValue, captures: bool) -> Result<(), ScriptError> {
        if READ_ONLY_BINDINGS.contains(&name) {
            return Err(ScriptError::ReadOnly(name.to_string()));
        }
        if captures && RESULT_BINDINGS.contains(&name) {
            self.captured = Some(value.clone());
        }
        self.scope.insert(name.to_string(), value);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<ScriptValue> {
        if let Some(value) = self.scope.get(name) {
            return Some(value.clone());
        }
        match name {
            "Math" => Some(ScriptValue::Builtin(Builtin::Namespace("Math"))),
            "Array" => Some(ScriptValue::Builtin(Builtin::Namespace("Array"))),
            _ => find_static(GLOBAL_FUNCTIONS, name)
                .map(|global| ScriptValue::Builtin(Builtin::Function(global))),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<ScriptValue, ScriptError> {
        self.tick()?;
        self.depth += 1;
        if self.depth > MAX_EVAL_DEPTH {
            return Err(ScriptError::TooDeep);
        }
        let result = self.eval_inner(expr);
        self.depth -= 1;
        result
    }

    fn eval_inner(&mut self, expr: &Expr) -> Result<ScriptValue, ScriptError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Undefined => ScriptValue::Undefined,
                Literal::Null => ScriptValue::Null,
                Literal::Bool(flag) => ScriptValue::Bool(*flag),
                Literal::Number(number) => ScriptValue::Number(*number),
                Literal::Str(text) => ScriptValue::String(text.clone()),
            }),
            Expr::Ident(name) => self
                .lookup(name)
                .ok_or_else(|| ScriptError::Reference(name.clone())),
            Expr::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?);
                }
                Ok(ScriptValue::Array(out))
            }
            Expr::Object(entries) => {
                let mut out = BTreeMap::new();
                for (key, value) in entries {
                    let value = self.eval(value)?;
                    out.insert(key.clone(), value);
                }
                Ok(ScriptValue::Object(out))
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let object = self.eval(object)?;
                if *optional && object.is_nullish() {
                    return Ok(ScriptValue::Undefined);
                }
                get_property(object, property)
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                let object = self.eval(object)?;
                if *optional && object.is_nullish() {
                    return Ok(ScriptValue::Undefined);
                }
                let index = self.eval(index)?;
                get_property(object, &property_key(&index))
            }
            Expr::Call { callee, args } => {
                let callee = self.eval(callee)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                call(callee, &values)
            }
            Expr::Unary(op, operand) => {
                if *op == UnaryOp::TypeOf
                    && let Expr::Ident(name) = operand.as_ref()
                    && self.lookup(name).is_none()
                {
                    return Ok(ScriptValue::String("undefined".into()));
                }
                let operand = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => ScriptValue::Bool(!operand.truthy()),
                    UnaryOp::Neg => ScriptValue::Number(-operand.to_number()),
                    UnaryOp::Plus => ScriptValue::Number(operand.to_number()),
                    UnaryOp::TypeOf => ScriptValue::String(operand.type_of().into()),
                })
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left)?;
                let short_circuits = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Assign { op, target, value } => {
                let Expr::Ident(name) = target.as_ref() else {
                    return Err(ScriptError::ReadOnly("member assignment".into()));
                };
                if READ_ONLY_BINDINGS.contains(&name.as_str()) {
                    return Err(ScriptError::ReadOnly(name.clone()));
                }
                let rhs = self.eval(value)?;
                let next = match op {
                    AssignOp::Set => rhs,
                    AssignOp::Add | AssignOp::Sub => {
                        let current = self
                            .lookup(name)
                            .ok_or_else(|| ScriptError::Reference(name.clone()))?;
                        let op = if *op == AssignOp::Add {
                            BinaryOp::Add
                        } else {
                            BinaryOp::Sub
                        };
                        binary(op, &current, &rhs)
                    }
                };
                self.bind(name, next.clone(), true)?;
                Ok(next)
            }
        }
    }
}

fn property_key(index: &ScriptValue) -> String {
    index.to_display()
}

fn find_static(table: &'static [&'static str], name: &str) -> Option<&'static str> {
    table.iter().copied().find(|candidate| *candidate == name)
}

fn get_property(object: ScriptValue, name: &str) -> Result<ScriptValue, ScriptError> {
    let method = |table: &'static [&'static str], receiver: ScriptValue| {
        find_static(table, name).map(|name| {
            ScriptValue::Builtin(Builtin::Method {
                receiver: Box::new(receiver),
                name,
            })
        })
    };
    Ok(match object {
        ScriptValue::Undefined | ScriptValue::Null => {
            return Err(ScriptError::Type(format!(
                "cannot read properties of {} (reading '{}')",
                object.to_display(),
                name
            )));
        }
        ScriptValue::String(text) => {
            if name == "length" {
                ScriptValue::Number(text.chars().count() as f64)
            } else if let Ok(index) = name.parse::<usize>() {
                text.chars()
                    .nth(index)
                    .map(|ch| ScriptValue::String(ch.to_string()))
                    .unwrap_or(ScriptValue::Undefined)
            } else {
                method(STRING_METHODS, ScriptValue::String(text)).unwrap_or(ScriptValue::Undefined)
            }
        }
        ScriptValue::Array(items) => {
            if name == "length" {
                ScriptValue::Number(items.len() as f64)
            } else if let Ok(index) = name.parse::<usize>() {
                items.get(index).cloned().unwrap_or(ScriptValue::Undefined)
            } else {
                method(ARRAY_METHODS, ScriptValue::Array(items)).unwrap_or(ScriptValue::Undefined)
            }
        }
        ScriptValue::Object(mut map) => map.remove(name).unwrap_or(ScriptValue::Undefined),
        ScriptValue::Number(number) => {
            method(NUMBER_METHODS, ScriptValue::Number(number)).unwrap_or(ScriptValue::Undefined)
        }
        ScriptValue::Builtin(Builtin::Namespace("Math")) => match name {
            "PI" => ScriptValue::Number(std::f64::consts::PI),
            _ => find_static(MATH_FUNCTIONS, &format!("Math.{}", name))
                .map(|function| ScriptValue::Builtin(Builtin::Function(function)))
                .unwrap_or(ScriptValue::Undefined),
        },
        ScriptValue::Builtin(Builtin::Namespace("Array")) if name == "isArray" => {
            ScriptValue::Builtin(Builtin::Function("Array.isArray"))
        }
        ScriptValue::Bool(_) | ScriptValue::Builtin(_) => ScriptValue::Undefined,
    })
}

fn arg(args: &[ScriptValue], index: usize) -> ScriptValue {
    args.get(index).cloned().unwrap_or(ScriptValue::Undefined)
}

fn call(callee: ScriptValue, args: &[ScriptValue]) -> Result<ScriptValue, ScriptError> {
    match callee {
        ScriptValue::Builtin(Builtin::Function(name)) => Ok(call_function(name, args)),
        ScriptValue::Builtin(Builtin::Method { receiver, name }) => {
            Ok(call_method(*receiver, name, args))
        }
        other => Err(ScriptError::Type(format!(
            "{} is not a function",
            other.to_display()
        ))),
    }
}

fn call_function(name: &str, args: &[ScriptValue]) -> ScriptValue {
    let first = arg(args, 0);
    let unary = |apply: fn(f64) -> f64| ScriptValue::Number(apply(first.to_number()));
    match name {
        "Number" => ScriptValue::Number(if args.is_empty() {
            0.0
        } else {
            first.to_number()
        }),
        "String" => ScriptValue::String(if args.is_empty() {
            String::new()
        } else {
            first.to_display()
        }),
        "Boolean" => ScriptValue::Bool(first.truthy()),
        "parseInt" => ScriptValue::Number(parse_int_prefix(&first.to_display())),
        "parseFloat" => ScriptValue::Number(parse_float_prefix(&first.to_display())),
        "isNaN" => ScriptValue::Bool(first.to_number().is_nan()),
        "Math.min" => ScriptValue::Number(fold_numbers(args, f64::INFINITY, f64::min)),
        "Math.max" => ScriptValue::Number(fold_numbers(args, f64::NEG_INFINITY, f64::max)),
        "Math.abs" => unary(f64::abs),
        "Math.floor" => unary(f64::floor),
        "Math.ceil" => unary(f64::ceil),
        "Math.sqrt" => unary(f64::sqrt),
        "Math.round" => unary(|number: f64| (number + 0.5).floor()),
        "Math.pow" => ScriptValue::Number(first.to_number().powf(arg(args, 1).to_number())),
        "Array.isArray" => ScriptValue::Bool(matches!(first, ScriptValue::Array(_))),
        _ => ScriptValue::Undefined,
    }
}

/// NaN in any argument poisons the result, as in `Math.min`/`Math.max`.
fn fold_numbers(args: &[ScriptValue], start: f64, pick: fn(f64, f64) -> f64) -> f64 {
    let mut acc = start;
    for value in args {
        let number = value.to_number();
        if number.is_nan() {
            return f64::NAN;
        }
        acc = pick(acc, number);
    }
    acc
}

/// Resolves a possibly negative index against `len`, clamped to `0..=len`.
fn relative_index(index: &ScriptValue, len: usize, default: usize) -> usize {
    if matches!(index, ScriptValue::Undefined) {
        return default;
    }
    let number = index.to_number();
    if number.is_nan() {
        return 0;
    }
    let number = number.trunc();
    if number < 0.0 {
        len.saturating_sub((-number) as usize)
    } else {
        (number as usize).min(len)
    }
}

fn call_method(receiver: ScriptValue, name: &str, args: &[ScriptValue]) -> ScriptValue {
    match receiver {
        ScriptValue::String(text) => string_method(&text, name, args),
        ScriptValue::Array(items) => array_method(items, name, args),
        ScriptValue::Number(number) => match name {
            "toFixed" => {
                let digits = arg(args, 0).to_number();
                let digits = if digits.is_nan() {
                    0
                } else {
                    digits.clamp(0.0, 100.0) as usize
                };
                ScriptValue::String(format!("{:.*}", digits, number))
            }
            _ => ScriptValue::String(number_to_string(number)),
        },
        _ => ScriptValue::Undefined,
    }
}

fn string_method(text: &str, name: &str, args: &[ScriptValue]) -> ScriptValue {
    let chars: Vec<char> = text.chars().collect();
    let needle = arg(args, 0).to_display();
    match name {
        "trim" => ScriptValue::String(text.trim().to_string()),
        "toLowerCase" => ScriptValue::String(text.to_lowercase()),
        "toUpperCase" => ScriptValue::String(text.to_uppercase()),
        "includes" => ScriptValue::Bool(text.contains(&needle)),
        "startsWith" => ScriptValue::Bool(text.starts_with(&needle)),
        "endsWith" => ScriptValue::Bool(text.ends_with(&needle)),
        "indexOf" => ScriptValue::Number(
            text.find(&needle)
                .map(|byte| text[..byte].chars().count() as f64)
                .unwrap_or(-1.0),
        ),
        "slice" => {
            let start = relative_index(&arg(args, 0), chars.len(), 0);
            let end = relative_index(&arg(args, 1), chars.len(), chars.len());
            ScriptValue::String(if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            })
        }
        "substring" => {
            let clamp = |value: ScriptValue, default: usize| {
                if matches!(value, ScriptValue::Undefined) {
                    return default;
                }
                let number = value.to_number();
                if number.is_nan() || number < 0.0 {
                    0
                } else {
                    (number as usize).min(chars.len())
                }
            };
            let start = clamp(arg(args, 0), 0);
            let end = clamp(arg(args, 1), chars.len());
            let (start, end) = if start <= end { (start, end) } else { (end, start) };
            ScriptValue::String(chars[start..end].iter().collect())
        }
        "split" => match arg(args, 0) {
            ScriptValue::Undefined => ScriptValue::Array(vec![ScriptValue::String(text.into())]),
            separator => {
                let separator = separator.to_display();
                let parts: Vec<ScriptValue> = if separator.is_empty() {
                    chars
                        .iter()
                        .map(|ch| ScriptValue::String(ch.to_string()))
                        .collect()
                } else {
                    text.split(separator.as_str())
                        .map(|part| ScriptValue::String(part.to_string()))
                        .collect()
                };
                ScriptValue::Array(parts)
            }
        },
        _ => ScriptValue::Undefined,
    }
}

fn array_method(items: Vec<ScriptValue>, name: &str, args: &[ScriptValue]) -> ScriptValue {
    let target = arg(args, 0);
    match name {
        "includes" => ScriptValue::Bool(items.iter().any(|item| item.strict_equals(&target))),
        "indexOf" => ScriptValue::Number(
            items
                .iter()
                .position(|item| item.strict_equals(&target))
                .map(|position| position as f64)
                .unwrap_or(-1.0),
        ),
        "join" => {
            let separator = match target {
                ScriptValue::Undefined => ",".to_string(),
                other => other.to_display(),
            };
            ScriptValue::String(
                items
                    .iter()
                    .map(|item| {
                        if item.is_nullish() {
                            String::new()
                        } else {
                            item.to_display()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(&separator),
            )
        }
        "concat" => {
            let mut out = items;
            for value in args {
                match value {
                    ScriptValue::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            ScriptValue::Array(out)
        }
        "slice" => {
            let start = relative_index(&target, items.len(), 0);
            let end = relative_index(&arg(args, 1), items.len(), items.len());
            ScriptValue::Array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            })
        }
        _ => ScriptValue::Undefined,
    }
}

fn binary(op: BinaryOp, left: &ScriptValue, right: &ScriptValue) -> ScriptValue {
    let concatenates = |value: &ScriptValue| {
        matches!(
            value,
            ScriptValue::String(_) | ScriptValue::Array(_) | ScriptValue::Object(_)
        )
    };
    match op {
        BinaryOp::Add => {
            if concatenates(left) || concatenates(right) {
                ScriptValue::String(format!("{}{}", left.to_display(), right.to_display()))
            } else {
                ScriptValue::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => ScriptValue::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => ScriptValue::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => ScriptValue::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => ScriptValue::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            let ordering = match (left, right) {
                (ScriptValue::String(left), ScriptValue::String(right)) => Some(left.cmp(right)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            ScriptValue::Bool(match ordering {
                None => false,
                Some(ordering) => match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Lte => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                },
            })
        }
        BinaryOp::LooseEq => ScriptValue::Bool(left.loose_equals(right)),
        BinaryOp::LooseNe => ScriptValue::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => ScriptValue::Bool(left.strict_equals(right)),
        BinaryOp::StrictNe => ScriptValue::Bool(!left.strict_equals(right)),
    }
}
