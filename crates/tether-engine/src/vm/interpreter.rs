//! Tree-walking interpreter over the AST.

use crate::Error;
use crate::ast::*;
use crate::runtime::environment::AssignError;
use crate::runtime::{ArrayRef, Callable, CallableKind, Function, ObjectRef, Scope, Value};

/// Maximum nesting of script function calls before a RangeError is raised.
const MAX_CALL_DEPTH: usize = 200;

/// How a statement finished.
#[derive(Debug)]
enum Completion {
    /// Fell through with the statement's value
    Normal(Value),
    /// Hit a `return`
    Return(Value),
}

/// Executes statements and evaluates expressions.
///
/// `scope` is the innermost block scope; `vars` is the enclosing function
/// scope that `var` declarations are hoisted into.
#[derive(Debug, Default)]
pub struct Interpreter {
    depth: usize,
}

impl Interpreter {
    /// Creates a new interpreter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a program body in `scope`, returning the value of the last
    /// statement executed (or the returned value on `return`).
    pub fn run_program(&mut self, body: &[Statement], scope: &Scope) -> Result<Value, Error> {
        hoist_functions(body, scope);
        match self.exec_block(body, scope, scope)? {
            Completion::Normal(value) | Completion::Return(value) => Ok(value),
        }
    }

    /// Calls a function value with the given arguments.
    pub fn call(&mut self, callee: &Value, args: &[Value]) -> Result<Value, Error> {
        let Value::Function(callable) = callee else {
            return Err(Error::TypeError(format!("{} is not a function", callee)));
        };

        match callable.kind() {
            CallableKind::Native(func) => func(args),
            CallableKind::Script(func) => {
                if self.depth >= MAX_CALL_DEPTH {
                    return Err(Error::RangeError(
                        "Maximum call stack size exceeded".to_string(),
                    ));
                }
                self.depth += 1;
                let result = self.call_script(func, args);
                self.depth -= 1;
                result
            }
        }
    }

    fn call_script(&mut self, func: &Function, args: &[Value]) -> Result<Value, Error> {
        let scope = func.closure.child();
        for (i, param) in func.params.iter().enumerate() {
            scope.declare(param.clone(), args.get(i).cloned().unwrap_or_default(), true);
        }
        hoist_functions(&func.body, &scope);

        match self.exec_block(&func.body, &scope, &scope)? {
            Completion::Return(value) => Ok(value),
            Completion::Normal(_) => Ok(Value::Undefined),
        }
    }

    fn exec_block(
        &mut self,
        body: &[Statement],
        scope: &Scope,
        vars: &Scope,
    ) -> Result<Completion, Error> {
        let mut last = Value::Undefined;
        for stmt in body {
            match self.exec(stmt, scope, vars)? {
                Completion::Normal(value) => last = value,
                ret @ Completion::Return(_) => return Ok(ret),
            }
        }
        Ok(Completion::Normal(last))
    }

    fn exec(&mut self, stmt: &Statement, scope: &Scope, vars: &Scope) -> Result<Completion, Error> {
        match stmt {
            Statement::VariableDeclaration(decl) => {
                for declarator in &decl.declarations {
                    let value = match &declarator.init {
                        Some(init) => self.eval(init, scope)?,
                        None => Value::Undefined,
                    };
                    let name = declarator.id.name.clone();
                    match decl.kind {
                        VariableKind::Var => vars.declare(name, value, true),
                        VariableKind::Let => scope.declare(name, value, true),
                        VariableKind::Const => scope.declare(name, value, false),
                    }
                }
                Ok(Completion::Normal(Value::Undefined))
            }
            // Declared up front by `hoist_functions`
            Statement::FunctionDeclaration(_) => Ok(Completion::Normal(Value::Undefined)),
            Statement::Expression(stmt) => Ok(Completion::Normal(self.eval(&stmt.expression, scope)?)),
            Statement::Block(block) => {
                let inner = scope.child();
                hoist_functions(&block.body, &inner);
                self.exec_block(&block.body, &inner, vars)
            }
            Statement::If(stmt) => {
                if self.eval(&stmt.test, scope)?.to_boolean() {
                    self.exec(&stmt.consequent, scope, vars)
                } else if let Some(alternate) = &stmt.alternate {
                    self.exec(alternate, scope, vars)
                } else {
                    Ok(Completion::Normal(Value::Undefined))
                }
            }
            Statement::While(stmt) => {
                let mut last = Value::Undefined;
                while self.eval(&stmt.test, scope)?.to_boolean() {
                    match self.exec(&stmt.body, scope, vars)? {
                        Completion::Normal(value) => last = value,
                        ret @ Completion::Return(_) => return Ok(ret),
                    }
                }
                Ok(Completion::Normal(last))
            }
            Statement::Return(stmt) => {
                let value = match &stmt.argument {
                    Some(arg) => self.eval(arg, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::Throw(stmt) => {
                let value = self.eval(&stmt.argument, scope)?;
                Err(Error::Thrown {
                    value,
                    line: stmt.line,
                })
            }
            Statement::Empty => Ok(Completion::Normal(Value::Undefined)),
        }
    }

    /// Evaluates an expression.
    pub fn eval(&mut self, expr: &Expression, scope: &Scope) -> Result<Value, Error> {
        match expr {
            Expression::Literal(lit) => Ok(match lit {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Null => Value::Null,
            }),
            Expression::Identifier(id) => scope
                .get(&id.name)
                .ok_or_else(|| Error::ReferenceError(format!("{} is not defined", id.name))),
            Expression::Array(array) => {
                let mut elements = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    elements.push(self.eval(element, scope)?);
                }
                Ok(Value::Array(ArrayRef::new(elements)))
            }
            Expression::Object(object) => {
                let obj = ObjectRef::new();
                for prop in &object.properties {
                    let value = self.eval(&prop.value, scope)?;
                    obj.set(prop.key.clone(), value);
                }
                Ok(Value::Object(obj))
            }
            Expression::Function(func) => {
                let name = func.id.as_ref().map(|id| id.name.clone());
                let closure = scope.child();
                let callable = Callable::script(
                    name.clone(),
                    Function {
                        params: func.params.iter().map(|p| p.name.clone()).collect(),
                        body: func.body.clone(),
                        closure: closure.clone(),
                    },
                )
                .into_value();
                // A named function expression can refer to itself
                if let Some(name) = name {
                    closure.declare(name, callable.clone(), false);
                }
                Ok(callable)
            }
            Expression::Unary(unary) => {
                // `typeof undeclared` is "undefined", not a ReferenceError
                if unary.operator == UnaryOperator::Typeof {
                    if let Expression::Identifier(id) = unary.argument.as_ref() {
                        let value = scope.get(&id.name).unwrap_or_default();
                        return Ok(Value::String(value.type_of().to_string()));
                    }
                }
                let value = self.eval(&unary.argument, scope)?;
                Ok(match unary.operator {
                    UnaryOperator::Minus => Value::Number(-value.to_number()),
                    UnaryOperator::Plus => Value::Number(value.to_number()),
                    UnaryOperator::LogicalNot => Value::Boolean(!value.to_boolean()),
                    UnaryOperator::Typeof => Value::String(value.type_of().to_string()),
                })
            }
            Expression::Binary(bin) => {
                let left = self.eval(&bin.left, scope)?;
                let right = self.eval(&bin.right, scope)?;
                Ok(binary_op(bin.operator, &left, &right))
            }
            Expression::Logical(logical) => {
                let left = self.eval(&logical.left, scope)?;
                let short_circuit = match logical.operator {
                    LogicalOperator::And => !left.to_boolean(),
                    LogicalOperator::Or => left.to_boolean(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(&logical.right, scope)
                }
            }
            Expression::Assignment(assign) => self.eval_assignment(assign, scope),
            Expression::Conditional(cond) => {
                if self.eval(&cond.test, scope)?.to_boolean() {
                    self.eval(&cond.consequent, scope)
                } else {
                    self.eval(&cond.alternate, scope)
                }
            }
            Expression::Call(call) => {
                let callee = self.eval(&call.callee, scope)?;
                if !callee.is_function() {
                    return Err(Error::TypeError(format!(
                        "{} is not a function",
                        describe_callee(&call.callee)
                    )));
                }
                let mut args = Vec::with_capacity(call.arguments.len());
                for arg in &call.arguments {
                    args.push(self.eval(arg, scope)?);
                }
                self.call(&callee, &args)
            }
            Expression::Member(member) => {
                let object = self.eval(&member.object, scope)?;
                let key = self.member_key(&member.property, scope)?;
                get_member(&object, &key)
            }
        }
    }

    fn eval_assignment(
        &mut self,
        assign: &AssignmentExpression,
        scope: &Scope,
    ) -> Result<Value, Error> {
        match assign.left.as_ref() {
            Expression::Identifier(id) => {
                let value = match assign.operator {
                    AssignmentOperator::Assign => self.eval(&assign.right, scope)?,
                    op => {
                        let current = scope.get(&id.name).ok_or_else(|| {
                            Error::ReferenceError(format!("{} is not defined", id.name))
                        })?;
                        let rhs = self.eval(&assign.right, scope)?;
                        compound(op, &current, &rhs)
                    }
                };
                match scope.set(&id.name, value.clone()) {
                    Ok(()) => Ok(value),
                    Err(AssignError::Constant) => Err(Error::TypeError(
                        "Assignment to constant variable.".to_string(),
                    )),
                    Err(AssignError::Unbound) => {
                        Err(Error::ReferenceError(format!("{} is not defined", id.name)))
                    }
                }
            }
            Expression::Member(member) => {
                let object = self.eval(&member.object, scope)?;
                let key = self.member_key(&member.property, scope)?;
                let value = match assign.operator {
                    AssignmentOperator::Assign => self.eval(&assign.right, scope)?,
                    op => {
                        let current = get_member(&object, &key)?;
                        let rhs = self.eval(&assign.right, scope)?;
                        compound(op, &current, &rhs)
                    }
                };
                set_member(&object, &key, value.clone())?;
                Ok(value)
            }
            _ => Err(Error::SyntaxError("Invalid assignment target".to_string())),
        }
    }

    fn member_key(&mut self, property: &MemberProperty, scope: &Scope) -> Result<String, Error> {
        Ok(match property {
            MemberProperty::Identifier(id) => id.name.clone(),
            MemberProperty::Expression(expr) => self.eval(expr, scope)?.to_string(),
        })
    }
}

/// Declares every function declaration in `body` before it runs.
fn hoist_functions(body: &[Statement], scope: &Scope) {
    for stmt in body {
        if let Statement::FunctionDeclaration(decl) = stmt {
            let callable = Callable::script(
                Some(decl.id.name.clone()),
                Function {
                    params: decl.params.iter().map(|p| p.name.clone()).collect(),
                    body: decl.body.clone(),
                    closure: scope.clone(),
                },
            );
            scope.declare(decl.id.name.clone(), callable.into_value(), true);
        }
    }
}

fn describe_callee(expr: &Expression) -> String {
    match expr {
        Expression::Identifier(id) => id.name.clone(),
        Expression::Member(member) => match &member.property {
            MemberProperty::Identifier(id) => format!("{}.{}", describe_callee(&member.object), id.name),
            MemberProperty::Expression(_) => format!("{}[...]", describe_callee(&member.object)),
        },
        _ => "expression".to_string(),
    }
}

fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

/// Reads `object[key]`.
pub fn get_member(object: &Value, key: &str) -> Result<Value, Error> {
    match object {
        Value::Undefined | Value::Null => Err(Error::TypeError(format!(
            "Cannot read properties of {} (reading '{}')",
            object, key
        ))),
        Value::Object(obj) => Ok(obj.get(key)),
        Value::Array(arr) => Ok(match key {
            "length" => Value::Number(arr.len() as f64),
            _ => array_index(key).map(|i| arr.get(i)).unwrap_or_default(),
        }),
        Value::String(s) => Ok(match key {
            "length" => Value::Number(s.chars().count() as f64),
            _ => array_index(key)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default(),
        }),
        Value::Function(callable) => Ok(match key {
            "name" => Value::String(callable.name().unwrap_or_default().to_string()),
            "length" => Value::Number(callable.arity() as f64),
            _ => callable.properties().get(key),
        }),
        Value::Boolean(_) | Value::Number(_) => Ok(Value::Undefined),
    }
}

/// Writes `object[key] = value`.
pub fn set_member(object: &Value, key: &str, value: Value) -> Result<(), Error> {
    match object {
        Value::Undefined | Value::Null => Err(Error::TypeError(format!(
            "Cannot set properties of {} (setting '{}')",
            object, key
        ))),
        Value::Object(obj) => {
            obj.set(key, value);
            Ok(())
        }
        Value::Array(arr) => match array_index(key) {
            Some(i) => {
                arr.set(i, value);
                Ok(())
            }
            None => Err(Error::TypeError(format!(
                "Cannot set property '{}' of an array",
                key
            ))),
        },
        Value::Function(callable) => {
            callable.properties().set(key, value);
            Ok(())
        }
        // Writes to primitives are silently dropped
        Value::Boolean(_) | Value::Number(_) | Value::String(_) => Ok(()),
    }
}

fn compound(op: AssignmentOperator, current: &Value, rhs: &Value) -> Value {
    match op {
        AssignmentOperator::AddAssign => binary_op(BinaryOperator::Add, current, rhs),
        AssignmentOperator::SubtractAssign => binary_op(BinaryOperator::Subtract, current, rhs),
        AssignmentOperator::Assign => rhs.clone(),
    }
}

fn binary_op(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOperator::Add => match (left, right) {
            (Value::String(_), _)
            | (_, Value::String(_))
            | (Value::Object(_) | Value::Array(_) | Value::Function(_), _)
            | (_, Value::Object(_) | Value::Array(_) | Value::Function(_)) => {
                Value::String(format!("{}{}", left, right))
            }
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOperator::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Modulo => Value::Number(left.to_number() % right.to_number()),
        BinaryOperator::Equal => Value::Boolean(left.loose_eq(right)),
        BinaryOperator::NotEqual => Value::Boolean(!left.loose_eq(right)),
        BinaryOperator::StrictEqual => Value::Boolean(left == right),
        BinaryOperator::StrictNotEqual => Value::Boolean(left != right),
        BinaryOperator::LessThan
        | BinaryOperator::LessThanEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanEqual => Value::Boolean(compare(op, left, right)),
    }
}

fn compare(op: BinaryOperator, left: &Value, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOperator::LessThan => ordering.is_lt(),
        BinaryOperator::LessThanEqual => ordering.is_le(),
        BinaryOperator::GreaterThan => ordering.is_gt(),
        BinaryOperator::GreaterThanEqual => ordering.is_ge(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn run(source: &str) -> Result<Value, Error> {
        let program = Parser::new(source).parse_program()?;
        let scope = Scope::new();
        Interpreter::new().run_program(&program.body, &scope)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("1 + 2 * 3;").unwrap(), Value::Number(7.0));
        assert_eq!(run("(1 + 2) * 3;").unwrap(), Value::Number(9.0));
        assert_eq!(run("7 % 4;").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run("'a' + 1 + 2;").unwrap(), Value::from("a12"));
    }

    #[test]
    fn test_closures_capture_scope() {
        let source = "
            function counter() {
                var n = 0;
                return function () { n += 1; return n; };
            }
            var next = counter();
            next();
            next();
        ";
        assert_eq!(run(source).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_function_hoisting() {
        assert_eq!(run("var x = twice(4); function twice(n) { return n * 2; } x;").unwrap(), Value::Number(8.0));
    }

    #[test]
    fn test_var_escapes_block() {
        assert_eq!(run("if (true) { var a = 1; let b = 2; } a;").unwrap(), Value::Number(1.0));
        assert!(matches!(run("if (true) { let b = 2; } b;"), Err(Error::ReferenceError(_))));
    }

    #[test]
    fn test_while_loop() {
        assert_eq!(run("var i = 0; var sum = 0; while (i < 5) { sum += i; i += 1; } sum;").unwrap(), Value::Number(10.0));
    }

    #[test]
    fn test_objects_and_arrays() {
        assert_eq!(run("var o = { a: { b: 3 } }; o.a.b;").unwrap(), Value::Number(3.0));
        assert_eq!(run("var o = {}; o['k'] = 'v'; o.k;").unwrap(), Value::from("v"));
        assert_eq!(run("var a = [1, 2, 3]; a[1] + a.length;").unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_equality() {
        assert_eq!(run("1 == '1';").unwrap(), Value::Boolean(true));
        assert_eq!(run("1 === '1';").unwrap(), Value::Boolean(false));
        assert_eq!(run("var u; null == u;").unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_typeof_undeclared() {
        assert_eq!(run("typeof nothing;").unwrap(), Value::from("undefined"));
        assert_eq!(run("typeof {};").unwrap(), Value::from("object"));
    }

    #[test]
    fn test_logical_short_circuit() {
        assert_eq!(run("var o = null; o && o.x;").unwrap(), Value::Null);
        assert_eq!(run("0 || 'fallback';").unwrap(), Value::from("fallback"));
    }

    #[test]
    fn test_throw() {
        match run("var a = 1;\nthrow 'boom';") {
            Err(Error::Thrown { value, line }) => {
                assert_eq!(value, Value::from("boom"));
                assert_eq!(line, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_const_assignment_fails() {
        assert!(matches!(run("const k = 1; k = 2;"), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_undefined_reference() {
        assert!(matches!(run("missing + 1;"), Err(Error::ReferenceError(_))));
    }

    #[test]
    fn test_member_of_undefined() {
        assert!(matches!(run("var u; u.x;"), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_call_non_function() {
        match run("var o = {}; o.nope();") {
            Err(Error::TypeError(msg)) => assert!(msg.contains("o.nope")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_recursion_limit() {
        assert!(matches!(
            run("function f() { return f(); } f();"),
            Err(Error::RangeError(_))
        ));
    }

    #[test]
    fn test_native_function_call() {
        let scope = Scope::new();
        let double = Callable::native("double", |args: &[Value]| {
            Ok(Value::Number(args.first().map(Value::to_number).unwrap_or(0.0) * 2.0))
        });
        scope.declare("double", double.into_value(), false);
        let program = Parser::new("double(21);").parse_program().unwrap();
        let result = Interpreter::new().run_program(&program.body, &scope).unwrap();
        assert_eq!(result, Value::Number(42.0));
    }
}
