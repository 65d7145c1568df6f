//! Builder AST accepted by the lowering pass
//!
//! There is no surface parser: hosts and tests build functions directly from
//! these nodes.

use crate::compiler::bytecode::{FunctionKind, UsingHint};

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// Boolean literal
    Bool(bool),
    /// Integer literal
    Int(i32),
    /// String literal
    Str(String),
    /// Read of a local binding (parameter, `let` or `using`)
    Local(String),
    /// Read of a host global
    Global(String),
    /// Call with an undefined receiver
    Call {
        /// Callee expression
        callee: Box<Expr>,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `await expr`
    Await(Box<Expr>),
    /// `yield expr`
    Yield(Box<Expr>),
}

impl Expr {
    /// String literal
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Local binding read
    pub fn local(name: impl Into<String>) -> Self {
        Self::Local(name.into())
    }

    /// Global read
    pub fn global(name: impl Into<String>) -> Self {
        Self::Global(name.into())
    }

    /// `callee(args...)`
    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Self::Call {
            callee: Box::new(callee),
            args,
        }
    }

    /// `name(args...)` for a global `name`
    pub fn call_global(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::call(Self::global(name), args)
    }

    /// `await self`
    pub fn awaited(self) -> Self {
        Self::Await(Box::new(self))
    }

    /// `yield self`
    pub fn yielded(self) -> Self {
        Self::Yield(Box::new(self))
    }
}

/// Statement node
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression statement
    Expr(Expr),
    /// `let name = init`
    Let {
        /// Binding name
        name: String,
        /// Initializer
        init: Expr,
    },
    /// `using name = init` / `await using name = init`
    Using {
        /// Binding name
        name: String,
        /// Sync or async registration
        hint: UsingHint,
        /// Initializer
        init: Expr,
    },
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// `if (cond) { then } else { otherwise }`
    If {
        /// Condition
        cond: Expr,
        /// Taken when truthy
        then: Vec<Stmt>,
        /// Taken when falsy
        otherwise: Vec<Stmt>,
    },
    /// `[label:] while (cond) { body }`
    While {
        /// Optional label
        label: Option<String>,
        /// Condition
        cond: Expr,
        /// Body
        body: Vec<Stmt>,
    },
    /// `[label:] for ([await] using? binding of iterable) { body }`
    ForOf {
        /// Optional label
        label: Option<String>,
        /// Per-iteration binding
        binding: String,
        /// Registers each iterated value as a disposable when set
        using: Option<UsingHint>,
        /// Iterable expression
        iterable: Expr,
        /// Body
        body: Vec<Stmt>,
    },
    /// `try { body } catch (param) { handler }`
    TryCatch {
        /// Protected statements
        body: Vec<Stmt>,
        /// Catch binding
        param: Option<String>,
        /// Handler statements
        handler: Vec<Stmt>,
    },
    /// `throw expr`
    Throw(Expr),
    /// `return [expr]`
    Return(Option<Expr>),
    /// `break [label]`
    Break(Option<String>),
    /// `continue [label]`
    Continue(Option<String>),
}

impl Stmt {
    /// `expr;`
    pub fn expr(expr: Expr) -> Self {
        Self::Expr(expr)
    }

    /// `using name = init`
    pub fn using(name: impl Into<String>, init: Expr) -> Self {
        Self::Using {
            name: name.into(),
            hint: UsingHint::Sync,
            init,
        }
    }

    /// `await using name = init`
    pub fn await_using(name: impl Into<String>, init: Expr) -> Self {
        Self::Using {
            name: name.into(),
            hint: UsingHint::Async,
            init,
        }
    }

    /// `let name = init`
    pub fn let_(name: impl Into<String>, init: Expr) -> Self {
        Self::Let {
            name: name.into(),
            init,
        }
    }

    /// `return expr`
    pub fn ret(expr: Expr) -> Self {
        Self::Return(Some(expr))
    }
}

/// A function to compile
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Function name (unique within a module)
    pub name: String,
    /// Execution flavour
    pub kind: FunctionKind,
    /// Parameter names
    pub params: Vec<String>,
    /// Body statements
    pub body: Vec<Stmt>,
}

impl FunctionDecl {
    /// Create a parameterless function
    pub fn new(name: impl Into<String>, kind: FunctionKind, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            kind,
            params: Vec::new(),
            body,
        }
    }

    /// Set the parameter list
    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }
}
