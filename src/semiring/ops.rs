//! Binary operators, monoids and semirings
//!
//! A semiring pairs an additive [`Monoid`] with a multiplicative
//! [`BinaryOp`]. Builtin operators are identified by a [`BinaryOpcode`];
//! user-defined operators carry a closure and the opcode
//! [`BinaryOpcode::User`].

use std::fmt;
use std::sync::Arc;

use crate::error::{AxbError, Result};
use crate::semiring::scalar::Scalar;

/// Opcodes of the builtin binary operators.
///
/// The positional operators ignore their operand values: for
/// `C(i,j) += A(i,k) * B(k,j)`, `Firsti` gives `i`, `Firstj` and `Secondi`
/// give `k`, `Secondj` gives `j`; the `1` variants add one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryOpcode {
    First,
    Second,
    /// Always one (`PAIR`)
    Oneb,
    Any,
    Min,
    Max,
    Plus,
    Minus,
    Rminus,
    Times,
    Div,
    Rdiv,
    Iseq,
    Isne,
    Isgt,
    Islt,
    Isge,
    Isle,
    Lor,
    Land,
    Lxor,
    Lxnor,
    Bor,
    Band,
    Bxor,
    Bxnor,
    Firsti,
    Firsti1,
    Firstj,
    Firstj1,
    Secondi,
    Secondi1,
    Secondj,
    Secondj1,
    /// User-defined operator
    User,
}

impl BinaryOpcode {
    /// True if the result depends only on the entry position
    pub fn is_positional(self) -> bool {
        use BinaryOpcode::*;
        matches!(
            self,
            Firsti | Firsti1 | Firstj | Firstj1 | Secondi | Secondi1 | Secondj | Secondj1
        )
    }

    /// True if `f(x,y) == f(y,x)` for every builtin type
    pub fn is_commutative(self) -> bool {
        use BinaryOpcode::*;
        matches!(
            self,
            Oneb | Any
                | Min
                | Max
                | Plus
                | Times
                | Iseq
                | Isne
                | Lor
                | Land
                | Lxor
                | Lxnor
                | Bor
                | Band
                | Bxor
                | Bxnor
        )
    }

    /// The builtin operator computing `f(y,x)`, for non-commutative builtins
    pub fn flipped(self) -> Option<Self> {
        use BinaryOpcode::*;
        match self {
            First => Some(Second),
            Second => Some(First),
            Minus => Some(Rminus),
            Rminus => Some(Minus),
            Div => Some(Rdiv),
            Rdiv => Some(Div),
            Isgt => Some(Islt),
            Islt => Some(Isgt),
            Isge => Some(Isle),
            Isle => Some(Isge),
            Firsti => Some(Secondi),
            Secondi => Some(Firsti),
            Firsti1 => Some(Secondi1),
            Secondi1 => Some(Firsti1),
            Firstj => Some(Secondj),
            Secondj => Some(Firstj),
            Firstj1 => Some(Secondj1),
            Secondj1 => Some(Firstj1),
            op if op.is_commutative() => Some(op),
            _ => None,
        }
    }

    /// True if the operator reads the value of its first operand
    pub fn uses_x(self) -> bool {
        use BinaryOpcode::*;
        !(matches!(self, Second | Oneb | Any) || self.is_positional())
    }

    /// True if the operator reads the value of its second operand
    pub fn uses_y(self) -> bool {
        use BinaryOpcode::*;
        !(matches!(self, First | Oneb) || self.is_positional())
    }

    /// True for monoids where `x ⊕ x == x`, so repeated equal terms collapse
    pub fn is_idempotent(self) -> bool {
        use BinaryOpcode::*;
        matches!(self, Any | Min | Max | Lor | Land | Bor | Band)
    }

    /// Upper-case name used in semiring names and trace output
    pub fn name(self) -> &'static str {
        use BinaryOpcode::*;
        match self {
            First => "FIRST",
            Second => "SECOND",
            Oneb => "PAIR",
            Any => "ANY",
            Min => "MIN",
            Max => "MAX",
            Plus => "PLUS",
            Minus => "MINUS",
            Rminus => "RMINUS",
            Times => "TIMES",
            Div => "DIV",
            Rdiv => "RDIV",
            Iseq => "ISEQ",
            Isne => "ISNE",
            Isgt => "ISGT",
            Islt => "ISLT",
            Isge => "ISGE",
            Isle => "ISLE",
            Lor => "LOR",
            Land => "LAND",
            Lxor => "LXOR",
            Lxnor => "LXNOR",
            Bor => "BOR",
            Band => "BAND",
            Bxor => "BXOR",
            Bxnor => "BXNOR",
            Firsti => "FIRSTI",
            Firsti1 => "FIRSTI1",
            Firstj => "FIRSTJ",
            Firstj1 => "FIRSTJ1",
            Secondi => "SECONDI",
            Secondi1 => "SECONDI1",
            Secondj => "SECONDJ",
            Secondj1 => "SECONDJ1",
            User => "USER",
        }
    }
}

/// Value of a positional operator for `C(i,j) += A(i,k) * B(k,j)`
#[inline]
pub fn positional_value<T: Scalar>(op: BinaryOpcode, i: usize, k: usize, j: usize) -> T {
    use BinaryOpcode::*;
    let v = match op {
        Firsti => i,
        Firsti1 => i + 1,
        Firstj | Secondi => k,
        Firstj1 | Secondi1 => k + 1,
        Secondj => j,
        Secondj1 => j + 1,
        _ => 0,
    };
    T::from_index(v as i64)
}

type UserFn<T> = Arc<dyn Fn(T, T) -> T + Send + Sync>;

/// A binary operator `z = f(x, y)` over one element type
#[derive(Clone)]
pub struct BinaryOp<T> {
    opcode: BinaryOpcode,
    name: String,
    func: Option<UserFn<T>>,
}

impl<T: Scalar> BinaryOp<T> {
    /// Look up a builtin operator for `T`
    pub fn builtin(opcode: BinaryOpcode) -> Result<Self> {
        if opcode == BinaryOpcode::User {
            return Err(AxbError::InvalidValue(
                "USER is not a builtin opcode".to_string(),
            ));
        }
        if !T::supports(opcode) {
            return Err(AxbError::DomainMismatch(format!(
                "{} is not defined for {}",
                opcode.name(),
                T::CODE.name()
            )));
        }
        Ok(Self::builtin_unchecked(opcode))
    }

    pub(crate) fn builtin_unchecked(opcode: BinaryOpcode) -> Self {
        Self {
            opcode,
            name: opcode.name().to_string(),
            func: None,
        }
    }

    /// Wrap a user-defined function
    pub fn user<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(T, T) -> T + Send + Sync + 'static,
    {
        Self {
            opcode: BinaryOpcode::User,
            name: name.into(),
            func: Some(Arc::new(f)),
        }
    }

    pub fn opcode(&self) -> BinaryOpcode {
        self.opcode
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_builtin(&self) -> bool {
        self.func.is_none()
    }

    /// Apply to operand values; positional operators yield zero here and are
    /// evaluated with [`BinaryOp::apply_at`]
    #[inline]
    pub fn apply(&self, x: T, y: T) -> T {
        match &self.func {
            Some(f) => f(x, y),
            None if self.opcode.is_positional() => T::zero(),
            None => T::apply(self.opcode, x, y),
        }
    }

    /// Apply as the multiplier of `C(i,j) += A(i,k) * B(k,j)`
    #[inline]
    pub fn apply_at(&self, x: T, y: T, i: usize, k: usize, j: usize) -> T {
        if self.opcode.is_positional() {
            positional_value(self.opcode, i, k, j)
        } else {
            self.apply(x, y)
        }
    }

    /// True if both handles denote the same operator
    pub fn same_op(&self, other: &BinaryOp<T>) -> bool {
        match (&self.func, &other.func) {
            (None, None) => self.opcode == other.opcode,
            (Some(f), Some(g)) => Arc::ptr_eq(f, g),
            _ => false,
        }
    }

    pub fn first() -> Self {
        Self::builtin_unchecked(BinaryOpcode::First)
    }

    pub fn second() -> Self {
        Self::builtin_unchecked(BinaryOpcode::Second)
    }

    pub fn pair() -> Self {
        Self::builtin_unchecked(BinaryOpcode::Oneb)
    }

    pub fn plus() -> Self {
        Self::builtin_unchecked(BinaryOpcode::Plus)
    }

    pub fn times() -> Self {
        Self::builtin_unchecked(BinaryOpcode::Times)
    }

    pub fn min() -> Self {
        Self::builtin_unchecked(BinaryOpcode::Min)
    }

    pub fn max() -> Self {
        Self::builtin_unchecked(BinaryOpcode::Max)
    }

    pub fn minus() -> Self {
        Self::builtin_unchecked(BinaryOpcode::Minus)
    }
}

impl<T> fmt::Debug for BinaryOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryOp")
            .field("opcode", &self.opcode)
            .field("name", &self.name)
            .finish()
    }
}

/// An associative, commutative operator with an identity value
#[derive(Clone, Debug)]
pub struct Monoid<T> {
    op: BinaryOp<T>,
    identity: T,
    terminal: Option<T>,
    builtin: bool,
}

impl<T: Scalar> Monoid<T> {
    /// Builtin monoid; fails if `opcode` has no identity for `T`
    pub fn builtin(opcode: BinaryOpcode) -> Result<Self> {
        let identity = T::identity(opcode).ok_or_else(|| {
            AxbError::DomainMismatch(format!(
                "{} is not a monoid for {}",
                opcode.name(),
                T::CODE.name()
            ))
        })?;
        Ok(Self {
            op: BinaryOp::builtin_unchecked(opcode),
            identity,
            terminal: T::terminal(opcode),
            builtin: true,
        })
    }

    /// Monoid over a user-supplied operator
    pub fn user(op: BinaryOp<T>, identity: T, terminal: Option<T>) -> Result<Self> {
        if op.opcode().is_positional() {
            return Err(AxbError::InvalidValue(format!(
                "positional operator {} cannot be a monoid",
                op.name()
            )));
        }
        Ok(Self {
            op,
            identity,
            terminal,
            builtin: false,
        })
    }

    fn always(opcode: BinaryOpcode) -> Self {
        Self {
            op: BinaryOp::builtin_unchecked(opcode),
            identity: T::identity(opcode).unwrap_or_default(),
            terminal: T::terminal(opcode),
            builtin: true,
        }
    }

    pub fn plus() -> Self {
        Self::always(BinaryOpcode::Plus)
    }

    pub fn times() -> Self {
        Self::always(BinaryOpcode::Times)
    }

    pub fn min() -> Self {
        Self::always(BinaryOpcode::Min)
    }

    pub fn max() -> Self {
        Self::always(BinaryOpcode::Max)
    }

    pub fn any() -> Self {
        Self::always(BinaryOpcode::Any)
    }

    pub fn op(&self) -> &BinaryOp<T> {
        &self.op
    }

    /// Opcode for kernel selection; `User` unless this is a builtin monoid
    pub fn opcode(&self) -> BinaryOpcode {
        if self.builtin {
            self.op.opcode()
        } else {
            BinaryOpcode::User
        }
    }

    pub fn identity(&self) -> T {
        self.identity
    }

    pub fn terminal(&self) -> Option<T> {
        self.terminal
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    #[inline]
    pub fn apply(&self, x: T, y: T) -> T {
        self.op.apply(x, y)
    }
}

/// Additive monoid plus multiplicative operator
#[derive(Clone, Debug)]
pub struct Semiring<T> {
    add: Monoid<T>,
    multiply: BinaryOp<T>,
}

impl<T: Scalar> Semiring<T> {
    pub fn new(add: Monoid<T>, multiply: BinaryOp<T>) -> Self {
        Self { add, multiply }
    }

    /// Semiring from two builtin opcodes
    pub fn builtin(add: BinaryOpcode, multiply: BinaryOpcode) -> Result<Self> {
        Ok(Self {
            add: Monoid::builtin(add)?,
            multiply: BinaryOp::builtin(multiply)?,
        })
    }

    pub fn plus_times() -> Self {
        Self::new(Monoid::plus(), BinaryOp::times())
    }

    pub fn plus_first() -> Self {
        Self::new(Monoid::plus(), BinaryOp::first())
    }

    pub fn plus_second() -> Self {
        Self::new(Monoid::plus(), BinaryOp::second())
    }

    pub fn plus_pair() -> Self {
        Self::new(Monoid::plus(), BinaryOp::pair())
    }

    pub fn any_pair() -> Self {
        Self::new(Monoid::any(), BinaryOp::pair())
    }

    pub fn min_plus() -> Self {
        Self::new(Monoid::min(), BinaryOp::plus())
    }

    pub fn max_plus() -> Self {
        Self::new(Monoid::max(), BinaryOp::plus())
    }

    pub fn max_times() -> Self {
        Self::new(Monoid::max(), BinaryOp::times())
    }

    pub fn min_first() -> Self {
        Self::new(Monoid::min(), BinaryOp::first())
    }

    pub fn add(&self) -> &Monoid<T> {
        &self.add
    }

    pub fn multiply(&self) -> &BinaryOp<T> {
        &self.multiply
    }

    /// Name in `ADD_MULT` form
    pub fn name(&self) -> String {
        format!("{}_{}", self.add.op().name(), self.multiply.name())
    }
}
