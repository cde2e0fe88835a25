use std::fmt;

/// A Funwap type. Function types are structural: two function types are
/// equivalent when their parameter lists and return types are.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Float,
    Double,
    Char,
    Bool,
    Str,
    Url,
    Void,
    Function(FunctionType),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
}

impl FunctionType {
    pub fn new(params: Vec<Type>, ret: Type) -> FunctionType {
        FunctionType {
            params,
            ret: Box::new(ret),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    /// Admits the numeric widenings of [`Type::relaxed_eq`].
    Relaxed,
    /// Tag equality; function types still compare structurally.
    Strict,
}

impl Type {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Double)
    }

    /// Relaxed equivalence, with `self` as the destination. Admits the
    /// widening chain int → float → double and treats char as compatible
    /// with the numeric types. Function types always recurse structurally.
    pub fn relaxed_eq(&self, other: &Type) -> bool {
        self.compatible(other, Mode::Relaxed)
    }

    /// Strict equivalence: exact tags, structural recursion for functions.
    pub fn strict_eq(&self, other: &Type) -> bool {
        self.compatible(other, Mode::Strict)
    }

    fn compatible(&self, other: &Type, mode: Mode) -> bool {
        use Type::*;
        match (self, other) {
            (Function(a), Function(b)) => {
                a.params.len() == b.params.len()
                    && a.params
                        .iter()
                        .zip(&b.params)
                        .all(|(p, q)| p.compatible(q, mode))
                    && a.ret.compatible(&b.ret, mode)
            }
            (Function(_), _) | (_, Function(_)) => false,
            _ if mode == Mode::Strict => self == other,
            (Int, Int | Char) => true,
            (Float, Float | Int | Char) => true,
            (Double, Double | Float | Int | Char) => true,
            (Char, Char | Int | Float | Double) => true,
            _ => self == other,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Type::*;
        match self {
            Int => write!(f, "int"),
            Float => write!(f, "float"),
            Double => write!(f, "double"),
            Char => write!(f, "char"),
            Bool => write!(f, "bool"),
            Str => write!(f, "string"),
            Url => write!(f, "url"),
            Void => write!(f, "void"),
            Function(ft) => {
                write!(f, "fun(")?;
                for (i, p) in ft.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")?;
                if *ft.ret != Void {
                    write!(f, " {}", ft.ret)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fun(params: Vec<Type>, ret: Type) -> Type {
        Type::Function(FunctionType::new(params, ret))
    }

    #[test]
    fn strict_is_reflexive_and_tag_exact() {
        use Type::*;
        for ty in [Int, Float, Double, Char, Bool, Str, Url, Void] {
            assert!(ty.strict_eq(&ty));
        }
        assert!(!Int.strict_eq(&Char));
        assert!(!Double.strict_eq(&Float));
        assert!(!Str.strict_eq(&Url));
    }

    #[test]
    fn relaxed_widening_is_directional() {
        use Type::*;
        // Destination on the left.
        assert!(Double.relaxed_eq(&Int));
        assert!(Double.relaxed_eq(&Float));
        assert!(Float.relaxed_eq(&Int));
        assert!(!Int.relaxed_eq(&Float));
        assert!(!Int.relaxed_eq(&Double));
        assert!(!Float.relaxed_eq(&Double));
    }

    #[test]
    fn relaxed_char_is_numeric_compatible() {
        use Type::*;
        assert!(Int.relaxed_eq(&Char));
        assert!(Float.relaxed_eq(&Char));
        assert!(Double.relaxed_eq(&Char));
        assert!(Char.relaxed_eq(&Int));
        assert!(Char.relaxed_eq(&Float));
        assert!(Char.relaxed_eq(&Double));
        assert!(!Char.relaxed_eq(&Bool));
        assert!(!Str.relaxed_eq(&Char));
    }

    #[test]
    fn function_types_compare_structurally() {
        use Type::*;
        let a = fun(vec![Int, Bool], Str);
        let b = fun(vec![Int, Bool], Str);
        let c = fun(vec![Int], Str);
        let d = fun(vec![Int, Bool], Void);
        assert!(a.strict_eq(&b));
        assert!(!a.strict_eq(&c));
        assert!(!a.strict_eq(&d));
        // A function type never matches a non-function, in either mode.
        assert!(!a.relaxed_eq(&Int));
        assert!(!Int.relaxed_eq(&a));
    }

    #[test]
    fn nested_function_types_recurse() {
        use Type::*;
        let curried = fun(vec![Int], fun(vec![Int], Int));
        let same = fun(vec![Int], fun(vec![Int], Int));
        let other = fun(vec![Int], fun(vec![Bool], Int));
        assert!(curried.strict_eq(&same));
        assert!(!curried.strict_eq(&other));
        // Parameters recurse with the same mode.
        let wide = fun(vec![Double], Int);
        let narrow = fun(vec![Int], Int);
        assert!(wide.relaxed_eq(&narrow));
        assert!(!wide.strict_eq(&narrow));
    }

    #[test]
    fn display_renders_function_shapes() {
        use Type::*;
        assert_eq!(fun(vec![], Void).to_string(), "fun()");
        assert_eq!(fun(vec![Int, Bool], Str).to_string(), "fun(int, bool) string");
        assert_eq!(
            fun(vec![Int], fun(vec![Int], Int)).to_string(),
            "fun(int) fun(int) int"
        );
    }
}
