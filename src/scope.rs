use std::{collections::HashMap, rc::Rc};

use crate::{
    error::{AsyncError, CompileError, ScopeError},
    types::{FunctionType, Type},
};

/// A declared name inside an activation record.
#[derive(Clone, Debug)]
pub struct Identifier {
    pub name: Rc<str>,
    pub ty: Type,
    initialized: bool,
    modified: bool,
    modified_at: Option<usize>,
    /// Set when the identifier is the target of an async or dasync
    /// assignment and the produced value has not been waited on yet.
    pub pending: bool,
}

impl Identifier {
    pub fn new(name: Rc<str>, ty: Type, initialized: bool) -> Identifier {
        Identifier {
            name,
            ty,
            initialized,
            modified: false,
            modified_at: None,
            pending: false,
        }
    }

    /// Whether a read at stack position `position` observes a value. A
    /// deferred modification (made from inside a closure or async block)
    /// only counts once the stack has grown back past the position it was
    /// recorded at.
    pub fn has_value(&self, position: usize) -> bool {
        self.initialized
            || self.modified
            || self.modified_at.is_some_and(|at| position >= at)
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub fn mark_modified(&mut self, deferred: bool, position: usize) {
        if deferred {
            self.modified_at = Some(position);
        } else {
            self.modified = true;
        }
    }
}

/// One activation record in the arena. Named function records persist for
/// the whole compilation; anonymous block records and closure bindings are
/// popped as their enclosing block closes.
#[derive(Debug)]
pub struct Record {
    name: Rc<str>,
    /// Present for callable records (functions, closure bindings).
    signature: Option<FunctionType>,
    idents: HashMap<Rc<str>, Identifier>,
    is_closure: bool,
    /// The record pushed immediately before this one; overload resolution
    /// scans down this chain.
    static_link: Option<usize>,
    /// The lexical chain. `None` marks a named function, the top of a
    /// chain; anonymous records point at the record they were opened in.
    environment: Option<usize>,
}

impl Record {
    pub fn function(name: impl Into<Rc<str>>, signature: FunctionType) -> Record {
        Record {
            name: name.into(),
            signature: Some(signature),
            idents: HashMap::new(),
            is_closure: false,
            static_link: None,
            environment: None,
        }
    }

    pub fn block() -> Record {
        Record {
            name: "".into(),
            signature: None,
            idents: HashMap::new(),
            is_closure: false,
            static_link: None,
            environment: None,
        }
    }

    fn matches_call(&self, name: &str, args: &[Type]) -> bool {
        self.name.as_ref() == name
            && self.signature.as_ref().is_some_and(|sig| {
                sig.params.len() == args.len()
                    && sig
                        .params
                        .iter()
                        .zip(args)
                        .all(|(param, arg)| param.relaxed_eq(arg))
            })
    }

    fn matches_signature(&self, name: &str, params: &[Type]) -> bool {
        self.name.as_ref() == name
            && self.signature.as_ref().is_some_and(|sig| {
                sig.params.len() == params.len()
                    && sig
                        .params
                        .iter()
                        .zip(params)
                        .all(|(a, b)| a.strict_eq(b))
            })
    }
}

/// The activation-record stack. Slot 0 is the global record; the builtin
/// `println`/`readln` overloads are pushed right after it, chained through
/// their static links so the overload scan reaches them all.
#[derive(Debug)]
pub struct ScopeStack {
    records: Vec<Record>,
    /// The record open declarations land in. Not always the top of the
    /// stack: closure bindings sit above their enclosing block.
    current: usize,
}

impl Default for ScopeStack {
    fn default() -> ScopeStack {
        ScopeStack::new()
    }
}

impl ScopeStack {
    pub fn new() -> ScopeStack {
        use Type::*;
        let mut scopes = ScopeStack {
            records: Vec::new(),
            current: 0,
        };
        scopes.push(Record::function("", FunctionType::new(vec![], Void)), false);
        for param in [Str, Int, Bool, Char] {
            scopes.push(
                Record::function("println", FunctionType::new(vec![param], Void)),
                false,
            );
        }
        scopes.push(Record::function("println", FunctionType::new(vec![], Void)), false);
        // Pushed last, so a bare `readln()` resolves to the url overload.
        scopes.push(Record::function("readln", FunctionType::new(vec![], Str)), false);
        scopes.push(Record::function("readln", FunctionType::new(vec![], Url)), false);
        scopes.current = 0;
        scopes
    }

    /// The next free stack position; also used as the "current position"
    /// for [`Identifier::has_value`] and the async side-effect boundary.
    pub fn top(&self) -> usize {
        self.records.len()
    }

    fn push(&mut self, mut record: Record, closure: bool) -> usize {
        let index = self.records.len();
        record.static_link = index.checked_sub(1);
        record.is_closure = closure;
        if closure {
            record.environment = index.checked_sub(1);
        } else if record.name.is_empty() && index > 0 {
            record.environment = Some(self.current);
        }
        self.records.push(record);
        index
    }

    /// Pushes a function or block record and makes it current.
    pub fn push_frame(&mut self, record: Record) -> usize {
        let index = self.push(record, false);
        self.current = index;
        index
    }

    /// Pushes a callable closure binding. It is skipped by variable lookup,
    /// found by function lookup, and popped when the enclosing block closes.
    /// The current record is left untouched.
    pub fn push_binding(&mut self, name: Rc<str>, signature: FunctionType) -> usize {
        self.push(Record::function(name, signature), true)
    }

    /// Closes the block whose record is on top: trailing closure bindings
    /// are popped, then the record itself unless it is a named function.
    pub fn close_block(&mut self, named: bool) {
        while self.records.last().is_some_and(|r| r.is_closure) {
            self.records.pop();
        }
        if !named {
            self.records.pop();
        }
        self.current = self
            .records
            .iter()
            .rposition(|r| !r.is_closure)
            .unwrap_or(0);
    }

    /// Declares into the current record, rejecting redeclaration there.
    /// Shadowing an enclosing record's name is allowed.
    pub fn declare(&mut self, ident: Identifier, line: u32) -> Result<(), CompileError> {
        let record = &mut self.records[self.current];
        if record.idents.contains_key(&ident.name) {
            return Err(CompileError::new(
                line,
                ScopeError::DuplicatedVariable(ident.name.to_string()),
            ));
        }
        record.idents.insert(Rc::clone(&ident.name), ident);
        Ok(())
    }

    /// Walks the lexical chain from the top of the stack, skipping closure
    /// bindings, optionally falling back to the global record. Returns the
    /// index of the owning record.
    pub fn find_record(&self, name: &str, include_global: bool) -> Option<usize> {
        let mut i = self.records.len() - 1;
        loop {
            let record = &self.records[i];
            if !record.is_closure && record.idents.contains_key(name) {
                return Some(i);
            }
            match record.environment {
                Some(env) => i = env,
                None => break,
            }
        }
        if include_global && self.records[0].idents.contains_key(name) {
            return Some(0);
        }
        None
    }

    pub fn identifier_mut(&mut self, name: &str) -> Option<&mut Identifier> {
        let i = self.find_record(name, true)?;
        self.records[i].idents.get_mut(name)
    }

    /// Variable lookup. When `async_boundary` is set, finding the name in a
    /// record pushed before the boundary is a side-effect violation.
    pub fn lookup_identifier(
        &mut self,
        name: &str,
        include_global: bool,
        async_boundary: Option<usize>,
        line: u32,
    ) -> Result<Option<&mut Identifier>, CompileError> {
        let Some(i) = self.find_record(name, include_global) else {
            return Ok(None);
        };
        if async_boundary.is_some_and(|boundary| i < boundary) {
            return Err(CompileError::new(line, AsyncError::SideEffect));
        }
        Ok(self.records[i].idents.get_mut(name))
    }

    /// Function lookup: a top-down static-link scan over the live records.
    /// Every record below the top is an enclosing context, a sibling closure
    /// binding, or a persisted function, so the scan reaches them all, most
    /// recently pushed first. Arguments match relaxed, so overloads resolve
    /// the way call sites widen.
    pub fn lookup_function(&self, name: &str, args: &[Type]) -> Option<FunctionType> {
        let mut next = Some(self.records.len() - 1);
        while let Some(i) = next {
            let record = &self.records[i];
            if record.matches_call(name, args) {
                return record.signature.clone();
            }
            next = record.static_link;
        }
        None
    }

    /// Strict signature search, used to reject duplicate declarations.
    pub fn has_signature(&self, name: &str, params: &[Type]) -> bool {
        let mut next = Some(self.records.len() - 1);
        while let Some(i) = next {
            let record = &self.records[i];
            if record.matches_signature(name, params) {
                return true;
            }
            next = record.static_link;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use Type::*;

    fn ident(name: &str, ty: Type, initialized: bool) -> Identifier {
        Identifier::new(name.into(), ty, initialized)
    }

    #[test]
    fn builtins_resolve_through_static_links() {
        let scopes = ScopeStack::new();
        for args in [vec![Str], vec![Int], vec![Bool], vec![Char], vec![]] {
            let sig = scopes.lookup_function("println", &args).unwrap();
            assert_eq!(*sig.ret, Void);
        }
        // The later-pushed url overload shadows the string one.
        let sig = scopes.lookup_function("readln", &[]).unwrap();
        assert_eq!(*sig.ret, Url);
    }

    #[test]
    fn call_arguments_match_relaxed() {
        let scopes = ScopeStack::new();
        // println(int) accepts a char argument through widening.
        assert!(scopes.lookup_function("println", &[Char]).is_some());
        assert!(scopes.lookup_function("println", &[Url]).is_none());
        assert!(scopes.lookup_function("missing", &[]).is_none());
    }

    #[test]
    fn inner_declarations_shadow_outer_ones() {
        let mut scopes = ScopeStack::new();
        scopes.push_frame(Record::function("main", FunctionType::new(vec![], Void)));
        let outer = scopes.current;
        scopes.declare(ident("x", Int, true), 1).unwrap();
        scopes.push_frame(Record::block());
        let inner = scopes.current;
        scopes.declare(ident("x", Bool, true), 2).unwrap();

        assert_eq!(scopes.find_record("x", true), Some(inner));
        scopes.close_block(false);
        assert_eq!(scopes.find_record("x", true), Some(outer));
    }

    #[test]
    fn redeclaration_in_same_record_is_rejected() {
        let mut scopes = ScopeStack::new();
        scopes.push_frame(Record::function("main", FunctionType::new(vec![], Void)));
        scopes.declare(ident("x", Int, true), 1).unwrap();
        let err = scopes.declare(ident("x", Int, true), 2).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Scope(ScopeError::DuplicatedVariable("x".into()))
        );
    }

    #[test]
    fn closure_bindings_are_invisible_to_variable_lookup() {
        let mut scopes = ScopeStack::new();
        scopes.push_frame(Record::function("main", FunctionType::new(vec![], Void)));
        scopes.declare(ident("x", Int, true), 1).unwrap();
        scopes.push_binding("inc".into(), FunctionType::new(vec![Int], Int));

        // The binding is callable but holds no visible variables.
        assert!(scopes.lookup_function("inc", &[Int]).is_some());
        assert_eq!(scopes.find_record("x", true), Some(scopes.current));

        // Closing the enclosing block drops the binding with it.
        scopes.close_block(true);
        assert!(scopes.lookup_function("inc", &[Int]).is_none());
    }

    #[test]
    fn duplicate_signature_detection_is_strict() {
        let mut scopes = ScopeStack::new();
        scopes.push_frame(Record::function(
            "half",
            FunctionType::new(vec![Int], Int),
        ));
        scopes.close_block(true);
        assert!(scopes.has_signature("half", &[Int]));
        // Relaxed-compatible but not identical: allowed as an overload.
        assert!(!scopes.has_signature("half", &[Char]));
        assert!(!scopes.has_signature("half", &[Int, Int]));
    }

    #[test]
    fn async_boundary_rejects_older_records() {
        let mut scopes = ScopeStack::new();
        scopes.push_frame(Record::function("main", FunctionType::new(vec![], Void)));
        scopes.declare(ident("x", Int, true), 1).unwrap();
        let boundary = scopes.top();
        scopes.push_frame(Record::block());
        scopes.declare(ident("local", Int, true), 2).unwrap();

        let err = scopes
            .lookup_identifier("x", true, Some(boundary), 3)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Async(AsyncError::SideEffect));
        assert!(scopes
            .lookup_identifier("local", true, Some(boundary), 3)
            .unwrap()
            .is_some());
    }

    #[test]
    fn deferred_modification_counts_only_past_its_position() {
        let mut id = ident("x", Int, false);
        assert!(!id.has_value(10));
        id.mark_modified(true, 12);
        assert!(!id.has_value(10));
        assert!(id.has_value(12));
        assert!(id.has_value(15));

        let mut id = ident("y", Int, false);
        id.mark_modified(false, 12);
        assert!(id.has_value(0));
    }
}
