//! Form Engine - Live Field Tree and Evaluation
//!
//! CRITICAL: every value or validator change re-evaluates through here.
//! No bypass. Watched fields defer their evaluation to `poll`; everything
//! else is synchronous.

use log::{debug, trace};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::schema::{
    FieldSpec, GroupSpec, GroupValidatorSpec, Schema, SchemaNode, SurfacePolicy, ValidatorSpec,
};
use crate::validators::{
    ErrorSet, FieldsMatch, GroupValidator, GroupView, MaxLength, MinLength, Pattern, Range,
    Required, Validator,
};
use crate::watch::{WatchEvent, WatchRegistry};

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static EVALUATION_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_evaluation_count() -> u32 {
    EVALUATION_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_evaluation_count() {
    EVALUATION_COUNT.store(0, Ordering::SeqCst)
}

/// Structural misuse fails loudly with one of these; user-input failures
/// never do. They only ever populate error sets.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown field path: {0}")]
    UnknownPath(String),

    #[error("path addresses a group, not a field: {0}")]
    NotAField(String),

    #[error("duplicate key in group: {0}")]
    DuplicateKey(String),

    #[error("field is disabled: {0}")]
    Disabled(String),

    #[error("invalid pattern for {path}: {source}")]
    BadPattern {
        path: String,
        source: regex::Error,
    },

    #[error("group validator references unknown sibling field: {0}")]
    UnknownSibling(String),

    #[error("schema error: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) struct FieldState {
    value: Value,
    initial: Value,
    dirty: bool,
    touched: bool,
    disabled: bool,
    initially_disabled: bool,
    validators: Vec<Box<dyn Validator>>,
    errors: ErrorSet,
}

pub(crate) struct GroupState {
    children: Vec<(String, Node)>,
    validators: Vec<Box<dyn GroupValidator>>,
    surface: SurfacePolicy,
    errors: ErrorSet,
}

pub(crate) enum Node {
    Field(FieldState),
    Group(GroupState),
}

enum NodeRef<'a> {
    Field(&'a FieldState),
    Group(&'a GroupState),
}

/// Display-relevant snapshot of one field, consumed by the message layer.
#[derive(Debug, Clone)]
pub struct DisplayState {
    pub dirty: bool,
    pub touched: bool,
    pub errors: ErrorSet,
    pub policy: SurfacePolicy,
}

/// The live form: field/group tree, watches, evaluation state.
///
/// Built once from a [`Schema`]; discarded with the surface that owns it.
pub struct FormEngine {
    root: GroupState,
    watches: WatchRegistry,
}

impl std::fmt::Debug for FormEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormEngine").finish_non_exhaustive()
    }
}

impl FormEngine {
    pub fn from_schema(schema: &Schema) -> Result<Self, EngineError> {
        let mut root = build_group(&schema.root, "")?;
        // Errors are computed from initial values right away; they stay
        // unsurfaced while fields are pristine.
        evaluate_group(&mut root);
        Ok(Self {
            root,
            watches: WatchRegistry::default(),
        })
    }

    /// Update a field's value, mark it dirty, re-evaluate.
    ///
    /// For a watched field the evaluation is deferred: the debounce
    /// deadline is (re)armed and only the trailing value after the quiet
    /// period is evaluated, at [`poll`](Self::poll) time.
    pub fn set_value(&mut self, path: &str, value: Value) -> Result<(), EngineError> {
        self.set_value_at(path, value, Instant::now())
    }

    /// Timestamp-explicit variant of `set_value`; `now` anchors the
    /// debounce deadline.
    pub fn set_value_at(
        &mut self,
        path: &str,
        value: Value,
        now: Instant,
    ) -> Result<(), EngineError> {
        let watched = self.watches.is_watched(path);
        let field = field_mut(&mut self.root, path)?;
        if field.disabled {
            return Err(EngineError::Disabled(path.to_string()));
        }
        field.value = value;
        field.dirty = true;
        if watched {
            self.watches.arm(path, now);
            trace!("set_value {path}: evaluation deferred to debounce expiry");
        } else {
            evaluate_field(field);
            let segs: Vec<&str> = path.split('.').collect();
            revalidate_path(&mut self.root, &segs);
            debug!("set_value {path}: re-evaluated");
        }
        Ok(())
    }

    /// Replace a field's validator list and re-evaluate immediately, with
    /// the value it already holds. `vec![]` makes the field
    /// unconditionally valid.
    pub fn set_validators(
        &mut self,
        path: &str,
        validators: Vec<Box<dyn Validator>>,
    ) -> Result<(), EngineError> {
        let field = field_mut(&mut self.root, path)?;
        field.validators = validators;
        evaluate_field(field);
        let segs: Vec<&str> = path.split('.').collect();
        revalidate_path(&mut self.root, &segs);
        debug!("set_validators {path}: list replaced and re-evaluated");
        Ok(())
    }

    /// Declarative form of [`set_validators`](Self::set_validators).
    pub fn set_validator_specs(
        &mut self,
        path: &str,
        specs: &[ValidatorSpec],
    ) -> Result<(), EngineError> {
        let mut validators = Vec::with_capacity(specs.len());
        for spec in specs {
            validators.push(build_validator(spec, path)?);
        }
        self.set_validators(path, validators)
    }

    /// Record loss of focus. Leaves value and dirty untouched.
    pub fn mark_touched(&mut self, path: &str) -> Result<(), EngineError> {
        let field = field_mut(&mut self.root, path)?;
        field.touched = true;
        let segs: Vec<&str> = path.split('.').collect();
        revalidate_path(&mut self.root, &segs);
        Ok(())
    }

    /// Enable or disable a field. Disabled fields are always valid and
    /// excluded from [`value_tree`](Self::value_tree).
    pub fn set_enabled(&mut self, path: &str, enabled: bool) -> Result<(), EngineError> {
        let field = field_mut(&mut self.root, path)?;
        field.disabled = !enabled;
        evaluate_field(field);
        let segs: Vec<&str> = path.split('.').collect();
        revalidate_path(&mut self.root, &segs);
        debug!("set_enabled {path}: {enabled}");
        Ok(())
    }

    /// Current error set at `path` ("" = root group). Side-effect free.
    pub fn evaluate(&self, path: &str) -> Result<ErrorSet, EngineError> {
        Ok(match self.node(path)? {
            NodeRef::Field(f) => f.errors.clone(),
            NodeRef::Group(g) => g.errors.clone(),
        })
    }

    /// Nested error report for a summary panel: own errors under `$group`,
    /// children keyed by name, empty subtrees pruned.
    pub fn errors_tree(&self, path: &str) -> Result<Value, EngineError> {
        Ok(match self.node(path)? {
            NodeRef::Field(f) => errors_json(&f.errors),
            NodeRef::Group(g) => group_errors_json(g),
        })
    }

    /// True iff the error set at `path` and all descendants is empty.
    pub fn is_valid(&self, path: &str) -> Result<bool, EngineError> {
        Ok(match self.node(path)? {
            NodeRef::Field(f) => f.errors.is_empty(),
            NodeRef::Group(g) => group_valid(g),
        })
    }

    pub fn is_dirty(&self, path: &str) -> Result<bool, EngineError> {
        match self.node(path)? {
            NodeRef::Field(f) => Ok(f.dirty),
            NodeRef::Group(_) => Err(EngineError::NotAField(path.to_string())),
        }
    }

    pub fn is_touched(&self, path: &str) -> Result<bool, EngineError> {
        match self.node(path)? {
            NodeRef::Field(f) => Ok(f.touched),
            NodeRef::Group(_) => Err(EngineError::NotAField(path.to_string())),
        }
    }

    /// Snapshot for the message layer. The surfacing policy comes from
    /// the field's parent group.
    pub fn display_state(&self, path: &str) -> Result<DisplayState, EngineError> {
        if path.is_empty() {
            return Err(EngineError::NotAField(path.to_string()));
        }
        let segs: Vec<&str> = path.split('.').collect();
        let mut group = &self.root;
        for seg in &segs[..segs.len() - 1] {
            group = match child_of(group, seg) {
                Some(Node::Group(g)) => g,
                _ => return Err(EngineError::UnknownPath(path.to_string())),
            };
        }
        match child_of(group, segs[segs.len() - 1]) {
            Some(Node::Field(f)) => Ok(DisplayState {
                dirty: f.dirty,
                touched: f.touched,
                errors: f.errors.clone(),
                policy: group.surface,
            }),
            Some(Node::Group(_)) => Err(EngineError::NotAField(path.to_string())),
            None => Err(EngineError::UnknownPath(path.to_string())),
        }
    }

    /// Current value tree, disabled fields excluded. What a submission
    /// handler serializes.
    pub fn value_tree(&self) -> Value {
        group_values(&self.root)
    }

    /// Restore every field to its initial value, pristine and untouched,
    /// and discard any pending debounced evaluation.
    pub fn reset(&mut self) {
        reset_group(&mut self.root);
        evaluate_group(&mut self.root);
        self.watches.clear_pending();
        debug!("reset: all fields restored to initial state");
    }

    /// Register a debounced watch on a field. Re-registering a path
    /// replaces its window.
    pub fn watch(&mut self, path: &str, window: Duration) -> Result<(), EngineError> {
        match self.node(path)? {
            NodeRef::Field(_) => {}
            NodeRef::Group(_) => return Err(EngineError::NotAField(path.to_string())),
        }
        self.watches.register(path, window);
        debug!("watch {path}: debounce window {window:?}");
        Ok(())
    }

    /// [`watch`](Self::watch) with the stock 1-second quiet period.
    pub fn watch_default(&mut self, path: &str) -> Result<(), EngineError> {
        self.watch(path, crate::watch::DEFAULT_DEBOUNCE)
    }

    /// Run deferred evaluations whose quiet period has elapsed at `now`.
    /// At most one evaluation per watched field per burst of edits; a
    /// superseded deadline never fires.
    pub fn poll(&mut self, now: Instant) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        for path in self.watches.due(now) {
            let segs: Vec<&str> = path.split('.').collect();
            if let Ok(Node::Field(field)) = resolve_mut(&mut self.root, &segs, &path) {
                evaluate_field(field);
                let value = field.value.clone();
                let errors = field.errors.clone();
                revalidate_path(&mut self.root, &segs);
                trace!("poll: debounced evaluation fired for {path}");
                events.push(WatchEvent { path, value, errors });
            }
        }
        events
    }

    fn node(&self, path: &str) -> Result<NodeRef<'_>, EngineError> {
        if path.is_empty() {
            return Ok(NodeRef::Group(&self.root));
        }
        let segs: Vec<&str> = path.split('.').collect();
        match resolve(&self.root, &segs, path)? {
            Node::Field(f) => Ok(NodeRef::Field(f)),
            Node::Group(g) => Ok(NodeRef::Group(g)),
        }
    }
}

fn build_group(spec: &GroupSpec, prefix: &str) -> Result<GroupState, EngineError> {
    let mut children: Vec<(String, Node)> = Vec::new();
    for child in &spec.children {
        let path = join_path(prefix, &child.name);
        if children.iter().any(|(n, _)| n == &child.name) {
            return Err(EngineError::DuplicateKey(path));
        }
        let node = match &child.node {
            SchemaNode::Field(f) => Node::Field(build_field(f, &path)?),
            SchemaNode::Group(g) => Node::Group(build_group(g, &path)?),
        };
        children.push((child.name.clone(), node));
    }

    let mut validators: Vec<Box<dyn GroupValidator>> = Vec::new();
    for v in &spec.validators {
        match v {
            GroupValidatorSpec::FieldsMatch { left, right } => {
                // A schema naming a missing sibling is a schema/UI
                // mismatch; refuse to build rather than silently pass.
                for name in [left, right] {
                    let is_field = children
                        .iter()
                        .any(|(n, node)| n == name && matches!(node, Node::Field(_)));
                    if !is_field {
                        return Err(EngineError::UnknownSibling(join_path(prefix, name)));
                    }
                }
                validators.push(Box::new(FieldsMatch {
                    left: left.clone(),
                    right: right.clone(),
                }));
            }
        }
    }

    Ok(GroupState {
        children,
        validators,
        surface: spec.surface,
        errors: ErrorSet::new(),
    })
}

fn build_field(spec: &FieldSpec, path: &str) -> Result<FieldState, EngineError> {
    let mut validators = Vec::with_capacity(spec.validators.len());
    for v in &spec.validators {
        validators.push(build_validator(v, path)?);
    }
    Ok(FieldState {
        value: spec.initial.clone(),
        initial: spec.initial.clone(),
        dirty: false,
        touched: false,
        disabled: spec.disabled,
        initially_disabled: spec.disabled,
        validators,
        errors: ErrorSet::new(),
    })
}

pub(crate) fn build_validator(
    spec: &ValidatorSpec,
    path: &str,
) -> Result<Box<dyn Validator>, EngineError> {
    Ok(match spec {
        ValidatorSpec::Required => Box::new(Required),
        ValidatorSpec::MinLength { min } => Box::new(MinLength { min: *min }),
        ValidatorSpec::MaxLength { max } => Box::new(MaxLength { max: *max }),
        ValidatorSpec::Pattern { pattern } => {
            Box::new(Pattern::new(pattern).map_err(|source| EngineError::BadPattern {
                path: path.to_string(),
                source,
            })?)
        }
        ValidatorSpec::Range { min, max } => Box::new(Range::new(*min, *max)),
    })
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn resolve<'a>(group: &'a GroupState, segs: &[&str], full: &str) -> Result<&'a Node, EngineError> {
    let (head, rest) = match segs.split_first() {
        Some(parts) => parts,
        None => return Err(EngineError::UnknownPath(full.to_string())),
    };
    let node = child_of(group, head).ok_or_else(|| EngineError::UnknownPath(full.to_string()))?;
    if rest.is_empty() {
        return Ok(node);
    }
    match node {
        Node::Group(g) => resolve(g, rest, full),
        Node::Field(_) => Err(EngineError::UnknownPath(full.to_string())),
    }
}

fn resolve_mut<'a>(
    group: &'a mut GroupState,
    segs: &[&str],
    full: &str,
) -> Result<&'a mut Node, EngineError> {
    let (head, rest) = match segs.split_first() {
        Some(parts) => parts,
        None => return Err(EngineError::UnknownPath(full.to_string())),
    };
    let idx = group
        .children
        .iter()
        .position(|(n, _)| n == head)
        .ok_or_else(|| EngineError::UnknownPath(full.to_string()))?;
    let node = &mut group.children[idx].1;
    if rest.is_empty() {
        return Ok(node);
    }
    match node {
        Node::Group(g) => resolve_mut(g, rest, full),
        Node::Field(_) => Err(EngineError::UnknownPath(full.to_string())),
    }
}

fn field_mut<'a>(root: &'a mut GroupState, path: &str) -> Result<&'a mut FieldState, EngineError> {
    if path.is_empty() {
        return Err(EngineError::NotAField(path.to_string()));
    }
    let segs: Vec<&str> = path.split('.').collect();
    match resolve_mut(root, &segs, path)? {
        Node::Field(f) => Ok(f),
        Node::Group(_) => Err(EngineError::NotAField(path.to_string())),
    }
}

fn child_of<'a>(group: &'a GroupState, name: &str) -> Option<&'a Node> {
    group
        .children
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, node)| node)
}

fn evaluate_field(field: &mut FieldState) {
    #[cfg(feature = "test-hooks")]
    EVALUATION_COUNT.fetch_add(1, Ordering::SeqCst);

    field.errors.clear();
    if field.disabled {
        return;
    }
    for v in &field.validators {
        if let Some(detail) = v.check(&field.value) {
            field.errors.insert(v.code().to_string(), detail);
        }
    }
}

fn evaluate_group(group: &mut GroupState) {
    for (_, node) in &mut group.children {
        match node {
            Node::Field(f) => evaluate_field(f),
            Node::Group(g) => evaluate_group(g),
        }
    }
    group.errors = run_group_validators(&group.children, &group.validators);
}

/// Re-run group validators at every level along `segs` (the changed
/// field's enclosing groups, root included).
fn revalidate_path(group: &mut GroupState, segs: &[&str]) {
    group.errors = run_group_validators(&group.children, &group.validators);
    if let Some((head, rest)) = segs.split_first() {
        if rest.is_empty() {
            return;
        }
        if let Some((_, Node::Group(g))) = group.children.iter_mut().find(|(n, _)| n == head) {
            revalidate_path(g, rest);
        }
    }
}

fn run_group_validators(
    children: &[(String, Node)],
    validators: &[Box<dyn GroupValidator>],
) -> ErrorSet {
    let view = ChildLookup(children);
    let mut errors = ErrorSet::new();
    for v in validators {
        if let Some(detail) = v.check(&view) {
            errors.insert(v.code().to_string(), detail);
        }
    }
    errors
}

fn group_valid(group: &GroupState) -> bool {
    group.errors.is_empty()
        && group.children.iter().all(|(_, node)| match node {
            Node::Field(f) => f.errors.is_empty(),
            Node::Group(g) => group_valid(g),
        })
}

fn group_values(group: &GroupState) -> Value {
    let mut map = Map::new();
    for (name, node) in &group.children {
        match node {
            Node::Field(f) => {
                if !f.disabled {
                    map.insert(name.clone(), f.value.clone());
                }
            }
            Node::Group(g) => {
                map.insert(name.clone(), group_values(g));
            }
        }
    }
    Value::Object(map)
}

fn errors_json(errors: &ErrorSet) -> Value {
    Value::Object(errors.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn group_errors_json(group: &GroupState) -> Value {
    let mut map = Map::new();
    if !group.errors.is_empty() {
        map.insert("$group".to_string(), errors_json(&group.errors));
    }
    for (name, node) in &group.children {
        match node {
            Node::Field(f) => {
                if !f.errors.is_empty() {
                    map.insert(name.clone(), errors_json(&f.errors));
                }
            }
            Node::Group(g) => {
                let sub = group_errors_json(g);
                let empty = sub.as_object().map_or(true, |o| o.is_empty());
                if !empty {
                    map.insert(name.clone(), sub);
                }
            }
        }
    }
    Value::Object(map)
}

fn reset_group(group: &mut GroupState) {
    for (_, node) in &mut group.children {
        match node {
            Node::Field(f) => {
                f.value = f.initial.clone();
                f.dirty = false;
                f.touched = false;
                f.disabled = f.initially_disabled;
            }
            Node::Group(g) => reset_group(g),
        }
    }
}

struct ChildLookup<'a>(&'a [(String, Node)]);

impl ChildLookup<'_> {
    fn field(&self, name: &str) -> Option<&FieldState> {
        self.0.iter().find(|(n, _)| n == name).and_then(|(_, node)| match node {
            Node::Field(f) => Some(f),
            Node::Group(_) => None,
        })
    }
}

impl GroupView for ChildLookup<'_> {
    fn child_value(&self, name: &str) -> Option<&Value> {
        self.field(name).map(|f| &f.value)
    }

    fn child_dirty(&self, name: &str) -> Option<bool> {
        self.field(name).map(|f| f.dirty)
    }

    fn child_touched(&self, name: &str) -> Option<bool> {
        self.field(name).map(|f| f.touched)
    }
}
