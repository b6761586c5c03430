//! The class/object/enum runtime: declaration, the instantiation sequence,
//! enum entry materialisation, and lazy singletons.

use std::sync::{Arc, atomic::AtomicBool};

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    class::{
        AbstractMethod, ClassDescriptor, ClassId, CompanionDef, InitItem, Instance, InstanceKind, SecondaryCtor,
        arena_read, arena_write,
    },
    env::Env,
    error::{ErrorKind, EvalResult, NovaError, Signal},
    interp::Interpreter,
    mir::{ClassDef, ClassKind, Member, Param, Pattern},
    types::{CallArgs, UserFunction},
    value::Value,
};

/// Guard against `this(...)` delegation cycles between secondary ctors.
const MAX_CTOR_DELEGATION: usize = 32;

impl Interpreter {
    /// Evaluates a class-like declaration: builds the descriptor, installs it
    /// in the arena, and runs annotation processors exactly once.
    pub(crate) fn declare_class(&mut self, def: &ClassDef, env: &Env, file: &Arc<str>) -> EvalResult<()> {
        // resolve the supertypes first
        let mut superclass = None;
        let mut super_args = Vec::new();
        let mut interfaces = Vec::new();
        if let Some((name, args)) = &def.superclass {
            let id = self.resolve_class_name(name)?;
            superclass = Some(id);
            super_args = args.clone();
        }
        for name in &def.interfaces {
            let id = self.resolve_class_name(name)?;
            if arena_read(&self.classes).is_interface(id) {
                interfaces.push(id);
            } else if superclass.is_none() {
                // `class C : Base` without constructor arguments
                superclass = Some(id);
            } else {
                return Err(Signal::raise(NovaError::type_error(format!(
                    "{name} is not an interface"
                ))));
            }
        }

        // sealed classes only accept same-unit subclasses in batch mode
        if let Some(super_id) = superclass
            && let Some(super_desc) = arena_read(&self.classes).get(super_id)
            && super_desc.is_sealed
            && super_desc.unit_id != self.current_unit
            && !self.repl_mode
        {
            return Err(Signal::raise(NovaError::new(
                ErrorKind::SealedSubclass,
                format!("sealed class {} cannot be subclassed outside its compilation unit", super_desc.name),
            )));
        }

        let id = arena_write(&self.classes).reserve(&def.name);
        let name: Arc<str> = Arc::from(def.name.as_str());
        let class_ref = crate::class::ClassRef {
            id,
            name: Arc::clone(&name),
        };

        let mut methods: AHashMap<String, Vec<Arc<UserFunction>>> = AHashMap::new();
        let mut abstract_methods: Vec<AbstractMethod> = Vec::new();
        let mut init_items = Vec::new();
        let mut secondaries = Vec::new();
        let mut companion = None;

        for member in &def.members {
            match member {
                Member::Method(fun) => {
                    if fun.is_abstract {
                        abstract_methods.push(AbstractMethod {
                            name: fun.name.clone(),
                            arity: fun.params.len(),
                        });
                    } else {
                        let function = self.make_function(fun, env, file, Some(class_ref.clone()));
                        methods.entry(fun.name.clone()).or_default().push(function);
                    }
                }
                Member::Property {
                    name,
                    mutable,
                    visibility,
                    init,
                    line,
                } => init_items.push(InitItem::Property {
                    name: name.clone(),
                    mutable: *mutable,
                    visibility: *visibility,
                    init: init.clone(),
                    line: *line,
                }),
                Member::Init(block) => init_items.push(InitItem::Block(block.clone())),
                Member::Ctor {
                    params,
                    delegate,
                    body,
                    line,
                } => secondaries.push(SecondaryCtor {
                    params: params.clone(),
                    delegate: delegate.clone(),
                    body: body.clone(),
                    line: *line,
                }),
                Member::Companion { members } => {
                    let mut companion_methods: AHashMap<String, Vec<Arc<UserFunction>>> = AHashMap::new();
                    let mut companion_items = Vec::new();
                    for member in members {
                        match member {
                            Member::Method(fun) => {
                                let function = self.make_function(fun, env, file, Some(class_ref.clone()));
                                companion_methods.entry(fun.name.clone()).or_default().push(function);
                            }
                            Member::Property {
                                name,
                                mutable,
                                visibility,
                                init,
                                line,
                            } => companion_items.push(InitItem::Property {
                                name: name.clone(),
                                mutable: *mutable,
                                visibility: *visibility,
                                init: init.clone(),
                                line: *line,
                            }),
                            Member::Init(block) => companion_items.push(InitItem::Block(block.clone())),
                            _ => {
                                return Err(Signal::raise(NovaError::syntax(
                                    def.line,
                                    1,
                                    "companion objects may only contain methods, properties, and init blocks",
                                )));
                            }
                        }
                    }
                    companion = Some(CompanionDef {
                        methods: companion_methods,
                        init_items: companion_items,
                        instance: std::sync::OnceLock::new(),
                    });
                }
            }
        }

        // interfaces carry their bodiless signatures as abstract members
        let annotations = self.eval_annotation_args(def, env, file)?;

        let descriptor = Arc::new(ClassDescriptor {
            id,
            name: Arc::clone(&name),
            kind: def.kind,
            is_abstract: def.is_abstract,
            is_sealed: def.is_sealed,
            unit_id: self.current_unit,
            annotations,
            type_params: def.type_params.clone(),
            primary: def.primary.clone(),
            secondaries,
            superclass,
            super_args,
            interfaces,
            init_items,
            methods,
            abstract_methods,
            companion,
            entry_defs: def.entries.clone(),
            enum_entries: std::sync::OnceLock::new(),
            singleton: std::sync::OnceLock::new(),
            defining_env: env.clone(),
            data: AtomicBool::new(false),
            builder: AtomicBool::new(false),
            source_file: Arc::clone(file),
            line: def.line,
        });
        arena_write(&self.classes).install(descriptor);

        // run registered processors once, at declaration time
        let annotations = arena_read(&self.classes)
            .get(id)
            .map(|d| d.annotations.clone())
            .unwrap_or_default();
        for (annotation, args) in &annotations {
            if let Some(processor) = self.processors.get(annotation).cloned() {
                processor(self, &class_ref, args).map_err(Signal::raise)?;
            }
        }
        Ok(())
    }

    fn resolve_class_name(&mut self, name: &str) -> EvalResult<ClassId> {
        arena_read(&self.classes)
            .lookup(name)
            .ok_or_else(|| Signal::raise(NovaError::undefined_variable(name)))
    }

    /// Evaluates `@X(args)` argument lists into name→value maps. Positional
    /// arguments take the annotation class's parameter names when it is
    /// declared, falling back to positional keys.
    fn eval_annotation_args(
        &mut self,
        def: &ClassDef,
        env: &Env,
        file: &Arc<str>,
    ) -> EvalResult<Vec<(String, IndexMap<String, Value>)>> {
        let mut out = Vec::with_capacity(def.annotations.len());
        for annotation in &def.annotations {
            let param_names: Vec<String> = {
                let arena = arena_read(&self.classes);
                arena
                    .lookup(&annotation.name)
                    .and_then(|id| arena.get(id))
                    .filter(|d| d.kind == ClassKind::Annotation)
                    .and_then(|d| d.primary.as_ref().map(|p| p.iter().map(|c| c.name.clone()).collect()))
                    .unwrap_or_default()
            };
            let mut map = IndexMap::new();
            let mut position = 0_usize;
            for arg in &annotation.args {
                let value = self.eval_expr(&arg.value, env, file)?;
                let key = match &arg.name {
                    Some(name) => name.clone(),
                    None => {
                        let key = param_names
                            .get(position)
                            .cloned()
                            .unwrap_or_else(|| position.to_string());
                        position += 1;
                        key
                    }
                };
                map.insert(key, value);
            }
            out.push((annotation.name.clone(), map));
        }
        Ok(out)
    }

    /// The value a class name evaluates to: the class handle, or the lazily
    /// created instance for `object` declarations.
    pub(crate) fn class_value(&mut self, id: ClassId) -> EvalResult<Value> {
        let descriptor =
            arena_read(&self.classes).get(id).ok_or_else(|| Signal::raise(NovaError::type_error("unknown class")))?;
        if descriptor.kind == ClassKind::Object {
            if let Some(existing) = descriptor.singleton.get() {
                return Ok(existing.clone());
            }
            let instance = Instance::new(id, Arc::clone(&descriptor.name), InstanceKind::Object, false);
            let value = Value::Instance(Arc::clone(&instance));
            // first write wins; a concurrent initialiser's instance is kept
            if descriptor.singleton.set(value.clone()).is_ok() {
                self.class_context.push(id);
                let result = self.init_with_primary(&descriptor, &instance, CallArgs::empty());
                self.class_context.pop();
                result?;
            }
            return Ok(descriptor.singleton.get().cloned().unwrap_or(value));
        }
        Ok(Value::Class(descriptor.class_ref()))
    }

    /// The companion singleton, created on first access.
    pub(crate) fn companion_instance(&mut self, id: ClassId) -> EvalResult<Value> {
        let descriptor =
            arena_read(&self.classes).get(id).ok_or_else(|| Signal::raise(NovaError::type_error("unknown class")))?;
        let Some(companion) = &descriptor.companion else {
            return Err(Signal::raise(NovaError::type_error(format!(
                "{} has no companion object",
                descriptor.name
            ))));
        };
        if let Some(existing) = companion.instance.get() {
            return Ok(existing.clone());
        }
        let instance = Instance::new(id, Arc::clone(&descriptor.name), InstanceKind::Companion, false);
        let value = Value::Instance(Arc::clone(&instance));
        if companion.instance.set(value.clone()).is_ok() {
            let env = descriptor.defining_env.child();
            env.define_val("this", value.clone(), true).map_err(Signal::raise)?;
            self.class_context.push(id);
            let result = self.run_init_items(&companion.init_items, &instance, &env, &descriptor.source_file);
            self.class_context.pop();
            result?;
        }
        Ok(companion.instance.get().cloned().unwrap_or(value))
    }

    /// Materialises enum entries in declaration order, once.
    pub(crate) fn enum_entries(&mut self, id: ClassId) -> EvalResult<Vec<Value>> {
        let descriptor =
            arena_read(&self.classes).get(id).ok_or_else(|| Signal::raise(NovaError::type_error("unknown class")))?;
        if descriptor.kind != ClassKind::Enum {
            return Err(Signal::raise(NovaError::type_error(format!(
                "{} is not an enum class",
                descriptor.name
            ))));
        }
        if let Some(entries) = descriptor.enum_entries.get() {
            return Ok(entries.clone());
        }
        let env = descriptor.defining_env.clone();
        let file = Arc::clone(&descriptor.source_file);
        let entry_defs = descriptor.entry_defs.clone();
        let mut entries = Vec::with_capacity(entry_defs.len());
        for (ordinal, entry) in entry_defs.iter().enumerate() {
            let (args, _) = self.eval_args(&entry.args, &env, &file)?;
            let instance = Instance::new(id, Arc::clone(&descriptor.name), InstanceKind::EnumEntry, false);
            self.class_context.push(id);
            let result = self.init_with_primary(&descriptor, &instance, args);
            self.class_context.pop();
            result?;
            instance.set_field("name", Value::from_str_slice(&entry.name));
            instance.set_field("ordinal", Value::Int(ordinal as i32));
            entries.push(Value::Instance(instance));
        }
        let _ = descriptor.enum_entries.set(entries.clone());
        Ok(descriptor.enum_entries.get().cloned().unwrap_or(entries))
    }

    /// Instantiates a user class: constructor selection by arity, bottom-up
    /// `this(...)` delegation, then lexically ordered property initialisers
    /// and init blocks, superclass first.
    pub(crate) fn instantiate_class(&mut self, id: ClassId, args: CallArgs, line: u32) -> EvalResult<Value> {
        let descriptor =
            arena_read(&self.classes).get(id).ok_or_else(|| Signal::raise(NovaError::type_error("unknown class")))?;
        match descriptor.kind {
            ClassKind::Interface => {
                return Err(Signal::raise(NovaError::new(
                    ErrorKind::AbstractInstantiation,
                    format!("cannot instantiate interface {}", descriptor.name),
                )));
            }
            ClassKind::Annotation => {
                return Err(Signal::raise(NovaError::new(
                    ErrorKind::AbstractInstantiation,
                    format!("cannot instantiate annotation class {}", descriptor.name),
                )));
            }
            ClassKind::Enum => {
                return Err(Signal::raise(NovaError::new(
                    ErrorKind::AbstractInstantiation,
                    format!("enum class {} cannot be instantiated directly", descriptor.name),
                )));
            }
            ClassKind::Object => {
                return Err(Signal::raise(NovaError::new(
                    ErrorKind::AbstractInstantiation,
                    format!("object {} cannot be instantiated; reference it by name", descriptor.name),
                )));
            }
            ClassKind::Class => {}
        }
        if descriptor.is_abstract {
            return Err(Signal::raise(NovaError::new(
                ErrorKind::AbstractInstantiation,
                format!("cannot instantiate abstract class {}", descriptor.name),
            )));
        }
        let missing = arena_read(&self.classes).unimplemented_abstracts(id);
        if let Some(first) = missing.first() {
            return Err(Signal::raise(NovaError::new(
                ErrorKind::AbstractInstantiation,
                format!(
                    "cannot instantiate {}: abstract member '{}' is not implemented",
                    descriptor.name, first.name
                ),
            )));
        }

        let instance = Instance::new(id, Arc::clone(&descriptor.name), InstanceKind::Regular, descriptor.is_data());
        self.class_context.push(id);
        let result = self.construct_with(&descriptor, &instance, args, 0, line);
        self.class_context.pop();
        result?;
        Ok(Value::Instance(instance))
    }

    /// Selects the constructor by arity (primary preferred) and runs it.
    fn construct_with(
        &mut self,
        descriptor: &Arc<ClassDescriptor>,
        instance: &Arc<Instance>,
        args: CallArgs,
        delegation_depth: usize,
        line: u32,
    ) -> EvalResult<()> {
        if delegation_depth > MAX_CTOR_DELEGATION {
            return Err(Signal::raise(NovaError::new(
                ErrorKind::ConstructorArgMismatch,
                format!("constructor delegation cycle in {}", descriptor.name),
            )));
        }
        if descriptor.primary.is_some() || descriptor.secondaries.is_empty() {
            let primary = descriptor.primary.clone().unwrap_or_default();
            if ctor_accepts(&primary, &args) {
                return self.init_with_primary(descriptor, instance, args);
            }
        }
        let chosen = descriptor
            .secondaries
            .iter()
            .position(|ctor| params_accept(&ctor.params, &args));
        match chosen {
            Some(index) => self.run_secondary(descriptor, instance, index, args, delegation_depth, line),
            None => Err(Signal::raise(NovaError::new(
                ErrorKind::ConstructorArgMismatch,
                format!(
                    "no constructor of {} accepts {} argument(s)",
                    descriptor.name,
                    args.len()
                ),
            ))),
        }
    }

    /// Primary-constructor initialisation on `instance`: bind parameters,
    /// initialise the superclass chain, then run this class's property
    /// initialisers and init blocks in lexical order.
    fn init_with_primary(
        &mut self,
        descriptor: &Arc<ClassDescriptor>,
        instance: &Arc<Instance>,
        args: CallArgs,
    ) -> EvalResult<()> {
        let env = descriptor.defining_env.child();
        env.define_val("this", Value::Instance(Arc::clone(instance)), true)
            .map_err(Signal::raise)?;

        let primary = descriptor.primary.clone().unwrap_or_default();
        let params: Vec<Param> = primary
            .iter()
            .map(|p| Param {
                pattern: Pattern::Name(p.name.clone()),
                default: p.default.clone(),
            })
            .collect();
        self.bind_ctor_params(&descriptor.name, &params, args, &env)?;

        // constructor-declared properties become fields immediately
        for param in &primary {
            if param.prop.is_some() {
                let value = env.get(&param.name).map_err(Signal::raise)?;
                instance.set_field(&param.name, value);
            }
        }

        // superclass first
        if let Some(super_id) = descriptor.superclass {
            let super_descriptor = arena_read(&self.classes)
                .get(super_id)
                .ok_or_else(|| Signal::raise(NovaError::type_error("unknown superclass")))?;
            let (super_args, _) = {
                let file = Arc::clone(&descriptor.source_file);
                self.eval_args(&descriptor.super_args.clone(), &env, &file)?
            };
            self.class_context.push(super_id);
            let result = self.init_with_primary(&super_descriptor, instance, super_args);
            self.class_context.pop();
            result?;
        }

        self.run_init_items(&descriptor.init_items, instance, &env, &descriptor.source_file)
    }

    fn run_secondary(
        &mut self,
        descriptor: &Arc<ClassDescriptor>,
        instance: &Arc<Instance>,
        index: usize,
        args: CallArgs,
        delegation_depth: usize,
        line: u32,
    ) -> EvalResult<()> {
        let ctor = descriptor.secondaries[index].clone();
        let env = descriptor.defining_env.child();
        env.define_val("this", Value::Instance(Arc::clone(instance)), true)
            .map_err(Signal::raise)?;
        self.bind_ctor_params(&descriptor.name, &ctor.params, args, &env)?;

        // delegation runs first (bottom-up), its body afterwards
        let delegate_args = match &ctor.delegate {
            Some(args) => {
                let file = Arc::clone(&descriptor.source_file);
                self.eval_args(args, &env, &file)?.0
            }
            None => CallArgs::empty(),
        };
        let primary = descriptor.primary.clone().unwrap_or_default();
        if ctor.delegate.is_none() || ctor_accepts(&primary, &delegate_args) {
            self.init_with_primary(descriptor, instance, delegate_args)?;
        } else {
            let target = descriptor
                .secondaries
                .iter()
                .enumerate()
                .position(|(i, other)| i != index && params_accept(&other.params, &delegate_args));
            match target {
                Some(target) => {
                    self.run_secondary(descriptor, instance, target, delegate_args, delegation_depth + 1, line)?;
                }
                None => {
                    return Err(Signal::raise(NovaError::new(
                        ErrorKind::ConstructorArgMismatch,
                        format!("no delegation target in {} accepts those arguments", descriptor.name),
                    )));
                }
            }
        }

        let file = Arc::clone(&descriptor.source_file);
        self.eval_block_in(&ctor.body, &env, &file)?;
        Ok(())
    }

    /// Runs property initialisers and init blocks in lexical order.
    fn run_init_items(
        &mut self,
        items: &[InitItem],
        instance: &Arc<Instance>,
        env: &Env,
        file: &Arc<str>,
    ) -> EvalResult<()> {
        for item in items {
            match item {
                InitItem::Property { name, init, .. } => {
                    let value = match init {
                        Some(expr) => self.eval_expr(expr, env, file)?,
                        None => Value::Null,
                    };
                    instance.set_field(name, value);
                }
                InitItem::Block(block) => {
                    self.eval_block(block, env, file)?;
                }
            }
        }
        Ok(())
    }

    /// Parameter binding for constructors; mismatches surface as
    /// `ConstructorArgMismatch` rather than generic type errors.
    fn bind_ctor_params(&mut self, class: &str, params: &[Param], args: CallArgs, env: &Env) -> EvalResult<()> {
        match self.bind_call_params(class, params, args, env, false) {
            Ok(()) => Ok(()),
            Err(Signal::Raise(mut err)) if err.kind == ErrorKind::TypeError => {
                err.kind = ErrorKind::ConstructorArgMismatch;
                Err(Signal::Raise(err))
            }
            Err(other) => Err(other),
        }
    }
}

/// Whether the primary constructor (as ctor params) accepts the arguments.
fn ctor_accepts(primary: &[crate::mir::CtorParam], args: &CallArgs) -> bool {
    let params: Vec<Param> = primary
        .iter()
        .map(|p| Param {
            pattern: Pattern::Name(p.name.clone()),
            default: p.default.clone(),
        })
        .collect();
    params_accept(&params, args)
}

/// Whether a parameter list can bind the given arguments.
fn params_accept(params: &[Param], args: &CallArgs) -> bool {
    if args.positional.len() > params.len() {
        return false;
    }
    for (index, param) in params.iter().enumerate() {
        let supplied = index < args.positional.len()
            || match &param.pattern {
                Pattern::Name(name) => args.named.iter().any(|(n, _)| n == name),
                Pattern::Tuple(_) => false,
            };
        if !supplied && param.default.is_none() {
            return false;
        }
    }
    // reject unknown named arguments
    args.named.iter().all(|(name, _)| {
        params
            .iter()
            .any(|p| matches!(&p.pattern, Pattern::Name(n) if n == name))
    })
}
