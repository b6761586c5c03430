//! Runtime class machinery: the descriptor arena, instances, and method
//! lookup walks.
//!
//! Class descriptors are immutable after declaration (annotation-processor
//! flags are atomics) and live in an arena keyed by [`ClassId`]; superclass
//! and interface links are IDs, so cyclic references are broken on arena
//! lookup and descriptors can be shared freely across interpreter threads.

use std::sync::{
    Arc, OnceLock, PoisonError, RwLock,
    atomic::{AtomicBool, Ordering},
};

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    env::Env,
    mir,
    types::{UserFunction, Visibility},
    value::Value,
};

/// Stable index of a class in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A lightweight class handle carried inside `Value::Class`.
#[derive(Debug, Clone)]
pub struct ClassRef {
    pub id: ClassId,
    pub name: Arc<str>,
}

/// What kind of instance this is; affects display and member lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceKind {
    Regular,
    EnumEntry,
    Object,
    Companion,
}

/// An instance of a user class: a class reference plus mutable field slots.
#[derive(Debug)]
pub struct Instance {
    pub class: ClassId,
    pub class_name: Arc<str>,
    pub kind: InstanceKind,
    /// Set when the class carried the `@data` annotation; drives the default
    /// structural display.
    pub is_data: bool,
    fields: RwLock<IndexMap<String, Value>>,
}

impl Instance {
    #[must_use]
    pub fn new(class: ClassId, class_name: Arc<str>, kind: InstanceKind, is_data: bool) -> Arc<Self> {
        Arc::new(Self {
            class,
            class_name,
            kind,
            is_data,
            fields: RwLock::new(IndexMap::new()),
        })
    }

    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), value);
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn field_snapshot(&self) -> Vec<(String, Value)> {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Fallback rendering used when no user `toString` applies.
    #[must_use]
    pub fn default_display(&self, depth: usize) -> String {
        match self.kind {
            InstanceKind::EnumEntry => self
                .get_field("name")
                .map_or_else(|| self.class_name.to_string(), |v| v.display()),
            InstanceKind::Object | InstanceKind::Companion => self.class_name.to_string(),
            InstanceKind::Regular => {
                if self.is_data && depth < 8 {
                    let fields = self
                        .field_snapshot()
                        .into_iter()
                        .map(|(name, value)| format!("{name}={}", value.display()))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{}({fields})", self.class_name)
                } else {
                    format!("<{} instance>", self.class_name)
                }
            }
        }
    }
}

/// One lexically-ordered instantiation step: a property initialiser or an
/// `init { }` block.
#[derive(Debug, Clone)]
pub enum InitItem {
    Property {
        name: String,
        mutable: bool,
        visibility: Visibility,
        init: Option<mir::Expr>,
        line: u32,
    },
    Block(mir::Block),
}

/// A secondary constructor.
#[derive(Debug, Clone)]
pub struct SecondaryCtor {
    pub params: Vec<mir::Param>,
    /// `: this(...)` delegation arguments.
    pub delegate: Option<Vec<mir::CallArg>>,
    pub body: mir::Block,
    pub line: u32,
}

/// The companion object: static-like members reachable via the class name.
#[derive(Debug)]
pub struct CompanionDef {
    pub methods: AHashMap<String, Vec<Arc<UserFunction>>>,
    pub init_items: Vec<InitItem>,
    /// Lazily-created singleton instance backing companion state.
    pub instance: OnceLock<Value>,
}

/// An abstract member a concrete subclass must implement.
#[derive(Debug, Clone)]
pub struct AbstractMethod {
    pub name: String,
    pub arity: usize,
}

/// Immutable runtime descriptor of a class, interface, enum, annotation
/// class, or singleton object.
#[derive(Debug)]
pub struct ClassDescriptor {
    pub id: ClassId,
    pub name: Arc<str>,
    pub kind: mir::ClassKind,
    pub is_abstract: bool,
    pub is_sealed: bool,
    /// Compilation unit (one per `eval` call); sealed classes may only be
    /// subclassed from the same unit in batch mode.
    pub unit_id: u64,
    /// Annotation name → evaluated argument map, in declaration order.
    pub annotations: Vec<(String, IndexMap<String, Value>)>,
    pub type_params: Vec<String>,
    pub primary: Option<Vec<mir::CtorParam>>,
    pub secondaries: Vec<SecondaryCtor>,
    pub superclass: Option<ClassId>,
    pub super_args: Vec<mir::CallArg>,
    pub interfaces: Vec<ClassId>,
    /// Property initialisers and init blocks in lexical order.
    pub init_items: Vec<InitItem>,
    /// Concrete methods, keyed by name; overloads differ by arity.
    pub methods: AHashMap<String, Vec<Arc<UserFunction>>>,
    pub abstract_methods: Vec<AbstractMethod>,
    pub companion: Option<CompanionDef>,
    pub entry_defs: Vec<mir::EnumEntry>,
    /// Materialised enum entries, in declaration order.
    pub enum_entries: OnceLock<Vec<Value>>,
    /// Lazily-created instance for `object` declarations.
    pub singleton: OnceLock<Value>,
    /// Lexical environment of the declaration site; method calls chain from
    /// here.
    pub defining_env: Env,
    /// Set by the `@data` processor.
    pub data: AtomicBool,
    /// Set by the `@builder` processor.
    pub builder: AtomicBool,
    pub source_file: Arc<str>,
    pub line: u32,
}

impl ClassDescriptor {
    #[must_use]
    pub fn class_ref(&self) -> ClassRef {
        ClassRef {
            id: self.id,
            name: Arc::clone(&self.name),
        }
    }

    #[must_use]
    pub fn is_data(&self) -> bool {
        self.data.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn has_builder(&self) -> bool {
        self.builder.load(Ordering::Relaxed)
    }

    /// Finds a concrete method on this class only (no hierarchy walk),
    /// preferring an exact arity match over a defaults-compatible one.
    #[must_use]
    pub fn find_own_method(&self, name: &str, arity: usize) -> Option<Arc<UserFunction>> {
        let overloads = self.methods.get(name)?;
        overloads
            .iter()
            .find(|f| f.arity() == arity)
            .or_else(|| {
                overloads
                    .iter()
                    .find(|f| arity >= f.required_arity() && arity <= f.arity())
            })
            .cloned()
    }

    /// Names of fields declared by the primary constructor and property
    /// items, in declaration order.
    #[must_use]
    pub fn declared_fields(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(primary) = &self.primary {
            for param in primary {
                if param.prop.is_some() {
                    names.push(param.name.clone());
                }
            }
        }
        for item in &self.init_items {
            if let InitItem::Property { name, .. } = item {
                names.push(name.clone());
            }
        }
        names
    }

    /// Visibility of a declared field, when known.
    #[must_use]
    pub fn field_visibility(&self, field: &str) -> Option<Visibility> {
        if let Some(primary) = &self.primary {
            for param in primary {
                if param.name == field
                    && let Some((_, visibility)) = param.prop
                {
                    return Some(visibility);
                }
            }
        }
        for item in &self.init_items {
            if let InitItem::Property { name, visibility, .. } = item
                && name == field
            {
                return Some(*visibility);
            }
        }
        None
    }

    /// Whether a declared field is mutable (`var`).
    #[must_use]
    pub fn field_mutable(&self, field: &str) -> Option<bool> {
        if let Some(primary) = &self.primary {
            for param in primary {
                if param.name == field
                    && let Some((mutable, _)) = param.prop
                {
                    return Some(mutable);
                }
            }
        }
        for item in &self.init_items {
            if let InitItem::Property { name, mutable, .. } = item
                && name == field
            {
                return Some(*mutable);
            }
        }
        None
    }
}

/// The arena of class descriptors, shared by an interpreter and its children.
#[derive(Debug, Default)]
pub struct ClassArena {
    classes: Vec<Option<Arc<ClassDescriptor>>>,
    by_name: AHashMap<String, ClassId>,
}

impl ClassArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves an ID for a class being declared, making the name resolvable
    /// (necessary for methods of the class to reference their own class).
    pub fn reserve(&mut self, name: &str) -> ClassId {
        let id = ClassId(u32::try_from(self.classes.len()).unwrap_or(u32::MAX));
        self.classes.push(None);
        self.by_name.insert(name.to_owned(), id);
        id
    }

    /// Installs the finished descriptor for a reserved ID.
    pub fn install(&mut self, descriptor: Arc<ClassDescriptor>) {
        let index = descriptor.id.index();
        self.classes[index] = Some(descriptor);
    }

    #[must_use]
    pub fn get(&self, id: ClassId) -> Option<Arc<ClassDescriptor>> {
        self.classes.get(id.index()).and_then(Clone::clone)
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// Resolves a method by walking the class chain, then interfaces
    /// (including default methods). Returns the function and the class that
    /// declared it.
    #[must_use]
    pub fn resolve_method(&self, class: ClassId, name: &str, arity: usize) -> Option<(Arc<UserFunction>, ClassRef)> {
        // class chain first
        let mut current = Some(class);
        while let Some(id) = current {
            let descriptor = self.get(id)?;
            if let Some(found) = descriptor.find_own_method(name, arity) {
                return Some((found, descriptor.class_ref()));
            }
            current = descriptor.superclass;
        }
        // then interfaces, depth-first over the whole hierarchy
        let mut stack = vec![class];
        while let Some(id) = stack.pop() {
            let descriptor = self.get(id)?;
            for interface in &descriptor.interfaces {
                if let Some(iface) = self.get(*interface) {
                    if let Some(found) = iface.find_own_method(name, arity) {
                        return Some((found, iface.class_ref()));
                    }
                    stack.extend(iface.interfaces.iter().copied());
                }
            }
            if let Some(superclass) = descriptor.superclass {
                stack.push(superclass);
            }
        }
        None
    }

    /// Whether `class` has `ancestor` in its superclass chain or interface
    /// closure (reflexive).
    #[must_use]
    pub fn is_subtype(&self, class: ClassId, ancestor: ClassId) -> bool {
        if class == ancestor {
            return true;
        }
        let mut stack = vec![class];
        while let Some(id) = stack.pop() {
            let Some(descriptor) = self.get(id) else { continue };
            if let Some(superclass) = descriptor.superclass {
                if superclass == ancestor {
                    return true;
                }
                stack.push(superclass);
            }
            for interface in &descriptor.interfaces {
                if *interface == ancestor {
                    return true;
                }
                stack.push(*interface);
            }
        }
        false
    }

    /// Abstract members (own and inherited) not implemented by `class` or an
    /// ancestor between the declarer and `class`.
    #[must_use]
    pub fn unimplemented_abstracts(&self, class: ClassId) -> Vec<AbstractMethod> {
        let mut required: Vec<AbstractMethod> = Vec::new();
        let mut stack = vec![class];
        while let Some(id) = stack.pop() {
            let Some(descriptor) = self.get(id) else { continue };
            required.extend(descriptor.abstract_methods.iter().cloned());
            if let Some(superclass) = descriptor.superclass {
                stack.push(superclass);
            }
            stack.extend(descriptor.interfaces.iter().copied());
        }
        required
            .into_iter()
            .filter(|abs| self.resolve_method(class, &abs.name, abs.arity).is_none())
            .collect()
    }

    /// Whether the kind of the named class is an interface.
    #[must_use]
    pub fn is_interface(&self, id: ClassId) -> bool {
        self.get(id).is_some_and(|d| d.kind == mir::ClassKind::Interface)
    }
}

/// Shared, thread-safe arena handle.
pub type SharedArena = Arc<RwLock<ClassArena>>;

/// Reads from the shared arena, tolerating poisoned locks.
pub fn arena_read(arena: &SharedArena) -> std::sync::RwLockReadGuard<'_, ClassArena> {
    arena.read().unwrap_or_else(PoisonError::into_inner)
}

/// Writes to the shared arena, tolerating poisoned locks.
pub fn arena_write(arena: &SharedArena) -> std::sync::RwLockWriteGuard<'_, ClassArena> {
    arena.write().unwrap_or_else(PoisonError::into_inner)
}
