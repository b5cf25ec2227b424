use std::fmt;

/// Maximum number of array dimensions a type may carry.
pub const MAX_ARRAY_DIMS: usize = 8;

/// Base type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Pointer,
    Array,
    Struct,
    Union,
    Enum,
    Function,
    Process,
    Semaphore,
    Pid,
    Unknown,
}

/// Type qualifier bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Qualifiers(u32);

impl Qualifiers {
    pub const NONE: Qualifiers = Qualifiers(0);
    pub const CONST: Qualifiers = Qualifiers(1 << 0);
    pub const VOLATILE: Qualifiers = Qualifiers(1 << 1);
    pub const UNSIGNED: Qualifiers = Qualifiers(1 << 2);
    pub const SIGNED: Qualifiers = Qualifiers(1 << 3);
    pub const STATIC: Qualifiers = Qualifiers(1 << 4);
    pub const EXTERN: Qualifiers = Qualifiers(1 << 5);
    pub const REGISTER: Qualifiers = Qualifiers(1 << 6);

    /// Add a qualifier to the set.
    pub fn insert(&mut self, other: Qualifiers) {
        self.0 |= other.0;
    }

    /// True if every bit of `other` is present.
    pub fn contains(&self, other: Qualifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Type descriptor: base kind plus qualifiers, pointer/array composition
/// and, for function types, the signature.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub kind: TypeKind,
    pub qualifiers: Qualifiers,
    pub pointer_depth: u32,
    pub array_sizes: Vec<i64>,
    pub pointee: Option<Box<TypeInfo>>,
    pub return_type: Option<Box<TypeInfo>>,
    pub params: Vec<TypeInfo>,
}

impl TypeInfo {
    /// Create a plain type of the given kind.
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            qualifiers: Qualifiers::NONE,
            pointer_depth: 0,
            array_sizes: Vec::new(),
            pointee: None,
            return_type: None,
            params: Vec::new(),
        }
    }

    /// Create a pointer to the given type.
    pub fn pointer_to(pointee: TypeInfo) -> Self {
        let depth = if pointee.kind == TypeKind::Pointer {
            pointee.pointer_depth + 1
        } else {
            1
        };
        Self {
            kind: TypeKind::Pointer,
            qualifiers: Qualifiers::NONE,
            pointer_depth: depth,
            array_sizes: Vec::new(),
            pointee: Some(Box::new(pointee)),
            return_type: None,
            params: Vec::new(),
        }
    }

    /// Create a function type from its signature.
    pub fn function(return_type: TypeInfo, params: Vec<TypeInfo>) -> Self {
        Self {
            kind: TypeKind::Function,
            qualifiers: Qualifiers::NONE,
            pointer_depth: 0,
            array_sizes: Vec::new(),
            pointee: None,
            return_type: Some(Box::new(return_type)),
            params,
        }
    }

    /// Append an array dimension. A size of 0 stands for the outermost
    /// unknown-size case. Fails once [`MAX_ARRAY_DIMS`] is reached.
    pub fn push_array_dim(&mut self, size: i64) -> bool {
        if self.array_sizes.len() >= MAX_ARRAY_DIMS {
            return false;
        }
        self.array_sizes.push(size);
        true
    }

    pub fn is_array(&self) -> bool {
        !self.array_sizes.is_empty()
    }

    /// Size in bytes: the base-kind size multiplied by the product of the
    /// array dimensions.
    pub fn size(&self) -> i32 {
        let base: i32 = match self.kind {
            TypeKind::Void => 0,
            TypeKind::Char => 1,
            TypeKind::Short => 2,
            TypeKind::Int => 4,
            TypeKind::Long => 8,
            TypeKind::Float => 4,
            TypeKind::Double => 8,
            TypeKind::Pointer => 4,
            TypeKind::Pid => 4,
            TypeKind::Semaphore => 4,
            _ => 4,
        };

        self.array_sizes.iter().fold(base, |acc, &dim| {
            acc.saturating_mul(dim.max(0) as i32)
        })
    }

    /// Structural equality ignoring qualifiers.
    pub fn is_equal(&self, other: &TypeInfo) -> bool {
        self.kind == other.kind
            && self.pointer_depth == other.pointer_depth
            && self.array_sizes == other.array_sizes
    }

    /// Assignment compatibility: equal types, numeric promotion among the
    /// small integer kinds, or pointers where either side points at void.
    pub fn is_compatible(&self, other: &TypeInfo) -> bool {
        if self.is_equal(other) {
            return true;
        }

        let numeric = |k: TypeKind| matches!(k, TypeKind::Int | TypeKind::Char | TypeKind::Short);
        if numeric(self.kind) && numeric(other.kind) {
            return true;
        }

        if self.kind == TypeKind::Pointer && other.kind == TypeKind::Pointer {
            let points_at_void = |t: &TypeInfo| {
                t.pointee
                    .as_ref()
                    .is_some_and(|p| p.kind == TypeKind::Void)
            };
            if points_at_void(self) || points_at_void(other) {
                return true;
            }
        }

        false
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.kind {
            TypeKind::Void => "void",
            TypeKind::Char => "char",
            TypeKind::Short => "short",
            TypeKind::Int => "int",
            TypeKind::Long => "long",
            TypeKind::Float => "float",
            TypeKind::Double => "double",
            TypeKind::Struct => "struct",
            TypeKind::Union => "union",
            TypeKind::Enum => "enum",
            TypeKind::Function => "function",
            TypeKind::Process => "process",
            TypeKind::Semaphore => "semaphore",
            TypeKind::Pid => "pid",
            TypeKind::Pointer => {
                let inner = match &self.pointee {
                    Some(p) => p.to_string(),
                    None => "void".to_string(),
                };
                write!(f, "{inner}*")?;
                return self.write_dims(f);
            }
            TypeKind::Array | TypeKind::Unknown => "unknown",
        };
        write!(f, "{base}")?;
        self.write_dims(f)
    }
}

impl TypeInfo {
    fn write_dims(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dim in &self.array_sizes {
            write!(f, "[{dim}]")?;
        }
        Ok(())
    }
}
