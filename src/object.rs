//! Constructed instances.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::args::ArgValue;
use crate::descriptors::TypeDescriptor;
use crate::internal::sync::{read, write, RwLock};
use crate::key::TypeKey;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Shared reference to a constructed instance.
///
/// Identity is reference identity: use [`Arc::ptr_eq`] to check whether two
/// construction calls returned the same object.
pub type ObjectRef = Arc<Instance>;

/// An object produced by a type's allocation step.
///
/// Instances carry the key of their concrete type, the linearized ancestry of
/// that type and a field table that allocation and initialization steps write
/// to. No cache bookkeeping lives on the instance; caches belong to type
/// descriptors.
pub struct Instance {
    id: u64,
    ty: TypeKey,
    lineage: Arc<[TypeKey]>,
    fields: RwLock<BTreeMap<String, ArgValue>>,
}

impl Instance {
    pub(crate) fn new(ty: TypeKey, lineage: Arc<[TypeKey]>) -> ObjectRef {
        Arc::new(Self {
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            ty,
            lineage,
            fields: RwLock::new(BTreeMap::new()),
        })
    }

    /// A field-less instance of `ty`.
    pub(crate) fn blank(ty: &TypeDescriptor) -> ObjectRef {
        Self::new(ty.key().clone(), ty.lineage_arc())
    }

    /// Process-unique instance number.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn type_key(&self) -> &TypeKey {
        &self.ty
    }

    pub fn type_name(&self) -> &str {
        self.ty.display_name()
    }

    /// True when the instance's type is `ty` or derives from it.
    pub fn is_instance_of(&self, ty: &TypeDescriptor) -> bool {
        self.lineage.iter().any(|k| k == ty.key())
    }

    pub fn get(&self, name: &str) -> Option<ArgValue> {
        read(&self.fields).get(name).cloned()
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        read(&self.fields).get(name).and_then(ArgValue::as_int)
    }

    pub fn get_str(&self, name: &str) -> Option<String> {
        read(&self.fields)
            .get(name)
            .and_then(ArgValue::as_str)
            .map(str::to_string)
    }

    pub fn has(&self, name: &str) -> bool {
        read(&self.fields).contains_key(name)
    }

    /// Sets a field, returning the previous value if there was one.
    pub fn set(&self, name: impl Into<String>, value: impl Into<ArgValue>) -> Option<ArgValue> {
        write(&self.fields).insert(name.into(), value.into())
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> Vec<String> {
        read(&self.fields).keys().cloned().collect()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("type", &self.ty.display_name())
            .field("fields", &*read(&self.fields))
            .finish()
    }
}
