use crate::component::Component;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::RwLock;

/// Identifier minted for a component type on first use. `0` is reserved as
/// "unassigned" and never handed out.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
pub struct ComponentType {
    pub(crate) id: u64,
}

impl ComponentType {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Display for ComponentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let guard = TYPE_NAMES.read().unwrap();
        match guard.as_ref().and_then(|names| names.get(&self.id)) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "type#{}", self.id),
        }
    }
}

static CURRENT_TYPE_ID: AtomicU64 = AtomicU64::new(0);

static TYPE_IDS: RwLock<Option<HashMap<TypeId, u64>>> = RwLock::new(None);

static TYPE_NAMES: RwLock<Option<HashMap<u64, &'static str>>> = RwLock::new(None);

/// Returns the id assigned to `T`, minting a fresh one on first use.
pub fn type_id_of<T: Component>() -> ComponentType {
    let key = TypeId::of::<T>();
    {
        let guard = TYPE_IDS.read().unwrap();
        if let Some(id) = guard.as_ref().and_then(|ids| ids.get(&key)) {
            return ComponentType { id: *id };
        }
    }

    let mut guard = TYPE_IDS.write().unwrap();
    let id = *guard
        .get_or_insert_with(HashMap::new)
        .entry(key)
        .or_insert_with(|| CURRENT_TYPE_ID.fetch_add(1, Ordering::Relaxed) + 1);
    drop(guard);

    TYPE_NAMES
        .write()
        .unwrap()
        .get_or_insert_with(HashMap::new)
        .entry(id)
        .or_insert(T::name());

    ComponentType { id }
}

/// Overrides the minting counter; the next minted id is `value + 1`. Exists
/// for deterministic test setup and replay. Ids already handed out keep
/// their values, so moving the counter backwards can mint duplicates.
pub fn set_counter(value: u64) {
    CURRENT_TYPE_ID.store(value, Ordering::Relaxed);
}

/// Last id handed out (or the value last passed to `set_counter`).
pub fn current_counter() -> u64 {
    CURRENT_TYPE_ID.load(Ordering::Relaxed)
}
