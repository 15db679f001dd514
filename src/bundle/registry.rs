use super::Bundlable;
use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

type Constructor = fn() -> Box<dyn Bundlable>;

/// Process-wide class table: restorable types by name, and old names
/// mapped onto current ones for loading older saves.
#[derive(Default)]
struct ClassRegistry {
    classes: HashMap<String, Constructor>,
    aliases: HashMap<String, String>,
}

fn registry() -> &'static RwLock<ClassRegistry> {
    static REGISTRY: OnceLock<RwLock<ClassRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

fn construct<T: Bundlable + Default>() -> Box<dyn Bundlable> {
    Box::new(T::default())
}

/// Registers `T` under its own class name.
pub fn register<T: Bundlable + Default>() {
    let name = T::default().class_name();
    register_as::<T>(name);
}

pub fn register_as<T: Bundlable + Default>(name: &str) {
    registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .classes
        .insert(name.to_string(), construct::<T>);
    log::trace!("bundle class registered: {name}");
}

/// Objects saved as `alias` load as `class_name`. Aliases are not chained.
pub fn add_alias(alias: &str, class_name: &str) {
    registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .aliases
        .insert(alias.to_string(), class_name.to_string());
}

pub fn add_aliases<'a>(aliases: impl IntoIterator<Item = (&'a str, &'a str)>) {
    for (alias, class_name) in aliases {
        add_alias(alias, class_name);
    }
}

/// Applies one level of aliasing.
pub fn resolve_class(name: &str) -> String {
    registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .aliases
        .get(name)
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

pub fn is_registered(name: &str) -> bool {
    registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .classes
        .contains_key(name)
}

/// Default instance of the class saved as `name`, aliases applied.
pub fn instantiate(name: &str) -> Option<Box<dyn Bundlable>> {
    let resolved = resolve_class(name);
    let constructor = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .classes
        .get(&resolved)
        .copied()?;
    Some(constructor())
}
