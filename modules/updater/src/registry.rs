use crate::{driver::Updater, error::Error};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

/// Constructor for an updater, registered once per process.
pub type UpdaterFactory = Arc<dyn Fn() -> Arc<dyn Updater> + Send + Sync>;

static REGISTRY: LazyLock<RwLock<HashMap<String, UpdaterFactory>>> =
    LazyLock::new(Default::default);

/// Register a named updater factory. Duplicate registrations are rejected.
pub fn register(name: &str, factory: UpdaterFactory) -> Result<(), Error> {
    let mut registry = REGISTRY.write();
    if registry.contains_key(name) {
        return Err(Error::AlreadyRegistered(name.to_string()));
    }

    registry.insert(name.to_string(), factory);
    Ok(())
}

/// Look up a previously registered factory.
pub fn get(name: &str) -> Option<UpdaterFactory> {
    REGISTRY.read().get(name).cloned()
}

/// All registered names, sorted for stable iteration.
pub fn registered() -> Vec<String> {
    let mut names: Vec<String> = REGISTRY.read().keys().cloned().collect();
    names.sort_unstable();
    names
}
