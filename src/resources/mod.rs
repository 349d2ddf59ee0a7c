//! Resource sub-routers mounted under the API root.
//!
//! The business logic behind each resource lives outside this crate. The
//! defaults here keep every mount reachable: one in-memory document
//! collection per resource plus an `entities` summary.

pub mod handlers;
pub mod store;

use crate::routing::Dispatcher;

pub use handlers::{collection_router, entities_router};
pub use store::{Collection, Store};

/// API root every resource is mounted under.
pub const API_ROOT: &str = "/api";

/// Document-collection resources, in mount order.
pub const COLLECTIONS: [&str; 14] = [
    "tradebureaus",
    "subcityoffices",
    "woredaoffices",
    "upload",
    "alerts",
    "retailercooperatives",
    "retailercooperativeshops",
    "distributions",
    "transactions",
    "users",
    "commodities",
    "customers",
    "allocations",
    "reports",
];

/// Summary resource mounted after the collections.
pub const ENTITIES: &str = "entities";

/// Dispatch table with the default sub-router for every resource.
pub fn default_dispatcher(store: &Store) -> Dispatcher {
    let dispatcher = COLLECTIONS.iter().fold(Dispatcher::new(), |dispatcher, name| {
        match store.collection(name) {
            Some(collection) => dispatcher.mount(
                format!("{}/{}", API_ROOT, name),
                collection_router(collection),
            ),
            None => dispatcher,
        }
    });

    dispatcher.mount(
        format!("{}/{}", API_ROOT, ENTITIES),
        entities_router(store.clone()),
    )
}

/// Store with one collection per resource.
pub fn default_store() -> Store {
    Store::new(&COLLECTIONS)
}
