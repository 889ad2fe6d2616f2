use std::{
    any::Any,
    collections::HashMap,
    convert::AsRef,
    sync::{Arc, RwLock},
};

use crate::ShareLock;

use super::{DbCollection, DbCollectionIden, StoreIden, data::*};

#[derive(Clone)]
pub struct DynDbSetRef<T>(Arc<dyn DbCollection<Item = T>>);

/// Registry of storage collections, the engine's persistence facade.
///
/// The store is the source of truth for all mutable runtime state and the
/// only thing that owns an execution across command boundaries; in-memory
/// references are rebuilt per command from ids.
pub struct Store {
    collections: ShareLock<HashMap<StoreIden, Arc<dyn Any + Send + Sync + 'static>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn collection<DATA>(&self) -> Arc<dyn DbCollection<Item = DATA>>
    where
        DATA: DbCollectionIden + Send + Sync + 'static,
    {
        let collections = self.collections.read().unwrap();

        #[allow(clippy::expect_fun_call)]
        let collection = collections.get(&DATA::iden()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()));

        #[allow(clippy::expect_fun_call)]
        collection.downcast_ref::<DynDbSetRef<DATA>>().map(|v| v.0.clone()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()))
    }

    pub fn register<DATA>(
        &self,
        collection: Arc<dyn DbCollection<Item = DATA> + Send + Sync + 'static>,
    ) where
        DATA: DbCollectionIden + 'static,
    {
        let mut collections = self.collections.write().unwrap();
        collections.insert(DATA::iden(), Arc::new(DynDbSetRef::<DATA>(collection)));
    }

    pub fn process_definitions(&self) -> Arc<dyn DbCollection<Item = ProcessDefinitionData>> {
        self.collection()
    }

    pub fn executions(&self) -> Arc<dyn DbCollection<Item = Execution>> {
        self.collection()
    }

    pub fn variables(&self) -> Arc<dyn DbCollection<Item = Variable>> {
        self.collection()
    }

    pub fn event_subscriptions(&self) -> Arc<dyn DbCollection<Item = EventSubscription>> {
        self.collection()
    }

    pub fn jobs(&self) -> Arc<dyn DbCollection<Item = Job>> {
        self.collection()
    }

    pub fn tasks(&self) -> Arc<dyn DbCollection<Item = Task>> {
        self.collection()
    }
}
