//! Repository adapter.
//!
//! A base for application repositories: binds one [`StoredProcedureClient`]
//! to the mapped type and hands it out. It adds no behavior of its own.

use crate::client::StoredProcedureClient;
use crate::config::ConnectionStrings;
use crate::db::ConnectionFactory;
use std::ops::Deref;
use std::sync::Arc;

pub struct GenericRepository<T> {
    settings: Arc<dyn ConnectionStrings>,
    procedures: StoredProcedureClient<T>,
}

impl<T> GenericRepository<T> {
    pub fn new(
        settings: Arc<dyn ConnectionStrings>,
        connection_string_name: impl Into<String>,
    ) -> Self {
        let procedures = StoredProcedureClient::new(Arc::clone(&settings), connection_string_name);
        Self {
            settings,
            procedures,
        }
    }

    pub fn with_factory(
        settings: Arc<dyn ConnectionStrings>,
        connection_string_name: impl Into<String>,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Self {
        let procedures = StoredProcedureClient::with_factory(
            Arc::clone(&settings),
            connection_string_name,
            factory,
        );
        Self {
            settings,
            procedures,
        }
    }

    /// The client bound to `T`.
    pub fn procedures(&self) -> &StoredProcedureClient<T> {
        &self.procedures
    }

    /// The configuration the client resolves connection strings from.
    pub fn settings(&self) -> &Arc<dyn ConnectionStrings> {
        &self.settings
    }
}

impl<T> Deref for GenericRepository<T> {
    type Target = StoredProcedureClient<T>;

    fn deref(&self) -> &Self::Target {
        &self.procedures
    }
}

impl<T> Clone for GenericRepository<T> {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            procedures: self.procedures.clone(),
        }
    }
}

impl<T> std::fmt::Debug for GenericRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericRepository")
            .field("procedures", &self.procedures)
            .finish_non_exhaustive()
    }
}
